//! Turn wanted chunks into contiguous fetch windows.

use super::head::ReadHeadPredictor;
use super::layout::ChunkLayout;

/// Chunks `[first_chunk, end_chunk)` fetched with one byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub first_chunk: u64,
    pub end_chunk: u64,
}

impl FetchWindow {
    pub fn chunk_count(&self) -> u64 {
        self.end_chunk - self.first_chunk
    }

    pub fn contains(&self, chunk: u64) -> bool {
        chunk >= self.first_chunk && chunk < self.end_chunk
    }

    /// Inclusive byte range, clamped to the end of the file.
    pub fn byte_range(&self, layout: &ChunkLayout) -> (u64, u64) {
        let from = layout.chunk_start(self.first_chunk);
        let to = (layout.chunk_start(self.end_chunk)).min(layout.length) - 1;
        (from, to)
    }

    /// Bytes the window occupies on the wire.
    pub fn byte_len(&self, layout: &ChunkLayout) -> u64 {
        let (from, to) = self.byte_range(layout);
        to - from + 1
    }
}

/// Group sorted, duplicate-free chunk ids into inclusive runs of consecutive ids.
pub fn split_runs(sorted: &[u64]) -> Vec<(u64, u64)> {
    let mut runs: Vec<(u64, u64)> = Vec::new();
    for &chunk in sorted {
        match runs.last_mut() {
            Some((_, end)) if *end + 1 == chunk => *end = chunk,
            _ => runs.push((chunk, chunk)),
        }
    }
    runs
}

/// Plan the windows needed to make `wanted` resident.
///
/// Every run is resolved through the predictor on its own. A window starts at
/// the head's position, is `max(min_speed, head.speed)` chunks wide, always
/// reaches the end of its run and never passes the last chunk of the file.
/// Overlapping or touching windows are merged afterwards, so the resulting
/// ranges are disjoint and sorted.
pub fn plan_fetch(
    wanted: &[u64],
    min_speed: u64,
    predictor: &mut ReadHeadPredictor,
    layout: &ChunkLayout,
) -> Vec<FetchWindow> {
    let chunk_count = layout.chunk_count();
    let mut windows = Vec::new();
    for (start, end) in split_runs(wanted) {
        let run_min_speed = min_speed.max(end - start + 1);
        let head = predictor.acquire(start, run_min_speed);
        let width = run_min_speed
            .max(head.speed)
            .max(end + 1 - head.start_chunk);
        let first_chunk = head.start_chunk;
        let end_chunk = (first_chunk + width).min(chunk_count);
        windows.push(FetchWindow {
            first_chunk,
            end_chunk,
        });
    }
    merge_windows(windows)
}

fn merge_windows(mut windows: Vec<FetchWindow>) -> Vec<FetchWindow> {
    windows.sort_by_key(|w| w.first_chunk);
    let mut merged: Vec<FetchWindow> = Vec::with_capacity(windows.len());
    for w in windows {
        match merged.last_mut() {
            Some(last) if w.first_chunk <= last.end_chunk => {
                last.end_chunk = last.end_chunk.max(w.end_chunk);
            }
            _ => merged.push(w),
        }
    }
    merged
}
