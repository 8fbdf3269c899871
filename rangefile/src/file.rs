//! LazyFile: one remote file read through a chunk cache.
//!
//! Every public operation blocks until the bytes it needs are resident. A
//! cache miss goes through the full pipeline: the predictor sizes the fetch
//! window, windows are coalesced into one request, the response is split
//! back into chunks and stored.

use crate::chunk::{ChunkLayout, ChunkStore, FetchWindow, ReadHead, ReadHeadPredictor, plan_fetch};
use crate::config::LazyFileConfig;
use crate::error::{Error, Result};
use crate::stats::{self, PageRead, ReadStat};
use crate::transport::{RangeMapper, RangeTransport, fetch_ranges, is_success};
use crate::util::{basename, format_bytes};
use bytes::Bytes;
use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub const DEFAULT_REASON: &str = "unspecified";

pub struct LazyFile {
    transport: Arc<dyn RangeTransport>,
    mapper: Box<dyn RangeMapper>,
    chunk_size: u64,
    length: Option<u64>,
    server_checked: bool,
    store: ChunkStore,
    heads: ReadHeadPredictor,
    log_page_reads: bool,
    read_pages: Vec<PageRead>,
    last_logged: Option<u64>,
    reason: String,
    total_fetched_bytes: u64,
    total_requests: u64,
}

impl LazyFile {
    pub fn new(
        mapper: impl RangeMapper + 'static,
        transport: Arc<dyn RangeTransport>,
        config: LazyFileConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            mapper: Box::new(mapper),
            chunk_size: config.chunk_size,
            length: config.file_length,
            // a known length makes the probe unnecessary
            server_checked: config.file_length.is_some(),
            store: ChunkStore::new(config.cache_requested_chunk),
            heads: ReadHeadPredictor::new(config.max_read_heads, config.max_speed_chunks()),
            log_page_reads: config.log_page_reads,
            read_pages: Vec::new(),
            last_logged: None,
            reason: DEFAULT_REASON.to_string(),
            total_fetched_bytes: 0,
            total_requests: 0,
        })
    }

    /// Total length of the remote file; probes the server on first use.
    pub fn length(&mut self) -> Result<u64> {
        self.ensure_checked()?;
        self.length.ok_or_else(|| Error::UnknownLength {
            url: self.mapper.map(0, 0).url,
        })
    }

    pub fn chunk_size(&mut self) -> Result<u64> {
        self.ensure_checked()?;
        Ok(self.chunk_size)
    }

    pub fn layout(&mut self) -> Result<ChunkLayout> {
        Ok(ChunkLayout::new(self.chunk_size()?, self.length()?))
    }

    fn ensure_checked(&mut self) -> Result<()> {
        if !self.server_checked {
            self.check_server()?;
        }
        Ok(())
    }

    /// Verify the server can serve byte ranges and learn the file length.
    fn check_server(&mut self) -> Result<()> {
        let url = self.mapper.map(0, 0).url;
        let probe = self.transport.head(&url)?;
        if !is_success(probe.status) {
            return Err(Error::Status {
                url,
                status: probe.status,
            });
        }

        if probe.accept_ranges.as_deref() != Some("bytes") {
            warn!(
                "{url} does not advertise byte serving (`Accept-Ranges: bytes` missing), continuing anyway. seen: {:?}",
                probe
            );
        }
        if let Some(encoding) = probe
            .content_encoding
            .filter(|e| !e.is_empty() && !e.eq_ignore_ascii_case("identity"))
        {
            return Err(Error::Compressed { url, encoding });
        }
        let length = match probe.content_length {
            Some(len) if len > 0 => len,
            _ => return Err(Error::UnknownLength { url }),
        };

        if self.length.is_none() {
            self.length = Some(length);
        }
        self.server_checked = true;
        Ok(())
    }

    /// Copy `[src_offset, src_offset + length)` of the remote file into
    /// `dst[dst_offset..]`, fetching whatever is not cached.
    ///
    /// `length` is clamped to the end of the file; the number of bytes copied
    /// is returned. `prefetch_hint_bytes` asks for at least that much
    /// read-ahead past the first missing chunk.
    pub fn copy_into(
        &mut self,
        dst: &mut [u8],
        dst_offset: usize,
        length: usize,
        src_offset: u64,
        prefetch_hint_bytes: u64,
    ) -> Result<usize> {
        let layout = self.layout()?;
        if src_offset >= layout.length {
            return Ok(0);
        }
        let length = (length as u64).min(layout.length - src_offset) as usize;
        let needed = dst_offset.saturating_add(length);
        if needed > dst.len() {
            return Err(Error::BufferTooSmall {
                needed,
                available: dst.len(),
            });
        }

        let min_speed = prefetch_hint_bytes / layout.chunk_size + 1;
        let mut copied = 0usize;
        for span in layout.split(src_offset, length) {
            let chunk = self.get_chunk(span.chunk_index, min_speed)?;
            let start = span.offset_in_chunk as usize;
            let end = start + span.len;
            if end > chunk.len() {
                return Err(Error::SizeMismatch {
                    expected: end as u64,
                    actual: chunk.len() as u64,
                });
            }
            let out = dst_offset + copied;
            dst[out..out + span.len].copy_from_slice(&chunk[start..end]);
            copied += span.len;
        }
        Ok(length)
    }

    /// Make every chunk in `chunk_ids` resident with as few requests as
    /// possible: the missing ones are coalesced and fetched in one go.
    pub fn ensure_chunks_cached(&mut self, chunk_ids: &[u64]) -> Result<()> {
        if chunk_ids.is_empty() {
            return Ok(());
        }
        let layout = self.layout()?;
        let chunks = layout.chunk_count();
        if let Some(&chunk) = chunk_ids.iter().find(|&&c| c >= chunks) {
            return Err(Error::ChunkOutOfRange { chunk, chunks });
        }

        let mut missing: Vec<u64> = chunk_ids
            .iter()
            .copied()
            .filter(|&c| !self.store.contains(c))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        if missing.is_empty() {
            return Ok(());
        }

        // every window went out in the same request: log it once
        let windows = self.fetch_chunks(&missing, 1)?;
        let fetched: u64 = windows.iter().map(FetchWindow::chunk_count).sum();
        let bytes: u64 = windows.iter().map(|w| w.byte_len(&layout)).sum();
        if fetched > 0 {
            self.log_read(missing[0], false, fetched - 1, bytes);
        }
        Ok(())
    }

    /// Read several byte ranges at once. Missing chunks of all ranges are
    /// fetched in a single batch first; a range inside one chunk is returned
    /// without copying.
    pub fn read_ranges(&mut self, ranges: &[Range<u64>]) -> Result<Vec<Bytes>> {
        let layout = self.layout()?;
        let mut wanted = Vec::new();
        for range in ranges {
            if range.start > range.end {
                return Err(Error::InvalidRange {
                    from: range.start,
                    to: range.end,
                });
            }
            if range.end > layout.length {
                return Err(Error::OutOfBounds {
                    to: range.end,
                    length: layout.length,
                });
            }
            if range.start < range.end {
                let first = layout.chunk_index_of(range.start);
                let last = layout.chunk_index_of(range.end - 1);
                wanted.extend(first..=last);
            }
        }
        wanted.sort_unstable();
        wanted.dedup();

        let missing: Vec<u64> = wanted
            .iter()
            .copied()
            .filter(|&c| !self.store.contains(c))
            .collect();
        self.ensure_chunks_cached(&missing)?;

        let mut resident = HashMap::with_capacity(wanted.len());
        for &chunk in &wanted {
            resident.insert(chunk, self.get_chunk(chunk, 1)?);
        }

        let mut out = Vec::with_capacity(ranges.len());
        for range in ranges {
            let len = (range.end - range.start) as usize;
            let spans = layout.split(range.start, len);
            let bytes = match spans.as_slice() {
                [] => Bytes::new(),
                [span] => {
                    let chunk = &resident[&span.chunk_index];
                    let start = span.offset_in_chunk as usize;
                    chunk.slice(start..start + span.len)
                }
                spans => {
                    let mut buf = Vec::with_capacity(len);
                    for span in spans {
                        let chunk = &resident[&span.chunk_index];
                        let start = span.offset_in_chunk as usize;
                        buf.extend_from_slice(&chunk[start..start + span.len]);
                    }
                    Bytes::from(buf)
                }
            };
            out.push(bytes);
        }
        Ok(out)
    }

    /// Get one chunk from cache or fetch it, with at least `min_speed` chunks
    /// of read-ahead on a miss.
    fn get_chunk(&mut self, wanted: u64, min_speed: u64) -> Result<Bytes> {
        if let Some(chunk) = self.store.get(wanted) {
            trace!("chunk {wanted} served from cache");
            self.store.evict_if_transient(wanted);
            self.log_read(wanted, true, 0, chunk.len() as u64);
            return Ok(chunk);
        }

        let windows = self.fetch_chunks(&[wanted], min_speed)?;
        let chunk = self
            .store
            .get(wanted)
            .ok_or(Error::MissingChunk { chunk: wanted })?;
        self.store.evict_if_transient(wanted);

        if let Some(window) = windows.iter().find(|w| w.contains(wanted)) {
            let layout = ChunkLayout::new(self.chunk_size, self.length.unwrap_or_default());
            self.log_read(wanted, false, window.chunk_count() - 1, window.byte_len(&layout));
        }
        Ok(chunk)
    }

    /// Fetch the windows covering `wanted` (sorted, unique) in one request
    /// and store every chunk they contain.
    fn fetch_chunks(&mut self, wanted: &[u64], min_speed: u64) -> Result<Vec<FetchWindow>> {
        let layout = self.layout()?;
        let windows = plan_fetch(wanted, min_speed, &mut self.heads, &layout);

        let mut url: Option<String> = None;
        let mut other_urls: Vec<String> = Vec::new();
        let mut mapped = Vec::with_capacity(windows.len());
        let mut whole_object = windows.len() == 1;
        let mut requested = 0u64;
        for window in &windows {
            let (from, to) = window.byte_range(&layout);
            if to >= layout.length {
                return Err(Error::OutOfBounds {
                    to,
                    length: layout.length,
                });
            }
            let range = self.mapper.map(from, to);
            whole_object &= from == 0
                && to == layout.length - 1
                && range.from == from
                && range.to == to;
            match &url {
                None => url = Some(range.url),
                Some(first) if *first != range.url => {
                    if !other_urls.contains(&range.url) {
                        other_urls.push(range.url);
                    }
                }
                Some(_) => {}
            }
            requested += to - from + 1;
            mapped.push((range.from, range.to));
        }
        let Some(url) = url else {
            return Ok(windows);
        };
        if !other_urls.is_empty() {
            let mut urls = vec![url];
            urls.extend(other_urls);
            return Err(Error::MultipleUrls { urls });
        }

        self.total_requests += 1;
        self.total_fetched_bytes += requested;
        debug!(
            "[fetch {} of size {} @ {} KiB, {} range(s)]",
            basename(&url),
            format_bytes(requested),
            layout.chunk_start(windows[0].first_chunk) / 1024,
            windows.len()
        );

        let buffers = fetch_ranges(self.transport.as_ref(), &url, &mapped, whole_object)?;
        for (window, buffer) in windows.iter().zip(buffers) {
            for chunk in window.first_chunk..window.end_chunk {
                let offset = ((chunk - window.first_chunk) * layout.chunk_size) as usize;
                let len = layout.chunk_len(chunk) as usize;
                self.store.put(chunk, buffer.slice(offset..offset + len));
            }
        }
        Ok(windows)
    }

    fn log_read(&mut self, page: u64, was_cached: bool, prefetch: u64, bytes: u64) {
        if !self.log_page_reads || self.last_logged == Some(page) {
            return;
        }
        self.last_logged = Some(page);
        self.read_pages.push(PageRead {
            page,
            was_cached,
            prefetch,
            bytes,
            reason: self.reason.clone(),
        });
    }

    /// Provenance tag recorded with every following logged read.
    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = reason.into();
    }

    pub fn read_pages(&self) -> &[PageRead] {
        &self.read_pages
    }

    pub fn read_stats(&self) -> Vec<ReadStat> {
        stats::aggregate(&self.read_pages)
    }

    /// Forget the read log. Counters are kept.
    pub fn reset_read_log(&mut self) {
        self.read_pages.clear();
        self.last_logged = None;
    }

    pub fn total_fetched_bytes(&self) -> u64 {
        self.total_fetched_bytes
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests
    }

    pub fn cached_chunks(&self) -> usize {
        self.store.len()
    }

    /// Bytes held in the chunk cache.
    pub fn resident_bytes(&self) -> u64 {
        self.store.resident_bytes()
    }

    pub fn is_cached(&self, chunk: u64) -> bool {
        self.store.contains(chunk)
    }

    pub fn read_heads(&self) -> &[ReadHead] {
        self.heads.heads()
    }
}
