//! Chunk geometry of one remote file and range splitting.

/// Fixed chunk size plus total length of the file it describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    pub chunk_size: u64,
    pub length: u64,
}

/// A file range restricted to one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpan {
    pub chunk_index: u64,
    pub offset_in_chunk: u64,
    pub len: usize,
}

impl ChunkLayout {
    pub fn new(chunk_size: u64, length: u64) -> Self {
        debug_assert!(chunk_size > 0, "chunk size must be non-zero");
        Self { chunk_size, length }
    }

    #[inline]
    pub fn chunk_index_of(&self, file_offset: u64) -> u64 {
        file_offset / self.chunk_size
    }

    #[inline]
    pub fn within_chunk_offset(&self, file_offset: u64) -> u64 {
        file_offset % self.chunk_size
    }

    /// Number of chunks, counting a trailing partial one.
    pub fn chunk_count(&self) -> u64 {
        self.length.div_ceil(self.chunk_size)
    }

    /// First byte of the chunk.
    pub fn chunk_start(&self, chunk: u64) -> u64 {
        chunk * self.chunk_size
    }

    /// Real size of the chunk; shorter than `chunk_size` only for the last one.
    pub fn chunk_len(&self, chunk: u64) -> u64 {
        let start = self.chunk_start(chunk);
        if start >= self.length {
            return 0;
        }
        (self.length - start).min(self.chunk_size)
    }

    /// Split `[file_offset, file_offset + len)` into per-chunk spans.
    pub fn split(&self, mut file_offset: u64, len: usize) -> Vec<ChunkSpan> {
        let mut remaining = len as u64;
        let mut out = Vec::new();
        while remaining > 0 {
            let ci = self.chunk_index_of(file_offset);
            let off_in_chunk = self.within_chunk_offset(file_offset);
            let cap = self.chunk_size - off_in_chunk;
            let take = cap.min(remaining);
            out.push(ChunkSpan {
                chunk_index: ci,
                offset_in_chunk: off_in_chunk,
                len: take as usize,
            });
            file_offset += take;
            remaining -= take;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_within_single_chunk() {
        let layout = ChunkLayout::new(4096, 1 << 20);
        let spans = layout.split(123, 100);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].chunk_index, 0);
        assert_eq!(spans[0].offset_in_chunk, 123);
        assert_eq!(spans[0].len, 100);
    }

    #[test]
    fn test_split_across_two_chunks() {
        let layout = ChunkLayout::new(4096, 1 << 20);
        let spans = layout.split(4096 - 10, 100);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].chunk_index, 0);
        assert_eq!(spans[0].offset_in_chunk, 4086);
        assert_eq!(spans[0].len, 10);
        assert_eq!(spans[1].chunk_index, 1);
        assert_eq!(spans[1].offset_in_chunk, 0);
        assert_eq!(spans[1].len, 90);
    }

    #[test]
    fn test_zero_len() {
        let layout = ChunkLayout::new(4096, 1 << 20);
        assert!(layout.split(0, 0).is_empty());
    }

    #[test]
    fn test_tail_chunk() {
        let layout = ChunkLayout::new(1000, 10_500);
        assert_eq!(layout.chunk_count(), 11);
        assert_eq!(layout.chunk_len(9), 1000);
        assert_eq!(layout.chunk_len(10), 500);
        assert_eq!(layout.chunk_len(11), 0);

        let exact = ChunkLayout::new(1000, 10_000);
        assert_eq!(exact.chunk_count(), 10);
        assert_eq!(exact.chunk_len(9), 1000);
    }
}
