//! Per-file configuration.

use crate::error::{Error, Result};

pub const DEFAULT_MAX_READ_HEADS: usize = 3;
pub const DEFAULT_MAX_READ_SPEED: u64 = 5 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LazyFileConfig {
    /// Fetch and cache granularity in bytes; should match the consumer's page size.
    pub chunk_size: u64,
    /// Known total length. Skips the server probe when set.
    pub file_length: Option<u64>,
    /// Number of virtual read heads tracking sequential scans.
    pub max_read_heads: usize,
    /// Upper bound of a single read-ahead, in bytes.
    pub max_read_speed: u64,
    /// Record every page access for `LazyFile::read_stats`.
    pub log_page_reads: bool,
    /// When false only read-ahead chunks are kept; the chunk a direct read
    /// asked for is dropped after use.
    pub cache_requested_chunk: bool,
}

impl LazyFileConfig {
    pub fn new(chunk_size: u64) -> Self {
        Self {
            chunk_size,
            file_length: None,
            max_read_heads: DEFAULT_MAX_READ_HEADS,
            max_read_speed: DEFAULT_MAX_READ_SPEED,
            log_page_reads: false,
            cache_requested_chunk: true,
        }
    }

    pub fn with_file_length(mut self, length: u64) -> Self {
        self.file_length = Some(length);
        self
    }

    pub fn with_max_read_heads(mut self, heads: usize) -> Self {
        self.max_read_heads = heads;
        self
    }

    pub fn with_max_read_speed(mut self, bytes: u64) -> Self {
        self.max_read_speed = bytes;
        self
    }

    pub fn with_log_page_reads(mut self, enabled: bool) -> Self {
        self.log_page_reads = enabled;
        self
    }

    pub fn with_cache_requested_chunk(mut self, enabled: bool) -> Self {
        self.cache_requested_chunk = enabled;
        self
    }

    /// Maximum read-ahead expressed in chunks, rounded to nearest, at least one.
    pub fn max_speed_chunks(&self) -> u64 {
        let chunk_size = self.chunk_size.max(1);
        ((self.max_read_speed + chunk_size / 2) / chunk_size).max(1)
    }

    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.chunk_size == 0 {
            problems.push("chunk_size must be greater than zero");
        }
        if self.max_read_heads == 0 {
            problems.push("max_read_heads must be greater than zero");
        }
        if self.file_length == Some(0) {
            problems.push("file_length must be greater than zero when set");
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidConfig(problems.join("; ")))
        }
    }
}
