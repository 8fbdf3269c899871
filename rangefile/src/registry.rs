//! Process-wide map from URL to its `LazyFile`.
//!
//! Files are opened on first use and live as long as the registry; the
//! global instance lives for the whole process.

use crate::config::{DEFAULT_MAX_READ_HEADS, DEFAULT_MAX_READ_SPEED, LazyFileConfig};
use crate::error::{Error, Result};
use crate::file::{DEFAULT_REASON, LazyFile};
use crate::stats::{self, ReadStat};
use crate::transport::http::HttpTransport;
use crate::transport::{RangeTransport, SingleUrl};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

pub type SharedFile = Arc<Mutex<LazyFile>>;

/// Largest chunk size used for `.store` files by default.
pub const STORE_CHUNK_SIZE_CAP: u64 = 16 * 1024;

/// Settings applied to every file the registry opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDefaults {
    pub max_read_heads: usize,
    pub max_read_speed: u64,
    pub log_page_reads: bool,
    pub cache_requested_chunk: bool,
    /// `(suffix, cap)`: files whose url ends with `suffix` get a chunk size
    /// of at most `cap`. The first matching suffix applies.
    pub chunk_size_caps: Vec<(String, u64)>,
}

impl Default for FileDefaults {
    fn default() -> Self {
        Self {
            max_read_heads: DEFAULT_MAX_READ_HEADS,
            max_read_speed: DEFAULT_MAX_READ_SPEED,
            log_page_reads: true,
            cache_requested_chunk: false,
            chunk_size_caps: vec![(".store".to_string(), STORE_CHUNK_SIZE_CAP)],
        }
    }
}

impl FileDefaults {
    /// Chunk size a file at `url` is opened with when `requested` is asked.
    pub fn chunk_size_for(&self, url: &str, requested: u64) -> u64 {
        self.chunk_size_caps
            .iter()
            .find(|(suffix, _)| url.ends_with(suffix.as_str()))
            .map_or(requested, |&(_, cap)| requested.min(cap))
    }

    fn config(&self, chunk_size: u64) -> LazyFileConfig {
        LazyFileConfig::new(chunk_size)
            .with_max_read_heads(self.max_read_heads)
            .with_max_read_speed(self.max_read_speed)
            .with_log_page_reads(self.log_page_reads)
            .with_cache_requested_chunk(self.cache_requested_chunk)
    }
}

pub struct FileRegistry {
    transport: Arc<dyn RangeTransport>,
    defaults: FileDefaults,
    files: Mutex<HashMap<String, SharedFile>>,
    reason: Mutex<String>,
}

static GLOBAL: OnceCell<FileRegistry> = OnceCell::new();

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FileRegistry {
    pub fn new(transport: Arc<dyn RangeTransport>, defaults: FileDefaults) -> Self {
        Self {
            transport,
            defaults,
            files: Mutex::new(HashMap::new()),
            reason: Mutex::new(DEFAULT_REASON.to_string()),
        }
    }

    /// The process-wide registry over HTTP, created on first call.
    pub fn global() -> Result<&'static FileRegistry> {
        GLOBAL.get_or_try_init(|| {
            let transport = HttpTransport::new()?;
            Ok(Self::new(Arc::new(transport), FileDefaults::default()))
        })
    }

    /// The file for `url`, opening it if needed. The chunk size of the first
    /// open wins, after the suffix caps of the defaults; later calls get the
    /// existing file whatever they pass.
    pub fn open(&self, url: &str, chunk_size: u64) -> Result<SharedFile> {
        let mut files = lock(&self.files);
        if let Some(file) = files.get(url) {
            return Ok(file.clone());
        }

        let chunk_size = self.defaults.chunk_size_for(url, chunk_size);
        let mut file = LazyFile::new(
            SingleUrl::new(url),
            self.transport.clone(),
            self.defaults.config(chunk_size),
        )?;
        file.set_reason(lock(&self.reason).clone());
        info!("opened {url} with chunk size {chunk_size}");

        let file = Arc::new(Mutex::new(file));
        files.insert(url.to_string(), file.clone());
        Ok(file)
    }

    pub fn file_len(&self, url: &str, chunk_size: u64) -> Result<u64> {
        let file = self.open(url, chunk_size)?;
        let mut file = lock(&file);
        file.length()
    }

    /// Copy `[start, end)` of `url` into the front of `out`; returns the number
    /// of bytes copied, short only at end of file.
    pub fn read_bytes(
        &self,
        url: &str,
        chunk_size: u64,
        start: u64,
        end: u64,
        prefetch_hint: u64,
        out: &mut [u8],
    ) -> Result<usize> {
        if start > end {
            return Err(Error::InvalidRange {
                from: start,
                to: end,
            });
        }
        let len = (end - start) as usize;
        let file = self.open(url, chunk_size)?;
        let mut file = lock(&file);
        file.copy_into(out, 0, len, start, prefetch_hint)
    }

    pub fn ensure_chunks_cached(&self, url: &str, chunk_size: u64, chunk_ids: &[u64]) -> Result<()> {
        let file = self.open(url, chunk_size)?;
        let mut file = lock(&file);
        file.ensure_chunks_cached(chunk_ids)
    }

    /// Tag reads of every open file, and files opened later, with `reason`.
    pub fn set_reason(&self, reason: &str) {
        *lock(&self.reason) = reason.to_string();
        for file in self.open_files() {
            lock(&file).set_reason(reason);
        }
    }

    pub fn read_stats(&self) -> Vec<ReadStat> {
        let mut reads = Vec::new();
        for file in self.open_files() {
            reads.extend_from_slice(lock(&file).read_pages());
        }
        stats::aggregate(&reads)
    }

    pub fn reset_read_logs(&self) {
        for file in self.open_files() {
            lock(&file).reset_read_log();
        }
    }

    // snapshot so no file lock is taken while holding the map lock
    fn open_files(&self) -> Vec<SharedFile> {
        lock(&self.files).values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory::InMemoryTransport;

    fn registry() -> (Arc<InMemoryTransport>, FileRegistry) {
        let transport = Arc::new(InMemoryTransport::new());
        transport.insert("mem://a", (0..4_000u32).map(|i| i as u8).collect::<Vec<u8>>());
        transport.insert("mem://b", vec![7u8; 1_500]);
        (transport.clone(), FileRegistry::new(transport, FileDefaults::default()))
    }

    #[test]
    fn test_defaults() {
        let d = FileDefaults::default();
        assert!(d.log_page_reads);
        assert!(!d.cache_requested_chunk);
        assert_eq!(d.max_read_heads, DEFAULT_MAX_READ_HEADS);
        assert_eq!(d.chunk_size_for("http://h/idx/abc.store", 1 << 20), STORE_CHUNK_SIZE_CAP);
        assert_eq!(d.chunk_size_for("http://h/idx/abc.store", 4_096), 4_096);
        assert_eq!(d.chunk_size_for("http://h/idx/abc.idx", 1 << 20), 1 << 20);
    }

    #[test]
    fn test_store_files_open_with_capped_chunks() {
        let transport = Arc::new(InMemoryTransport::new());
        transport.insert("mem://idx/seg.store", vec![3u8; 100_000]);
        let reg = FileRegistry::new(transport.clone(), FileDefaults::default());

        let file = reg.open("mem://idx/seg.store", 64 * 1024).unwrap();
        assert_eq!(lock(&file).chunk_size().unwrap(), STORE_CHUNK_SIZE_CAP);

        let mut out = [0u8; 4];
        reg.read_bytes("mem://idx/seg.store", 64 * 1024, 0, 4, 0, &mut out).unwrap();
        let last = transport.requests().pop().unwrap();
        assert_eq!(last.range.as_deref(), Some("bytes=0-16383"));
    }

    #[test]
    fn test_open_once_per_url() {
        let (t, reg) = registry();
        let first = reg.open("mem://a", 1_000).unwrap();
        let second = reg.open("mem://a", 500).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(lock(&second).chunk_size().unwrap(), 1_000);

        assert_eq!(reg.file_len("mem://a", 1_000).unwrap(), 4_000);
        assert_eq!(reg.file_len("mem://a", 1_000).unwrap(), 4_000);
        let heads = t.requests().iter().filter(|r| r.method == "HEAD").count();
        assert_eq!(heads, 1);
    }

    #[test]
    fn test_read_bytes() {
        let (_t, reg) = registry();
        let mut out = [0u8; 16];
        let n = reg.read_bytes("mem://a", 1_000, 995, 1_005, 0, &mut out).unwrap();
        assert_eq!(n, 10);
        let expected: Vec<u8> = (995..1_005u32).map(|i| i as u8).collect();
        assert_eq!(&out[..10], &expected[..]);

        let n = reg.read_bytes("mem://b", 1_000, 1_490, 1_600, 0, &mut out).unwrap();
        assert_eq!(n, 10);
        assert!(matches!(
            reg.read_bytes("mem://a", 1_000, 10, 5, 0, &mut out),
            Err(Error::InvalidRange { from: 10, to: 5 })
        ));
    }

    #[test]
    fn test_ensure_then_read_is_local() {
        let (t, reg) = registry();
        reg.ensure_chunks_cached("mem://a", 1_000, &[1, 2]).unwrap();
        let gets = t.get_count();
        let mut out = [0u8; 1_500];
        reg.read_bytes("mem://a", 1_000, 1_200, 2_700, 0, &mut out).unwrap();
        assert_eq!(t.get_count(), gets);
    }

    #[test]
    fn test_reason_and_stats_span_files() {
        let (_t, reg) = registry();
        reg.set_reason("fieldnorms");
        let mut out = [0u8; 8];
        reg.read_bytes("mem://a", 1_000, 0, 8, 0, &mut out).unwrap();
        reg.set_reason("store");
        reg.read_bytes("mem://a", 1_000, 3_000, 3_008, 0, &mut out).unwrap();
        reg.read_bytes("mem://b", 1_000, 0, 8, 0, &mut out).unwrap();

        let stats = reg.read_stats();
        assert_eq!(stats[0].reason, "Total");
        assert_eq!(stats[0].request_count, 3);
        assert_eq!(stats[0].fetched_bytes, 3_000);
        let store = stats.iter().find(|s| s.reason == "store").unwrap();
        assert_eq!(store.request_count, 2);
        assert_eq!(store.fetched_bytes, 2_000);

        reg.reset_read_logs();
        let stats = reg.read_stats();
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].total_read_count, 0);
    }
}
