//! Sparse chunk cache of one remote file.
//!
//! Chunks are addressed by number and never change once stored, the remote
//! file being immutable. There is no eviction bound: the store grows for the
//! whole session. The only removal is the transient mode, where the chunk a
//! direct read asked for is dropped right after it was served.

use bytes::Bytes;
use std::collections::HashMap;

#[derive(Debug)]
pub struct ChunkStore {
    chunks: HashMap<u64, Bytes>,
    retain_requested: bool,
}

impl ChunkStore {
    pub fn new(retain_requested: bool) -> Self {
        Self {
            chunks: HashMap::new(),
            retain_requested,
        }
    }

    pub fn get(&self, chunk: u64) -> Option<Bytes> {
        self.chunks.get(&chunk).cloned()
    }

    pub fn contains(&self, chunk: u64) -> bool {
        self.chunks.contains_key(&chunk)
    }

    pub fn put(&mut self, chunk: u64, data: Bytes) {
        self.chunks.insert(chunk, data);
    }

    /// Drop `chunk` if requested chunks are not retained.
    pub fn evict_if_transient(&mut self, chunk: u64) {
        if !self.retain_requested {
            self.chunks.remove(&chunk);
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Bytes held by the cache.
    pub fn resident_bytes(&self) -> u64 {
        self.chunks.values().map(|c| c.len() as u64).sum()
    }
}
