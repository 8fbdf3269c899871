//! Page read log and the per-reason report built from it.

use serde::Serialize;
use std::collections::HashMap;

/// Label of the synthetic group summing every read.
pub const TOTAL: &str = "Total";

/// One logged page access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRead {
    pub page: u64,
    /// Served from cache without touching the network.
    pub was_cached: bool,
    /// Chunks fetched beyond the page itself.
    pub prefetch: u64,
    /// Wire bytes for a fetch, chunk bytes for a cache hit.
    pub bytes: u64,
    /// Provenance tag of the caller.
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadStat {
    pub reason: String,
    pub request_count: u64,
    pub fetched_bytes: u64,
    pub cached_read_count: u64,
    pub cached_read_bytes: u64,
    pub total_read_count: u64,
}

impl ReadStat {
    fn new(reason: &str) -> Self {
        Self {
            reason: reason.to_string(),
            ..Default::default()
        }
    }

    fn add(&mut self, read: &PageRead) {
        if read.was_cached {
            self.cached_read_count += 1;
            self.cached_read_bytes += read.bytes;
        } else {
            self.request_count += 1;
            self.fetched_bytes += read.bytes;
        }
        self.total_read_count += 1;
    }
}

/// Group reads by reason, add a `Total` group, most fetched bytes first.
pub fn aggregate<'a>(reads: impl IntoIterator<Item = &'a PageRead>) -> Vec<ReadStat> {
    let mut by_reason: HashMap<&str, ReadStat> = HashMap::new();
    let mut total = ReadStat::new(TOTAL);
    for read in reads {
        by_reason
            .entry(read.reason.as_str())
            .or_insert_with(|| ReadStat::new(&read.reason))
            .add(read);
        total.add(read);
    }

    let mut out: Vec<ReadStat> = by_reason.into_values().collect();
    out.push(total);
    out.sort_by(|a, b| {
        b.fetched_bytes
            .cmp(&a.fetched_bytes)
            .then_with(|| (b.reason == TOTAL).cmp(&(a.reason == TOTAL)))
            .then_with(|| a.reason.cmp(&b.reason))
    });
    out
}
