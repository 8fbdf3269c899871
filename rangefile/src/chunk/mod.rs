//! Chunk addressing, caching and fetch planning
//!
//! Responsibilities:
//! - Map byte offsets of the remote file to fixed-size chunks (`layout`).
//! - Keep fetched chunks for the lifetime of the session (`store`).
//! - Track concurrent sequential scans to size read-ahead (`head`).
//! - Turn a set of wanted chunks into contiguous fetch windows (`coalesce`).
pub mod coalesce;
pub mod head;
pub mod layout;
pub mod store;

pub use coalesce::{FetchWindow, plan_fetch, split_runs};
pub use head::{ReadHead, ReadHeadPredictor};
pub use layout::{ChunkLayout, ChunkSpan};
pub use store::ChunkStore;
