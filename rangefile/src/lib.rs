//! rangefile: read an immutable remote file as if it were local.
//!
//! Reads are served from a sparse chunk cache; misses are turned into HTTP
//! byte-range requests whose width is chosen by a small set of virtual read
//! heads that detect sequential scans. Everything is synchronous: a call
//! returns only once every byte it needs is resident.
//!
//! Modules:
//! - `chunk`: chunk layout, cache, read-head predictor and range coalescing
//! - `transport`: range transport trait, reqwest and in-memory backends,
//!   multipart demultiplexing
//! - `file`: the `LazyFile` façade for one remote file
//! - `registry`: process-wide URL -> `LazyFile` map
//! - `stats`: read log and aggregated read statistics

pub mod chunk;
pub mod config;
pub mod error;
pub mod file;
pub mod registry;
pub mod stats;
pub mod transport;
pub mod util;

pub use config::LazyFileConfig;
pub use error::{Error, Result};
pub use file::LazyFile;
pub use registry::{FileDefaults, FileRegistry, SharedFile};
pub use stats::{PageRead, ReadStat};
pub use transport::{MappedRange, RangeMapper, RangeTransport, SingleUrl};
