use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Transport
    #[error("couldn't load {url}: status {status}")]
    Status { url: String, status: u16 },

    #[error("{url} ignored the requested byte ranges: status {status} instead of 206")]
    RangesIgnored { url: String, status: u16 },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    // Capability
    #[error("{url} is served with content encoding `{encoding}`, byte ranges are not addressable")]
    Compressed { url: String, encoding: String },

    #[error("{url} does not report its length")]
    UnknownLength { url: String },

    // Protocol limitation
    #[error("a single fetch would span several urls: {}", urls.join(", "))]
    MultipleUrls { urls: Vec<String> },

    // Consistency
    #[error("expected {expected} bytes from the server, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("malformed multipart body at part {part}: {reason}")]
    MalformedMultipart { part: usize, reason: String },

    #[error("internal error: chunk {chunk} is not resident after fetching it")]
    MissingChunk { chunk: u64 },

    // Caller
    #[error("invalid range ({from}, {to}) or no bytes requested")]
    InvalidRange { from: u64, to: u64 },

    #[error("byte {to} requested but only {length} bytes available")]
    OutOfBounds { to: u64, length: u64 },

    #[error("chunk {chunk} requested but the file only has {chunks} chunks")]
    ChunkOutOfRange { chunk: u64, chunks: u64 },

    #[error("destination buffer holds {available} bytes, {needed} needed")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
