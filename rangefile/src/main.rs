use anyhow::{Context, bail};
use clap::Parser;
use rangefile::transport::http::{HttpConfig, HttpTransport};
use rangefile::util::format_bytes;
use rangefile::{LazyFile, LazyFileConfig, SingleUrl};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Read a byte range of a remote file over HTTP range requests", long_about = None)]
struct Args {
    /// Remote file url
    url: String,

    /// First byte to read
    #[arg(long, default_value_t = 0)]
    offset: u64,

    /// Bytes to read, defaults to the rest of the file
    #[arg(long)]
    length: Option<u64>,

    /// Chunk size in bytes
    #[arg(long, env = "RANGEFILE_CHUNK_SIZE", default_value_t = 64 * 1024)]
    chunk_size: u64,

    /// Read-ahead hint in bytes for the first fetch
    #[arg(long, default_value_t = 0)]
    prefetch: u64,

    /// Number of sequential streams tracked
    #[arg(long, env = "RANGEFILE_MAX_READ_HEADS", default_value_t = rangefile::config::DEFAULT_MAX_READ_HEADS)]
    max_read_heads: usize,

    /// Largest single fetch in bytes
    #[arg(long, env = "RANGEFILE_MAX_READ_SPEED", default_value_t = rangefile::config::DEFAULT_MAX_READ_SPEED)]
    max_read_speed: u64,

    /// Chunks to fetch in one batch before reading
    #[arg(long, value_delimiter = ',')]
    prefetch_chunks: Vec<u64>,

    /// Request timeout in seconds, 0 to wait forever
    #[arg(long, env = "RANGEFILE_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print the read report as JSON to stderr
    #[arg(long)]
    stats: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();
    let args = Args::parse();

    let transport = HttpTransport::with_config(HttpConfig {
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        user_agent: None,
    })
    .context("failed to build http client")?;
    let config = LazyFileConfig::new(args.chunk_size)
        .with_max_read_heads(args.max_read_heads)
        .with_max_read_speed(args.max_read_speed)
        .with_log_page_reads(args.stats);
    let mut file = LazyFile::new(SingleUrl::new(&args.url), Arc::new(transport), config)
        .context("invalid configuration")?;

    let total = file
        .length()
        .with_context(|| format!("failed to probe {}", args.url))?;
    if args.offset > total {
        bail!("offset {} is past the end of the file ({total} bytes)", args.offset);
    }
    let length = args.length.unwrap_or(total - args.offset).min(total - args.offset);

    if !args.prefetch_chunks.is_empty() {
        file.set_reason("prefetch");
        file.ensure_chunks_cached(&args.prefetch_chunks)
            .context("failed to prefetch chunks")?;
    }

    file.set_reason("read");
    let length = length as usize;
    let mut buf = vec![0u8; length];
    let read = file
        .copy_into(&mut buf, 0, length, args.offset, args.prefetch)
        .with_context(|| format!("failed to read {length} bytes at {}", args.offset))?;
    buf.truncate(read);

    match &args.output {
        Some(path) => {
            let mut out = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            out.write_all(&buf)?;
        }
        None => io::stdout().lock().write_all(&buf)?,
    }
    info!(
        "read {} bytes in {} request(s), {} fetched, {} cached",
        read,
        file.total_requests(),
        format_bytes(file.total_fetched_bytes()),
        format_bytes(file.resident_bytes())
    );

    if args.stats {
        let report = serde_json::to_string_pretty(&file.read_stats())?;
        eprintln!("{report}");
    }
    Ok(())
}
