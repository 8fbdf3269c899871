//! Range transport (remote side of a `LazyFile`)
//!
//! Submodules:
//! - `http`: blocking reqwest implementation
//! - `memory`: in-process fake server honoring single and multi-range requests
//! - `multipart`: split a multi-range response body into its parts
//!
//! A transport only moves bytes. Range header formatting, status checks and
//! demultiplexing are shared by every backend through [`fetch_ranges`].

pub mod http;
pub mod memory;
pub mod multipart;

use crate::error::{Error, Result};
use bytes::Bytes;
use std::sync::Arc;

/// Where an inclusive byte range of the logical file physically lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRange {
    pub url: String,
    pub from: u64,
    pub to: u64,
}

/// Maps an inclusive byte range of the logical file to a backing url and
/// offsets, which lets one logical file be sharded over several objects.
pub trait RangeMapper: Send + Sync {
    fn map(&self, from: u64, to: u64) -> MappedRange;
}

impl<F> RangeMapper for F
where
    F: Fn(u64, u64) -> MappedRange + Send + Sync,
{
    fn map(&self, from: u64, to: u64) -> MappedRange {
        self(from, to)
    }
}

/// The whole logical file is one url; offsets pass through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleUrl(pub String);

impl SingleUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }
}

impl RangeMapper for SingleUrl {
    fn map(&self, from: u64, to: u64) -> MappedRange {
        MappedRange {
            url: self.0.clone(),
            from,
            to,
        }
    }
}

/// Headers of the capability probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub accept_ranges: Option<String>,
    pub content_encoding: Option<String>,
}

/// Status, content type and raw body of a `GET`.
#[derive(Debug, Clone)]
pub struct RangeResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Blocking request primitives of a remote object store.
pub trait RangeTransport: Send + Sync {
    /// Metadata-only request.
    fn head(&self, url: &str) -> Result<ProbeResponse>;

    /// `GET`, with the given `Range` header value if any.
    fn get(&self, url: &str, range: Option<&str>) -> Result<RangeResponse>;
}

impl<T: RangeTransport + ?Sized> RangeTransport for Arc<T> {
    fn head(&self, url: &str) -> Result<ProbeResponse> {
        (**self).head(url)
    }

    fn get(&self, url: &str, range: Option<&str>) -> Result<RangeResponse> {
        (**self).get(url, range)
    }
}

/// 2xx or 304.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status) || status == 304
}

/// `boundary` parameter of a `multipart/byteranges` content type, `None` for
/// any other content type.
pub fn multipart_boundary(content_type: &str) -> Option<&str> {
    let mut params = content_type.split(';');
    let mime = params.next()?.trim();
    if !mime.eq_ignore_ascii_case("multipart/byteranges") {
        return None;
    }
    params
        .filter_map(|p| p.trim().split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|b| !b.is_empty())
}

/// `bytes=a-b` or `bytes=a-b, c-d, ...`.
pub fn range_header(ranges: &[(u64, u64)]) -> String {
    let parts: Vec<String> = ranges.iter().map(|(from, to)| format!("{from}-{to}")).collect();
    format!("bytes={}", parts.join(", "))
}

/// Fetch inclusive `ranges` of `url` with one request, one buffer per range.
///
/// A single range is sent as a plain range request, unless `whole_object` is
/// set, in which case no `Range` header is sent at all. Several ranges are
/// sent together and the multipart answer is split with the sizes computed
/// here. A ranged request must be answered with `206`; a server that ignores
/// the ranges and sends the whole object is an error, as is any body that
/// does not add up to the requested bytes.
pub fn fetch_ranges(
    transport: &dyn RangeTransport,
    url: &str,
    ranges: &[(u64, u64)],
    whole_object: bool,
) -> Result<Vec<Bytes>> {
    if ranges.is_empty() {
        return Ok(Vec::new());
    }
    for &(from, to) in ranges {
        if from > to {
            return Err(Error::InvalidRange { from, to });
        }
    }
    let sizes: Vec<u64> = ranges.iter().map(|(from, to)| to - from + 1).collect();

    let header = if whole_object && ranges.len() == 1 {
        None
    } else {
        Some(range_header(ranges))
    };
    let response = transport.get(url, header.as_deref())?;
    if !is_success(response.status) {
        return Err(Error::Status {
            url: url.to_string(),
            status: response.status,
        });
    }

    if header.is_some() && response.status != 206 {
        return Err(Error::RangesIgnored {
            url: url.to_string(),
            status: response.status,
        });
    }

    if ranges.len() == 1 {
        let actual = response.body.len() as u64;
        if actual != sizes[0] {
            return Err(Error::SizeMismatch {
                expected: sizes[0],
                actual,
            });
        }
        return Ok(vec![response.body]);
    }
    let content_type = response.content_type.as_deref().unwrap_or_default();
    let boundary = multipart_boundary(content_type).ok_or_else(|| Error::MalformedMultipart {
        part: 0,
        reason: format!("expected multipart/byteranges, got `{content_type}`"),
    })?;
    multipart::demux(&response.body, &sizes, boundary)
}
