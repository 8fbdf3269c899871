//! In-process fake object server: url -> bytes, honoring `Range` like an
//! HTTP server would. Used for local development and tests.

use super::multipart;
use super::{ProbeResponse, RangeResponse, RangeTransport};
use crate::error::Result;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const BOUNDARY: &str = "rangefile-memory-boundary";

/// One served object and how the fake server describes it.
#[derive(Debug, Clone)]
pub struct FakeObject {
    pub data: Bytes,
    pub status: u16,
    pub advertise_ranges: bool,
    /// Answer ranged `GET`s with `200` and the whole object.
    pub ignore_ranges: bool,
    pub report_length: bool,
    pub content_encoding: Option<String>,
}

impl FakeObject {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            status: 200,
            advertise_ranges: true,
            ignore_ranges: false,
            report_length: true,
            content_encoding: None,
        }
    }
}

/// A request the fake server received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub range: Option<String>,
}

#[derive(Default)]
pub struct InMemoryTransport {
    objects: Mutex<HashMap<String, FakeObject>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn octets(status: u16, body: Bytes) -> RangeResponse {
    RangeResponse {
        status,
        content_type: Some("application/octet-stream".to_string()),
        body,
    }
}

/// Parse `bytes=a-b, c-d` into inclusive pairs. Suffix and open ranges are
/// not produced by this crate and are rejected.
pub fn parse_range_header(value: &str) -> Option<Vec<(u64, u64)>> {
    let spec = value.trim().strip_prefix("bytes=")?;
    spec.split(',')
        .map(|part| {
            let (from, to) = part.trim().split_once('-')?;
            Some((from.trim().parse().ok()?, to.trim().parse().ok()?))
        })
        .collect()
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, data: impl Into<Bytes>) {
        self.insert_object(url, FakeObject::new(data));
    }

    pub fn insert_object(&self, url: impl Into<String>, object: FakeObject) {
        lock(&self.objects).insert(url.into(), object);
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Number of `GET`s received so far.
    pub fn get_count(&self) -> usize {
        lock(&self.requests).iter().filter(|r| r.method == "GET").count()
    }

    fn record(&self, method: &'static str, url: &str, range: Option<&str>) {
        lock(&self.requests).push(RecordedRequest {
            method,
            url: url.to_string(),
            range: range.map(str::to_string),
        });
    }

    fn serve(object: &FakeObject, range: Option<&str>) -> RangeResponse {
        let len = object.data.len() as u64;
        let range = range.filter(|_| !object.ignore_ranges);
        let Some(range) = range else {
            return octets(200, object.data.clone());
        };
        let Some(ranges) = parse_range_header(range) else {
            return octets(400, Bytes::new());
        };
        let satisfiable: Vec<(u64, u64)> = ranges
            .into_iter()
            .filter(|&(from, to)| from <= to && from < len)
            .map(|(from, to)| (from, to.min(len - 1)))
            .collect();
        match satisfiable.as_slice() {
            [] => octets(416, Bytes::new()),
            [(from, to)] => octets(206, object.data.slice(*from as usize..=*to as usize)),
            many => RangeResponse {
                status: 206,
                content_type: Some(format!("multipart/byteranges; boundary={BOUNDARY}")),
                body: Bytes::from(multipart::encode(&object.data, many, BOUNDARY)),
            },
        }
    }
}

impl RangeTransport for InMemoryTransport {
    fn head(&self, url: &str) -> Result<ProbeResponse> {
        self.record("HEAD", url, None);
        let objects = lock(&self.objects);
        let Some(object) = objects.get(url) else {
            return Ok(ProbeResponse {
                status: 404,
                ..Default::default()
            });
        };
        Ok(ProbeResponse {
            status: object.status,
            content_length: object.report_length.then_some(object.data.len() as u64),
            accept_ranges: object.advertise_ranges.then(|| "bytes".to_string()),
            content_encoding: object.content_encoding.clone(),
        })
    }

    fn get(&self, url: &str, range: Option<&str>) -> Result<RangeResponse> {
        self.record("GET", url, range);
        let objects = lock(&self.objects);
        let response = match objects.get(url) {
            Some(object) if object.status >= 400 => octets(object.status, Bytes::new()),
            Some(object) => Self::serve(object, range),
            None => octets(404, Bytes::new()),
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_header() {
        assert_eq!(parse_range_header("bytes=0-9"), Some(vec![(0, 9)]));
        assert_eq!(
            parse_range_header("bytes=0-9, 20-29,40-41"),
            Some(vec![(0, 9), (20, 29), (40, 41)])
        );
        assert_eq!(parse_range_header("bytes=-9"), None);
        assert_eq!(parse_range_header("items=0-9"), None);
    }

    #[test]
    fn test_serves_ranges_and_records() {
        let t = InMemoryTransport::new();
        t.insert("mem://a", Bytes::from_static(b"0123456789"));

        let probe = t.head("mem://a").unwrap();
        assert_eq!(probe.status, 200);
        assert_eq!(probe.content_length, Some(10));
        assert_eq!(probe.accept_ranges.as_deref(), Some("bytes"));

        let r = t.get("mem://a", Some("bytes=2-4")).unwrap();
        assert_eq!(r.status, 206);
        assert_eq!(&r.body[..], b"234");

        let r = t.get("mem://a", Some("bytes=20-30")).unwrap();
        assert_eq!(r.status, 416);

        let r = t.get("mem://a", None).unwrap();
        assert_eq!(r.status, 200);
        assert_eq!(r.body.len(), 10);

        let r = t.get("mem://a", Some("bytes=0-1, 8-9")).unwrap();
        assert_eq!(r.status, 206);
        assert_eq!(
            r.content_type.as_deref(),
            Some("multipart/byteranges; boundary=rangefile-memory-boundary")
        );

        assert_eq!(t.requests().len(), 5);
        assert_eq!(t.get_count(), 4);
    }

    #[test]
    fn test_unknown_url_is_404() {
        let t = InMemoryTransport::new();
        assert_eq!(t.head("mem://none").unwrap().status, 404);
        assert_eq!(t.get("mem://none", None).unwrap().status, 404);
    }

    #[test]
    fn test_ignore_ranges_sends_whole_object() {
        let t = InMemoryTransport::new();
        let mut object = FakeObject::new(Bytes::from_static(b"0123456789"));
        object.ignore_ranges = true;
        t.insert_object("mem://a", object);
        let r = t.get("mem://a", Some("bytes=2-4, 6-7")).unwrap();
        assert_eq!(r.status, 200);
        assert_eq!(&r.body[..], b"0123456789");
    }
}
