//! Split a `multipart/byteranges` body into its parts.
//!
//! Part headers are not parsed. The payload of each part starts right after
//! the next blank line (`CR LF CR LF`) and its length is the size the caller
//! asked for, so the payload itself may contain any byte sequence. Every
//! payload must be followed by the boundary delimiter, the last one by the
//! closing delimiter; a part of another size shows up as a misplaced
//! delimiter.

use crate::error::{Error, Result};
use bytes::Bytes;

pub const TERMINATOR: &[u8] = b"\r\n\r\n";

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Cut `body` into one buffer per entry of `sizes`, in order.
pub fn demux(body: &Bytes, sizes: &[u64], boundary: &str) -> Result<Vec<Bytes>> {
    let delimiter = format!("\r\n--{boundary}").into_bytes();
    let mut pos = 0usize;
    // stray blank lines ahead of the first boundary
    while body[pos..].starts_with(TERMINATOR) {
        pos += TERMINATOR.len();
    }

    let mut parts = Vec::with_capacity(sizes.len());
    for (part, &size) in sizes.iter().enumerate() {
        let header_len = find(&body[pos..], TERMINATOR).ok_or_else(|| Error::MalformedMultipart {
            part,
            reason: "no header terminator".to_string(),
        })?;
        let start = pos + header_len + TERMINATOR.len();
        let end = start.saturating_add(size as usize);
        if end > body.len() || !body[end..].starts_with(&delimiter) {
            let actual = find(&body[start..], &delimiter).unwrap_or(body.len() - start);
            return Err(Error::SizeMismatch {
                expected: size,
                actual: actual as u64,
            });
        }
        parts.push(body.slice(start..end));
        pos = end;
    }

    let closing = pos + delimiter.len();
    if !body[closing..].starts_with(b"--") {
        return Err(Error::MalformedMultipart {
            part: sizes.len(),
            reason: format!("more parts than the {} requested", sizes.len()),
        });
    }
    Ok(parts)
}

/// Build a `multipart/byteranges` body for `(from, to)` inclusive ranges of
/// `data`, as a range-capable server would answer.
pub fn encode(data: &[u8], ranges: &[(u64, u64)], boundary: &str) -> Vec<u8> {
    let total = data.len();
    let mut out = Vec::new();
    for &(from, to) in ranges {
        out.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
        out.extend_from_slice(b"Content-Type: application/octet-stream\r\n");
        out.extend_from_slice(format!("Content-Range: bytes {from}-{to}/{total}").as_bytes());
        out.extend_from_slice(TERMINATOR);
        out.extend_from_slice(&data[from as usize..=to as usize]);
    }
    out.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(len: usize, seed: u8) -> Vec<u8> {
        (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
    }

    #[test]
    fn test_demux_known_parts() {
        let data = payload(4096, 3);
        let ranges = [(0u64, 99u64), (1000, 1999), (4000, 4095)];
        let body = Bytes::from(encode(&data, &ranges, "3d6b6a416f9b5"));
        let sizes: Vec<u64> = ranges.iter().map(|(f, t)| t - f + 1).collect();

        let parts = demux(&body, &sizes, "3d6b6a416f9b5").unwrap();
        assert_eq!(parts.len(), 3);
        for (part, &(from, to)) in parts.iter().zip(ranges.iter()) {
            assert_eq!(&part[..], &data[from as usize..=to as usize]);
        }
    }

    #[test]
    fn test_payload_may_contain_terminator() {
        let mut data = payload(64, 9);
        data[10..14].copy_from_slice(TERMINATOR);
        data[40..44].copy_from_slice(TERMINATOR);
        let ranges = [(8u64, 20u64), (38, 50)];
        let body = Bytes::from(encode(&data, &ranges, "b"));
        let parts = demux(&body, &[13, 13], "b").unwrap();
        assert_eq!(&parts[0][..], &data[8..=20]);
        assert_eq!(&parts[1][..], &data[38..=50]);
    }

    #[test]
    fn test_leading_stray_terminators_skipped() {
        let data = payload(32, 1);
        let mut body = Vec::new();
        body.extend_from_slice(TERMINATOR);
        body.extend_from_slice(TERMINATOR);
        body.extend_from_slice(&encode(&data, &[(0, 7), (16, 23)], "x"));
        let parts = demux(&Bytes::from(body), &[8, 8], "x").unwrap();
        assert_eq!(&parts[0][..], &data[0..8]);
        assert_eq!(&parts[1][..], &data[16..24]);
    }

    #[test]
    fn test_truncated_body() {
        let data = payload(32, 1);
        let mut body = encode(&data, &[(0, 7), (16, 23)], "x");
        // drop the closing boundary and half of the last payload
        body.truncate(body.len() - "\r\n--x--\r\n".len() - 4);
        let err = demux(&Bytes::from(body), &[8, 8], "x").unwrap_err();
        assert!(matches!(
            err,
            Error::SizeMismatch {
                expected: 8,
                actual: 4
            }
        ));
    }

    #[test]
    fn test_missing_terminator() {
        let body = Bytes::from_static(b"--x\r\nContent-Type: a\r\n");
        let err = demux(&body, &[4], "x").unwrap_err();
        assert!(matches!(err, Error::MalformedMultipart { part: 0, .. }));
    }

    #[test]
    fn test_whole_object_is_not_multipart() {
        // a server ignoring the ranges: blank lines in the data look like part headers
        let mut data = payload(256, 5);
        data[20..24].copy_from_slice(TERMINATOR);
        data[100..104].copy_from_slice(TERMINATOR);
        let err = demux(&Bytes::from(data), &[16, 16], "x").unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { expected: 16, .. }));
    }

    #[test]
    fn test_extra_parts_rejected() {
        let data = payload(64, 2);
        let body = encode(&data, &[(0, 7), (16, 23), (40, 47)], "x");
        let err = demux(&Bytes::from(body), &[8, 8], "x").unwrap_err();
        assert!(matches!(err, Error::MalformedMultipart { part: 2, .. }));
    }
}
