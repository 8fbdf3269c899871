//! HTTP(S) transport on top of the blocking reqwest client.

use super::{ProbeResponse, RangeResponse, RangeTransport};
use crate::error::Result;
use reqwest::blocking::Client;
use reqwest::header::{
    ACCEPT_RANGES, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, RANGE,
};
use std::time::Duration;

/// Client options. Timeouts belong to the transport; the engine never retries.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-request timeout, `None` to wait forever.
    pub timeout: Option<Duration>,
    pub user_agent: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            user_agent: None,
        }
    }
}

pub struct HttpTransport {
    client: Client,
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        Self::with_config(HttpConfig::default())
    }

    pub fn with_config(config: HttpConfig) -> Result<Self> {
        let user_agent = config
            .user_agent
            .unwrap_or_else(|| concat!("rangefile/", env!("CARGO_PKG_VERSION")).to_string());
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }
}

impl RangeTransport for HttpTransport {
    fn head(&self, url: &str) -> Result<ProbeResponse> {
        let response = self.client.head(url).send()?;
        let headers = response.headers();
        // read the header itself: the body size hint of a HEAD response is zero
        let content_length = header_str(headers, CONTENT_LENGTH).and_then(|v| v.parse::<u64>().ok());
        Ok(ProbeResponse {
            status: response.status().as_u16(),
            content_length,
            accept_ranges: header_str(headers, ACCEPT_RANGES),
            content_encoding: header_str(headers, CONTENT_ENCODING),
        })
    }

    fn get(&self, url: &str, range: Option<&str>) -> Result<RangeResponse> {
        let mut request = self.client.get(url);
        if let Some(range) = range {
            request = request.header(RANGE, range);
        }
        let response = request.send()?;
        let status = response.status().as_u16();
        let content_type = header_str(response.headers(), CONTENT_TYPE);
        let body = response.bytes()?;
        Ok(RangeResponse {
            status,
            content_type,
            body,
        })
    }
}
