use crate::error::FetchError;
use log::{debug, warn};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use std::time::{Duration, Instant};

/// Body and status of a fetched VAST document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Capability to GET a VAST document.
///
/// Implementations return the response whatever its status; the resolver
/// decides which statuses are acceptable. Only transport-level failures are
/// errors.
pub trait VastFetcher {
    fn fetch(&self, uri: &str, timeout: Duration) -> Result<FetchResponse, FetchError>;
}

impl<T: VastFetcher + ?Sized> VastFetcher for &T {
    fn fetch(&self, uri: &str, timeout: Duration) -> Result<FetchResponse, FetchError> {
        (**self).fetch(uri, timeout)
    }
}

/// [`VastFetcher`] backed by a blocking reqwest client.
///
/// Must not be created or used from within an async context; see
/// [`crate::async_api`] for async callers.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Request(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl VastFetcher for HttpFetcher {
    fn fetch(&self, uri: &str, timeout: Duration) -> Result<FetchResponse, FetchError> {
        // Random request ID for tracking in logs
        let req_id: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();

        let url = url::Url::parse(uri)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
        }

        debug!("[{}] Fetching {} (timeout {:?})", req_id, url, timeout);
        let start_time = Instant::now();

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|e| {
                warn!("[{}] Request failed after {:?}: {}", req_id, start_time.elapsed(), e);
                if e.is_timeout() {
                    FetchError::Timeout(timeout)
                } else {
                    FetchError::Request(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        debug!("[{}] HTTP {} in {:?}", req_id, status, start_time.elapsed());

        let body = response.text().map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::Body(e.to_string())
            }
        })?;

        debug!(
            "[{}] Read {} bytes, total {:?}",
            req_id,
            body.len(),
            start_time.elapsed()
        );

        Ok(FetchResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_schemes_without_io() {
        let fetcher = HttpFetcher::new("test").unwrap();
        let err = fetcher
            .fetch("file:///etc/hosts", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, FetchError::UnsupportedScheme(ref s) if s == "file"));

        let err = fetcher.fetch("not a uri", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FetchError::InvalidUri(_)));
    }
}
