//! Ad-creative markup parsing and VAST wrapper-chain resolution.
//!
//! [`markup::AdMarkupParser`] pulls the creative out of a vendor envelope;
//! [`resolver::VastChainResolver`] turns VAST creatives into a playable
//! media URL by following wrapper redirects.

pub mod cancel;
pub mod companions;
pub mod config;
pub mod entities;
pub mod error;
pub mod fetch;
pub mod format;
pub mod markup;
pub mod models;
pub mod parser;
pub mod resolver;
pub mod unwrap;

pub use cancel::CancelToken;
pub use config::ResolverConfig;
pub use error::{ErrorKind, FetchError, ParseError, ResolutionError, VastError};
pub use fetch::{FetchResponse, HttpFetcher, VastFetcher};
pub use markup::{parse_ad_markup, AdMarkupParser};
pub use models::{CompanionAd, CreativeType, MediaSource, ParsedCreative, ResolutionResult};
pub use resolver::{VastChainResolver, VastInput};

/// Entry points for async callers.
///
/// Resolution blocks on HTTP, so each call runs on tokio's blocking pool with
/// its own resolver. Independent calls can be awaited concurrently.
pub mod async_api {
    use crate::cancel::CancelToken;
    use crate::config::ResolverConfig;
    use crate::error::{FetchError, ResolutionError};
    use crate::fetch::{HttpFetcher, VastFetcher};
    use crate::models::ResolutionResult;
    use crate::resolver::{VastChainResolver, VastInput};
    use std::time::Duration;

    /// Resolve `value` (a VAST URI when `is_uri`, otherwise markup).
    pub async fn resolve(
        value: String,
        is_uri: bool,
        config: ResolverConfig,
        cancel: CancelToken,
    ) -> Result<ResolutionResult, ResolutionError> {
        tokio::task::spawn_blocking(move || {
            let resolver = VastChainResolver::new(config)?;
            resolver.resolve_media_cancellable(VastInput::new(&value, is_uri), Some(&cancel))
        })
        .await
        .map_err(|e| ResolutionError::Task(e.to_string()))?
    }

    /// GET a single document, returning its body on HTTP 200.
    pub async fn fetch_document(
        uri: String,
        user_agent: String,
        timeout: Duration,
    ) -> Result<String, FetchError> {
        tokio::task::spawn_blocking(move || {
            let response = HttpFetcher::new(&user_agent)?.fetch(&uri, timeout)?;
            if response.status != 200 {
                return Err(FetchError::Request(format!(
                    "Failed to fetch URL: HTTP status {}",
                    response.status
                )));
            }
            Ok(response.body)
        })
        .await
        .map_err(|e| FetchError::Request(e.to_string()))?
    }
}
