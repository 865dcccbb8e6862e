use crate::cancel::CancelToken;
use crate::config::ResolverConfig;
use crate::error::ResolutionError;
use crate::fetch::VastFetcher;
use crate::models::{InLine, Linear, MediaFile, VastNode};
use crate::parser;
use log::{debug, info};
use std::time::Instant;

/// The InLine ad at the end of a wrapper chain, with the path that led to it.
#[derive(Debug, Clone)]
pub struct TerminalAd {
    pub inline: InLine,

    /// Raw body of the document holding the InLine
    pub document: String,

    /// Fetched URIs in order; the last one served `document`
    pub chain: Vec<String>,
}

impl TerminalAd {
    /// Number of documents fetched to reach this ad.
    pub fn hops(&self) -> usize {
        self.chain.len()
    }

    fn depth(&self) -> usize {
        self.chain.len().saturating_sub(1)
    }

    fn uri(&self) -> String {
        self.chain.last().cloned().unwrap_or_default()
    }

    fn linear(&self) -> Result<&Linear, ResolutionError> {
        self.inline
            .first_linear()
            .ok_or_else(|| ResolutionError::MissingLinear {
                depth: self.depth(),
                uri: self.uri(),
            })
    }

    /// URL of the highest-bitrate mp4 file of the first Linear creative.
    pub fn media_url(&self) -> Result<String, ResolutionError> {
        let linear = self.linear()?;
        select_media(&linear.media_files)
            .map(|file| file.url.clone())
            .ok_or_else(|| ResolutionError::NoMp4MediaFile {
                depth: self.depth(),
                uri: self.uri(),
            })
    }

    /// `VideoClicks/ClickThrough` of the first Linear creative.
    pub fn click_through(&self) -> Result<Option<String>, ResolutionError> {
        let linear = self.linear()?;
        Ok(linear
            .video_clicks
            .as_ref()
            .and_then(|clicks| clicks.click_through.clone()))
    }
}

/// Highest-bitrate playable mp4 among `files`. Files without a usable
/// bitrate rank as 0; on equal bitrates the earlier file wins.
pub fn select_media(files: &[MediaFile]) -> Option<&MediaFile> {
    let mut candidates: Vec<&MediaFile> = files
        .iter()
        .filter(|file| file.is_mp4() && !file.url.is_empty())
        .collect();
    candidates.sort_by(|a, b| b.effective_bitrate().cmp(&a.effective_bitrate()));
    candidates.into_iter().next()
}

/// Follow Wrapper ads from `start_uri` until an InLine ad is found.
///
/// At most `config.max_wrapper_hops` documents are fetched; needing another
/// one fails with [`ResolutionError::HopLimitExceeded`] without fetching it.
/// Cancellation and the overall deadline are checked before each fetch.
/// Nothing is retried: the first failed fetch or malformed document ends the
/// walk.
pub fn unwrap_chain<F: VastFetcher + ?Sized>(
    fetcher: &F,
    config: &ResolverConfig,
    cancel: Option<&CancelToken>,
    start_uri: &str,
) -> Result<TerminalAd, ResolutionError> {
    let started = Instant::now();
    let mut uri = start_uri.trim().to_string();
    let mut chain: Vec<String> = Vec::new();

    loop {
        let depth = chain.len();

        if depth >= config.max_wrapper_hops {
            return Err(ResolutionError::HopLimitExceeded {
                depth,
                limit: config.max_wrapper_hops,
                uri,
            });
        }

        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(ResolutionError::Cancelled { depth });
        }

        let timeout = match config.overall_deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_sub(started.elapsed());
                if remaining.is_zero() {
                    return Err(ResolutionError::DeadlineExceeded { depth, deadline });
                }
                remaining.min(config.request_timeout)
            }
            None => config.request_timeout,
        };

        debug!("Processing VAST chain level {}: {}", depth, uri);

        let response = fetcher
            .fetch(&uri, timeout)
            .map_err(|source| ResolutionError::Network {
                depth,
                uri: uri.clone(),
                source,
            })?;
        chain.push(uri.clone());

        if response.status != 200 {
            return Err(ResolutionError::HttpStatus {
                depth,
                uri,
                status: response.status,
            });
        }

        let vast = parser::parse_vast(&response.body).map_err(|e| ResolutionError::InvalidXml {
            depth,
            uri: uri.clone(),
            detail: e.to_string(),
        })?;

        match VastNode::from_document(vast) {
            Some(VastNode::InLine(inline)) => {
                info!(
                    "Found InLine VAST after {} fetch(es){}",
                    chain.len(),
                    inline
                        .ad_system
                        .as_ref()
                        .map(|system| format!(" from {}", system.name))
                        .unwrap_or_default()
                );
                return Ok(TerminalAd {
                    inline,
                    document: response.body,
                    chain,
                });
            }
            Some(VastNode::Wrapper(wrapper)) => {
                let next = wrapper
                    .vast_ad_tag_uri
                    .ok_or_else(|| ResolutionError::MissingAdTagUri {
                        depth,
                        uri: uri.clone(),
                    })?;
                debug!("Found Wrapper {}, following {}", depth + 1, next);
                uri = next;
            }
            None => return Err(ResolutionError::NeitherInLineNorWrapper { depth, uri }),
        }
    }
}
