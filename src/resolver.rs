//! Resolution of VAST markup to a playable media file.
//!
//! Markup from an envelope is either a wrapper pointing elsewhere or a
//! complete VAST document. [`VastChainResolver`] picks the entry point,
//! follows wrappers through [`unwrap_chain`], and projects the media URL,
//! click-through and companions out of whatever it ends up with.

use crate::cancel::CancelToken;
use crate::companions::extract_companions;
use crate::config::ResolverConfig;
use crate::entities;
use crate::error::ResolutionError;
use crate::fetch::{HttpFetcher, VastFetcher};
use crate::models::{MediaSource, ResolutionResult, VastNode};
use crate::parser;
use crate::unwrap::{select_media, unwrap_chain, TerminalAd};
use log::{debug, info, warn};
use regex::Regex;
use std::sync::LazyLock;

/// Stands in for a URI in errors about markup the caller supplied inline.
pub const SUPPLIED_MARKUP: &str = "(supplied markup)";

static AD_TAG_URI_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        pattern(r"(?i)<VASTAdTagURI>[ \t]*<!\[CDATA\[(.*?)\]\]>[ \t]*</VASTAdTagURI>"),
        pattern(r"(?i)<VASTAdTagURI>(.*?)</VASTAdTagURI>"),
    ]
});

static MEDIA_TAG_PATTERNS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        pattern(r"(?i)<MediaFile(?:\s[^>]*)?>\s*<!\[CDATA\[(.*?)\]\]>\s*</MediaFile>"),
        pattern(r"(?i)<MediaFile(?:\s[^>]*)?>([^<]*)</MediaFile>"),
        pattern(r"(?i)<URL(?:\s[^>]*)?>\s*<!\[CDATA\[(.*?)\]\]>\s*</URL>"),
        pattern(r"(?i)<URL(?:\s[^>]*)?>([^<]*)</URL>"),
    ]
});

static CLICK_TAG_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        pattern(r"(?i)<ClickThrough(?:\s[^>]*)?>\s*<!\[CDATA\[(.*?)\]\]>\s*</ClickThrough>"),
        pattern(r"(?i)<ClickThrough(?:\s[^>]*)?>([^<]*)</ClickThrough>"),
    ]
});

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("static pattern is valid")
}

/// What to resolve: a URI to fetch, or markup to inspect first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VastInput<'a> {
    Uri(&'a str),
    Markup(&'a str),
}

impl<'a> VastInput<'a> {
    pub fn new(value: &'a str, is_uri: bool) -> Self {
        if is_uri {
            Self::Uri(value)
        } else {
            Self::Markup(value)
        }
    }
}

/// Where resolution ended up before projecting results.
enum Located<'a> {
    Chain(TerminalAd),
    /// Well-formed markup holding an InLine ad
    Inline(&'a str),
    /// Markup that is neither a wrapper nor a well-formed InLine document
    Other(&'a str),
}

/// Resolves VAST markup or URIs to a media URL, click-through and companions.
///
/// Holds no per-resolution state; one resolver can serve any number of
/// sequential calls.
#[derive(Debug, Clone)]
pub struct VastChainResolver<F = HttpFetcher> {
    fetcher: F,
    config: ResolverConfig,
}

impl VastChainResolver<HttpFetcher> {
    /// Resolver with its own blocking HTTP client.
    pub fn new(config: ResolverConfig) -> Result<Self, ResolutionError> {
        let fetcher = HttpFetcher::new(&config.user_agent)
            .map_err(|e| ResolutionError::Client(e.to_string()))?;
        Ok(Self { fetcher, config })
    }
}

impl<F: VastFetcher> VastChainResolver<F> {
    pub fn with_fetcher(fetcher: F, config: ResolverConfig) -> Self {
        Self { fetcher, config }
    }

    pub fn resolve_media(&self, input: VastInput<'_>) -> Result<ResolutionResult, ResolutionError> {
        self.resolve_media_cancellable(input, None)
    }

    /// Resolve `input` to its media URL, click-through and companions.
    ///
    /// `cancel` is checked between hops of the wrapper chain.
    pub fn resolve_media_cancellable(
        &self,
        input: VastInput<'_>,
        cancel: Option<&CancelToken>,
    ) -> Result<ResolutionResult, ResolutionError> {
        let result = match self.locate(input, cancel)? {
            Located::Chain(terminal) => {
                let media_url = terminal.media_url()?;
                let click_through_url = terminal.click_through()?;

                let mut companions = extract_companions(&terminal.document);
                if companions.is_empty() {
                    if let VastInput::Markup(markup) = input {
                        companions = extract_companions(markup);
                    }
                }

                ResolutionResult {
                    media_url,
                    click_through_url,
                    companions,
                    hops: terminal.hops(),
                    chain: terminal.chain,
                    source: MediaSource::WrapperChain,
                }
            }
            Located::Inline(markup) => {
                let media_url =
                    direct_media(markup).ok_or_else(|| ResolutionError::NoMp4MediaFile {
                        depth: 0,
                        uri: SUPPLIED_MARKUP.to_string(),
                    })?;
                direct_result(markup, media_url, MediaSource::DirectVast)
            }
            Located::Other(markup) => match direct_media(markup) {
                Some(url) => direct_result(markup, url, MediaSource::DirectVast),
                None => {
                    let url = scan_media_tags(markup).ok_or(ResolutionError::NoMediaFound)?;
                    direct_result(markup, url, MediaSource::TextScan)
                }
            },
        };

        info!(
            "Resolved media {} via {:?} after {} fetch(es)",
            result.media_url, result.source, result.hops
        );
        Ok(result)
    }

    pub fn resolve_click_through(
        &self,
        input: VastInput<'_>,
    ) -> Result<Option<String>, ResolutionError> {
        self.resolve_click_through_cancellable(input, None)
    }

    /// Resolve only the click-through URL of the terminal InLine ad.
    pub fn resolve_click_through_cancellable(
        &self,
        input: VastInput<'_>,
        cancel: Option<&CancelToken>,
    ) -> Result<Option<String>, ResolutionError> {
        match self.locate(input, cancel)? {
            Located::Chain(terminal) => terminal.click_through(),
            Located::Inline(markup) | Located::Other(markup) => Ok(direct_click_through(markup)),
        }
    }

    fn locate<'a>(
        &self,
        input: VastInput<'a>,
        cancel: Option<&CancelToken>,
    ) -> Result<Located<'a>, ResolutionError> {
        let markup = match input {
            VastInput::Uri(uri) => return self.walk(uri, cancel),
            VastInput::Markup(markup) => markup,
        };

        if let Some(uri) = find_ad_tag_uri(markup) {
            debug!("Found VAST XML URL (wrapper): {}", uri);
            return self.walk(&uri, cancel);
        }

        debug!("No VASTAdTagURI found, treating markup as a direct VAST document");
        match parser::parse_vast(markup) {
            Ok(vast) => match VastNode::from_document(vast) {
                Some(VastNode::Wrapper(wrapper)) => {
                    let uri = wrapper
                        .vast_ad_tag_uri
                        .ok_or_else(|| ResolutionError::MissingAdTagUri {
                            depth: 0,
                            uri: SUPPLIED_MARKUP.to_string(),
                        })?;
                    self.walk(&uri, cancel)
                }
                Some(VastNode::InLine(_)) => Ok(Located::Inline(markup)),
                None => Ok(Located::Other(markup)),
            },
            Err(e) => {
                debug!("Markup is not well-formed VAST: {}", e);
                Ok(Located::Other(markup))
            }
        }
    }

    fn walk<'a>(
        &self,
        uri: &str,
        cancel: Option<&CancelToken>,
    ) -> Result<Located<'a>, ResolutionError> {
        unwrap_chain(&self.fetcher, &self.config, cancel, uri).map(Located::Chain)
    }
}

/// Strict scan for a `VASTAdTagURI` on a single line, CDATA form first.
/// The value is entity-decoded; empty values are ignored.
pub fn find_ad_tag_uri(markup: &str) -> Option<String> {
    AD_TAG_URI_PATTERNS.iter().find_map(|re| {
        re.captures_iter(markup)
            .map(|caps| entities::unescape(strip_cdata(&caps[1])))
            .find(|uri| !uri.is_empty())
    })
}

fn direct_result(markup: &str, media_url: String, source: MediaSource) -> ResolutionResult {
    ResolutionResult {
        media_url,
        click_through_url: direct_click_through(markup),
        companions: extract_companions(markup),
        hops: 0,
        chain: Vec::new(),
        source,
    }
}

/// Best mp4 among every `MediaFile` of well-formed markup.
fn direct_media(markup: &str) -> Option<String> {
    match parser::scan_media_files(markup) {
        Ok(files) => {
            let url = select_media(&files).map(|file| file.url.clone());
            if url.is_none() {
                debug!("No mp4 MediaFile among {} direct candidate(s)", files.len());
            }
            url
        }
        Err(e) => {
            warn!("Error parsing markup for MediaFile elements: {}", e);
            None
        }
    }
}

/// Last-resort text scan for `MediaFile` or `URL` tags in markup that
/// could not be parsed. Accepts URLs ending in `.mp4` or mentioning video.
pub fn scan_media_tags(markup: &str) -> Option<String> {
    let found = MEDIA_TAG_PATTERNS.iter().find_map(|re| {
        re.captures_iter(markup)
            .map(|caps| entities::unescape(strip_cdata(&caps[1])))
            .find(|url| {
                !url.is_empty()
                    && !url.contains('<')
                    && (url.ends_with(".mp4") || url.contains("video"))
            })
    });
    if let Some(url) = &found {
        warn!("Recovered media URL by text scan: {}", url);
    }
    found
}

fn direct_click_through(markup: &str) -> Option<String> {
    match parser::scan_text(markup, b"ClickThrough") {
        Ok(urls) => urls.into_iter().find(|url| !url.is_empty()),
        Err(_) => scan_click_tags(markup),
    }
}

/// Text-scan counterpart of the `ClickThrough` lookup.
pub fn scan_click_tags(markup: &str) -> Option<String> {
    CLICK_TAG_PATTERNS.iter().find_map(|re| {
        re.captures_iter(markup)
            .map(|caps| entities::unescape(strip_cdata(&caps[1])))
            .find(|url| !url.is_empty())
    })
}

fn strip_cdata(text: &str) -> &str {
    let text = text.trim();
    text.strip_prefix("<![CDATA[")
        .and_then(|inner| inner.strip_suffix("]]>"))
        .unwrap_or(text)
        .trim()
}
