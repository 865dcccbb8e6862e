use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when parsing VAST XML
#[derive(Error, Debug)]
pub enum VastError {
    #[error("Failed to parse XML: {0}")]
    XmlParseError(#[from] quick_xml::Error),

    #[error("Unexpected end of file inside <{0}>")]
    UnexpectedEof(String),
}

pub type Result<T> = std::result::Result<T, VastError>;

/// Errors returned by the ad markup parser.
///
/// None of these are fatal to the caller; a preview UI typically falls back
/// to showing the raw markup.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("no content provided")]
    Empty,

    #[error("xml parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("xml parsing error: unexpected end of document inside <{0}>")]
    UnexpectedEof(String),

    #[error("no Ad element found")]
    NoAdElement,

    #[error("no CDATA content found")]
    NoPayload,
}

/// Errors raised by a [`VastFetcher`](crate::fetch::VastFetcher).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid uri: {0}")]
    InvalidUri(#[from] url::ParseError),

    #[error("unsupported uri scheme: {0}")]
    UnsupportedScheme(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Coarse classification of a [`ResolutionError`] for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The next document could not be retrieved.
    Network,
    /// A document was retrieved but is not usable VAST.
    InvalidVast,
    /// The wrapper chain is longer than the configured limit.
    HopLimit,
    /// Nothing playable was found in the supplied markup.
    NoMedia,
    /// The caller cancelled the walk or its deadline passed.
    Cancelled,
    /// The resolver itself could not run.
    Internal,
}

/// Errors raised while walking a VAST wrapper chain.
///
/// Every chain error carries the zero-based hop `depth` at which it happened
/// and the `uri` of the document involved, so a misconfigured ad tag can be
/// traced without re-running the walk.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("exceeded maximum wrapper redirects ({limit}) at depth {depth}, next uri: {uri}")]
    HopLimitExceeded {
        depth: usize,
        limit: usize,
        uri: String,
    },

    #[error("failed to fetch vast xml: {status} (depth {depth}, {uri})")]
    HttpStatus {
        depth: usize,
        uri: String,
        status: u16,
    },

    #[error("could not reach network (depth {depth}, {uri}): {source}")]
    Network {
        depth: usize,
        uri: String,
        #[source]
        source: FetchError,
    },

    #[error("invalid xml (depth {depth}, {uri}): {detail}")]
    InvalidXml {
        depth: usize,
        uri: String,
        detail: String,
    },

    #[error("InLine VAST does not contain a Linear creative (depth {depth}, {uri})")]
    MissingLinear { depth: usize, uri: String },

    #[error("no mp4 MediaFile found in InLine VAST (depth {depth}, {uri})")]
    NoMp4MediaFile { depth: usize, uri: String },

    #[error("Wrapper VAST does not contain a VASTAdTagURI (depth {depth}, {uri})")]
    MissingAdTagUri { depth: usize, uri: String },

    #[error("VAST XML contains neither InLine nor Wrapper Ad element (depth {depth}, {uri})")]
    NeitherInLineNorWrapper { depth: usize, uri: String },

    #[error("no playable media found in markup")]
    NoMediaFound,

    #[error("resolution cancelled before hop {depth}")]
    Cancelled { depth: usize },

    #[error("overall deadline of {deadline:?} exceeded before hop {depth}")]
    DeadlineExceeded { depth: usize, deadline: Duration },

    #[error("failed to build http client: {0}")]
    Client(String),

    #[error("resolver task failed: {0}")]
    Task(String),
}

impl ResolutionError {
    /// Hop depth at which the error occurred, if it came from the chain walk.
    pub fn depth(&self) -> Option<usize> {
        match self {
            Self::HopLimitExceeded { depth, .. }
            | Self::HttpStatus { depth, .. }
            | Self::Network { depth, .. }
            | Self::InvalidXml { depth, .. }
            | Self::MissingLinear { depth, .. }
            | Self::NoMp4MediaFile { depth, .. }
            | Self::MissingAdTagUri { depth, .. }
            | Self::NeitherInLineNorWrapper { depth, .. }
            | Self::Cancelled { depth }
            | Self::DeadlineExceeded { depth, .. } => Some(*depth),
            Self::NoMediaFound | Self::Client(_) | Self::Task(_) => None,
        }
    }

    /// URI of the document involved, if any.
    pub fn uri(&self) -> Option<&str> {
        match self {
            Self::HopLimitExceeded { uri, .. }
            | Self::HttpStatus { uri, .. }
            | Self::Network { uri, .. }
            | Self::InvalidXml { uri, .. }
            | Self::MissingLinear { uri, .. }
            | Self::NoMp4MediaFile { uri, .. }
            | Self::MissingAdTagUri { uri, .. }
            | Self::NeitherInLineNorWrapper { uri, .. } => Some(uri),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::HttpStatus { .. } => ErrorKind::Network,
            Self::Network { source, .. } => match source {
                FetchError::InvalidUri(_) | FetchError::UnsupportedScheme(_) => {
                    ErrorKind::InvalidVast
                }
                _ => ErrorKind::Network,
            },
            Self::InvalidXml { .. }
            | Self::MissingLinear { .. }
            | Self::NoMp4MediaFile { .. }
            | Self::MissingAdTagUri { .. }
            | Self::NeitherInLineNorWrapper { .. } => ErrorKind::InvalidVast,
            Self::HopLimitExceeded { .. } => ErrorKind::HopLimit,
            Self::NoMediaFound => ErrorKind::NoMedia,
            Self::Cancelled { .. } | Self::DeadlineExceeded { .. } => ErrorKind::Cancelled,
            Self::Client(_) | Self::Task(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_distinguish_failure_classes() {
        let network = ResolutionError::HttpStatus {
            depth: 1,
            uri: "https://ads.example/vast".to_string(),
            status: 503,
        };
        assert!(network.to_string().starts_with("failed to fetch vast xml: 503"));
        assert_eq!(network.kind(), ErrorKind::Network);
        assert_eq!(network.depth(), Some(1));

        let limit = ResolutionError::HopLimitExceeded {
            depth: 5,
            limit: 5,
            uri: "https://ads.example/6".to_string(),
        };
        assert!(limit.to_string().starts_with("exceeded maximum wrapper redirects"));
        assert_eq!(limit.kind(), ErrorKind::HopLimit);
        assert_eq!(limit.uri(), Some("https://ads.example/6"));

        let invalid = ResolutionError::NeitherInLineNorWrapper {
            depth: 0,
            uri: "https://ads.example/empty".to_string(),
        };
        assert_eq!(invalid.kind(), ErrorKind::InvalidVast);
    }

    #[test]
    fn bad_uri_is_not_a_network_failure() {
        let err = ResolutionError::Network {
            depth: 0,
            uri: "ftp://ads.example".to_string(),
            source: FetchError::UnsupportedScheme("ftp".to_string()),
        };
        assert_eq!(err.kind(), ErrorKind::InvalidVast);
    }
}
