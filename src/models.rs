use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a VAST document (Video Ad Serving Template)
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct Vast {
    /// The VAST version (e.g., "2.0", "3.0", "4.0", etc.)
    pub version: Option<String>,

    /// The Ad elements within the VAST document
    pub ads: Vec<Ad>,
}

/// Represents an Ad within a VAST document
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct Ad {
    /// The ad ID
    pub id: Option<String>,

    /// The ad sequence number (for ad pods)
    pub sequence: Option<u32>,

    /// The in-line ad details
    pub inline: Option<InLine>,

    /// The wrapper ad details
    pub wrapper: Option<Wrapper>,
}

/// Represents an InLine ad, the terminal node of a wrapper chain
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct InLine {
    /// The ad system name and version
    pub ad_system: Option<AdSystem>,

    /// The ad title
    pub ad_title: Option<String>,

    /// Creative elements
    pub creatives: Vec<Creative>,
}

/// Represents a Wrapper ad, which references another VAST document
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct Wrapper {
    /// The ad system name and version
    pub ad_system: Option<AdSystem>,

    /// The URL of the next VAST document. `None` when the element is missing
    /// or empty.
    pub vast_ad_tag_uri: Option<String>,
}

/// Represents the ad system information
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AdSystem {
    pub name: String,
    pub version: Option<String>,
}

/// Represents a creative element
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct Creative {
    pub id: Option<String>,
    pub ad_id: Option<String>,

    /// Linear ad details
    pub linear: Option<Linear>,

    /// Companions declared under this creative's CompanionAds
    pub companions: Vec<CompanionAd>,
}

/// Represents a linear ad
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct Linear {
    /// The duration of the ad
    pub duration: Option<String>,

    /// Media files
    pub media_files: Vec<MediaFile>,

    /// Video clicks
    pub video_clicks: Option<VideoClicks>,
}

/// Represents a media file
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct MediaFile {
    /// The media file URL
    pub url: String,

    /// The media file MIME type, empty when the attribute is absent
    pub mime_type: String,

    /// The declared bitrate; `None` when missing or not an integer
    pub bitrate: Option<u32>,

    pub width: Option<u32>,
    pub height: Option<u32>,

    /// The media file delivery type (progressive or streaming)
    pub delivery: Option<String>,
}

impl MediaFile {
    /// Whether this file is a playable mp4 candidate: declared `video/mp4`
    /// or a URL ending in `.mp4`.
    pub fn is_mp4(&self) -> bool {
        self.mime_type == "video/mp4" || self.url.ends_with(".mp4")
    }

    /// Bitrate used for ranking; missing or unparsable values rank as 0.
    pub fn effective_bitrate(&self) -> u32 {
        self.bitrate.unwrap_or(0)
    }
}

/// Represents video click-through and click-tracking URLs
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct VideoClicks {
    /// The click-through URL
    pub click_through: Option<String>,

    /// Click tracking URLs
    pub click_tracking: Vec<String>,
}

/// A companion ad as found in VAST markup.
///
/// All fields are passed through verbatim; image and click URLs are neither
/// fetched nor validated.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Default)]
pub struct CompanionAd {
    pub id: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,

    /// `StaticResource` URL
    pub image_url: Option<String>,

    /// `CompanionClickThrough` URL
    pub click_url: Option<String>,
}

/// A VAST document reduced to the node that decides what to do next.
#[derive(Debug, Clone, PartialEq)]
pub enum VastNode {
    /// Terminal ad carrying the playable creative.
    InLine(InLine),
    /// Redirect to another VAST document.
    Wrapper(Wrapper),
}

impl VastNode {
    /// Picks the node of a parsed document. An InLine ad anywhere in the
    /// document wins over a Wrapper; the first of each kind is used.
    pub fn from_document(vast: Vast) -> Option<Self> {
        let mut wrapper = None;
        for ad in vast.ads {
            if let Some(inline) = ad.inline {
                return Some(Self::InLine(inline));
            }
            if wrapper.is_none() {
                wrapper = ad.wrapper;
            }
        }
        wrapper.map(Self::Wrapper)
    }
}

impl InLine {
    /// First Linear creative, in document order.
    pub fn first_linear(&self) -> Option<&Linear> {
        self.creatives.iter().find_map(|c| c.linear.as_ref())
    }

    pub fn companions(&self) -> impl Iterator<Item = &CompanionAd> {
        self.creatives.iter().flat_map(|c| c.companions.iter())
    }
}

/// The ad format announced by the markup envelope.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum CreativeType {
    /// HTML display markup, rendered as is.
    Display,
    /// VAST video, resolved through the wrapper chain.
    Vast,
}

impl CreativeType {
    /// Maps an `AdType` code. `8` is VAST; `4`, anything else, and a missing
    /// code are all display.
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some("8") => Self::Vast,
            _ => Self::Display,
        }
    }
}

impl fmt::Display for CreativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Display => f.write_str("display"),
            Self::Vast => f.write_str("vast"),
        }
    }
}

/// Output of the ad markup parser
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ParsedCreative {
    #[serde(rename = "type")]
    pub creative_type: CreativeType,

    /// Entity-decoded payload: VAST XML or display HTML
    pub payload: String,

    /// Raw `AdWidth` value
    pub width: Option<String>,

    /// Raw `AdHeight` value
    pub height: Option<String>,

    /// Raw `AdType` code the type was derived from
    pub ad_type_code: Option<String>,
}

impl ParsedCreative {
    /// Portrait when taller than wide, or when the slot fits within 480x640.
    /// Missing or non-numeric dimensions are treated as landscape.
    pub fn is_portrait(&self) -> bool {
        let (Some(w), Some(h)) = (self.width.as_deref(), self.height.as_deref()) else {
            return false;
        };
        match (w.trim().parse::<u32>(), h.trim().parse::<u32>()) {
            (Ok(w), Ok(h)) => h > w || (w <= 480 && h <= 640),
            _ => false,
        }
    }
}

/// Which path produced a resolved media URL.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum MediaSource {
    /// Followed one or more fetched VAST documents.
    WrapperChain,
    /// Selected from the supplied VAST markup without fetching.
    DirectVast,
    /// Recovered by scanning tags in markup that did not parse.
    TextScan,
}

/// Output of the VAST chain resolver
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ResolutionResult {
    pub media_url: String,
    pub click_through_url: Option<String>,
    pub companions: Vec<CompanionAd>,

    /// Number of VAST documents fetched
    pub hops: usize,

    /// Fetched URIs in order
    pub chain: Vec<String>,

    pub source: MediaSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creative(width: Option<&str>, height: Option<&str>) -> ParsedCreative {
        ParsedCreative {
            creative_type: CreativeType::Vast,
            payload: String::new(),
            width: width.map(str::to_string),
            height: height.map(str::to_string),
            ad_type_code: Some("8".to_string()),
        }
    }

    #[test]
    fn portrait_detection() {
        assert!(creative(Some("320"), Some("480")).is_portrait());
        assert!(creative(Some("480"), Some("320")).is_portrait());
        assert!(!creative(Some("1280"), Some("720")).is_portrait());
        assert!(!creative(Some("wide"), Some("720")).is_portrait());
        assert!(!creative(None, Some("720")).is_portrait());
    }

    #[test]
    fn unknown_ad_type_codes_are_display() {
        assert_eq!(CreativeType::from_code(Some("8")), CreativeType::Vast);
        assert_eq!(CreativeType::from_code(Some("4")), CreativeType::Display);
        assert_eq!(CreativeType::from_code(Some("99")), CreativeType::Display);
        assert_eq!(CreativeType::from_code(None), CreativeType::Display);
    }

    #[test]
    fn inline_wins_over_earlier_wrapper() {
        let vast = Vast {
            version: Some("3.0".to_string()),
            ads: vec![
                Ad {
                    wrapper: Some(Wrapper {
                        ad_system: None,
                        vast_ad_tag_uri: Some("https://next.example".to_string()),
                    }),
                    ..Ad::default()
                },
                Ad {
                    inline: Some(InLine::default()),
                    ..Ad::default()
                },
            ],
        };
        assert!(matches!(VastNode::from_document(vast), Some(VastNode::InLine(_))));
        assert_eq!(VastNode::from_document(Vast::default()), None);
    }
}
