use crate::models::CompanionAd;
use crate::parser;
use log::{debug, warn};

/// Collect every `Companion` element in `markup`.
///
/// Companion data only supplements the video, so markup that does not parse
/// yields an empty list instead of an error. Wrappers are not followed.
pub fn extract_companions(markup: &str) -> Vec<CompanionAd> {
    match parser::scan_companions(markup) {
        Ok(companions) => {
            debug!("Found {} companion ad(s)", companions.len());
            companions
        }
        Err(e) => {
            warn!("Error parsing VAST for companion ads: {}", e);
            Vec::new()
        }
    }
}
