//! HTML entity decoding for ad payloads.
//!
//! Vendor envelopes escape the inner creative once more than XML requires,
//! and mix named HTML entities with numeric ones. Decoding happens in two
//! passes: a generic HTML5 pass, then a fixed table of literal replacements
//! for entities that survive it (typically double-escaped ones such as
//! `&amp;nbsp;`).

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Literal replacements applied after the generic pass.
const FIXED_REPLACEMENTS: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&#39;", "'"),
    ("&#34;", "\""),
    ("&#60;", "<"),
    ("&#62;", ">"),
    ("&#38;", "&"),
    ("&#160;", " "),
];

/// Numeric references in the C1 range are read as windows-1252, as HTML
/// parsers do.
const WINDOWS_1252: &[(u32, char)] = &[
    (0x80, '€'),
    (0x82, '‚'),
    (0x83, 'ƒ'),
    (0x84, '„'),
    (0x85, '…'),
    (0x86, '†'),
    (0x87, '‡'),
    (0x88, 'ˆ'),
    (0x89, '‰'),
    (0x8A, 'Š'),
    (0x8B, '‹'),
    (0x8C, 'Œ'),
    (0x8E, 'Ž'),
    (0x91, '‘'),
    (0x92, '’'),
    (0x93, '“'),
    (0x94, '”'),
    (0x95, '•'),
    (0x96, '–'),
    (0x97, '—'),
    (0x98, '˜'),
    (0x99, '™'),
    (0x9A, 'š'),
    (0x9B, '›'),
    (0x9C, 'œ'),
    (0x9E, 'ž'),
    (0x9F, 'Ÿ'),
];

static NUMERIC_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(?:[xX]([0-9a-fA-F]{1,8})|([0-9]{1,10}));").expect("static pattern is valid")
});

/// Decode HTML entities in `text`.
pub fn decode_html_entities(text: &str) -> String {
    let mut decoded = unescape(text);
    for (entity, replacement) in FIXED_REPLACEMENTS {
        if decoded.contains(entity) {
            decoded = decoded.replace(entity, replacement);
        }
    }
    decoded
}

/// Generic pass over named and numeric references. Unknown references are
/// left untouched and non-breaking spaces come out as plain spaces.
pub fn unescape(text: &str) -> String {
    let remapped = NUMERIC_REFERENCE.replace_all(text, |caps: &Captures| {
        match numeric_override(caps) {
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        }
    });

    html_escape::decode_html_entities(&remapped).replace('\u{A0}', " ")
}

/// Replacement for numeric references the generic decoder would turn into
/// control characters or reject. `None` leaves the reference to the decoder.
fn numeric_override(caps: &Captures) -> Option<char> {
    let code = match (caps.get(1), caps.get(2)) {
        (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok()?,
        (None, Some(dec)) => dec.as_str().parse::<u32>().ok()?,
        (None, None) => return None,
    };

    if let Some((_, c)) = WINDOWS_1252.iter().find(|(cp, _)| *cp == code) {
        return Some(*c);
    }
    if code == 0 || char::from_u32(code).is_none() {
        return Some('\u{FFFD}');
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_common_entities() {
        assert_eq!(decode_html_entities("a &amp; b"), "a & b");
        assert_eq!(decode_html_entities("it&#39;s"), "it's");
        assert_eq!(decode_html_entities("x&nbsp;y"), "x y");
        assert_eq!(
            decode_html_entities("&lt;div class=&quot;ad&quot;&gt;"),
            "<div class=\"ad\">"
        );
        assert_eq!(decode_html_entities("&#x3C;b&#x3e;"), "<b>");
    }

    #[test]
    fn decodes_the_full_named_table() {
        assert_eq!(
            decode_html_entities("&Eacute;t&eacute; &rarr; &hearts;"),
            "Été → ♥"
        );
    }

    #[test]
    fn c1_numeric_references_use_windows_1252() {
        assert_eq!(decode_html_entities("1&#150;2"), "1–2");
        assert_eq!(decode_html_entities("&#x80;5"), "€5");
        assert_eq!(decode_html_entities("&#8211;"), "–");
    }

    #[test]
    fn double_escaped_entities_fall_through_to_the_fixed_table() {
        assert_eq!(decode_html_entities("a&amp;nbsp;b"), "a b");
        assert_eq!(decode_html_entities("&amp;#39;quoted&amp;#39;"), "'quoted'");
    }

    #[test]
    fn unknown_references_are_kept() {
        assert_eq!(decode_html_entities("&bogus; & more"), "&bogus; & more");
        assert_eq!(decode_html_entities("q?a=1&b=2"), "q?a=1&b=2");
    }

    #[test]
    fn invalid_code_points_become_replacement_chars() {
        assert_eq!(unescape("&#xD800;"), "\u{FFFD}");
        assert_eq!(unescape("&#0;"), "\u{FFFD}");
    }
}
