//! Parsing of vendor ad-response envelopes.
//!
//! An envelope carries the slot dimensions, a numeric ad-type code and the
//! creative itself, escaped inside an `Ad` element:
//!
//! ```xml
//! <tns:Response xmlns:tns="http://www.inner-active.com/SimpleM2M/M2MResponse">
//!   <tns:Ad><![CDATA[ ...VAST or HTML... ]]></tns:Ad>
//!   <tns:AdWidth Value="320"/>
//!   <tns:AdHeight Value="480"/>
//!   <tns:AdType Value="8"/>
//! </tns:Response>
//! ```

use crate::entities::decode_html_entities;
use crate::error::ParseError;
use crate::models::{CreativeType, ParsedCreative};
use crate::parser::attribute;
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

/// Namespace of the Inneractive M2M response envelope.
pub const DEFAULT_VENDOR_NAMESPACE: &str = "http://www.inner-active.com/SimpleM2M/M2MResponse";

/// Extracts the creative payload and its metadata from an envelope.
#[derive(Debug, Clone)]
pub struct AdMarkupParser {
    namespace: String,
}

impl Default for AdMarkupParser {
    fn default() -> Self {
        Self::with_namespace(DEFAULT_VENDOR_NAMESPACE)
    }
}

/// Parse an envelope using the default vendor namespace.
pub fn parse_ad_markup(envelope_xml: &str) -> Result<ParsedCreative, ParseError> {
    AdMarkupParser::default().parse(envelope_xml)
}

#[derive(Default)]
struct EnvelopeFields {
    width: Option<String>,
    height: Option<String>,
    ad_type: Option<String>,
}

impl EnvelopeFields {
    fn record(&mut self, element: &BytesStart) {
        let slot = match element.local_name().as_ref() {
            b"AdWidth" => &mut self.width,
            b"AdHeight" => &mut self.height,
            b"AdType" => &mut self.ad_type,
            _ => return,
        };
        if slot.is_none() {
            *slot = attribute(element, b"Value");
        }
    }
}

impl AdMarkupParser {
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Parse `envelope_xml` into a [`ParsedCreative`].
    ///
    /// The `Ad` element is looked up in the vendor namespace first, then as
    /// an unqualified element. Its payload is the text of the first child
    /// element that has any, or else the `Ad` element's own leading text.
    /// Dimensions and ad type are optional.
    pub fn parse(&self, envelope_xml: &str) -> Result<ParsedCreative, ParseError> {
        if envelope_xml.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        debug!("Parsing ad envelope of {} bytes", envelope_xml.len());

        let mut reader = NsReader::from_str(envelope_xml);
        let mut buf = Vec::new();
        let mut fields = EnvelopeFields::default();
        let mut vendor_ad: Option<String> = None;
        let mut plain_ad: Option<String> = None;
        let mut depth = 0usize;

        loop {
            let (ns, event) = reader.read_resolved_event_into(&mut buf)?;
            let in_vendor_ns = matches!(
                ns,
                ResolveResult::Bound(Namespace(uri)) if uri == self.namespace.as_bytes()
            );
            let unqualified = matches!(ns, ResolveResult::Unbound);

            match event {
                Event::Start(ref e) | Event::Empty(ref e)
                    if depth > 0 && e.local_name().as_ref() == b"Ad" =>
                {
                    let wanted = (in_vendor_ns && vendor_ad.is_none())
                        || (unqualified && plain_ad.is_none());
                    let payload = match (&event, wanted) {
                        (Event::Start(_), true) => Some(read_ad_payload(&mut reader)?),
                        (Event::Start(_), false) => {
                            depth += 1;
                            None
                        }
                        _ => wanted.then(String::new),
                    };
                    if let Some(payload) = payload {
                        if in_vendor_ns {
                            vendor_ad = Some(payload);
                        } else {
                            plain_ad = Some(payload);
                        }
                    }
                }
                Event::Start(ref e) => {
                    if depth > 0 && in_vendor_ns {
                        fields.record(e);
                    }
                    depth += 1;
                }
                Event::Empty(ref e) => {
                    if depth > 0 && in_vendor_ns {
                        fields.record(e);
                    }
                }
                Event::End(_) => depth = depth.saturating_sub(1),
                Event::Eof => break,
                _ => (),
            }
            buf.clear();
        }

        debug!(
            "Envelope fields: width={:?} height={:?} type={:?}",
            fields.width, fields.height, fields.ad_type
        );

        let raw = vendor_ad.or(plain_ad).ok_or(ParseError::NoAdElement)?;
        if raw.is_empty() {
            return Err(ParseError::NoPayload);
        }

        let creative_type = CreativeType::from_code(fields.ad_type.as_deref());
        let payload = decode_html_entities(&raw);
        debug!("Parsed {} creative, payload {} bytes", creative_type, payload.len());

        Ok(ParsedCreative {
            creative_type,
            payload,
            width: fields.width,
            height: fields.height,
            ad_type_code: fields.ad_type,
        })
    }
}

/// Read the payload of an `Ad` element whose start tag was just consumed.
///
/// Returns the trimmed text of the first child element with non-blank text,
/// falling back to the `Ad` element's text before its first child. Comments
/// are not elements and never count as children.
fn read_ad_payload(reader: &mut NsReader<&[u8]>) -> Result<String, ParseError> {
    let mut buf = Vec::new();
    let mut depth = 0usize;
    let mut own_text = String::new();
    let mut own_text_open = true;
    let mut child_text = String::new();
    let mut child_text_open = false;
    let mut payload: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(_) => {
                if depth == 0 {
                    own_text_open = false;
                    child_text.clear();
                    child_text_open = true;
                } else if depth == 1 {
                    child_text_open = false;
                }
                depth += 1;
            }
            Event::Empty(_) => {
                if depth == 0 {
                    own_text_open = false;
                } else if depth == 1 {
                    child_text_open = false;
                }
            }
            Event::End(_) => {
                if depth == 0 {
                    break;
                }
                if depth == 1 && payload.is_none() {
                    let text = child_text.trim();
                    if !text.is_empty() {
                        payload = Some(text.to_string());
                    }
                }
                depth -= 1;
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                push_text(
                    depth,
                    &text,
                    own_text_open,
                    &mut own_text,
                    child_text_open,
                    &mut child_text,
                );
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e);
                push_text(
                    depth,
                    &text,
                    own_text_open,
                    &mut own_text,
                    child_text_open,
                    &mut child_text,
                );
            }
            Event::Eof => return Err(ParseError::UnexpectedEof("Ad".to_string())),
            _ => (),
        }
        buf.clear();
    }

    Ok(payload.unwrap_or_else(|| own_text.trim().to_string()))
}

fn push_text(
    depth: usize,
    text: &str,
    own_open: bool,
    own: &mut String,
    child_open: bool,
    child: &mut String,
) {
    match depth {
        0 if own_open => own.push_str(text),
        1 if child_open => child.push_str(text),
        _ => (),
    }
}
