use crate::error::{Result, VastError};
use crate::models::*;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Parse a VAST XML string into a Vast struct
///
/// Elements are matched by local name, so prefixed VAST documents parse the
/// same as plain ones. A document without a `VAST` root yields no ads.
pub fn parse_vast(xml: &str) -> Result<Vast> {
    let mut reader = new_reader(xml);
    let mut buf = Vec::new();
    let mut vast = Vast::default();

    // Look for the VAST element
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"VAST" => {
                vast.version = attribute(e, b"version");
                vast.ads = parse_ads(&mut reader)?;
                break;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(vast)
}

/// Every `MediaFile` element in the document, wherever it sits.
pub fn scan_media_files(xml: &str) -> Result<Vec<MediaFile>> {
    scan_elements(xml, b"MediaFile", |reader, start| parse_media_file(reader, start))
}

/// Every `Companion` element in the document, wherever it sits.
pub fn scan_companions(xml: &str) -> Result<Vec<CompanionAd>> {
    scan_elements(xml, b"Companion", |reader, start| parse_companion(reader, start))
}

/// Text of every element named `name`, in document order.
pub fn scan_text(xml: &str, name: &[u8]) -> Result<Vec<String>> {
    scan_elements(xml, name, |reader, start| {
        read_text_element(reader, &local_name(start))
    })
}

fn new_reader(xml: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    reader.expand_empty_elements(true);
    reader
}

/// Walk the whole document and hand each element named `name` to `parse`,
/// which must consume it up to and including its end tag.
fn scan_elements<T, F>(xml: &str, name: &[u8], mut parse: F) -> Result<Vec<T>>
where
    F: FnMut(&mut Reader<&[u8]>, &BytesStart) -> Result<T>,
{
    let mut reader = new_reader(xml);
    let mut buf = Vec::new();
    let mut found = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == name => {
                found.push(parse(&mut reader, e)?);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(found)
}

/// Parse Ad elements from the VAST XML
fn parse_ads(reader: &mut Reader<&[u8]>) -> Result<Vec<Ad>> {
    let mut ads = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"Ad" => {
                ads.push(parse_ad_element(reader, e)?);
            }
            Ok(Event::Start(ref e)) => skip_element(reader, e)?,
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"VAST" => break,
            Ok(Event::Eof) => return Err(VastError::UnexpectedEof("VAST".to_string())),
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(ads)
}

/// Parse a single Ad element
fn parse_ad_element(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<Ad> {
    let mut ad = Ad {
        id: attribute(start, b"id"),
        sequence: attribute(start, b"sequence").and_then(|s| s.parse().ok()),
        ..Ad::default()
    };

    let mut buf = Vec::new();

    // Parse InLine or Wrapper
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"InLine" => ad.inline = Some(parse_inline_element(reader)?),
                b"Wrapper" => ad.wrapper = Some(parse_wrapper_element(reader)?),
                _ => skip_element(reader, e)?,
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"Ad" => break,
            Ok(Event::Eof) => return Err(VastError::UnexpectedEof("Ad".to_string())),
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(ad)
}

/// Parse an InLine element
fn parse_inline_element(reader: &mut Reader<&[u8]>) -> Result<InLine> {
    let mut inline = InLine::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"AdSystem" => inline.ad_system = Some(parse_ad_system(reader, e)?),
                b"AdTitle" => inline.ad_title = Some(read_text_element(reader, "AdTitle")?),
                b"Creatives" => inline.creatives = parse_creatives(reader)?,
                _ => skip_element(reader, e)?,
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"InLine" => break,
            Ok(Event::Eof) => return Err(VastError::UnexpectedEof("InLine".to_string())),
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(inline)
}

/// Parse a Wrapper element
fn parse_wrapper_element(reader: &mut Reader<&[u8]>) -> Result<Wrapper> {
    let mut wrapper = Wrapper::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"AdSystem" => wrapper.ad_system = Some(parse_ad_system(reader, e)?),
                b"VASTAdTagURI" => {
                    let uri = read_text_element(reader, "VASTAdTagURI")?;
                    if !uri.is_empty() && wrapper.vast_ad_tag_uri.is_none() {
                        wrapper.vast_ad_tag_uri = Some(uri);
                    }
                }
                _ => skip_element(reader, e)?,
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"Wrapper" => break,
            Ok(Event::Eof) => return Err(VastError::UnexpectedEof("Wrapper".to_string())),
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(wrapper)
}

/// Read the trimmed text content of an element, concatenating text and
/// CDATA sections and ignoring any nested markup.
fn read_text_element(reader: &mut Reader<&[u8]>, name: &str) -> Result<String> {
    let mut text = String::new();
    let mut buf = Vec::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(e)) => text.push_str(&e.unescape()?),
            Ok(Event::CData(e)) => text.push_str(&String::from_utf8_lossy(&e)),
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Ok(Event::Eof) => return Err(VastError::UnexpectedEof(name.to_string())),
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(text.trim().to_string())
}

/// Skip an XML element and all its children
fn skip_element(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<()> {
    let mut buf = Vec::new();
    reader
        .read_to_end_into(start.name(), &mut buf)
        .map_err(VastError::XmlParseError)?;
    Ok(())
}

/// Unescaped value of the attribute `name`, if present and well-formed.
pub(crate) fn attribute(start: &BytesStart, name: &[u8]) -> Option<String> {
    start
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

fn local_name(start: &BytesStart) -> String {
    String::from_utf8_lossy(start.local_name().as_ref()).into_owned()
}

/// Parse AdSystem element
fn parse_ad_system(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<AdSystem> {
    Ok(AdSystem {
        version: attribute(start, b"version"),
        name: read_text_element(reader, "AdSystem")?,
    })
}

/// Parse Creatives element
fn parse_creatives(reader: &mut Reader<&[u8]>) -> Result<Vec<Creative>> {
    let mut creatives = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"Creative" => {
                creatives.push(parse_creative(reader, e)?);
            }
            Ok(Event::Start(ref e)) => skip_element(reader, e)?,
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"Creatives" => break,
            Ok(Event::Eof) => return Err(VastError::UnexpectedEof("Creatives".to_string())),
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(creatives)
}

/// Parse Creative element
fn parse_creative(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<Creative> {
    let mut creative = Creative {
        id: attribute(start, b"id"),
        ad_id: attribute(start, b"adId").or_else(|| attribute(start, b"AdID")),
        ..Creative::default()
    };

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"Linear" => {
                    let linear = parse_linear(reader)?;
                    creative.linear.get_or_insert(linear);
                }
                b"CompanionAds" => creative.companions.extend(parse_companion_ads(reader)?),
                _ => skip_element(reader, e)?,
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"Creative" => break,
            Ok(Event::Eof) => return Err(VastError::UnexpectedEof("Creative".to_string())),
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(creative)
}

/// Parse Linear element
fn parse_linear(reader: &mut Reader<&[u8]>) -> Result<Linear> {
    let mut linear = Linear::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"Duration" => linear.duration = Some(read_text_element(reader, "Duration")?),
                b"MediaFiles" => linear.media_files.extend(parse_media_files(reader)?),
                b"VideoClicks" => linear.video_clicks = Some(parse_video_clicks(reader)?),
                _ => skip_element(reader, e)?,
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"Linear" => break,
            Ok(Event::Eof) => return Err(VastError::UnexpectedEof("Linear".to_string())),
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(linear)
}

/// Parse MediaFiles element
fn parse_media_files(reader: &mut Reader<&[u8]>) -> Result<Vec<MediaFile>> {
    let mut media_files = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"MediaFile" => {
                media_files.push(parse_media_file(reader, e)?);
            }
            Ok(Event::Start(ref e)) => skip_element(reader, e)?,
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"MediaFiles" => break,
            Ok(Event::Eof) => return Err(VastError::UnexpectedEof("MediaFiles".to_string())),
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(media_files)
}

/// Parse MediaFile element
fn parse_media_file(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<MediaFile> {
    let number = |name: &[u8]| attribute(start, name).and_then(|v| v.trim().parse::<u32>().ok());

    Ok(MediaFile {
        mime_type: attribute(start, b"type").unwrap_or_default(),
        bitrate: number(b"bitrate"),
        width: number(b"width"),
        height: number(b"height"),
        delivery: attribute(start, b"delivery"),
        url: read_text_element(reader, "MediaFile")?,
    })
}

/// Parse VideoClicks element
fn parse_video_clicks(reader: &mut Reader<&[u8]>) -> Result<VideoClicks> {
    let mut video_clicks = VideoClicks::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"ClickThrough" => {
                    let url = read_text_element(reader, "ClickThrough")?;
                    if !url.is_empty() && video_clicks.click_through.is_none() {
                        video_clicks.click_through = Some(url);
                    }
                }
                b"ClickTracking" => {
                    video_clicks
                        .click_tracking
                        .push(read_text_element(reader, "ClickTracking")?);
                }
                _ => skip_element(reader, e)?,
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"VideoClicks" => break,
            Ok(Event::Eof) => return Err(VastError::UnexpectedEof("VideoClicks".to_string())),
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(video_clicks)
}

/// Parse CompanionAds element
fn parse_companion_ads(reader: &mut Reader<&[u8]>) -> Result<Vec<CompanionAd>> {
    let mut companions = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"Companion" => {
                companions.push(parse_companion(reader, e)?);
            }
            Ok(Event::Start(ref e)) => skip_element(reader, e)?,
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"CompanionAds" => break,
            Ok(Event::Eof) => return Err(VastError::UnexpectedEof("CompanionAds".to_string())),
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(companions)
}

/// Parse Companion element. The first `StaticResource` and
/// `CompanionClickThrough` at any depth below it are kept.
fn parse_companion(reader: &mut Reader<&[u8]>, start: &BytesStart) -> Result<CompanionAd> {
    let mut companion = CompanionAd {
        id: attribute(start, b"id"),
        width: attribute(start, b"width"),
        height: attribute(start, b"height"),
        ..CompanionAd::default()
    };

    let mut buf = Vec::new();
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"StaticResource" => {
                    let url = read_text_element(reader, "StaticResource")?;
                    if !url.is_empty() && companion.image_url.is_none() {
                        companion.image_url = Some(url);
                    }
                }
                b"CompanionClickThrough" => {
                    let url = read_text_element(reader, "CompanionClickThrough")?;
                    if !url.is_empty() && companion.click_url.is_none() {
                        companion.click_url = Some(url);
                    }
                }
                _ => depth += 1,
            },
            Ok(Event::End(_)) => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            Ok(Event::Eof) => return Err(VastError::UnexpectedEof("Companion".to_string())),
            Err(e) => return Err(VastError::XmlParseError(e)),
            _ => (),
        }
        buf.clear();
    }

    Ok(companion)
}
