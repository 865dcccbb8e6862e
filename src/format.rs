use crate::error::{Result, VastError};
use log::debug;
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use regex::Regex;
use std::sync::LazyLock;

const INDENT: usize = 4;

static CDATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!\[CDATA\[(.*?)\]\]>").expect("static pattern is valid"));

/// Re-indent markup for display.
///
/// Well-formed XML is rewritten element by element with CDATA kept intact.
/// Anything else goes through a line-based formatter that drops CDATA
/// wrappers and indents by tag nesting, so broken vendor markup still
/// becomes readable.
pub fn format_xml(markup: &str) -> String {
    match reindent(markup) {
        Ok(formatted) => formatted,
        Err(e) => {
            debug!("Markup is not well-formed ({}), using simple formatting", e);
            simple_format(markup)
        }
    }
}

fn reindent(markup: &str) -> Result<String> {
    let mut reader = Reader::from_str(markup);
    reader.trim_text(true);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', INDENT);
    let mut depth = 0usize;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            event => {
                match &event {
                    Event::Start(_) => depth += 1,
                    Event::End(_) => depth = depth.saturating_sub(1),
                    _ => (),
                }
                writer.write_event(event)?;
            }
        }
    }

    if depth > 0 {
        return Err(VastError::UnexpectedEof("document".to_string()));
    }

    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn simple_format(markup: &str) -> String {
    let stripped = CDATA.replace_all(markup, "$1");
    let split = stripped.replace('>', ">\n").replace('<', "\n<");

    let mut level = 0usize;
    let mut lines = Vec::new();

    for line in split.lines().map(str::trim).filter(|line| !line.is_empty()) {
        if line.starts_with("</") {
            level = level.saturating_sub(1);
        }

        lines.push(format!("{}{}", " ".repeat(level * INDENT), line));

        let opens = line.starts_with('<')
            && !line.starts_with("</")
            && !line.starts_with("<?")
            && !line.starts_with("<!")
            && !line.ends_with("/>");
        if opens {
            level += 1;
        }
    }

    lines.join("\n")
}
