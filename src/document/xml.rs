//! Markup loader built on quick-xml
//!
//! Accepts XML and XHTML-ish HTML. HTML leniency is limited to what scraped
//! pages commonly need: void elements without a closing tag, attributes
//! without values, unclosed elements, and stray end tags.

use super::arena::{ArenaDocument, DocumentBuilder};
use super::DocumentError;
use quick_xml::escape::resolve_html5_entity;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;
use tracing::{debug, warn};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Read and parse a document from disk
pub fn load_document(path: &Path) -> Result<ArenaDocument, DocumentError> {
    let source = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Loaded {} bytes from {}", source.len(), path.display());
    parse_document(&source)
}

/// Parse markup into an arena document
pub fn parse_document(source: &str) -> Result<ArenaDocument, DocumentError> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().check_end_names = false;

    let mut builder = DocumentBuilder::new();
    loop {
        let event = reader.read_event().map_err(|source| DocumentError::Markup {
            position: reader.buffer_position() as u64,
            source,
        })?;
        match event {
            Event::Start(start) => {
                let (tag, attrs) = element_parts(&start)?;
                let is_void = VOID_ELEMENTS.contains(&tag.as_str());
                builder.open(&tag, attrs);
                if is_void {
                    builder.close();
                }
            }
            Event::Empty(start) => {
                let (tag, attrs) = element_parts(&start)?;
                builder.open(&tag, attrs);
                builder.close();
            }
            Event::End(end) => {
                let tag = String::from_utf8_lossy(end.name().as_ref()).to_ascii_lowercase();
                if !builder.close_tag(&tag) && !VOID_ELEMENTS.contains(&tag.as_str()) {
                    warn!("Ignoring stray closing tag </{}>", tag);
                }
            }
            Event::Text(text) => {
                let decoded = match text.unescape_with(resolve_html5_entity) {
                    Ok(decoded) => decoded.into_owned(),
                    Err(_) => String::from_utf8_lossy(&text).into_owned(),
                };
                // Whitespace between inline children separates words
                if builder.open_depth() > 0 || !decoded.trim().is_empty() {
                    builder.text(decoded);
                }
            }
            Event::CData(data) => {
                builder.text(String::from_utf8_lossy(&data).into_owned());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if builder.open_depth() > 0 {
        warn!(
            "Document ended with {} unclosed element(s)",
            builder.open_depth()
        );
    }
    Ok(builder.finish())
}

fn element_parts(start: &BytesStart<'_>) -> Result<(String, Vec<(String, String)>), DocumentError> {
    let tag = String::from_utf8_lossy(start.name().as_ref()).to_ascii_lowercase();
    let mut attrs = Vec::new();
    for attr in start.html_attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.unescape_value_with(resolve_html5_entity) {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        attrs.push((key, value));
    }
    Ok((tag, attrs))
}
