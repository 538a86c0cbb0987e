//! Shared strings table (`xl/sharedStrings.xml`).
//!
//! Rich-text runs are flattened to their concatenated text; the render grid
//! only carries display strings.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::FormatError;

/// Parse `sharedStrings.xml` into one display string per `<si>` entry.
pub fn parse_shared_strings_xml(xml: &str) -> Result<Vec<String>, FormatError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut items = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"si" => {
                items.push(parse_si(&mut reader)?);
            }
            Event::Empty(e) if e.local_name().as_ref() == b"si" => {
                items.push(String::new());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(items)
}

/// Collect the text of every `<t>` under one `<si>`, skipping phonetic
/// (`<rPh>`) annotations.
fn parse_si(reader: &mut Reader<&[u8]>) -> Result<String, FormatError> {
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut in_t = false;
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"rPh" => phonetic_depth += 1,
            Event::End(e) if e.local_name().as_ref() == b"rPh" => {
                phonetic_depth = phonetic_depth.saturating_sub(1)
            }
            Event::Start(e) if e.local_name().as_ref() == b"t" && phonetic_depth == 0 => {
                in_t = true;
            }
            Event::End(e) if e.local_name().as_ref() == b"t" => in_t = false,
            Event::Text(t) if in_t => text.push_str(&t.unescape()?),
            Event::End(e) if e.local_name().as_ref() == b"si" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}
