//! Object list markup codec.
//!
//! The object list is an XML document whose root (normally
//! `<PlacedObjects Version="27">`) holds one element per placed object.
//! `ObjectUnit` children are decoded into [`UnitRecord`]s; every other child
//! is kept verbatim as an [`OpaqueRecord`].
//!
//! [`UnitRecord`]: super::UnitRecord
//! [`OpaqueRecord`]: super::OpaqueRecord

use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};
use super::record::{Element, PlacedRecord, UnitRecord};

pub const DEFAULT_ROOT: &str = "PlacedObjects";
pub const DEFAULT_VERSION: &str = "27";

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

/// A decoded object list: the root element's header plus its records.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectList {
    /// Root name and attributes. Its `children` are always empty; the content
    /// lives in `records`.
    pub root: Element,
    pub records: Vec<PlacedRecord>,
}

impl Default for ObjectList {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl ObjectList {
    pub fn new(records: Vec<PlacedRecord>) -> Self {
        Self {
            root: Element::new(DEFAULT_ROOT).with_attribute("Version", DEFAULT_VERSION),
            records,
        }
    }

    /// Decode markup. Either every child decodes or an error is returned.
    pub fn decode(markup: &[u8]) -> Result<Self> {
        let mut root = parse_document(markup)?;
        let records = std::mem::take(&mut root.children)
            .into_iter()
            .map(PlacedRecord::from_element)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { root, records })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut root = self.root.clone();
        root.children = self.records.iter().map(PlacedRecord::to_element).collect();
        write_document(&root)
    }

    pub fn units(&self) -> impl Iterator<Item = &UnitRecord> {
        self.records.iter().filter_map(PlacedRecord::as_unit)
    }
}

/// Decode an object list into its records.
pub fn decode(markup: &[u8]) -> Result<Vec<PlacedRecord>> {
    ObjectList::decode(markup).map(|list| list.records)
}

/// Encode records under the default `PlacedObjects` root.
pub fn encode(records: &[PlacedRecord]) -> Vec<u8> {
    ObjectList::new(records.to_vec()).encode()
}

/// Parse a whole document into its root element. Text content is dropped.
pub(crate) fn parse_document(markup: &[u8]) -> Result<Element> {
    let text = String::from_utf8_lossy(markup);
    let mut reader = Reader::from_str(text.trim_start_matches('\u{feff}'));
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                if stack.is_empty() && root.is_some() {
                    return Err(Error::Parse("multiple root elements".into()));
                }
                stack.push(element_from(&start)?);
            }
            Ok(Event::Empty(start)) => {
                let element = element_from(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::End(end)) => {
                let element = stack.pop().ok_or_else(|| {
                    Error::Parse(format!(
                        "unexpected closing tag </{}>",
                        String::from_utf8_lossy(end.name().as_ref())
                    ))
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::Parse(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(Error::Parse(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| Error::Parse("no root element".into()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_some() {
        return Err(Error::Parse("multiple root elements".into()));
    } else {
        *root = Some(element);
    }
    Ok(())
}

fn element_from(start: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::Parse(format!("<{}>: {e}", element.name)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::Parse(format!("<{}> {key}: {e}", element.name)))?
            .into_owned();
        element.attributes.insert(key, value);
    }
    Ok(element)
}

/// Serialize a root element with an XML declaration, one element per line.
pub(crate) fn write_document(root: &Element) -> Vec<u8> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    writer.get_mut().extend_from_slice(XML_DECLARATION.as_bytes());
    // Writes into a Vec cannot fail.
    let written = write_element(&mut writer, root);
    debug_assert!(written.is_ok(), "{written:?}");
    let mut out = writer.into_inner();
    out.push(b'\n');
    out
}

fn write_element<W: Write>(writer: &mut Writer<W>, element: &Element) -> std::result::Result<(), String> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(|e| e.to_string());
    }

    writer.write_event(Event::Start(start)).map_err(|e| e.to_string())?;
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| e.to_string())
}
