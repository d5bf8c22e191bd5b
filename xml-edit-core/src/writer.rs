use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use crate::tree::XmlNode;

/// Errors that can occur while writing XML from an [`XmlNode`] tree.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Failed to serialize XML bytes.
    #[error("failed to write XML: {0}")]
    Xml(#[from] quick_xml::Error),
    /// Failed to write output file.
    #[error("failed to write XML file: {0}")]
    Io(#[from] std::io::Error),
}

/// Whitespace conventions used when serializing new elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// One level of indentation.
    pub unit: Vec<u8>,
    /// Line terminator.
    pub newline: Vec<u8>,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            unit: b"  ".to_vec(),
            newline: b"\n".to_vec(),
        }
    }
}

/// Serialize an [`XmlNode`] tree into indented XML bytes.
pub fn write(node: &XmlNode) -> Result<Vec<u8>, WriteError> {
    write_fragment(node, b"", &Layout::default())
}

/// Serialize `node` as a fragment that will sit at column `indent`.
///
/// The first line carries no leading indentation; the caller positions it.
/// Nested elements and the closing tag are indented relative to `indent`.
pub fn write_fragment(
    node: &XmlNode,
    indent: &[u8],
    layout: &Layout,
) -> Result<Vec<u8>, WriteError> {
    let mut writer = Writer::new(Vec::new());
    write_node(&mut writer, node, indent, layout)?;
    Ok(writer.into_inner())
}

fn write_node(
    writer: &mut Writer<Vec<u8>>,
    node: &XmlNode,
    indent: &[u8],
    layout: &Layout,
) -> Result<(), quick_xml::Error> {
    let mut start = BytesStart::new(node.tag.as_str());

    for (key, value) in &node.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.children.is_empty() && node.text.is_none() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;

    if let Some(text) = &node.text {
        if node.cdata && !text.contains("]]>") {
            writer.write_event(Event::CData(BytesCData::new(text.as_str())))?;
        } else {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
    }

    if !node.children.is_empty() {
        let mut child_indent = indent.to_vec();
        child_indent.extend_from_slice(&layout.unit);
        for child in &node.children {
            writer.get_mut().extend_from_slice(&layout.newline);
            writer.get_mut().extend_from_slice(&child_indent);
            write_node(writer, child, &child_indent, layout)?;
        }
        writer.get_mut().extend_from_slice(&layout.newline);
        writer.get_mut().extend_from_slice(indent);
    }

    writer.write_event(Event::End(BytesEnd::new(node.tag.as_str())))?;
    Ok(())
}
