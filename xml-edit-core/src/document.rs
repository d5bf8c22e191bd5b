//! Lossless document editing.
//!
//! A [`Document`] keeps the original bytes next to the parsed tree. Edits are
//! applied to the tree immediately, so later lookups see them, and are also
//! queued as splices against the source. Serializing copies every untouched
//! byte verbatim and only writes the inserted elements, indented to match
//! their new siblings.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::Path;

use thiserror::Error;

use crate::parser::{parse, ParseError};
use crate::tree::{Span, XmlNode};
use crate::writer::{write_fragment, Layout, WriteError};

/// Errors raised by structural edits.
#[derive(Debug, Error)]
pub enum EditError {
    /// The requested parent element does not exist.
    #[error("element '{0}' not found in document")]
    MissingElement(String),
    /// The element was created in memory and has no source position.
    #[error("element '{0}' was not parsed from the document and has no source position")]
    Detached(String),
    /// Raw markup handed to [`Document::append_raw`] is not a single element.
    #[error("invalid element markup: {0}")]
    Markup(#[from] ParseError),
}

#[derive(Debug, Clone)]
enum Insert {
    /// Serialized with the document's detected layout.
    Node(XmlNode),
    /// Written byte for byte.
    Raw(Vec<u8>),
}

impl Insert {
    fn render(&self, indent: &[u8], layout: &Layout) -> Result<Vec<u8>, WriteError> {
        match self {
            Insert::Node(node) => write_fragment(node, indent, layout),
            Insert::Raw(bytes) => Ok(bytes.clone()),
        }
    }
}

#[derive(Debug, Clone)]
struct PendingAppend {
    tag: String,
    parent: Span,
    last_child: Option<Span>,
    inserts: Vec<Insert>,
}

/// A parsed XML document that serializes back with unrelated bytes intact.
#[derive(Debug, Clone)]
pub struct Document {
    source: Vec<u8>,
    root: XmlNode,
    pending: BTreeMap<usize, PendingAppend>,
}

impl Document {
    /// Parse a document from raw bytes.
    pub fn from_bytes(source: Vec<u8>) -> Result<Self, ParseError> {
        let root = parse(&source)?;
        Ok(Self {
            source,
            root,
            pending: BTreeMap::new(),
        })
    }

    /// Read and parse a document from disk.
    pub fn open(path: &Path) -> Result<Self, ParseError> {
        Self::from_bytes(fs::read(path)?)
    }

    /// Root element, including any appended nodes.
    pub fn root(&self) -> &XmlNode {
        &self.root
    }

    /// Bytes the document was parsed from.
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Whether any edit has been queued.
    pub fn is_modified(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Append `node` as the last child of the element at `path` (relative to
    /// the root, first match per segment).
    pub fn append_child(&mut self, path: &[&str], node: XmlNode) -> Result<(), EditError> {
        self.push_append(path, node.clone(), Insert::Node(node))
    }

    /// Append an element given as markup, written exactly as provided.
    ///
    /// `markup` is placed at the indentation of the last sibling, so nested
    /// lines should already be indented for that column (as bytes copied
    /// from a sibling with [`crate::ElementCopy`] are).
    pub fn append_raw(&mut self, path: &[&str], markup: Vec<u8>) -> Result<(), EditError> {
        let node = parse(&markup)?;
        self.push_append(path, node, Insert::Raw(markup))
    }

    fn push_append(
        &mut self,
        path: &[&str],
        node: XmlNode,
        insert: Insert,
    ) -> Result<(), EditError> {
        let location = display_path(&self.root.tag, path);
        let parent = self
            .root
            .get_path_mut(path)
            .ok_or_else(|| EditError::MissingElement(location.clone()))?;
        let span = parent.span.ok_or(EditError::Detached(location))?;

        let last_child = parent.children.iter().rev().find_map(|child| child.span);
        let mut node = node;
        node.detach();
        parent.children.push(node);

        self.pending
            .entry(span.start)
            .or_insert_with(|| PendingAppend {
                tag: parent.tag.clone(),
                parent: span,
                last_child,
                inserts: Vec::new(),
            })
            .inserts
            .push(insert);
        Ok(())
    }

    /// Serialize the document: original bytes plus queued inserts.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WriteError> {
        if self.pending.is_empty() {
            return Ok(self.source.clone());
        }

        let layout = detect_layout(&self.source, &self.root);
        let mut splices = self
            .pending
            .values()
            .map(|pending| render_append(&self.source, pending, &layout))
            .collect::<Result<Vec<_>, _>>()?;
        splices.sort_by_key(|(range, _)| range.start);

        let extra: usize = splices.iter().map(|(_, bytes)| bytes.len()).sum();
        let mut out = Vec::with_capacity(self.source.len() + extra);
        let mut cursor = 0;
        for (range, bytes) in splices {
            out.extend_from_slice(&self.source[cursor..range.start]);
            out.extend_from_slice(&bytes);
            cursor = range.end;
        }
        out.extend_from_slice(&self.source[cursor..]);
        Ok(out)
    }

    /// Atomically replace `path` with the serialized document.
    ///
    /// The new content is written to a temporary file in the same directory
    /// and renamed over `path`, keeping the permissions of the existing file.
    pub fn save(&self, path: &Path) -> Result<(), WriteError> {
        let bytes = self.to_bytes()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        if let Ok(meta) = fs::metadata(path) {
            tmp.as_file().set_permissions(meta.permissions())?;
        }
        tmp.persist(path).map_err(|err| err.error)?;
        Ok(())
    }
}

fn display_path(root: &str, path: &[&str]) -> String {
    std::iter::once(root)
        .chain(path.iter().copied())
        .collect::<Vec<_>>()
        .join(".")
}

/// Guess indentation unit and line terminator from the existing document.
fn detect_layout(source: &[u8], root: &XmlNode) -> Layout {
    let mut layout = Layout::default();
    if source.windows(2).any(|w| w == b"\r\n") {
        layout.newline = b"\r\n".to_vec();
    }

    let root_indent = root
        .span
        .and_then(|span| line_indent(source, span.start))
        .unwrap_or_default();
    let child_indent = root
        .children
        .iter()
        .find_map(|child| child.span)
        .and_then(|span| line_indent(source, span.start));
    if let Some(child_indent) = child_indent {
        if child_indent.len() > root_indent.len() && child_indent.starts_with(root_indent) {
            layout.unit = child_indent[root_indent.len()..].to_vec();
        }
    }
    layout
}

/// Indentation before `pos` when `pos` is the first non-blank byte of its line.
fn line_indent(source: &[u8], pos: usize) -> Option<&[u8]> {
    let mut begin = pos;
    while begin > 0 && matches!(source[begin - 1], b' ' | b'\t') {
        begin -= 1;
    }
    if begin == 0 || source[begin - 1] == b'\n' {
        Some(&source[begin..pos])
    } else {
        None
    }
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

fn render_append(
    source: &[u8],
    pending: &PendingAppend,
    layout: &Layout,
) -> Result<(Range<usize>, Vec<u8>), WriteError> {
    let span = pending.parent;
    let parent_indent = line_indent(source, span.start);
    let mut out = Vec::new();

    if span.is_self_closing() {
        // `<tag attr="x"/>` becomes `<tag attr="x">...</tag>`.
        let mut open = &source[span.start..span.end - 2];
        while let Some((last, rest)) = open.split_last() {
            if !last.is_ascii_whitespace() {
                break;
            }
            open = rest;
        }
        out.extend_from_slice(open);
        out.push(b'>');
        write_block(&mut out, &pending.inserts, parent_indent, layout)?;
        out.extend_from_slice(b"</");
        out.extend_from_slice(pending.tag.as_bytes());
        out.push(b'>');
        return Ok((span.start..span.end, out));
    }

    let inner = &source[span.inner_start..span.inner_end];
    if pending.last_child.is_none() && is_blank(inner) {
        write_block(&mut out, &pending.inserts, parent_indent, layout)?;
        return Ok((span.inner_start..span.inner_end, out));
    }

    // Closing tag on its own line: insert whole lines just before it.
    let line_begin = inner
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|idx| span.inner_start + idx + 1);
    if let Some(line_begin) = line_begin {
        if is_blank(&source[line_begin..span.inner_end]) {
            let child_indent = match pending.last_child.and_then(|c| line_indent(source, c.start)) {
                Some(indent) => indent.to_vec(),
                None => nested(parent_indent.unwrap_or_default(), layout),
            };
            for insert in &pending.inserts {
                out.extend_from_slice(&child_indent);
                out.extend_from_slice(&insert.render(&child_indent, layout)?);
                out.extend_from_slice(&layout.newline);
            }
            return Ok((line_begin..line_begin, out));
        }
    }

    // Compact markup: append inline right before the closing tag.
    let flat = Layout {
        unit: Vec::new(),
        newline: Vec::new(),
    };
    for insert in &pending.inserts {
        out.extend_from_slice(&insert.render(b"", &flat)?);
    }
    Ok((span.inner_end..span.inner_end, out))
}

/// Write `inserts` as indented lines followed by the parent's closing indentation.
fn write_block(
    out: &mut Vec<u8>,
    inserts: &[Insert],
    parent_indent: Option<&[u8]>,
    layout: &Layout,
) -> Result<(), WriteError> {
    let Some(parent_indent) = parent_indent else {
        let flat = Layout {
            unit: Vec::new(),
            newline: Vec::new(),
        };
        for insert in inserts {
            out.extend_from_slice(&insert.render(b"", &flat)?);
        }
        return Ok(());
    };

    let child_indent = nested(parent_indent, layout);
    for insert in inserts {
        out.extend_from_slice(&layout.newline);
        out.extend_from_slice(&child_indent);
        out.extend_from_slice(&insert.render(&child_indent, layout)?);
    }
    out.extend_from_slice(&layout.newline);
    out.extend_from_slice(parent_indent);
    Ok(())
}

fn nested(indent: &[u8], layout: &Layout) -> Vec<u8> {
    let mut out = indent.to_vec();
    out.extend_from_slice(&layout.unit);
    out
}
