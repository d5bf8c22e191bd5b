//! Byte-level copies of parsed elements.
//!
//! An [`ElementCopy`] reproduces an element exactly as it appears in the
//! source (comments, attribute order, whitespace-only text, CDATA) except
//! for the values explicitly replaced.

use std::ops::Range;

use quick_xml::escape::escape;

use crate::document::EditError;
use crate::tree::{Span, XmlNode};

/// Copy of one parsed element with targeted replacements.
#[derive(Debug, Clone)]
pub struct ElementCopy<'a> {
    source: &'a [u8],
    element: &'a XmlNode,
    span: Span,
    edits: Vec<(Range<usize>, Vec<u8>)>,
}

impl<'a> ElementCopy<'a> {
    /// Start a copy of `element`, which must have been parsed from `source`.
    pub fn new(source: &'a [u8], element: &'a XmlNode) -> Result<Self, EditError> {
        let span = element
            .span
            .ok_or_else(|| EditError::Detached(element.tag.clone()))?;
        Ok(Self {
            source,
            element,
            span,
            edits: Vec::new(),
        })
    }

    fn start_tag_end(&self) -> usize {
        if self.span.is_self_closing() {
            self.span.end
        } else {
            self.span.inner_start
        }
    }

    /// Replace the value of attribute `name`, adding it if absent.
    pub fn set_attribute(&mut self, name: &str, value: &str) {
        let escaped = escape(value).into_owned().into_bytes();
        let tag_end = self.start_tag_end();
        let start_tag = &self.source[self.span.start..tag_end];

        if let Some(range) = find_attribute_value(start_tag, name) {
            let at = self.span.start;
            self.edits.push((at + range.start..at + range.end, escaped));
            return;
        }

        // Before `>` or `/>`, ahead of any trailing whitespace.
        let mut at = tag_end - 1;
        if self.span.is_self_closing() {
            at -= 1;
        }
        while at > self.span.start && self.source[at - 1].is_ascii_whitespace() {
            at -= 1;
        }
        let mut insert = format!(" {name}=\"").into_bytes();
        insert.extend_from_slice(&escaped);
        insert.push(b'"');
        self.edits.push((at..at, insert));
    }

    /// Replace the text of the first `tag` child, appending the child if absent.
    ///
    /// The child is expected to be a leaf; any nested markup is replaced.
    pub fn set_child_text(&mut self, tag: &str, text: &str) {
        let escaped = escape(text);
        let element = format!("<{tag}>{escaped}</{tag}>").into_bytes();
        let child = self
            .element
            .children
            .iter()
            .find(|c| c.tag == tag)
            .and_then(|c| c.span);

        match child {
            Some(child) if child.is_self_closing() => {
                self.edits.push((child.start..child.end, element));
            }
            Some(child) => {
                self.edits.push((
                    child.inner_start..child.inner_end,
                    escaped.into_owned().into_bytes(),
                ));
            }
            None => self.append_child_bytes(element),
        }
    }

    fn append_child_bytes(&mut self, element: Vec<u8>) {
        let span = self.span;
        if span.is_self_closing() {
            let mut replacement = b">".to_vec();
            replacement.extend_from_slice(&element);
            replacement.extend_from_slice(b"</");
            replacement.extend_from_slice(self.element.tag.as_bytes());
            replacement.push(b'>');
            self.edits.push((span.end - 2..span.end, replacement));
            return;
        }

        // Reuse the whitespace that precedes the current last child.
        let mut previous_end = span.inner_start;
        let mut last = None;
        for child in self.element.children.iter().filter_map(|c| c.span) {
            last = Some((previous_end, child));
            previous_end = child.end;
        }
        match last {
            Some((gap_start, child)) => {
                let gap = &self.source[gap_start..child.start];
                let separator = gap
                    .iter()
                    .rposition(|b| *b == b'\n')
                    .map(|idx| &gap[idx..])
                    .filter(|sep| sep.iter().all(u8::is_ascii_whitespace))
                    .map(|sep| {
                        // Keep `\r\n` when the gap used it.
                        let idx = gap.len() - sep.len();
                        if idx > 0 && gap[idx - 1] == b'\r' {
                            &gap[idx - 1..]
                        } else {
                            sep
                        }
                    })
                    .unwrap_or_default();
                let mut insert = separator.to_vec();
                insert.extend_from_slice(&element);
                self.edits.push((child.end..child.end, insert));
            }
            None => self.edits.push((span.inner_end..span.inner_end, element)),
        }
    }

    /// Source bytes of the element with every replacement applied.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.edits.sort_by_key(|(range, _)| (range.start, range.end));
        let mut out = Vec::with_capacity(self.span.end - self.span.start);
        let mut cursor = self.span.start;
        for (range, bytes) in self.edits {
            out.extend_from_slice(&self.source[cursor..range.start]);
            out.extend_from_slice(&bytes);
            cursor = range.end;
        }
        out.extend_from_slice(&self.source[cursor..self.span.end]);
        out
    }
}

/// Locate the (still escaped) value of attribute `name` inside a start tag.
fn find_attribute_value(start_tag: &[u8], name: &str) -> Option<Range<usize>> {
    let len = start_tag.len();
    let mut i = 1;
    while i < len && !start_tag[i].is_ascii_whitespace() && !matches!(start_tag[i], b'/' | b'>') {
        i += 1;
    }

    loop {
        while i < len && start_tag[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= len || matches!(start_tag[i], b'/' | b'>') {
            return None;
        }

        let key_start = i;
        while i < len && !start_tag[i].is_ascii_whitespace() && start_tag[i] != b'=' {
            i += 1;
        }
        let key = &start_tag[key_start..i];
        while i < len && start_tag[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= len || start_tag[i] != b'=' {
            return None;
        }
        i += 1;
        while i < len && start_tag[i].is_ascii_whitespace() {
            i += 1;
        }
        let quote = *start_tag.get(i)?;
        if !matches!(quote, b'"' | b'\'') {
            return None;
        }
        let value_start = i + 1;
        let value_len = start_tag[value_start..].iter().position(|b| *b == quote)?;
        let value_end = value_start + value_len;
        if key == name.as_bytes() {
            return Some(value_start..value_end);
        }
        i = value_end + 1;
    }
}
