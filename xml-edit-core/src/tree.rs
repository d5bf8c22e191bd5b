use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// Byte offsets of an element inside the document it was parsed from.
///
/// `start..inner_start` covers the start tag, `inner_start..inner_end` the
/// content and `inner_end..end` the end tag. For a self-closing element all
/// three inner offsets collapse onto `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub inner_start: usize,
    pub inner_end: usize,
    pub end: usize,
}

impl Span {
    /// Whether the element was written as `<tag/>`.
    pub fn is_self_closing(&self) -> bool {
        self.inner_end == self.end
    }
}

/// A generic XML tree node.
///
/// Nodes produced by the parser carry their source [`Span`]; nodes built in
/// memory do not. Spans are ignored by equality.
#[derive(Debug, Clone, Serialize)]
pub struct XmlNode {
    /// Element tag name.
    pub tag: String,
    /// XML attributes keyed by name.
    pub attributes: BTreeMap<String, String>,
    /// Child elements.
    pub children: Vec<XmlNode>,
    /// Optional text content.
    pub text: Option<String>,
    /// Text content was read from (and is written back as) a CDATA section.
    pub cdata: bool,
    /// Location in the source document, if parsed.
    #[serde(skip)]
    pub span: Option<Span>,
}

impl XmlNode {
    /// Create a new XML node with no attributes, children, or text.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
            text: None,
            cdata: false,
            span: None,
        }
    }

    /// Create a leaf node holding `text`.
    pub fn with_text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        let mut node = Self::new(tag);
        node.text = Some(text.into());
        node
    }

    /// Return the first child with the provided tag.
    pub fn get_child(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// Mutable variant of [`XmlNode::get_child`].
    pub fn get_child_mut(&mut self, tag: &str) -> Option<&mut XmlNode> {
        self.children.iter_mut().find(|child| child.tag == tag)
    }

    /// Return all children with the provided tag.
    pub fn get_children(&self, tag: &str) -> Vec<&XmlNode> {
        self.children
            .iter()
            .filter(|child| child.tag == tag)
            .collect()
    }

    /// Walk a nested child path, taking the first match at every step.
    pub fn get_path(&self, path: &[&str]) -> Option<&XmlNode> {
        let mut current = self;
        for segment in path {
            current = current.get_child(segment)?;
        }
        Some(current)
    }

    /// Mutable variant of [`XmlNode::get_path`].
    pub fn get_path_mut(&mut self, path: &[&str]) -> Option<&mut XmlNode> {
        let mut current = self;
        for segment in path {
            current = current.get_child_mut(segment)?;
        }
        Some(current)
    }

    /// Walk a nested child path and return terminal node text if found.
    pub fn get_text<'a>(&'a self, path: &[&str]) -> Option<&'a str> {
        self.get_path(path)?.text.as_deref()
    }

    /// Set the text of the first child named `tag`, appending the child if absent.
    pub fn set_child_text(&mut self, tag: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(child) = self.get_child_mut(tag) {
            child.text = Some(value);
            return;
        }
        self.children.push(XmlNode::with_text(tag, value));
    }

    /// Drop source spans from this node and all descendants.
    ///
    /// Copies of parsed nodes must be detached before they are inserted
    /// elsewhere, otherwise they would still point at the original bytes.
    pub fn detach(&mut self) {
        self.span = None;
        for child in &mut self.children {
            child.detach();
        }
    }
}

impl PartialEq for XmlNode {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
            && self.attributes == other.attributes
            && self.text == other.text
            && self.children == other.children
    }
}

impl Display for XmlNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (key, value) in &self.attributes {
            write!(f, " {}=\"{}\"", key, value)?;
        }

        if self.children.is_empty() && self.text.is_none() {
            return write!(f, "/>");
        }

        write!(f, ">")?;
        if let Some(text) = &self.text {
            write!(f, "{}", text)?;
        }
        for child in &self.children {
            write!(f, "{}", child)?;
        }
        write!(f, "</{}>", self.tag)
    }
}
