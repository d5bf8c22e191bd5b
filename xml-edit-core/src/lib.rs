//! Lossless XML parsing, fragment writing and in-place document editing.

pub mod document;
pub mod fragment;
pub mod parser;
pub mod tree;
pub mod writer;

pub use document::{Document, EditError};
pub use fragment::ElementCopy;
pub use parser::{parse, parse_file, ParseError};
pub use tree::{Span, XmlNode};
pub use writer::{write, write_fragment, Layout, WriteError};
