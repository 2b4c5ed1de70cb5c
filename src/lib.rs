// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! A YAML-dialect parser and packer preserving editorial presentation.
//!
//! Beyond scalars, sequences and mappings, the dialect supports three
//! intertwined features:
//! - **inclusion**: `!include <path>` transparently embeds another file,
//!   `!includeraw <path>` embeds its verbatim contents as a string;
//! - **overrides**: an object indented under the include line locally
//!   re-specifies values of the included data, leaving the subfile on disk
//!   untouched;
//! - **variables**: `$name` placeholders in included documents, bound with
//!   `$name:` entries by the including document, usable as whole nodes or
//!   spliced into strings.
//!
//! Parsing produces an AST plus a presentation record (comments, empty
//! lines, flow-vs-block style, include and override details); packing the
//! two back yields byte-similar output, and with an output directory set,
//! recreates the include tree with deduplicated subfiles.
//!
//! # Example
//!
//! ```
//! use yaml_doc::{Parser, ParseOptions, Packer};
//!
//! let input = "a: 1 # first\nb: [ 2, 3 ]";
//!
//! let mut parser = Parser::new(ParseOptions {
//!     gen_presentation: true,
//!     ..ParseOptions::default()
//! });
//! parser.attach_str(input);
//! let data = parser.parse().unwrap();
//! let pres = parser.document_presentation(&data);
//!
//! let mut packer = Packer::new();
//! packer.set_presentation(&pres);
//! assert_eq!(packer.pack_to_string(&data).unwrap(), "a: 1 # first\nb: [ 2, 3 ]");
//! ```

mod error;
mod merge;
mod pack;
mod parser;
mod presentation;
mod span;
mod value;
mod variables;

pub use error::{ErrorKind, PackError, ParseError};
pub use pack::{PackFlags, Packer};
pub use parser::{ParseOptions, Parser};
pub use presentation::{
    DocumentPresentation, IncludeInfo, OverrideNode, PresId, PresentationMapping,
    PresentationNode, PresentationOverride,
};
pub use span::{Position, Span};
pub use value::{Entry, Mapping, Node, Scalar, Sequence, Value};

/// Parse an in-memory document without presentation details.
pub fn parse(input: &str) -> Result<Node, ParseError> {
    let mut parser = Parser::new(ParseOptions::default());
    parser.attach_str(input);
    parser.parse()
}
