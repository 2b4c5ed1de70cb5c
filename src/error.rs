// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! Error types for parsing and packing.
//!
//! Parse errors are rendered eagerly: the message stored in [`ParseError`]
//! is the final, pretty-printed text, including the source line and a caret
//! indication, and, for errors inside included files, the whole inclusion
//! chain. This keeps error values self-contained once the parse context is
//! gone.

use derive_more::Display;

use crate::span::Span;

/// The kind of parse error.
///
/// The display strings are the exact prefixes surfaced in rendered
/// messages, followed by `, <detail>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ErrorKind {
    /// Malformed or duplicate mapping key.
    #[display("invalid key")]
    InvalidKey,

    /// Malformed quoted string.
    #[display("expected string")]
    ExpectedString,

    /// A value was expected and none was found.
    #[display("missing data")]
    MissingData,

    /// A value of another kind was expected.
    #[display("wrong type of data")]
    WrongData,

    /// Line not aligned with the enclosing block structure.
    #[display("wrong indentation")]
    WrongIndent,

    /// Structural error on an object or tagged node.
    #[display("wrong object")]
    WrongObject,

    /// Tab used in indentation.
    #[display("tab character detected")]
    TabCharacter,

    /// Malformed tag.
    #[display("invalid tag")]
    InvalidTag,

    /// Trailing content after the root value.
    #[display("extra characters after data")]
    ExtraData,

    /// Malformed or unresolvable inclusion.
    #[display("invalid include")]
    InvalidInclude,

    /// Override kind does not match the overridden data.
    #[display("cannot change types of data in override")]
    InvalidOverride,
}

/// An error produced while parsing a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The error kind, when the error is positioned in a document.
    /// `None` for file attachment failures and the post-parse
    /// unbound-variables diagnostic.
    pub kind: Option<ErrorKind>,
    message: String,
}

impl ParseError {
    /// Create an error from an already rendered message.
    #[must_use]
    pub fn new(kind: ErrorKind, message: String) -> Self {
        Self {
            kind: Some(kind),
            message,
        }
    }

    /// Create a kind-less error (attachment failures, unbound variables).
    #[must_use]
    pub fn plain(message: String) -> Self {
        Self {
            kind: None,
            message,
        }
    }

    /// The rendered message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ParseError {}

/// An error produced while packing a document.
///
/// Packing errors are I/O-shaped: they carry the offending path and the
/// underlying system error text verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackError {
    message: String,
}

impl PackError {
    /// Create a pack error from a rendered message.
    #[must_use]
    pub fn new(message: String) -> Self {
        Self { message }
    }

    /// The rendered message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for PackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for PackError {}

/// Render an error location the way the original documents are diagnosed:
/// `<filepath>:<line>:<col>: <message>`, followed by the source line and a
/// caret indication. `filepath` defaults to `<string>` for in-memory
/// parses. Returns the text without a trailing newline.
pub(crate) fn pretty_print_err(
    filepath: Option<&str>,
    source: &str,
    span: &Span,
    message: &str,
) -> String {
    let mut out = format!(
        "{}:{}:{}: {}",
        filepath.unwrap_or("<string>"),
        span.start.line,
        span.start.col,
        message
    );

    let one_liner = span.is_one_line();

    // Recover the full line containing the start position.
    let line_start = span.start.offset - (span.start.col as usize - 1);
    let mut line_end = if one_liner {
        span.end.offset.saturating_sub(1).max(line_start)
    } else {
        line_start
    };
    let bytes = source.as_bytes();
    while line_end < bytes.len() && bytes[line_end] != b'\n' {
        line_end += 1;
    }
    if line_end <= line_start {
        return out;
    }

    out.push('\n');
    out.push_str(&source[line_start..line_end]);
    out.push('\n');

    for _ in 1..span.start.col {
        out.push(' ');
    }
    if one_liner {
        let width = span.end.col.saturating_sub(span.start.col).max(1);
        for _ in 0..width {
            out.push('^');
        }
    } else {
        out.push_str("^ starting here");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Position;

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::InvalidKey.to_string(), "invalid key");
        assert_eq!(ErrorKind::WrongData.to_string(), "wrong type of data");
        assert_eq!(
            ErrorKind::InvalidOverride.to_string(),
            "cannot change types of data in override"
        );
    }

    #[test]
    fn test_pretty_print_caret() {
        let source = "key:";
        let span = Span::char_at(Position::new(1, 5, 4));
        let msg = pretty_print_err(None, source, &span, "missing data, unexpected end of line");
        assert_eq!(
            msg,
            "<string>:1:5: missing data, unexpected end of line\nkey:\n    ^"
        );
    }

    #[test]
    fn test_pretty_print_empty_input() {
        let span = Span::char_at(Position::new(1, 1, 0));
        let msg = pretty_print_err(None, "", &span, "missing data, unexpected end of line");
        assert_eq!(msg, "<string>:1:1: missing data, unexpected end of line");
    }

    #[test]
    fn test_pretty_print_wide_span() {
        let source = "foo: 2";
        let span = Span::new(Position::new(1, 1, 0), Position::new(1, 4, 3));
        let msg = pretty_print_err(
            Some("input.yml"),
            source,
            &span,
            "invalid key, key is already declared in the object",
        );
        assert_eq!(
            msg,
            "input.yml:1:1: invalid key, key is already declared in the object\nfoo: 2\n^^^"
        );
    }
}
