// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! Document parser.
//!
//! The parser is a hand-written recursive descent over a byte cursor,
//! dispatching on the first non-blank character and threading a minimum
//! indentation through every level. Indentation is strict: children sit
//! strictly deeper than their parent, siblings on the same column, with a
//! single documented exception for a sequence dash sitting on its
//! enclosing key's column.
//!
//! All whitespace and comments flow through a single trim routine,
//! [`Parser::ltrim`], which is also the sole producer of presentation
//! details (prefix/inline comments, empty lines).

mod block;
mod flow;
mod include;
mod scalar;

pub(crate) use include::normalize_path;

use std::path::PathBuf;

use log::trace;

use memmap2::Mmap;

use crate::error::{ErrorKind, ParseError, pretty_print_err};
use crate::presentation::{
    DocumentPresentation, EnvPresentation, PresId, build_document_presentation,
};
use crate::span::{Position, Span};
use crate::value::Node;
use crate::variables::VarTable;

/// Flags controlling a parse.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    /// Record presentation details (comments, empty lines, flow hints)
    /// alongside the AST.
    pub gen_presentation: bool,
    /// Accept documents whose variables are not all bound. Without this,
    /// any open variable left after parsing is an error.
    pub allow_unbound_variables: bool,
}

#[derive(Debug)]
enum SourceData {
    Text(String),
    Mapped(Mmap),
}

/// The input attached to a parse: either an in-memory string or a
/// memory-mapped file. The mapping lives as long as the parser, per the
/// context lifecycle.
#[derive(Debug)]
pub(crate) struct Source {
    data: SourceData,
    /// Path as given by the caller, used in error messages.
    pub(crate) filepath: Option<String>,
    /// Simplified path used for inclusion loop detection.
    pub(crate) fullpath: Option<PathBuf>,
}

impl Source {
    fn empty() -> Self {
        Self {
            data: SourceData::Text(String::new()),
            filepath: None,
            fullpath: None,
        }
    }

    pub(crate) fn text(&self) -> &str {
        match &self.data {
            SourceData::Text(s) => s,
            // Validated as UTF-8 when the file was attached.
            SourceData::Mapped(m) => std::str::from_utf8(&m[..]).unwrap_or(""),
        }
    }
}

/// A parse context.
///
/// Construct one with [`Parser::new`], attach an input with
/// [`Parser::attach_str`] or [`Parser::attach_file`], then call
/// [`Parser::parse`]. After a successful parse,
/// [`Parser::document_presentation`] yields the presentation needed to
/// repack the document in its original shape.
#[derive(Debug)]
pub struct Parser {
    pub(crate) source: Source,
    options: ParseOptions,
    attached: bool,

    /// Byte offset of the cursor.
    pub(crate) pos: usize,
    /// Current 1-based line number.
    line: u32,
    /// Byte offset of the first character of the current line.
    line_start: usize,

    /// Presentation recorder, when requested.
    pub(crate) pres: Option<EnvPresentation>,
    /// Open variables of this document.
    pub(crate) variables: VarTable,
    /// Parse contexts of included subfiles. Kept so their mappings live as
    /// long as the root parse.
    subfiles: Vec<Parser>,
    /// Simplified fullpaths of the chain of including files, outermost
    /// first. Used for inclusion loop detection.
    pub(crate) ancestry: Vec<PathBuf>,
    /// Rendered `error in included file` frames of the including chain,
    /// prepended to every error raised in this context.
    pub(crate) err_prefix: String,
}

impl Parser {
    /// Create a parse context with the given options.
    #[must_use]
    pub fn new(options: ParseOptions) -> Self {
        Self {
            source: Source::empty(),
            options,
            attached: false,
            pos: 0,
            line: 1,
            line_start: 0,
            pres: None,
            variables: VarTable::default(),
            subfiles: Vec::new(),
            ancestry: Vec::new(),
            err_prefix: String::new(),
        }
    }

    /// Attach an in-memory document.
    pub fn attach_str(&mut self, input: &str) {
        self.source = Source {
            data: SourceData::Text(input.to_owned()),
            filepath: None,
            fullpath: None,
        };
        self.attached = true;
        self.pos = 0;
        self.line = 1;
        self.line_start = 0;
    }

    pub(crate) fn attach_mapped(&mut self, data: SourceKind, filepath: String, fullpath: PathBuf) {
        self.source = Source {
            data: match data {
                SourceKind::Text(s) => SourceData::Text(s),
                SourceKind::Mapped(m) => SourceData::Mapped(m),
            },
            filepath: Some(filepath),
            fullpath: Some(fullpath),
        };
        self.attached = true;
        self.pos = 0;
        self.line = 1;
        self.line_start = 0;
    }

    /// Parse the attached document into its root node.
    pub fn parse(&mut self) -> Result<Node, ParseError> {
        if !self.attached {
            return Err(ParseError::plain("no input attached".to_owned()));
        }
        if self.options.gen_presentation && self.pres.is_none() {
            self.pres = Some(EnvPresentation::default());
        }

        let data = self.parse_data(0)?;

        self.ltrim()?;
        if !self.at_eof() {
            return Err(self.err_here(ErrorKind::ExtraData, "expected end of document"));
        }

        if !self.variables.is_empty() && !self.options.allow_unbound_variables {
            let names: Vec<&str> = self.variables.names().collect();
            return Err(ParseError::plain(format!(
                "the document is invalid: there are unbound variables: {}",
                names.join(", ")
            )));
        }

        Ok(data)
    }

    /// Build the document presentation of a parsed node.
    ///
    /// Empty when the parse did not request presentation details.
    #[must_use]
    pub fn document_presentation(&self, data: &Node) -> DocumentPresentation {
        match &self.pres {
            Some(pres) => build_document_presentation(data, &pres.store),
            None => DocumentPresentation::default(),
        }
    }

    // ------------------------------------------------------------------
    // Cursor primitives
    // ------------------------------------------------------------------

    pub(crate) fn text(&self) -> &str {
        self.source.text()
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.pos >= self.text().len()
    }

    pub(crate) fn peek_byte(&self) -> Option<u8> {
        self.text().as_bytes().get(self.pos).copied()
    }

    pub(crate) fn rest(&self) -> &[u8] {
        &self.text().as_bytes()[self.pos.min(self.text().len())..]
    }

    /// Advance over one ASCII byte. Newlines must go through
    /// [`Parser::advance_line`] so line accounting stays correct.
    pub(crate) fn advance_byte(&mut self) {
        self.pos += 1;
    }

    pub(crate) fn advance_line(&mut self) {
        self.line += 1;
        self.line_start = self.pos + 1;
        self.pos += 1;
    }

    /// 1-based column of the cursor.
    pub(crate) fn column(&self) -> u32 {
        (self.pos - self.line_start + 1) as u32
    }

    pub(crate) fn position(&self) -> Position {
        Position::new(self.line, self.column(), self.pos)
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    pub(crate) fn err_at(&self, span: &Span, kind: ErrorKind, detail: &str) -> ParseError {
        let msg = format!("{kind}, {detail}");
        let rendered = pretty_print_err(
            self.source.filepath.as_deref(),
            self.text(),
            span,
            &msg,
        );
        ParseError::new(kind, format!("{}{}", self.err_prefix, rendered))
    }

    /// An error with a one-character span at the cursor.
    pub(crate) fn err_here(&self, kind: ErrorKind, detail: &str) -> ParseError {
        self.err_at(&Span::char_at(self.position()), kind, detail)
    }

    // ------------------------------------------------------------------
    // Presentation recorder
    // ------------------------------------------------------------------

    /// Take the pending presentation slot for a node being created.
    pub(crate) fn take_next_pres(&mut self) -> Option<PresId> {
        self.pres.as_mut().and_then(|p| p.next.take())
    }

    /// Mark a node as completed: make sure it owns a presentation slot and
    /// point the recorder's `last` cursor at it, so trailing inline
    /// comments attach there.
    pub(crate) fn finish_node(&mut self, node: &mut Node) {
        if let Some(p) = &mut self.pres {
            let id = match node.presentation {
                Some(id) => id,
                None => {
                    let id = p.store.alloc();
                    node.presentation = Some(id);
                    id
                }
            };
            p.last = Some(id);
        }
    }

    /// Claim the pending slot for a sequence dash or mapping key and make
    /// it the attach point for inline comments.
    pub(crate) fn pop_next_node(&mut self) -> Option<PresId> {
        let p = self.pres.as_mut()?;
        let id = match p.next.take() {
            Some(id) => id,
            None => p.store.alloc(),
        };
        p.last = Some(id);
        Some(id)
    }

    pub(crate) fn set_flow_mode(&mut self) {
        if let Some(p) = &mut self.pres
            && let Some(node) = p.last_node()
        {
            node.flow_mode = true;
            trace!("set flow mode");
        }
    }

    pub(crate) fn set_value_with_variables(&mut self, literal: &str) {
        if let Some(p) = &mut self.pres
            && let Some(node) = p.last_node()
        {
            node.value_with_variables = Some(literal.to_owned());
        }
    }

    fn add_empty_line(&mut self) {
        if let Some(p) = &mut self.pres {
            let node = p.next_node();
            node.empty_lines = (node.empty_lines + 1).min(2);
        }
    }

    fn attach_comment(&mut self, start: usize, end: usize, prefix: bool, out: &mut Vec<String>) {
        if self.pres.is_none() {
            return;
        }
        let text = self.text()[start..end]
            .trim_start_matches('#')
            .trim()
            .to_owned();
        if prefix {
            trace!("adding prefix comment `{text}`");
            out.push(text);
        } else if let Some(p) = &mut self.pres
            && let Some(node) = p.last_node()
            && node.inline_comment.is_none()
        {
            trace!("adding inline comment `{text}`");
            node.inline_comment = Some(text);
        }
    }

    // ------------------------------------------------------------------
    // Trimming
    // ------------------------------------------------------------------

    /// Skip whitespace, comments and empty lines up to the next content.
    ///
    /// This is the single sink for editorial presentation: blank lines
    /// accumulate onto the next node, a `#` starting on a fresh line opens
    /// a prefix comment for the next node, any other `#` an inline comment
    /// for the last completed one. Tabs outside comments are an error.
    pub(crate) fn ltrim(&mut self) -> Result<(), ParseError> {
        let mut comment_start: Option<usize> = None;
        let mut in_comment = false;
        let mut in_new_line = self.column() == 1;
        let mut prefix_comments: Vec<String> = Vec::new();

        while let Some(c) = self.peek_byte() {
            match c {
                b'#' => {
                    if !in_comment {
                        in_comment = true;
                        comment_start = Some(self.pos);
                    }
                    self.advance_byte();
                }
                b'\n' => {
                    if self.line_start == self.pos {
                        self.add_empty_line();
                    }
                    in_comment = false;
                    if let Some(start) = comment_start.take() {
                        let end = self.pos;
                        self.attach_comment(start, end, in_new_line, &mut prefix_comments);
                    }
                    in_new_line = true;
                    self.advance_line();
                }
                b'\t' if !in_comment => {
                    return Err(self.err_here(
                        ErrorKind::TabCharacter,
                        "cannot use tab characters for indentation",
                    ));
                }
                b' ' | b'\r' | 0x0b | 0x0c => self.advance_byte(),
                _ if in_comment => self.advance_byte(),
                _ => break,
            }
        }

        if let Some(start) = comment_start {
            let end = self.pos;
            self.attach_comment(start, end, in_new_line, &mut prefix_comments);
        }

        if !prefix_comments.is_empty()
            && let Some(p) = &mut self.pres
        {
            p.next_node().prefix_comments.extend(prefix_comments);
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookahead
    // ------------------------------------------------------------------

    /// Whether the cursor sits on a block sequence dash (`-` followed by
    /// whitespace).
    pub(crate) fn startswith_seq_prefix(&self) -> bool {
        let rest = self.rest();
        rest.len() >= 2 && rest[0] == b'-' && rest[1].is_ascii_whitespace()
    }

    /// Whether the cursor sits on a mapping key: an optional `$`, an
    /// alphanumeric run, then `:` followed by whitespace or end of input.
    pub(crate) fn startswith_key(&self, must_be_variable: bool) -> bool {
        let rest = self.rest();
        let mut i = 0;
        if rest.first() == Some(&b'$') {
            i = 1;
        } else if must_be_variable {
            return false;
        }
        let name_start = i;
        while i < rest.len() && rest[i].is_ascii_alphanumeric() {
            i += 1;
        }
        if i == name_start || i >= rest.len() {
            return false;
        }
        rest[i] == b':' && (i + 1 == rest.len() || rest[i + 1].is_ascii_whitespace())
    }

    /// Parse a mapping key and its `:`.
    ///
    /// The returned key keeps its leading `$` when present. `with_pres`
    /// claims the pending presentation slot for the key (block mappings);
    /// flow mappings leave the recorder alone.
    pub(crate) fn parse_key(
        &mut self,
        with_pres: bool,
    ) -> Result<(String, Span, Option<PresId>), ParseError> {
        self.ltrim()?;
        let node = if with_pres { self.pop_next_node() } else { None };

        let key_start = self.position();
        let start = self.pos;
        if self.peek_byte() == Some(b'$') {
            self.advance_byte();
        }
        while let Some(c) = self.peek_byte() {
            if c.is_ascii_alphanumeric() {
                self.advance_byte();
            } else {
                break;
            }
        }
        let key = self.text()[start..self.pos].to_owned();
        let key_span = Span::new(key_start, self.position());

        if key.is_empty() {
            return Err(self.err_here(
                ErrorKind::InvalidKey,
                "only alpha-numeric characters allowed",
            ));
        }
        if self.peek_byte() != Some(b':') {
            return Err(self.err_here(ErrorKind::InvalidKey, "missing colon"));
        }
        self.advance_byte();

        Ok((key, key_span, node))
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Parse one value whose content must sit at column `min_indent` or
    /// deeper.
    pub(crate) fn parse_data(&mut self, min_indent: u32) -> Result<Node, ParseError> {
        self.ltrim()?;
        if self.at_eof() {
            return Err(self.err_here(ErrorKind::MissingData, "unexpected end of line"));
        }

        let cur_indent = self.column();
        if cur_indent < min_indent {
            return Err(self.err_here(ErrorKind::WrongIndent, "missing element"));
        }

        let node = match self.peek_byte() {
            Some(b'!') => {
                let mut node = self.parse_tag(min_indent)?;
                self.handle_include(min_indent + 1, &mut node)?;
                node
            }
            Some(b'[') => {
                let node = self.parse_flow_seq()?;
                if let crate::value::Value::Sequence(seq) = &node.value
                    && !seq.items.is_empty()
                {
                    self.set_flow_mode();
                }
                node
            }
            Some(b'{') => {
                let node = self.parse_flow_obj()?;
                if let crate::value::Value::Mapping(map) = &node.value
                    && !map.entries.is_empty()
                {
                    self.set_flow_mode();
                }
                node
            }
            _ if self.startswith_seq_prefix() => self.parse_seq(cur_indent)?,
            _ if self.startswith_key(false) => self.parse_obj(cur_indent, false)?,
            _ => self.parse_scalar(false)?,
        };

        trace!(
            "parsed {} from {}:{} up to {}:{}",
            node.type_name(),
            node.span.start.line,
            node.span.start.col,
            node.span.end.line,
            node.span.end.col
        );
        Ok(node)
    }

    /// Parse a `!tag` and the data it applies to.
    fn parse_tag(&mut self, min_indent: u32) -> Result<Node, ParseError> {
        let tag_start = self.position();
        self.advance_byte(); // '!'

        if !self.peek_byte().is_some_and(|c| c.is_ascii_alphabetic()) {
            return Err(self.err_here(ErrorKind::InvalidTag, "must start with a letter"));
        }
        let start = self.pos;
        while let Some(c) = self.peek_byte() {
            if c.is_ascii_alphanumeric() || c == b'.' {
                self.advance_byte();
            } else {
                break;
            }
        }
        if !self.peek_byte().is_some_and(|c| c.is_ascii_whitespace()) {
            return Err(self.err_here(
                ErrorKind::InvalidTag,
                "must only contain alphanumeric characters",
            ));
        }
        let tag = self.text()[start..self.pos].to_owned();
        let tag_end = self.position();

        let mut node = self.parse_data(min_indent)?;
        if node.tag.is_some() {
            return Err(self.err_here(ErrorKind::WrongObject, "two tags have been declared"));
        }

        node.tag = Some(tag);
        node.span.start = tag_start;
        node.tag_span = Some(Span::new(tag_start, tag_end));

        Ok(node)
    }

    pub(crate) fn add_subfile(&mut self, subfile: Parser) {
        self.subfiles.push(subfile);
    }
}

/// Owned input handed to [`Parser::attach_mapped`].
#[derive(Debug)]
pub(crate) enum SourceKind {
    Text(String),
    Mapped(Mmap),
}
