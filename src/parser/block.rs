// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! Block structure parsing (block sequences and mappings).

use std::collections::HashSet;

use crate::error::{ErrorKind, ParseError};
use crate::span::Span;
use crate::value::{Entry, Mapping, Node, Sequence, Value};

use super::Parser;

impl Parser {
    /// Parse a block sequence whose dashes sit at column `min_indent`.
    ///
    /// Elements are parsed one indentation level deeper. A following line
    /// at a lesser column ends the sequence; an equal column must carry
    /// another dash; a greater one is misaligned.
    pub(crate) fn parse_seq(&mut self, min_indent: u32) -> Result<Node, ParseError> {
        let seq_pres = self.take_next_pres();
        let start = self.position();
        let mut end = start;
        let mut items: Vec<Node> = Vec::new();
        let mut item_pres = Vec::new();

        loop {
            self.ltrim()?;
            let dash_pres = self.pop_next_node();

            self.advance_byte(); // '-'

            let elem = self.parse_data(min_indent + 1)?;
            self.ltrim()?;

            end = elem.span.end;
            items.push(elem);
            item_pres.push(dash_pres);

            if self.at_eof() {
                break;
            }

            let last_indent = self.column();
            if last_indent < min_indent {
                break;
            }
            if last_indent > min_indent {
                return Err(self.err_here(
                    ErrorKind::WrongIndent,
                    "line not aligned with current sequence",
                ));
            }
            if !self.startswith_seq_prefix() {
                return Err(self.err_here(
                    ErrorKind::WrongData,
                    "expected another element of sequence",
                ));
            }
        }

        let mut node = Node {
            span: Span::new(start, end),
            presentation: seq_pres,
            value: Value::Sequence(Sequence { items, item_pres }),
            ..Node::default()
        };
        self.finish_node(&mut node);
        Ok(node)
    }

    /// Parse a block mapping whose keys sit at column `min_indent`.
    ///
    /// With `only_variables`, parsing stops at the first entry whose key
    /// does not start with `$`; this is how variable settings objects are
    /// carved out ahead of a structural override.
    pub(crate) fn parse_obj(
        &mut self,
        min_indent: u32,
        only_variables: bool,
    ) -> Result<Node, ParseError> {
        let obj_pres = self.take_next_pres();
        let start = self.position();
        let mut end = start;
        let mut entries: Vec<Entry> = Vec::new();
        let mut keys: HashSet<String> = HashSet::new();

        loop {
            if only_variables {
                self.ltrim()?;
                if self.peek_byte() != Some(b'$') {
                    break;
                }
            }

            let (key, key_span, key_pres) = self.parse_key(true)?;
            if !only_variables && key.starts_with('$') {
                return Err(self.err_at(
                    &key_span,
                    ErrorKind::InvalidKey,
                    "cannot specify a variable value in this context",
                ));
            }
            if !keys.insert(key.clone()) {
                return Err(self.err_at(
                    &key_span,
                    ErrorKind::InvalidKey,
                    "key is already declared in the object",
                ));
            }

            // A sequence is allowed to sit at the same column as its key;
            // everything else must be strictly deeper.
            self.ltrim()?;
            let value = if self.startswith_seq_prefix() {
                self.parse_data(min_indent)?
            } else {
                self.parse_data(min_indent + 1)?
            };

            end = value.span.end;
            entries.push(Entry {
                key,
                key_span,
                key_pres,
                value,
            });

            self.ltrim()?;
            if self.at_eof() {
                break;
            }

            let last_indent = self.column();
            if last_indent < min_indent {
                break;
            }
            if last_indent > min_indent {
                return Err(self.err_here(
                    ErrorKind::WrongIndent,
                    "line not aligned with current object",
                ));
            }
        }

        let mut node = Node {
            span: Span::new(start, end),
            presentation: obj_pres,
            value: Value::Mapping(Mapping { entries }),
            ..Node::default()
        };
        self.finish_node(&mut node);
        Ok(node)
    }
}
