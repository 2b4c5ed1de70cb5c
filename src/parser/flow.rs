// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! Flow structure parsing (`[ … ]` sequences and `{ … }` mappings).
//!
//! Inside flow containers, block constructs are forbidden and elements are
//! comma-separated. A flow sequence element may itself be an implicit
//! single-entry mapping (`[ a: b ]`); flow mappings accept only
//! `key: value` entries.

use std::collections::HashSet;

use crate::error::{ErrorKind, ParseError};
use crate::span::Span;
use crate::value::{Entry, Mapping, Node, Sequence, Value};

use super::Parser;

/// Result of parsing one flow element: a bare value, or a `key: value`
/// pair to be surfaced as an implicit mapping.
struct FlowKeyData {
    key: Option<(String, Span)>,
    data: Node,
}

impl Parser {
    /// Parse a flow sequence. The cursor sits on `[`.
    pub(crate) fn parse_flow_seq(&mut self) -> Result<Node, ParseError> {
        let pres = self.take_next_pres();
        let start = self.position();
        self.advance_byte(); // '['

        let mut items: Vec<Node> = Vec::new();

        loop {
            self.ltrim()?;
            if self.peek_byte() == Some(b']') {
                self.advance_byte();
                break;
            }

            let kd = self.parse_flow_key_data()?;
            match kd.key {
                Some((key, key_span)) => items.push(self.implicit_obj(key, key_span, kd.data)),
                None => items.push(kd.data),
            }

            self.ltrim()?;
            match self.peek_byte() {
                Some(b']') => {
                    self.advance_byte();
                    break;
                }
                Some(b',') => self.advance_byte(),
                _ => {
                    return Err(self.err_here(
                        ErrorKind::WrongData,
                        "expected another element of sequence",
                    ));
                }
            }
        }

        let item_pres = vec![None; items.len()];
        let mut node = Node {
            span: Span::new(start, self.position()),
            presentation: pres,
            value: Value::Sequence(Sequence { items, item_pres }),
            ..Node::default()
        };
        self.finish_node(&mut node);
        Ok(node)
    }

    /// Parse a flow mapping. The cursor sits on `{`.
    pub(crate) fn parse_flow_obj(&mut self) -> Result<Node, ParseError> {
        let pres = self.take_next_pres();
        let start = self.position();
        self.advance_byte(); // '{'

        let mut entries: Vec<Entry> = Vec::new();
        let mut keys: HashSet<String> = HashSet::new();

        loop {
            self.ltrim()?;
            if self.peek_byte() == Some(b'}') {
                self.advance_byte();
                break;
            }

            let kd = self.parse_flow_key_data()?;
            let Some((key, key_span)) = kd.key else {
                return Err(self.err_at(
                    &kd.data.span,
                    ErrorKind::WrongData,
                    "only key-value mappings are allowed inside an object",
                ));
            };
            if !keys.insert(key.clone()) {
                return Err(self.err_at(
                    &key_span,
                    ErrorKind::InvalidKey,
                    "key is already declared in the object",
                ));
            }
            entries.push(Entry {
                key,
                key_span,
                key_pres: None,
                value: kd.data,
            });

            self.ltrim()?;
            match self.peek_byte() {
                Some(b'}') => {
                    self.advance_byte();
                    break;
                }
                Some(b',') => self.advance_byte(),
                _ => {
                    return Err(self.err_here(
                        ErrorKind::WrongData,
                        "expected another element of object",
                    ));
                }
            }
        }

        let mut node = Node {
            span: Span::new(start, self.position()),
            presentation: pres,
            value: Value::Mapping(Mapping { entries }),
            ..Node::default()
        };
        self.finish_node(&mut node);
        Ok(node)
    }

    /// Parse one flow element: `key: value`, a nested flow container, or a
    /// scalar.
    fn parse_flow_key_data(&mut self) -> Result<FlowKeyData, ParseError> {
        self.ltrim()?;
        if self.at_eof() {
            return Err(self.err_here(ErrorKind::MissingData, "unexpected end of line"));
        }

        if self.startswith_key(false) {
            return self.parse_flow_key_val();
        }

        let data = match self.peek_byte() {
            Some(b'[') => self.parse_flow_seq()?,
            Some(b'{') => self.parse_flow_obj()?,
            _ => self.parse_scalar(true)?,
        };
        Ok(FlowKeyData { key: None, data })
    }

    fn parse_flow_key_val(&mut self) -> Result<FlowKeyData, ParseError> {
        let (key, key_span, _) = self.parse_key(false)?;
        if key.starts_with('$') {
            return Err(self.err_at(
                &key_span,
                ErrorKind::InvalidKey,
                "cannot specify a variable value in this context",
            ));
        }

        self.ltrim()?;
        let inner = self.parse_flow_key_data()?;
        if let Some((_, second_span)) = inner.key {
            // `a: b: c`: point at the second colon.
            let colon = Span::char_at(second_span.end);
            return Err(self.err_at(&colon, ErrorKind::WrongData, "unexpected colon"));
        }

        Ok(FlowKeyData {
            key: Some((key, key_span)),
            data: inner.data,
        })
    }

    /// Wrap a `key: value` pair parsed inside a flow sequence into a
    /// single-entry mapping node.
    fn implicit_obj(&mut self, key: String, key_span: Span, data: Node) -> Node {
        let pres = self.take_next_pres();
        let mut node = Node {
            span: Span::new(key_span.start, data.span.end),
            presentation: pres,
            value: Value::Mapping(Mapping {
                entries: vec![Entry {
                    key,
                    key_span,
                    key_pres: None,
                    value: data,
                }],
            }),
            ..Node::default()
        };
        self.finish_node(&mut node);
        node
    }
}
