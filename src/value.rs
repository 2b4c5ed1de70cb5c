// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! AST types for parsed documents.
//!
//! A [`Node`] couples a [`Value`] with its source span, an optional tag and
//! an optional presentation back-reference. Presentation details live in a
//! per-parse store (see [`crate::presentation`]); nodes only carry an index
//! into it, so the AST itself stays a plain owned tree that callers can
//! freely mutate between parsing and packing.

use serde::{Deserialize, Serialize};

use crate::presentation::PresId;
use crate::span::Span;

/// A node of the document tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Optional tag (from `!tag`), without the leading `!`.
    pub tag: Option<String>,
    /// Span of the tag itself, when present.
    pub tag_span: Option<Span>,
    /// Source span covering the entire node (including the tag).
    pub span: Span,
    /// Presentation details attached to this node, as an index into the
    /// presentation store of the parse that produced it.
    pub presentation: Option<PresId>,
    /// The node's value.
    pub value: Value,
}

/// The value carried by a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A scalar.
    Scalar(Scalar),
    /// A sequence (block or flow).
    Sequence(Sequence),
    /// A mapping (block or flow). Key order is preserved.
    Mapping(Mapping),
}

impl Default for Value {
    fn default() -> Self {
        Self::Scalar(Scalar::Null)
    }
}

/// Scalar sub-kinds.
///
/// Integers are split between `UInt` and `Int`: `Int` is only produced for
/// values that are negative after parsing (`-0` reclassifies to `UInt(0)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    /// `~` or `null`.
    Null,
    /// `true` or `false`.
    Bool(bool),
    /// Non-negative integer.
    UInt(u64),
    /// Negative integer.
    Int(i64),
    /// Floating point, including `.inf`, `-.inf` and `.nan`.
    Double(f64),
    /// Any other scalar text.
    String(String),
}

/// An ordered sequence of nodes.
///
/// `item_pres` holds the presentation slot of each element introducer (the
/// `-` dash in block style); it always has the same length as `items`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    /// The elements, in source order.
    pub items: Vec<Node>,
    /// Per-element presentation slots, parallel to `items`.
    pub item_pres: Vec<Option<PresId>>,
}

/// An ordered mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mapping {
    /// The entries, in source order. Keys are unique.
    pub entries: Vec<Entry>,
}

impl Mapping {
    /// Look up an entry by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| &e.value)
    }
}

/// A single mapping entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// The key text. Keys set in override contexts keep their leading `$`.
    pub key: String,
    /// Span of the key.
    pub key_span: Span,
    /// Presentation slot of the key.
    pub key_pres: Option<PresId>,
    /// The entry's value.
    pub value: Node,
}

impl Node {
    /// Create a node from a value and span.
    #[must_use]
    pub fn new(value: Value, span: Span) -> Self {
        Self {
            tag: None,
            tag_span: None,
            span,
            presentation: None,
            value,
        }
    }

    /// Create a null scalar node.
    #[must_use]
    pub fn null(span: Span) -> Self {
        Self::new(Value::Scalar(Scalar::Null), span)
    }

    /// Create a string scalar node.
    #[must_use]
    pub fn string(s: String, span: Span) -> Self {
        Self::new(Value::Scalar(Scalar::String(s)), span)
    }

    /// Create an empty sequence node.
    #[must_use]
    pub fn sequence(span: Span) -> Self {
        Self::new(Value::Sequence(Sequence::default()), span)
    }

    /// Create an empty mapping node.
    #[must_use]
    pub fn mapping(span: Span) -> Self {
        Self::new(Value::Mapping(Mapping::default()), span)
    }

    /// Append an element to a sequence node. No-op on other kinds.
    pub fn push_item(&mut self, item: Node) {
        if let Value::Sequence(seq) = &mut self.value {
            seq.items.push(item);
            seq.item_pres.push(None);
        }
    }

    /// Append an entry to a mapping node. No-op on other kinds.
    pub fn push_entry(&mut self, key: String, value: Node) {
        if let Value::Mapping(map) = &mut self.value {
            map.entries.push(Entry {
                key,
                key_span: Span::default(),
                key_pres: None,
                value,
            });
        }
    }

    /// Returns `true` if this node is a scalar.
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(self.value, Value::Scalar(_))
    }

    /// Returns `true` if this node is a string scalar.
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self.value, Value::Scalar(Scalar::String(_)))
    }

    /// The data kind as used in override mismatch messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self.value {
            Value::Scalar(_) => "a scalar",
            Value::Sequence(_) => "a sequence",
            Value::Mapping(_) => "an object",
        }
    }

    /// A fuller type description, used in trace logs and variable errors.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match &self.value {
            Value::Scalar(Scalar::Null) => "a null value",
            Value::Scalar(Scalar::Bool(_)) => "a boolean value",
            Value::Scalar(Scalar::UInt(_)) => "an unsigned integer value",
            Value::Scalar(Scalar::Int(_)) => "an integer value",
            Value::Scalar(Scalar::Double(_)) => "a double value",
            Value::Scalar(Scalar::String(_)) => "a string value",
            Value::Sequence(_) => "a sequence",
            Value::Mapping(_) => "an object",
        }
    }

    /// Whether this node or any of its descendants carries a tag.
    ///
    /// Flow style is incompatible with tags; the packer uses this to
    /// downgrade flow hints.
    #[must_use]
    pub fn contains_tags(&self) -> bool {
        if self.tag.is_some() {
            return true;
        }
        match &self.value {
            Value::Scalar(_) => false,
            Value::Sequence(seq) => seq.items.iter().any(Node::contains_tags),
            Value::Mapping(map) => map.entries.iter().any(|e| e.value.contains_tags()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_construction() {
        let span = Span::default();

        let node = Node::null(span);
        assert!(node.is_scalar());
        assert!(!node.is_string());
        assert_eq!(node.kind_name(), "a scalar");

        let node = Node::string("test".to_owned(), span);
        assert!(node.is_string());
        assert_eq!(node.type_name(), "a string value");

        let mut seq = Node::sequence(span);
        seq.push_item(Node::null(span));
        assert_eq!(seq.kind_name(), "a sequence");

        let mut map = Node::mapping(span);
        map.push_entry("key".to_owned(), Node::null(span));
        assert_eq!(map.kind_name(), "an object");
        if let Value::Mapping(m) = &map.value {
            assert!(m.get("key").is_some());
            assert!(m.get("other").is_none());
        }
    }

    #[test]
    fn test_contains_tags() {
        let span = Span::default();
        let mut map = Node::mapping(span);
        map.push_entry("a".to_owned(), Node::null(span));
        assert!(!map.contains_tags());

        let mut tagged = Node::null(span);
        tagged.tag = Some("tag1".to_owned());
        map.push_entry("b".to_owned(), tagged);
        assert!(map.contains_tags());
    }
}
