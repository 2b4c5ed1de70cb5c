// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! Override reconstruction.
//!
//! While a subfile is being packed, the active override records are keyed
//! by absolute path from the root document: a position whose record holds
//! an original value packs that original into the subfile (and captures
//! the current AST value in exchange), a position recorded as an addition
//! is skipped entirely. Once the subfile is done, the captured values are
//! reassembled, following the recorded path order, into the override block
//! emitted after the include line.

use std::collections::HashMap;

use log::trace;

use crate::error::PackError;
use crate::presentation::{PresMap, PresentationOverride};
use crate::span::Span;
use crate::value::{Entry, Node, Value};

use super::Emitter;

/// One active override while packing.
#[derive(Debug)]
pub(super) struct PackOverride {
    /// Absolute path to override node. Absolute paths are needed because
    /// the override may have been applied through several include levels.
    pub(super) nodes: HashMap<String, PackOverrideNode>,
    /// Absolute paths in recorded order, driving reassembly.
    ordered_paths: Vec<String>,
    /// The parse-time override record.
    presentation: PresentationOverride,
}

#[derive(Debug)]
pub(super) struct PackOverrideNode {
    /// Before the subfile is packed: the original (pre-override) value,
    /// or `None` for additions. Afterwards: the current AST value.
    data: Option<Node>,
    /// Whether the position was seen while packing the AST. Positions
    /// that disappeared from the AST are dropped from the block.
    found: bool,
}

/// Turn a recorded override into its pack-time form, anchored at the
/// current absolute path.
pub(super) fn build_pack_override(
    abs_prefix: &str,
    pres: &PresentationOverride,
) -> PackOverride {
    let mut nodes = HashMap::with_capacity(pres.nodes.len());
    let mut ordered_paths = Vec::with_capacity(pres.nodes.len());
    for node in &pres.nodes {
        let path = format!("{abs_prefix}{}", node.path);
        nodes.insert(
            path.clone(),
            PackOverrideNode {
                data: node.original_data.clone(),
                found: false,
            },
        );
        ordered_paths.push(path);
    }
    PackOverride {
        nodes,
        ordered_paths,
        presentation: pres.clone(),
    }
}

impl Emitter<'_> {
    /// At a value position: when an active override replaced this value,
    /// swap in the recorded original for packing and keep the current
    /// value for the override block.
    pub(super) fn take_override_original(&mut self, current: &Node) -> Option<Node> {
        let idx = self.find_override_idx()?;
        let node = self.shared.overrides[idx].nodes.get_mut(&self.absolute_path)?;
        let original = node.data.take()?;
        trace!("packing non-overridden data in path `{}`", self.absolute_path);
        node.data = Some(current.clone());
        node.found = true;
        Some(original)
    }

    /// At a key or element position: when the position was added by an
    /// override, capture its current value and skip packing it into the
    /// subfile.
    pub(super) fn record_added_data(&mut self, current: &Node) -> bool {
        let Some(idx) = self.find_override_idx() else {
            return false;
        };
        let Some(node) = self.shared.overrides[idx].nodes.get_mut(&self.absolute_path) else {
            return false;
        };
        if node.data.is_some() {
            return false;
        }
        trace!("not packing overridden data in path `{}`", self.absolute_path);
        node.data = Some(current.clone());
        node.found = true;
        true
    }

    /// Innermost active override covering the current absolute path.
    fn find_override_idx(&self) -> Option<usize> {
        if self.shared.overrides.is_empty() {
            return None;
        }
        self.shared
            .overrides
            .iter()
            .rposition(|ov| ov.nodes.contains_key(&self.absolute_path))
    }

    /// Reassemble and emit the override block of a finished include.
    pub(super) fn pack_override(&mut self, ov: PackOverride) -> Result<(), PackError> {
        let Some(data) = build_override_data(&ov) else {
            // Every recorded position disappeared; nothing to emit.
            return Ok(());
        };

        // The block repacks with the override object's own presentation,
        // relative to the override root.
        let saved_pres = self
            .pres
            .replace(PresMap::from_document(&ov.presentation.presentation));
        let saved_pos = self.current_path_pos;
        self.current_path_pos = self.absolute_path.len();

        let res = self.pack_data(&data);

        self.current_path_pos = saved_pos;
        self.pres = saved_pres;
        res
    }
}

/// Rebuild the override object from the recorded paths, in order.
fn build_override_data(ov: &PackOverride) -> Option<Node> {
    let mut out: Option<Node> = None;

    for (pos, abs_path) in ov.ordered_paths.iter().enumerate() {
        let Some(node) = ov.nodes.get(abs_path) else {
            continue;
        };
        if !node.found {
            continue;
        }
        let Some(data) = &node.data else {
            continue;
        };

        // Relative paths rebuild the object shape.
        let relative = &ov.presentation.nodes[pos].path;
        match &mut out {
            Some(out) => apply_path(data, relative, out),
            None => out = Some(build_from_path(data, relative)),
        }
    }

    out
}

/// Create the nested containers a path describes, with `src` at the leaf.
fn build_from_path(src: &Node, path: &str) -> Node {
    if path.is_empty() || path.starts_with('!') {
        return src.clone();
    }
    if let Some(rest) = strip_index(path) {
        let mut seq = Node::sequence(Span::default());
        seq.push_item(build_from_path(src, rest));
        return seq;
    }
    if let Some((key, rest)) = strip_key(path) {
        let mut map = Node::mapping(Span::default());
        map.push_entry(key.to_owned(), build_from_path(src, rest));
        return map;
    }
    src.clone()
}

/// Graft `src` into an existing rebuilt object along `path`.
fn apply_path(src: &Node, path: &str, out: &mut Node) {
    if path.is_empty() || path.starts_with('!') {
        *out = src.clone();
        return;
    }

    if let Some(rest) = strip_index(path) {
        // Recorded indexes are relative to the overridden AST; here only
        // the element order matters.
        if matches!(out.value, Value::Sequence(_)) {
            out.push_item(build_from_path(src, rest));
        }
        return;
    }

    if let Some((key, rest)) = strip_key(path) {
        let Value::Mapping(map) = &mut out.value else {
            return;
        };
        match map.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => apply_path(src, rest, &mut entry.value),
            None => map.entries.push(Entry {
                key: key.to_owned(),
                value: build_from_path(src, rest),
                ..Entry::default()
            }),
        }
    }
}

fn strip_index(path: &str) -> Option<&str> {
    let rest = path.strip_prefix('[')?;
    Some(rest.split_once(']').map_or("", |(_, rest)| rest))
}

fn strip_key(path: &str) -> Option<(&str, &str)> {
    let rest = path.strip_prefix('.')?;
    let end = rest
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(rest.len());
    Some((&rest[..end], &rest[end..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Scalar;

    fn scalar(u: u64) -> Node {
        Node::new(Value::Scalar(Scalar::UInt(u)), Span::default())
    }

    #[test]
    fn test_build_from_path() {
        let node = build_from_path(&scalar(4), ".a!");
        let Value::Mapping(map) = &node.value else {
            panic!("expected mapping");
        };
        assert_eq!(map.entries.len(), 1);
        assert_eq!(map.entries[0].key, "a");
        assert_eq!(map.entries[0].value, scalar(4));
    }

    #[test]
    fn test_apply_path_appends() {
        let mut out = build_from_path(&scalar(1), ".c[2]");
        apply_path(&scalar(2), ".c[3]", &mut out);
        apply_path(&scalar(9), ".d!", &mut out);

        let Value::Mapping(map) = &out.value else {
            panic!("expected mapping");
        };
        assert_eq!(map.entries.len(), 2);
        let Value::Sequence(seq) = &map.entries[0].value.value else {
            panic!("expected sequence");
        };
        assert_eq!(seq.items.len(), 2);
        assert_eq!(map.entries[1].key, "d");
    }
}
