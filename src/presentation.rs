// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! Presentation model: editorial metadata attached to AST positions.
//!
//! Comments, empty lines, flow hints and variable templates are not part of
//! a document's semantics but must survive a parse/repack round-trip. Each
//! parse owns a [`PresStore`] of [`PresentationNode`]s; AST nodes reference
//! entries by [`PresId`]. The flat, serializable form is
//! [`DocumentPresentation`]: a list of `(path, node)` mappings where paths
//! descend with `.key` for mapping entries and `[idx]` for sequence
//! elements, and end with `!` to designate the node itself (as opposed to
//! its key or dash introducer).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::value::{Node, Value};

/// Index of a presentation node inside its parse's store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresId(pub(crate) u32);

/// Editorial metadata for one AST position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationNode {
    /// Comment lines appearing above the node, without the leading `#`.
    pub prefix_comments: Vec<String>,
    /// Trailing `# …` on the node's line.
    pub inline_comment: Option<String>,
    /// Number of blank lines preceding the node, capped at 2.
    pub empty_lines: u8,
    /// Whether the node was written in flow style.
    pub flow_mode: bool,
    /// Original string literal containing `$name` placeholders.
    pub value_with_variables: Option<String>,
    /// Inclusion descriptor, when the node is the root of an included
    /// document.
    pub included: Option<Box<IncludeInfo>>,
}

impl PresentationNode {
    /// A node with no recorded detail carries no information and is
    /// omitted from document presentations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefix_comments.is_empty()
            && self.inline_comment.is_none()
            && self.empty_lines == 0
            && !self.flow_mode
            && self.value_with_variables.is_none()
            && self.included.is_none()
    }
}

/// Inclusion descriptor attached to the root node of an included document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncludeInfo {
    /// Presentation of the `!include <path>` node itself in the including
    /// file (comments around the include line).
    pub include_presentation: Option<PresentationNode>,
    /// The textual argument of `!include`/`!includeraw`.
    pub path: String,
    /// Whether this was a raw inclusion.
    pub raw: bool,
    /// Presentation of the included document, with paths relative to its
    /// own root. Captured before variables and overrides are applied.
    pub document_presentation: DocumentPresentation,
    /// Override applied by the including document, if any.
    pub applied_override: Option<PresentationOverride>,
    /// Names of the variables bound by the including document, in binding
    /// order.
    pub variables: Option<Vec<String>>,
}

/// Recorded override, in merge traversal order.
///
/// The packer replays this record to reconstruct the override block: for
/// each path it emits the current AST value; `original_data` is what the
/// subfile itself contains, so the subfile can be recreated unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresentationOverride {
    /// Overridden positions, relative to the override root.
    pub nodes: Vec<OverrideNode>,
    /// Presentation of the override object itself, so its comments
    /// round-trip.
    pub presentation: DocumentPresentation,
}

/// One overridden position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideNode {
    /// Path relative to the override root (`.key`, `[idx]`, terminal `!`).
    pub path: String,
    /// The value present before the override was applied. Absent for
    /// additions (keys or elements the override introduced).
    pub original_data: Option<Node>,
}

/// The flat, serializable presentation of a whole document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPresentation {
    /// Path-to-node mappings, in depth-first source order.
    pub mappings: Vec<PresentationMapping>,
}

/// One `(path, node)` mapping of a document presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationMapping {
    /// Path from the document root.
    pub path: String,
    /// The presentation details at that path.
    pub node: PresentationNode,
}

/// Per-parse storage for presentation nodes.
#[derive(Debug, Default)]
pub(crate) struct PresStore {
    nodes: Vec<PresentationNode>,
}

impl PresStore {
    pub(crate) fn alloc(&mut self) -> PresId {
        self.nodes.push(PresentationNode::default());
        PresId(self.nodes.len() as u32 - 1)
    }

    pub(crate) fn get(&self, id: PresId) -> &PresentationNode {
        &self.nodes[id.0 as usize]
    }

    pub(crate) fn get_mut(&mut self, id: PresId) -> &mut PresentationNode {
        &mut self.nodes[id.0 as usize]
    }
}

/// In-flight presentation state of a parse.
///
/// This is the cursor described by the parse/presentation recorder: `last`
/// designates the most recently completed node (inline comments attach
/// there), `next` accumulates details for the node about to be created
/// (prefix comments, empty lines).
#[derive(Debug, Default)]
pub(crate) struct EnvPresentation {
    pub(crate) store: PresStore,
    pub(crate) last: Option<PresId>,
    pub(crate) next: Option<PresId>,
}

impl EnvPresentation {
    /// The pending node for the next element, allocating it on first use.
    pub(crate) fn next_node(&mut self) -> &mut PresentationNode {
        let id = match self.next {
            Some(id) => id,
            None => {
                let id = self.store.alloc();
                self.next = Some(id);
                id
            }
        };
        self.store.get_mut(id)
    }

    /// The node of the last completed element, if any element completed.
    pub(crate) fn last_node(&mut self) -> Option<&mut PresentationNode> {
        self.last.map(|id| self.store.get_mut(id))
    }
}

/// Build the flat document presentation of `data` from the given store.
///
/// Empty nodes are skipped; descent stops at included roots, whose inner
/// presentation is already captured in their [`IncludeInfo`].
pub(crate) fn build_document_presentation(
    data: &Node,
    store: &PresStore,
) -> DocumentPresentation {
    let mut pres = DocumentPresentation::default();
    let mut path = String::new();
    add_mappings(data, store, &mut path, &mut pres.mappings);
    pres
}

fn add_mappings(
    data: &Node,
    store: &PresStore,
    path: &mut String,
    out: &mut Vec<PresentationMapping>,
) {
    if let Some(id) = data.presentation {
        let node = store.get(id);
        if !node.is_empty() {
            out.push(PresentationMapping {
                path: format!("{path}!"),
                node: node.clone(),
            });
        }
        if node.included.is_some() {
            return;
        }
    }

    match &data.value {
        Value::Scalar(_) => {}
        Value::Sequence(seq) => {
            let prev_len = path.len();
            for (pos, item) in seq.items.iter().enumerate() {
                path.push_str(&format!("[{pos}]"));
                if let Some(Some(id)) = seq.item_pres.get(pos) {
                    let node = store.get(*id);
                    if !node.is_empty() {
                        out.push(PresentationMapping {
                            path: path.clone(),
                            node: node.clone(),
                        });
                    }
                }
                add_mappings(item, store, path, out);
                path.truncate(prev_len);
            }
        }
        Value::Mapping(map) => {
            let prev_len = path.len();
            for entry in &map.entries {
                path.push('.');
                path.push_str(&entry.key);
                if let Some(id) = entry.key_pres {
                    let node = store.get(id);
                    if !node.is_empty() {
                        out.push(PresentationMapping {
                            path: path.clone(),
                            node: node.clone(),
                        });
                    }
                }
                add_mappings(&entry.value, store, path, out);
                path.truncate(prev_len);
            }
        }
    }
}

/// Path-keyed lookup form of a [`DocumentPresentation`], used when packing.
#[derive(Debug, Clone, Default)]
pub(crate) struct PresMap {
    nodes: HashMap<String, PresentationNode>,
}

impl PresMap {
    pub(crate) fn from_document(pres: &DocumentPresentation) -> Self {
        let mut nodes = HashMap::with_capacity(pres.mappings.len());
        for mapping in &pres.mappings {
            nodes.insert(mapping.path.clone(), mapping.node.clone());
        }
        Self { nodes }
    }

    pub(crate) fn get(&self, path: &str) -> Option<&PresentationNode> {
        self.nodes.get(path)
    }
}
