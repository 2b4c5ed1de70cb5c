// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! Override merging.
//!
//! An override is an object parsed right after an include; its fields are
//! merged into the included subtree. Only merges between values of the
//! same kind are allowed:
//! - scalars: the override overwrites the original value,
//! - sequences: the override's elements are appended,
//! - objects: matched keys recurse, unmatched keys are appended.
//!
//! While merging, each touched position is recorded with its path relative
//! to the override root and, for replaced scalars, the original value.
//! The packer replays these records in order to reconstruct the override
//! block and the untouched subfile.

use log::trace;

use crate::error::{ErrorKind, ParseError};
use crate::parser::Parser;
use crate::presentation::OverrideNode;
use crate::value::{Entry, Node, Value};

/// Accumulates override records during a merge.
#[derive(Debug, Default)]
pub(crate) struct OverrideRecorder {
    pub(crate) nodes: Vec<OverrideNode>,
    path: String,
}

impl OverrideRecorder {
    fn record(&mut self, path: String, original: Option<&Node>) {
        self.nodes.push(OverrideNode {
            path,
            original_data: original.cloned(),
        });
    }
}

/// Merge `override_data` into `data`, recording touched paths in `rec`.
pub(crate) fn merge_data(
    env: &Parser,
    override_data: &Node,
    rec: &mut Option<OverrideRecorder>,
    data: &mut Node,
) -> Result<(), ParseError> {
    if std::mem::discriminant(&data.value) != std::mem::discriminant(&override_data.value) {
        // Replacing mismatched kinds wholesale could hide errors; rejected
        // until a use case settles the semantics.
        let msg = format!(
            "overridden data is {} and not {}",
            data.kind_name(),
            override_data.kind_name()
        );
        return Err(env.err_at(&override_data.span, ErrorKind::InvalidOverride, &msg));
    }

    match &override_data.value {
        Value::Scalar(_) => {
            if let Some(rec) = rec {
                rec.record(format!("{}!", rec.path), Some(data));
            }
            trace!(
                "merging scalar at {}:{}",
                override_data.span.start.line, override_data.span.start.col
            );
            *data = override_data.clone();
        }
        Value::Sequence(override_seq) => {
            // Sequence merges are additive only.
            if let (Value::Sequence(seq), Some(rec)) = (&data.value, rec.as_mut()) {
                let len = seq.items.len();
                for i in 0..override_seq.items.len() {
                    rec.record(format!("{}[{}]", rec.path, len + i), None);
                }
            }
            if let Value::Sequence(seq) = &mut data.value {
                seq.items.extend(override_seq.items.iter().cloned());
                seq.item_pres.extend(override_seq.item_pres.iter().copied());
            }
        }
        Value::Mapping(override_map) => {
            for entry in &override_map.entries {
                if !entry.key.starts_with('$') {
                    merge_entry(env, entry, rec, data)?;
                }
            }
        }
    }

    Ok(())
}

fn merge_entry(
    env: &Parser,
    override_entry: &Entry,
    rec: &mut Option<OverrideRecorder>,
    data: &mut Node,
) -> Result<(), ParseError> {
    let Value::Mapping(map) = &mut data.value else {
        return Ok(());
    };

    if let Some(existing) = map
        .entries
        .iter_mut()
        .find(|e| e.key == override_entry.key)
    {
        let prev_len = rec.as_ref().map_or(0, |r| r.path.len());
        if let Some(rec) = rec {
            rec.path.push('.');
            rec.path.push_str(&override_entry.key);
        }
        merge_data(env, &override_entry.value, rec, &mut existing.value)?;
        if let Some(rec) = rec {
            rec.path.truncate(prev_len);
        }
        return Ok(());
    }

    trace!(
        "merge new key `{}` at {}:{}",
        override_entry.key,
        override_entry.key_span.start.line,
        override_entry.key_span.start.col
    );
    if let Some(rec) = rec {
        let path = format!("{}.{}", rec.path, override_entry.key);
        rec.record(path, None);
    }
    map.entries.push(override_entry.clone());

    Ok(())
}
