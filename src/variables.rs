// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! Variable engine.
//!
//! Included documents may contain `$name` placeholders, bound to values by
//! the including document through `$name:` entries following the include
//! line. A placeholder is either a **whole-value** reference (the leaf's
//! literal is exactly `$name`, replaced wholesale by the bound value) or an
//! **in-string** reference (the leaf contains `$name` amid other text, and
//! every occurrence is textually substituted).
//!
//! Escape sequences are not interpreted during splicing: a `$name`
//! occurrence inside a quoted string is substituted even if preceded by a
//! backslash. This mirrors the source dialect and is a documented
//! limitation rather than a guarantee.

use log::trace;

use crate::parser::Parser;
use crate::value::{Node, Scalar, Value};

/// Recorded uses of one variable name.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct VarUses {
    /// Whole-value references.
    pub(crate) whole: usize,
    /// In-string references (any reference inside a quoted string, or
    /// amid other text).
    pub(crate) in_string: usize,
}

/// Table of open (not yet bound) variables, in first-use order.
#[derive(Debug, Default)]
pub(crate) struct VarTable {
    entries: Vec<(String, VarUses)>,
}

impl VarTable {
    pub(crate) fn add(&mut self, name: &str, in_string: bool) {
        let idx = match self.entries.iter().position(|(n, _)| n == name) {
            Some(idx) => {
                trace!("add new occurrence of variable `{name}`");
                idx
            }
            None => {
                trace!("add new variable `{name}`");
                self.entries.push((name.to_owned(), VarUses::default()));
                self.entries.len() - 1
            }
        };
        let uses = &mut self.entries[idx].1;
        if in_string {
            uses.in_string += 1;
        } else {
            uses.whole += 1;
        }
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub(crate) fn uses(&self, name: &str) -> VarUses {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, u)| *u)
            .unwrap_or_default()
    }

    pub(crate) fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| n != name);
    }

    /// Merge leftover variables of an included document into this table.
    pub(crate) fn merge(&mut self, other: VarTable) {
        for (name, uses) in other.entries {
            trace!("add occurrences of variable `{name}` in including document");
            match self.entries.iter_mut().find(|(n, _)| *n == name) {
                Some((_, mine)) => {
                    mine.whole += uses.whole;
                    mine.in_string += uses.in_string;
                }
                None => self.entries.push((name, uses)),
            }
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

/// Scan a scalar literal for `$name` placeholders: `$` followed by a
/// non-empty alphanumeric run. Returns the distinct names in order of
/// appearance, and whether a single placeholder spans the whole literal.
pub(crate) fn scan_variables(s: &str) -> (Vec<&str>, bool) {
    let mut names: Vec<&str> = Vec::new();
    let mut whole = false;
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        let start = i + 1;
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_alphanumeric() {
            end += 1;
        }
        if end > start {
            let name = &s[start..end];
            if name.len() + 1 == s.len() {
                whole = true;
            }
            if !names.contains(&name) {
                names.push(name);
            }
        }
        i = end.max(start);
    }
    (names, whole)
}

/// Replace every `$name` occurrence in `s` with `value`. Only full
/// alphanumeric-run matches are substituted: `$ab` is left alone when
/// replacing `a`.
pub(crate) fn splice_variable(s: &str, name: &str, value: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            // Copy the raw byte run up to the next '$'.
            let start = i;
            while i < bytes.len() && bytes[i] != b'$' {
                i += 1;
            }
            out.push_str(&s[start..i]);
            continue;
        }
        let start = i + 1;
        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_alphanumeric() {
            end += 1;
        }
        if &s[start..end] == name {
            out.push_str(value);
        } else {
            out.push_str(&s[i..end]);
        }
        i = end.max(i + 1);
    }
    out
}

enum Substitution {
    ReplaceWhole,
    Splice,
    Recurse,
    Keep,
}

/// Substitute `name` throughout the subtree rooted at `data`.
///
/// Leaves whose literal is exactly `$name` are replaced wholesale by
/// `value`; other referencing leaves get every occurrence spliced with
/// `string_value`.
pub(crate) fn substitute_variable(data: &mut Node, name: &str, value: &Node, string_value: &str) {
    let action = match &data.value {
        Value::Scalar(Scalar::String(s)) => {
            let (names, whole) = scan_variables(s);
            if !names.contains(&name) {
                Substitution::Keep
            } else if whole && s.len() == name.len() + 1 {
                Substitution::ReplaceWhole
            } else {
                Substitution::Splice
            }
        }
        Value::Scalar(_) => Substitution::Keep,
        Value::Sequence(_) | Value::Mapping(_) => Substitution::Recurse,
    };

    match action {
        Substitution::ReplaceWhole => {
            trace!("replacing whole variable `{name}` with {}", value.type_name());
            *data = value.clone();
        }
        Substitution::Splice => {
            if let Value::Scalar(Scalar::String(s)) = &mut data.value {
                let new = splice_variable(s, name, string_value);
                trace!("apply replacement {name}={string_value}, data value changed from `{s}` to `{new}`");
                *s = new;
            }
        }
        Substitution::Recurse => match &mut data.value {
            Value::Sequence(seq) => {
                for item in &mut seq.items {
                    substitute_variable(item, name, value, string_value);
                }
            }
            Value::Mapping(map) => {
                for entry in &mut map.entries {
                    substitute_variable(&mut entry.value, name, value, string_value);
                }
            }
            Value::Scalar(_) => {}
        },
        Substitution::Keep => {}
    }
}

impl Parser {
    /// Record the variables used by a freshly parsed string scalar, and
    /// remember its literal so repacking can regenerate the template.
    pub(crate) fn register_variables(&mut self, literal: &str, quoted: bool) {
        let (names, whole) = scan_variables(literal);
        if names.is_empty() {
            return;
        }
        let in_string = quoted || !whole;
        for name in names {
            self.variables.add(name, in_string);
        }
        self.set_value_with_variables(literal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_variables() {
        let (names, whole) = scan_variables("$a");
        assert_eq!(names, vec!["a"]);
        assert!(whole);

        let (names, whole) = scan_variables("$host:$port");
        assert_eq!(names, vec!["host", "port"]);
        assert!(!whole);

        let (names, _) = scan_variables("$foo-$foo-$qux-$foo");
        assert_eq!(names, vec!["foo", "qux"]);

        let (names, _) = scan_variables("no variables here, not even $ alone");
        assert!(names.is_empty());
    }

    #[test]
    fn test_splice_variable() {
        assert_eq!(splice_variable("$host:$port", "port", "80"), "$host:80");
        assert_eq!(splice_variable("<$t>", "t", "x"), "<x>");
        // Only full-run matches: `$ab` is not an occurrence of `a`.
        assert_eq!(splice_variable("$a $ab", "a", "1"), "1 $ab");
        assert_eq!(
            splice_variable("$foo-$foo-$qux-$foo", "foo", "bar"),
            "bar-bar-$qux-bar"
        );
    }
}
