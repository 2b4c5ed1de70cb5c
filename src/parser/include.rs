// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! Include resolution.
//!
//! A `!include <path>` node is transparently replaced by the parsed
//! content of the subfile; `!includeraw` by a string scalar holding its
//! verbatim bytes. Subfiles are resolved relative to the including file's
//! directory and may never escape it. The inclusion graph must be acyclic;
//! loops are detected by tracing the full chain of including files.
//!
//! After the include itself, the including document may bind variables
//! (`$name:` entries) and apply an override object; both sit at an indent
//! deeper than the include line.

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use log::trace;

use memmap2::Mmap;

use crate::error::{ErrorKind, ParseError, pretty_print_err};
use crate::merge::{OverrideRecorder, merge_data};
use crate::presentation::{IncludeInfo, PresentationOverride};
use crate::value::{Node, Scalar, Value};
use crate::variables::{VarTable, substitute_variable};

use super::{Parser, ParseOptions, SourceKind};

impl Parser {
    /// Attach a file to this context, memory-mapping its contents.
    ///
    /// When `dirpath` is given, the file must live inside it; paths
    /// escaping the directory are rejected. The path is simplified
    /// lexically and remembered for inclusion loop detection.
    pub fn attach_file(
        &mut self,
        filepath: &str,
        dirpath: Option<&Path>,
    ) -> Result<(), ParseError> {
        let candidate = match dirpath {
            Some(dir) => dir.join(filepath),
            None => PathBuf::from(filepath),
        };
        let fullpath = normalize_path(&candidate);

        if let Some(dir) = dirpath {
            let dir = normalize_path(dir);
            if !fullpath.starts_with(&dir) {
                return Err(ParseError::plain(format!(
                    "cannot include subfile `{filepath}`: only includes contained in the \
                     directory of the including file are allowed"
                )));
            }
        }

        let file = File::open(&fullpath)
            .map_err(|e| ParseError::plain(format!("cannot read file {filepath}: {e}")))?;
        let len = file
            .metadata()
            .map_err(|e| ParseError::plain(format!("cannot read file {filepath}: {e}")))?
            .len();

        let data = if len == 0 {
            SourceKind::Text(String::new())
        } else {
            // SAFETY: the mapping is kept private to this parse context
            // and only read through UTF-8-validated slices.
            let mmap = unsafe { Mmap::map(&file) }
                .map_err(|e| ParseError::plain(format!("cannot read file {filepath}: {e}")))?;
            if std::str::from_utf8(&mmap[..]).is_err() {
                return Err(ParseError::plain(format!(
                    "cannot read file {filepath}: contents are not valid UTF-8"
                )));
            }
            SourceKind::Mapped(mmap)
        };

        self.attach_mapped(data, filepath.to_owned(), fullpath);
        Ok(())
    }

    /// Replace a tagged node by included content when its tag is
    /// `include` or `includeraw`, then apply variable settings and the
    /// override object that may follow.
    pub(crate) fn handle_include(
        &mut self,
        min_indent: u32,
        data: &mut Node,
    ) -> Result<(), ParseError> {
        let raw = match data.tag.as_deref() {
            Some("include") => false,
            Some("includeraw") => true,
            _ => return Ok(()),
        };

        let mut vars = self.do_include(raw, data)?;

        self.handle_variable_settings(min_indent, &mut vars, data)?;
        self.handle_override(min_indent, data)?;

        // Whatever is still unbound may be bound by an outer document.
        self.variables.merge(vars);

        Ok(())
    }

    fn do_include(&mut self, raw: bool, data: &mut Node) -> Result<VarTable, ParseError> {
        self.ltrim()?;

        let include_span = data.span;
        let path = match &data.value {
            Value::Scalar(Scalar::String(s)) => s.clone(),
            _ => {
                let tag = data.tag.as_deref().unwrap_or_default();
                return Err(self.err_at(
                    &include_span,
                    ErrorKind::InvalidInclude,
                    &format!("!{tag} can only be used with strings"),
                ));
            }
        };

        let dirpath = self
            .source
            .fullpath
            .as_deref()
            .and_then(Path::parent)
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        if raw {
            trace!("copying raw subfile {path}");
        } else {
            trace!("parsing subfile {path}");
        }

        let mut subfile = Parser::new(ParseOptions {
            gen_presentation: true,
            allow_unbound_variables: true,
        });
        if let Err(e) = subfile.attach_file(&path, Some(&dirpath)) {
            return Err(self.err_at(&include_span, ErrorKind::InvalidInclude, e.message()));
        }

        if self.has_inclusion_loop(subfile.source.fullpath.as_deref()) {
            return Err(self.err_at(
                &include_span,
                ErrorKind::InvalidInclude,
                "inclusion loop detected",
            ));
        }

        subfile.ancestry = self.ancestry.clone();
        if let Some(fullpath) = &self.source.fullpath {
            subfile.ancestry.push(fullpath.clone());
        }
        subfile.err_prefix = format!(
            "{}{}\n",
            self.err_prefix,
            pretty_print_err(
                self.source.filepath.as_deref(),
                self.text(),
                &include_span,
                "error in included file",
            )
        );

        let mut subdata = if raw {
            Node::string(subfile.text().to_owned(), crate::span::Span::default())
        } else {
            // The subfile's error buffer already carries the full
            // including chain; propagate it untouched.
            subfile.parse()?
        };

        let vars = std::mem::take(&mut subfile.variables);

        if self.pres.is_some() {
            let include_presentation = data
                .presentation
                .and_then(|id| {
                    self.pres
                        .as_ref()
                        .map(|p| p.store.get(id))
                        .filter(|n| !n.is_empty())
                })
                .cloned();
            let inc = IncludeInfo {
                include_presentation,
                path,
                raw,
                document_presentation: subfile.document_presentation(&subdata),
                applied_override: None,
                variables: None,
            };
            // The included root gets a fresh presentation node in this
            // context; its own node describes it within the subfile and
            // was captured in the document presentation above.
            if let Some(p) = &mut self.pres {
                let id = p.store.alloc();
                p.store.get_mut(id).included = Some(Box::new(inc));
                subdata.presentation = Some(id);
            }
        }

        self.add_subfile(subfile);
        *data = subdata;
        Ok(vars)
    }

    fn has_inclusion_loop(&self, newfile: Option<&Path>) -> bool {
        let Some(newfile) = newfile else {
            return false;
        };
        if self.source.fullpath.as_deref() == Some(newfile) {
            return true;
        }
        self.ancestry.iter().any(|p| p == newfile)
    }

    /// Parse the `$name:` settings object that may follow an include and
    /// bind the listed variables throughout the included subtree.
    fn handle_variable_settings(
        &mut self,
        min_indent: u32,
        vars: &mut VarTable,
        data: &mut Node,
    ) -> Result<(), ParseError> {
        self.ltrim()?;
        if self.at_eof() || self.column() < min_indent || !self.startswith_key(true) {
            return Ok(());
        }

        let settings = self.parse_obj(self.column(), true)?;
        trace!(
            "parsed variable values, {} from {}:{} up to {}:{}",
            settings.type_name(),
            settings.span.start.line,
            settings.span.start.col,
            settings.span.end.line,
            settings.span.end.col
        );

        let names = self.replace_variables(&settings, vars, data)?;

        if self.pres.is_some()
            && let Some(inc) = self.include_info_mut(data)
        {
            inc.variables = Some(names);
        }

        Ok(())
    }

    /// Apply each `$name: value` entry of a settings object.
    fn replace_variables(
        &mut self,
        settings: &Node,
        vars: &mut VarTable,
        data: &mut Node,
    ) -> Result<Vec<String>, ParseError> {
        let Value::Mapping(map) = &settings.value else {
            return Ok(Vec::new());
        };

        let mut names = Vec::new();
        for entry in &map.entries {
            let Some(name) = entry.key.strip_prefix('$') else {
                continue;
            };
            names.push(name.to_owned());

            if !vars.contains(name) {
                return Err(self.err_at(
                    &entry.key_span,
                    ErrorKind::InvalidKey,
                    "unknown variable",
                ));
            }

            let uses = vars.uses(name);
            if uses.in_string > 0 && !entry.value.is_scalar() {
                return Err(self.err_at(
                    &entry.value.span,
                    ErrorKind::WrongData,
                    "this variable can only be set with a scalar",
                ));
            }

            // In-string splices stringify non-string scalars through
            // their source span.
            let string_value = match &entry.value.value {
                Value::Scalar(Scalar::String(s)) => s.clone(),
                _ => self.span_text(&entry.value.span).to_owned(),
            };
            substitute_variable(data, name, &entry.value, &string_value);

            vars.remove(name);
        }

        Ok(names)
    }

    fn span_text(&self, span: &crate::span::Span) -> &str {
        let text = self.text();
        let start = span.start.offset.min(text.len());
        let end = span.end.offset.min(text.len());
        &text[start..end]
    }

    /// Parse the override object that may follow an include and merge it
    /// into the included subtree, recording the touched paths.
    fn handle_override(&mut self, min_indent: u32, data: &mut Node) -> Result<(), ParseError> {
        self.ltrim()?;
        if self.at_eof() || self.column() < min_indent || !self.startswith_key(false) {
            return Ok(());
        }

        let override_obj = self.parse_obj(self.column(), false)?;
        trace!(
            "parsed override, {} from {}:{} up to {}:{}",
            override_obj.type_name(),
            override_obj.span.start.line,
            override_obj.span.start.col,
            override_obj.span.end.line,
            override_obj.span.end.col
        );

        let mut rec = self.pres.is_some().then(OverrideRecorder::default);
        merge_data(self, &override_obj, &mut rec, data)?;

        if let Some(rec) = rec {
            let presentation = self.document_presentation(&override_obj);
            if let Some(inc) = self.include_info_mut(data) {
                inc.applied_override = Some(PresentationOverride {
                    nodes: rec.nodes,
                    presentation,
                });
            }
        }

        Ok(())
    }

    fn include_info_mut(&mut self, data: &Node) -> Option<&mut IncludeInfo> {
        let id = data.presentation?;
        self.pres
            .as_mut()
            .and_then(|p| p.store.get_mut(id).included.as_deref_mut())
    }
}

/// Lexically simplify a path: resolve `.` and `..` components without
/// touching the filesystem.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("a/./b.yml")), Path::new("a/b.yml"));
        assert_eq!(normalize_path(Path::new("a/../b.yml")), Path::new("b.yml"));
        assert_eq!(
            normalize_path(Path::new("../b.yml")),
            Path::new("../b.yml")
        );
        assert_eq!(normalize_path(Path::new(".")), Path::new("."));
    }
}
