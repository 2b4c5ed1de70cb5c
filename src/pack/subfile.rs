// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! Subfile recreation.
//!
//! With an output directory configured, each included node is packed into
//! its own file again. Identical subfiles are shared: the dedup map
//! associates every chosen path with a 64-bit hash of its content, and a
//! path conflict with differing content probes `base~1.ext`, `base~2.ext`,
//! … until a free or identical slot is found.
//!
//! Packing a subfile happens in a child emitter writing to a buffer: the
//! content must be known before the file name can be chosen, and packing
//! may resolve override and variable records held by the parent.

use std::fs;
use std::hash::Hasher;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::trace;

use rustc_hash::FxHasher;

use crate::error::PackError;
use crate::parser::normalize_path;
use crate::presentation::{IncludeInfo, PresMap};
use crate::value::{Node, Scalar, Value};

use super::{Emitter, PackState, open_output_file, prepare_outdir};

enum SubfileStatus {
    Create,
    Reuse,
    Ignore,
}

impl Emitter<'_> {
    /// Pack a node that is the root of an included document: recreate the
    /// subfile when an output directory is configured, inline its content
    /// otherwise.
    pub(super) fn pack_included_data(
        &mut self,
        data: &Node,
        inc: &IncludeInfo,
    ) -> Result<(), PackError> {
        if self.outdir.is_some() && !self.flags.no_subfiles {
            return self.pack_include_with_override(inc, data);
        }

        // Inline the included content in the current stream, driving the
        // output with the subfile's own presentation.
        let saved_pres = self
            .pres
            .replace(PresMap::from_document(&inc.document_presentation));
        let saved_pos = self.current_path_pos;
        self.current_path_pos = self.absolute_path.len();

        let res = self.pack_data(data);

        self.current_path_pos = saved_pos;
        self.pres = saved_pres;
        res
    }

    fn pack_include_with_override(
        &mut self,
        inc: &IncludeInfo,
        subdata: &Node,
    ) -> Result<(), PackError> {
        let pushed_override = match &inc.applied_override {
            Some(ov) => {
                let pack_override = super::overrides::build_pack_override(&self.absolute_path, ov);
                self.shared.overrides.push(pack_override);
                true
            }
            None => false,
        };
        if let Some(names) = &inc.variables {
            let frame = names.iter().map(|n| (n.clone(), None)).collect();
            self.shared.active_vars.push(frame);
        }

        self.pack_included_subfile(inc, subdata)?;

        if inc.variables.is_some() {
            self.pack_variable_settings()?;
        }

        if pushed_override
            && let Some(ov) = self.shared.overrides.pop()
        {
            trace!("packing override {}", inc.path);
            self.pack_override(ov)?;
        }

        Ok(())
    }

    fn pack_included_subfile(
        &mut self,
        inc: &IncludeInfo,
        subdata: &Node,
    ) -> Result<(), PackError> {
        // A raw include whose node is no longer a string can only be
        // packed as a regular include.
        let raw = inc.raw && subdata.is_string();

        let mut contents: Vec<u8> = Vec::new();
        if raw {
            if let Value::Scalar(Scalar::String(s)) = &subdata.value {
                contents.extend_from_slice(s.as_bytes());
            }
        } else {
            let child_outdir = match &self.outdir {
                Some(outdir) => {
                    let full = outdir.join(&inc.path);
                    let dir = full
                        .parent()
                        .filter(|p| !p.as_os_str().is_empty())
                        .map_or_else(|| outdir.clone(), Path::to_path_buf);
                    let dir = prepare_outdir(&dir).map_err(|e| {
                        PackError::new(format!(
                            "cannot pack subfile `{}`: {}",
                            inc.path,
                            e.message()
                        ))
                    })?;
                    Some(dir)
                }
                None => None,
            };

            let absolute_path = self.absolute_path.clone();
            let current_path_pos = absolute_path.len();
            let flags = self.flags;
            let file_mode = self.file_mode;
            {
                let mut child = Emitter {
                    out: &mut contents,
                    state: PackState::OnNewline,
                    indent: 0,
                    pres: Some(PresMap::from_document(&inc.document_presentation)),
                    absolute_path,
                    current_path_pos,
                    outdir: child_outdir,
                    flags,
                    file_mode,
                    shared: &mut *self.shared,
                };
                child.pack_data(subdata).map_err(|e| {
                    PackError::new(format!(
                        "cannot pack subfile `{}`: {}",
                        inc.path,
                        e.message()
                    ))
                })?;
            }
            // Subfiles always end with a newline.
            if !contents.ends_with(b"\n") {
                contents.push(b'\n');
            }
        }

        let (path, reuse) = self.find_right_path(&contents, &inc.path);
        if reuse {
            trace!("subfile `{path}` reused");
        } else {
            trace!("writing {}subfile {}", if raw { "raw " } else { "" }, path);
            self.write_subfile(&path, &contents)?;
        }

        self.pack_include_path(inc, raw, &path)
    }

    /// Emit the `!include <path>` node itself, with the presentation it
    /// had in the including file.
    fn pack_include_path(
        &mut self,
        inc: &IncludeInfo,
        raw: bool,
        path: &str,
    ) -> Result<(), PackError> {
        if let Some(node) = &inc.include_presentation {
            self.pack_pres_prefix(node)?;
        }

        self.pack_tag(Some(if raw { "includeraw" } else { "include" }))?;
        self.goto_state(PackState::Clean)?;
        self.pack_string(path)?;
        self.state = PackState::AfterData;

        if let Some(node) = &inc.include_presentation {
            self.pack_pres_inline(node)?;
        }
        Ok(())
    }

    /// Choose the on-disk path for a subfile: the include's own path if
    /// unused or already holding identical content, else the first free
    /// `base~N.ext`.
    fn find_right_path(&mut self, contents: &[u8], initial_path: &str) -> (String, bool) {
        let mut hasher = FxHasher::default();
        hasher.write(contents);
        let checksum = hasher.finish();

        let simplified = normalize_path(Path::new(initial_path));
        let ext = simplified
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let base = simplified.with_extension("");
        let base = base.to_string_lossy();

        let mut path = simplified.to_string_lossy().into_owned();
        let mut counter = 1;
        loop {
            match self.check_subfile(checksum, &path) {
                SubfileStatus::Create => return (path, false),
                SubfileStatus::Reuse => return (path, true),
                SubfileStatus::Ignore => {
                    trace!(
                        "should have reused subfile `{path}`, but the packed data is different"
                    );
                    path = format!("{base}~{counter}{ext}");
                    counter += 1;
                }
            }
        }
    }

    fn check_subfile(&mut self, checksum: u64, relative: &str) -> SubfileStatus {
        use std::collections::hash_map::Entry;

        let full = match &self.outdir {
            Some(outdir) => outdir.join(relative),
            None => PathBuf::from(relative),
        };
        match self.shared.subfiles.entry(full) {
            Entry::Occupied(e) => {
                if *e.get() == checksum {
                    SubfileStatus::Reuse
                } else {
                    SubfileStatus::Ignore
                }
            }
            Entry::Vacant(v) => {
                v.insert(checksum);
                SubfileStatus::Create
            }
        }
    }

    fn write_subfile(&self, relative: &str, contents: &[u8]) -> Result<(), PackError> {
        let Some(outdir) = &self.outdir else {
            return Ok(());
        };
        let full = outdir.join(relative);

        if let Some(parent) = full.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                PackError::new(format!(
                    "error when writing subfile `{relative}`: could not create output \
                     directory: {e}"
                ))
            })?;
        }

        let mut file = open_output_file(&full, self.file_mode)
            .map_err(|e| PackError::new(format!("error when writing subfile `{relative}`: {e}")))?;
        file.write_all(contents).map_err(|e| {
            PackError::new(format!(
                "error when writing subfile `{relative}`: cannot write in output file: {e}"
            ))
        })?;
        file.sync_all().map_err(|e| {
            PackError::new(format!(
                "error when writing subfile `{relative}`: cannot close output file: {e}"
            ))
        })?;
        Ok(())
    }

    /// Flush the innermost variable frame as a `$name:` settings object
    /// right after its include line.
    fn pack_variable_settings(&mut self) -> Result<(), PackError> {
        let Some(frame) = self.shared.active_vars.pop() else {
            return Ok(());
        };

        let mut settings = Node::mapping(crate::span::Span::default());
        for (name, value) in frame {
            if let Some(value) = value {
                settings.push_entry(format!("${name}"), value);
            }
        }
        if let Value::Mapping(map) = &settings.value
            && map.entries.is_empty()
        {
            return Ok(());
        }

        // Values repack plainly; the settings block has no presentation
        // of its own.
        let saved_pres = self.pres.take();
        let res = self.pack_data(&settings);
        self.pres = saved_pres;
        res
    }
}
