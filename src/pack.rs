// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! Document packer.
//!
//! The packer turns an AST and a document presentation back into text. A
//! small state machine decides the whitespace between tokens: every write
//! transitions through one of five cursor states (clean, on a sequence
//! dash, on a mapping key, on a newline, after data), and the transition
//! table is what produces the canonical `key: value`, dash alignment and
//! two-space indentation.
//!
//! With an output directory configured, included nodes are recreated as
//! subfiles (see [`subfile`]); otherwise included content is inlined into
//! the current stream.

mod overrides;
mod subfile;

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::PackError;
use crate::presentation::{DocumentPresentation, PresMap, PresentationNode};
use crate::span::Span;
use crate::value::{Entry, Mapping, Node, Scalar, Sequence, Value};

use overrides::PackOverride;

/// Flags controlling a pack.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackFlags {
    /// Inline included content in the top-level stream instead of
    /// creating subfiles.
    pub no_subfiles: bool,
}

/// Cursor state of the packer between writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PackState {
    /// Ready for data; any required separator has been written.
    Clean,
    /// Just wrote a sequence dash.
    OnDash,
    /// Just wrote a mapping `key:`.
    OnKey,
    /// At the start of a line.
    OnNewline,
    /// Just wrote a value.
    AfterData,
}

/// A pack context.
///
/// Configure it (output directory, presentation, flags, file mode), then
/// call one of [`Packer::pack_to_writer`], [`Packer::pack_to_string`] or
/// [`Packer::pack_to_file`].
#[derive(Debug)]
pub struct Packer {
    outdir: Option<PathBuf>,
    pres: Option<PresMap>,
    flags: PackFlags,
    file_mode: u32,
}

impl Default for Packer {
    fn default() -> Self {
        Self::new()
    }
}

impl Packer {
    /// Create a pack context with default settings (no output directory,
    /// no presentation, files created with mode `0644`).
    #[must_use]
    pub fn new() -> Self {
        Self {
            outdir: None,
            pres: None,
            flags: PackFlags::default(),
            file_mode: 0o644,
        }
    }

    /// Set the output directory for subfile recreation. The directory is
    /// created if missing and its path canonicalized.
    pub fn set_outdir(&mut self, dirpath: impl AsRef<Path>) -> Result<(), PackError> {
        self.outdir = Some(prepare_outdir(dirpath.as_ref())?);
        Ok(())
    }

    /// Use a document presentation to drive the output shape.
    pub fn set_presentation(&mut self, pres: &DocumentPresentation) {
        self.pres = Some(PresMap::from_document(pres));
    }

    /// Set pack flags.
    pub fn set_flags(&mut self, flags: PackFlags) {
        self.flags = flags;
    }

    /// Set the mode of created files.
    pub fn set_file_mode(&mut self, mode: u32) {
        self.file_mode = mode;
    }

    /// Pack into an arbitrary writer.
    pub fn pack_to_writer(&mut self, data: &Node, out: &mut dyn Write) -> Result<(), PackError> {
        self.run(data, out).map(|_| ())
    }

    /// Pack into an in-memory string.
    pub fn pack_to_string(&mut self, data: &Node) -> Result<String, PackError> {
        let mut buf: Vec<u8> = Vec::new();
        self.run(data, &mut buf)?;
        String::from_utf8(buf)
            .map_err(|_| PackError::new("packed output is not valid UTF-8".to_owned()))
    }

    /// Pack into a file, creating parent directories as needed. The file
    /// always ends with a newline; subfiles are created next to it unless
    /// an output directory was set explicitly.
    pub fn pack_to_file(
        &mut self,
        filename: impl AsRef<Path>,
        data: &Node,
    ) -> Result<(), PackError> {
        let filename = match &self.outdir {
            Some(outdir) => outdir.join(filename.as_ref()),
            None => filename.as_ref().to_path_buf(),
        };

        let parent = match filename.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        self.set_outdir(&parent)?;

        let mut file = open_output_file(&filename, self.file_mode)?;
        let state = self.run(data, &mut file)?;
        if state != PackState::OnNewline {
            file.write_all(b"\n")
                .map_err(|e| PackError::new(format!("cannot write in output file: {e}")))?;
        }
        file.sync_all().map_err(|e| {
            PackError::new(format!(
                "cannot close output file `{}`: {}",
                filename.display(),
                e
            ))
        })?;
        Ok(())
    }

    fn run(&self, data: &Node, out: &mut dyn Write) -> Result<PackState, PackError> {
        let mut shared = PackShared::default();
        let mut emitter = Emitter {
            out,
            state: PackState::OnNewline,
            indent: 0,
            pres: self.pres.clone(),
            absolute_path: String::new(),
            current_path_pos: 0,
            outdir: self.outdir.clone(),
            flags: self.flags,
            file_mode: self.file_mode,
            shared: &mut shared,
        };
        emitter.pack_data(data)?;
        Ok(emitter.state)
    }
}

/// State shared across nested include packs within one pack invocation.
#[derive(Debug, Default)]
struct PackShared {
    /// Dedup map: chosen subfile path to content hash.
    subfiles: HashMap<PathBuf, u64>,
    /// Stack of active overrides, innermost last.
    overrides: Vec<PackOverride>,
    /// Stack of active variable frames, innermost last. Each frame maps a
    /// bound name to its deduced value.
    active_vars: Vec<Vec<(String, Option<Node>)>>,
}

/// The write-side cursor: output sink, state machine, current path and
/// the per-file configuration.
struct Emitter<'a> {
    out: &'a mut dyn Write,
    state: PackState,
    /// Current indentation, in spaces.
    indent: usize,
    pres: Option<PresMap>,
    /// Path from the root document; includes the path of the including
    /// documents when packing a subfile.
    absolute_path: String,
    /// Start of the current document's path within `absolute_path`.
    current_path_pos: usize,
    outdir: Option<PathBuf>,
    flags: PackFlags,
    file_mode: u32,
    shared: &'a mut PackShared,
}

impl Emitter<'_> {
    // ------------------------------------------------------------------
    // Low-level writing
    // ------------------------------------------------------------------

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), PackError> {
        self.out
            .write_all(bytes)
            .map_err(|e| PackError::new(format!("cannot write in output file: {e}")))
    }

    fn write_str(&mut self, s: &str) -> Result<(), PackError> {
        self.write_raw(s.as_bytes())
    }

    fn write_indent(&mut self) -> Result<(), PackError> {
        for _ in 0..self.indent {
            self.write_raw(b" ")?;
        }
        self.state = PackState::Clean;
        Ok(())
    }

    /// Transition the cursor, emitting the separating whitespace the
    /// transition requires.
    fn goto_state(&mut self, new: PackState) -> Result<(), PackError> {
        use PackState::*;

        match (self.state, new) {
            (Clean, OnNewline) => self.write_raw(b"\n")?,
            (Clean, _) => {}

            // A key or dash goes on the same line as the seq dash.
            (OnDash, Clean | OnKey | OnDash) => self.write_raw(b" ")?,
            (OnDash, OnNewline) => self.write_raw(b"\n")?,
            (OnDash, AfterData) => {}

            (OnKey, Clean) => self.write_raw(b" ")?,
            (OnKey, OnNewline) => self.write_raw(b"\n")?,
            // A nested dash or key starts on its own line after the key.
            (OnKey, OnDash | OnKey) => {
                self.write_raw(b"\n")?;
                self.write_indent()?;
            }
            (OnKey, AfterData) => {}

            (OnNewline, Clean | OnDash | OnKey) => self.write_indent()?,
            (OnNewline, OnNewline | AfterData) => {}

            (AfterData, OnNewline) => self.write_raw(b"\n")?,
            (AfterData, Clean) => self.write_raw(b" ")?,
            (AfterData, OnDash | OnKey) => {
                self.write_raw(b"\n")?;
                self.write_indent()?;
            }
            (AfterData, AfterData) => {}
        }

        self.state = new;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Paths & presentation lookups
    // ------------------------------------------------------------------

    fn push_path(&mut self, segment: &str) -> usize {
        if self.pres.is_none() {
            return 0;
        }
        let prev_len = self.absolute_path.len();
        self.absolute_path.push_str(segment);
        prev_len
    }

    fn pop_path(&mut self, prev_len: usize) {
        if self.pres.is_none() {
            return;
        }
        self.absolute_path.truncate(prev_len);
    }

    fn get_pres_node(&self) -> Option<&PresentationNode> {
        let path = &self.absolute_path[self.current_path_pos..];
        self.pres.as_ref()?.get(path)
    }

    fn pack_empty_lines(&mut self, nb_lines: u8) -> Result<(), PackError> {
        if nb_lines == 0 {
            return Ok(());
        }
        self.goto_state(PackState::OnNewline)?;
        for _ in 0..nb_lines {
            self.write_raw(b"\n")?;
        }
        Ok(())
    }

    fn pack_pres_prefix(&mut self, node: &PresentationNode) -> Result<(), PackError> {
        self.pack_empty_lines(node.empty_lines)?;

        if node.prefix_comments.is_empty() {
            return Ok(());
        }
        self.goto_state(PackState::OnNewline)?;
        for comment in &node.prefix_comments {
            self.goto_state(PackState::Clean)?;
            self.write_str("# ")?;
            self.write_str(comment)?;
            self.write_raw(b"\n")?;
            self.state = PackState::OnNewline;
        }
        Ok(())
    }

    fn pack_pres_inline(&mut self, node: &PresentationNode) -> Result<(), PackError> {
        if let Some(comment) = node.inline_comment.as_deref() {
            self.goto_state(PackState::Clean)?;
            self.write_str("# ")?;
            self.write_str(comment)?;
            self.write_raw(b"\n")?;
            self.state = PackState::OnNewline;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Data
    // ------------------------------------------------------------------

    fn pack_data(&mut self, data: &Node) -> Result<(), PackError> {
        let mut node: Option<PresentationNode> = None;
        let mut replacement: Option<Node> = None;

        if self.pres.is_some() {
            let prev_len = self.push_path("!");
            node = self.get_pres_node().cloned();
            replacement = self.take_override_original(data);
            self.pop_path(prev_len);
        }

        let mut data = match &replacement {
            Some(original) => original,
            None => data,
        };

        // A node included from another file is recreated as a subfile or
        // inlined, depending on the output mode.
        if let Some(n) = &node
            && let Some(inc) = &n.included
        {
            let inc = (**inc).clone();
            return self.pack_included_data(data, &inc);
        }

        let template_holder;
        if let Some(n) = &node {
            if let Some(template) = &n.value_with_variables
                && self.deduce_variable_value(template, data)
            {
                template_holder = Node::string(template.clone(), Span::default());
                data = &template_holder;
            }
            self.pack_pres_prefix(n)?;
        }

        self.pack_tag(data.tag.as_deref())?;

        let use_flow = node.as_ref().is_some_and(|n| n.flow_mode) && self.can_use_flow_mode(data);
        if use_flow {
            self.goto_state(PackState::Clean)?;
            self.pack_flow_data(data, false)?;
            self.state = PackState::AfterData;
        } else {
            match &data.value {
                Value::Scalar(scalar) => self.pack_scalar(scalar)?,
                Value::Sequence(seq) => self.pack_seq(seq)?,
                Value::Mapping(map) => self.pack_obj(map)?,
            }
        }

        if let Some(n) = &node {
            self.pack_pres_inline(n)?;
        }
        Ok(())
    }

    fn pack_tag(&mut self, tag: Option<&str>) -> Result<(), PackError> {
        if let Some(tag) = tag {
            self.goto_state(PackState::Clean)?;
            self.write_raw(b"!")?;
            self.write_str(tag)?;
            self.state = PackState::AfterData;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scalars
    // ------------------------------------------------------------------

    fn pack_scalar(&mut self, scalar: &Scalar) -> Result<(), PackError> {
        self.goto_state(PackState::Clean)?;

        match scalar {
            Scalar::String(s) => self.pack_string(s)?,
            Scalar::Double(d) => self.write_str(&format_double(*d))?,
            Scalar::UInt(u) => self.write_str(&u.to_string())?,
            Scalar::Int(i) => self.write_str(&i.to_string())?,
            Scalar::Bool(true) => self.write_raw(b"true")?,
            Scalar::Bool(false) => self.write_raw(b"false")?,
            Scalar::Null => self.write_raw(b"~")?,
        }

        self.state = PackState::AfterData;
        Ok(())
    }

    fn pack_string(&mut self, val: &str) -> Result<(), PackError> {
        if !string_must_be_quoted(val) {
            return self.write_str(val);
        }

        self.write_raw(b"\"")?;
        for c in val.chars() {
            match c {
                '"' => self.write_raw(b"\\\"")?,
                '\\' => self.write_raw(b"\\\\")?,
                '\x07' => self.write_raw(b"\\a")?,
                '\x08' => self.write_raw(b"\\b")?,
                '\x1b' => self.write_raw(b"\\e")?,
                '\x0c' => self.write_raw(b"\\f")?,
                '\n' => self.write_raw(b"\\n")?,
                '\r' => self.write_raw(b"\\r")?,
                '\t' => self.write_raw(b"\\t")?,
                '\x0b' => self.write_raw(b"\\v")?,
                ' '..='\x7e' => {
                    let mut buf = [0u8; 4];
                    let encoded = c.encode_utf8(&mut buf);
                    self.write_str(encoded)?;
                }
                _ => self.write_str(&format!("\\u{:04x}", c as u32))?,
            }
        }
        self.write_raw(b"\"")
    }

    // ------------------------------------------------------------------
    // Sequences & mappings (block style)
    // ------------------------------------------------------------------

    fn pack_seq(&mut self, seq: &Sequence) -> Result<(), PackError> {
        if seq.items.is_empty() {
            self.goto_state(PackState::Clean)?;
            self.write_raw(b"[]")?;
            self.state = PackState::AfterData;
            return Ok(());
        }

        for (pos, item) in seq.items.iter().enumerate() {
            let prev_len = self.push_path(&format!("[{pos}]"));
            let node = if self.pres.is_some() {
                self.get_pres_node().cloned()
            } else {
                None
            };

            if self.record_added_data(item) {
                self.pop_path(prev_len);
                continue;
            }

            if let Some(n) = &node {
                self.pack_pres_prefix(n)?;
            }

            self.goto_state(PackState::OnDash)?;
            self.write_raw(b"-")?;

            self.indent += 2;
            if let Some(n) = &node {
                self.pack_pres_inline(n)?;
            }
            self.pack_data(item)?;
            self.indent -= 2;

            self.pop_path(prev_len);
        }
        Ok(())
    }

    fn pack_obj(&mut self, map: &Mapping) -> Result<(), PackError> {
        if map.entries.is_empty() {
            self.goto_state(PackState::Clean)?;
            self.write_raw(b"{}")?;
            self.state = PackState::AfterData;
            return Ok(());
        }

        for entry in &map.entries {
            self.pack_key_data(entry)?;
        }
        Ok(())
    }

    fn pack_key_data(&mut self, entry: &Entry) -> Result<(), PackError> {
        let prev_len = self.push_path(&format!(".{}", entry.key));
        let node = if self.pres.is_some() {
            self.get_pres_node().cloned()
        } else {
            None
        };

        if self.record_added_data(&entry.value) {
            self.pop_path(prev_len);
            return Ok(());
        }

        if let Some(n) = &node {
            self.pack_pres_prefix(n)?;
        }

        self.goto_state(PackState::OnKey)?;
        self.write_str(&entry.key)?;
        self.write_raw(b":")?;

        // For scalars the inline comment goes after the value; for a key
        // it is emitted right here, before the nested block.
        self.indent += 2;
        if let Some(n) = &node {
            self.pack_pres_inline(n)?;
        }
        self.pack_data(&entry.value)?;
        self.indent -= 2;

        self.pop_path(prev_len);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Flow style
    // ------------------------------------------------------------------

    fn pack_flow_data(&mut self, data: &Node, can_omit_brackets: bool) -> Result<(), PackError> {
        match &data.value {
            Value::Scalar(scalar) => self.pack_scalar(scalar)?,
            Value::Sequence(seq) => self.pack_flow_seq(seq)?,
            Value::Mapping(map) => self.pack_flow_obj(map, can_omit_brackets)?,
        }
        self.state = PackState::Clean;
        Ok(())
    }

    fn pack_flow_seq(&mut self, seq: &Sequence) -> Result<(), PackError> {
        if seq.items.is_empty() {
            return self.write_raw(b"[]");
        }

        self.write_raw(b"[ ")?;
        for (pos, item) in seq.items.iter().enumerate() {
            if pos > 0 {
                self.write_raw(b", ")?;
            }
            self.pack_flow_data(item, true)?;
        }
        self.write_raw(b" ]")
    }

    /// `can_omit_brackets` keeps a single-entry mapping value inside a
    /// mapping from packing as `a: b: v`, which would not reparse.
    fn pack_flow_obj(&mut self, map: &Mapping, can_omit_brackets: bool) -> Result<(), PackError> {
        if map.entries.is_empty() {
            return self.write_raw(b"{}");
        }

        let omit_brackets = can_omit_brackets && map.entries.len() == 1;
        if !omit_brackets {
            self.write_raw(b"{ ")?;
        }
        for (pos, entry) in map.entries.iter().enumerate() {
            if pos > 0 {
                self.write_raw(b", ")?;
            }
            self.write_str(&entry.key)?;
            self.write_raw(b": ")?;
            self.pack_flow_data(&entry.value, false)?;
        }
        if !omit_brackets {
            self.write_raw(b" }")?;
        }
        Ok(())
    }

    /// Flow style is incompatible with tags, and with positions touched
    /// by an active override (the flow writer does not replay overrides).
    fn can_use_flow_mode(&self, data: &Node) -> bool {
        !self.path_contains_overrides() && !data.contains_tags()
    }

    fn path_contains_overrides(&self) -> bool {
        self.shared.overrides.iter().any(|ov| {
            ov.nodes
                .keys()
                .any(|path| path.starts_with(&self.absolute_path))
        })
    }

    // ------------------------------------------------------------------
    // Variables (pack side)
    // ------------------------------------------------------------------

    /// When the template is a single whole `$name` placeholder and `name`
    /// is bound by an enclosing include, record the current value as the
    /// deduced binding and report that the template should be emitted.
    fn deduce_variable_value(&mut self, template: &str, data: &Node) -> bool {
        let Some(name) = template.strip_prefix('$') else {
            return false;
        };
        if name.is_empty() || !name.bytes().all(|c| c.is_ascii_alphanumeric()) {
            return false;
        }

        for frame in self.shared.active_vars.iter_mut().rev() {
            if let Some(slot) = frame.iter_mut().find(|(n, _)| n == name) {
                log::trace!(
                    "deduced value for variable `{name}` to {}",
                    data.type_name()
                );
                slot.1 = Some(data.clone());
                return true;
            }
        }
        false
    }
}

/// Decide whether a string scalar needs quoting on output.
///
/// `!`, `&`, `*`, `-`, `"` and `.` have special meaning at the start of a
/// scalar; `[` and `{` would read as inline JSON, which the parser does
/// not accept. `:` and `#` are forbidden anywhere, as are non-printable
/// and non-ASCII bytes, leading or trailing spaces, and the null
/// spellings.
pub(crate) fn string_must_be_quoted(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    let bytes = s.as_bytes();
    if matches!(
        bytes[0],
        b'!' | b'"' | b'&' | b'*' | b'-' | b'.' | b'[' | b'{'
    ) {
        return true;
    }
    if bytes
        .iter()
        .any(|&c| !(0x20..=0x7e).contains(&c) || c == b':' || c == b'#')
    {
        return true;
    }
    if s.starts_with(' ') || s.ends_with(' ') {
        return true;
    }
    s == "~" || s == "null"
}

fn format_double(d: f64) -> String {
    if d.is_nan() {
        ".NaN".to_owned()
    } else if d == f64::INFINITY {
        ".Inf".to_owned()
    } else if d == f64::NEG_INFINITY {
        "-.Inf".to_owned()
    } else {
        format!("{d}")
    }
}

fn open_output_file(path: &Path, mode: u32) -> Result<fs::File, PackError> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    options
        .open(path)
        .map_err(|e| PackError::new(format!("cannot open output file `{}`: {}", path.display(), e)))
}

fn prepare_outdir(dir: &Path) -> Result<PathBuf, PackError> {
    fs::create_dir_all(dir)
        .map_err(|e| PackError::new(format!("could not create output directory: {e}")))?;
    dir.canonicalize().map_err(|e| {
        PackError::new(format!(
            "cannot compute path to output directory `{}`: {}",
            dir.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_must_be_quoted() {
        assert!(string_must_be_quoted(""));
        assert!(string_must_be_quoted("~"));
        assert!(string_must_be_quoted("null"));
        assert!(string_must_be_quoted("!tag"));
        assert!(string_must_be_quoted("-dash"));
        assert!(string_must_be_quoted(".dot"));
        assert!(string_must_be_quoted("[json"));
        assert!(string_must_be_quoted("a:b"));
        assert!(string_must_be_quoted("a#b"));
        assert!(string_must_be_quoted(" lead"));
        assert!(string_must_be_quoted("trail "));
        assert!(string_must_be_quoted("café"));

        assert!(!string_must_be_quoted("plain"));
        assert!(!string_must_be_quoted("w.i.t.h dots"));
        assert!(!string_must_be_quoted("$var"));
        assert!(!string_must_be_quoted("80"));
    }

    #[test]
    fn test_format_double() {
        assert_eq!(format_double(3.14), "3.14");
        assert_eq!(format_double(3.0), "3");
        assert_eq!(format_double(f64::INFINITY), ".Inf");
        assert_eq!(format_double(f64::NEG_INFINITY), "-.Inf");
        assert_eq!(format_double(f64::NAN), ".NaN");
    }
}
