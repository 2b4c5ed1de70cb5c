// Copyright (c) 2026 Arista Networks, Inc.
// Use of this source code is governed by the Apache License 2.0
// that can be found in the LICENSE file.

//! Integration tests over real files: inclusion, overrides, variables,
//! subfile recreation and sharing, and error chains.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use yaml_doc::{
    DocumentPresentation, Node, PackFlags, Packer, ParseError, ParseOptions, Parser, Scalar,
    Value,
};

fn write_file(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn parse_file(dir: &Path, name: &str) -> Result<(Node, DocumentPresentation), ParseError> {
    let mut parser = Parser::new(ParseOptions {
        gen_presentation: true,
        allow_unbound_variables: false,
    });
    parser.attach_file(name, Some(dir))?;
    let data = parser.parse()?;
    let pres = parser.document_presentation(&data);
    Ok((data, pres))
}

fn parse_file_fail(dir: &Path, name: &str) -> String {
    parse_file(dir, name)
        .expect_err("parse should fail")
        .message()
        .to_owned()
}

/// Pack in memory, inlining included content.
fn pack_inline(data: &Node, pres: &DocumentPresentation) -> String {
    let mut packer = Packer::new();
    packer.set_presentation(pres);
    packer.pack_to_string(data).expect("pack failed")
}

/// Pack `root.yml` plus its subfiles into `outdir`.
fn pack_files(outdir: &Path, data: &Node, pres: &DocumentPresentation) {
    let mut packer = Packer::new();
    packer.set_outdir(outdir).expect("set_outdir failed");
    packer.set_presentation(pres);
    packer.pack_to_file("root.yml", data).expect("pack failed");
}

fn read_file(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).expect("missing packed file")
}

fn set_entry(node: &mut Node, key: &str, scalar: Scalar) {
    let Value::Mapping(map) = &mut node.value else {
        panic!("expected mapping");
    };
    let entry = map
        .entries
        .iter_mut()
        .find(|e| e.key == key)
        .expect("missing key");
    entry.value.value = Value::Scalar(scalar);
}

// ----------------------------------------------------------------------
// Includes
// ----------------------------------------------------------------------

#[test]
fn test_include_inlines_subfile_content() {
    let tmp = TempDir::new().unwrap();
    write_file(
        tmp.path(),
        "inner.yml",
        "- a: 3\n  b: { c: c }\n- true",
    );
    write_file(
        tmp.path(),
        "root.yml",
        "a: ~\nb: !include inner.yml\nc: 3",
    );

    let (data, pres) = parse_file(tmp.path(), "root.yml").unwrap();
    assert_eq!(
        pack_inline(&data, &pres),
        "a: ~\nb:\n  - a: 3\n    b: { c: c }\n  - true\nc: 3"
    );
}

#[test]
fn test_include_in_subdirectory() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "sub/inner.yml", "x: 1\n");
    write_file(tmp.path(), "root.yml", "a: !include sub/inner.yml\n");

    let (data, pres) = parse_file(tmp.path(), "root.yml").unwrap();
    assert_eq!(pack_inline(&data, &pres), "a:\n  x: 1");

    let out = TempDir::new().unwrap();
    pack_files(out.path(), &data, &pres);
    assert_eq!(read_file(out.path(), "root.yml"), "a: !include sub/inner.yml\n");
    assert_eq!(read_file(out.path(), "sub/inner.yml"), "x: 1\n");
}

#[test]
fn test_include_raw() {
    let tmp = TempDir::new().unwrap();
    let blob = "not yaml: [\njust bytes\n";
    write_file(tmp.path(), "blob.txt", blob);
    write_file(tmp.path(), "root.yml", "data: !includeraw blob.txt\n");

    let (data, pres) = parse_file(tmp.path(), "root.yml").unwrap();
    let Value::Mapping(map) = &data.value else {
        panic!("expected mapping");
    };
    assert!(matches!(
        &map.entries[0].value.value,
        Value::Scalar(Scalar::String(s)) if s == blob
    ));

    let out = TempDir::new().unwrap();
    pack_files(out.path(), &data, &pres);
    assert_eq!(
        read_file(out.path(), "root.yml"),
        "data: !includeraw blob.txt\n"
    );
    assert_eq!(read_file(out.path(), "blob.txt"), blob);
}

#[test]
fn test_include_raw_downgrades_when_no_longer_string() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "blob.txt", "some contents\n");
    write_file(tmp.path(), "root.yml", "data: !includeraw blob.txt\n");

    let (mut data, pres) = parse_file(tmp.path(), "root.yml").unwrap();
    set_entry(&mut data, "data", Scalar::UInt(3));

    let out = TempDir::new().unwrap();
    pack_files(out.path(), &data, &pres);
    assert_eq!(read_file(out.path(), "root.yml"), "data: !include blob.txt\n");
    assert_eq!(read_file(out.path(), "blob.txt"), "3\n");
}

#[test]
fn test_include_repacks_to_identical_files() {
    let tmp = TempDir::new().unwrap();
    let inner = "a: 3 # three\n\n# a flow mapping\nb: { c: c }\n";
    write_file(tmp.path(), "inner.yml", inner);
    write_file(tmp.path(), "root.yml", "- !include inner.yml\n- 2\n");

    let (data, pres) = parse_file(tmp.path(), "root.yml").unwrap();

    let out = TempDir::new().unwrap();
    pack_files(out.path(), &data, &pres);
    assert_eq!(
        read_file(out.path(), "root.yml"),
        "- !include inner.yml\n- 2\n"
    );
    assert_eq!(read_file(out.path(), "inner.yml"), inner);
}

// ----------------------------------------------------------------------
// Include errors
// ----------------------------------------------------------------------

#[test]
fn test_include_requires_string() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "root.yml", "!include 3");
    assert_eq!(
        parse_file_fail(tmp.path(), "root.yml"),
        "root.yml:1:1: invalid include, !include can only be used with strings\n\
         !include 3\n\
         ^^^^^^^^^^"
    );
}

#[test]
fn test_include_unknown_file() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "root.yml", "!include foo.yml");
    let msg = parse_file_fail(tmp.path(), "root.yml");
    assert!(
        msg.starts_with("root.yml:1:1: invalid include, cannot read file foo.yml: "),
        "unexpected message: {msg}"
    );
}

#[test]
fn test_include_cannot_escape_directory() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "root.yml", "!include ../root.yml");
    assert_eq!(
        parse_file_fail(tmp.path(), "root.yml"),
        "root.yml:1:1: invalid include, cannot include subfile `../root.yml`: only \
         includes contained in the directory of the including file are allowed\n\
         !include ../root.yml\n\
         ^^^^^^^^^^^^^^^^^^^^"
    );
}

#[test]
fn test_error_in_included_file() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "has_errors.yml", "key: 1\nkey: 2");
    write_file(tmp.path(), "root.yml", "!include has_errors.yml");
    assert_eq!(
        parse_file_fail(tmp.path(), "root.yml"),
        "root.yml:1:1: error in included file\n\
         !include has_errors.yml\n\
         ^^^^^^^^^^^^^^^^^^^^^^^\n\
         has_errors.yml:2:1: invalid key, key is already declared in the object\n\
         key: 2\n\
         ^^^"
    );
}

#[test]
fn test_inclusion_loop_self() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "root.yml", "!include root.yml");
    assert_eq!(
        parse_file_fail(tmp.path(), "root.yml"),
        "root.yml:1:1: invalid include, inclusion loop detected\n\
         !include root.yml\n\
         ^^^^^^^^^^^^^^^^^"
    );
}

#[test]
fn test_inclusion_loop_chain() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "loop-1.yml", "!include loop-2.yml");
    write_file(tmp.path(), "loop-2.yml", "!include loop-3.yml");
    write_file(tmp.path(), "loop-3.yml", "!include loop-1.yml");
    write_file(tmp.path(), "root.yml", "!include loop-1.yml");
    assert_eq!(
        parse_file_fail(tmp.path(), "root.yml"),
        "root.yml:1:1: error in included file\n\
         !include loop-1.yml\n\
         ^^^^^^^^^^^^^^^^^^^\n\
         loop-1.yml:1:1: error in included file\n\
         !include loop-2.yml\n\
         ^^^^^^^^^^^^^^^^^^^\n\
         loop-2.yml:1:1: error in included file\n\
         !include loop-3.yml\n\
         ^^^^^^^^^^^^^^^^^^^\n\
         loop-3.yml:1:1: invalid include, inclusion loop detected\n\
         !include loop-1.yml\n\
         ^^^^^^^^^^^^^^^^^^^"
    );
}

// ----------------------------------------------------------------------
// Overrides
// ----------------------------------------------------------------------

const OVERRIDE_INNER: &str = "a: 3\nb: { c: c }\nc:\n  - 3\n  - 4";
const OVERRIDE_ROOT: &str =
    "- !include inner.yml\n  a: 4\n\n  b: { new: true, c: ~ }\n  c: [ 5, 6 ] # array\n  d: ~";

#[test]
fn test_override_merge_and_inline_pack() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "inner.yml", OVERRIDE_INNER);
    write_file(tmp.path(), "root.yml", OVERRIDE_ROOT);

    let (data, pres) = parse_file(tmp.path(), "root.yml").unwrap();
    assert_eq!(
        pack_inline(&data, &pres),
        "- a: 4\n  b: { c: ~, new: true }\n  c:\n    - 3\n    - 4\n    - 5\n    - 6\n  d: ~"
    );
}

#[test]
fn test_override_repacks_to_original_root() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "inner.yml", OVERRIDE_INNER);
    write_file(tmp.path(), "root.yml", OVERRIDE_ROOT);

    let (data, pres) = parse_file(tmp.path(), "root.yml").unwrap();
    let out = TempDir::new().unwrap();
    pack_files(out.path(), &data, &pres);

    // The root reconstructs byte-for-byte, override block included.
    assert_eq!(read_file(out.path(), "root.yml"), format!("{OVERRIDE_ROOT}\n"));
    // The subfile keeps its own values; the mapping touched by the
    // override lost its flow hint (flow is incompatible with overrides).
    assert_eq!(
        read_file(out.path(), "inner.yml"),
        "a: 3\nb:\n  c: c\nc:\n  - 3\n  - 4\n"
    );
}

#[test]
fn test_override_reflects_ast_mutation() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "inner.yml", "a: 3\nb: 1\n");
    write_file(tmp.path(), "root.yml", "- !include inner.yml\n  a: 4\n");

    let (mut data, pres) = parse_file(tmp.path(), "root.yml").unwrap();
    let Value::Sequence(seq) = &mut data.value else {
        panic!("expected sequence");
    };
    set_entry(&mut seq.items[0], "a", Scalar::UInt(9));

    let out = TempDir::new().unwrap();
    pack_files(out.path(), &data, &pres);
    assert_eq!(
        read_file(out.path(), "root.yml"),
        "- !include inner.yml\n  a: 9\n"
    );
    assert_eq!(read_file(out.path(), "inner.yml"), "a: 3\nb: 1\n");
}

#[test]
fn test_override_type_mismatch() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "inner.yml", "a: 3\n");
    write_file(tmp.path(), "root.yml", "- !include inner.yml\n  a: [ 1 ]");
    assert_eq!(
        parse_file_fail(tmp.path(), "root.yml"),
        "root.yml:2:6: cannot change types of data in override, overridden data is \
         a scalar and not a sequence\n\
         \x20 a: [ 1 ]\n\
         \x20    ^^^^^"
    );
}

// ----------------------------------------------------------------------
// Variables
// ----------------------------------------------------------------------

#[test]
fn test_variables_replacement_and_repack() {
    let tmp = TempDir::new().unwrap();
    let inner = "- a:\n    - 1\n    - $a\n- b:\n    a: $a\n    b: $ab\n";
    let root = "!include inner.yml\n$a: 3\n$ab:\n  - 1\n  - 2\n";
    write_file(tmp.path(), "inner.yml", inner);
    write_file(tmp.path(), "root.yml", root);

    let (data, pres) = parse_file(tmp.path(), "root.yml").unwrap();
    assert_eq!(
        pack_inline(&data, &pres),
        "- a:\n    - 1\n    - 3\n- b:\n    a: 3\n    b:\n      - 1\n      - 2"
    );

    // Whole-value templates are re-deduced when repacking to files.
    let out = TempDir::new().unwrap();
    pack_files(out.path(), &data, &pres);
    assert_eq!(read_file(out.path(), "root.yml"), root);
    assert_eq!(read_file(out.path(), "inner.yml"), inner);
}

#[test]
fn test_variables_in_strings() {
    let tmp = TempDir::new().unwrap();
    write_file(
        tmp.path(),
        "inner.yml",
        "- \"foo var is: `$foo`\"\n\
         - <$foo> unquoted also works </$foo>\n\
         - a: $foo\n\
         \x20 b: $foo-$foo-$qux-$foo",
    );
    write_file(
        tmp.path(),
        "root.yml",
        "!include inner.yml\n$foo: bar\n$qux: c",
    );

    let (data, pres) = parse_file(tmp.path(), "root.yml").unwrap();
    assert_eq!(
        pack_inline(&data, &pres),
        "- \"foo var is: `bar`\"\n\
         - <bar> unquoted also works </bar>\n\
         - a: bar\n\
         \x20 b: bar-bar-c-bar"
    );
}

#[test]
fn test_variables_through_nested_includes() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "grandchild.yml", "addr: \"$host:$port\"");
    write_file(tmp.path(), "child.yml", "!include grandchild.yml\n$port: 80");
    write_file(tmp.path(), "root.yml", "!include child.yml\n$host: website.org");

    let (data, pres) = parse_file(tmp.path(), "root.yml").unwrap();
    assert_eq!(pack_inline(&data, &pres), "addr: \"website.org:80\"");
}

#[test]
fn test_variables_with_override() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "inner.yml", "var: $var\na: 0\nb: 1");
    write_file(
        tmp.path(),
        "root.yml",
        "- !include inner.yml\n  $var: 3\n  b: 4",
    );

    let (data, pres) = parse_file(tmp.path(), "root.yml").unwrap();
    assert_eq!(pack_inline(&data, &pres), "- var: 3\n  a: 0\n  b: 4");
}

#[test]
fn test_variable_errors() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "inner.yml", "a: $a\ns: \"<$s>\"\nt: <$t>");

    write_file(tmp.path(), "root.yml", "key: !include inner.yml\n  $b: foo");
    assert_eq!(
        parse_file_fail(tmp.path(), "root.yml"),
        "root.yml:2:3: invalid key, unknown variable\n  $b: foo\n  ^^"
    );

    write_file(tmp.path(), "root.yml", "key: !include inner.yml\n  $s: [ 1, 2 ]");
    assert_eq!(
        parse_file_fail(tmp.path(), "root.yml"),
        "root.yml:2:7: wrong type of data, this variable can only be set with a scalar\n\
         \x20 $s: [ 1, 2 ]\n\
         \x20     ^^^^^^^^"
    );

    write_file(tmp.path(), "root.yml", "key: !include inner.yml\n  $a: 2");
    assert_eq!(
        parse_file_fail(tmp.path(), "root.yml"),
        "the document is invalid: there are unbound variables: s, t"
    );
}

// ----------------------------------------------------------------------
// Shared subfiles
// ----------------------------------------------------------------------

#[test]
fn test_shared_subfiles_with_divergent_content() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "shared.yml", "a: 1\n");
    write_file(
        tmp.path(),
        "root.yml",
        "- !include shared.yml\n- !include shared.yml\n- !include shared.yml\n",
    );

    let (mut data, pres) = parse_file(tmp.path(), "root.yml").unwrap();
    {
        let Value::Sequence(seq) = &mut data.value else {
            panic!("expected sequence");
        };
        set_entry(&mut seq.items[1], "a", Scalar::UInt(2));
        set_entry(&mut seq.items[2], "a", Scalar::UInt(3));
    }

    let out = TempDir::new().unwrap();
    pack_files(out.path(), &data, &pres);
    assert_eq!(
        read_file(out.path(), "root.yml"),
        "- !include shared.yml\n- !include shared~1.yml\n- !include shared~2.yml\n"
    );
    assert_eq!(read_file(out.path(), "shared.yml"), "a: 1\n");
    assert_eq!(read_file(out.path(), "shared~1.yml"), "a: 2\n");
    assert_eq!(read_file(out.path(), "shared~2.yml"), "a: 3\n");
}

#[test]
fn test_shared_subfiles_identical_content_collapses() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "shared.yml", "a: 1\n");
    write_file(
        tmp.path(),
        "root.yml",
        "- !include shared.yml\n- !include shared.yml\n- !include shared.yml\n",
    );

    let (mut data, pres) = parse_file(tmp.path(), "root.yml").unwrap();
    {
        let Value::Sequence(seq) = &mut data.value else {
            panic!("expected sequence");
        };
        set_entry(&mut seq.items[1], "a", Scalar::UInt(2));
    }

    let out = TempDir::new().unwrap();
    pack_files(out.path(), &data, &pres);
    assert_eq!(
        read_file(out.path(), "root.yml"),
        "- !include shared.yml\n- !include shared~1.yml\n- !include shared.yml\n"
    );
    assert_eq!(read_file(out.path(), "shared.yml"), "a: 1\n");
    assert_eq!(read_file(out.path(), "shared~1.yml"), "a: 2\n");
    assert!(!out.path().join("shared~2.yml").exists());
}

// ----------------------------------------------------------------------
// No-subfiles flag
// ----------------------------------------------------------------------

#[test]
fn test_no_subfiles_inlines_into_single_file() {
    let tmp = TempDir::new().unwrap();
    write_file(tmp.path(), "inner.yml", "a: 1\nb: 2\n");
    write_file(tmp.path(), "root.yml", "- !include inner.yml\n- 3\n");

    let (data, pres) = parse_file(tmp.path(), "root.yml").unwrap();

    let out = TempDir::new().unwrap();
    let mut packer = Packer::new();
    packer.set_outdir(out.path()).unwrap();
    packer.set_presentation(&pres);
    packer.set_flags(PackFlags { no_subfiles: true });
    packer.pack_to_file("root.yml", &data).unwrap();

    assert_eq!(
        read_file(out.path(), "root.yml"),
        "- a: 1\n  b: 2\n- 3\n"
    );
    assert!(!out.path().join("inner.yml").exists());
}
