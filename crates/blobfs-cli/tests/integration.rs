//! Integration tests for the blobfs CLI.
//!
//! Each test runs commands against a store rooted in a temp directory and
//! checks the captured output.

use std::io::Cursor;
use std::path::Path;

use blobfs_cli::{Cli, run};
use clap::Parser;
use tempfile::TempDir;

/// Run one command line, feeding `stdin`, and return stdout.
fn blobfs(root: &Path, args: &[&str], stdin: &[u8]) -> anyhow::Result<String> {
    let root = root.to_string_lossy().to_string();
    let mut argv = vec!["blobfs", "--root", root.as_str()];
    argv.extend_from_slice(args);
    let cli = Cli::try_parse_from(argv)?;

    let mut input = Cursor::new(stdin.to_vec());
    let mut out = Vec::new();
    run(&cli, &mut input, &mut out)?;
    Ok(String::from_utf8(out)?)
}

fn setup() -> TempDir {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    blobfs(tmp.path(), &["mkdir", "blob://bucket"], b"").expect("mkdir bucket");
    tmp
}

#[test]
fn put_then_cat() {
    let tmp = setup();
    blobfs(tmp.path(), &["put", "bucket/docs/readme.txt"], b"hello").unwrap();
    let out = blobfs(tmp.path(), &["cat", "blob://bucket/docs/readme.txt"], b"").unwrap();
    assert_eq!(out, "hello");
}

#[test]
fn put_from_file() {
    let tmp = setup();
    let src = tmp.path().join("src.txt");
    std::fs::write(&src, "from disk").unwrap();
    let src = src.to_string_lossy().to_string();
    blobfs(tmp.path(), &["put", "bucket/copy.txt", &src], b"").unwrap();
    let out = blobfs(tmp.path(), &["cat", "bucket/copy.txt"], b"").unwrap();
    assert_eq!(out, "from disk");
}

#[test]
fn stat_file_and_directory() {
    let tmp = setup();
    blobfs(tmp.path(), &["put", "bucket/docs/readme.txt"], b"hello").unwrap();

    let out = blobfs(tmp.path(), &["stat", "bucket/docs/readme.txt"], b"").unwrap();
    assert!(out.contains("type: file"), "got: {out}");
    assert!(out.contains("size: 5"), "got: {out}");

    let out = blobfs(tmp.path(), &["stat", "bucket/docs"], b"").unwrap();
    assert!(out.contains("type: directory"), "got: {out}");

    assert!(blobfs(tmp.path(), &["stat", "bucket/nope"], b"").is_err());
}

#[test]
fn ls_shows_direct_children() {
    let tmp = setup();
    blobfs(tmp.path(), &["mkdir", "bucket/docs"], b"").unwrap();
    blobfs(tmp.path(), &["put", "bucket/docs/a.txt"], b"a").unwrap();
    blobfs(tmp.path(), &["put", "bucket/docs/img/logo.png"], b"png").unwrap();

    let out = blobfs(tmp.path(), &["ls", "bucket/docs"], b"").unwrap();
    assert_eq!(out, "a.txt\nimg/\n");

    let out = blobfs(tmp.path(), &["ls", "--flat", "bucket/docs"], b"").unwrap();
    assert_eq!(out, "a.txt\nimg/logo.png\n");
}

#[test]
fn rmdir_rejects_non_empty() {
    let tmp = setup();
    blobfs(tmp.path(), &["mkdir", "bucket/docs"], b"").unwrap();
    blobfs(tmp.path(), &["put", "bucket/docs/readme.txt"], b"hello").unwrap();

    let err = blobfs(tmp.path(), &["rmdir", "bucket/docs"], b"").unwrap_err();
    assert!(format!("{err:#}").contains("directory not empty"), "got: {err:#}");

    blobfs(tmp.path(), &["rm", "bucket/docs/readme.txt"], b"").unwrap();
    blobfs(tmp.path(), &["rmdir", "bucket/docs"], b"").unwrap();
    let out = blobfs(tmp.path(), &["ls", "bucket"], b"").unwrap();
    assert_eq!(out, "");
}

#[test]
fn mv_moves_blob() {
    let tmp = setup();
    blobfs(tmp.path(), &["put", "bucket/old.txt"], b"data").unwrap();
    blobfs(tmp.path(), &["mv", "bucket/old.txt", "bucket/new.txt"], b"").unwrap();

    assert!(blobfs(tmp.path(), &["cat", "bucket/old.txt"], b"").is_err());
    let out = blobfs(tmp.path(), &["cat", "bucket/new.txt"], b"").unwrap();
    assert_eq!(out, "data");
}

#[test]
fn config_protocol_applies_to_bare_paths() {
    let tmp = setup();
    let config = tmp.path().join("blobfs.toml");
    std::fs::write(&config, "protocol = \"store\"\n").unwrap();
    let config = config.to_string_lossy().to_string();

    blobfs(
        tmp.path(),
        &["--config", &config, "put", "bucket/k.txt"],
        b"via store",
    )
    .unwrap();
    let out = blobfs(
        tmp.path(),
        &["--config", &config, "cat", "store://bucket/k.txt"],
        b"",
    )
    .unwrap();
    assert_eq!(out, "via store");
}

#[test]
fn mkdir_bucket_twice_fails() {
    let tmp = setup();
    let err = blobfs(tmp.path(), &["mkdir", "blob://bucket"], b"").unwrap_err();
    assert!(format!("{err:#}").contains("already exists"), "got: {err:#}");
}
