//! blobfs command line: filesystem operations against a directory-backed
//! blob store.
//!
//! Every subcommand mounts a [`BlobFs`] over a [`LocalBlobStore`] rooted at
//! `--root`, runs one operation, and exits. Paths may be fully qualified
//! (`blob://bucket/key`) or bare (`bucket/key`), in which case the configured
//! protocol is assumed.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;

use blobfs_kernel::{BlobFs, DriverConfig, EntryKind, LocalBlobStore, StatResult, StreamOptions};

/// Filesystem operations over a blob store.
#[derive(Parser, Debug)]
#[command(name = "blobfs", version)]
#[command(about = "Filesystem operations over a directory-backed blob store")]
pub struct Cli {
    /// Directory holding one subdirectory per container
    #[arg(long)]
    pub root: PathBuf,

    /// Driver config (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Protocol for bare paths; overrides the config
    #[arg(long)]
    pub protocol: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show whether a path is a file or directory, with size and mtime
    Stat { path: String },

    /// List the children of a bucket or directory
    Ls {
        path: String,
        /// Recurse into sub-directories (no delimiter)
        #[arg(long)]
        flat: bool,
        /// Show kind, size and modification time
        #[arg(short, long)]
        long: bool,
    },

    /// Write a blob to stdout
    Cat { path: String },

    /// Upload a file (or stdin) to a blob
    Put {
        path: String,
        /// Source file; stdin when omitted
        file: Option<PathBuf>,
        /// Content type; inferred from the key when omitted
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Create a bucket or pseudo-directory
    Mkdir {
        path: String,
        /// Octal mode; the leading digit picks the access tier
        #[arg(long, default_value = "755")]
        mode: String,
    },

    /// Remove a bucket or empty pseudo-directory
    Rmdir { path: String },

    /// Rename a blob (copy, then delete)
    Mv { from: String, to: String },

    /// Delete a blob
    Rm { path: String },
}

/// Load the driver config, applying command-line overrides.
pub fn load_config(cli: &Cli) -> Result<DriverConfig> {
    let mut config = match &cli.config {
        Some(path) => DriverConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => DriverConfig::default(),
    };
    if let Some(protocol) = &cli.protocol {
        config.protocol = protocol.clone();
        config.validate().context("Invalid --protocol")?;
    }
    Ok(config)
}

/// Mount the store under `cli.root`.
pub fn mount(cli: &Cli) -> Result<BlobFs> {
    let config = load_config(cli)?;
    debug!(root = %cli.root.display(), protocol = %config.protocol, "mounting local store");
    Ok(BlobFs::new(Arc::new(LocalBlobStore::new(&cli.root)), config))
}

fn qualify(protocol: &str, path: &str) -> String {
    if path.contains("://") {
        path.to_string()
    } else {
        format!("{protocol}://{}", path.trim_start_matches('/'))
    }
}

fn parse_mode(mode: &str) -> Result<u32> {
    let digits = mode.trim_start_matches("0o");
    u32::from_str_radix(digits, 8).with_context(|| format!("Invalid octal mode {mode:?}"))
}

fn format_stat(stat: &StatResult) -> String {
    let record = stat.to_record();
    let kind = match stat.kind {
        EntryKind::File => "file",
        EntryKind::Directory => "directory",
    };
    format!(
        "type: {kind}\nsize: {}\nmode: {:o}\nmtime: {}\n",
        record.size, record.mode, record.mtime
    )
}

/// Run one command. `input` feeds `put` without a file; `out` receives
/// command output.
pub fn run(cli: &Cli, input: &mut dyn Read, out: &mut dyn Write) -> Result<()> {
    let fs = mount(cli)?;
    let protocol = fs.protocol().to_string();
    let q = |path: &str| qualify(&protocol, path);

    match &cli.command {
        Command::Stat { path } => {
            let path = q(path);
            let stat = fs.stat(&path).with_context(|| format!("stat {path}"))?;
            out.write_all(format_stat(&stat).as_bytes())?;
        }

        Command::Ls { path, flat, long } => {
            let mut path = q(path);
            // Without a delimiter the prefix is used as-is, so list `dir/`.
            if *flat && !path.ends_with('/') {
                path.push('/');
            }
            let options = flat.then(|| StreamOptions::new().delimiter(""));
            let iter = fs
                .opendir_with(&path, options.as_ref())
                .with_context(|| format!("ls {path}"))?;
            for entry in iter {
                let entry = entry.with_context(|| format!("ls {path}"))?;
                let suffix = if entry.is_dir() { "/" } else { "" };
                if *long {
                    let modified = entry
                        .modified
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "-".to_string());
                    let kind = if entry.is_dir() { 'd' } else { '-' };
                    writeln!(out, "{kind} {:>10} {modified} {}{suffix}", entry.size, entry.name)?;
                } else {
                    writeln!(out, "{}{suffix}", entry.name)?;
                }
            }
        }

        Command::Cat { path } => {
            let path = q(path);
            let data = fs.read_to_vec(&path).with_context(|| format!("cat {path}"))?;
            out.write_all(&data)?;
        }

        Command::Put {
            path,
            file,
            content_type,
        } => {
            let path = q(path);
            let data = match file {
                Some(file) => std::fs::read(file)
                    .with_context(|| format!("Failed to read {}", file.display()))?,
                None => {
                    let mut data = Vec::new();
                    input.read_to_end(&mut data).context("Failed to read stdin")?;
                    data
                }
            };
            let options = content_type
                .as_ref()
                .map(|ct| StreamOptions::new().content_type(ct.clone()));
            let mut handle = fs
                .open_with(&path, "w", options.as_ref())
                .with_context(|| format!("put {path}"))?;
            handle.write(&data).with_context(|| format!("put {path}"))?;
            handle.close().with_context(|| format!("put {path}"))?;
            debug!(%path, bytes = data.len(), "uploaded");
        }

        Command::Mkdir { path, mode } => {
            let path = q(path);
            fs.mkdir(&path, parse_mode(mode)?, false)
                .with_context(|| format!("mkdir {path}"))?;
        }

        Command::Rmdir { path } => {
            let path = q(path);
            fs.rmdir(&path).with_context(|| format!("rmdir {path}"))?;
        }

        Command::Mv { from, to } => {
            let (from, to) = (q(from), q(to));
            if from == to {
                bail!("mv: source and destination are the same: {from}");
            }
            fs.rename(&from, &to)
                .with_context(|| format!("mv {from} {to}"))?;
        }

        Command::Rm { path } => {
            let path = q(path);
            fs.unlink(&path).with_context(|| format!("rm {path}"))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("blob", "bucket/k"), "blob://bucket/k");
        assert_eq!(qualify("blob", "/bucket/k"), "blob://bucket/k");
        assert_eq!(qualify("blob", "store://bucket/k"), "store://bucket/k");
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("755").unwrap(), 0o755);
        assert_eq!(parse_mode("0o600").unwrap(), 0o600);
        assert!(parse_mode("9").is_err());
    }

    #[test]
    fn test_format_stat() {
        let text = format_stat(&StatResult::directory());
        assert!(text.contains("type: directory"));
        assert!(text.contains("mode: 40777"));
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["blobfs", "--root", "/tmp/x", "ls", "-l", "bucket"]).unwrap();
        assert!(matches!(cli.command, Command::Ls { long: true, flat: false, .. }));
    }
}
