//! blobfs entry point.
//!
//! ```bash
//! cargo run -p blobfs-cli -- --root ./data mkdir blob://bucket
//! echo hello | cargo run -p blobfs-cli -- --root ./data put blob://bucket/docs/readme.txt
//! cargo run -p blobfs-cli -- --root ./data ls blob://bucket/docs
//! ```

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use blobfs_cli::Cli;

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries blob contents for `cat`.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let stdout = std::io::stdout();
    blobfs_cli::run(&cli, &mut std::io::stdin().lock(), &mut stdout.lock())
}
