//! Command line interface definition

use clap::Parser;
use std::path::PathBuf;

/// relcheck - content integrity checker for versioned update streams
#[derive(Parser)]
#[command(name = "relcheck")]
#[command(about = "Verify manifests, file blobs, and packs of a published release")]
#[command(long_about = None)]
pub struct Cli {
    /// Release version to verify (latest published when omitted)
    #[arg(short = 'v', long, value_name = "N")]
    pub version: Option<u32>,

    /// Verify all content reachable from the release, not just what
    /// changed in it
    #[arg(short, long)]
    pub recursive: bool,

    /// Override the upstream content URL
    #[arg(long, value_name = "URL")]
    pub upstream: Option<String>,

    /// Override the local content cache root
    #[arg(long, value_name = "PATH")]
    pub cache: Option<PathBuf>,

    /// Binary used to apply bsdiff patches
    #[arg(long, value_name = "PATH", env = "RELCHECK_PATCH_CMD", default_value = "bspatch")]
    pub patch_command: PathBuf,

    /// Output the report in JSON format
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}
