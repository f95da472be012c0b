use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "reshelf")]
#[command(
    about = "Relocate and rename files according to an organizer's mapping",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Catalog every file under a root and print the catalog as JSON
    Scan(ScanArgs),
    /// Apply a mapping: resolve collisions, then move (or simulate moving) files
    Apply(ApplyArgs),
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Directory to catalog
    pub root: PathBuf,
    /// Write the catalog here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Directory the catalogued files live in
    pub source_root: PathBuf,
    /// Directory the mapping's destination paths are relative to
    pub dest_root: PathBuf,
    /// JSON mapping of file id to destination path
    #[arg(short, long)]
    pub mapping: PathBuf,
    /// Catalog written by `scan`; the source root is walked again when omitted
    #[arg(short, long)]
    pub catalog: Option<PathBuf>,
    /// Print the planned moves without touching the filesystem
    #[arg(long)]
    pub dry_run: bool,
    /// Hash files before moving and verify them afterwards
    #[arg(long)]
    pub verify: bool,
    /// Write the per-item results as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}
