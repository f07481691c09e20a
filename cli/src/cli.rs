use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "asar",
    about = "Inspect, read and extract asar archives.",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(visible_aliases = ["l", "ls"], about = "List files in an archive")]
    List(ListArgs),

    #[command(about = "Show archive metadata, or details of one entry")]
    Info(InfoArgs),

    #[command(about = "Write a file to stdout, reading through archives on the way")]
    Cat(CatArgs),

    #[command(visible_alias = "x", about = "Extract files from an archive")]
    Extract(ExtractArgs),
}

/// Flags mapping onto the library's serving options.
#[derive(Debug, Clone, clap::Args)]
pub struct ServeFlags {
    /// Skip integrity verification of archive entries
    #[arg(long)]
    pub no_verify: bool,

    /// Do not decode gzip-compressed variants such as .svgz
    #[arg(long)]
    pub no_decompress: bool,

    /// Report shortcut (.lnk) targets instead of the shortcut's bytes
    #[arg(long)]
    pub shortcuts: bool,

    /// Path component suffix identifying an archive
    #[arg(long, value_name = "SUFFIX", default_value = ".asar")]
    pub suffix: String,
}

#[derive(Debug, clap::Args)]
pub struct ListArgs {
    /// Path to the .asar archive
    pub archive: PathBuf,

    /// Show offsets, flags and integrity for each entry
    #[arg(short = 'l', long)]
    pub long: bool,

    /// Output in JSON format
    #[arg(short = 'j', long)]
    pub json: bool,
}

#[derive(Debug, clap::Args)]
pub struct InfoArgs {
    /// Path to the .asar archive
    pub archive: PathBuf,

    /// Optional entry path within the archive to show info for
    pub file: Option<String>,
}

#[derive(Debug, clap::Args)]
#[command(after_help = "\
\x1b[1m\x1b[4mExamples:\x1b[0m
  asar cat resources/app.asar/package.json
  asar cat --range bytes=0-99 resources/app.asar/dist/app.js
  asar cat -i resources/app.asar.unpacked/native/addon.node > /dev/null")]
pub struct CatArgs {
    /// Path to read; any component ending in the archive suffix is entered
    pub path: PathBuf,

    /// Single byte range, as in an HTTP Range header (e.g. bytes=10-19)
    #[arg(short = 'r', long)]
    pub range: Option<String>,

    /// Print the response status and headers to stderr
    #[arg(short = 'i', long)]
    pub include_headers: bool,

    #[command(flatten)]
    pub serve: ServeFlags,
}

#[derive(Debug, clap::Args)]
pub struct ExtractArgs {
    /// Path to the .asar archive to extract
    pub archive: PathBuf,

    /// Output directory (defaults to current directory)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Suppress output (quiet mode)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    #[command(flatten)]
    pub serve: ServeFlags,

    /// Specific files to extract (extracts all if none specified)
    pub files: Vec<String>,
}
