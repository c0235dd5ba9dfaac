use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use regionconv_core::orchestrator::DEFAULT_COMPRESSION_LEVEL;
use regionconv_core::ConversionMode;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Batch converter for Minecraft region files (mca <-> linear)",
    long_about = None
)]
pub struct Cli {
    /// Configuration file (defaults to ./regionconv.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert every region file in a directory
    Convert(ConvertArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Directory holding the region files to convert
    pub source: PathBuf,

    /// Directory receiving the converted files (created if missing)
    pub destination: PathBuf,

    /// mca2linear or linear2mca
    #[arg(short, long)]
    pub mode: ConversionMode,

    /// Compression level for linear output (1-22)
    #[arg(short, long, default_value_t = DEFAULT_COMPRESSION_LEVEL)]
    pub level: u8,

    /// Parallel workers. Defaults to the configured value or the CPU count
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Append per-file results to the conversion log
    #[arg(long)]
    pub log: bool,

    /// Override the conversion log path
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,

    /// Override the codec program
    #[arg(long)]
    pub program: Option<PathBuf>,

    /// Print the final summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Hide the live progress line
    #[arg(short, long)]
    pub quiet: bool,
}
