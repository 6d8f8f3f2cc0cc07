use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;
use super::output::OutputFormat;

#[derive(Parser)]
#[command(name = "element-hider", author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    pub log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}
