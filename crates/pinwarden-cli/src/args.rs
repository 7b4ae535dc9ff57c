use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "pinwarden",
    version,
    about = "Audit CI workflow references for content that can change under a fixed pin"
)]
pub struct Cli {
    /// Raise the default log level to debug (RUST_LOG still wins)
    #[arg(long, global = true)]
    pub debug: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan a workflow and remediate unstable references
    Scan(ScanArgs),
}

#[derive(Debug, clap::Args)]
pub struct ScanArgs {
    /// Workflow file, or a https://github.com/<owner>/<repo>/blob/<ref>/<path> URL
    pub target: String,

    /// Check to run; repeat for several (default: all)
    #[arg(long = "check", value_name = "ID")]
    pub checks: Vec<String>,

    /// Write the remediated workflow here instead of in place
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Report only; never write the workflow
    #[arg(long)]
    pub dry_run: bool,

    /// Suppress the report on stdout
    #[arg(long)]
    pub quiet: bool,

    /// Print a diff of the remediation instead of writing it
    #[arg(long)]
    pub show_diff: bool,

    /// Report format
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Classification cache file
    #[arg(long, env = "PINWARDEN_CACHE")]
    pub cache_path: Option<PathBuf>,

    /// Keep the cache in memory for this run only; overrides --cache-path
    #[arg(long)]
    pub no_cache: bool,

    /// GitHub API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// GitHub API base URL
    #[arg(long, env = "PINWARDEN_API_URL")]
    pub api_url: Option<String>,

    /// References examined concurrently within one check
    #[arg(long, default_value_t = 8)]
    pub concurrency: usize,

    /// Optional git commit hash for tool metadata
    #[arg(long)]
    pub commit: Option<String>,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
