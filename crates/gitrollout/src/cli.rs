//! Command line interface.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Mirror a git remote and roll out branch and tag changes.
///
/// Every cycle fetches the mirror, checks out changed refs below the
/// configured roots and runs the configured command for each change.
#[derive(Parser, Debug, Clone)]
#[command(name = "gitrollout")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Location of the local bare mirror
    pub mirror_path: PathBuf,

    /// URL of the remote repository
    pub remote_url: String,

    /// Check out branches below this directory (branch tracking is off without it)
    #[arg(long)]
    pub branches_path: Option<PathBuf>,

    /// Command run for every branch change
    #[arg(long, requires = "branches_path")]
    pub branches_cmd: Option<String>,

    /// Only track branches matching this glob (repeatable)
    #[arg(long = "branches-filter", requires = "branches_path")]
    pub branches_filters: Vec<String>,

    /// Check out tags below this directory (tag tracking is off without it)
    #[arg(long)]
    pub tags_path: Option<PathBuf>,

    /// Command run for every tag change
    #[arg(long, requires = "tags_path")]
    pub tags_cmd: Option<String>,

    /// Only track tags matching this glob (repeatable)
    #[arg(long = "tags-filter", requires = "tags_path")]
    pub tags_filters: Vec<String>,

    /// TOML file with engine settings
    #[arg(long, env = "GITROLLOUT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seconds between cycles
    #[arg(long)]
    pub interval: Option<u64>,

    /// Upper bound for one cycle, in seconds
    #[arg(long)]
    pub cycle_timeout: Option<u64>,

    /// Upper bound for one event command, in seconds
    #[arg(long)]
    pub command_timeout: Option<u64>,

    /// Events handled concurrently per category
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Serve /health, /trigger and /metrics on this address
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Persist the last settled refs in this file
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Log filter, e.g. `debug` or `gitrollout_git=trace` (overrides RUST_LOG)
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Where and how one ref category is rolled out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetArgs {
    pub root: PathBuf,
    pub command: Option<String>,
    pub filters: Vec<String>,
}

impl Cli {
    /// Branch target, if branch tracking is enabled.
    pub fn branches(&self) -> Option<TargetArgs> {
        self.branches_path.as_ref().map(|root| TargetArgs {
            root: root.clone(),
            command: self.branches_cmd.clone(),
            filters: self.branches_filters.clone(),
        })
    }

    /// Tag target, if tag tracking is enabled.
    pub fn tags(&self) -> Option<TargetArgs> {
        self.tags_path.as_ref().map(|root| TargetArgs {
            root: root.clone(),
            command: self.tags_cmd.clone(),
            filters: self.tags_filters.clone(),
        })
    }
}
