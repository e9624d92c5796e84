use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Validate and plan aggregation requests offline.
#[derive(Debug, Parser)]
#[command(name = "aggplan", version, long_about = None)]
pub struct Cli {
    /// TOML config with limits and extra aggregation types.
    #[arg(long, global = true, value_name = "FILE", env = "AGGPLAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse a search body and report every structural issue.
    Validate {
        /// JSON search body holding an `aggs` or `aggregations` object.
        file: PathBuf,
    },

    /// Admit, validate and plan a search body; prints the plan as JSON.
    Plan {
        file: PathBuf,

        /// Workload group the request is sent under.
        #[arg(long, value_name = "ID")]
        query_group: Option<String>,

        /// Groups to treat as over their limits.
        #[arg(long = "reject-group", value_name = "ID")]
        rejected_groups: Vec<String>,
    },

    /// Print the descriptor encoding of a search body as hex.
    Encode { file: PathBuf },
}
