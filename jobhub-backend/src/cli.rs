use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "jobhub-backend", version, about = "Deferred job queue server")]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short = 'c', long = "config-path", env = "JOBHUB_CONFIG_PATH", global = true)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List registered jobs and the queue state
    Jobs,
    /// Submit a job
    Enqueue {
        /// Registered job name
        name: String,
        /// Positional arguments as a JSON array
        #[arg(long, default_value = "[]")]
        args: String,
        /// Keyword arguments as a JSON object
        #[arg(long, default_value = "{}")]
        kwargs: String,
        /// Run the job in this process and print its result
        #[arg(long)]
        sync: bool,
    },
    /// Consume and execute queued jobs until interrupted
    Worker {
        /// Maximum time a single poll blocks, in milliseconds
        #[arg(long, default_value_t = 1000)]
        poll_ms: u64,
    },
}
