use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mca", version, about = "Fan one question out to several model agents in parallel")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask every enabled agent the same question concurrently
    Analyze(AnalyzeArgs),
    /// Write a default agent roster
    Init {
        /// Output file or directory (defaults to the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite an existing roster
        #[arg(long)]
        force: bool,
    },
    /// Print version information
    Version,
}

#[derive(Args, Debug, Default)]
pub struct AnalyzeArgs {
    /// The question or prompt to analyze
    pub prompt: String,

    /// Working directory for the agents (defaults to the current directory)
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Path to the agent roster (defaults to agents_config.json in the working directory)
    #[arg(short, long)]
    pub agents: Option<PathBuf>,

    /// Path to an mca.toml settings file (overrides the working-directory one)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Do not print the run summary
    #[arg(long)]
    pub no_summary: bool,

    /// Print the full run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Seconds to wait for each proxy to accept connections
    #[arg(long)]
    pub readiness_timeout: Option<u64>,

    /// Seconds each agent may spend answering
    #[arg(long)]
    pub task_timeout: Option<u64>,

    /// Proxy launcher (program plus leading arguments, whitespace separated)
    #[arg(long)]
    pub proxy_command: Option<String>,
}
