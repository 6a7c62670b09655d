use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Same rules as durations in the test definition, but unparseable values are rejected
/// instead of falling back to the default.
fn parse_duration(input: &str) -> Result<Duration, String> {
    paceload_core::parse_duration(input).ok_or_else(|| {
        format!("invalid duration '{input}' (expected e.g. 10s, 250ms, 1m30s, 500)")
    })
}

fn parse_users(input: &str) -> Result<u64, String> {
    match input.trim().parse::<u64>() {
        Ok(0) => Err("users must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("invalid user count '{input}'")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary with a live progress bar.
    HumanReadable,
    /// A single JSON summary object on stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "paceload",
    author,
    version,
    about = "Paced, multi-user load generator for remote backends",
    long_about = "paceload drives a fixed number of concurrent simulated users against a remote backend.\n\nEach user runs the selected operations in a loop, spacing them by `commandDelay` and each full cycle by `scriptDelay`, until the configured duration elapses. Every attempt is timed and the run ends with a per-operation summary.",
    after_help = "Examples:\n  paceload run test.yaml\n  paceload run test.yaml --profiles lpar.yaml --users 20 --duration 5m\n  paceload run test.yaml --operations TsoCommand,JobSubmit --output json\n  paceload operations"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a test definition
    #[command(
        long_about = "Run a test definition with the configured number of concurrent users.\n\nCLI flags override values from the test definition file."
    )]
    Run(RunArgs),

    /// List the operations a test definition can select
    Operations,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the test definition (.yaml or .json)
    pub definition: PathBuf,

    /// Credential profiles file
    #[arg(long, default_value = "profiles.yaml", env = "PACELOAD_PROFILES")]
    pub profiles: PathBuf,

    /// Override `concurrentUsers`
    #[arg(long, value_parser = parse_users)]
    pub users: Option<u64>,

    /// Override `duration` (e.g. 10s, 250ms, 1m)
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Override `operations` (comma-separated or repeated)
    #[arg(long, value_delimiter = ',', value_name = "NAME")]
    pub operations: Vec<String>,

    /// Per-request timeout for backend calls
    #[arg(long, value_parser = parse_duration)]
    pub request_timeout: Option<Duration>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Raise the default log level to debug
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write every attempt as a JSON line to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}
