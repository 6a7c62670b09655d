use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context as _;
use paceload_core::REQUESTS_TARGET;
use tracing::Level;
use tracing_subscriber::filter::{EnvFilter, Targets};
use tracing_subscriber::prelude::*;

/// Keeps the process logs readable: attempt records only go to `--log-file`.
fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!(
        "warn,paceload={level},paceload_core={level},paceload_http={level},{REQUESTS_TARGET}=off"
    )
}

fn stderr_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

/// Installs the global subscriber: human logs on stderr and, with `log_file`, one JSON line per
/// attempt (failures at `error`, successes at `info`).
pub(crate) fn init(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter(verbose));

    let requests = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file: {}", path.display()))?;
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(Mutex::new(file))
                .with_filter(Targets::new().with_target(REQUESTS_TARGET, Level::INFO));
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr)
        .with(requests)
        .try_init()
        .context("failed to install log subscriber")
}
