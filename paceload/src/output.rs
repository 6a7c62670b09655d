use std::path::Path;

use paceload_core::{ProgressFn, RunPlan, RunReport};

use crate::cli::OutputFormat;

mod human;
mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_header(&self, definition: &Path, plan: &RunPlan, operations: &[String]);
    fn progress(&self) -> Option<ProgressFn>;
    fn print_summary(&self, plan: &RunPlan, report: &RunReport) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput::new()),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}
