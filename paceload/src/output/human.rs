use std::path::Path;
use std::sync::Arc;

use paceload_core::{ProgressFn, RunPlan, RunReport};

mod format;
mod progress;
mod summary;

use format::format_duration;
use progress::HumanProgress;

use super::OutputFormatter;

pub(crate) struct HumanReadableOutput {
    progress: Arc<HumanProgress>,
}

impl HumanReadableOutput {
    pub(crate) fn new() -> Self {
        Self {
            progress: Arc::new(HumanProgress::new()),
        }
    }
}

impl OutputFormatter for HumanReadableOutput {
    fn print_header(&self, definition: &Path, plan: &RunPlan, operations: &[String]) {
        println!("paceload {}", env!("CARGO_PKG_VERSION"));
        println!("definition: {}", definition.display());
        println!(
            "plan: name={} users={} durationMs={} commandDelayMs={} scriptDelayMs={} initialDelayMs={}",
            plan.name,
            plan.concurrent_users,
            plan.duration.as_millis(),
            plan.command_delay.as_millis(),
            plan.script_delay.as_millis(),
            plan.initial_delay.as_millis(),
        );
        println!("profiles: {}", plan.profiles.join(", "));
        println!("operations: {}", operations.join(", "));
        println!();
    }

    fn progress(&self) -> Option<ProgressFn> {
        let progress = self.progress.clone();
        Some(Arc::new(move |u| {
            let message = format!(
                "users={}/{} ok={} failed={} elapsed={}",
                u.users_finished,
                u.users_total,
                u.successful_requests,
                u.failed_requests,
                format_duration(u.elapsed)
            );
            progress.update(u.planned, u.elapsed, message);
        }))
    }

    fn print_summary(&self, _plan: &RunPlan, report: &RunReport) -> anyhow::Result<()> {
        self.progress.finish();

        for user in report.users.iter().filter(|u| !u.status.is_completed()) {
            eprintln!("user {}: {}", user.user_number, user.status);
        }

        print!("{}", summary::render(report));
        Ok(())
    }
}
