use serde::Serialize;
use std::io::Write as _;
use std::path::Path;

use paceload_core::{AggregateStats, BucketStats, ProgressFn, RunPlan, RunReport};

use super::OutputFormatter;

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_header(&self, _definition: &Path, _plan: &RunPlan, _operations: &[String]) {}

    fn progress(&self) -> Option<ProgressFn> {
        None
    }

    fn print_summary(&self, plan: &RunPlan, report: &RunReport) -> anyhow::Result<()> {
        let line = build_summary(plan, report);
        let mut out = std::io::stdout().lock();
        serde_json::to_writer(&mut out, &line)?;
        writeln!(out)?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JsonBucket {
    pub name: String,
    pub successful: u64,
    pub failed: u64,
    /// `null` when there were no successful samples.
    pub avg_success_ms: Option<f64>,
    /// `null` when there were no failed samples.
    pub avg_fail_ms: Option<f64>,
    pub latency_max_ms: f64,
    pub latency_stdev_ms: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JsonUserFailure {
    pub user: u64,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JsonSummary {
    pub kind: &'static str,
    pub name: String,
    pub elapsed_ms: u128,
    pub users: usize,
    pub failed_users: usize,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub operations: Vec<JsonBucket>,
    pub cycle: JsonBucket,
    pub total: JsonBucket,
    pub failures: Vec<JsonUserFailure>,
}

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

fn bucket(name: &str, b: &BucketStats) -> JsonBucket {
    JsonBucket {
        name: name.to_string(),
        successful: b.success_count,
        failed: b.failure_count,
        avg_success_ms: finite(b.avg_success_ms()),
        avg_fail_ms: finite(b.avg_failure_ms()),
        latency_max_ms: b.latency_ms.max(),
        latency_stdev_ms: b.latency_ms.stdev(),
    }
}

fn build_summary(plan: &RunPlan, report: &RunReport) -> JsonSummary {
    let agg = &report.aggregate;
    JsonSummary {
        kind: "summary",
        name: plan.name.clone(),
        elapsed_ms: report.elapsed.as_millis(),
        users: report.users.len(),
        failed_users: report.failed_users(),
        successful_requests: report.successful_requests(),
        failed_requests: report.failed_requests(),
        operations: agg.operations().map(|(name, b)| bucket(name, b)).collect(),
        cycle: bucket(AggregateStats::CYCLE, agg.cycles()),
        total: bucket(AggregateStats::TOTAL, agg.total()),
        failures: report
            .users
            .iter()
            .filter(|u| !u.status.is_completed())
            .map(|u| JsonUserFailure {
                user: u.user_number,
                status: u.status.to_string(),
            })
            .collect(),
    }
}
