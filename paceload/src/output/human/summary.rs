use std::fmt::Write as _;

use paceload_core::{AggregateStats, BucketStats, RunReport};

use super::format::{format_avg_ms, format_duration};

fn bucket_line(out: &mut String, name: &str, b: &BucketStats) {
    let _ = writeln!(
        out,
        "{name}: successful={} failed={} avgSuccessMs={} avgFailMs={}",
        b.success_count,
        b.failure_count,
        format_avg_ms(b.avg_success_ms()),
        format_avg_ms(b.avg_failure_ms()),
    );
}

pub(crate) fn render(report: &RunReport) -> String {
    let mut out = String::new();
    let agg = &report.aggregate;

    for (name, bucket) in agg.operations() {
        bucket_line(&mut out, name, bucket);
    }
    bucket_line(&mut out, AggregateStats::CYCLE, agg.cycles());
    bucket_line(&mut out, AggregateStats::TOTAL, agg.total());

    let _ = writeln!(
        out,
        "total: successful={} failed={} users={} failedUsers={}",
        report.successful_requests(),
        report.failed_requests(),
        report.users.len(),
        report.failed_users(),
    );
    let _ = writeln!(out, "elapsed: {}", format_duration(report.elapsed));

    out
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use paceload_core::{ActivityStats, Attempt, CycleSample, Outcome, SessionStatus};

    use super::*;

    fn attempt(user: u64, n: u64, op: &str, outcome: Outcome, ms: u64) -> Attempt {
        Attempt {
            user_number: user,
            request_number: n,
            operation: Arc::from(op),
            outcome,
            duration: Duration::from_millis(ms),
        }
    }

    #[test]
    fn renders_operations_cycle_and_totals() {
        let user0 = ActivityStats {
            user_number: 0,
            successful_requests: 2,
            failed_requests: 1,
            attempts: vec![
                attempt(0, 1, "A", Outcome::Success, 10),
                attempt(0, 2, "B", Outcome::Failure, 30),
                attempt(0, 3, "A", Outcome::Success, 20),
            ],
            cycles: vec![CycleSample {
                user_number: 0,
                cycle_number: 1,
                outcome: Outcome::Failure,
                duration: Duration::from_millis(250),
            }],
            status: SessionStatus::Completed,
        };
        let user1 = ActivityStats::empty(1, SessionStatus::SetupFailed("boom".to_string()));

        let report = RunReport::from_stats(
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            vec![user1, user0],
            Duration::from_secs(3),
        );

        let text = render(&report);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "A: successful=2 failed=0 avgSuccessMs=15.00 avgFailMs=n/a",
                "B: successful=0 failed=1 avgSuccessMs=n/a avgFailMs=30.00",
                "C: successful=0 failed=0 avgSuccessMs=n/a avgFailMs=n/a",
                "Cycle: successful=0 failed=1 avgSuccessMs=n/a avgFailMs=250.00",
                "TOTAL: successful=2 failed=1 avgSuccessMs=15.00 avgFailMs=30.00",
                "total: successful=2 failed=1 users=2 failedUsers=1",
                "elapsed: 3s",
            ]
        );
    }
}
