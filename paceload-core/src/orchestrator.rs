use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use paceload_metrics::AggregateStats;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};

use super::config::RunPlan;
use super::error::Result;
use super::operation::RegisteredOperation;
use super::profiles::ProfileTable;
use super::progress::{ProgressFn, ProgressUpdate};
use super::recorder::{ActivityStats, SessionStatus};
use super::session::{SessionContext, run_session};
use super::sink::{EventSink, SessionStage};
use super::workload::Workload;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Final result of a run: per-user stats plus the merged aggregate.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub operations: Vec<String>,
    /// One entry per user, sorted by user number.
    pub users: Vec<ActivityStats>,
    pub aggregate: AggregateStats,
    pub elapsed: Duration,
}

impl RunReport {
    #[must_use]
    pub fn from_stats(
        operations: Vec<String>,
        mut users: Vec<ActivityStats>,
        elapsed: Duration,
    ) -> Self {
        users.sort_by_key(|s| s.user_number);

        let mut aggregate = AggregateStats::from_attempts(
            operations.iter().map(String::as_str),
            users.iter().flat_map(|u| u.attempts.iter()),
        );
        for cycle in users.iter().flat_map(|u| u.cycles.iter()) {
            aggregate.record_cycle(cycle);
        }

        Self {
            operations,
            users,
            aggregate,
            elapsed,
        }
    }

    #[must_use]
    pub fn successful_requests(&self) -> u64 {
        self.users.iter().map(|u| u.successful_requests).sum()
    }

    #[must_use]
    pub fn failed_requests(&self) -> u64 {
        self.users.iter().map(|u| u.failed_requests).sum()
    }

    /// Users that never reached the loop (or whose task died).
    #[must_use]
    pub fn failed_users(&self) -> usize {
        self.users.iter().filter(|u| !u.status.is_completed()).count()
    }

    #[must_use]
    pub fn attempts_total(&self) -> usize {
        self.users.iter().map(|u| u.attempts.len()).sum()
    }
}

/// Fans out one session per user, waits for all of them and merges their results.
pub struct Orchestrator<W: Workload> {
    ctx: SessionContext<W>,
    progress: Option<ProgressFn>,
}

impl<W: Workload> Orchestrator<W> {
    /// Fails before anything is spawned if the operation selection is invalid.
    pub fn new(
        plan: RunPlan,
        profiles: ProfileTable,
        workload: W,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let operations: Arc<[RegisteredOperation<W::User>]> =
            workload.registry().select(plan.operations.as_deref())?.into();

        Ok(Self {
            ctx: SessionContext {
                plan: Arc::new(plan),
                profiles: Arc::new(profiles),
                workload: Arc::new(workload),
                operations,
                sink,
            },
            progress: None,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    #[must_use]
    pub fn plan(&self) -> &RunPlan {
        &self.ctx.plan
    }

    #[must_use]
    pub fn operation_names(&self) -> Vec<String> {
        self.ctx
            .operations
            .iter()
            .map(|op| op.name().to_string())
            .collect()
    }

    pub async fn run(self) -> RunReport {
        let plan = self.ctx.plan.clone();
        let users_total = plan.concurrent_users;
        let planned = plan.duration + plan.stagger_for(users_total.saturating_sub(1));

        let started = Instant::now();
        let mut sessions = JoinSet::new();
        let mut user_by_task = AHashMap::with_capacity(usize::try_from(users_total).unwrap_or(0));
        for user_number in 0..users_total {
            let handle = sessions.spawn(run_session(user_number, self.ctx.clone()));
            user_by_task.insert(handle.id(), user_number);
        }
        tracing::info!(
            users = users_total,
            operations = ?self.operation_names(),
            "sessions spawned"
        );

        let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut stats: Vec<ActivityStats> = Vec::with_capacity(user_by_task.len());
        let mut tick: u64 = 0;
        while !sessions.is_empty() {
            tokio::select! {
                joined = sessions.join_next_with_id() => {
                    let Some(joined) = joined else { break };
                    let user_stats = match joined {
                        Ok((_, user_stats)) => user_stats,
                        Err(err) => {
                            let user_number = user_by_task.get(&err.id()).copied().unwrap_or_default();
                            self.ctx.sink.session_failed(user_number, SessionStage::Run, &err);
                            let user_stats =
                                ActivityStats::empty(user_number, SessionStatus::Aborted(err.to_string()));
                            self.ctx.sink.session_finished(&user_stats);
                            user_stats
                        }
                    };
                    stats.push(user_stats);
                }
                _ = interval.tick(), if self.progress.is_some() => {}
            }

            if let Some(progress) = &self.progress {
                tick += 1;
                (progress)(ProgressUpdate {
                    tick,
                    elapsed: started.elapsed(),
                    planned,
                    users_total,
                    users_finished: stats.len() as u64,
                    successful_requests: stats.iter().map(|s| s.successful_requests).sum(),
                    failed_requests: stats.iter().map(|s| s.failed_requests).sum(),
                });
            }
        }

        let report = RunReport::from_stats(self.operation_names(), stats, started.elapsed());
        tracing::info!(
            successful = report.successful_requests(),
            failed = report.failed_requests(),
            failed_users = report.failed_users(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "run finished"
        );
        report
    }
}
