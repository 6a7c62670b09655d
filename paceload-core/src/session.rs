use std::sync::Arc;

use paceload_metrics::Outcome;
use tokio::time::Instant;

use super::config::RunPlan;
use super::operation::RegisteredOperation;
use super::pacer::Pacer;
use super::profiles::ProfileTable;
use super::recorder::{ActivityStats, SessionStatus, TimingRecorder};
use super::sink::{EventSink, SessionStage};
use super::workload::{UserIdentity, Workload};

/// Everything a session reads; shared read-only across all sessions of a run.
pub struct SessionContext<W: Workload> {
    pub plan: Arc<RunPlan>,
    pub profiles: Arc<ProfileTable>,
    pub workload: Arc<W>,
    pub operations: Arc<[RegisteredOperation<W::User>]>,
    pub sink: Arc<dyn EventSink>,
}

impl<W: Workload> Clone for SessionContext<W> {
    fn clone(&self) -> Self {
        Self {
            plan: self.plan.clone(),
            profiles: self.profiles.clone(),
            workload: self.workload.clone(),
            operations: self.operations.clone(),
            sink: self.sink.clone(),
        }
    }
}

/// Runs one simulated user from profile lookup to teardown.
///
/// Never fails: a missing profile or a failed setup yields zero-valued stats, operation errors
/// become failed attempts and teardown errors only reach the sink.
pub async fn run_session<W: Workload>(user_number: u64, ctx: SessionContext<W>) -> ActivityStats {
    let profile = match ctx.profiles.profile_for(user_number, &ctx.plan.profiles) {
        Ok(profile) => profile,
        Err(err) => {
            ctx.sink.session_failed(user_number, SessionStage::Init, &err);
            let stats =
                ActivityStats::empty(user_number, SessionStatus::ProfileMissing(err.to_string()));
            ctx.sink.session_finished(&stats);
            return stats;
        }
    };
    let identity = UserIdentity {
        user_number,
        profile,
    };

    let stagger = ctx.plan.stagger_for(user_number);
    if !stagger.is_zero() {
        tokio::time::sleep(stagger).await;
    }

    let user = match ctx.workload.setup(&identity).await {
        Ok(user) => user,
        Err(err) => {
            ctx.sink.session_failed(user_number, SessionStage::Setup, err.as_ref());
            let stats =
                ActivityStats::empty(user_number, SessionStatus::SetupFailed(err.to_string()));
            ctx.sink.session_finished(&stats);
            return stats;
        }
    };
    ctx.sink.session_started(&identity);

    let pacer = Pacer::new(ctx.plan.command_delay, ctx.plan.script_delay);
    let mut recorder = TimingRecorder::new(user_number);
    let mut request_number: u64 = 0;
    let mut cycle_number: u64 = 0;

    // The deadline is only checked between cycles; a started cycle always completes.
    let loop_started = Instant::now();
    while loop_started.elapsed() <= ctx.plan.duration {
        cycle_number += 1;
        let cycle_started = Instant::now();
        let mut cycle_outcome = Outcome::Success;

        for op in ctx.operations.iter() {
            request_number += 1;
            let op_started = Instant::now();
            let result = op.invoke(&user).await;
            let elapsed = op_started.elapsed();
            let outcome = Outcome::from_success(result.success);
            if !outcome.is_success() {
                cycle_outcome = Outcome::Failure;
            }

            let attempt = recorder.record_attempt(request_number, op.name_arc(), outcome, elapsed);
            ctx.sink.attempt(&identity, attempt, &result.payload);

            pacer.wait_operation(op_started).await;
        }

        let sample = recorder.record_cycle(cycle_number, cycle_outcome, cycle_started.elapsed());
        ctx.sink.cycle(&identity, &sample);

        pacer.wait_cycle(cycle_started).await;
    }

    for failure in ctx.workload.teardown(user).await {
        ctx.sink.teardown_failed(user_number, &failure);
    }

    let stats = recorder.finish(SessionStatus::Completed);
    ctx.sink.session_finished(&stats);
    stats
}
