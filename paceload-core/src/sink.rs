use paceload_metrics::{Attempt, CycleSample};

use super::operation::Payload;
use super::recorder::ActivityStats;
use super::workload::{TeardownError, UserIdentity};

/// `tracing` target carrying one event per attempt.
pub const REQUESTS_TARGET: &str = "paceload::requests";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SessionStage {
    Init,
    Setup,
    Run,
}

/// Logging port handed to the orchestrator and every session.
///
/// All methods default to doing nothing.
pub trait EventSink: Send + Sync {
    fn session_started(&self, _identity: &UserIdentity) {}

    fn attempt(&self, _identity: &UserIdentity, _attempt: &Attempt, _payload: &Payload) {}

    fn cycle(&self, _identity: &UserIdentity, _sample: &CycleSample) {}

    fn session_finished(&self, _stats: &ActivityStats) {}

    fn session_failed(
        &self,
        _user_number: u64,
        _stage: SessionStage,
        _error: &(dyn std::error::Error + 'static),
    ) {
    }

    fn teardown_failed(&self, _user_number: u64, _error: &TeardownError) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {}

/// Default sink: structured `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn session_started(&self, identity: &UserIdentity) {
        tracing::info!(
            user = identity.user_number,
            userid = identity.userid(),
            profile = %identity.profile.name,
            "running operations"
        );
    }

    fn attempt(&self, identity: &UserIdentity, attempt: &Attempt, payload: &Payload) {
        if attempt.is_success() {
            tracing::info!(
                target: REQUESTS_TARGET,
                user = attempt.user_number,
                userid = identity.userid(),
                request = attempt.request_number,
                operation = %attempt.operation,
                duration_ms = attempt.duration_ms(),
                payload = %payload,
                "request succeeded"
            );
        } else {
            tracing::error!(
                target: REQUESTS_TARGET,
                user = attempt.user_number,
                userid = identity.userid(),
                request = attempt.request_number,
                operation = %attempt.operation,
                duration_ms = attempt.duration_ms(),
                payload = %payload,
                "request failed"
            );
        }
    }

    fn cycle(&self, identity: &UserIdentity, sample: &CycleSample) {
        tracing::trace!(
            user = identity.user_number,
            cycle = sample.cycle_number,
            outcome = %sample.outcome,
            duration_ms = sample.duration.as_secs_f64() * 1000.0,
            "cycle finished"
        );
    }

    fn session_finished(&self, stats: &ActivityStats) {
        tracing::info!(
            user = stats.user_number,
            successful = stats.successful_requests,
            failed = stats.failed_requests,
            status = ?stats.status,
            "session finished"
        );
    }

    fn session_failed(
        &self,
        user_number: u64,
        stage: SessionStage,
        error: &(dyn std::error::Error + 'static),
    ) {
        tracing::error!(user = user_number, %stage, error = %error, "session failed");
    }

    fn teardown_failed(&self, user_number: u64, error: &TeardownError) {
        tracing::warn!(
            user = user_number,
            step = error.step,
            error = %error.source,
            "cleanup failed"
        );
    }
}
