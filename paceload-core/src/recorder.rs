use std::sync::Arc;
use std::time::Duration;

use paceload_metrics::{AggregateStats, Attempt, CycleSample, Outcome};

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Completed,
    /// The round-robin profile for this user could not be resolved.
    ProfileMissing(String),
    /// Per-user fixture creation failed; the loop never ran.
    SetupFailed(String),
    /// The session task itself died (panic or cancellation).
    Aborted(String),
}

impl SessionStatus {
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::ProfileMissing(reason) => write!(f, "profile missing: {reason}"),
            Self::SetupFailed(reason) => write!(f, "setup failed: {reason}"),
            Self::Aborted(reason) => write!(f, "aborted: {reason}"),
        }
    }
}

/// Per-user result handed back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityStats {
    pub user_number: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub attempts: Vec<Attempt>,
    pub cycles: Vec<CycleSample>,
    pub status: SessionStatus,
}

impl ActivityStats {
    /// Zero-valued stats for a user that never reached the loop.
    #[must_use]
    pub fn empty(user_number: u64, status: SessionStatus) -> Self {
        Self {
            user_number,
            successful_requests: 0,
            failed_requests: 0,
            attempts: Vec::new(),
            cycles: Vec::new(),
            status,
        }
    }
}

/// Collects one user's attempts. Owned by exactly one session until it is turned into
/// [`ActivityStats`].
#[derive(Debug)]
pub struct TimingRecorder {
    user_number: u64,
    successful: u64,
    failed: u64,
    attempts: Vec<Attempt>,
    cycles: Vec<CycleSample>,
}

impl TimingRecorder {
    #[must_use]
    pub fn new(user_number: u64) -> Self {
        Self {
            user_number,
            successful: 0,
            failed: 0,
            attempts: Vec::new(),
            cycles: Vec::new(),
        }
    }

    pub fn record_attempt(
        &mut self,
        request_number: u64,
        operation: Arc<str>,
        outcome: Outcome,
        duration: Duration,
    ) -> &Attempt {
        match outcome {
            Outcome::Success => self.successful = self.successful.saturating_add(1),
            Outcome::Failure => self.failed = self.failed.saturating_add(1),
        }

        let idx = self.attempts.len();
        self.attempts.push(Attempt {
            user_number: self.user_number,
            request_number,
            operation,
            outcome,
            duration,
        });
        &self.attempts[idx]
    }

    pub fn record_cycle(
        &mut self,
        cycle_number: u64,
        outcome: Outcome,
        duration: Duration,
    ) -> CycleSample {
        let sample = CycleSample {
            user_number: self.user_number,
            cycle_number,
            outcome,
            duration,
        };
        self.cycles.push(sample);
        sample
    }

    #[must_use]
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Per-operation aggregates over this user's attempts so far.
    #[must_use]
    pub fn aggregates(&self) -> AggregateStats {
        let mut agg = AggregateStats::from_attempts(std::iter::empty::<&str>(), &self.attempts);
        for cycle in &self.cycles {
            agg.record_cycle(cycle);
        }
        agg
    }

    #[must_use]
    pub fn finish(self, status: SessionStatus) -> ActivityStats {
        ActivityStats {
            user_number: self.user_number,
            successful_requests: self.successful,
            failed_requests: self.failed,
            attempts: self.attempts,
            cycles: self.cycles,
            status,
        }
    }
}
