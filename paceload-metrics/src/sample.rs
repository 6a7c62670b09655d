use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    #[must_use]
    pub fn from_success(success: bool) -> Self {
        if success { Self::Success } else { Self::Failure }
    }

    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// One recorded operation invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub user_number: u64,
    /// Monotonic per user, starting at 1.
    pub request_number: u64,
    pub operation: Arc<str>,
    pub outcome: Outcome,
    pub duration: Duration,
}

impl Attempt {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    #[must_use]
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

/// One full pass through a user's active operations, excluding the trailing cycle delay.
///
/// A cycle counts as failed if any attempt inside it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSample {
    pub user_number: u64,
    pub cycle_number: u64,
    pub outcome: Outcome,
    pub duration: Duration,
}
