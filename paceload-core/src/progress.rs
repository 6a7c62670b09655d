use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    /// Monotonic tick counter (1-based) for progress emissions.
    pub tick: u64,
    pub elapsed: Duration,
    /// Configured loop duration plus the largest start stagger.
    pub planned: Duration,
    pub users_total: u64,
    pub users_finished: u64,
    /// Totals over finished sessions only.
    pub successful_requests: u64,
    pub failed_requests: u64,
}

pub type ProgressFn = std::sync::Arc<dyn Fn(ProgressUpdate) + Send + Sync + 'static>;
