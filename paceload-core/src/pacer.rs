use std::time::Duration;

use tokio::time::Instant;

/// Sleep still owed so that `target` elapses between `started` and the next event.
///
/// Clamped at zero: a slow event shortens or removes the sleep, it never borrows from the next
/// interval.
#[must_use]
pub fn remaining_delay(target: Duration, elapsed: Duration) -> Duration {
    target.saturating_sub(elapsed)
}

/// Delay compensation between operations and between cycles.
///
/// Each interval is measured from its own start instant, so a slow backend never causes the
/// session to issue faster than configured to catch up on earlier intervals.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    operation: Duration,
    cycle: Duration,
}

impl Pacer {
    #[must_use]
    pub fn new(operation: Duration, cycle: Duration) -> Self {
        Self { operation, cycle }
    }

    pub async fn wait_operation(&self, started: Instant) -> Duration {
        wait_until_due(self.operation, started).await
    }

    pub async fn wait_cycle(&self, started: Instant) -> Duration {
        wait_until_due(self.cycle, started).await
    }
}

/// Returns the slept duration.
async fn wait_until_due(target: Duration, started: Instant) -> Duration {
    let delay = remaining_delay(target, started.elapsed());
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    delay
}
