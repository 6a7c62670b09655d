use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;

use crate::sample::{Attempt, CycleSample, Outcome};

/// Welford accumulator over millisecond samples.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RunningStats {
    n: u64,
    mean: f64,
    m2: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, x: f64) {
        self.n = self.n.saturating_add(1);
        let n_f = self.n as f64;

        let delta = x - self.mean;
        self.mean += delta / n_f;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;

        if x > self.max {
            self.max = x;
        }
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    /// `NaN` when no samples were pushed.
    pub fn mean(&self) -> f64 {
        if self.n == 0 {
            return f64::NAN;
        }
        self.mean
    }

    pub fn stdev(&self) -> f64 {
        if self.n < 2 {
            return 0.0;
        }
        (self.m2 / (self.n as f64 - 1.0)).sqrt()
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

/// Success/failure split for one operation (or the synthetic total/cycle buckets).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BucketStats {
    pub success_count: u64,
    pub failure_count: u64,
    pub success_duration: Duration,
    pub failure_duration: Duration,
    /// Latency over every sample regardless of outcome.
    pub latency_ms: RunningStats,
}

impl BucketStats {
    pub fn record(&mut self, outcome: Outcome, duration: Duration) {
        match outcome {
            Outcome::Success => {
                self.success_count = self.success_count.saturating_add(1);
                self.success_duration = self.success_duration.saturating_add(duration);
            }
            Outcome::Failure => {
                self.failure_count = self.failure_count.saturating_add(1);
                self.failure_duration = self.failure_duration.saturating_add(duration);
            }
        }
        self.latency_ms.push(duration.as_secs_f64() * 1000.0);
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.success_count.saturating_add(self.failure_count)
    }

    /// Average successful duration in ms, `NaN` when there were no successes.
    #[must_use]
    pub fn avg_success_ms(&self) -> f64 {
        avg_ms(self.success_duration, self.success_count)
    }

    /// Average failed duration in ms, `NaN` when there were no failures.
    #[must_use]
    pub fn avg_failure_ms(&self) -> f64 {
        avg_ms(self.failure_duration, self.failure_count)
    }
}

fn avg_ms(sum: Duration, count: u64) -> f64 {
    if count == 0 {
        return f64::NAN;
    }
    sum.as_secs_f64() * 1000.0 / count as f64
}

/// Cross-user statistics, grouped by operation name.
///
/// Operations keep the order they were declared in (see [`AggregateStats::new`]); names first
/// seen while recording are appended.
#[derive(Debug, Default, Clone)]
pub struct AggregateStats {
    operations: Vec<(Arc<str>, BucketStats)>,
    index: AHashMap<Arc<str>, usize>,
    total: BucketStats,
    cycles: BucketStats,
}

impl AggregateStats {
    pub const TOTAL: &'static str = "TOTAL";
    pub const CYCLE: &'static str = "Cycle";

    /// Pre-seeds one empty bucket per name so operations without samples still show up.
    pub fn new<I, S>(order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let mut out = Self::default();
        for name in order {
            out.bucket_mut(name.into());
        }
        out
    }

    pub fn from_attempts<'a, I, S>(
        order: I,
        attempts: impl IntoIterator<Item = &'a Attempt>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let mut out = Self::new(order);
        for attempt in attempts {
            out.record(attempt);
        }
        out
    }

    pub fn record(&mut self, attempt: &Attempt) {
        self.bucket_mut(attempt.operation.clone())
            .record(attempt.outcome, attempt.duration);
        self.total.record(attempt.outcome, attempt.duration);
    }

    pub fn record_cycle(&mut self, cycle: &CycleSample) {
        self.cycles.record(cycle.outcome, cycle.duration);
    }

    fn bucket_mut(&mut self, name: Arc<str>) -> &mut BucketStats {
        let idx = match self.index.get(&name) {
            Some(idx) => *idx,
            None => {
                let idx = self.operations.len();
                self.index.insert(name.clone(), idx);
                self.operations.push((name, BucketStats::default()));
                idx
            }
        };
        &mut self.operations[idx].1
    }

    pub fn operations(&self) -> impl Iterator<Item = (&str, &BucketStats)> {
        self.operations.iter().map(|(name, b)| (name.as_ref(), b))
    }

    #[must_use]
    pub fn operation(&self, name: &str) -> Option<&BucketStats> {
        self.index.get(name).map(|idx| &self.operations[*idx].1)
    }

    #[must_use]
    pub fn total(&self) -> &BucketStats {
        &self.total
    }

    #[must_use]
    pub fn cycles(&self) -> &BucketStats {
        &self.cycles
    }
}
