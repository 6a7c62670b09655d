pub mod agg;
pub mod sample;

pub use agg::{AggregateStats, BucketStats, RunningStats};
pub use sample::{Attempt, CycleSample, Outcome};
