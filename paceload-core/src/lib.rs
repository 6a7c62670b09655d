mod error;

pub mod backend;
pub mod config;
pub mod operation;
pub mod orchestrator;
pub mod pacer;
pub mod profiles;
pub mod progress;
pub mod recorder;
pub mod session;
pub mod sink;
pub mod standard;
pub mod workload;

pub use backend::{Backend, BackendError, CommandKind, JobHandle, Reply, SpoolFile, Target};
pub use config::{
    PlanOverrides, RunPlan, TestDefinition, parse_duration, resolve_duration, resolve_size,
};
pub use error::{BoxError, Error, Result};
pub use operation::{
    FnOperation, Operation, OperationRegistry, OperationResult, Payload, RegisteredOperation,
    from_fn, safe_invoke,
};
pub use orchestrator::{Orchestrator, RunReport};
pub use pacer::{Pacer, remaining_delay};
pub use profiles::{Profile, ProfileSource, ProfileTable};
pub use progress::{ProgressFn, ProgressUpdate};
pub use recorder::{ActivityStats, SessionStatus, TimingRecorder};
pub use session::{SessionContext, run_session};
pub use sink::{EventSink, NoopSink, REQUESTS_TARGET, SessionStage, TracingSink};
pub use standard::{OperationKind, StandardUser, StandardWorkload, WorkloadParams};
pub use workload::{TeardownError, UserIdentity, Workload};

pub use paceload_metrics::{AggregateStats, Attempt, BucketStats, CycleSample, Outcome};
