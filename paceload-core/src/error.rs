pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by operations and workload hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("`concurrentUsers` must be a positive integer")]
    InvalidUsers,

    #[error("`profiles` must list at least one profile name")]
    NoProfiles,

    #[error("no operations selected")]
    NoOperations,

    #[error("unknown operation `{name}` (expected one of: {known})")]
    UnknownOperation { name: String, known: String },

    #[error("operation `{0}` is registered twice")]
    DuplicateOperation(String),

    #[error("failed to load profiles: {0}")]
    Profiles(String),

    #[error("no `{kind}` profile named `{name}` for user {user_number}")]
    ProfileNotFound {
        user_number: u64,
        name: String,
        kind: String,
    },
}
