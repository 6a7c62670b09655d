use std::sync::Arc;

use async_trait::async_trait;

use super::error::BoxError;
use super::operation::OperationRegistry;
use super::profiles::Profile;

/// Who a session runs as.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub user_number: u64,
    pub profile: Arc<Profile>,
}

impl UserIdentity {
    /// Backend user id: the `user` credential, else the profile name.
    #[must_use]
    pub fn userid(&self) -> &str {
        self.profile
            .credential("user")
            .unwrap_or(self.profile.name.as_str())
    }
}

/// One failed teardown step.
#[derive(Debug, thiserror::Error)]
#[error("{step}: {source}")]
pub struct TeardownError {
    pub step: &'static str,
    #[source]
    pub source: BoxError,
}

impl TeardownError {
    pub fn new(step: &'static str, source: impl Into<BoxError>) -> Self {
        Self {
            step,
            source: source.into(),
        }
    }
}

/// What a session runs: the operation set plus per-user fixture lifecycle.
///
/// `User` is the per-user state created by `setup`; operations are invoked against it and it is
/// consumed by `teardown`.
#[async_trait]
pub trait Workload: Send + Sync + 'static {
    type User: Send + Sync + 'static;

    /// Profile `type` accepted by this workload's backend.
    fn profile_kind(&self) -> &str;

    fn registry(&self) -> &OperationRegistry<Self::User>;

    async fn setup(&self, identity: &UserIdentity) -> Result<Self::User, BoxError>;

    /// Releases everything `setup` created. Every step is attempted; failures are returned, not
    /// raised.
    async fn teardown(&self, user: Self::User) -> Vec<TeardownError>;
}
