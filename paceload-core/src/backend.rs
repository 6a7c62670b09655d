use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::error::BoxError;
use super::operation::Payload;
use super::profiles::Profile;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("profile `{profile}` is missing credential `{key}`")]
    MissingCredential { profile: String, key: &'static str },

    #[error("failed to connect with profile `{profile}`: {reason}")]
    Connect { profile: String, reason: String },

    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Outcome of one backend call that reached the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub success: bool,
    pub payload: Payload,
}

impl Reply {
    #[must_use]
    pub fn new(success: bool, payload: Payload) -> Self {
        Self { success, payload }
    }

    /// Body size reported by downloads, `0` when absent.
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.payload
            .get("bytes")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0)
    }
}

/// Something a session creates, reads or deletes on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Dataset(String),
    Member { dataset: String, member: String },
    File(String),
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dataset(name) => f.write_str(name),
            Self::Member { dataset, member } => write!(f, "{dataset}({member})"),
            Self::File(path) => f.write_str(path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum CommandKind {
    Tso,
    Console,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpoolFile {
    pub id: u64,
    pub ddname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub jobname: String,
    pub jobid: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub retcode: Option<String>,
    #[serde(default)]
    pub spool: Vec<SpoolFile>,
}

impl JobHandle {
    #[must_use]
    pub fn completed_ok(&self) -> bool {
        self.retcode.as_deref() == Some("CC 0000")
    }

    #[must_use]
    pub fn spool_id(&self, ddname: &str) -> Option<u64> {
        self.spool.iter().find(|f| f.ddname == ddname).map(|f| f.id)
    }
}

/// Remote system the standard workload drives.
///
/// A session is opened once per user and is never shared between users.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    type Session: Clone + Send + Sync + 'static;

    /// Profile `type` this backend accepts.
    fn profile_kind(&self) -> &str;

    async fn connect(&self, profile: &Profile) -> Result<Self::Session, BackendError>;

    async fn create_resource(&self, session: &Self::Session, dataset: &str)
    -> Result<Reply, BackendError>;

    async fn resource_exists(&self, session: &Self::Session, dataset: &str)
    -> Result<bool, BackendError>;

    async fn upload(
        &self,
        session: &Self::Session,
        target: &Target,
        body: Bytes,
    ) -> Result<Reply, BackendError>;

    async fn download(&self, session: &Self::Session, target: &Target)
    -> Result<Reply, BackendError>;

    async fn issue_command(
        &self,
        session: &Self::Session,
        kind: CommandKind,
        command: &str,
        account: &str,
    ) -> Result<Reply, BackendError>;

    async fn submit_job(&self, session: &Self::Session, jcl: &str)
    -> Result<JobHandle, BackendError>;

    /// Polls until the job has output; returns the refreshed handle.
    async fn wait_for_job(
        &self,
        session: &Self::Session,
        job: &JobHandle,
    ) -> Result<JobHandle, BackendError>;

    async fn list_spool(
        &self,
        session: &Self::Session,
        job: &JobHandle,
    ) -> Result<Vec<SpoolFile>, BackendError>;

    async fn get_job_output(
        &self,
        session: &Self::Session,
        job: &JobHandle,
        spool_id: u64,
    ) -> Result<Reply, BackendError>;

    async fn delete_job(&self, session: &Self::Session, job: &JobHandle)
    -> Result<Reply, BackendError>;

    async fn delete_resource(&self, session: &Self::Session, target: &Target)
    -> Result<Reply, BackendError>;
}
