//! The standard mainframe-style workload: datasets, USS files, TSO/console commands and jobs.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::json;
use strum::IntoEnumIterator as _;
use tempfile::NamedTempFile;
use tokio::task::JoinSet;

use super::backend::{Backend, BackendError, CommandKind, JobHandle, Reply, Target};
use super::config::{TestDefinition, resolve_size};
use super::error::{BoxError, Result};
use super::operation::{Operation, OperationRegistry, OperationResult};
use super::workload::{TeardownError, UserIdentity, Workload};

/// One 80-column source record, newline terminated.
pub const RECORD: &str =
    " 04110     DISPLAY 'HELLO, WORLD' UPON CONSL.                           00170000\n";
pub const RECORD_LEN: u64 = 80;

/// DD name of the prerequisite job's copied in-stream data.
pub const OUTPUT_DDNAME: &str = "SYSUT2";

const MEMBER: &str = "TEST1";
const JOB_PREFIX: &str = "ZZT";
const DEFAULT_JOB_CARD: &str = "//$jobname JOB (ACCT),'PACELOAD',CLASS=A,MSGCLASS=X";
const JOB_STEPS: [&str; 5] = [
    "//RUN EXEC PGM=IEBGENER",
    "//SYSPRINT DD SYSOUT=*",
    "//SYSIN DD DUMMY",
    "//SYSUT2 DD SYSOUT=*",
    "//SYSUT1 DD *",
];

/// Closed set of operations, in registration order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
pub enum OperationKind {
    DatasetUpload,
    DatasetDownload,
    FileUpload,
    FileDownload,
    TsoCommand,
    ConsoleCommand,
    JobSubmit,
    JobView,
    JobDownload,
}

impl OperationKind {
    pub fn names() -> impl Iterator<Item = &'static str> {
        Self::iter().map(<&'static str>::from)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to create dataset `{dataset}`: {payload}")]
    CreateDataset { dataset: String, payload: String },

    #[error("prerequisite job {jobname}({jobid}) ended with `{retcode}`, expected `CC 0000`")]
    JobFailed {
        jobname: String,
        jobid: String,
        retcode: String,
    },
}

/// Backend-specific parameters of the standard workload, resolved from the test definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadParams {
    pub file_size: u64,
    pub member_size: u64,
    pub job_output_size: u64,
    pub dsn_second_segment: String,
    pub unix_dir: String,
    pub account_code: String,
    pub job_card: Vec<String>,
}

impl WorkloadParams {
    #[must_use]
    pub fn from_definition(def: &TestDefinition) -> Self {
        let non_empty = |s: &str, default: &str| {
            if s.trim().is_empty() {
                default.to_string()
            } else {
                s.trim().to_string()
            }
        };

        Self {
            file_size: resolve_size(def.file_size.as_deref()),
            member_size: resolve_size(def.member_size.as_deref()),
            job_output_size: resolve_size(def.job_output_size.as_deref()),
            dsn_second_segment: non_empty(&def.dsn_second_segment, "PACELOAD"),
            unix_dir: non_empty(&def.unix_dir, "/tmp"),
            account_code: def.account_code.clone(),
            job_card: if def.job_card.is_empty() {
                vec![DEFAULT_JOB_CARD.to_string()]
            } else {
                def.job_card.clone()
            },
        }
    }
}

/// `size` bytes worth of whole records (rounded down).
#[must_use]
pub fn records(size: u64) -> String {
    RECORD.repeat(usize::try_from(size / RECORD_LEN).unwrap_or(0))
}

#[must_use]
pub fn dataset_name(userid: &str, segment: &str, user_number: u64) -> String {
    format!("{}.{segment}.U{user_number}", userid.to_uppercase())
}

#[must_use]
pub fn upload_path(unix_dir: &str, user_number: u64) -> String {
    format!("{}/test{user_number}.txt", unix_dir.trim_end_matches('/'))
}

#[must_use]
pub fn jobname(user_number: u64) -> String {
    format!("{JOB_PREFIX}{user_number}")
}

/// Job card with the first `$jobname` substituted, the IEBGENER copy step, then in-stream data.
#[must_use]
pub fn job_text(job_card: &[String], jobname: &str, output_size: u64) -> String {
    let mut jcl = job_card.join("\n").replacen("$jobname", jobname, 1);
    jcl.push('\n');
    jcl.push_str(&JOB_STEPS.join("\n"));
    jcl.push('\n');
    jcl.push_str(&records(output_size));
    jcl
}

/// Per-user fixtures and the backend session they live in.
pub struct StandardUser<S> {
    pub user_number: u64,
    pub userid: String,
    session: S,
    member_file: NamedTempFile,
    uss_file: NamedTempFile,
    dataset: String,
    upload_path: String,
    jcl: String,
    job: JobHandle,
    spool_id: u64,
    releases: Mutex<JoinSet<()>>,
}

impl<S> StandardUser<S> {
    #[must_use]
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    #[must_use]
    pub fn upload_path(&self) -> &str {
        &self.upload_path
    }

    #[must_use]
    pub fn job(&self) -> &JobHandle {
        &self.job
    }

    fn member_target(&self) -> Target {
        Target::Member {
            dataset: self.dataset.clone(),
            member: MEMBER.to_string(),
        }
    }

    fn file_target(&self) -> Target {
        Target::File(self.upload_path.clone())
    }
}

impl<S: Clone + Send + Sync + 'static> StandardUser<S> {
    /// Waits for `job` to reach output and deletes it, off the measured path.
    fn release_in_background<B>(&self, backend: Arc<B>, job: JobHandle)
    where
        B: Backend<Session = S>,
    {
        let session = self.session.clone();
        let user_number = self.user_number;

        let mut releases = self.releases.lock();
        while releases.try_join_next().is_some() {}
        releases.spawn(async move {
            let released = async {
                let done = backend.wait_for_job(&session, &job).await?;
                backend.delete_job(&session, &done).await
            }
            .await;
            if let Err(err) = released {
                tracing::debug!(
                    user = user_number,
                    job = %job.jobid,
                    error = %err,
                    "background job release failed"
                );
            }
        });
    }
}

struct StandardOperation<B> {
    kind: OperationKind,
    backend: Arc<B>,
    params: Arc<WorkloadParams>,
}

#[async_trait]
impl<B: Backend> Operation<StandardUser<B::Session>> for StandardOperation<B> {
    async fn invoke(
        &self,
        user: &StandardUser<B::Session>,
    ) -> std::result::Result<OperationResult, BoxError> {
        let backend = self.backend.as_ref();
        let session = &user.session;

        let reply = match self.kind {
            OperationKind::DatasetUpload => {
                let body = Bytes::from(tokio::fs::read(user.member_file.path()).await?);
                backend.upload(session, &user.member_target(), body).await?
            }
            OperationKind::DatasetDownload => {
                backend.download(session, &user.member_target()).await?
            }
            OperationKind::FileUpload => {
                let body = Bytes::from(tokio::fs::read(user.uss_file.path()).await?);
                backend.upload(session, &user.file_target(), body).await?
            }
            OperationKind::FileDownload => backend.download(session, &user.file_target()).await?,
            OperationKind::TsoCommand => {
                let command = format!("SEND 'Hello' USER({})", user.userid);
                backend
                    .issue_command(session, CommandKind::Tso, &command, &self.params.account_code)
                    .await?
            }
            OperationKind::ConsoleCommand => {
                backend
                    .issue_command(
                        session,
                        CommandKind::Console,
                        "D IPLINFO",
                        &self.params.account_code,
                    )
                    .await?
            }
            OperationKind::JobSubmit => {
                let job = backend.submit_job(session, &user.jcl).await?;
                let payload = json!({ "job": job });
                user.release_in_background(self.backend.clone(), job);
                Reply::new(true, payload)
            }
            OperationKind::JobView => {
                let spool = backend.list_spool(session, &user.job).await?;
                Reply::new(!spool.is_empty(), json!({ "spool": spool }))
            }
            OperationKind::JobDownload => {
                let reply = backend
                    .get_job_output(session, &user.job, user.spool_id)
                    .await?;
                Reply::new(reply.success && reply.bytes() > 0, reply.payload)
            }
        };

        Ok(OperationResult {
            success: reply.success,
            payload: reply.payload,
        })
    }
}

/// [`Workload`] running the standard operation set against any [`Backend`].
pub struct StandardWorkload<B: Backend> {
    backend: Arc<B>,
    params: Arc<WorkloadParams>,
    registry: OperationRegistry<StandardUser<B::Session>>,
}

impl<B: Backend> StandardWorkload<B> {
    pub fn new(backend: B, params: WorkloadParams) -> Result<Self> {
        let backend = Arc::new(backend);
        let params = Arc::new(params);

        let mut registry = OperationRegistry::new();
        for kind in OperationKind::iter() {
            registry.register(
                <&'static str>::from(kind),
                StandardOperation {
                    kind,
                    backend: backend.clone(),
                    params: params.clone(),
                },
            )?;
        }

        Ok(Self {
            backend,
            params,
            registry,
        })
    }

    #[must_use]
    pub fn params(&self) -> &WorkloadParams {
        &self.params
    }

    async fn write_records(size: u64) -> std::io::Result<NamedTempFile> {
        let file = NamedTempFile::new()?;
        tokio::fs::write(file.path(), records(size)).await?;
        Ok(file)
    }

    async fn ensure_dataset(
        &self,
        session: &B::Session,
        dataset: &str,
    ) -> std::result::Result<(), BoxError> {
        if self.backend.resource_exists(session, dataset).await? {
            tracing::debug!(dataset, "reusing existing dataset");
            return Ok(());
        }
        let reply = self.backend.create_resource(session, dataset).await?;
        if !reply.success {
            return Err(SetupError::CreateDataset {
                dataset: dataset.to_string(),
                payload: reply.payload.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

fn check_reply(
    step: &'static str,
    result: std::result::Result<Reply, BackendError>,
) -> Option<TeardownError> {
    match result {
        Ok(reply) if reply.success => None,
        Ok(reply) => Some(TeardownError::new(
            step,
            BackendError::Protocol(format!("unsuccessful reply: {}", reply.payload)),
        )),
        Err(err) => Some(TeardownError::new(step, err)),
    }
}

#[async_trait]
impl<B: Backend> Workload for StandardWorkload<B> {
    type User = StandardUser<B::Session>;

    fn profile_kind(&self) -> &str {
        self.backend.profile_kind()
    }

    fn registry(&self) -> &OperationRegistry<Self::User> {
        &self.registry
    }

    async fn setup(&self, identity: &UserIdentity) -> std::result::Result<Self::User, BoxError> {
        let user_number = identity.user_number;
        let userid = identity.userid().to_string();
        let session = self.backend.connect(&identity.profile).await?;

        let member_file = Self::write_records(self.params.member_size).await?;
        let uss_file = Self::write_records(self.params.file_size).await?;

        let dataset = dataset_name(&userid, &self.params.dsn_second_segment, user_number);
        self.ensure_dataset(&session, &dataset).await?;

        let jcl = job_text(
            &self.params.job_card,
            &jobname(user_number),
            self.params.job_output_size,
        );
        let submitted = self.backend.submit_job(&session, &jcl).await?;
        let mut job = self.backend.wait_for_job(&session, &submitted).await?;
        if !job.completed_ok() {
            return Err(SetupError::JobFailed {
                jobname: job.jobname,
                jobid: job.jobid,
                retcode: job.retcode.unwrap_or_default(),
            }
            .into());
        }

        job.spool = self.backend.list_spool(&session, &job).await?;
        let spool_id = job.spool_id(OUTPUT_DDNAME).unwrap_or(0);
        if spool_id == 0 {
            tracing::warn!(user = user_number, job = %job.jobid, "no {OUTPUT_DDNAME} spool file");
        }

        tracing::debug!(
            user = user_number,
            userid = %userid,
            dataset = %dataset,
            job = %job.jobid,
            "fixtures ready"
        );

        Ok(StandardUser {
            user_number,
            upload_path: upload_path(&self.params.unix_dir, user_number),
            userid,
            session,
            member_file,
            uss_file,
            dataset,
            jcl,
            job,
            spool_id,
            releases: Mutex::new(JoinSet::new()),
        })
    }

    async fn teardown(&self, user: Self::User) -> Vec<TeardownError> {
        let mut failures = Vec::new();
        let backend = self.backend.as_ref();
        let session = &user.session;

        let mut releases = std::mem::take(&mut *user.releases.lock());
        while let Some(joined) = releases.join_next().await {
            if let Err(err) = joined {
                failures.push(TeardownError::new("release submitted job", err));
            }
        }

        failures.extend(check_reply(
            "delete job",
            backend.delete_job(session, &user.job).await,
        ));
        failures.extend(check_reply(
            "delete dataset",
            backend
                .delete_resource(session, &Target::Dataset(user.dataset.clone()))
                .await,
        ));
        failures.extend(check_reply(
            "delete file",
            backend.delete_resource(session, &user.file_target()).await,
        ));

        for file in [user.member_file, user.uss_file] {
            if let Err(err) = file.close() {
                failures.push(TeardownError::new("remove local file", err));
            }
        }

        failures
    }
}
