use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use paceload_core::{
    Backend, BackendError, CommandKind, JobHandle, Profile, Reply, SpoolFile, StandardWorkload,
    Target, TestDefinition, UserIdentity, Workload, WorkloadParams,
};
use parking_lot::Mutex;
use serde_json::json;

#[derive(Default)]
struct FakeState {
    calls: Vec<String>,
    datasets: BTreeSet<String>,
    uploads: BTreeMap<String, usize>,
    jobs: u64,
}

#[derive(Default, Clone)]
struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
    refuse_dataset_delete: bool,
    retcode: Option<String>,
}

impl FakeBackend {
    fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    fn log(&self, call: String) {
        self.state.lock().calls.push(call);
    }

    fn job(&self, jobname: &str, jobid: &str) -> JobHandle {
        JobHandle {
            jobname: jobname.to_string(),
            jobid: jobid.to_string(),
            status: Some("OUTPUT".to_string()),
            retcode: Some(self.retcode.clone().unwrap_or_else(|| "CC 0000".to_string())),
            spool: vec![
                SpoolFile {
                    id: 2,
                    ddname: "JESMSGLG".to_string(),
                },
                SpoolFile {
                    id: 102,
                    ddname: "SYSUT2".to_string(),
                },
            ],
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    type Session = String;

    fn profile_kind(&self) -> &str {
        "fake"
    }

    async fn connect(&self, profile: &Profile) -> Result<String, BackendError> {
        self.log(format!("connect {}", profile.name));
        Ok(profile.name.clone())
    }

    async fn create_resource(&self, _s: &String, dataset: &str) -> Result<Reply, BackendError> {
        self.log(format!("create {dataset}"));
        self.state.lock().datasets.insert(dataset.to_string());
        Ok(Reply::new(true, json!({})))
    }

    async fn resource_exists(&self, _s: &String, dataset: &str) -> Result<bool, BackendError> {
        self.log(format!("exists {dataset}"));
        Ok(self.state.lock().datasets.contains(dataset))
    }

    async fn upload(
        &self,
        _s: &String,
        target: &Target,
        body: Bytes,
    ) -> Result<Reply, BackendError> {
        self.log(format!("upload {target}"));
        self.state.lock().uploads.insert(target.to_string(), body.len());
        Ok(Reply::new(true, json!({ "bytes": body.len() })))
    }

    async fn download(&self, _s: &String, target: &Target) -> Result<Reply, BackendError> {
        self.log(format!("download {target}"));
        let len = self.state.lock().uploads.get(&target.to_string()).copied();
        Ok(match len {
            Some(len) => Reply::new(true, json!({ "bytes": len })),
            None => Reply::new(false, json!({ "status": 404 })),
        })
    }

    async fn issue_command(
        &self,
        _s: &String,
        kind: CommandKind,
        command: &str,
        account: &str,
    ) -> Result<Reply, BackendError> {
        self.log(format!("{kind} {command} [{account}]"));
        Ok(Reply::new(true, json!({})))
    }

    async fn submit_job(&self, _s: &String, jcl: &str) -> Result<JobHandle, BackendError> {
        let jobname = jcl
            .lines()
            .next()
            .and_then(|l| l.strip_prefix("//"))
            .and_then(|l| l.split_whitespace().next())
            .unwrap_or("NONAME")
            .to_string();
        let jobid = {
            let mut state = self.state.lock();
            state.jobs += 1;
            format!("JOB{:05}", state.jobs)
        };
        self.log(format!("submit {jobname}"));
        Ok(self.job(&jobname, &jobid))
    }

    async fn wait_for_job(&self, _s: &String, job: &JobHandle) -> Result<JobHandle, BackendError> {
        self.log(format!("wait {}", job.jobid));
        // Status polls carry no spool listing.
        Ok(JobHandle {
            spool: Vec::new(),
            ..job.clone()
        })
    }

    async fn list_spool(
        &self,
        _s: &String,
        job: &JobHandle,
    ) -> Result<Vec<SpoolFile>, BackendError> {
        self.log(format!("spool {}", job.jobid));
        Ok(self.job(&job.jobname, &job.jobid).spool)
    }

    async fn get_job_output(
        &self,
        _s: &String,
        job: &JobHandle,
        spool_id: u64,
    ) -> Result<Reply, BackendError> {
        self.log(format!("output {} {spool_id}", job.jobid));
        Ok(Reply::new(spool_id == 102, json!({ "bytes": 80 })))
    }

    async fn delete_job(&self, _s: &String, job: &JobHandle) -> Result<Reply, BackendError> {
        self.log(format!("delete job {}", job.jobid));
        Ok(Reply::new(true, json!({})))
    }

    async fn delete_resource(&self, _s: &String, target: &Target) -> Result<Reply, BackendError> {
        self.log(format!("delete {target}"));
        if self.refuse_dataset_delete && matches!(target, Target::Dataset(_)) {
            return Err(BackendError::Protocol("dataset in use".to_string()));
        }
        Ok(Reply::new(true, json!({})))
    }
}

fn identity(user_number: u64) -> UserIdentity {
    UserIdentity {
        user_number,
        profile: Arc::new(Profile {
            name: "lpar1".to_string(),
            kind: "fake".to_string(),
            credentials: BTreeMap::from([("user".to_string(), "ibmuser".to_string())]),
        }),
    }
}

fn params() -> WorkloadParams {
    WorkloadParams::from_definition(&TestDefinition {
        member_size: Some("800".to_string()),
        file_size: Some("1600".to_string()),
        job_output_size: Some("160".to_string()),
        dsn_second_segment: "PERF".to_string(),
        unix_dir: "/u/ibmuser".to_string(),
        account_code: "ACCT1".to_string(),
        job_card: vec!["//$jobname JOB (ACCT1)".to_string()],
        ..TestDefinition::default()
    })
}

#[tokio::test]
async fn setup_builds_per_user_fixtures() {
    let backend = FakeBackend::default();
    let workload = StandardWorkload::new(backend.clone(), params())
        .unwrap_or_else(|e| panic!("workload should build: {e}"));

    let user = workload
        .setup(&identity(3))
        .await
        .unwrap_or_else(|e| panic!("setup should succeed: {e}"));
    assert_eq!(user.dataset(), "IBMUSER.PERF.U3");
    assert_eq!(user.upload_path(), "/u/ibmuser/test3.txt");
    assert_eq!(user.job().jobname, "ZZT3");
    assert_eq!(user.job().spool_id("SYSUT2"), Some(102));

    assert_eq!(
        backend.calls(),
        vec![
            "connect lpar1",
            "exists IBMUSER.PERF.U3",
            "create IBMUSER.PERF.U3",
            "submit ZZT3",
            "wait JOB00001",
            "spool JOB00001",
        ]
    );

    // A second setup for the same user reuses the dataset.
    let again = workload
        .setup(&identity(3))
        .await
        .unwrap_or_else(|e| panic!("setup should succeed: {e}"));
    assert!(!backend.calls().iter().skip(6).any(|c| c.starts_with("create")));

    assert!(workload.teardown(user).await.is_empty());
    assert!(workload.teardown(again).await.is_empty());
}

#[tokio::test]
async fn every_standard_operation_succeeds_against_a_healthy_backend() {
    let backend = FakeBackend::default();
    let workload = StandardWorkload::new(backend.clone(), params())
        .unwrap_or_else(|e| panic!("workload should build: {e}"));
    let user = workload
        .setup(&identity(0))
        .await
        .unwrap_or_else(|e| panic!("setup should succeed: {e}"));

    let operations = workload
        .registry()
        .select(None)
        .unwrap_or_else(|e| panic!("selection should succeed: {e}"));
    for op in &operations {
        let result = op.invoke(&user).await;
        assert!(result.success, "{} failed: {}", op.name(), result.payload);
    }

    let failures = workload.teardown(user).await;
    assert!(failures.is_empty(), "{failures:?}");

    let calls = backend.calls();
    assert!(calls.contains(&"upload IBMUSER.PERF.U0(TEST1)".to_string()));
    assert!(calls.contains(&"upload /u/ibmuser/test0.txt".to_string()));
    assert!(calls.contains(&"tso SEND 'Hello' USER(ibmuser) [ACCT1]".to_string()));
    assert!(calls.contains(&"console D IPLINFO [ACCT1]".to_string()));
    assert!(calls.contains(&"output JOB00001 102".to_string()));
    // The job submitted by JobSubmit was released before teardown returned.
    assert!(calls.contains(&"delete job JOB00002".to_string()));
}

#[tokio::test]
async fn failed_prerequisite_job_fails_setup() {
    let backend = FakeBackend {
        retcode: Some("JCL ERROR".to_string()),
        ..FakeBackend::default()
    };
    let workload = StandardWorkload::new(backend, params())
        .unwrap_or_else(|e| panic!("workload should build: {e}"));

    match workload.setup(&identity(0)).await {
        Err(err) => assert!(err.to_string().contains("JCL ERROR"), "{err}"),
        Ok(_) => panic!("setup should fail"),
    }
}

#[tokio::test]
async fn teardown_attempts_every_step() {
    let backend = FakeBackend {
        refuse_dataset_delete: true,
        ..FakeBackend::default()
    };
    let workload = StandardWorkload::new(backend.clone(), params())
        .unwrap_or_else(|e| panic!("workload should build: {e}"));
    let user = workload
        .setup(&identity(1))
        .await
        .unwrap_or_else(|e| panic!("setup should succeed: {e}"));

    let failures = workload.teardown(user).await;
    let steps: Vec<&str> = failures.iter().map(|f| f.step).collect();
    assert_eq!(steps, vec!["delete dataset"]);

    let calls = backend.calls();
    let tail: Vec<&str> = calls.iter().rev().take(3).rev().map(String::as_str).collect();
    assert_eq!(
        tail,
        vec![
            "delete job JOB00001",
            "delete IBMUSER.PERF.U1",
            "delete /u/ibmuser/test1.txt",
        ]
    );
}
