use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use paceload_core::{
    Backend, CommandKind, NoopSink, Orchestrator, PlanOverrides, Profile, ProfileTable, RunPlan,
    StandardWorkload, Target, TestDefinition, WorkloadParams,
};
use paceload_http::{HttpBackend, HttpBackendOptions, PROFILE_KIND};
use paceload_testserver::{TestServer, TestServerOptions};

fn profile(name: &str, base_url: &str) -> Profile {
    Profile {
        name: name.to_string(),
        kind: PROFILE_KIND.to_string(),
        credentials: BTreeMap::from([
            ("baseUrl".to_string(), base_url.to_string()),
            ("user".to_string(), "ibmuser".to_string()),
            ("password".to_string(), "sys1".to_string()),
        ]),
    }
}

fn definition(users: u64) -> TestDefinition {
    TestDefinition {
        name: "http-e2e".to_string(),
        duration: Some("300ms".to_string()),
        command_delay: Some("10ms".to_string()),
        script_delay: Some("0s".to_string()),
        concurrent_users: users,
        profiles: vec!["lpar1".to_string()],
        member_size: Some("800".to_string()),
        file_size: Some("1.6KB".to_string()),
        job_output_size: Some("400".to_string()),
        dsn_second_segment: "PERF".to_string(),
        unix_dir: "/u/ibmuser".to_string(),
        account_code: "ACCT1".to_string(),
        job_card: vec!["//$jobname JOB (ACCT1),'PACELOAD'".to_string()],
        ..TestDefinition::default()
    }
}

fn backend() -> HttpBackend {
    HttpBackend::new(HttpBackendOptions {
        poll_interval: std::time::Duration::from_millis(10),
        ..HttpBackendOptions::default()
    })
}

#[tokio::test]
async fn protocol_round_trip() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("server should start: {e}"));
    let backend = backend();
    let session = backend
        .connect(&profile("lpar1", server.base_url()))
        .await
        .unwrap_or_else(|e| panic!("connect: {e}"));

    let exists = backend.resource_exists(&session, "IBMUSER.PERF.U0").await;
    assert!(matches!(exists, Ok(false)));
    let created = backend
        .create_resource(&session, "IBMUSER.PERF.U0")
        .await
        .unwrap_or_else(|e| panic!("create: {e}"));
    assert!(created.success);
    assert!(matches!(
        backend.resource_exists(&session, "IBMUSER.PERF.U0").await,
        Ok(true)
    ));

    let member = Target::Member {
        dataset: "IBMUSER.PERF.U0".to_string(),
        member: "TEST1".to_string(),
    };
    let up = backend
        .upload(&session, &member, Bytes::from_static(b"HELLO\n"))
        .await
        .unwrap_or_else(|e| panic!("upload: {e}"));
    assert!(up.success, "{}", up.payload);
    let down = backend
        .download(&session, &member)
        .await
        .unwrap_or_else(|e| panic!("download: {e}"));
    assert!(down.success);
    assert_eq!(down.bytes(), 6);

    let tso = backend
        .issue_command(&session, CommandKind::Tso, "SEND 'Hello' USER(ibmuser)", "ACCT1")
        .await
        .unwrap_or_else(|e| panic!("tso: {e}"));
    assert!(tso.success, "{}", tso.payload);
    let no_account = backend
        .issue_command(&session, CommandKind::Tso, "TIME", "")
        .await
        .unwrap_or_else(|e| panic!("tso: {e}"));
    assert!(!no_account.success);

    let job = backend
        .submit_job(
            &session,
            "//ZZT0 JOB (ACCT1)\n//RUN EXEC PGM=IEBGENER\n//SYSUT1 DD *\nLINE1\nLINE2\n",
        )
        .await
        .unwrap_or_else(|e| panic!("submit: {e}"));
    assert_eq!(job.jobname, "ZZT0");
    let job = backend
        .wait_for_job(&session, &job)
        .await
        .unwrap_or_else(|e| panic!("wait: {e}"));
    assert!(job.completed_ok());
    let spool_id = job
        .spool_id("SYSUT2")
        .unwrap_or_else(|| panic!("no SYSUT2 in {job:?}"));
    let output = backend
        .get_job_output(&session, &job, spool_id)
        .await
        .unwrap_or_else(|e| panic!("output: {e}"));
    assert_eq!(output.bytes(), "LINE1\nLINE2\n".len() as u64);

    let deleted = backend
        .delete_job(&session, &job)
        .await
        .unwrap_or_else(|e| panic!("delete job: {e}"));
    assert!(deleted.success);
    let gone = backend
        .delete_job(&session, &job)
        .await
        .unwrap_or_else(|e| panic!("delete job: {e}"));
    assert!(!gone.success);

    assert!(server.stats().saw_basic_auth() > 0);
    assert_eq!(server.stats().saw_basic_auth(), server.stats().requests_total());
    server.shutdown().await;
}

#[tokio::test]
async fn standard_workload_runs_against_the_test_server() {
    let server = TestServer::start()
        .await
        .unwrap_or_else(|e| panic!("server should start: {e}"));
    let def = definition(2);

    let plan = RunPlan::resolve(&def, PlanOverrides::default())
        .unwrap_or_else(|e| panic!("plan: {e}"));
    let workload = StandardWorkload::new(backend(), WorkloadParams::from_definition(&def))
        .unwrap_or_else(|e| panic!("workload: {e}"));
    let profiles =
        ProfileTable::from_profiles(PROFILE_KIND, vec![profile("lpar1", server.base_url())]);

    let report = Orchestrator::new(plan, profiles, workload, Arc::new(NoopSink))
        .unwrap_or_else(|e| panic!("orchestrator: {e}"))
        .run()
        .await;

    assert_eq!(report.users.len(), 2);
    assert_eq!(report.failed_users(), 0);
    assert_eq!(report.failed_requests(), 0, "{:?}", report.aggregate);
    assert!(report.successful_requests() >= 18);
    for (name, bucket) in report.aggregate.operations() {
        assert!(bucket.success_count > 0, "{name} never succeeded");
    }
    assert!(server.stats().jobs_submitted() >= 4);
    server.shutdown().await;
}

#[tokio::test]
async fn injected_failures_are_counted_not_fatal() {
    let server = TestServer::start_with(TestServerOptions::default().fail_prefix("/commands"))
        .await
        .unwrap_or_else(|e| panic!("server should start: {e}"));
    let def = definition(1);

    let plan = RunPlan::resolve(&def, PlanOverrides::default())
        .unwrap_or_else(|e| panic!("plan: {e}"));
    let workload = StandardWorkload::new(backend(), WorkloadParams::from_definition(&def))
        .unwrap_or_else(|e| panic!("workload: {e}"));
    let profiles =
        ProfileTable::from_profiles(PROFILE_KIND, vec![profile("lpar1", server.base_url())]);

    let report = Orchestrator::new(plan, profiles, workload, Arc::new(NoopSink))
        .unwrap_or_else(|e| panic!("orchestrator: {e}"))
        .run()
        .await;

    let agg = &report.aggregate;
    for name in ["TsoCommand", "ConsoleCommand"] {
        let bucket = agg.operation(name).unwrap_or_else(|| panic!("{name}"));
        assert_eq!(bucket.success_count, 0, "{name}");
        assert!(bucket.failure_count > 0, "{name}");
    }
    let upload = agg.operation("DatasetUpload").unwrap_or_else(|| panic!("DatasetUpload"));
    assert_eq!(upload.failure_count, 0);
    assert!(server.stats().injected_failures() > 0);
    server.shutdown().await;
}

#[tokio::test]
async fn setup_failure_isolates_the_user() {
    let server = TestServer::start_with(TestServerOptions::default().fail_prefix("/jobs"))
        .await
        .unwrap_or_else(|e| panic!("server should start: {e}"));
    let def = definition(2);

    let plan = RunPlan::resolve(&def, PlanOverrides::default())
        .unwrap_or_else(|e| panic!("plan: {e}"));
    let workload = StandardWorkload::new(backend(), WorkloadParams::from_definition(&def))
        .unwrap_or_else(|e| panic!("workload: {e}"));
    let profiles =
        ProfileTable::from_profiles(PROFILE_KIND, vec![profile("lpar1", server.base_url())]);

    let report = Orchestrator::new(plan, profiles, workload, Arc::new(NoopSink))
        .unwrap_or_else(|e| panic!("orchestrator: {e}"))
        .run()
        .await;

    assert_eq!(report.failed_users(), 2);
    assert_eq!(report.attempts_total(), 0);
    server.shutdown().await;
}
