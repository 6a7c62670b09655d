//! In-memory implementation of the paceload REST protocol, for end-to-end tests and demos.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Bytes;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::{Duration, sleep};

pub const PATH_DATASET: &str = "/datasets/{name}";
pub const PATH_MEMBER: &str = "/datasets/{name}/members/{member}";
pub const PATH_FILE: &str = "/files/{*path}";
pub const PATH_COMMANDS: &str = "/commands";
pub const PATH_JOBS: &str = "/jobs";
pub const PATH_JOB: &str = "/jobs/{jobname}/{jobid}";
pub const PATH_SPOOL: &str = "/jobs/{jobname}/{jobid}/spool";
pub const PATH_SPOOL_FILE: &str = "/jobs/{jobname}/{jobid}/spool/{id}";

const RETCODE_OK: &str = "CC 0000";
const INSTREAM_MARKER: &str = "//SYSUT1 DD *";

#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    saw_basic_auth: Arc<AtomicU64>,
    jobs_submitted: Arc<AtomicU64>,
    commands_issued: Arc<AtomicU64>,
    injected_failures: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn saw_basic_auth(&self) -> u64 {
        self.saw_basic_auth.load(Ordering::Relaxed)
    }

    pub fn jobs_submitted(&self) -> u64 {
        self.jobs_submitted.load(Ordering::Relaxed)
    }

    pub fn commands_issued(&self) -> u64 {
        self.commands_issued.load(Ordering::Relaxed)
    }

    pub fn injected_failures(&self) -> u64 {
        self.injected_failures.load(Ordering::Relaxed)
    }
}

/// Fault injection knobs.
#[derive(Debug, Clone, Default)]
pub struct TestServerOptions {
    /// Requests whose path starts with any of these prefixes get a 500.
    pub fail_prefixes: Vec<String>,
    /// Added before every response.
    pub delay: Duration,
}

impl TestServerOptions {
    #[must_use]
    pub fn fail_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.fail_prefixes.push(prefix.into());
        self
    }

    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SpoolEntry {
    pub id: u64,
    pub ddname: String,
}

#[derive(Debug, Clone, Serialize)]
struct JobView {
    jobname: String,
    jobid: String,
    status: &'static str,
    retcode: &'static str,
    spool: Vec<SpoolEntry>,
}

#[derive(Debug)]
struct StoredJob {
    jobname: String,
    jobid: String,
    spool: Vec<(SpoolEntry, Bytes)>,
}

impl StoredJob {
    fn view(&self) -> JobView {
        JobView {
            jobname: self.jobname.clone(),
            jobid: self.jobid.clone(),
            status: "OUTPUT",
            retcode: RETCODE_OK,
            spool: self.spool.iter().map(|(e, _)| e.clone()).collect(),
        }
    }
}

#[derive(Debug, Default)]
struct Store {
    datasets: BTreeMap<String, BTreeMap<String, Bytes>>,
    files: BTreeMap<String, Bytes>,
    jobs: BTreeMap<(String, String), StoredJob>,
    next_job: u64,
}

#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<Store>>,
    stats: TestServerStats,
    options: Arc<TestServerOptions>,
}

/// Job name from a `//NAME JOB ...` first line.
#[must_use]
pub fn parse_jobname(jcl: &str) -> Option<&str> {
    let first = jcl.lines().next()?.strip_prefix("//")?;
    let mut words = first.split_whitespace();
    let name = words.next()?;
    (words.next()? == "JOB" && !name.is_empty()).then_some(name)
}

/// In-stream data following the `//SYSUT1 DD *` statement.
#[must_use]
pub fn instream_data(jcl: &str) -> &str {
    jcl.split_once(INSTREAM_MARKER)
        .map(|(_, rest)| rest.strip_prefix('\n').unwrap_or(rest))
        .unwrap_or("")
}

async fn inject_faults(State(state): State<AppState>, req: Request, next: Next) -> Response {
    TestServerStats::inc(&state.stats.requests_total);
    if req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "))
    {
        TestServerStats::inc(&state.stats.saw_basic_auth);
    }

    if !state.options.delay.is_zero() {
        sleep(state.options.delay).await;
    }

    let path = req.uri().path();
    if state
        .options
        .fail_prefixes
        .iter()
        .any(|p| path.starts_with(p.as_str()))
    {
        TestServerStats::inc(&state.stats.injected_failures);
        return (StatusCode::INTERNAL_SERVER_ERROR, "injected failure").into_response();
    }

    next.run(req).await
}

async fn create_dataset(State(state): State<AppState>, Path(name): Path<String>) -> StatusCode {
    let mut store = state.store.lock();
    if store.datasets.contains_key(&name) {
        return StatusCode::CONFLICT;
    }
    store.datasets.insert(name, BTreeMap::new());
    StatusCode::CREATED
}

async fn get_dataset(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let store = state.store.lock();
    match store.datasets.get(&name) {
        Some(members) => Json(serde_json::json!({
            "name": name,
            "members": members.keys().collect::<Vec<_>>(),
        }))
        .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_dataset(State(state): State<AppState>, Path(name): Path<String>) -> StatusCode {
    match state.store.lock().datasets.remove(&name) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn put_member(
    State(state): State<AppState>,
    Path((name, member)): Path<(String, String)>,
    body: Bytes,
) -> StatusCode {
    match state.store.lock().datasets.get_mut(&name) {
        Some(members) => {
            members.insert(member, body);
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn get_member(
    State(state): State<AppState>,
    Path((name, member)): Path<(String, String)>,
) -> (StatusCode, Bytes) {
    let store = state.store.lock();
    match store.datasets.get(&name).and_then(|m| m.get(&member)) {
        Some(body) => (StatusCode::OK, body.clone()),
        None => (StatusCode::NOT_FOUND, Bytes::new()),
    }
}

async fn put_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    body: Bytes,
) -> StatusCode {
    state.store.lock().files.insert(path, body);
    StatusCode::NO_CONTENT
}

async fn get_file(State(state): State<AppState>, Path(path): Path<String>) -> (StatusCode, Bytes) {
    match state.store.lock().files.get(&path) {
        Some(body) => (StatusCode::OK, body.clone()),
        None => (StatusCode::NOT_FOUND, Bytes::new()),
    }
}

async fn delete_file(State(state): State<AppState>, Path(path): Path<String>) -> StatusCode {
    match state.store.lock().files.remove(&path) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    kind: String,
    command: String,
    #[serde(default)]
    account: String,
}

async fn issue_command(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<serde_json::Value>) {
    let req: CommandRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": err.to_string() })),
            );
        }
    };
    TestServerStats::inc(&state.stats.commands_issued);

    match req.kind.as_str() {
        "tso" if req.account.is_empty() => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "tso commands need an account" })),
        ),
        "tso" | "console" => (
            StatusCode::OK,
            Json(serde_json::json!({
                "kind": req.kind,
                "output": format!("{} ACCEPTED", req.command),
            })),
        ),
        other => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": format!("unknown command kind `{other}`") })),
        ),
    }
}

async fn submit_job(State(state): State<AppState>, body: Bytes) -> Response {
    let jcl = String::from_utf8_lossy(&body);
    let Some(jobname) = parse_jobname(&jcl) else {
        return (StatusCode::BAD_REQUEST, "missing JOB statement").into_response();
    };

    let mut store = state.store.lock();
    store.next_job += 1;
    let jobid = format!("JOB{:05}", store.next_job);
    let job = StoredJob {
        jobname: jobname.to_string(),
        jobid: jobid.clone(),
        spool: vec![
            (
                SpoolEntry {
                    id: 2,
                    ddname: "JESMSGLG".to_string(),
                },
                Bytes::from(format!("{jobid} {jobname} STARTED\n{jobid} {jobname} ENDED\n")),
            ),
            (
                SpoolEntry {
                    id: 3,
                    ddname: "SYSPRINT".to_string(),
                },
                Bytes::from_static(b"PROCESSING ENDED AT EOD\n"),
            ),
            (
                SpoolEntry {
                    id: 102,
                    ddname: "SYSUT2".to_string(),
                },
                Bytes::from(instream_data(&jcl).to_string()),
            ),
        ],
    };
    let view = job.view();
    store.jobs.insert((job.jobname.clone(), jobid), job);
    TestServerStats::inc(&state.stats.jobs_submitted);

    (StatusCode::CREATED, Json(view)).into_response()
}

async fn get_job(
    State(state): State<AppState>,
    Path((jobname, jobid)): Path<(String, String)>,
) -> Response {
    match state.store.lock().jobs.get(&(jobname, jobid)) {
        Some(job) => Json(job.view()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_job(
    State(state): State<AppState>,
    Path((jobname, jobid)): Path<(String, String)>,
) -> StatusCode {
    match state.store.lock().jobs.remove(&(jobname, jobid)) {
        Some(_) => StatusCode::NO_CONTENT,
        None => StatusCode::NOT_FOUND,
    }
}

async fn list_spool(
    State(state): State<AppState>,
    Path((jobname, jobid)): Path<(String, String)>,
) -> Response {
    match state.store.lock().jobs.get(&(jobname, jobid)) {
        Some(job) => Json(job.view().spool).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn get_spool_file(
    State(state): State<AppState>,
    Path((jobname, jobid, id)): Path<(String, String, u64)>,
) -> (StatusCode, Bytes) {
    let store = state.store.lock();
    let content = store
        .jobs
        .get(&(jobname, jobid))
        .and_then(|job| job.spool.iter().find(|(e, _)| e.id == id))
        .map(|(_, body)| body.clone());
    match content {
        Some(body) => (StatusCode::OK, body),
        None => (StatusCode::NOT_FOUND, Bytes::new()),
    }
}

pub fn router(stats: TestServerStats, options: TestServerOptions) -> Router {
    let state = AppState {
        store: Arc::new(Mutex::new(Store::default())),
        stats,
        options: Arc::new(options),
    };

    Router::new()
        .route(
            PATH_DATASET,
            post(create_dataset).get(get_dataset).delete(delete_dataset),
        )
        .route(PATH_MEMBER, get(get_member).put(put_member))
        .route(PATH_FILE, get(get_file).put(put_file).delete(delete_file))
        .route(PATH_COMMANDS, post(issue_command))
        .route(PATH_JOBS, post(submit_job))
        .route(PATH_JOB, get(get_job).delete(delete_job))
        .route(PATH_SPOOL, get(list_spool))
        .route(PATH_SPOOL_FILE, get(get_spool_file))
        .layer(middleware::from_fn_with_state(state.clone(), inject_faults))
        .with_state(state)
}

pub struct TestServer {
    addr: SocketAddr,
    base_url: String,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(TestServerOptions::default()).await
    }

    pub async fn start_with(options: TestServerOptions) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let stats = TestServerStats::default();
        let app = router(stats.clone(), options);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            base_url: format!("http://{addr}"),
            stats,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.shutdown_tx.is_some()
            && let Some(task) = self.task.take()
        {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobname_comes_from_the_job_statement() {
        assert_eq!(parse_jobname("//ZZT0 JOB (ACCT)\n//RUN EXEC"), Some("ZZT0"));
        assert_eq!(parse_jobname("//ZZT0 EXEC PGM=X"), None);
        assert_eq!(parse_jobname("ZZT0 JOB"), None);
        assert_eq!(parse_jobname(""), None);
    }

    #[test]
    fn instream_data_follows_sysut1() {
        let jcl = "//ZZT0 JOB\n//SYSUT1 DD *\nAAA\nBBB\n";
        assert_eq!(instream_data(jcl), "AAA\nBBB\n");
        assert_eq!(instream_data("//ZZT0 JOB\n"), "");
    }

    #[test]
    fn options_builder_accumulates_prefixes() {
        let opts = TestServerOptions::default()
            .fail_prefix("/commands")
            .fail_prefix("/jobs")
            .delay(Duration::from_millis(5));
        assert_eq!(opts.fail_prefixes, vec!["/commands", "/jobs"]);
        assert_eq!(opts.delay, Duration::from_millis(5));
    }
}
