use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use paceload_core::{
    Backend, BackendError, CommandKind, JobHandle, Profile, Reply, SpoolFile, Target,
};
use serde_json::json;

use super::client::{DEFAULT_CONNECT_TIMEOUT, HttpClient};
use super::types::{HttpRequest, HttpResponse};
use super::util::body_preview;

/// Profile `type` served by [`HttpBackend`].
pub const PROFILE_KIND: &str = "rest";

const STATUS_OUTPUT: &str = "OUTPUT";
const PREVIEW_CHARS: usize = 256;

#[derive(Debug, Clone)]
pub struct HttpBackendOptions {
    pub connect_timeout: Option<Duration>,
    /// Per-request timeout; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub poll_attempts: u32,
}

impl Default for HttpBackendOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            request_timeout: None,
            poll_interval: Duration::from_millis(500),
            poll_attempts: 120,
        }
    }
}

/// [`Backend`] speaking the paceload JSON/REST protocol.
#[derive(Debug, Clone, Default)]
pub struct HttpBackend {
    options: HttpBackendOptions,
}

/// One user's connection: its own client pool, base URL and credentials.
#[derive(Debug, Clone)]
pub struct HttpSession {
    client: HttpClient,
    base: url::Url,
    authorization: Option<String>,
    request_timeout: Option<Duration>,
}

impl HttpSession {
    fn url(&self, segments: &[&str]) -> Result<String, BackendError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| {
                BackendError::Protocol(format!("base url cannot be a base: {}", self.base))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url.into())
    }

    fn target_url(&self, target: &Target) -> Result<String, BackendError> {
        match target {
            Target::Dataset(name) => self.url(&["datasets", name]),
            Target::Member { dataset, member } => {
                self.url(&["datasets", dataset, "members", member])
            }
            Target::File(path) => {
                let mut segments = vec!["files"];
                segments.extend(path.split('/').filter(|s| !s.is_empty()));
                self.url(&segments)
            }
        }
    }

    fn job_url(&self, job: &JobHandle, tail: &[&str]) -> Result<String, BackendError> {
        let mut segments = vec!["jobs", job.jobname.as_str(), job.jobid.as_str()];
        segments.extend_from_slice(tail);
        self.url(&segments)
    }

    async fn send(&self, mut req: HttpRequest) -> Result<HttpResponse, BackendError> {
        if let Some(auth) = &self.authorization {
            req = req.with_header("authorization", auth.clone());
        }
        let method = req.method.clone();
        let url = req.url.clone();
        let res = self
            .client
            .request(req.with_timeout(self.request_timeout))
            .await
            .map_err(|err| BackendError::Transport(Box::new(err)))?;
        tracing::trace!(%method, %url, status = res.status, "backend call");
        Ok(res)
    }
}

fn reply(res: &HttpResponse, success: bool) -> Reply {
    Reply::new(success, json!({ "status": res.status, "body": res.body_json() }))
}

/// Downloads report size only; content is never logged.
fn download_reply(res: &HttpResponse) -> Reply {
    Reply::new(
        res.status == 200,
        json!({ "status": res.status, "bytes": res.body.len() }),
    )
}

fn unexpected(what: &str, res: &HttpResponse) -> BackendError {
    BackendError::Protocol(format!(
        "{what} returned {}: {}",
        res.status,
        body_preview(&res.body, PREVIEW_CHARS)
    ))
}

fn parse<T: serde::de::DeserializeOwned>(
    what: &str,
    res: &HttpResponse,
) -> Result<T, BackendError> {
    serde_json::from_slice(&res.body)
        .map_err(|err| BackendError::Protocol(format!("{what}: invalid response body: {err}")))
}

impl HttpBackend {
    #[must_use]
    pub fn new(options: HttpBackendOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    type Session = HttpSession;

    fn profile_kind(&self) -> &str {
        PROFILE_KIND
    }

    async fn connect(&self, profile: &Profile) -> Result<HttpSession, BackendError> {
        let base_url = profile
            .credential("baseUrl")
            .ok_or_else(|| BackendError::MissingCredential {
                profile: profile.name.clone(),
                key: "baseUrl",
            })?;
        let base = url::Url::parse(base_url).map_err(|err| BackendError::Connect {
            profile: profile.name.clone(),
            reason: format!("invalid baseUrl `{base_url}`: {err}"),
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(BackendError::Connect {
                profile: profile.name.clone(),
                reason: format!("unsupported scheme `{}`", base.scheme()),
            });
        }

        let authorization = profile.credential("user").map(|user| {
            let password = profile.credential("password").unwrap_or_default();
            format!("Basic {}", BASE64.encode(format!("{user}:{password}")))
        });

        Ok(HttpSession {
            client: HttpClient::new(self.options.connect_timeout),
            base,
            authorization,
            request_timeout: self.options.request_timeout,
        })
    }

    async fn create_resource(
        &self,
        session: &HttpSession,
        dataset: &str,
    ) -> Result<Reply, BackendError> {
        let url = session.url(&["datasets", dataset])?;
        let res = session.send(HttpRequest::post(url, Bytes::new())).await?;
        Ok(reply(&res, res.status == 201))
    }

    async fn resource_exists(
        &self,
        session: &HttpSession,
        dataset: &str,
    ) -> Result<bool, BackendError> {
        let url = session.url(&["datasets", dataset])?;
        let res = session.send(HttpRequest::get(url)).await?;
        match res.status {
            200 => Ok(true),
            404 => Ok(false),
            _ => Err(unexpected("dataset lookup", &res)),
        }
    }

    async fn upload(
        &self,
        session: &HttpSession,
        target: &Target,
        body: Bytes,
    ) -> Result<Reply, BackendError> {
        let url = session.target_url(target)?;
        let req = HttpRequest::put(url, body).with_header("content-type", "text/plain");
        let res = session.send(req).await?;
        Ok(reply(&res, res.is_success()))
    }

    async fn download(
        &self,
        session: &HttpSession,
        target: &Target,
    ) -> Result<Reply, BackendError> {
        let url = session.target_url(target)?;
        let res = session.send(HttpRequest::get(url)).await?;
        Ok(download_reply(&res))
    }

    async fn issue_command(
        &self,
        session: &HttpSession,
        kind: CommandKind,
        command: &str,
        account: &str,
    ) -> Result<Reply, BackendError> {
        let url = session.url(&["commands"])?;
        let body = json!({
            "kind": kind.to_string(),
            "command": command,
            "account": account,
        });
        let req = HttpRequest::post(url, Bytes::from(body.to_string()))
            .with_header("content-type", "application/json");
        let res = session.send(req).await?;
        Ok(reply(&res, res.status == 200))
    }

    async fn submit_job(
        &self,
        session: &HttpSession,
        jcl: &str,
    ) -> Result<JobHandle, BackendError> {
        let url = session.url(&["jobs"])?;
        let req = HttpRequest::post(url, Bytes::from(jcl.to_string()))
            .with_header("content-type", "text/plain");
        let res = session.send(req).await?;
        if res.status != 201 {
            return Err(unexpected("job submit", &res));
        }
        parse("job submit", &res)
    }

    async fn wait_for_job(
        &self,
        session: &HttpSession,
        job: &JobHandle,
    ) -> Result<JobHandle, BackendError> {
        let url = session.job_url(job, &[])?;
        for attempt in 0..self.options.poll_attempts.max(1) {
            if attempt > 0 {
                tokio::time::sleep(self.options.poll_interval).await;
            }
            let res = session.send(HttpRequest::get(url.clone())).await?;
            if res.status != 200 {
                return Err(unexpected("job status", &res));
            }
            let current: JobHandle = parse("job status", &res)?;
            if current.status.as_deref() == Some(STATUS_OUTPUT) {
                return Ok(current);
            }
        }
        Err(BackendError::Protocol(format!(
            "job {}({}) did not reach {STATUS_OUTPUT} after {} polls",
            job.jobname, job.jobid, self.options.poll_attempts
        )))
    }

    async fn list_spool(
        &self,
        session: &HttpSession,
        job: &JobHandle,
    ) -> Result<Vec<SpoolFile>, BackendError> {
        let url = session.job_url(job, &["spool"])?;
        let res = session.send(HttpRequest::get(url)).await?;
        if res.status != 200 {
            return Err(unexpected("spool list", &res));
        }
        parse("spool list", &res)
    }

    async fn get_job_output(
        &self,
        session: &HttpSession,
        job: &JobHandle,
        spool_id: u64,
    ) -> Result<Reply, BackendError> {
        let id = spool_id.to_string();
        let url = session.job_url(job, &["spool", id.as_str()])?;
        let res = session.send(HttpRequest::get(url)).await?;
        Ok(download_reply(&res))
    }

    async fn delete_job(
        &self,
        session: &HttpSession,
        job: &JobHandle,
    ) -> Result<Reply, BackendError> {
        let url = session.job_url(job, &[])?;
        let res = session.send(HttpRequest::delete(url)).await?;
        Ok(reply(&res, res.is_success()))
    }

    async fn delete_resource(
        &self,
        session: &HttpSession,
        target: &Target,
    ) -> Result<Reply, BackendError> {
        let url = session.target_url(target)?;
        let res = session.send(HttpRequest::delete(url)).await?;
        Ok(reply(&res, res.is_success()))
    }
}
