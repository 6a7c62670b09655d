use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use http::HeaderMap;
use http::header::{CONTENT_LENGTH, HOST, HeaderName, HeaderValue};
use http_body_util::{BodyExt as _, Full};
use hyper::Request;
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

use super::util::{has_header, host_header_value};
use super::{Error, HttpRequest, HttpResponse, Result};

/// Connect timeout used by [`HttpClient::default`].
pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

type Connector = HttpsConnector<HttpConnector>;

/// Pooled HTTP/1.1 client for the mainframe REST endpoints. Clones share one pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    pool: Client<Connector, Full<Bytes>>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(Some(DEFAULT_CONNECT_TIMEOUT))
    }
}

impl HttpClient {
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        let mut tcp = HttpConnector::new();
        tcp.enforce_http(false);
        tcp.set_connect_timeout(connect_timeout);

        let connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(tcp);

        Self {
            pool: Client::builder(TokioExecutor::new()).build(connector),
        }
    }

    /// Sends `req` and buffers the whole response. `req.timeout` bounds the wait for the
    /// response head only.
    pub async fn request(&self, req: HttpRequest) -> Result<HttpResponse> {
        let limit = req.timeout;
        let outgoing = build_request(req)?;

        let pending = self.pool.request(outgoing);
        let incoming = match limit {
            Some(limit) => tokio::time::timeout(limit, pending)
                .await
                .map_err(|_| Error::Timeout(limit))??,
            None => pending.await?,
        };

        read_response(incoming).await
    }
}

fn build_request(req: HttpRequest) -> Result<Request<Full<Bytes>>> {
    let url = url::Url::parse(&req.url).map_err(|_| Error::InvalidUrl(req.url.clone()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::UnsupportedScheme(req.url));
    }
    let uri: hyper::Uri = req.url.parse().map_err(|_| Error::InvalidUrl(req.url.clone()))?;

    let mut builder = Request::builder().method(req.method).uri(uri);
    if !has_header(&req.headers, "host")
        && let Some(host) = host_header_value(&url)
    {
        builder = builder.header(HOST, host);
    }
    if !req.body.is_empty() && !has_header(&req.headers, "content-length") {
        builder = builder.header(CONTENT_LENGTH, req.body.len());
    }
    for (name, value) in &req.headers {
        builder = builder.header(
            HeaderName::from_bytes(name.as_bytes())?,
            HeaderValue::from_str(value)?,
        );
    }

    Ok(builder.body(Full::new(req.body))?)
}

async fn read_response(res: hyper::Response<Incoming>) -> Result<HttpResponse> {
    let (parts, body) = res.into_parts();
    let body = body.collect().await?.to_bytes();
    Ok(HttpResponse {
        status: parts.status.as_u16(),
        headers: fold_headers(&parts.headers),
        body,
    })
}

/// One entry per header name, repeated values joined with ", ".
fn fold_headers(map: &HeaderMap) -> Vec<(String, String)> {
    let mut folded: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in map {
        let value = String::from_utf8_lossy(value.as_bytes());
        let slot = folded.entry(name.as_str().to_owned()).or_default();
        if !slot.is_empty() {
            slot.push_str(", ");
        }
        slot.push_str(&value);
    }
    folded.into_iter().collect()
}
