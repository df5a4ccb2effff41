//! One HTTP exchange with the backend.
//!
//! [`Transport`] is the seam between request construction and the wire:
//! [`HttpTransport`] sends through [`reqwest`], tests substitute scripted
//! replies.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::decode::error_field;
use crate::error::ClientError;

/// Upload bodies are streamed in chunks of this size so progress can be
/// reported while the request is being written.
const UPLOAD_CHUNK_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &mask(&self.username))
            .field("password", &mask(&self.password))
            .finish()
    }
}

/// First three characters followed by `***`.
pub fn mask(secret: &str) -> String {
    let prefix: String = secret.chars().take(3).collect();
    format!("{prefix}***")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartForm {
    pub file: FilePart,
    pub text: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Multipart(MultipartForm),
}

/// Percentage progress sink (0-100).
#[derive(Clone)]
pub struct Progress(Arc<dyn Fn(u8) + Send + Sync>);

impl Progress {
    pub fn new(f: impl Fn(u8) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn report(&self, percent: u8) {
        (self.0)(percent)
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Progress(..)")
    }
}

/// Rounded percentage of `done` over `total`. An empty total counts as
/// complete.
pub fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) as f64 / total as f64) * 100.0).round() as u8
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Body>,
    pub auth: Option<BasicAuth>,
    pub timeout: Option<Duration>,
    pub progress: Option<Progress>,
}

impl Request {
    fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
            auth: None,
            timeout: None,
            progress: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(Body::Json(body));
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = Some(Body::Multipart(form));
        self
    }

    pub fn auth(mut self, auth: Option<BasicAuth>) -> Self {
        self.auth = auth;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn on_progress(mut self, progress: Option<Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// JSON body, if any.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Some(Body::Json(v)) => Some(v),
            _ => None,
        }
    }
}

/// A successful (2xx) reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Json(Value),
    /// `content-type: image/*`.
    Image { content_type: String, bytes: Vec<u8> },
}

impl Reply {
    /// The JSON payload; an image reply is an unexpected response here.
    pub fn into_json(self) -> Result<Value, ClientError> {
        match self {
            Self::Json(v) => Ok(v),
            Self::Image { content_type, bytes } => Err(ClientError::UnexpectedResponse(format!(
                "<{content_type}, {} bytes>",
                bytes.len()
            ))),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request. Cancelling `cancel` abandons it with
    /// [`ClientError::Aborted`].
    async fn send(&self, request: Request, cancel: &CancellationToken) -> Result<Reply, ClientError>;
}

/// [`Transport`] over a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an existing client (connection pool, proxy settings).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn execute(&self, request: Request) -> Result<Reply, ClientError> {
        let Request {
            method,
            url,
            query,
            body,
            auth,
            timeout,
            progress,
        } = request;

        let method = match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        tracing::debug!(
            method = %method,
            url = %url,
            has_auth = auth.is_some(),
            username = %auth.as_ref().map(|a| mask(&a.username)).unwrap_or_else(|| "missing".into()),
            "Sending request",
        );

        let mut builder = self.client.request(method, &url);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(auth) = &auth {
            builder = builder.basic_auth(&auth.username, Some(&auth.password));
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        match body {
            Some(Body::Json(value)) => builder = builder.json(&value),
            Some(Body::Multipart(form)) => builder = builder.multipart(build_multipart(form, progress)?),
            None => {}
        }

        let response = builder.send().await?;
        decode_response(response).await
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request, cancel: &CancellationToken) -> Result<Reply, ClientError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(ClientError::Aborted),
            result = self.execute(request) => result,
        }
    }
}

fn build_multipart(
    form: MultipartForm,
    progress: Option<Progress>,
) -> Result<reqwest::multipart::Form, ClientError> {
    let MultipartForm { file, text } = form;
    let total = file.bytes.len() as u64;

    let chunks: Vec<Result<Vec<u8>, std::io::Error>> = file
        .bytes
        .chunks(UPLOAD_CHUNK_BYTES)
        .map(|c| Ok(c.to_vec()))
        .collect();
    let mut sent = 0u64;
    let stream = futures::stream::iter(chunks).inspect(move |chunk| {
        if let (Ok(chunk), Some(progress)) = (chunk, &progress) {
            sent += chunk.len() as u64;
            progress.report(percent(sent, total));
        }
    });

    let part = reqwest::multipart::Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
        .file_name(file.file_name)
        .mime_str(&file.content_type)?;

    let mut multipart = reqwest::multipart::Form::new().part(file.field, part);
    for (name, value) in text {
        multipart = multipart.text(name, value);
    }
    Ok(multipart)
}

async fn decode_response(response: reqwest::Response) -> Result<Reply, ClientError> {
    let status = response.status();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    if !status.is_success() {
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let body = response.bytes().await.unwrap_or_default();
        let err = http_error(status.as_u16(), &reason, &body);
        tracing::warn!(status = status.as_u16(), error = %err, "Request failed");
        return Err(err);
    }

    let bytes = response.bytes().await?;
    classify_body(&content_type, bytes.to_vec())
}

/// Error for a non-2xx reply: the JSON `error` field when present,
/// `HTTP <status>: <reason>` otherwise.
pub fn http_error(status: u16, reason: &str, body: &[u8]) -> ClientError {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| error_field(&v))
        .unwrap_or_else(|| format!("HTTP {status}: {reason}"));
    ClientError::Http {
        status,
        reason: reason.to_string(),
        message,
    }
}

/// Image by content type, JSON otherwise.
pub fn classify_body(content_type: &str, bytes: Vec<u8>) -> Result<Reply, ClientError> {
    if content_type.starts_with("image/") {
        return Ok(Reply::Image {
            content_type: content_type.to_string(),
            bytes,
        });
    }
    serde_json::from_slice(&bytes)
        .map(Reply::Json)
        .map_err(|e| ClientError::Decode(e.to_string()))
}
