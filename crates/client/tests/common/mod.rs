//! Shared fakes for the client integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use coloracao_client::config::ApiConfig;
use coloracao_client::env::MapEnv;
use coloracao_client::error::ClientError;
use coloracao_client::poll::{Sleeper, StatusCallback};
use coloracao_client::transport::{Body, Reply, Request, Transport};
use coloracao_client::ApiClient;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub const SIMPLIFICADO_URL: &str = "https://hooks.test/coloracao";
pub const UPLOAD_URL: &str = "https://hooks.test/upload";

/// Fallback route for requests that carry no job type.
pub const ANY: &str = "*";

// ---------------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------------

/// Replays queued replies and records every request.
///
/// Replies are routed so concurrent jobs get their own script:
/// `submit:<type>` for JSON bodies with `input.type`, `poll:<type>` for a
/// `type` query parameter, [`ANY`] for everything else (and as fallback).
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Result<Reply, ClientError>>>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, route: &str, reply: Result<Reply, ClientError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(route.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn push_json(&self, route: &str, body: Value) {
        self.push(route, Ok(Reply::Json(body)));
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Replies still queued on `route`.
    pub fn remaining(&self, route: &str) -> usize {
        self.scripts
            .lock()
            .unwrap()
            .get(route)
            .map_or(0, VecDeque::len)
    }

    fn route(request: &Request) -> String {
        if let Some(kind) = request
            .json_body()
            .and_then(|b| b.pointer("/input/type"))
            .and_then(Value::as_str)
        {
            return format!("submit:{kind}");
        }
        if let Some((_, kind)) = request.query.iter().find(|(k, _)| k == "type") {
            return format!("poll:{kind}");
        }
        ANY.to_string()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: Request, _cancel: &CancellationToken) -> Result<Reply, ClientError> {
        let route = Self::route(&request);
        self.requests.lock().unwrap().push(request);

        let mut scripts = self.scripts.lock().unwrap();
        let next = scripts
            .get_mut(&route)
            .and_then(VecDeque::pop_front)
            .or_else(|| scripts.get_mut(ANY).and_then(VecDeque::pop_front));
        next.unwrap_or_else(|| Err(ClientError::Transport(format!("script exhausted for {route}"))))
    }
}

/// Never answers; resolves only when cancelled.
pub struct HangingTransport;

#[async_trait]
impl Transport for HangingTransport {
    async fn send(&self, _request: Request, cancel: &CancellationToken) -> Result<Reply, ClientError> {
        cancel.cancelled().await;
        Err(ClientError::Aborted)
    }
}

// ---------------------------------------------------------------------------
// Sleeper
// ---------------------------------------------------------------------------

/// Records requested delays and returns after a yield.
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn env() -> MapEnv {
    MapEnv::from_pairs([
        ("VITE_USERNAME", "ana"),
        ("VITE_PASSWORD", "segredo"),
        ("VITE_TOKEN", "tok_abc"),
        ("VITE_COLORACAO_SIMPLIFICADO_URL", SIMPLIFICADO_URL),
        ("VITE_N8N_UPLOAD_URL", UPLOAD_URL),
    ])
}

pub fn client_with(
    transport: Arc<dyn Transport>,
    sleeper: Arc<RecordingSleeper>,
    env: MapEnv,
    config: ApiConfig,
) -> ApiClient {
    ApiClient::with_parts(transport, sleeper, Arc::new(env), config)
}

pub fn client(transport: Arc<ScriptedTransport>, sleeper: Arc<RecordingSleeper>) -> ApiClient {
    client_with(transport, sleeper, env(), ApiConfig::default())
}

/// Status callback plus the texts it received.
pub fn status_log() -> (StatusCallback, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    let cb: StatusCallback = Arc::new(move |s: &str| sink.lock().unwrap().push(s.to_string()));
    (cb, log)
}

pub fn multipart_text(request: &Request, field: &str) -> Option<String> {
    match &request.body {
        Some(Body::Multipart(form)) => form
            .text
            .iter()
            .find(|(k, _)| k == field)
            .map(|(_, v)| v.clone()),
        _ => None,
    }
}
