//! Authenticated calls against the configured webhooks.

use std::sync::Arc;

use coloracao_core::job::JobType;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::config::{self, ApiConfig, Endpoint};
use crate::env::EnvSource;
use crate::error::ClientError;
use crate::poll::{JobResult, Poller, Sleeper, StatusCallback, StatusMessages, TokioSleeper};
use crate::transport::{BasicAuth, HttpTransport, Reply, Request, Transport};

/// Shared, cheaply cloneable handle for backend calls.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    env: Arc<dyn EnvSource>,
    config: Arc<ApiConfig>,
}

impl ApiClient {
    /// Production client: `reqwest` transport and real sleeps.
    pub fn new(env: Arc<dyn EnvSource>, config: ApiConfig) -> Self {
        Self::with_parts(
            Arc::new(HttpTransport::new()),
            Arc::new(TokioSleeper),
            env,
            config,
        )
    }

    pub fn with_parts(
        transport: Arc<dyn Transport>,
        sleeper: Arc<dyn Sleeper>,
        env: Arc<dyn EnvSource>,
        config: ApiConfig,
    ) -> Self {
        Self {
            transport,
            sleeper,
            env,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn env(&self) -> &dyn EnvSource {
        self.env.as_ref()
    }

    pub fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper.as_ref()
    }

    pub fn url(&self, endpoint: Endpoint) -> Result<String, ClientError> {
        config::api_url(self.env.as_ref(), endpoint)
    }

    /// Basic auth from username + token; `None` unless both are set.
    pub fn basic_auth(&self) -> Option<BasicAuth> {
        let username = self.env.get(Endpoint::Username.key())?;
        let password = self.env.get(Endpoint::Token.key())?;
        Some(BasicAuth { username, password })
    }

    /// Send a prepared request through the transport.
    pub async fn send(&self, request: Request, cancel: &CancellationToken) -> Result<Reply, ClientError> {
        if cancel.is_cancelled() {
            return Err(ClientError::Aborted);
        }
        self.transport.send(request, cancel).await
    }

    /// JSON POST to `endpoint`.
    pub async fn post(
        &self,
        endpoint: Endpoint,
        body: Value,
        cancel: &CancellationToken,
    ) -> Result<Reply, ClientError> {
        let request = Request::post(self.url(endpoint)?)
            .json(body)
            .auth(self.basic_auth());
        self.send(request, cancel).await
    }

    /// GET `endpoint` with query parameters.
    pub async fn get(
        &self,
        endpoint: Endpoint,
        params: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<Reply, ClientError> {
        let mut request = Request::get(self.url(endpoint)?).auth(self.basic_auth());
        for (k, v) in params {
            request = request.query(*k, *v);
        }
        self.send(request, cancel).await
    }

    pub fn poller(&self, messages: StatusMessages, on_status: Option<StatusCallback>) -> Poller<'_> {
        Poller::new(&self.config.polling, self.sleeper.as_ref(), messages, on_status)
    }

    /// Poll by POSTing `{id}` to `endpoint`.
    pub async fn poll_for_result(
        &self,
        endpoint: Endpoint,
        id: &str,
        messages: StatusMessages,
        on_status: Option<StatusCallback>,
        cancel: &CancellationToken,
    ) -> Result<JobResult, ClientError> {
        tracing::info!(endpoint = endpoint.key(), job_id = id, "Polling job");
        self.poller(messages, on_status)
            .run(id, || self.post(endpoint, json!({ "id": id }), cancel), cancel)
            .await
    }

    /// Poll with `GET ?id=<id>&type=<job_type>`.
    pub async fn poll_job(
        &self,
        endpoint: Endpoint,
        id: &str,
        job_type: JobType,
        messages: StatusMessages,
        on_status: Option<StatusCallback>,
        cancel: &CancellationToken,
    ) -> Result<JobResult, ClientError> {
        tracing::info!(
            endpoint = endpoint.key(),
            job_id = id,
            job_type = job_type.as_str(),
            "Polling job",
        );
        let params = [("id", id), ("type", job_type.as_str())];
        self.poller(messages, on_status)
            .run(id, || self.get(endpoint, &params, cancel), cancel)
            .await
    }
}
