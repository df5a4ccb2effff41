//! Job polling.
//!
//! A submitted job is polled until it reaches a terminal status. The
//! retry bookkeeping lives in [`PollMachine`], a plain state machine, and
//! [`Poller`] drives it: fetch, classify, then either finish or sleep
//! through the injected [`Sleeper`] and fetch again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coloracao_core::job::JobStatus;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::PollingConfig;
use crate::decode::{classify, Envelope, PollReply};
use crate::error::ClientError;
use crate::transport::Reply;

/// Status text sink, called on every observed status change.
pub type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;

/* --------------------------------------------------------------------------
Sleeper
-------------------------------------------------------------------------- */

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/* --------------------------------------------------------------------------
Status messages
-------------------------------------------------------------------------- */

/// User-facing texts for one kind of job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMessages {
    pub queued: &'static str,
    pub in_progress: &'static str,
    pub completed: &'static str,
    /// Prefix of the `FAILED` error.
    pub failure_prefix: &'static str,
    /// Error text once attempts are exhausted.
    pub timed_out: &'static str,
}

pub const GENERIC_MESSAGES: StatusMessages = StatusMessages {
    queued: "Na fila...",
    in_progress: "Processando...",
    completed: "Concluído!",
    failure_prefix: "Processamento falhou",
    timed_out: "Tempo limite atingido ao aguardar o processamento",
};

pub const EXTRACTION_MESSAGES: StatusMessages = StatusMessages {
    queued: "Na fila...",
    in_progress: "Processando...",
    completed: "Extração concluída!",
    failure_prefix: "Processamento falhou",
    timed_out: "Tempo limite atingido ao aguardar o processamento",
};

pub const CLASSIFICATION_MESSAGES: StatusMessages = StatusMessages {
    queued: "Na fila...",
    in_progress: "Processando classificação...",
    completed: "Classificação concluída!",
    failure_prefix: "Classificação falhou",
    timed_out: "Tempo limite atingido ao aguardar a classificação",
};

/* --------------------------------------------------------------------------
State machine
-------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    /// Submitted, nothing observed yet.
    Queued,
    /// `attempt` non-terminal replies so far; `delay` is the wait before
    /// the next retry after this one.
    Polling { attempt: u32, delay: Duration },
    Completed,
    Failed,
    TimedOut,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }
}

#[derive(Debug, Clone)]
pub struct PollMachine {
    config: PollingConfig,
    state: PollState,
}

impl PollMachine {
    pub fn new(config: PollingConfig) -> Self {
        Self {
            config,
            state: PollState::Queued,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// Record a non-terminal reply. Returns how long to wait before the
    /// next request, or `None` once `max_attempts` replies were
    /// non-terminal (the machine is then `TimedOut`).
    pub fn pending(&mut self) -> Option<Duration> {
        let (seen, delay) = match self.state {
            PollState::Queued => (0, self.config.initial_delay),
            PollState::Polling { attempt, delay } => (attempt, delay),
            _ => return None,
        };

        let seen = seen + 1;
        if seen >= self.config.max_attempts {
            self.state = PollState::TimedOut;
            return None;
        }

        self.state = PollState::Polling {
            attempt: seen,
            delay: self.config.next_delay(delay, seen - 1),
        };
        Some(delay)
    }

    pub fn complete(&mut self) {
        self.state = PollState::Completed;
    }

    pub fn fail(&mut self) {
        self.state = PollState::Failed;
    }
}

/* --------------------------------------------------------------------------
Poller
-------------------------------------------------------------------------- */

/// Final payload of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    Json(Value),
    Image { content_type: String, bytes: Vec<u8> },
}

impl JobResult {
    pub fn into_json(self) -> Result<Value, ClientError> {
        Reply::from(self).into_json()
    }

    /// Deserialize the JSON payload into `T`.
    pub fn parse<T: DeserializeOwned>(self) -> Result<T, ClientError> {
        let value = self.into_json()?;
        serde_json::from_value(value.clone()).map_err(|e| {
            tracing::warn!(error = %e, "Job result did not match the expected shape");
            ClientError::UnexpectedResponse(value.to_string())
        })
    }
}

impl From<JobResult> for Reply {
    fn from(result: JobResult) -> Self {
        match result {
            JobResult::Json(v) => Reply::Json(v),
            JobResult::Image {
                content_type,
                bytes,
            } => Reply::Image {
                content_type,
                bytes,
            },
        }
    }
}

enum Step {
    Done(JobResult),
    Continue,
}

pub struct Poller<'a> {
    config: &'a PollingConfig,
    sleeper: &'a dyn Sleeper,
    messages: StatusMessages,
    on_status: Option<StatusCallback>,
}

impl<'a> Poller<'a> {
    pub fn new(
        config: &'a PollingConfig,
        sleeper: &'a dyn Sleeper,
        messages: StatusMessages,
        on_status: Option<StatusCallback>,
    ) -> Self {
        Self {
            config,
            sleeper,
            messages,
            on_status,
        }
    }

    fn report(&self, text: &str) {
        if let Some(cb) = &self.on_status {
            cb(text);
        }
    }

    /// Call `fetch` until the job finishes, fails, or attempts run out.
    ///
    /// `job_id` is only used for logging.
    pub async fn run<F, Fut>(
        &self,
        job_id: &str,
        mut fetch: F,
        cancel: &CancellationToken,
    ) -> Result<JobResult, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Reply, ClientError>>,
    {
        let mut machine = PollMachine::new(self.config.clone());

        loop {
            if cancel.is_cancelled() {
                machine.fail();
                return Err(ClientError::Aborted);
            }

            let step = match fetch().await {
                Ok(reply) => self.interpret(reply),
                Err(e) => Err(e),
            };

            match step {
                Ok(Step::Done(result)) => {
                    machine.complete();
                    self.report(self.messages.completed);
                    tracing::info!(job_id, "Job completed");
                    return Ok(result);
                }
                Err(e) => {
                    machine.fail();
                    tracing::warn!(job_id, error = %e, "Polling stopped");
                    return Err(e);
                }
                Ok(Step::Continue) => {}
            }

            let Some(delay) = machine.pending() else {
                tracing::warn!(
                    job_id,
                    max_attempts = self.config.max_attempts,
                    "Polling attempts exhausted",
                );
                return Err(ClientError::TimedOut(self.messages.timed_out.to_string()));
            };

            if let PollState::Polling { attempt, .. } = machine.state() {
                tracing::debug!(
                    job_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Job not finished, waiting",
                );
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    machine.fail();
                    return Err(ClientError::Aborted);
                }
                _ = self.sleeper.sleep(delay) => {}
            }
        }
    }

    fn interpret(&self, reply: Reply) -> Result<Step, ClientError> {
        match classify(reply) {
            PollReply::Image {
                content_type,
                bytes,
            } => Ok(Step::Done(JobResult::Image {
                content_type,
                bytes,
            })),
            PollReply::Terminal(value) => Ok(Step::Done(JobResult::Json(value))),
            PollReply::Envelope(envelope) => self.interpret_status(envelope),
            PollReply::Unrecognized(value) => {
                tracing::error!(body = %value, "Unexpected poll response");
                Err(ClientError::UnexpectedResponse(value.to_string()))
            }
        }
    }

    fn interpret_status(&self, envelope: Envelope) -> Result<Step, ClientError> {
        match JobStatus::parse(&envelope.status) {
            Some(status @ (JobStatus::InQueue | JobStatus::InProgress)) => {
                self.report(match status {
                    JobStatus::InQueue => self.messages.queued,
                    _ => self.messages.in_progress,
                });
                Ok(Step::Continue)
            }
            Some(JobStatus::Completed) if envelope.has_result() => {
                Ok(Step::Done(JobResult::Json(envelope.raw)))
            }
            Some(JobStatus::Completed) => {
                // Completed but the result is not attached yet.
                self.report(self.messages.in_progress);
                Ok(Step::Continue)
            }
            Some(JobStatus::Failed) => Err(ClientError::JobFailed {
                prefix: self.messages.failure_prefix.to_string(),
                details: envelope.failure_details(),
            }),
            Some(JobStatus::Cancelled) => Err(ClientError::JobCancelled),
            None => Err(ClientError::UnknownStatus(envelope.status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_attempts: u32) -> PollingConfig {
        PollingConfig {
            max_attempts,
            ..Default::default()
        }
    }

    #[test]
    fn machine_walks_states_and_schedule() {
        let mut machine = PollMachine::new(config(60));
        assert_eq!(machine.state(), &PollState::Queued);

        let mut sleeps = Vec::new();
        for _ in 0..9 {
            sleeps.push(machine.pending().unwrap().as_secs());
        }
        assert_eq!(sleeps, vec![5, 5, 5, 5, 5, 5, 5, 10, 15]);
        assert_eq!(
            machine.state(),
            &PollState::Polling {
                attempt: 9,
                delay: Duration::from_secs(15)
            }
        );

        machine.complete();
        assert!(machine.state().is_terminal());
        assert_eq!(machine.pending(), None);
    }

    #[test]
    fn delays_never_decrease_and_stay_capped() {
        let mut machine = PollMachine::new(config(60));
        let mut last = Duration::ZERO;
        while let Some(delay) = machine.pending() {
            assert!(delay >= last);
            assert!(delay <= Duration::from_secs(15));
            last = delay;
        }
        assert_eq!(machine.state(), &PollState::TimedOut);
    }

    #[test]
    fn machine_times_out_on_the_last_allowed_reply() {
        let mut machine = PollMachine::new(config(3));
        assert!(machine.pending().is_some());
        assert!(machine.pending().is_some());
        assert_eq!(machine.pending(), None);
        assert_eq!(machine.state(), &PollState::TimedOut);
    }
}
