//! Extraction and classification workflows.
//!
//! Each workflow submits one or two jobs, polls them to completion and
//! returns typed results. One deadline ([`Timeouts::default`]) bounds the
//! whole submit + poll sequence.
//!
//! [`Timeouts::default`]: crate::config::Timeouts

use std::future::Future;
use std::sync::{Arc, Mutex};

use coloracao_core::classification::ClassificationResponse;
use coloracao_core::extraction::{CombinedAnalysisResult, ExtractionResponse};
use coloracao_core::job::{InitResponse, JobType, SubmitRequest};
use coloracao_core::types::ColorMap;
use tokio_util::sync::CancellationToken;

use crate::api::ApiClient;
use crate::config::Endpoint;
use crate::decode::error_field;
use crate::error::ClientError;
use crate::poll::{StatusCallback, CLASSIFICATION_MESSAGES, EXTRACTION_MESSAGES};

/// How the frontal and eye extractions are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionMode {
    /// Submit and poll both jobs concurrently.
    #[default]
    Parallel,
    /// Frontal first, then eye.
    Sequential,
}

/// A single extraction with the beard flag from its submit reply.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub result: ExtractionResponse,
    pub beard_detected: bool,
}

/// Two-slot status line for concurrent extraction polls:
/// `Frontal: <status> | Olho: <status>`.
#[derive(Clone)]
pub struct StatusBoard {
    slots: Arc<Mutex<[String; 2]>>,
    sink: Option<StatusCallback>,
}

impl StatusBoard {
    pub const FRONTAL: usize = 0;
    pub const EYE: usize = 1;

    pub fn new(sink: Option<StatusCallback>) -> Self {
        Self {
            slots: Arc::new(Mutex::new([String::from("-"), String::from("-")])),
            sink,
        }
    }

    pub fn render(&self) -> String {
        match self.slots.lock() {
            Ok(slots) => format!("Frontal: {} | Olho: {}", slots[0], slots[1]),
            Err(_) => String::new(),
        }
    }

    fn update(&self, slot: usize, text: &str) {
        if let Ok(mut slots) = self.slots.lock() {
            slots[slot] = text.to_string();
        }
        if let Some(sink) = &self.sink {
            sink(&self.render());
        }
    }

    /// Callback that writes into `slot` and republishes the whole line.
    pub fn slot(&self, slot: usize) -> StatusCallback {
        let board = self.clone();
        Arc::new(move |text: &str| board.update(slot, text))
    }
}

pub struct ColoracaoService {
    api: ApiClient,
}

impl ColoracaoService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /* ---- Submit ---- */

    /// Submit an extraction job.
    pub async fn submit_analysis(
        &self,
        request: &SubmitRequest,
        cancel: &CancellationToken,
    ) -> Result<InitResponse, ClientError> {
        self.submit(request, cancel).await
    }

    /// Submit a classification job for `colors`.
    pub async fn submit_classification(
        &self,
        colors: ColorMap,
        cancel: &CancellationToken,
    ) -> Result<InitResponse, ClientError> {
        self.submit(&SubmitRequest::classification(colors), cancel).await
    }

    async fn submit(
        &self,
        request: &SubmitRequest,
        cancel: &CancellationToken,
    ) -> Result<InitResponse, ClientError> {
        let job_type = request.job_type();
        let body = serde_json::to_value(request).map_err(|e| ClientError::Decode(e.to_string()))?;
        let value = self
            .api
            .post(Endpoint::ColoracaoSimplificado, body, cancel)
            .await?
            .into_json()?;

        // The backend reports some failures with a 200 and an `error` field.
        if let Some(message) = error_field(&value) {
            tracing::warn!(job_type = job_type.as_str(), error = %message, "Submit rejected");
            return Err(ClientError::Server(message));
        }

        let init: InitResponse = serde_json::from_value(value.clone())
            .map_err(|_| ClientError::UnexpectedResponse(value.to_string()))?;
        tracing::info!(
            job_type = job_type.as_str(),
            job_id = %init.id,
            beard = init.beard_detected(),
            "Job submitted",
        );
        Ok(init)
    }

    /* ---- Poll ---- */

    pub async fn poll_extraction(
        &self,
        id: &str,
        job_type: JobType,
        on_status: Option<StatusCallback>,
        cancel: &CancellationToken,
    ) -> Result<ExtractionResponse, ClientError> {
        self.api
            .poll_job(
                Endpoint::ColoracaoSimplificado,
                id,
                job_type,
                EXTRACTION_MESSAGES,
                on_status,
                cancel,
            )
            .await?
            .parse()
    }

    pub async fn poll_classification(
        &self,
        id: &str,
        on_status: Option<StatusCallback>,
        cancel: &CancellationToken,
    ) -> Result<ClassificationResponse, ClientError> {
        self.api
            .poll_job(
                Endpoint::ColoracaoSimplificado,
                id,
                JobType::Classificacao,
                CLASSIFICATION_MESSAGES,
                on_status,
                cancel,
            )
            .await?
            .parse()
    }

    /* ---- Workflows ---- */

    /// Extract colors from one photo.
    pub async fn analyze_image(
        &self,
        image_url: &str,
        job_type: JobType,
        on_status: Option<StatusCallback>,
    ) -> Result<AnalysisOutcome, ClientError> {
        self.with_deadline(|cancel| async move {
            notify(&on_status, "Iniciando análise...");
            let request = SubmitRequest::extraction(job_type, image_url);
            let init = self.submit_analysis(&request, &cancel).await?;
            let beard_detected = init.beard_detected();
            let result = self
                .poll_extraction(&init.id, job_type, on_status.clone(), &cancel)
                .await?;
            Ok(AnalysisOutcome {
                result,
                beard_detected,
            })
        })
        .await
    }

    /// Extract from the frontal and eye photos and merge the color maps,
    /// the eye's `iris` replacing the frontal one. The beard flag comes
    /// from the frontal submit reply.
    pub async fn analyze_both_images(
        &self,
        frontal_url: &str,
        eye_url: &str,
        mode: ExtractionMode,
        on_status: Option<StatusCallback>,
    ) -> Result<CombinedAnalysisResult, ClientError> {
        self.with_deadline(|cancel| async move {
            notify(&on_status, "Iniciando análise...");
            let frontal_req = SubmitRequest::extraction(JobType::ExtracaoFrontal, frontal_url);
            let eye_req = SubmitRequest::extraction(JobType::ExtracaoOlho, eye_url);
            let board = StatusBoard::new(on_status.clone());

            let (frontal, eye, beard_detected) = match mode {
                ExtractionMode::Parallel => {
                    let (frontal_init, eye_init) = tokio::try_join!(
                        self.submit_analysis(&frontal_req, &cancel),
                        self.submit_analysis(&eye_req, &cancel),
                    )?;
                    let (frontal, eye) = tokio::try_join!(
                        self.poll_extraction(
                            &frontal_init.id,
                            JobType::ExtracaoFrontal,
                            Some(board.slot(StatusBoard::FRONTAL)),
                            &cancel,
                        ),
                        self.poll_extraction(
                            &eye_init.id,
                            JobType::ExtracaoOlho,
                            Some(board.slot(StatusBoard::EYE)),
                            &cancel,
                        ),
                    )?;
                    (frontal, eye, frontal_init.beard_detected())
                }
                ExtractionMode::Sequential => {
                    let frontal_init = self.submit_analysis(&frontal_req, &cancel).await?;
                    let frontal = self
                        .poll_extraction(
                            &frontal_init.id,
                            JobType::ExtracaoFrontal,
                            Some(board.slot(StatusBoard::FRONTAL)),
                            &cancel,
                        )
                        .await?;
                    let eye_init = self.submit_analysis(&eye_req, &cancel).await?;
                    let eye = self
                        .poll_extraction(
                            &eye_init.id,
                            JobType::ExtracaoOlho,
                            Some(board.slot(StatusBoard::EYE)),
                            &cancel,
                        )
                        .await?;
                    (frontal, eye, frontal_init.beard_detected())
                }
            };

            Ok(CombinedAnalysisResult::new(frontal, eye, beard_detected))
        })
        .await
    }

    /// Classify one color map.
    pub async fn classify_colors(
        &self,
        colors: ColorMap,
        on_status: Option<StatusCallback>,
    ) -> Result<ClassificationResponse, ClientError> {
        self.with_deadline(|cancel| async move {
            self.classify_within(colors, on_status, &cancel).await
        })
        .await
    }

    /// Classify the extracted and the manually entered colors
    /// concurrently. Either failure fails both.
    pub async fn classify_pair(
        &self,
        extracted: ColorMap,
        manual: ColorMap,
        on_status: Option<StatusCallback>,
    ) -> Result<(ClassificationResponse, ClassificationResponse), ClientError> {
        self.with_deadline(|cancel| async move {
            tokio::try_join!(
                self.classify_within(extracted, on_status.clone(), &cancel),
                self.classify_within(manual, on_status.clone(), &cancel),
            )
        })
        .await
    }

    async fn classify_within(
        &self,
        colors: ColorMap,
        on_status: Option<StatusCallback>,
        cancel: &CancellationToken,
    ) -> Result<ClassificationResponse, ClientError> {
        notify(&on_status, "Iniciando classificação...");
        let init = self.submit_classification(colors, cancel).await?;
        self.poll_classification(&init.id, on_status, cancel).await
    }

    /// Run `work` under the workflow deadline. When it fires the token is
    /// cancelled and the work is abandoned with
    /// [`ClientError::DeadlineExceeded`].
    async fn with_deadline<T, F, Fut>(&self, work: F) -> Result<T, ClientError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let cancel = CancellationToken::new();
        let timeout = self.api.config().timeouts.default;

        tokio::select! {
            result = work(cancel.clone()) => result,
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(timeout_secs = timeout.as_secs(), "Workflow deadline reached");
                cancel.cancel();
                Err(ClientError::DeadlineExceeded(timeout))
            }
        }
    }
}

fn notify(on_status: &Option<StatusCallback>, text: &str) {
    if let Some(cb) = on_status {
        cb(text);
    }
}
