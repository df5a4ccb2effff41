//! Job lifecycle types shared by every submit/poll workflow.
//!
//! The processing backend owns the job; the client only ever sees an
//! opaque id, a status string and (eventually) an output payload.

use serde::{Deserialize, Serialize};

use crate::types::{ColorMap, JobId};

/* --------------------------------------------------------------------------
Status
-------------------------------------------------------------------------- */

/// Every status the backend is known to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    InQueue,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Parse the wire representation. Unknown strings yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "IN_QUEUE" => Some(Self::InQueue),
            "IN_PROGRESS" => Some(Self::InProgress),
            "COMPLETED" => Some(Self::Completed),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InQueue => "IN_QUEUE",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether polling should keep going after observing this status.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::InQueue | Self::InProgress)
    }
}

/* --------------------------------------------------------------------------
Job type
-------------------------------------------------------------------------- */

/// Discriminates the single combined submit/poll endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    #[serde(rename = "extracao")]
    Extracao,
    #[serde(rename = "extracao-frontal")]
    ExtracaoFrontal,
    #[serde(rename = "extracao-olho")]
    ExtracaoOlho,
    #[serde(rename = "classificacao")]
    Classificacao,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extracao => "extracao",
            Self::ExtracaoFrontal => "extracao-frontal",
            Self::ExtracaoOlho => "extracao-olho",
            Self::Classificacao => "classificacao",
        }
    }
}

/* --------------------------------------------------------------------------
Submit requests
-------------------------------------------------------------------------- */

/// Body of a submit call: `{"input": {"type": ..., ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitRequest {
    pub input: SubmitInput,
}

/// The `input` object, internally tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum SubmitInput {
    #[serde(rename = "extracao")]
    Extracao { image_url: String },
    #[serde(rename = "extracao-frontal")]
    ExtracaoFrontal { image_url: String },
    #[serde(rename = "extracao-olho")]
    ExtracaoOlho { image_url: String },
    #[serde(rename = "classificacao")]
    Classificacao { colors: ColorMap },
}

impl SubmitRequest {
    /// Build an extraction request for the given job type.
    ///
    /// `JobType::Classificacao` is not an extraction; callers get a plain
    /// `extracao` request in that case.
    pub fn extraction(job_type: JobType, image_url: impl Into<String>) -> Self {
        let image_url = image_url.into();
        let input = match job_type {
            JobType::ExtracaoFrontal => SubmitInput::ExtracaoFrontal { image_url },
            JobType::ExtracaoOlho => SubmitInput::ExtracaoOlho { image_url },
            JobType::Extracao | JobType::Classificacao => SubmitInput::Extracao { image_url },
        };
        Self { input }
    }

    pub fn classification(colors: ColorMap) -> Self {
        Self {
            input: SubmitInput::Classificacao { colors },
        }
    }

    pub fn job_type(&self) -> JobType {
        match self.input {
            SubmitInput::Extracao { .. } => JobType::Extracao,
            SubmitInput::ExtracaoFrontal { .. } => JobType::ExtracaoFrontal,
            SubmitInput::ExtracaoOlho { .. } => JobType::ExtracaoOlho,
            SubmitInput::Classificacao { .. } => JobType::Classificacao,
        }
    }
}

/* --------------------------------------------------------------------------
Submit response
-------------------------------------------------------------------------- */

/// Reply to a submit call.
#[derive(Debug, Clone, Deserialize)]
pub struct InitResponse {
    pub id: JobId,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Option<JobTags>,
}

/// Free-form tags attached by the backend at submit time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobTags {
    /// Beard detected on the frontal photo. Sent as the string `"true"`
    /// by the current backend, occasionally as a JSON boolean.
    #[serde(default)]
    pub barba: Option<serde_json::Value>,
}

impl InitResponse {
    pub fn beard_detected(&self) -> bool {
        match self.tags.as_ref().and_then(|t| t.barba.as_ref()) {
            Some(serde_json::Value::String(s)) => s == "true",
            Some(serde_json::Value::Bool(b)) => *b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_parse_known_and_unknown() {
        assert_eq!(JobStatus::parse("IN_QUEUE"), Some(JobStatus::InQueue));
        assert_eq!(JobStatus::parse("CANCELLED"), Some(JobStatus::Cancelled));
        assert_eq!(JobStatus::parse("in_queue"), None);
        assert_eq!(JobStatus::parse("PAUSED"), None);
    }

    #[test]
    fn only_queue_and_progress_are_pending() {
        assert!(JobStatus::InQueue.is_pending());
        assert!(JobStatus::InProgress.is_pending());
        assert!(!JobStatus::Completed.is_pending());
        assert!(!JobStatus::Failed.is_pending());
    }

    #[test]
    fn extraction_request_serializes_with_type_tag() {
        let req = SubmitRequest::extraction(JobType::ExtracaoOlho, "https://x/eye.png");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({"input": {"type": "extracao-olho", "image_url": "https://x/eye.png"}})
        );
        assert_eq!(req.job_type(), JobType::ExtracaoOlho);
    }

    #[test]
    fn classification_request_serializes_colors() {
        let mut colors = ColorMap::new();
        colors.insert("iris".into(), "#112233".into());
        let value = serde_json::to_value(SubmitRequest::classification(colors)).unwrap();
        assert_eq!(
            value,
            json!({"input": {"type": "classificacao", "colors": {"iris": "#112233"}}})
        );
    }

    #[test]
    fn beard_tag_accepts_string_and_bool() {
        let as_string: InitResponse =
            serde_json::from_value(json!({"id": "a", "tags": {"barba": "true"}})).unwrap();
        let as_bool: InitResponse =
            serde_json::from_value(json!({"id": "b", "tags": {"barba": true}})).unwrap();
        let negative: InitResponse =
            serde_json::from_value(json!({"id": "c", "tags": {"barba": "false"}})).unwrap();
        let missing: InitResponse = serde_json::from_value(json!({"id": "d"})).unwrap();

        assert!(as_string.beard_detected());
        assert!(as_bool.beard_detected());
        assert!(!negative.beard_detected());
        assert!(!missing.beard_detected());
    }
}
