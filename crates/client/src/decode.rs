//! Normalisation of poll replies.
//!
//! The backend has answered polls in several shapes over time. Each reply
//! is classified into one [`PollReply`] variant, trying the shapes in a
//! fixed priority order so ambiguous bodies always resolve the same way.

use serde_json::Value;

use crate::transport::Reply;

/// Keys that mark a status-less object as an already finished result.
const TERMINAL_KEYS: [&str; 3] = ["output", "result", "estilo"];

/// A status envelope: `{status, output?, error?, ...}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Raw status string; non-string statuses are kept in their JSON form.
    pub status: String,
    pub output: Option<Value>,
    pub error: Option<String>,
    /// The whole envelope object.
    pub raw: Value,
}

impl Envelope {
    fn from_object(raw: Value) -> Self {
        let status = match raw.get("status") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let output = raw.get("output").filter(|v| !v.is_null()).cloned();
        let error = error_field(&raw);
        Self {
            status,
            output,
            error,
            raw,
        }
    }

    /// `true` when `output` carries a `result` or `results` value.
    pub fn has_result(&self) -> bool {
        self.output.as_ref().is_some_and(|output| {
            ["result", "results"]
                .iter()
                .any(|key| output.get(key).is_some_and(is_truthy))
        })
    }

    /// Failure text: `output.details` joined by spaces, else the envelope's
    /// `error`, else a generic message.
    pub fn failure_details(&self) -> String {
        let details = self
            .output
            .as_ref()
            .and_then(|o| o.get("details"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|s| !s.is_empty());

        details
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "Erro desconhecido".to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollReply {
    /// Image body: finished.
    Image { content_type: String, bytes: Vec<u8> },
    /// Carries a status to interpret.
    Envelope(Envelope),
    /// A result returned directly, without a status.
    Terminal(Value),
    /// Matches no known shape.
    Unrecognized(Value),
}

/// Classify a reply, first match wins:
///
/// 1. image body, or an object with an `image` key → terminal;
/// 2. array whose first element has `status` → that element's envelope;
/// 3. non-empty array without `status` → terminal;
/// 4. object with `status` → envelope;
/// 5. object with `output`, `result` or `estilo` → terminal;
/// 6. anything else → unrecognized.
pub fn classify(reply: Reply) -> PollReply {
    let value = match reply {
        Reply::Image {
            content_type,
            bytes,
        } => {
            return PollReply::Image {
                content_type,
                bytes,
            }
        }
        Reply::Json(value) => value,
    };

    if value.get("image").is_some() {
        return PollReply::Terminal(value);
    }

    if let Value::Array(mut items) = value {
        if items.is_empty() {
            return PollReply::Unrecognized(Value::Array(items));
        }
        return if items[0].get("status").is_some() {
            PollReply::Envelope(Envelope::from_object(items.swap_remove(0)))
        } else {
            PollReply::Terminal(Value::Array(items))
        };
    }

    if value.get("status").is_some() {
        return PollReply::Envelope(Envelope::from_object(value));
    }
    if TERMINAL_KEYS.iter().any(|k| value.get(*k).is_some()) {
        return PollReply::Terminal(value);
    }
    PollReply::Unrecognized(value)
}

/// The `error` field of a body as display text, ignoring null/false/empty.
pub fn error_field(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::String(_) | Value::Null | Value::Bool(false) => None,
        Value::Object(obj) => obj
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(Value::Object(obj.clone()).to_string())),
        other => Some(other.to_string()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
