//! Poll loop behaviour against scripted backend replies.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use coloracao_client::config::{ApiConfig, Endpoint, PollingConfig};
use coloracao_client::error::ClientError;
use coloracao_client::poll::{JobResult, EXTRACTION_MESSAGES, GENERIC_MESSAGES};
use coloracao_client::transport::{Method, Reply};
use coloracao_core::job::JobType;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::*;

fn completed() -> serde_json::Value {
    json!({"id": "job-1", "status": "COMPLETED", "output": {"result": {"iris": "#4a3b2c"}}})
}

// ---------------------------------------------------------------------------
// Sequencing
// ---------------------------------------------------------------------------

/// IN_QUEUE → IN_PROGRESS → COMPLETED returns the payload after exactly
/// two delayed retries.
#[tokio::test]
async fn completes_after_two_delayed_retries() {
    let transport = ScriptedTransport::new();
    transport.push_json(ANY, json!({"id": "job-1", "status": "IN_QUEUE"}));
    transport.push_json(ANY, json!({"id": "job-1", "status": "IN_PROGRESS"}));
    transport.push_json(ANY, completed());
    let sleeper = RecordingSleeper::new();
    let api = client(transport.clone(), sleeper.clone());
    let (on_status, log) = status_log();

    let result = api
        .poll_for_result(
            Endpoint::ColoracaoSimplificado,
            "job-1",
            GENERIC_MESSAGES,
            Some(on_status),
            &CancellationToken::new(),
        )
        .await
        .expect("poll should complete");

    assert_eq!(result, JobResult::Json(completed()));
    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(5); 2]);
    assert_eq!(transport.request_count(), 3);
    assert_eq!(
        *log.lock().unwrap(),
        vec!["Na fila...", "Processando...", "Concluído!"]
    );

    let requests = transport.requests();
    let first = &requests[0];
    assert_eq!(first.method, Method::Post);
    assert_eq!(first.url, SIMPLIFICADO_URL);
    assert_eq!(first.json_body(), Some(&json!({"id": "job-1"})));
    assert!(first.auth.is_some());
}

/// `max_attempts` non-terminal replies raise a timeout and no further
/// request is sent.
#[tokio::test]
async fn times_out_after_max_attempts_without_extra_request() {
    let transport = ScriptedTransport::new();
    for _ in 0..5 {
        transport.push_json(ANY, json!({"status": "IN_PROGRESS"}));
    }
    let sleeper = RecordingSleeper::new();
    let config = ApiConfig {
        polling: PollingConfig {
            max_attempts: 3,
            ..Default::default()
        },
        ..Default::default()
    };
    let api = client_with(transport.clone(), sleeper.clone(), env(), config);

    let err = api
        .poll_for_result(
            Endpoint::ColoracaoSimplificado,
            "job-1",
            GENERIC_MESSAGES,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_matches!(err, ClientError::TimedOut(_));
    assert_eq!(err.to_string(), "Tempo limite atingido ao aguardar o processamento");
    assert_eq!(transport.request_count(), 3);
    assert_eq!(transport.remaining(ANY), 2);
    assert_eq!(sleeper.sleeps().len(), 2);
}

/// "Completed" without a result keeps polling.
#[tokio::test]
async fn completed_without_result_is_not_terminal() {
    let transport = ScriptedTransport::new();
    transport.push_json(ANY, json!({"status": "COMPLETED", "output": {}}));
    transport.push_json(ANY, completed());
    let sleeper = RecordingSleeper::new();
    let api = client(transport.clone(), sleeper.clone());

    let result = api
        .poll_for_result(
            Endpoint::ColoracaoSimplificado,
            "job-1",
            GENERIC_MESSAGES,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result, JobResult::Json(completed()));
    assert_eq!(sleeper.sleeps().len(), 1);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failed_job_joins_details() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        ANY,
        json!({"status": "FAILED", "output": {"details": ["x", "y"]}}),
    );
    let api = client(transport, RecordingSleeper::new());

    let err = api
        .poll_for_result(
            Endpoint::ColoracaoSimplificado,
            "job-1",
            GENERIC_MESSAGES,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Processamento falhou: x y");
}

#[tokio::test]
async fn cancelled_and_unknown_statuses_are_errors() {
    let transport = ScriptedTransport::new();
    transport.push_json(ANY, json!({"status": "CANCELLED"}));
    transport.push_json(ANY, json!({"status": "PAUSED"}));
    let api = client(transport, RecordingSleeper::new());
    let cancel = CancellationToken::new();

    let first = api
        .poll_for_result(Endpoint::ColoracaoSimplificado, "a", GENERIC_MESSAGES, None, &cancel)
        .await;
    assert_matches!(first, Err(ClientError::JobCancelled));

    let second = api
        .poll_for_result(Endpoint::ColoracaoSimplificado, "b", GENERIC_MESSAGES, None, &cancel)
        .await;
    assert_matches!(second, Err(ClientError::UnknownStatus(s)) if s == "PAUSED");
}

#[tokio::test]
async fn unrecognized_reply_includes_raw_payload() {
    let transport = ScriptedTransport::new();
    transport.push_json(ANY, json!({"message": "Workflow was started"}));
    let api = client(transport, RecordingSleeper::new());

    let err = api
        .poll_for_result(
            Endpoint::ColoracaoSimplificado,
            "job-1",
            GENERIC_MESSAGES,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Workflow was started"));
}

#[tokio::test]
async fn cancelled_token_sends_nothing() {
    let transport = ScriptedTransport::new();
    transport.push_json(ANY, completed());
    let api = client(transport.clone(), RecordingSleeper::new());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = api
        .poll_for_result(Endpoint::ColoracaoSimplificado, "job-1", GENERIC_MESSAGES, None, &cancel)
        .await
        .unwrap_err();

    assert_matches!(err, ClientError::Aborted);
    assert_eq!(err.to_string(), "Operação cancelada");
    assert_eq!(transport.request_count(), 0);
}

// ---------------------------------------------------------------------------
// Reply shapes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn poll_job_uses_get_with_id_and_type() {
    let transport = ScriptedTransport::new();
    transport.push_json("poll:extracao-olho", json!([{"status": "IN_QUEUE"}]));
    transport.push_json("poll:extracao-olho", json!([completed()]));
    let api = client(transport.clone(), RecordingSleeper::new());

    let result = api
        .poll_job(
            Endpoint::ColoracaoSimplificado,
            "job-9",
            JobType::ExtracaoOlho,
            EXTRACTION_MESSAGES,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result, JobResult::Json(completed()));
    let requests = transport.requests();
    let request = &requests[0];
    assert_eq!(request.method, Method::Get);
    assert_eq!(
        request.query,
        vec![
            ("id".to_string(), "job-9".to_string()),
            ("type".to_string(), "extracao-olho".to_string()),
        ]
    );
    assert!(request.body.is_none());
}

#[tokio::test]
async fn image_reply_is_terminal() {
    let transport = ScriptedTransport::new();
    transport.push(
        ANY,
        Ok(Reply::Image {
            content_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        }),
    );
    let api = client(transport, RecordingSleeper::new());

    let result = api
        .poll_for_result(
            Endpoint::ColoracaoSimplificado,
            "job-1",
            GENERIC_MESSAGES,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_matches!(result, JobResult::Image { ref content_type, .. } if content_type == "image/png");
}

#[tokio::test]
async fn missing_endpoint_is_a_config_error() {
    let transport = ScriptedTransport::new();
    let api = client_with(
        transport.clone(),
        RecordingSleeper::new(),
        coloracao_client::env::MapEnv::new(),
        ApiConfig::default(),
    );

    let err = api
        .poll_for_result(
            Endpoint::ColoracaoSimplificado,
            "job-1",
            GENERIC_MESSAGES,
            None,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "API endpoint VITE_COLORACAO_SIMPLIFICADO_URL is not configured"
    );
    assert_eq!(transport.request_count(), 0);
}
