//! Extraction and classification workflows end to end over a scripted
//! transport.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use coloracao_client::config::{ApiConfig, Timeouts};
use coloracao_client::error::ClientError;
use coloracao_client::service::ExtractionMode;
use coloracao_client::ColoracaoService;
use coloracao_core::job::{JobType, SubmitRequest};
use coloracao_core::types::ColorMap;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use common::*;

fn extraction(id: &str, image_url: &str, result: Value) -> Value {
    json!({
        "id": id,
        "status": "COMPLETED",
        "output": {
            "image_url": image_url,
            "result": result,
            "details": {
                "iris": {"color_palette": {"average": "#111111", "result": "#111111"}}
            }
        }
    })
}

fn classification(id: &str, season: &str) -> Value {
    json!({
        "id": id,
        "status": "COMPLETED",
        "output": {
            "colors": {},
            "details": {
                "brightness-details": {"hair_brightness": 20.0},
                "saturation-details": {"hair_saturation": 40.0}
            },
            "result": {"season": season, "brightness": 30.0, "saturation": 45.0, "confidence": 0.82}
        }
    })
}

fn colors(pairs: &[(&str, &str)]) -> ColorMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn service(transport: Arc<ScriptedTransport>) -> ColoracaoService {
    ColoracaoService::new(client(transport, RecordingSleeper::new()))
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn submit_with_error_field_fails_even_on_success_status() {
    let transport = ScriptedTransport::new();
    transport.push_json("submit:extracao", json!({"error": "Imagem sem rosto detectável"}));
    let svc = service(transport);

    let err = svc
        .submit_analysis(
            &SubmitRequest::extraction(JobType::Extracao, "https://img/x.png"),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_matches!(err, ClientError::Server(ref m) if m == "Imagem sem rosto detectável");
}

#[tokio::test]
async fn submit_without_id_is_unexpected() {
    let transport = ScriptedTransport::new();
    transport.push_json("submit:classificacao", json!({"status": "IN_QUEUE"}));
    let svc = service(transport);

    let err = svc
        .submit_classification(colors(&[("iris", "#000000")]), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_matches!(err, ClientError::UnexpectedResponse(_));
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn analyze_image_reads_beard_tag_and_result() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        "submit:extracao",
        json!({"id": "e1", "status": "IN_QUEUE", "tags": {"barba": "true"}}),
    );
    transport.push_json("poll:extracao", json!({"id": "e1", "status": "IN_PROGRESS"}));
    transport.push_json(
        "poll:extracao",
        extraction("e1", "https://img/f.png", json!({"iris": "#222222"})),
    );
    let svc = service(transport.clone());
    let (on_status, log) = status_log();

    let outcome = svc
        .analyze_image("https://img/f.png", JobType::Extracao, Some(on_status))
        .await
        .unwrap();

    assert!(outcome.beard_detected);
    assert_eq!(outcome.result.id, "e1");
    assert_eq!(outcome.result.output.result["iris"], "#222222");

    let requests = transport.requests();
    let submit = &requests[0];
    assert_eq!(
        submit.json_body(),
        Some(&json!({"input": {"type": "extracao", "image_url": "https://img/f.png"}}))
    );
    let log = log.lock().unwrap();
    assert_eq!(log.first().map(String::as_str), Some("Iniciando análise..."));
    assert_eq!(log.last().map(String::as_str), Some("Extração concluída!"));
}

#[tokio::test]
async fn both_images_in_parallel_take_iris_from_eye() {
    let transport = ScriptedTransport::new();
    transport.push_json(
        "submit:extracao-frontal",
        json!({"id": "f1", "tags": {"barba": true}}),
    );
    transport.push_json("submit:extracao-olho", json!({"id": "o1"}));
    transport.push_json("poll:extracao-frontal", json!({"status": "IN_PROGRESS"}));
    transport.push_json(
        "poll:extracao-frontal",
        extraction(
            "f1",
            "https://img/f.png",
            json!({"iris": "#aaaaaa", "hair_root": "#3b2a20", "chin": "#c0a080"}),
        ),
    );
    transport.push_json("poll:extracao-olho", json!({"status": "IN_QUEUE"}));
    transport.push_json(
        "poll:extracao-olho",
        extraction("o1", "https://img/o.png", json!({"iris": "#4a3b2c"})),
    );
    let svc = service(transport);
    let (on_status, log) = status_log();

    let combined = svc
        .analyze_both_images(
            "https://img/f.png",
            "https://img/o.png",
            ExtractionMode::Parallel,
            Some(on_status),
        )
        .await
        .unwrap();

    assert!(combined.beard_detected);
    assert_eq!(combined.combined_colors["iris"], "#4a3b2c");
    assert_eq!(combined.combined_colors["hair_root"], "#3b2a20");
    assert!(!combined.classification_colors().contains_key("chin"));

    let log = log.lock().unwrap();
    assert!(log.iter().any(|s| s.starts_with("Frontal: ") && s.contains(" | Olho: ")));
    assert_eq!(
        log.last().map(String::as_str),
        Some("Frontal: Extração concluída! | Olho: Extração concluída!")
    );
}

#[tokio::test]
async fn sequential_mode_finishes_frontal_before_submitting_eye() {
    let transport = ScriptedTransport::new();
    transport.push_json("submit:extracao-frontal", json!({"id": "f1"}));
    transport.push_json(
        "poll:extracao-frontal",
        extraction("f1", "https://img/f.png", json!({"iris": "#aaaaaa"})),
    );
    transport.push_json("submit:extracao-olho", json!({"id": "o1"}));
    transport.push_json(
        "poll:extracao-olho",
        extraction("o1", "https://img/o.png", json!({})),
    );
    let svc = service(transport.clone());

    let combined = svc
        .analyze_both_images(
            "https://img/f.png",
            "https://img/o.png",
            ExtractionMode::Sequential,
            None,
        )
        .await
        .unwrap();

    // Eye job without an iris keeps the frontal one.
    assert_eq!(combined.combined_colors["iris"], "#aaaaaa");
    assert!(!combined.beard_detected);

    let order: Vec<String> = transport
        .requests()
        .iter()
        .map(|r| match r.json_body() {
            Some(body) => format!("submit:{}", body["input"]["type"].as_str().unwrap_or_default()),
            None => format!("poll:{}", r.query[1].1),
        })
        .collect();
    assert_eq!(
        order,
        vec![
            "submit:extracao-frontal",
            "poll:extracao-frontal",
            "submit:extracao-olho",
            "poll:extracao-olho",
        ]
    );
}

#[tokio::test]
async fn one_failed_extraction_fails_the_pair() {
    let transport = ScriptedTransport::new();
    transport.push_json("submit:extracao-frontal", json!({"id": "f1"}));
    transport.push_json("submit:extracao-olho", json!({"id": "o1"}));
    transport.push_json(
        "poll:extracao-frontal",
        json!({"status": "FAILED", "error": "sem rosto"}),
    );
    transport.push_json(
        "poll:extracao-olho",
        extraction("o1", "https://img/o.png", json!({"iris": "#4a3b2c"})),
    );
    let svc = service(transport);

    let err = svc
        .analyze_both_images("f", "o", ExtractionMode::Parallel, None)
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "Processamento falhou: sem rosto");
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn classify_colors_parses_season() {
    let transport = ScriptedTransport::new();
    transport.push_json("submit:classificacao", json!({"id": "c1"}));
    transport.push_json("poll:classificacao", json!({"status": "IN_PROGRESS"}));
    transport.push_json("poll:classificacao", classification("c1", "Outono Escuro"));
    let svc = service(transport.clone());
    let (on_status, log) = status_log();

    let response = svc
        .classify_colors(colors(&[("iris", "#4a3b2c")]), Some(on_status))
        .await
        .unwrap();

    assert_eq!(response.output.result.season, "Outono Escuro");
    assert_eq!(response.output.result.confidence, Some(0.82));
    assert_eq!(
        transport.requests()[0].json_body(),
        Some(&json!({"input": {"type": "classificacao", "colors": {"iris": "#4a3b2c"}}}))
    );
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "Iniciando classificação...",
            "Processando classificação...",
            "Classificação concluída!",
        ]
    );
}

#[tokio::test]
async fn classify_pair_returns_both_results() {
    let transport = ScriptedTransport::new();
    transport.push_json("submit:classificacao", json!({"id": "c1"}));
    transport.push_json("submit:classificacao", json!({"id": "c2"}));
    transport.push_json("poll:classificacao", classification("c1", "Outono Escuro"));
    transport.push_json("poll:classificacao", classification("c2", "Inverno Escuro"));
    let svc = service(transport);

    let (extracted, manual) = svc
        .classify_pair(
            colors(&[("iris", "#4a3b2c")]),
            colors(&[("iris", "#101010")]),
            None,
        )
        .await
        .unwrap();

    let mut seasons = vec![
        extracted.output.result.season.clone(),
        manual.output.result.season.clone(),
    ];
    seasons.sort();
    assert_eq!(seasons, vec!["Inverno Escuro", "Outono Escuro"]);
}

// ---------------------------------------------------------------------------
// Deadline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn deadline_aborts_hanging_workflow() {
    let config = ApiConfig {
        timeouts: Timeouts {
            default: Duration::from_millis(50),
            ..Default::default()
        },
        ..Default::default()
    };
    let api = client_with(Arc::new(HangingTransport), RecordingSleeper::new(), env(), config);
    let svc = ColoracaoService::new(api);

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        svc.classify_colors(colors(&[("iris", "#000000")]), None),
    )
    .await
    .expect("deadline should fire before the guard");

    let err = result.unwrap_err();
    assert_matches!(err, ClientError::DeadlineExceeded(d) if d == Duration::from_millis(50));
    assert_eq!(err.to_string(), "Tempo limite atingido (50 ms). Tente novamente mais tarde.");
}
