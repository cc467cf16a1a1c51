//! Wiremock integration tests for VertexClient.
//!
//! These tests verify the request shape sent to `generateContent` and the
//! mapping of every failure onto a [`ModelError`] kind.

use muninn::model::{GenerationConfig, PromptSpec, VertexClient};
use muninn::{GenerativeModel, ModelError, MuninnError, Operation, Payload};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT: &str =
    "/v1/projects/test-project/locations/us-central1/publishers/google/models/gemini-test:generateContent";

fn client(server: &MockServer, operation: Operation) -> VertexClient {
    VertexClient::new(
        "test-project",
        "us-central1",
        "gemini-test",
        PromptSpec::for_operation(operation, "TEMPLATE"),
        GenerationConfig::default(),
    )
    .with_base_url(server.uri())
    .with_access_token("test_token")
}

/// API body whose single candidate carries `text`.
fn candidate(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

/// Test that the request carries prompt, decoding config and safety settings.
#[tokio::test]
async fn test_request_shape() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("Authorization", "Bearer test_token"))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "TEMPLATE\nsome lyrics" }] }],
            "generationConfig": {
                "temperature": 0.0,
                "topP": 0.95,
                "maxOutputTokens": 1000,
                "responseModalities": ["TEXT"],
                "responseMimeType": "application/json",
                "responseSchema": {
                    "type": "OBJECT",
                    "properties": { "response": { "type": "STRING" } },
                    "required": ["response"]
                }
            },
            "safetySettings": [
                { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "OFF" },
                { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "OFF" },
                { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "OFF" },
                { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "OFF" }
            ]
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(candidate(r#"{"response": "tagged"}"#)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let payload = client(&server, Operation::Tags)
        .generate("some lyrics")
        .await
        .expect("generate should succeed");
    assert_eq!(payload, Payload::Text("tagged".into()));
}

/// Test that a profile arrives as a structured payload, double-encoded or not.
#[tokio::test]
async fn test_structured_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(
            r#"{"response": "{\"joy\": 0.5, \"sadness\": 0.5}"}"#,
        )))
        .mount(&server)
        .await;

    let payload = client(&server, Operation::Profile)
        .generate("lyrics")
        .await
        .unwrap();
    assert_eq!(
        payload,
        Payload::Structured(json!({"joy": 0.5, "sadness": 0.5}))
    );
}

/// Test that an `error` field in the envelope is an upstream failure.
#[tokio::test]
async fn test_envelope_error_is_upstream() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(
            r#"{"error": {"message": "Test error"}}"#,
        )))
        .mount(&server)
        .await;

    let err = client(&server, Operation::Tags)
        .generate("lyrics")
        .await
        .unwrap_err();
    assert!(
        matches!(err, MuninnError::Model(ModelError::Upstream(ref m)) if m.contains("Test error")),
        "got {err:?}"
    );
}

/// Test that a missing `response` field is reported as such.
#[tokio::test]
async fn test_missing_response_field() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate(r#"{"answer": "x"}"#)))
        .mount(&server)
        .await;

    let err = client(&server, Operation::Tags)
        .generate("lyrics")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MuninnError::Model(ModelError::MissingField("response"))
    ));
}

/// Test that non-JSON model text is malformed.
#[tokio::test]
async fn test_malformed_model_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate("invalid JSON")))
        .mount(&server)
        .await;

    let err = client(&server, Operation::Profile)
        .generate("lyrics")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MuninnError::Model(ModelError::MalformedResponse(_))
    ));
}

/// Test that an API body with no candidates is reported as a missing field.
#[tokio::test]
async fn test_no_candidates() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let err = client(&server, Operation::Profile)
        .generate("lyrics")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MuninnError::Model(ModelError::MissingField("candidates"))
    ));
}

/// Test that a blocked prompt is an upstream failure.
#[tokio::test]
async fn test_blocked_prompt() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    let err = client(&server, Operation::Tags)
        .generate("lyrics")
        .await
        .unwrap_err();
    assert!(matches!(err, MuninnError::Model(ModelError::Upstream(ref m)) if m.contains("SAFETY")));
}

/// Test that HTTP error statuses carry the API message.
#[tokio::test]
async fn test_http_error_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "Permission denied", "status": "PERMISSION_DENIED" }
        })))
        .mount(&server)
        .await;

    let err = client(&server, Operation::Tags)
        .generate("lyrics")
        .await
        .unwrap_err();
    match err {
        MuninnError::Model(ModelError::Upstream(message)) => {
            assert!(message.contains("403"));
            assert!(message.contains("Permission denied"));
        }
        other => panic!("expected Upstream, got {other:?}"),
    }
}

/// Test that an unreachable endpoint is a transport failure.
#[tokio::test]
async fn test_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = VertexClient::new(
        "test-project",
        "us-central1",
        "gemini-test",
        PromptSpec::for_operation(Operation::Tags, "TEMPLATE"),
        GenerationConfig::default(),
    )
    .with_base_url(format!("http://{addr}"));

    let err = client.generate("lyrics").await.unwrap_err();
    assert!(matches!(err, MuninnError::Model(ModelError::Transport(_))));
}
