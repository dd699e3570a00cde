//! Tests for `OpenAiClient` against a mock chat endpoint.
//!
//! The mock binds to `127.0.0.1:0` and serves a canned completion so the
//! tests never leave the machine.

use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use llm_client::{ChatClient, LlmClientError, Message, OpenAiClient};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::Instant;

/// Echo the model name and the last user message back as the completion.
async fn echo_completion(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "Bearer test-key");
    if !authorized {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "bad key" })));
    }

    let model = body["model"].as_str().unwrap_or_default().to_string();
    let last = body["messages"]
        .as_array()
        .and_then(|m| m.last())
        .and_then(|m| m["content"].as_str())
        .unwrap_or_default()
        .to_string();

    (
        StatusCode::OK,
        Json(json!({
            "choices": [ { "message": { "role": "assistant", "content": format!("{model}: {last}") } } ]
        })),
    )
}

async fn empty_completion() -> Json<Value> {
    Json(json!({ "choices": [] }))
}

async fn slow_completion() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "choices": [ { "message": { "role": "assistant", "content": "late" } } ] }))
}

/// Start the mock service on a random port
async fn start_mock_llm_service() -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock LLM service");
    let addr = listener.local_addr().expect("Failed to get local address");

    let app = Router::new()
        .route("/v1/chat/completions", post(echo_completion))
        .route("/empty", post(empty_completion))
        .route("/slow", post(slow_completion));

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("Mock LLM service failed");
    });

    (format!("http://{}", addr), handle)
}

#[tokio::test]
async fn test_chat_returns_first_choice() {
    let (base, handle) = start_mock_llm_service().await;
    let client = OpenAiClient::new(format!("{base}/v1/chat/completions"), "test-key", "gpt-test").unwrap();

    let reply = client
        .chat(&[Message::system("be brief"), Message::user("hello")], None)
        .await
        .expect("chat failed");
    assert_eq!(reply, "gpt-test: hello");

    handle.abort();
}

#[tokio::test]
async fn test_chat_surfaces_http_status() {
    let (base, handle) = start_mock_llm_service().await;
    let client = OpenAiClient::new(format!("{base}/v1/chat/completions"), "wrong", "gpt-test").unwrap();

    let err = client.chat(&[Message::user("hello")], None).await.unwrap_err();
    assert!(matches!(err, LlmClientError::Status { code: 401, .. }));

    handle.abort();
}

#[tokio::test]
async fn test_chat_without_choices_is_error() {
    let (base, handle) = start_mock_llm_service().await;
    let client = OpenAiClient::new(format!("{base}/empty"), "test-key", "gpt-test").unwrap();

    let err = client.chat(&[Message::user("hello")], None).await.unwrap_err();
    assert!(matches!(err, LlmClientError::EmptyChoices));

    handle.abort();
}

#[tokio::test]
async fn test_chat_honors_deadline() {
    let (base, handle) = start_mock_llm_service().await;
    let client = OpenAiClient::new(format!("{base}/slow"), "test-key", "gpt-test").unwrap();

    let started = Instant::now();
    let err = client
        .chat(
            &[Message::user("hello")],
            Some(Instant::now() + Duration::from_millis(100)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LlmClientError::DeadlineExceeded));
    assert!(started.elapsed() < Duration::from_secs(2));

    handle.abort();
}
