use super::handlers::{handle_health, handle_story_gap};
use super::*;
use crate::config::Config;
use crate::error::LlmError;
use crate::llm::{CompletionFuture, CompletionRequest, ModelChain, Provider};
use crate::story::{GenerationClient, PipelineOptions};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

struct ScriptedProvider {
    replies: Mutex<Vec<Result<String, LlmError>>>,
    calls: AtomicUsize,
}

impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn complete<'a>(&'a self, _request: &'a CompletionRequest) -> CompletionFuture<'a> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Ok("still not json".to_string())
            } else {
                replies.remove(0)
            }
        })
    }
}

fn state_with(replies: Vec<Result<String, LlmError>>) -> (AppState, Arc<ScriptedProvider>) {
    let provider = Arc::new(ScriptedProvider {
        replies: Mutex::new(replies),
        calls: AtomicUsize::new(0),
    });
    let chain = ModelChain::new(provider.clone(), vec!["test-model".into()]);
    let pipeline = StoryGapPipeline::new(GenerationClient::new(chain), PipelineOptions::default());
    (
        AppState {
            pipeline: Arc::new(pipeline),
        },
        provider,
    )
}

fn whale_owl_reply() -> Result<String, LlmError> {
    Ok(json!({
        "gap_text": "A ______ swam far. An ______ hooted at night.",
        "solution_text": "A whale swam far. An owl hooted at night.",
        "gaps_meta": [
            {"index": 1, "correct": "whale", "why_unique": "only a whale fits the sea", "rejects": []},
            {"index": 2, "correct": "owl", "why_unique": "hooting", "rejects": []}
        ]
    })
    .to_string())
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn post(state: AppState, body: &str) -> Response {
    handle_story_gap(State(state), Bytes::from(body.to_string())).await
}

#[tokio::test]
async fn health_reports_ok() {
    let response = handle_health().await.into_response();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"status": "ok"}));
}

#[tokio::test]
async fn valid_request_returns_exercise() {
    let (state, provider) = state_with(vec![whale_owl_reply()]);
    let response = post(state, r#"{"wordSet": ["whale", "owl"], "difficulty": "green"}"#).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["used_words"], json!(["whale", "owl"]));
    assert_eq!(body["gaps_meta"][1]["correct"], "owl");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn malformed_body_is_invalid_input_without_oracle_call() {
    let (state, provider) = state_with(vec![]);
    let response = post(state, "{not json").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_input");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unusable_words_are_rejected_before_generation() {
    let (state, provider) = state_with(vec![]);
    let response = post(state.clone(), r#"{"wordSet": []}"#).await;
    assert_eq!(body_json(response).await["error"], "invalid_input");

    let response = post(state, r#"{"wordSet": ["", null, 0]}"#).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid_words");
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn exhausted_budget_is_unprocessable_and_retryable() {
    let (state, provider) = state_with(vec![]);
    let response = post(state, r#"{"wordSet": ["whale", "owl"]}"#).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "model_output_invalid");
    assert_eq!(body["retryable"], true);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn oracle_outage_is_bad_gateway() {
    let failures = (0..3)
        .map(|_| {
            Err(LlmError::Request {
                model: "test-model".into(),
                message: "connection refused".into(),
            })
        })
        .collect();
    let (state, _) = state_with(failures);
    let response = post(state, r#"{"wordSet": ["whale"]}"#).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = body_json(response).await;
    assert_eq!(body["error"], "generation_failed");
    assert!(body["message"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn router_enforces_body_limit_over_http() {
    let (state, _) = state_with(vec![whale_owl_reply()]);
    let config = Config::default();
    let app = build_app(state, 256, config.gateway_timeout());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    let client = reqwest::Client::new();
    let url = format!("http://{addr}/api/story-gap");

    let ok = client
        .post(&url)
        .header("content-type", "application/json")
        .body(r#"{"wordSet": ["whale", "owl"]}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status().as_u16(), 200);

    let oversized = format!(r#"{{"wordSet": ["{}"]}}"#, "a".repeat(1024));
    let rejected = client.post(&url).body(oversized).send().await.unwrap();
    assert_eq!(rejected.status().as_u16(), 413);

    let health = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status().as_u16(), 200);

    server.abort();
}
