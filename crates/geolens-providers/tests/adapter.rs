//! Integration tests for `ProviderAdapter` using wiremock HTTP mocks.

use std::time::Duration;

use geolens_providers::{
    AdapterLimits, CallOptions, OutputSchema, ProviderAdapter, ProviderError, ProviderKind,
};
use serde::Deserialize;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const VERDICT: OutputSchema = OutputSchema {
    name: "comparison",
    shape: r#"{"winner": "string", "differentiators": ["string"]}"#,
};

#[derive(Debug, Deserialize)]
struct Verdict {
    winner: String,
    differentiators: Vec<String>,
}

fn limits(max_retries: u32) -> AdapterLimits {
    AdapterLimits {
        timeout_secs: 5,
        max_concurrency: 2,
        max_retries,
        backoff_base_ms: 0,
    }
}

fn adapter(kind: ProviderKind, base_url: &str, max_retries: u32) -> ProviderAdapter {
    ProviderAdapter::with_base_url(kind, "test-key", "test-model", base_url, limits(max_retries))
        .expect("adapter construction should not fail")
}

fn chat_reply(text: &str) -> serde_json::Value {
    serde_json::json!({
        "model": "gpt-4o-mini-2024-07-18",
        "choices": [{ "message": { "role": "assistant", "content": text } }],
        "usage": { "prompt_tokens": 20, "completion_tokens": 10 }
    })
}

#[tokio::test]
async fn openai_call_returns_text_and_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({ "model": "test-model" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("Acme is great.")))
        .mount(&server)
        .await;

    let adapter = adapter(ProviderKind::OpenAi, &server.uri(), 0);
    let raw = adapter
        .call("Tell me about Acme", &CallOptions::default())
        .await
        .expect("call should succeed");

    assert_eq!(raw.text, "Acme is great.");
    assert_eq!(raw.model, "gpt-4o-mini-2024-07-18");
    assert_eq!(raw.provider, ProviderKind::OpenAi);
    assert_eq!(raw.usage.total(), 30);

    let usage = adapter.usage();
    assert_eq!(usage.calls, 1);
    assert_eq!(usage.failures, 0);
    assert_eq!(usage.usage.input_tokens, 20);
}

#[tokio::test]
async fn anthropic_call_sends_version_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "claude-3-5-haiku-20241022",
            "content": [{ "type": "text", "text": "Hello" }],
            "usage": { "input_tokens": 4, "output_tokens": 1 }
        })))
        .mount(&server)
        .await;

    let raw = adapter(ProviderKind::Anthropic, &server.uri(), 0)
        .call("hi", &CallOptions::default())
        .await
        .expect("call should succeed");
    assert_eq!(raw.text, "Hello");
}

#[tokio::test]
async fn server_error_is_retried_then_counted_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(3)
        .mount(&server)
        .await;

    let adapter = adapter(ProviderKind::Perplexity, &server.uri(), 2);
    let err = adapter
        .call("hi", &CallOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Status { status: 503, .. }));
    let usage = adapter.usage();
    assert_eq!(usage.calls, 1);
    assert_eq!(usage.failures, 1);
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let err = adapter(ProviderKind::OpenAi, &server.uri(), 3)
        .call("hi", &CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Status { status: 401, .. }));
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_reply("late"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let options = CallOptions {
        timeout: Duration::from_millis(50),
        ..CallOptions::default()
    };
    let err = adapter(ProviderKind::OpenAi, &server.uri(), 0)
        .call("hi", &options)
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn missing_key_is_unavailable_without_network() {
    let settings = geolens_core::ProviderSettings {
        api_key: None,
        model: "gemini-1.5-flash".to_owned(),
        base_url: Some("http://127.0.0.1:9".to_owned()),
    };
    let adapter = ProviderAdapter::new(ProviderKind::Gemini, &settings, limits(0)).unwrap();
    assert!(!adapter.is_available());
    let err = adapter
        .call("hi", &CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable { .. }));
    assert_eq!(adapter.usage().calls, 0);
}

#[tokio::test]
async fn structured_call_decodes_fenced_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
            "```json\n{\"winner\": \"Acme\", \"differentiators\": [\"price\"]}\n```",
        )))
        .mount(&server)
        .await;

    let structured = adapter(ProviderKind::OpenAi, &server.uri(), 0)
        .call_structured::<Verdict>("Acme or Fizzco?", &VERDICT, &CallOptions::default())
        .await
        .expect("structured call should succeed");
    assert!(!structured.repaired);
    assert_eq!(structured.value.winner, "Acme");
    assert_eq!(structured.value.differentiators, vec!["price".to_owned()]);
}

#[tokio::test]
async fn structured_call_repairs_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(serde_json::json!({ "temperature": 0.0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
            "{\"winner\": \"Fizzco\", \"differentiators\": []}",
        )))
        .expect(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
            "Fizzco wins because of taste.",
        )))
        .expect(1)
        .with_priority(2)
        .mount(&server)
        .await;

    let adapter = adapter(ProviderKind::OpenAi, &server.uri(), 0);
    let structured = adapter
        .call_structured::<Verdict>("Acme or Fizzco?", &VERDICT, &CallOptions::default())
        .await
        .expect("repair should recover");
    assert!(structured.repaired);
    assert_eq!(structured.value.winner, "Fizzco");
    assert_eq!(adapter.usage().calls, 2);
}

#[tokio::test]
async fn structured_call_fails_when_repair_is_also_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("no idea")))
        .expect(2)
        .mount(&server)
        .await;

    let err = adapter(ProviderKind::OpenAi, &server.uri(), 0)
        .call_structured::<Verdict>("Acme or Fizzco?", &VERDICT, &CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::MalformedResponse { .. }));
}

#[tokio::test]
async fn rate_limit_waits_for_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "1")
                .set_body_string("slow down"),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply("ok")))
        .expect(1)
        .mount(&server)
        .await;

    // The adapter allows no retries; the call's own budget allows one.
    let options = CallOptions {
        max_retries: Some(1),
        ..CallOptions::default()
    };
    let started = std::time::Instant::now();
    let raw = adapter(ProviderKind::OpenAi, &server.uri(), 0)
        .call("hi", &options)
        .await
        .expect("retry after the requested wait should succeed");

    assert_eq!(raw.text, "ok");
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn call_budget_overrides_adapter_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let options = CallOptions {
        max_retries: Some(0),
        ..CallOptions::default()
    };
    let err = adapter(ProviderKind::OpenAi, &server.uri(), 3)
        .call("hi", &options)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProviderError::Status {
            status: 503,
            retry_after: None,
            ..
        }
    ));
}
