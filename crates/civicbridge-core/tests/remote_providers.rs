//! Remote backends against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use civicbridge_config::{ProviderConfig, ProviderKind, RetryConfig};
use civicbridge_core::provider::{GeminiProvider, OpenAiProvider, Provider};
use civicbridge_core::{
    ContextSnippet, FailoverRouter, InMemoryHistory, ProviderError, Query, RouteError, Transient,
};
use civicbridge_test_utils::{TestConfigBuilder, sample_catalog};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GEMINI_PATH: &str = "/models/gemini-pro:generateContent";
const OPENAI_PATH: &str = "/v1/chat/completions";

fn query() -> Query {
    Query::new("Which subsidies can I get for my farm?", "en", "farmer-7").unwrap()
}

fn gemini_reply(text: &str) -> serde_json::Value {
    json!({ "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }] })
}

fn gemini(server: &MockServer) -> GeminiProvider {
    GeminiProvider::new(Some("test-key")).with_base_url(server.uri())
}

async fn gemini_error(template: ResponseTemplate) -> ProviderError {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(template)
        .expect(1)
        .mount(&server)
        .await;

    gemini(&server)
        .process(&query(), &ContextSnippet::default())
        .await
        .unwrap_err()
}

async fn openai_error(template: ResponseTemplate) -> ProviderError {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(OPENAI_PATH))
        .respond_with(template)
        .expect(1)
        .mount(&server)
        .await;

    OpenAiProvider::new(Some("sk-test"))
        .with_base_url(format!("{}{OPENAI_PATH}", server.uri()))
        .process(&query(), &ContextSnippet::default())
        .await
        .unwrap_err()
}

#[tokio::test]
async fn test_gemini_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("Apply for PM-KISAN.")))
        .expect(1)
        .mount(&server)
        .await;

    let answer = gemini(&server)
        .process(&query(), &ContextSnippet::default())
        .await
        .unwrap();
    assert_eq!(answer, "Apply for PM-KISAN.");
}

#[tokio::test]
async fn test_gemini_sends_prompt_with_query_and_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("ok")))
        .expect(1)
        .mount(&server)
        .await;

    gemini(&server)
        .process(&query(), &ContextSnippet::default())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.contains("\"Which subsidies can I get for my farm?\""));
    assert!(prompt.contains("Context Information:\nAvailable Programs:"));
}

#[tokio::test]
async fn test_gemini_server_error_is_transient() {
    let err = gemini_error(ResponseTemplate::new(503).set_body_string("overloaded")).await;
    assert_eq!(
        err,
        ProviderError::Server {
            status: 503,
            message: "overloaded".to_string()
        }
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_gemini_rate_limit_is_not_transient() {
    let err = gemini_error(ResponseTemplate::new(429).insert_header("retry-after", "7")).await;
    assert_eq!(err, ProviderError::RateLimited { retry_after_secs: 7 });
}

#[tokio::test]
async fn test_gemini_auth_failure() {
    let err = gemini_error(ResponseTemplate::new(401).set_body_string("API key not valid")).await;
    assert_eq!(err, ProviderError::Auth("API key not valid".to_string()));
}

#[tokio::test]
async fn test_gemini_bad_request_is_rejected() {
    let err = gemini_error(ResponseTemplate::new(400).set_body_string("bad")).await;
    assert!(matches!(err, ProviderError::Rejected { status: 400, .. }));
}

#[tokio::test]
async fn test_gemini_empty_candidates_is_malformed() {
    let err =
        gemini_error(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] }))).await;
    assert!(matches!(err, ProviderError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_gemini_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_reply("late"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let err = gemini(&server)
        .with_timeout(Duration::from_millis(50))
        .process(&query(), &ContextSnippet::default())
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::Timeout);
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    let provider = GeminiProvider::new(Some("test-key")).with_base_url("http://127.0.0.1:1");
    let err = provider
        .process(&query(), &ContextSnippet::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Network(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_openai_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(OPENAI_PATH))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({ "model": "gpt-4o-mini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Try the crop insurance scheme." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(Some("sk-test"))
        .with_base_url(format!("{}{OPENAI_PATH}", server.uri()));
    let answer = provider
        .process(&query(), &ContextSnippet::default())
        .await
        .unwrap();
    assert_eq!(answer, "Try the crop insurance scheme.");
}

#[tokio::test]
async fn test_openai_missing_choices_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new(Some("sk-test")).with_base_url(server.uri());
    let err = provider
        .process(&query(), &ContextSnippet::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_openai_server_error_is_transient() {
    let err = openai_error(ResponseTemplate::new(503).set_body_string("upstream busy")).await;
    assert_eq!(
        err,
        ProviderError::Server {
            status: 503,
            message: "upstream busy".to_string()
        }
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_openai_rate_limit_is_not_transient() {
    let err = openai_error(ResponseTemplate::new(429).insert_header("retry-after", "20")).await;
    assert_eq!(err, ProviderError::RateLimited { retry_after_secs: 20 });
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_openai_auth_failure_is_not_transient() {
    let err = openai_error(ResponseTemplate::new(401).set_body_string("invalid api key")).await;
    assert_eq!(err, ProviderError::Auth("invalid api key".to_string()));
    assert!(!err.is_transient());
}

fn openai_primary(server: &MockServer) -> TestConfigBuilder {
    TestConfigBuilder::new()
        .primary("OpenAI")
        .provider_key("OpenAI", "sk-test")
        .provider_base_url("OpenAI", &format!("{}{OPENAI_PATH}", server.uri()))
        .max_attempts(3)
}

const AGRICULTURE_ANSWER: &str =
    "I found 2 agricultural programs available. The top program is: PM-KISAN Income Support";

#[tokio::test]
async fn test_router_retries_openai_server_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(OPENAI_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let config = openai_primary(&server).build();
    let router = FailoverRouter::from_config(
        &config,
        Arc::new(sample_catalog()),
        Arc::new(InMemoryHistory::new()),
    );

    assert_eq!(router.route(&query()).await, Ok(AGRICULTURE_ANSWER.to_string()));
}

#[tokio::test]
async fn test_router_does_not_retry_openai_rejections() {
    for status in [429, 401] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(OPENAI_PATH))
            .respond_with(ResponseTemplate::new(status))
            .expect(1)
            .mount(&server)
            .await;

        let config = openai_primary(&server).build();
        let router = FailoverRouter::from_config(
            &config,
            Arc::new(sample_catalog()),
            Arc::new(InMemoryHistory::new()),
        );

        assert_eq!(router.route(&query()).await, Ok(AGRICULTURE_ANSWER.to_string()));
        server.verify().await;
    }
}

#[tokio::test]
async fn test_route_deadline_from_config_records_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_reply("late"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let config = TestConfigBuilder::new()
        .providers(vec![])
        .provider("Gemini", ProviderKind::Gemini)
        .provider_key("Gemini", "test-key")
        .provider_base_url("Gemini", &server.uri())
        .route_timeout_ms(100)
        .record_failures(true)
        .build();
    let history = Arc::new(InMemoryHistory::new());
    let router = FailoverRouter::from_config(&config, Arc::new(sample_catalog()), history.clone());

    assert_eq!(
        router.route(&query()).await,
        Err(RouteError::DeadlineExceeded(Duration::from_millis(100)))
    );
    let records = history.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].is_answered());
}

#[test_log::test(tokio::test)]
async fn test_router_retries_gemini_then_falls_back_to_rule_based() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let mut gemini = ProviderConfig::new("Gemini", ProviderKind::Gemini);
    gemini.api_key = Some("test-key".to_string());
    gemini.base_url = Some(server.uri());
    gemini.retry = Some(RetryConfig {
        max_attempts: 3,
        backoff_ms: 10,
    });
    let config = TestConfigBuilder::new()
        .providers(vec![
            gemini,
            ProviderConfig::new("OpenAI", ProviderKind::OpenAi),
            ProviderConfig::new("RuleBased", ProviderKind::RuleBased),
        ])
        .build();

    let history = Arc::new(InMemoryHistory::new());
    let router = FailoverRouter::from_config(&config, Arc::new(sample_catalog()), history.clone());

    let answer = router.route(&query()).await.unwrap();
    assert_eq!(answer, AGRICULTURE_ANSWER);

    let records = history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].provider_name.as_deref(), Some("RuleBased"));
}

#[tokio::test]
async fn test_router_uses_gemini_when_healthy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_reply("From Gemini.")))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfigBuilder::new()
        .provider_key("Gemini", "test-key")
        .provider_base_url("Gemini", &server.uri())
        .build();
    let router = FailoverRouter::from_config(
        &config,
        Arc::new(sample_catalog()),
        Arc::new(InMemoryHistory::new()),
    );

    assert_eq!(router.route(&query()).await, Ok("From Gemini.".to_string()));
}
