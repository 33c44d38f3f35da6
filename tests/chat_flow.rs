use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value as JsonValue};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chat_gateway::error::ServiceError;
use chat_gateway::history::{HistoryStore, MemoryHistoryStore};
use chat_gateway::llm::{GenerationOptions, LlmClient, LlmConfig};
use chat_gateway::models::chat::{ChatRequest, FinishReason, MessageRole};
use chat_gateway::service::ChatService;

const MODEL: &str = "gpt-oss:latest";

fn test_config(base_url: &str) -> LlmConfig {
    LlmConfig {
        timeout: Duration::from_secs(5),
        ..LlmConfig::default()
    }
    .with_base_url(base_url)
    .expect("valid base url")
}

fn test_client(base_url: &str) -> LlmClient {
    LlmClient::new(test_config(base_url)).expect("client builds")
}

fn test_service(base_url: &str) -> (ChatService, Arc<MemoryHistoryStore>) {
    let history = Arc::new(MemoryHistoryStore::new());
    let client = test_client(base_url);
    (ChatService::new(client, history.clone()), history)
}

async fn mount_healthy_tags(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"models": [{"name": MODEL}, {"name": "llama3:8b"}]})),
        )
        .mount(server)
        .await;
}

fn chat_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": MODEL,
        "message": {"role": "assistant", "content": content},
        "done": true
    }))
}

fn request_with_message(message: &str) -> ChatRequest {
    serde_json::from_value(json!({ "message": message })).expect("valid request")
}

#[tokio::test]
async fn chat_request_produces_single_assistant_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(chat_reply("Hi there!"))
        .mount(&server)
        .await;

    let (service, history) = test_service(&server.uri());
    let response = service
        .process_chat_request(request_with_message("Hello"))
        .await
        .expect("chat succeeds");

    assert_eq!(response.choices.len(), 1);
    let choice = &response.choices[0];
    assert_eq!(choice.message.role, MessageRole::Assistant);
    assert_eq!(choice.message.content, "Hi there!");
    assert_eq!(choice.finish_reason, Some(FinishReason::Stop));
    assert_eq!(choice.index, 0);

    assert!(Uuid::parse_str(&response.id).is_ok());
    assert_eq!(response.metadata.model_name, MODEL);
    assert_eq!(response.metadata.temperature, 0.7);
    assert!(response.metadata.generation_time_ms.is_some());

    // both turns were recorded under the generated conversation id
    let conversation_id = response.conversation_id.expect("conversation id");
    assert!(conversation_id.starts_with("conv_"));
    let recorded = history.history(&conversation_id, 0).await;
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[0].role, MessageRole::User);
    assert_eq!(recorded[1].role, MessageRole::Assistant);
}

#[tokio::test]
async fn chat_request_sends_window_with_ephemeral_system_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(chat_reply("ok"))
        .mount(&server)
        .await;

    let (service, history) = test_service(&server.uri());
    let request: ChatRequest = serde_json::from_value(json!({
        "message": "Hello",
        "conversation_id": "conv_fixed",
        "system_prompt": "You are terse.",
        "max_tokens": 128
    }))
    .expect("valid request");

    service
        .process_chat_request(request)
        .await
        .expect("chat succeeds");

    let requests = server.received_requests().await.expect("recorded requests");
    let body: JsonValue = serde_json::from_slice(&requests[0].body).expect("json body");

    let messages = body["messages"].as_array().expect("messages array");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[0]["content"], "You are terse.");
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["content"], "Hello");
    assert_eq!(body["stream"], false);
    assert_eq!(body["options"]["num_predict"], 128);

    // the system prompt is context for that call only
    let recorded = history.history("conv_fixed", 0).await;
    assert_eq!(recorded.len(), 2);
    assert!(recorded
        .iter()
        .all(|message| message.role != MessageRole::System));
}

#[tokio::test]
async fn chat_window_is_capped_at_ten_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(chat_reply("reply"))
        .mount(&server)
        .await;

    let (service, history) = test_service(&server.uri());
    // 12 prior turns on record; the 13th request must only see the last 10
    for i in 0..12 {
        history
            .append("conv_long", MessageRole::User, &format!("m{i}"))
            .await
            .expect("append");
    }

    let request: ChatRequest = serde_json::from_value(json!({
        "message": "latest",
        "conversation_id": "conv_long"
    }))
    .expect("valid request");
    service
        .process_chat_request(request)
        .await
        .expect("chat succeeds");

    let requests = server.received_requests().await.expect("recorded requests");
    let body: JsonValue = serde_json::from_slice(&requests[0].body).expect("json body");
    let messages = body["messages"].as_array().expect("messages array");
    assert_eq!(messages.len(), 10);
    assert_eq!(messages[9]["content"], "latest");
    assert_eq!(messages[0]["content"], "m3");
}

#[tokio::test]
async fn chat_propagates_transport_errors_without_partial_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (service, history) = test_service(&server.uri());
    let request: ChatRequest = serde_json::from_value(json!({
        "message": "Hello",
        "conversation_id": "conv_err"
    }))
    .expect("valid request");
    let err = service
        .process_chat_request(request)
        .await
        .expect_err("upstream failure propagates");
    assert!(matches!(err, ServiceError::Transport(_)));

    // the user turn was already recorded; no assistant turn follows
    let recorded = history.history("conv_err", 0).await;
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].role, MessageRole::User);
}

#[tokio::test]
async fn chat_rejects_empty_assistant_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(chat_reply(""))
        .mount(&server)
        .await;

    let (service, _history) = test_service(&server.uri());
    let err = service
        .process_chat_request(request_with_message("Hello"))
        .await
        .expect_err("blank reply is rejected");
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn generate_concatenates_ndjson_lines_in_order() {
    let server = MockServer::start().await;
    let body = concat!(
        "{\"response\": \"Hel\", \"done\": false}\n",
        "{\"response\": \"lo \", \"done\": false}\n",
        "not a json line\n",
        "{\"response\": \"world\", \"done\": true}\n",
    );
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(body.as_bytes(), "application/x-ndjson"),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let options = GenerationOptions {
        temperature: 0.7,
        max_tokens: None,
    };
    let text = client
        .generate("say hello", None, &options)
        .await
        .expect("generate succeeds");
    assert_eq!(text, "Hello world");
}

#[tokio::test]
async fn generate_reads_plain_json_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "plain answer",
            "done": true
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let options = GenerationOptions {
        temperature: 0.2,
        max_tokens: Some(64),
    };
    let text = client
        .generate("question", Some("be brief"), &options)
        .await
        .expect("generate succeeds");
    assert_eq!(text, "plain answer");

    let requests = server.received_requests().await.expect("recorded requests");
    let body: JsonValue = serde_json::from_slice(&requests[0].body).expect("json body");
    assert_eq!(body["system"], "be brief");
    assert_eq!(body["options"]["num_predict"], 64);
}

#[tokio::test]
async fn generate_maps_undecodable_body_to_format_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("nonsense".as_bytes(), "application/json"),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let options = GenerationOptions {
        temperature: 0.7,
        max_tokens: None,
    };
    let err = client
        .generate("question", None, &options)
        .await
        .expect_err("undecodable body fails");
    assert!(matches!(err, ServiceError::Format(_)));
}

#[tokio::test]
async fn health_check_is_true_only_when_model_is_listed() {
    let server = MockServer::start().await;
    mount_healthy_tags(&server).await;
    assert!(test_client(&server.uri()).health_check().await);

    let other = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"models": [{"name": "llama3:8b"}]})),
        )
        .mount(&other)
        .await;
    assert!(!test_client(&other.uri()).health_check().await);
}

#[tokio::test]
async fn health_check_is_false_when_unreachable() {
    // nothing listens on port 9
    let client = test_client("http://127.0.0.1:9");
    assert!(!client.health_check().await);
}

#[tokio::test]
async fn structured_output_parses_json_replies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "```json\n{\"answer\": 42}\n```"
        })))
        .mount(&server)
        .await;

    let (service, _history) = test_service(&server.uri());
    let value = service
        .structured_output("the answer", &json!({"type": "object"}), None)
        .await
        .expect("structured output succeeds");
    assert_eq!(value, json!({"answer": 42}));
}

#[tokio::test]
async fn structured_output_wraps_unparsable_replies() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "I would rather write prose."
        })))
        .mount(&server)
        .await;

    let (service, _history) = test_service(&server.uri());
    let value = service
        .structured_output("the answer", &json!({"type": "object"}), Some("be strict"))
        .await
        .expect("structured output succeeds");
    assert_eq!(value["parsed"], false);
    assert_eq!(value["raw_response"], "I would rather write prose.");
    assert!(value.get("timestamp").is_some());
}

#[tokio::test]
async fn chat_endpoint_end_to_end_over_http() {
    use axum::body::{to_bytes, Body};
    use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
    use tower::ServiceExt;

    use chat_gateway::server::api::build_router;

    let server = MockServer::start().await;
    mount_healthy_tags(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(chat_reply("routed reply"))
        .mount(&server)
        .await;

    let (service, _history) = test_service(&server.uri());
    let app = build_router(Arc::new(service));

    let request = Request::builder()
        .method("POST")
        .uri("/chat")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({"message": "Hello", "temperature": 0.5}).to_string(),
        ))
        .expect("build request");

    let response = app.oneshot(request).await.expect("router call");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), 1_048_576)
        .await
        .expect("read body");
    let body: JsonValue = serde_json::from_slice(&bytes).expect("parse json");
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["message"]["content"], "routed reply");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["metadata"]["temperature"], 0.5);
}
