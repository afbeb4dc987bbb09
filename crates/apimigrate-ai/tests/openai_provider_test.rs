use apimigrate_ai::{
    GenerationConfig, LLMProvider, Message, MigrationAdvisor, OpenAIChatConfig, OpenAIChatProvider,
};
use mockito::{Matcher, Server};
use serde_json::json;
use std::sync::Arc;

fn completion(content: &str) -> String {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gpt-4o-2024-08-06",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
    })
    .to_string()
}

fn provider_for(server: &Server, retries: u32) -> OpenAIChatProvider {
    OpenAIChatProvider::new(
        OpenAIChatConfig::new("sk-test")
            .with_base_url(server.url())
            .with_max_retries(retries),
    )
    .unwrap()
}

#[tokio::test]
async fn sends_bearer_auth_and_parses_completion() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o",
            "max_tokens": 2000,
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hello"}
            ]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion("hi there"))
        .create_async()
        .await;

    let provider = provider_for(&server, 0);
    let response = provider
        .generate_chat(
            &[Message::system("be brief"), Message::user("hello")],
            &GenerationConfig::default(),
        )
        .await
        .unwrap();

    assert_eq!(response.content, "hi there");
    assert_eq!(response.total_tokens, Some(20));
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    assert_eq!(response.model, "gpt-4o-2024-08-06");
    mock.assert_async().await;
}

#[tokio::test]
async fn api_errors_surface_status_and_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error":{"message":"Incorrect API key"}}"#)
        .expect(1)
        .create_async()
        .await;

    let err = provider_for(&server, 0)
        .generate_chat(&[Message::user("hello")], &GenerationConfig::default())
        .await
        .unwrap_err()
        .to_string();
    assert!(err.contains("401"), "{}", err);
    assert!(err.contains("Incorrect API key"), "{}", err);
    mock.assert_async().await;
}

#[tokio::test]
async fn retries_before_giving_up() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/chat/completions")
        .with_status(503)
        .expect(2)
        .create_async()
        .await;

    assert!(provider_for(&server, 1)
        .generate_chat(&[Message::user("hello")], &GenerationConfig::default())
        .await
        .is_err());
    mock.assert_async().await;
}

#[tokio::test]
async fn advisor_scores_through_openai() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(completion(
            r#"{"complexity_score": 72, "migration_effort": "3 days", "recommendations": "Port the JavaScript policies."}"#,
        ))
        .create_async()
        .await;

    let provider: Arc<dyn LLMProvider> = Arc::new(provider_for(&server, 0));
    let advisor = MigrationAdvisor::new(Some(provider));
    assert!(advisor.is_enabled());
    assert_eq!(advisor.provider_name(), Some("openai"));

    let assessment = advisor
        .analyze_proxy("<APIProxy name=\"a\"/>", &["JavaScript".to_string()])
        .await;
    assert_eq!(assessment.complexity_score, Some(72.0));
    assert_eq!(assessment.migration_effort.as_deref(), Some("3 days"));
    assert_eq!(assessment.recommendations, "Port the JavaScript policies.");
}
