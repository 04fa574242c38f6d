// Conversation endpoint client tests against a mocked HTTP server

use std::time::Duration;
use voice_tutor::conversation::{ConversationClient, HttpConversationClient, FALLBACK_REPLY};
use voice_tutor::error::VoiceError;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> HttpConversationClient {
    HttpConversationClient::new(format!("{}/chat", server.uri()), Duration::from_secs(5))
        .expect("client should build")
}

#[tokio::test]
async fn test_send_returns_solution() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_json(serde_json::json!({ "message": "hola" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "solution": "¡Hola! ¿Qué tal?" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let reply = client_for(&server).await.send("hola").await.unwrap();
    assert_eq!(reply, "¡Hola! ¿Qué tal?");
}

#[tokio::test]
async fn test_server_error_carries_status_and_body() {
    // Scenario C, client side
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model overloaded"))
        .mount(&server)
        .await;

    let err = client_for(&server).await.send("hi").await.unwrap_err();
    assert_eq!(
        err,
        VoiceError::Server {
            status: 500,
            body: "model overloaded".to_string(),
        }
    );
}

#[tokio::test]
async fn test_malformed_body_uses_fallback() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not valid json"))
        .mount(&server)
        .await;

    let reply = client_for(&server).await.send("hi").await.unwrap();
    assert_eq!(reply, FALLBACK_REPLY);
}

#[tokio::test]
async fn test_missing_solution_uses_fallback() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "answer": "wrong key" })))
        .mount(&server)
        .await;

    let reply = client_for(&server).await.send("hi").await.unwrap();
    assert_eq!(reply, "No response received.");
}

#[tokio::test]
async fn test_timeout_is_network_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "solution": "too late" }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = HttpConversationClient::new(
        format!("{}/chat", server.uri()),
        Duration::from_millis(200),
    )
    .unwrap();

    let err = client.send("hi").await.unwrap_err();
    assert!(matches!(err, VoiceError::Network(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    // Nothing listens on port 9 (discard) in the test environment
    let client =
        HttpConversationClient::new("http://127.0.0.1:9/chat", Duration::from_secs(2)).unwrap();

    let err = client.send("hi").await.unwrap_err();
    assert!(matches!(err, VoiceError::Network(_)));
    assert!(!err.is_capability_error());
}
