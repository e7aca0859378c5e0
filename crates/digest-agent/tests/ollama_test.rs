//! HTTP-level tests for the Ollama backend against a local mock server.

use mockito::{Matcher, Server};
use serde_json::json;

use digest_agent::ollama::OllamaBackend;
use pipeline::{GenerationBackend, GenerationError, GenerationOptions};

const MODEL: &str = "phi3.5:3.8b-mini-instruct-q4_K_M";

fn tags(models: &[&str]) -> String {
    let models: Vec<_> = models
        .iter()
        .map(|m| json!({ "name": m, "model": m }))
        .collect();
    json!({ "models": models }).to_string()
}

#[tokio::test]
async fn chat_sends_prompt_context_and_options() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "model": MODEL,
            "stream": false,
            "messages": [
                { "role": "system", "content": "be brief" },
                { "role": "user", "content": "WORK ITEM CONTEXT" }
            ],
            "options": { "top_k": 40, "num_predict": 2000 }
        })))
        .with_status(200)
        .with_body(
            json!({
                "model": MODEL,
                "message": { "role": "assistant", "content": "**TITLE**: Done" },
                "done": true
            })
            .to_string(),
        )
        .create_async()
        .await;

    let backend = OllamaBackend::new(&server.url(), MODEL).unwrap();
    let options = GenerationOptions {
        top_k: 40,
        num_predict: 2000,
        ..GenerationOptions::default()
    };
    let reply = backend
        .generate("be brief", "WORK ITEM CONTEXT", &options)
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(reply, "**TITLE**: Done");
}

#[tokio::test]
async fn server_error_is_a_backend_error() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(500)
        .with_body("model crashed")
        .create_async()
        .await;

    let backend = OllamaBackend::new(&server.url(), MODEL).unwrap();
    let err = backend
        .generate("p", "c", &GenerationOptions::default())
        .await
        .unwrap_err();

    match err {
        GenerationError::Backend { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "model crashed");
        }
        other => panic!("expected Backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn reply_without_message_is_malformed() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/api/chat")
        .with_status(200)
        .with_body(json!({ "done": true }).to_string())
        .create_async()
        .await;

    let backend = OllamaBackend::new(&server.url(), MODEL).unwrap();
    let err = backend
        .generate("p", "c", &GenerationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::MalformedResponse(_)), "got {err:?}");
}

#[tokio::test]
async fn closed_port_is_unreachable_and_counts_as_connection_issue() {
    let backend = OllamaBackend::new("http://127.0.0.1:9", MODEL).unwrap();
    let err = backend
        .generate("p", "c", &GenerationOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Unreachable(_)), "got {err:?}");
    assert!(err.is_connection_issue());
}

#[tokio::test]
async fn ready_model_is_only_warmed_up() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(tags(&["llama3:latest", MODEL]))
        .create_async()
        .await;
    let pull = server
        .mock("POST", "/api/pull")
        .expect(0)
        .create_async()
        .await;
    let warm_up = server
        .mock("POST", "/api/generate")
        .match_body(Matcher::PartialJson(json!({ "model": MODEL, "stream": false })))
        .with_status(200)
        .with_body(json!({ "response": "Hi there" }).to_string())
        .create_async()
        .await;

    let backend = OllamaBackend::new(&server.url(), MODEL).unwrap();
    backend.ensure_ready().await.unwrap();

    pull.assert_async().await;
    warm_up.assert_async().await;
}

#[tokio::test]
async fn missing_model_is_pulled_first() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(tags(&["mistral:latest"]))
        .create_async()
        .await;
    let pull = server
        .mock("POST", "/api/pull")
        .match_body(Matcher::PartialJson(json!({ "model": "llama3" })))
        .with_status(200)
        .with_body(json!({ "status": "success" }).to_string())
        .create_async()
        .await;
    server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_body(json!({ "response": "Hello" }).to_string())
        .create_async()
        .await;

    let backend = OllamaBackend::new(&server.url(), "llama3").unwrap();
    backend.ensure_ready().await.unwrap();
    pull.assert_async().await;
}

#[tokio::test]
async fn latest_tag_counts_as_listed() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(tags(&["llama3:latest"]))
        .create_async()
        .await;

    let backend = OllamaBackend::new(&server.url(), "llama3").unwrap();
    assert!(backend.is_available().await);

    let other = OllamaBackend::new(&server.url(), "mistral").unwrap();
    assert!(!other.is_available().await);
}

#[tokio::test]
async fn empty_warm_up_means_not_ready() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(tags(&[MODEL]))
        .create_async()
        .await;
    server
        .mock("POST", "/api/generate")
        .with_status(200)
        .with_body(json!({ "response": "   " }).to_string())
        .create_async()
        .await;

    let backend = OllamaBackend::new(&server.url(), MODEL).unwrap();
    let err = backend.ensure_ready().await.unwrap_err();
    assert!(
        matches!(err, GenerationError::ModelNotReady { ref model, .. } if model == MODEL),
        "got {err:?}"
    );
}

#[tokio::test]
async fn failed_pull_means_not_ready() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_body(tags(&[]))
        .create_async()
        .await;
    server
        .mock("POST", "/api/pull")
        .with_status(404)
        .with_body("pull model manifest: file does not exist")
        .create_async()
        .await;

    let backend = OllamaBackend::new(&server.url(), "nope").unwrap();
    let err = backend.ensure_ready().await.unwrap_err();
    match err {
        GenerationError::ModelNotReady { reason, .. } => assert!(reason.contains("pull failed")),
        other => panic!("expected ModelNotReady, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_not_available() {
    let backend = OllamaBackend::new("http://127.0.0.1:9", MODEL).unwrap();
    assert!(!backend.is_available().await);
}
