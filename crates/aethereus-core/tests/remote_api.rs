mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;

use aethereus_core::api::{ApiClient, UploadFile};
use aethereus_core::auth::{IssuedToken, TokenCache, TokenSource};
use aethereus_core::error::ApiError;
use aethereus_core::models::{ConversationId, MessageKind, Role};
use aethereus_core::repositories::{
    ConversationRepository, ConversationStore, InMemoryStore, RemoteConversationRepository,
};
use aethereus_core::{ChatSession, ExchangeOutcome};
use futures::future::BoxFuture;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn signed_in_session(server: &MockServer) -> ChatSession {
    let client = common::client(&server.uri());
    let mut store = ConversationStore::new(client.clone(), Arc::new(InMemoryStore::new()));
    store.set_identity(Some(TokenCache::from_static("tok")));
    ChatSession::new(client, store).with_models("openai", "imagen")
}

fn upload_file() -> UploadFile {
    UploadFile {
        file_name: "photo.png".to_string(),
        mime_type: "image/png".to_string(),
        data: vec![0x89, 0x50, 0x4E, 0x47],
    }
}

#[tokio::test]
async fn list_get_and_delete_conversations() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/conversations"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 2, "title": "Second", "aiModel": "claude",
             "createdAt": "2024-05-01T10:00:00", "updatedAt": "2024-05-02T10:00:00"},
            {"id": 1, "title": "First", "aiModel": "openai",
             "createdAt": "2024-04-01T10:00:00", "updatedAt": "2024-04-01T10:00:00"}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/conversations/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "conversation": {"id": 2, "title": "Second", "aiModel": "claude"},
            "messages": [
                {"id": 10, "type": "USER", "content": "draw a cat"},
                {"id": 11, "type": "ASSISTANT", "messageType": "IMAGE",
                 "content": "![Image generated from prompt: draw a cat](https://img/cat.png)",
                 "imageUrl": "https://img/cat.png"}
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/conversations/2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = signed_in_session(&server);

    session.load_conversations().await.unwrap();
    let list = session.conversations().list_all();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].id, ConversationId::Remote(2));
    assert_eq!(list[1].title, "First");

    let id = ConversationId::Remote(2);
    assert!(session.select_conversation(&id).await.unwrap());
    assert_eq!(session.messages().len(), 2);
    assert_eq!(session.messages()[0].role, Role::User);
    assert_eq!(session.messages()[1].kind, MessageKind::Image);

    session.delete_conversation(&id).await.unwrap();
    assert!(session.active_conversation().is_none());
    assert!(session.messages().is_empty());
    assert_eq!(session.conversations().count(), 1);
}

#[tokio::test]
async fn missing_remote_conversation_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/conversations/99"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let mut session = signed_in_session(&server);
    assert!(!session.select_conversation(&ConversationId::Remote(99)).await.unwrap());
}

#[tokio::test]
async fn error_body_message_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/images/my-images"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"message": "Quota exceeded"})),
        )
        .mount(&server)
        .await;

    let client = common::client(&server.uri());
    let err = client.list_images("tok").await.unwrap_err();

    assert!(matches!(err, ApiError::Status { status: 403, .. }));
    assert_eq!(err.server_message(), Some("Quota exceeded"));
}

#[tokio::test]
async fn new_remote_conversation_from_stream() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/conversations/0/messages/stream"))
        .and(header("authorization", "Bearer tok"))
        .and(body_json(json!({"content": "What is Rust?", "aiModel": "openai"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("data:{\"conversationId\":42}\ndata:A systems\ndata: language\n"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 42, "title": "What is Rust?", "aiModel": "openai"}
        ])))
        .mount(&server)
        .await;

    let mut session = signed_in_session(&server);
    let outcome = session.send_message("What is Rust?", None).await;

    assert_eq!(outcome, ExchangeOutcome::Completed);
    assert_eq!(session.messages()[1].content, "A systems language");
    assert_eq!(
        session.active_conversation().unwrap().id,
        ConversationId::Remote(42)
    );
    assert_eq!(session.conversations().count(), 1);
}

#[tokio::test]
async fn follow_up_uses_active_conversation_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/conversations/0/messages/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data:{\"conversationId\":7}\ndata:one\n"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/conversations/7/messages/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data:{\"conversationId\":8}\n"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let mut session = signed_in_session(&server);
    session.send_message("first", None).await;
    session.send_message("second", None).await;

    // A known conversation never parses control envelopes
    assert_eq!(session.messages()[3].content, "{\"conversationId\":8}");
}

#[tokio::test]
async fn server_error_status_becomes_apology() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/conversations/0/messages/stream"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let mut session = signed_in_session(&server);
    let outcome = session.send_message("hello", None).await;

    assert_eq!(outcome, ExchangeOutcome::Failed);
    assert_eq!(
        session.messages()[1].content,
        aethereus_core::session::CHAT_ERROR_MESSAGE
    );
}

#[tokio::test]
async fn uploaded_file_is_attached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload/image"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"imageUrl": "https://cdn/photo.png"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/conversations/0/messages/stream"))
        .and(body_json(json!({
            "content": "What is this?",
            "aiModel": "openai",
            "imageUrl": "https://cdn/photo.png"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("data:A photo\n"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let mut session = signed_in_session(&server);
    let outcome = session.send_with_file("What is this?", upload_file()).await;

    assert_eq!(outcome, ExchangeOutcome::Completed);
    assert_eq!(
        session.messages()[0].attachment_url.as_deref(),
        Some("https://cdn/photo.png")
    );
}

#[tokio::test]
async fn failed_upload_still_sends_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/upload/image"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/conversations/0/messages/stream"))
        .and(body_json(json!({"content": "What is this?", "aiModel": "openai"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("data:No file\n"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let mut session = signed_in_session(&server);
    let outcome = session.send_with_file("What is this?", upload_file()).await;

    assert_eq!(outcome, ExchangeOutcome::Completed);
    assert_eq!(session.messages()[0].attachment_url, None);
    assert_eq!(session.messages()[1].content, "No file");
}

#[tokio::test]
async fn image_generation_links_conversation_and_gallery() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/images/generate"))
        .and(header("authorization", "Bearer tok"))
        .and(body_json(json!({"prompt": "a red fox", "model": "imagen"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 5,
            "imageUrl": "https://img/fox.png",
            "conversationId": 7
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 7, "title": "a red fox", "aiModel": "imagen"}
        ])))
        .mount(&server)
        .await;

    let mut session = signed_in_session(&server);
    let outcome = session.generate_image("a red fox").await;

    assert_eq!(outcome, ExchangeOutcome::Completed);
    let reply = &session.messages()[1];
    assert_eq!(reply.kind, MessageKind::Image);
    assert_eq!(
        reply.content,
        "![Image generated from prompt: a red fox](https://img/fox.png)"
    );

    assert_eq!(session.gallery().len(), 1);
    assert_eq!(session.gallery()[0].prompt, "a red fox");
    assert_eq!(
        session.active_conversation().unwrap().id,
        ConversationId::Remote(7)
    );

    session.set_identity(None);
    assert!(session.gallery().is_empty());
}

#[tokio::test]
async fn image_failure_shows_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/images/generate"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"message": "Prompt rejected"})),
        )
        .mount(&server)
        .await;

    let mut session = signed_in_session(&server);
    let outcome = session.generate_image("something").await;

    assert_eq!(outcome, ExchangeOutcome::Failed);
    assert_eq!(session.messages()[1].content, "Prompt rejected");
    assert!(session.gallery().is_empty());
}

#[tokio::test]
async fn gallery_maps_content_to_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/images/my-images"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "imageUrl": "https://img/1.png", "content": "a lighthouse",
             "createdAt": "2024-02-02T08:00:00"}
        ])))
        .mount(&server)
        .await;

    let mut session = signed_in_session(&server);
    session.load_images().await.unwrap();

    assert_eq!(session.gallery().len(), 1);
    assert_eq!(session.gallery()[0].prompt, "a lighthouse");
}

/// Issues `token-1`, `token-2`, ... on each fetch
struct RotatingSource {
    calls: AtomicUsize,
}

impl TokenSource for RotatingSource {
    fn fetch_token(&self) -> BoxFuture<'static, anyhow::Result<IssuedToken>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Box::pin(async move {
            Ok(IssuedToken {
                token: format!("token-{}", n),
                expires_at: Some(SystemTime::now() + std::time::Duration::from_secs(3600)),
            })
        })
    }
}

#[tokio::test]
async fn rejected_token_is_refreshed_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/conversations"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/conversations"))
        .and(header("authorization", "Bearer token-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 3, "title": "Recovered", "aiModel": "claude"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = TokenCache::new(Arc::new(RotatingSource {
        calls: AtomicUsize::new(0),
    }));
    let client: ApiClient = common::client(&server.uri());
    let remote = RemoteConversationRepository::new(client, tokens);

    let list = remote.list().await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].title, "Recovered");
}
