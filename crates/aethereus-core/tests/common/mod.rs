#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use aethereus_core::ChatSession;
use aethereus_core::api::{ApiClient, ByteStream, ChatRequest, ChatTransport};
use aethereus_core::error::{ApiError, ApiResult};
use aethereus_core::repositories::{ConversationStore, InMemoryStore};
use bytes::Bytes;
use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream;

/// One step of a scripted response body
#[derive(Clone, Debug)]
pub enum Step {
    Data(&'static str),
    /// Transport error while reading the body
    Fail,
}

/// In-process stand-in for the streaming endpoint
#[derive(Clone, Default)]
pub struct FakeTransport {
    steps: Vec<Step>,
    reject: bool,
    hang_after_steps: bool,
    pub requests: Arc<Mutex<Vec<(ChatRequest, Option<String>)>>>,
}

impl FakeTransport {
    pub fn replying(steps: Vec<Step>) -> Self {
        Self {
            steps,
            ..Self::default()
        }
    }

    /// Responds with HTTP 500 before any body
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    /// Plays `steps`, then never finishes
    pub fn hanging(steps: Vec<Step>) -> Self {
        Self {
            steps,
            hang_after_steps: true,
            ..Self::default()
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> (ChatRequest, Option<String>) {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

impl ChatTransport for FakeTransport {
    fn open_stream(
        &self,
        request: ChatRequest,
        token: Option<String>,
    ) -> BoxFuture<'static, ApiResult<ByteStream>> {
        self.requests.lock().unwrap().push((request, token));
        let steps = self.steps.clone();
        let reject = self.reject;
        let hang = self.hang_after_steps;

        Box::pin(async move {
            if reject {
                return Err(ApiError::Status {
                    status: 500,
                    message: None,
                });
            }

            let items = steps.into_iter().map(|step| match step {
                Step::Data(text) => Ok(Bytes::from_static(text.as_bytes())),
                Step::Fail => Err(ApiError::Status {
                    status: 502,
                    message: None,
                }),
            });
            let body = stream::iter(items);
            if hang {
                Ok(body.chain(stream::pending()).boxed())
            } else {
                Ok(body.boxed())
            }
        })
    }
}

/// Client pointing at `base_url`; tests that never hit HTTP use an unroutable port
pub fn client(base_url: &str) -> ApiClient {
    ApiClient::new(base_url, Duration::from_secs(5)).unwrap()
}

/// Anonymous session backed by an in-memory local store
pub fn anonymous_session(transport: &FakeTransport, model: &str) -> ChatSession {
    let client = client("http://127.0.0.1:9");
    let store = ConversationStore::new(client.clone(), Arc::new(InMemoryStore::new()));
    ChatSession::new(client, store)
        .with_transport(Arc::new(transport.clone()))
        .with_models(model, "imagen")
}
