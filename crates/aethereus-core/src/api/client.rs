use std::time::Duration;

use futures::StreamExt;
use futures::future::BoxFuture;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::dto::{ChatRequest, ConversationDetailDto, ErrorBody, ImageRequest, UploadResponse};
use super::{ByteStream, ChatTransport};
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::{Conversation, ConversationDetail, GeneratedImage};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A file picked by the user, ready to be uploaded
#[derive(Clone, Debug)]
pub struct UploadFile {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// HTTP client for the Aethereus backend.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// `read_timeout` bounds the gap between body reads, not the whole
    /// response, so long replies can keep streaming.
    pub fn new(base_url: impl Into<String>, read_timeout: Duration) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(read_timeout)
            .build()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &ClientConfig) -> ApiResult<Self> {
        Self::new(config.api_base_url.clone(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(builder: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Map a non-success status to `ApiError::Status`, keeping the server's
    /// `message` field when the error body is JSON
    async fn check_status(response: Response) -> ApiResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .text()
            .await
            .ok()
            .and_then(|body| serde_json::from_str::<ErrorBody>(&body).ok())
            .and_then(|body| body.message);

        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> ApiResult<T> {
        let response = Self::check_status(builder.send().await?).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `GET /api/conversations`
    pub async fn list_conversations(&self, token: &str) -> ApiResult<Vec<Conversation>> {
        let request = self.http.get(self.url("/api/conversations")).bearer_auth(token);
        Self::send_json(request).await
    }

    /// `GET /api/conversations/{id}`
    pub async fn get_conversation(&self, id: i64, token: &str) -> ApiResult<ConversationDetail> {
        let request = self
            .http
            .get(self.url(&format!("/api/conversations/{}", id)))
            .bearer_auth(token);
        let detail: ConversationDetailDto = Self::send_json(request).await?;
        Ok(detail.into())
    }

    /// `DELETE /api/conversations/{id}`
    pub async fn delete_conversation(&self, id: i64, token: &str) -> ApiResult<()> {
        let request = self
            .http
            .delete(self.url(&format!("/api/conversations/{}", id)))
            .bearer_auth(token);
        Self::check_status(request.send().await?).await?;
        Ok(())
    }

    /// `POST /api/images/generate`
    pub async fn generate_image(
        &self,
        request: &ImageRequest,
        token: &str,
    ) -> ApiResult<GeneratedImage> {
        let builder = self
            .http
            .post(self.url("/api/images/generate"))
            .bearer_auth(token)
            .json(request);
        let mut image: GeneratedImage = Self::send_json(builder).await?;
        if image.prompt.is_empty() {
            image.prompt = request.prompt.clone();
        }
        Ok(image)
    }

    /// `GET /api/images/my-images`
    pub async fn list_images(&self, token: &str) -> ApiResult<Vec<GeneratedImage>> {
        let request = self
            .http
            .get(self.url("/api/images/my-images"))
            .bearer_auth(token);
        Self::send_json(request).await
    }

    /// `POST /api/upload/image`; returns the stored file's URL
    pub async fn upload_image(&self, file: UploadFile, token: Option<&str>) -> ApiResult<String> {
        let size = file.data.len();
        let part = reqwest::multipart::Part::bytes(file.data)
            .file_name(file.file_name)
            .mime_str(&file.mime_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let request = Self::authorize(self.http.post(self.url("/api/upload/image")), token)
            .multipart(form);
        let response: UploadResponse = Self::send_json(request).await?;

        debug!(bytes = size, url = %response.image_url, "File uploaded");
        Ok(response.image_url)
    }

    /// `POST /api/conversations/{id}/messages/stream`
    pub async fn open_chat_stream(
        &self,
        request: &ChatRequest,
        token: Option<&str>,
    ) -> ApiResult<ByteStream> {
        let url = self.url(&format!(
            "/api/conversations/{}/messages/stream",
            request.conversation_id
        ));
        let builder = Self::authorize(self.http.post(url), token).json(request);

        let response = Self::check_status(builder.send().await?).await?;
        info!(
            conversation_id = request.conversation_id,
            model = %request.ai_model,
            "Chat stream opened"
        );

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ApiError::from))
            .boxed())
    }
}

impl ChatTransport for ApiClient {
    fn open_stream(
        &self,
        request: ChatRequest,
        token: Option<String>,
    ) -> BoxFuture<'static, ApiResult<ByteStream>> {
        let client = self.clone();
        Box::pin(async move { client.open_chat_stream(&request, token.as_deref()).await })
    }
}
