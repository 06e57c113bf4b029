pub mod client;
pub mod dto;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::error::ApiResult;

pub use client::{ApiClient, UploadFile};
pub use dto::{ChatRequest, ImageRequest, MessageDto};

/// Raw response body of a streaming request
pub type ByteStream = BoxStream<'static, ApiResult<Bytes>>;

/// Opens the chat stream for one exchange.
///
/// The returned future resolves once response headers arrived; a
/// non-success status fails it before any body bytes are read.
pub trait ChatTransport: Send + Sync + 'static {
    fn open_stream(
        &self,
        request: ChatRequest,
        token: Option<String>,
    ) -> BoxFuture<'static, ApiResult<ByteStream>>;
}
