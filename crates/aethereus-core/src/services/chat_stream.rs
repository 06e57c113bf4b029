use futures::StreamExt;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::stream_decoder::{DecodedEvent, StreamDecoder};
use crate::api::ByteStream;
use crate::error::{ApiError, ApiResult};

/// Updates emitted while an assistant reply streams in
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamChunk {
    /// The server assigned an id to the new conversation
    ConversationCreated(i64),
    /// Full assistant text received so far
    Text(String),
    Done,
}

/// Type alias for decoded chat streams
pub type ChunkStream = BoxStream<'static, ApiResult<StreamChunk>>;

/// Decode a raw chat body into `StreamChunk`s.
///
/// `cancel` is checked at every body read; once it fires the stream yields
/// `ApiError::Cancelled` and stops reading. A transport error ends the
/// stream after being yielded.
pub fn decode_chat_stream(
    mut body: ByteStream,
    conversation_id: i64,
    cancel: CancellationToken,
) -> ChunkStream {
    Box::pin(async_stream::stream! {
        let mut decoder = StreamDecoder::new(conversation_id);
        let mut chunks_read = 0usize;

        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = body.next() => Some(next),
            };

            let Some(next) = read else {
                debug!(conversation_id, chunks_read, "Chat stream cancelled");
                yield Err(ApiError::Cancelled);
                return;
            };

            match next {
                Some(Ok(bytes)) => {
                    chunks_read += 1;
                    debug!(conversation_id, size = bytes.len(), "Chat stream chunk");
                    for event in decoder.feed(&bytes) {
                        match event {
                            DecodedEvent::ConversationCreated(id) => {
                                yield Ok(StreamChunk::ConversationCreated(id));
                            }
                            DecodedEvent::Content(text) => {
                                yield Ok(StreamChunk::Text(text));
                            }
                        }
                    }
                }
                Some(Err(e)) => {
                    yield Err(e);
                    return;
                }
                None => break,
            }
        }

        let text = decoder.finish();
        info!(conversation_id, chunks_read, chars = text.chars().count(), "Chat stream completed");
        yield Ok(StreamChunk::Done);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;

    fn body(chunks: Vec<ApiResult<&'static str>>) -> ByteStream {
        stream::iter(
            chunks
                .into_iter()
                .map(|c| c.map(|s| Bytes::from_static(s.as_bytes()))),
        )
        .boxed()
    }

    async fn collect(stream: ChunkStream) -> Vec<ApiResult<StreamChunk>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_envelope_then_content_then_done() {
        let body = body(vec![
            Ok("data:{\"conversationId\":42}\ndata:Hel"),
            Ok("lo\ndata:\ndata:there\n"),
        ]);
        let items = collect(decode_chat_stream(body, 0, CancellationToken::new())).await;
        let items: Vec<StreamChunk> = items.into_iter().map(|i| i.unwrap()).collect();

        assert_eq!(
            items,
            vec![
                StreamChunk::ConversationCreated(42),
                StreamChunk::Text("Hello".to_string()),
                StreamChunk::Text("Hello\n".to_string()),
                StreamChunk::Text("Hello\nthere".to_string()),
                StreamChunk::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let body = body(vec![
            Ok("data:partial\n"),
            Err(ApiError::Status {
                status: 502,
                message: None,
            }),
            Ok("data:never\n"),
        ]);
        let items = collect(decode_chat_stream(body, 3, CancellationToken::new())).await;

        assert_eq!(items.len(), 2);
        assert!(matches!(items[0], Ok(StreamChunk::Text(ref t)) if t == "partial"));
        assert!(matches!(items[1], Err(ApiError::Status { status: 502, .. })));
    }

    #[tokio::test]
    async fn test_cancelled_before_read() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let body = body(vec![Ok("data:x\n")]);

        let items = collect(decode_chat_stream(body, 1, cancel)).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ApiError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_stops_pending_read() {
        let cancel = CancellationToken::new();
        let body: ByteStream = stream::pending().boxed();
        let mut decoded = decode_chat_stream(body, 1, cancel.clone());

        cancel.cancel();
        let item = decoded.next().await;
        assert!(matches!(item, Some(Err(ApiError::Cancelled))));
        assert!(decoded.next().await.is_none());
    }
}
