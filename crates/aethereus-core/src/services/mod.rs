pub mod chat_stream;
pub mod image_service;
pub mod stream_decoder;
pub mod title;
pub mod upload_service;

pub use chat_stream::{ChunkStream, StreamChunk, decode_chat_stream};
pub use image_service::{
    IMAGE_AUTH_REQUIRED_MESSAGE, IMAGE_FAILURE_MESSAGE, IMAGE_PLACEHOLDER, image_markdown,
};
pub use stream_decoder::{DecodedEvent, StreamDecoder};
pub use title::derive_title;
pub use upload_service::read_upload_file;
