use crate::api::ImageRequest;
use crate::error::ApiError;

/// Assistant text shown while an image is being generated
pub const IMAGE_PLACEHOLDER: &str = "Generating image...";

/// Shown when generation fails and the server gave no message
pub const IMAGE_FAILURE_MESSAGE: &str = "Sorry, I encountered an error while generating the image.";

/// Shown when generation is attempted without a signed-in user
pub const IMAGE_AUTH_REQUIRED_MESSAGE: &str = "Please sign in to generate images.";

pub fn build_image_request(prompt: &str, model: &str, conversation_id: Option<i64>) -> ImageRequest {
    ImageRequest {
        prompt: prompt.to_string(),
        model: model.to_string(),
        conversation_id: conversation_id.filter(|id| *id != 0),
    }
}

/// Markdown that renders the generated image inline
pub fn image_markdown(prompt: &str, image_url: &str) -> String {
    format!("![Image generated from prompt: {}]({})", prompt, image_url)
}

/// Text for the assistant slot after a failed generation
pub fn image_failure_text(error: &ApiError) -> String {
    if matches!(error, ApiError::AuthRequired) {
        return IMAGE_AUTH_REQUIRED_MESSAGE.to_string();
    }
    error
        .server_message()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(IMAGE_FAILURE_MESSAGE)
        .to_string()
}
