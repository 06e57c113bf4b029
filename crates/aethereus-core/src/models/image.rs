use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

/// An image produced by `POST /api/images/generate`, as kept in the gallery.
///
/// `GET /api/images/my-images` names the prompt `content`; it is exposed
/// here as `prompt`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    #[serde(default)]
    pub id: Option<i64>,
    pub image_url: String,
    #[serde(default, alias = "content")]
    pub prompt: String,
    #[serde(default)]
    pub conversation_id: Option<i64>,
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    pub created_at: Option<DateTime<Utc>>,
}
