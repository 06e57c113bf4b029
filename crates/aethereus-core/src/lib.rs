//! Client core of the Aethereus chat application: the streaming chat
//! pipeline, the markdown formatter, and conversation storage for signed-in
//! and anonymous users.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod formatter;
pub mod models;
pub mod repositories;
pub mod services;
pub mod session;

pub use config::ClientConfig;
pub use error::{ApiError, ApiResult, ConfigError};
pub use formatter::format_message_content;
pub use session::{ChatSession, ExchangeOutcome, ExchangeState, SessionEvent};
