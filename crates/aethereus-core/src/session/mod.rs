pub mod cancel_handle;
pub mod chat_session;
pub mod events;
pub mod exchange_state;

pub use cancel_handle::CancelHandle;
pub use chat_session::{CHAT_ERROR_MESSAGE, ChatSession};
pub use events::SessionEvent;
pub use exchange_state::{ExchangeOutcome, ExchangeState};
