/// Lifecycle of one request/response exchange.
///
/// `Idle -> Submitting -> Streaming -> (Completed | Failed | Cancelled) -> Idle`.
/// Image generation skips `Streaming`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExchangeState {
    #[default]
    Idle,
    /// Request built, waiting for the token and response headers
    Submitting,
    /// Response body is being read
    Streaming,
    Completed,
    Failed,
    /// The reader stopped because its consumer went away
    Cancelled,
}

impl ExchangeState {
    /// Whether a spinner should be shown. Derived, never stored.
    pub fn is_loading(self) -> bool {
        matches!(self, Self::Submitting | Self::Streaming)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn can_transition_to(self, next: ExchangeState) -> bool {
        use ExchangeState::*;
        matches!(
            (self, next),
            (Idle, Submitting)
                | (Submitting, Streaming)
                | (Submitting, Completed)
                | (Submitting, Failed)
                | (Submitting, Cancelled)
                | (Streaming, Completed)
                | (Streaming, Failed)
                | (Streaming, Cancelled)
                | (Completed, Idle)
                | (Failed, Idle)
                | (Cancelled, Idle)
        )
    }
}

/// How a `send_message` or `generate_image` call ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// Nothing to send; no message appended and no request issued
    Skipped,
    Completed,
    /// The assistant slot holds an error text
    Failed,
    Cancelled,
}
