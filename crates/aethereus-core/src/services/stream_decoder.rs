//! Incremental decoder for the chat stream body.
//!
//! The server writes `data:<payload>` lines. The first payload of a new
//! conversation may be a JSON control envelope `{"conversationId": n}`;
//! every other payload is a content fragment, and an empty payload stands
//! for a newline. The decoder is fed raw body chunks and reports the full
//! accumulated text after every content fragment.

use serde::Deserialize;
use tracing::debug;

/// Marker that prefixes every event line
pub const DATA_PREFIX: &str = "data:";

/// Something the consumer has to act on
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedEvent {
    /// The server created a conversation for this exchange
    ConversationCreated(i64),
    /// Full assistant text received so far
    Content(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ControlEnvelope {
    conversation_id: Option<i64>,
}

pub struct StreamDecoder {
    /// Bytes of a UTF-8 sequence split across chunks
    pending_bytes: Vec<u8>,
    /// Text after the last newline seen
    line_buffer: String,
    accumulated: String,
    expects_envelope: bool,
    envelope_consumed: bool,
}

impl StreamDecoder {
    /// `conversation_id` is the id the request was sent with; 0 means a new
    /// conversation, which is the only case where a control envelope is expected.
    pub fn new(conversation_id: i64) -> Self {
        Self {
            pending_bytes: Vec::new(),
            line_buffer: String::new(),
            accumulated: String::new(),
            expects_envelope: conversation_id == 0,
            envelope_consumed: false,
        }
    }

    /// Feed one body chunk, returning the events of every line it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DecodedEvent> {
        let text = self.decode_utf8(chunk);
        self.line_buffer.push_str(&text);

        let mut events = Vec::new();
        while let Some(newline) = self.line_buffer.find('\n') {
            let line: String = self.line_buffer.drain(..=newline).collect();
            let line = line.trim_end_matches('\n');
            let line = line.strip_suffix('\r').unwrap_or(line);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Full text accumulated so far
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    pub fn envelope_consumed(&self) -> bool {
        self.envelope_consumed
    }

    /// End of stream. An unterminated trailing line is not an event and is dropped.
    pub fn finish(self) -> String {
        if !self.line_buffer.is_empty() || !self.pending_bytes.is_empty() {
            debug!(
                dropped_chars = self.line_buffer.len(),
                dropped_bytes = self.pending_bytes.len(),
                "Discarding unterminated line at end of stream"
            );
        }
        self.accumulated
    }

    /// Decode as much of `pending_bytes + chunk` as possible, holding back an
    /// incomplete trailing sequence. Invalid bytes become U+FFFD.
    fn decode_utf8(&mut self, chunk: &[u8]) -> String {
        self.pending_bytes.extend_from_slice(chunk);
        let bytes = std::mem::take(&mut self.pending_bytes);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    // valid_up_to guarantees this prefix is UTF-8
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Incomplete sequence at the end; wait for more bytes
                            self.pending_bytes = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    fn process_line(&mut self, line: &str) -> Option<DecodedEvent> {
        let payload = line.strip_prefix(DATA_PREFIX)?;

        if self.expects_envelope && !self.envelope_consumed && payload.starts_with('{') {
            match serde_json::from_str::<ControlEnvelope>(payload) {
                Ok(ControlEnvelope {
                    conversation_id: Some(id),
                }) if id != 0 => {
                    debug!(conversation_id = id, "Control envelope consumed");
                    self.envelope_consumed = true;
                    return Some(DecodedEvent::ConversationCreated(id));
                }
                Ok(_) => {
                    debug!("JSON payload without conversation id, treating as content");
                }
                Err(e) => {
                    debug!(error = %e, "Payload is not a control envelope, treating as content");
                }
            }
        }

        if payload.is_empty() {
            self.accumulated.push('\n');
        } else {
            self.accumulated.push_str(payload);
        }
        Some(DecodedEvent::Content(self.accumulated.clone()))
    }
}
