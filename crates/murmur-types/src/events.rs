use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Live event names. The same name is used client -> server and server -> client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "incoming message")]
    IncomingMessage,
    #[serde(rename = "typing")]
    Typing,
}

/// A frame on the live socket: `{"event": "...", "data": <payload>}`.
///
/// `data` is kept as raw JSON text so the hub relays exactly the bytes the
/// sender produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveEvent {
    pub event: EventKind,
    pub data: Box<RawValue>,
}

impl LiveEvent {
    pub fn new(event: EventKind, data: Box<RawValue>) -> Self {
        Self { event, data }
    }

    /// Build a `typing` event for a display name.
    pub fn typing(display_name: &str) -> serde_json::Result<Self> {
        let data = serde_json::value::to_raw_value(display_name)?;
        Ok(Self::new(EventKind::Typing, data))
    }

    /// The raw payload text.
    pub fn payload(&self) -> &str {
        self.data.get()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// The part of an `incoming message` payload the server cares about.
/// Every other field is application-defined and passed through untouched.
#[derive(Debug, Deserialize)]
pub struct MessagePayload {
    pub body: String,
}

impl MessagePayload {
    pub fn from_event(event: &LiveEvent) -> serde_json::Result<Self> {
        serde_json::from_str(event.payload())
    }
}
