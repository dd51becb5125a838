//! Wire envelope: the self-describing record that flows over every channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of message an envelope carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Broadcast,
    Cast,
    Request,
    Response,
    BidOpen,
    BidSubmit,
    BidAward,
    GroupMsg,
}

/// Reserved topic used for request/response replies.
pub const RESPONSE_TOPIC: &str = "__response__";

/// Reserved topic used for the liveness probe (see DESIGN.md open question).
pub const ALIVE_TOPIC: &str = "__alive__";

/// The wire-format record wrapping every message (spec.md §6).
///
/// `seq` is a local diagnostic field only; readers must tolerate and
/// ignore fields they don't understand (forward-compatibility), so it
/// is not part of the bit-exact contract beyond that tolerance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: Kind,
    pub topic: String,
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl Envelope {
    pub fn new(kind: Kind, topic: impl Into<String>, from: impl Into<String>, payload: Value) -> Self {
        Self {
            kind,
            topic: topic.into(),
            from: from.into(),
            to: String::new(),
            correlation_id: None,
            payload,
            deadline_ms: None,
            seq: None,
        }
    }

    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = to.into();
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn deadline_ms(mut self, ms: u64) -> Self {
        self.deadline_ms = Some(ms);
        self
    }

    pub fn seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Metadata handed to every handler alongside the decoded payload.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub from: String,
    pub topic: String,
    pub correlation_id: Option<String>,
}

impl Metadata {
    pub fn from_envelope(env: &Envelope) -> Self {
        Self {
            from: env.from.clone(),
            topic: env.topic.clone(),
            correlation_id: env.correlation_id.clone(),
        }
    }
}

/// Structured error payload placed on the wire when a request handler fails
/// (spec.md §9: "Exception-as-response").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(rename = "__error__")]
    pub kind: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Detect whether a decoded response payload is actually an error payload.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let kind = obj.get("__error__")?.as_str()?.to_string();
        let message = obj
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Some(Self { kind, message })
    }
}
