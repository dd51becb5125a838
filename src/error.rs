//! Structured error types, one enum per component concern, following
//! `mylm-core`'s `thiserror`-derived `MylmError` texture: named variants
//! with owned fields and a `#[error("...")]` message per variant.

use thiserror::Error;

use crate::envelope::ErrorPayload;

/// Errors raised by the transport adapter (C1).
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("publish to {channel} failed: {reason}")]
    Publish { channel: String, reason: String },

    #[error("subscribe to {pattern} failed: {reason}")]
    Subscribe { pattern: String, reason: String },

    #[error("key/value operation {op} on {key} failed: {reason}")]
    Kv {
        op: &'static str,
        key: String,
        reason: String,
    },

    #[error("transport is shutting down")]
    Shutdown,
}

impl TransportError {
    /// Whether a caller might reasonably retry this operation. The core
    /// never retries automatically (spec.md §4.1); this is advisory for
    /// callers that want to implement their own retry policy.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Shutdown)
    }
}

/// Outcome of a `request`/`map` call (spec.md §4.5, §7). This is a result
/// type, not a `std::error::Error` — a `Timeout` is an expected, common
/// outcome, not an exceptional one. `TransportFailure` is the exception:
/// spec.md §7 requires publish errors to be "returned to the caller
/// synchronously" rather than folded into a `Timeout` once the deadline
/// passes, so a failed publish for one target surfaces here instead of
/// being discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    Timeout,
    Shutdown,
    HandlerError { kind: String, message: String },
    TransportFailure { reason: String },
}

impl RequestOutcome {
    pub fn from_error_payload(payload: &ErrorPayload) -> Self {
        RequestOutcome::HandlerError {
            kind: payload.kind.clone(),
            message: payload.message.clone(),
        }
    }
}

impl std::fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestOutcome::Timeout => write!(f, "request timed out"),
            RequestOutcome::Shutdown => write!(f, "client is shutting down"),
            RequestOutcome::HandlerError { kind, message } => {
                write!(f, "handler error ({kind}): {message}")
            }
            RequestOutcome::TransportFailure { reason } => {
                write!(f, "transport failure: {reason}")
            }
        }
    }
}

/// Raised by `group_broadcast` when no group is active (C7).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("not a member of any group")]
pub struct NotInGroup;

/// Raised by the registry façade (C8).
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    #[error("registry key missing: {key}")]
    Missing { key: String },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Top-level error for operations that can fail in more than one way.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("not a member of any group")]
    NotInGroup,

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("client is shutting down")]
    Shutdown,
}

impl From<NotInGroup> for ClientError {
    fn from(_: NotInGroup) -> Self {
        ClientError::NotInGroup
    }
}
