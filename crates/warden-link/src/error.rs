//! Link runtime errors.
//!
//! Two error types exist at this layer:
//!
//! - [`LinkError`]: what link operations (`send_request`,
//!   `send_event`, attach, dispatch) return to their caller.
//! - [`HandlerError`]: what message handlers return. The dispatch
//!   layer maps it to the wire: a [`HandlerError::Request`] becomes
//!   `{seq, error}` with the given message, while a
//!   [`HandlerError::Internal`] is logged in full locally and only a
//!   generic string crosses the wire.
//!
//! All errors implement [`ErrorCode`].
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`LinkError::InvalidPayload`] | `LINK_INVALID_PAYLOAD` | No |
//! | [`LinkError::WrongDirection`] | `LINK_WRONG_DIRECTION` | No |
//! | [`LinkError::DuplicateHandler`] | `LINK_DUPLICATE_HANDLER` | No |
//! | [`LinkError::MissingHandler`] | `LINK_MISSING_HANDLER` | No |
//! | [`LinkError::Request`] | `LINK_REQUEST` | No |
//! | [`LinkError::Closed`] | `LINK_CLOSED` | Yes |
//! | [`LinkError::Disconnected`] | `LINK_DISCONNECTED` | Yes |
//! | [`LinkError::Timeout`] | `LINK_TIMEOUT` | Yes |
//! | [`LinkError::Internal`] | `LINK_INTERNAL` | No |

use thiserror::Error;
use warden_proto::SchemaViolation;
use warden_types::{ErrorCode, Role};

/// Error returned by link operations.
#[derive(Debug, Clone, Error)]
pub enum LinkError {
    /// An outbound payload failed its declared schema. This is a
    /// local programming error; nothing was transmitted.
    #[error("invalid {message} payload: {}", format_violations(.violations))]
    InvalidPayload {
        /// Catalog name of the message.
        message: String,
        /// Every violation the validator found.
        violations: Vec<SchemaViolation>,
    },

    /// The message is not declared to originate on this link.
    #[error("{message} cannot be sent on the {source_role}-{target} link")]
    WrongDirection {
        /// Catalog name of the message.
        message: String,
        /// This side's role.
        source_role: Role,
        /// The peer's role.
        target: Role,
    },

    /// A handler or validator was registered twice for one type.
    #[error("handler already registered for {0}")]
    DuplicateHandler(String),

    /// A target link lacks a required handler. Fatal at attach time.
    #[error("missing handler for {message} on the {source_role}-{target} link")]
    MissingHandler {
        /// Catalog name of the message.
        message: String,
        /// This side's role.
        source_role: Role,
        /// The peer's role.
        target: Role,
    },

    /// The peer refused the request with a user-visible error, or a
    /// forwarder could not reach the destination.
    #[error("{0}")]
    Request(String),

    /// The connector is closed; nothing can be sent.
    #[error("link is closed")]
    Closed,

    /// The transport closed while the request was pending.
    #[error("request failed: link disconnected")]
    Disconnected,

    /// No response arrived within the configured timeout.
    #[error("timed out waiting for {message} response")]
    Timeout {
        /// Catalog name of the message.
        message: String,
    },

    /// Internal dispatch failure.
    #[error("internal link error: {0}")]
    Internal(String),
}

fn format_violations(violations: &[SchemaViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ErrorCode for LinkError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidPayload { .. } => "LINK_INVALID_PAYLOAD",
            Self::WrongDirection { .. } => "LINK_WRONG_DIRECTION",
            Self::DuplicateHandler(_) => "LINK_DUPLICATE_HANDLER",
            Self::MissingHandler { .. } => "LINK_MISSING_HANDLER",
            Self::Request(_) => "LINK_REQUEST",
            Self::Closed => "LINK_CLOSED",
            Self::Disconnected => "LINK_DISCONNECTED",
            Self::Timeout { .. } => "LINK_TIMEOUT",
            Self::Internal(_) => "LINK_INTERNAL",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Closed | Self::Disconnected | Self::Timeout { .. })
    }
}

/// Error returned by a message handler.
///
/// The distinction decides what crosses the wire: request errors are
/// surfaced verbatim to the caller, internal errors are not.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// Application-level refusal meant for the caller's eyes:
    /// permission denial, not-found, bad arguments.
    #[error("{0}")]
    Request(String),

    /// Anything else that went wrong. Logged in full locally; the
    /// caller sees only a generic message.
    #[error("internal handler error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Shorthand for a user-visible refusal.
    #[must_use]
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request(message.into())
    }

    /// Shorthand for an internal fault.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl ErrorCode for HandlerError {
    fn code(&self) -> &'static str {
        match self {
            Self::Request(_) => "LINK_HANDLER_REQUEST",
            Self::Internal(_) => "LINK_HANDLER_INTERNAL",
        }
    }

    fn is_recoverable(&self) -> bool {
        // The caller may fix its arguments and retry
        matches!(self, Self::Request(_))
    }
}
