//! Wire envelopes.
//!
//! Every value on a link is an [`Envelope`]: a kind-suffixed type
//! name, a sequence number stamped by the sending connector, and a
//! structured payload.
//!
//! ```text
//! Request:  {"type": "ping_request",  "seq": 4, "data": {}}
//! Response: {"type": "ping_response", "seq": 4, "data": {"seq": 4}}
//! Event:    {"type": "log_message_event", "seq": 5, "data": {...}}
//! ```
//!
//! Responses echo the originating request's sequence number at both
//! the envelope level and inside `data.seq`; the inner copy is the
//! correlation key awaiters match on.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Suffix appended to request type names.
pub const REQUEST_SUFFIX: &str = "_request";
/// Suffix appended to response type names.
pub const RESPONSE_SUFFIX: &str = "_response";
/// Suffix appended to event type names.
pub const EVENT_SUFFIX: &str = "_event";

/// The kind of an envelope, derived from its type-name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Correlated request; expects a response with the same seq.
    Request,
    /// Answer to a request; carries the request's seq in `data.seq`.
    Response,
    /// One-way notification.
    Event,
}

/// Returns the wire type of a request message, e.g. `ping_request`.
#[must_use]
pub fn request_type(name: &str) -> String {
    format!("{name}{REQUEST_SUFFIX}")
}

/// Returns the wire type of a response message, e.g. `ping_response`.
#[must_use]
pub fn response_type(name: &str) -> String {
    format!("{name}{RESPONSE_SUFFIX}")
}

/// Returns the wire type of an event message, e.g. `log_message_event`.
#[must_use]
pub fn event_type(name: &str) -> String {
    format!("{name}{EVENT_SUFFIX}")
}

/// One on-wire value.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use warden_proto::{Envelope, MessageKind};
///
/// let envelope = Envelope::new("ping_request", 1, json!({}));
/// assert_eq!(envelope.kind(), Some(MessageKind::Request));
/// assert_eq!(envelope.base_name(), Some("ping"));
///
/// let wire = serde_json::to_value(&envelope).unwrap();
/// assert_eq!(wire, json!({"type": "ping_request", "seq": 1, "data": {}}));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Kind-suffixed message type, e.g. `start_instance_request`.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Sequence number stamped by the sending connector.
    pub seq: u64,
    /// Structured payload.
    pub data: Value,
}

impl Envelope {
    /// Creates an envelope from its parts.
    #[must_use]
    pub fn new(message_type: impl Into<String>, seq: u64, data: Value) -> Self {
        Self {
            message_type: message_type.into(),
            seq,
            data,
        }
    }

    /// Returns the kind implied by the type-name suffix, or `None`
    /// for a malformed type name.
    #[must_use]
    pub fn kind(&self) -> Option<MessageKind> {
        kind_of(&self.message_type)
    }

    /// Returns the type name with its kind suffix stripped.
    #[must_use]
    pub fn base_name(&self) -> Option<&str> {
        let t = self.message_type.as_str();
        t.strip_suffix(REQUEST_SUFFIX)
            .or_else(|| t.strip_suffix(RESPONSE_SUFFIX))
            .or_else(|| t.strip_suffix(EVENT_SUFFIX))
    }

    /// Returns `data.seq` when present, the correlation key carried
    /// by responses.
    #[must_use]
    pub fn data_seq(&self) -> Option<u64> {
        self.data.get("seq").and_then(Value::as_u64)
    }

    /// Returns the `error` string of an error response, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.data.get("error").and_then(Value::as_str)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.message_type, self.seq)
    }
}

/// Returns the kind implied by a wire type name's suffix.
#[must_use]
pub fn kind_of(message_type: &str) -> Option<MessageKind> {
    if message_type.ends_with(REQUEST_SUFFIX) {
        Some(MessageKind::Request)
    } else if message_type.ends_with(RESPONSE_SUFFIX) {
        Some(MessageKind::Response)
    } else if message_type.ends_with(EVENT_SUFFIX) {
        Some(MessageKind::Event)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn suffix_helpers() {
        assert_eq!(request_type("ping"), "ping_request");
        assert_eq!(response_type("ping"), "ping_response");
        assert_eq!(event_type("log_message"), "log_message_event");
    }

    #[test]
    fn kind_from_suffix() {
        assert_eq!(kind_of("ping_request"), Some(MessageKind::Request));
        assert_eq!(kind_of("ping_response"), Some(MessageKind::Response));
        assert_eq!(kind_of("player_event"), Some(MessageKind::Event));
        assert_eq!(kind_of("ping"), None);
    }

    #[test]
    fn wire_form_round_trip() {
        let envelope = Envelope::new("send_rcon_request", 3, json!({"instance_id": 7}));
        let wire = serde_json::to_string(&envelope).expect("serialize");
        let back: Envelope = serde_json::from_str(&wire).expect("deserialize");
        assert_eq!(back, envelope);
        assert!(wire.contains("\"type\":\"send_rcon_request\""));
    }

    #[test]
    fn data_seq_and_error_accessors() {
        let success = Envelope::new("ping_response", 9, json!({"seq": 4}));
        assert_eq!(success.data_seq(), Some(4));
        assert_eq!(success.error(), None);

        let failure = Envelope::new("ping_response", 9, json!({"seq": 4, "error": "nope"}));
        assert_eq!(failure.error(), Some("nope"));
    }

    #[test]
    fn base_name_strips_any_suffix() {
        assert_eq!(
            Envelope::new("list_hosts_request", 1, json!({})).base_name(),
            Some("list_hosts")
        );
        assert_eq!(
            Envelope::new("banlist_update_event", 1, json!({})).base_name(),
            Some("banlist_update")
        );
        assert_eq!(Envelope::new("garbage", 1, json!({})).base_name(), None);
    }
}
