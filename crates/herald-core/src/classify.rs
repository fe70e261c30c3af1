//! Classification of raw transport payloads.
//!
//! The recognised shape is keyed on the payload's `"type"` field:
//!
//! ```text
//! {"type": "hello"}                                 -> ConnectionEstablished
//! {"type": "message", "user", "channel", "text"}    -> Message
//!   (unless its subtype carries no user text, e.g. message_changed)
//! {"type": "error", "error": {"msg": "..."}}        -> TransportError
//! {"type": "invalid_auth"}                          -> AuthInvalid
//! anything else                                     -> Unrecognized
//! ```
//!
//! Classification is total: no input makes it fail.

use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use crate::event::{ChannelKind, InboundEvent, MessageEvent, RawEvent};

/// Error codes that mean the connection's credentials are no good.
const AUTH_FAILURE_CODES: &[&str] = &["invalid_auth", "not_authed", "account_inactive"];

const UNKNOWN_ERROR: &str = "unknown transport error";

/// Message subtypes that carry no user-authored text. Every other subtype
/// (`thread_broadcast`, `file_share`, `me_message`, ...) is a normal message.
const NON_USER_SUBTYPES: &[&str] = &[
    "message_changed",
    "message_deleted",
    "message_replied",
    "bot_message",
    "channel_join",
    "channel_leave",
    "channel_topic",
    "channel_purpose",
    "channel_name",
    "channel_archive",
    "channel_unarchive",
    "group_join",
    "group_leave",
    "group_topic",
    "group_purpose",
    "group_name",
    "group_archive",
    "group_unarchive",
    "pinned_item",
    "unpinned_item",
];

#[derive(Deserialize)]
struct MessagePayload {
    user: String,
    channel: String,
    text: String,
    #[serde(default)]
    ts: Option<Value>,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    channel_type: Option<String>,
}

/// Classifies a raw payload into an [`InboundEvent`].
pub fn classify(raw: RawEvent) -> InboundEvent {
    let event = match raw.event_type() {
        Some("hello" | "connected") => InboundEvent::ConnectionEstablished,
        Some("invalid_auth") => InboundEvent::AuthInvalid,
        Some("message") => match parse_message(raw.payload()) {
            Some(message) => InboundEvent::Message(message),
            None => InboundEvent::Unrecognized(raw),
        },
        Some("error") => classify_error(raw.payload()),
        _ => InboundEvent::Unrecognized(raw),
    };

    trace!(kind = event.kind_name(), "Classified raw event");
    event
}

fn parse_message(payload: &Value) -> Option<MessageEvent> {
    let parsed: MessagePayload = serde_json::from_value(payload.clone()).ok()?;

    if parsed
        .subtype
        .as_deref()
        .is_some_and(|subtype| NON_USER_SUBTYPES.contains(&subtype))
    {
        return None;
    }

    let kind = if parsed.channel_type.as_deref() == Some("im") || parsed.channel.starts_with('D')
    {
        ChannelKind::Direct
    } else {
        ChannelKind::Channel
    };

    let timestamp = match parsed.ts {
        Some(Value::String(ts)) => Some(ts),
        Some(Value::Number(ts)) => Some(ts.to_string()),
        _ => None,
    };

    Some(MessageEvent {
        sender: parsed.user,
        channel: parsed.channel,
        text: parsed.text,
        timestamp,
        kind,
    })
}

fn classify_error(payload: &Value) -> InboundEvent {
    let error = payload.get("error");

    let code = error.and_then(|e| e.get("code")).and_then(Value::as_str);
    let message = error
        .and_then(|e| e.get("msg"))
        .and_then(Value::as_str)
        .or_else(|| error.and_then(Value::as_str));

    let is_auth_failure = [code, message]
        .into_iter()
        .flatten()
        .any(|value| AUTH_FAILURE_CODES.contains(&value));

    if is_auth_failure {
        return InboundEvent::AuthInvalid;
    }

    InboundEvent::TransportError {
        message: message.unwrap_or(UNKNOWN_ERROR).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify_json(value: Value) -> InboundEvent {
        classify(RawEvent::new(value))
    }

    #[test]
    fn test_hello_is_connection_established() {
        assert_eq!(
            classify_json(json!({"type": "hello"})),
            InboundEvent::ConnectionEstablished
        );
    }

    #[test]
    fn test_channel_message() {
        let event = classify_json(json!({
            "type": "message",
            "user": "U1",
            "channel": "C1",
            "text": "hi there",
            "ts": "1700000000.000100",
        }));

        let InboundEvent::Message(msg) = event else {
            panic!("expected message, got {event:?}");
        };
        assert_eq!(msg.sender, "U1");
        assert_eq!(msg.channel, "C1");
        assert_eq!(msg.text, "hi there");
        assert_eq!(msg.timestamp.as_deref(), Some("1700000000.000100"));
        assert_eq!(msg.kind, ChannelKind::Channel);
    }

    #[test]
    fn test_direct_message_by_channel_prefix_and_type() {
        let by_prefix = classify_json(json!({
            "type": "message", "user": "U1", "channel": "D42", "text": "ping",
        }));
        let by_type = classify_json(json!({
            "type": "message", "user": "U1", "channel": "G7", "text": "ping",
            "channel_type": "im",
        }));

        for event in [by_prefix, by_type] {
            let InboundEvent::Message(msg) = event else {
                panic!("expected message");
            };
            assert!(msg.is_direct());
        }
    }

    #[test]
    fn test_numeric_timestamp() {
        let event = classify_json(json!({
            "type": "message", "user": "U1", "channel": "C1", "text": "x", "ts": 17,
        }));
        let InboundEvent::Message(msg) = event else {
            panic!("expected message");
        };
        assert_eq!(msg.timestamp.as_deref(), Some("17"));
    }

    #[test]
    fn test_malformed_message_is_unrecognized() {
        let raw = json!({"type": "message", "channel": "C1"});
        assert_eq!(
            classify_json(raw.clone()),
            InboundEvent::Unrecognized(RawEvent::new(raw))
        );
    }

    #[test]
    fn test_subtyped_message_is_unrecognized() {
        let event = classify_json(json!({
            "type": "message", "subtype": "message_changed",
            "user": "U1", "channel": "C1", "text": "edited",
        }));
        assert!(matches!(event, InboundEvent::Unrecognized(_)));
    }

    #[test]
    fn test_user_authored_subtypes_are_messages() {
        for subtype in ["thread_broadcast", "file_share", "me_message"] {
            let event = classify_json(json!({
                "type": "message", "subtype": subtype,
                "user": "U1", "channel": "D1", "text": "ping",
            }));
            let InboundEvent::Message(msg) = event else {
                panic!("{subtype}: expected message, got {event:?}");
            };
            assert_eq!(msg.text, "ping");
            assert!(msg.is_direct());
        }
    }

    #[test]
    fn test_error_payloads() {
        assert_eq!(
            classify_json(json!({"type": "error", "error": {"code": 1, "msg": "socket closed"}})),
            InboundEvent::TransportError {
                message: "socket closed".into()
            }
        );
        assert_eq!(
            classify_json(json!({"type": "error", "error": "rate_limited"})),
            InboundEvent::TransportError {
                message: "rate_limited".into()
            }
        );
        assert_eq!(
            classify_json(json!({"type": "error"})),
            InboundEvent::TransportError {
                message: UNKNOWN_ERROR.into()
            }
        );
    }

    #[test]
    fn test_auth_failures() {
        assert_eq!(
            classify_json(json!({"type": "invalid_auth"})),
            InboundEvent::AuthInvalid
        );
        assert_eq!(
            classify_json(json!({"type": "error", "error": {"msg": "not_authed"}})),
            InboundEvent::AuthInvalid
        );
        assert_eq!(
            classify_json(json!({"type": "error", "error": {"code": "account_inactive"}})),
            InboundEvent::AuthInvalid
        );
    }

    #[test]
    fn test_unknown_shapes_never_fail() {
        for value in [
            json!(null),
            json!(42),
            json!("hello"),
            json!([1, 2, 3]),
            json!({}),
            json!({"type": "presence_change", "user": "U1"}),
            json!({"type": 7}),
        ] {
            assert!(matches!(
                classify_json(value),
                InboundEvent::Unrecognized(_)
            ));
        }
    }
}
