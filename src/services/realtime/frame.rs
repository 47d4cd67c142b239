use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub(crate) const EVENT_JOIN: &str = "phx_join";
pub(crate) const EVENT_LEAVE: &str = "phx_leave";
pub(crate) const EVENT_HEARTBEAT: &str = "heartbeat";
pub(crate) const EVENT_ACCESS_TOKEN: &str = "access_token";
pub(crate) const HEARTBEAT_TOPIC: &str = "phoenix";
const TOPIC_PREFIX: &str = "realtime:";

/// One message on the realtime socket, in the Phoenix channel envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub topic: String,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, rename = "ref")]
    pub reference: Option<Value>,
}

impl Frame {
    pub(crate) fn join(topic: &str, access_token: Option<&str>, reference: String) -> Self {
        let mut payload = json!({ "config": { "broadcast": { "self": false }, "presence": { "key": "" } } });
        if let Some(token) = access_token {
            payload["access_token"] = Value::String(token.to_string());
        }
        Self {
            topic: topic.to_string(),
            event: EVENT_JOIN.to_string(),
            payload,
            reference: Some(Value::String(reference)),
        }
    }

    pub(crate) fn leave(topic: &str, reference: String) -> Self {
        Self {
            topic: topic.to_string(),
            event: EVENT_LEAVE.to_string(),
            payload: json!({}),
            reference: Some(Value::String(reference)),
        }
    }

    pub(crate) fn access_token(topic: &str, access_token: &str, reference: String) -> Self {
        Self {
            topic: topic.to_string(),
            event: EVENT_ACCESS_TOKEN.to_string(),
            payload: json!({ "access_token": access_token }),
            reference: Some(Value::String(reference)),
        }
    }

    pub(crate) fn heartbeat(reference: String) -> Self {
        Self {
            topic: HEARTBEAT_TOPIC.to_string(),
            event: EVENT_HEARTBEAT.to_string(),
            payload: json!({}),
            reference: Some(Value::String(reference)),
        }
    }
}

/// Qualifies a bare channel name with the realtime topic prefix.
#[must_use]
pub fn topic_name(channel: &str) -> String {
    if channel.starts_with(TOPIC_PREFIX) { channel.to_string() } else { format!("{TOPIC_PREFIX}{channel}") }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_name_is_idempotent() {
        assert_eq!(topic_name("conversations"), "realtime:conversations");
        assert_eq!(topic_name("realtime:conversations"), "realtime:conversations");
    }

    #[test]
    fn test_join_carries_token() {
        let frame = Frame::join("realtime:messages", Some("tok"), "1".to_string());
        let wire = serde_json::to_value(&frame).unwrap();
        assert_eq!(wire["event"], "phx_join");
        assert_eq!(wire["ref"], "1");
        assert_eq!(wire["payload"]["access_token"], "tok");

        let anonymous = Frame::join("realtime:messages", None, "2".to_string());
        assert!(anonymous.payload.get("access_token").is_none());
    }

    #[test]
    fn test_inbound_frame_without_ref() {
        let frame: Frame =
            serde_json::from_str(r#"{"topic":"realtime:messages","event":"INSERT","payload":{"id":1}}"#).unwrap();
        assert_eq!(frame.reference, None);
        assert_eq!(frame.payload["id"], 1);
    }
}
