//! Wire-level envelopes shared by the controller and child protocols.
//!
//! Both protocols travel on the same channel and are told apart only by the
//! `type` discriminant.

use bridge_primitives::RequestId;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Discriminant of fire-and-forget messages sent to a child.
pub const GENERIC_MESSAGE_TYPE: &str = "GENERIC_MESSAGE";

/// Pair of discriminants identifying one request/response protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Protocol {
    call: &'static str,
    response: &'static str,
}

impl Protocol {
    /// Protocol used by an external controller to drive this page.
    pub const CONTROLLER: Self = Self {
        call: "A_CALL",
        response: "A_RESPONSE",
    };

    /// Protocol used by this page to drive an embedded child.
    pub const CHILD: Self = Self {
        call: "B_CALL",
        response: "B_RESPONSE",
    };

    /// Discriminant carried by call envelopes.
    #[must_use]
    pub const fn call_type(self) -> &'static str {
        self.call
    }

    /// Discriminant carried by response envelopes.
    #[must_use]
    pub const fn response_type(self) -> &'static str {
        self.response
    }
}

/// Tool name plus arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool to invoke.
    pub name: String,
    /// Arguments handed to the tool.
    #[serde(default = "empty_arguments")]
    pub arguments: Value,
}

fn empty_arguments() -> Value {
    json!({})
}

impl ToolCall {
    /// Creates a call with the supplied arguments.
    #[must_use]
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Creates a call without arguments.
    #[must_use]
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, empty_arguments())
    }
}

/// `{type, requestId, call}` envelope.
///
/// The request id and the call body are kept as raw JSON so that inbound
/// envelopes with an unusual id (a number, say) are echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallEnvelope {
    /// Protocol discriminant.
    #[serde(rename = "type")]
    pub kind: String,
    /// Correlation id chosen by the caller.
    #[serde(rename = "requestId", default)]
    pub request_id: Value,
    /// Call body, normally `{name, arguments}`.
    #[serde(default)]
    pub call: Value,
}

impl CallEnvelope {
    /// Builds an outbound call envelope.
    #[must_use]
    pub fn new(protocol: Protocol, request_id: &RequestId, call: &ToolCall) -> Self {
        Self {
            kind: protocol.call_type().to_owned(),
            request_id: Value::from(request_id.as_str()),
            call: json!({ "name": call.name, "arguments": call.arguments }),
        }
    }

    /// Reads a call envelope of `protocol` from raw channel data.
    ///
    /// Returns `None` for anything else: other discriminants, non-objects,
    /// or malformed envelopes.
    #[must_use]
    pub fn parse(data: &Value, protocol: Protocol) -> Option<Self> {
        if data.get("type").and_then(Value::as_str) != Some(protocol.call_type()) {
            return None;
        }
        Self::deserialize(data).ok()
    }

    /// Serialises the envelope into channel data.
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({ "type": self.kind, "requestId": self.request_id, "call": self.call })
    }
}

/// `{type, requestId, response}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Protocol discriminant.
    #[serde(rename = "type")]
    pub kind: String,
    /// Correlation id copied from the call.
    #[serde(rename = "requestId", default)]
    pub request_id: Value,
    /// Response body.
    #[serde(default)]
    pub response: Value,
}

impl ResponseEnvelope {
    /// Builds a response envelope answering `request_id`.
    #[must_use]
    pub fn new(protocol: Protocol, request_id: Value, response: Value) -> Self {
        Self {
            kind: protocol.response_type().to_owned(),
            request_id,
            response,
        }
    }

    /// Reads a response envelope of `protocol` from raw channel data.
    #[must_use]
    pub fn parse(data: &Value, protocol: Protocol) -> Option<Self> {
        if data.get("type").and_then(Value::as_str) != Some(protocol.response_type()) {
            return None;
        }
        Self::deserialize(data).ok()
    }

    /// Correlation id as a string, when it is one.
    #[must_use]
    pub fn request_id_str(&self) -> Option<&str> {
        self.request_id.as_str()
    }

    /// Serialises the envelope into channel data.
    #[must_use]
    pub fn to_value(&self) -> Value {
        json!({ "type": self.kind, "requestId": self.request_id, "response": self.response })
    }
}

/// Builds a fire-and-forget `GENERIC_MESSAGE` payload.
#[must_use]
pub fn generic_message(payload: Value) -> Value {
    json!({ "type": GENERIC_MESSAGE_TYPE, "payload": payload })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_envelope_wire_shape() {
        let id = RequestId::new("PAGE_B:0:1:abc").unwrap();
        let envelope = CallEnvelope::new(
            Protocol::CHILD,
            &id,
            &ToolCall::new("meta.listActions", json!({})),
        );
        assert_eq!(
            envelope.to_value(),
            json!({
                "type": "B_CALL",
                "requestId": "PAGE_B:0:1:abc",
                "call": { "name": "meta.listActions", "arguments": {} }
            })
        );
    }

    #[test]
    fn parse_ignores_other_protocols() {
        let data = json!({ "type": "B_CALL", "requestId": "1", "call": {} });
        assert!(CallEnvelope::parse(&data, Protocol::CONTROLLER).is_none());
        assert!(CallEnvelope::parse(&data, Protocol::CHILD).is_some());
        assert!(CallEnvelope::parse(&json!("A_CALL"), Protocol::CONTROLLER).is_none());
        assert!(CallEnvelope::parse(&json!({ "call": {} }), Protocol::CONTROLLER).is_none());
    }

    #[test]
    fn numeric_request_ids_survive() {
        let data = json!({ "type": "A_CALL", "requestId": 42, "call": { "name": "x" } });
        let envelope = CallEnvelope::parse(&data, Protocol::CONTROLLER).unwrap();
        assert_eq!(envelope.request_id, json!(42));

        let reply = ResponseEnvelope::new(Protocol::CONTROLLER, envelope.request_id, json!({}));
        assert_eq!(reply.to_value()["requestId"], json!(42));
        assert!(reply.request_id_str().is_none());
    }

    #[test]
    fn tool_call_defaults_arguments() {
        let call: ToolCall = serde_json::from_value(json!({ "name": "nav.next" })).unwrap();
        assert_eq!(call.arguments, json!({}));
    }
}
