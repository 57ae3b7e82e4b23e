use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::contact::Contact;
use crate::utils::Result;

/// DHT RPC message types
///
/// Encoded on the wire as upper-case strings. Any unrecognized string
/// decodes as [`RpcType::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RpcType {
    /// Ping - check if a node is alive
    Ping,
    /// Pong - response to ping
    Pong,
    /// Store - replicate a value (request and acknowledgement)
    Store,
    /// FindNode - closest contacts to an id (request and response)
    FindNode,
    /// FindValue - value for a key (request and response)
    FindValue,
    Error,
}

impl RpcType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcType::Ping => "PING",
            RpcType::Pong => "PONG",
            RpcType::Store => "STORE",
            RpcType::FindNode => "FIND_NODE",
            RpcType::FindValue => "FIND_VALUE",
            RpcType::Error => "ERROR",
        }
    }
}

impl From<String> for RpcType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PING" => RpcType::Ping,
            "PONG" => RpcType::Pong,
            "STORE" => RpcType::Store,
            "FIND_NODE" => RpcType::FindNode,
            "FIND_VALUE" => RpcType::FindValue,
            _ => RpcType::Error,
        }
    }
}

impl From<RpcType> for String {
    fn from(t: RpcType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for RpcType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RPC-specific fields. Only those relevant to the message type are set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<Contact>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_bytes")]
    pub data: Option<Vec<u8>>,
    #[serde(rename = "src_contact", default, skip_serializing_if = "Option::is_none")]
    pub source_contact: Option<Contact>,
    #[serde(rename = "dst_contact", default, skip_serializing_if = "Option::is_none")]
    pub target_contact: Option<Contact>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

/// One protocol exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcMessage {
    #[serde(rename = "msg")]
    pub msg_type: RpcType,
    #[serde(default)]
    pub payload: Payload,
    pub packet_id: Uuid,
    #[serde(default)]
    pub query: bool,
}

impl RpcMessage {
    /// New message with a fresh correlation id
    pub fn new(msg_type: RpcType, payload: Payload, query: bool) -> Self {
        Self {
            msg_type,
            payload,
            packet_id: Uuid::new_v4(),
            query,
        }
    }

    pub fn request(msg_type: RpcType, payload: Payload) -> Self {
        Self::new(msg_type, payload, true)
    }

    /// Response correlated with `request`
    pub fn reply_to(request: &RpcMessage, msg_type: RpcType, payload: Payload) -> Self {
        Self {
            msg_type,
            payload,
            packet_id: request.packet_id,
            query: false,
        }
    }

    pub fn ping() -> Self {
        Self::request(RpcType::Ping, Payload::default())
    }

    pub fn find_node(key: String) -> Self {
        Self::request(
            RpcType::FindNode,
            Payload {
                key,
                ..Default::default()
            },
        )
    }

    pub fn store(key: String, data: Vec<u8>) -> Self {
        Self::request(
            RpcType::Store,
            Payload {
                key,
                data: Some(data),
                ..Default::default()
            },
        )
    }

    pub fn find_value(key: String) -> Self {
        Self::request(
            RpcType::FindValue,
            Payload {
                key,
                ..Default::default()
            },
        )
    }

    pub fn is_request(&self) -> bool {
        self.query
    }

    pub fn is_response(&self) -> bool {
        !self.query
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Opaque bytes as a hex string
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match data {
            Some(bytes) => serializer.serialize_str(&hex::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => hex::decode(s).map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
