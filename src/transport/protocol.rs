//! Message Protocol
//!
//! Defines the JSON envelope exchanged between clients, log nodes and the shared
//! store, and the typed payload of every request and reply.
//!
//! Every message is `{"src", "dest", "body"}`. The body carries a `type` tag,
//! an optional `msg_id`, an optional `in_reply_to`, and the fields of its payload
//! at the same level.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::{ErrorCode, RpcError, RpcResult};
use crate::membership::types::NodeId;

// --- API Endpoints ---

/// Endpoint accepting one request envelope and answering with one reply envelope.
pub const ENDPOINT_RPC: &str = "/rpc";
/// Liveness probe.
pub const ENDPOINT_HEALTH: &str = "/health";

// --- Envelope ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub src: NodeId,
    pub dest: NodeId,
    pub body: Body,
}

impl Message {
    /// Builds the reply to this message, addressed back to its sender.
    pub fn reply(&self, payload: Payload) -> Message {
        Message {
            src: self.dest.clone(),
            dest: self.src.clone(),
            body: Body {
                msg_id: None,
                in_reply_to: self.body.msg_id,
                payload,
            },
        }
    }
}

/// Envelope whose body has not been decoded yet.
///
/// Inbound requests are accepted in this form so that a body with missing or
/// mistyped fields can still be answered with a typed `error` reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub src: NodeId,
    pub dest: NodeId,
    pub body: serde_json::Value,
}

impl RawMessage {
    pub fn msg_id(&self) -> Option<u64> {
        self.body.get("msg_id").and_then(|id| id.as_u64())
    }

    pub fn decode(&self) -> RpcResult<Message> {
        let body: Body = serde_json::from_value(self.body.clone())
            .map_err(|e| RpcError::malformed(format!("invalid message body: {}", e)))?;
        Ok(Message {
            src: self.src.clone(),
            dest: self.dest.clone(),
            body,
        })
    }

    /// Error reply for a request whose body could not be decoded.
    pub fn error_reply(&self, error: RpcError) -> Message {
        Message {
            src: self.dest.clone(),
            dest: self.src.clone(),
            body: Body {
                msg_id: None,
                in_reply_to: self.msg_id(),
                payload: Payload::from(error),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Body {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<u64>,
    #[serde(flatten)]
    pub payload: Payload,
}

// --- Payloads ---

/// One `(offset, value)` pair as returned by `poll_ok`, encoded as `[offset, value]`.
pub type PolledEntry = (u64, i64);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    Echo {
        echo: serde_json::Value,
    },
    EchoOk {
        echo: serde_json::Value,
    },
    Generate,
    GenerateOk {
        id: String,
    },

    /// Client append.
    Send {
        key: String,
        msg: i64,
    },
    SendOk {
        offset: u64,
    },
    /// Append relayed from a non-owner to the owner of `key`.
    Forward {
        key: String,
        msg: i64,
    },
    ForwardOk {
        offset: u64,
    },
    Poll {
        offsets: HashMap<String, u64>,
    },
    PollOk {
        msgs: HashMap<String, Vec<PolledEntry>>,
    },
    CommitOffsets {
        offsets: HashMap<String, u64>,
    },
    CommitOffsetsOk,
    ListCommittedOffsets {
        keys: Vec<String>,
    },
    ListCommittedOffsetsOk {
        offsets: HashMap<String, u64>,
    },

    // Shared store
    Read {
        key: String,
    },
    ReadOk {
        value: i64,
    },
    Write {
        key: String,
        value: i64,
    },
    WriteOk,
    Cas {
        key: String,
        from: i64,
        to: i64,
        #[serde(default)]
        create_if_not_exists: bool,
    },
    CasOk,

    Error {
        code: ErrorCode,
        text: String,
    },

    /// Any `type` this node does not know. Never sent.
    #[serde(other, skip_serializing)]
    Unsupported,
}

impl Payload {
    /// Turns an `error` payload into `Err`, leaving every other payload as `Ok`.
    pub fn into_result(self) -> RpcResult<Payload> {
        match self {
            Payload::Error { code, text } => Err(RpcError::new(code, text)),
            other => Ok(other),
        }
    }
}

impl From<RpcError> for Payload {
    fn from(error: RpcError) -> Self {
        Payload::Error {
            code: error.code,
            text: error.text,
        }
    }
}

/// Error for a reply whose type does not match the request that was sent.
pub fn unexpected_reply(expected: &str, got: &Payload) -> RpcError {
    RpcError::new(
        ErrorCode::Crash,
        format!("expected {} reply, got {:?}", expected, got),
    )
}
