use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Node id of the shared linearizable key/value service.
pub const STORE_NODE_ID: &str = "lin-kv";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn store() -> Self {
        Self(STORE_NODE_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a member does in the cluster.
///
/// Only `Log` members take part in partition routing. The `Store` member is the
/// shared key/value service every log node allocates offsets against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeRole {
    Log,
    Store,
}

/// Represents a single member in the cluster.
///
/// The member set is fixed at start-up; there is no join or failure detection,
/// so a `Node` carries only identity, address and role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub http_addr: SocketAddr,
    pub role: NodeRole,
}

impl Node {
    pub fn log(id: NodeId, http_addr: SocketAddr) -> Self {
        Self {
            id,
            http_addr,
            role: NodeRole::Log,
        }
    }

    pub fn store(http_addr: SocketAddr) -> Self {
        Self {
            id: NodeId::store(),
            http_addr,
            role: NodeRole::Store,
        }
    }
}
