use anyhow::{Result, ensure};
use sha2::{Digest, Sha256};

use crate::membership::{service::MembershipService, types::NodeId};

/// Maps every log key to the one node allowed to allocate its offsets.
///
/// The node list is sorted once at construction so that every node derives
/// the same owner for a key, whatever order its peers were configured in.
pub struct PartitionRouter {
    local_id: NodeId,
    node_ids: Vec<NodeId>,
}

impl PartitionRouter {
    pub fn new(local_id: NodeId, mut node_ids: Vec<NodeId>) -> Result<Self> {
        ensure!(!node_ids.is_empty(), "partition router requires at least one node");
        node_ids.sort();
        node_ids.dedup();
        ensure!(
            node_ids.contains(&local_id),
            "local node {} is not part of the node set",
            local_id
        );
        Ok(Self { local_id, node_ids })
    }

    pub fn from_membership(membership: &MembershipService) -> Result<Self> {
        Self::new(membership.local_id().clone(), membership.log_node_ids())
    }

    /// First byte of the key's SHA-256 digest.
    pub fn hash_key(key: &str) -> usize {
        Sha256::digest(key.as_bytes())[0] as usize
    }

    pub fn owner(&self, key: &str) -> &NodeId {
        &self.node_ids[Self::hash_key(key) % self.node_ids.len()]
    }

    pub fn is_local(&self, key: &str) -> bool {
        self.owner(key) == &self.local_id
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }
}
