use anyhow::{Result, ensure};
use dashmap::DashMap;
use std::sync::Arc;

use super::types::{Node, NodeId, NodeRole};

/// Static view of the cluster: the local node plus every peer it may talk to.
///
/// Built once from configuration and never mutated afterwards, so readers need
/// no synchronisation beyond the `Arc` they share it through.
pub struct MembershipService {
    pub local_node: Node,
    members: DashMap<NodeId, Node>,
}

impl MembershipService {
    pub fn new(local_node: Node, peers: Vec<Node>) -> Result<Arc<Self>> {
        ensure!(
            local_node.role == NodeRole::Log,
            "local node {} must be a log node",
            local_node.id
        );

        let members = DashMap::new();
        members.insert(local_node.id.clone(), local_node.clone());

        for peer in peers {
            if peer.id == local_node.id {
                ensure!(
                    peer.http_addr == local_node.http_addr,
                    "peer {} conflicts with the local address {}",
                    peer.id,
                    local_node.http_addr
                );
                continue;
            }
            if let Some(existing) = members.get(&peer.id) {
                ensure!(
                    existing.http_addr == peer.http_addr,
                    "peer {} listed twice with different addresses",
                    peer.id
                );
                continue;
            }
            tracing::debug!("Registered member {} at {}", peer.id, peer.http_addr);
            members.insert(peer.id.clone(), peer);
        }

        tracing::info!(
            "Membership ready: {} as {:?}, {} member(s)",
            local_node.id,
            local_node.role,
            members.len()
        );

        Ok(Arc::new(Self { local_node, members }))
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_node.id
    }

    pub fn get_member(&self, id: &NodeId) -> Option<Node> {
        self.members.get(id).map(|entry| entry.value().clone())
    }

    /// Ids of every member that owns log partitions, sorted ascending.
    pub fn log_node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .members
            .iter()
            .filter(|entry| entry.value().role == NodeRole::Log)
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}
