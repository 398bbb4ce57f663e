use anyhow::Result;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;

use super::allocator::OffsetAllocator;
use super::keys::{committed_key, entry_key};
use super::partitioner::PartitionRouter;
use crate::membership::{service::MembershipService, types::NodeId};
use crate::storage::client::SharedStore;
use crate::transport::client::Transport;
use crate::transport::error::{ErrorCode, RpcError, RpcResult};
use crate::transport::protocol::{Payload, PolledEntry, unexpected_reply};

/// The partitioned log as seen from one node.
///
/// Appends for keys this node owns are allocated locally; appends for other
/// keys are forwarded to their owner. Polls and consumer offsets go straight
/// to the shared store from any node.
pub struct LogService {
    membership: Arc<MembershipService>,
    router: PartitionRouter,
    allocator: OffsetAllocator,
    store: Arc<dyn SharedStore>,
    transport: Arc<dyn Transport>,
}

impl LogService {
    pub fn new(
        membership: Arc<MembershipService>,
        store: Arc<dyn SharedStore>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let router = PartitionRouter::from_membership(&membership)?;
        Ok(Self {
            membership,
            router,
            allocator: OffsetAllocator::new(store.clone()),
            store,
            transport,
        })
    }

    pub fn router(&self) -> &PartitionRouter {
        &self.router
    }

    /// Appends `value` to `key` and returns its offset.
    ///
    /// 1. If **Local Node is Owner**: Allocates the offset and writes the entry.
    /// 2. If **Remote Node is Owner**: Forwards the append and relays the owner's answer.
    pub async fn append(&self, key: &str, value: i64) -> RpcResult<u64> {
        let owner = self.router.owner(key);

        if owner == self.membership.local_id() {
            return self.allocator.append(key, value).await;
        }

        tracing::debug!("Forwarding append for {} to owner {}", key, owner);
        self.forward_append(owner, key, value).await
    }

    /// Appends on behalf of a peer that routed `key` here.
    ///
    /// Never forwards again, so two nodes briefly disagreeing on ownership
    /// cannot bounce a request between them.
    pub async fn append_forwarded(&self, key: &str, value: i64) -> RpcResult<u64> {
        if !self.router.is_local(key) {
            tracing::warn!(
                "Received forwarded append for {} owned by {}",
                key,
                self.router.owner(key)
            );
        }
        self.allocator.append(key, value).await
    }

    async fn forward_append(&self, owner: &NodeId, key: &str, value: i64) -> RpcResult<u64> {
        let reply = self
            .transport
            .call(
                owner,
                Payload::Forward {
                    key: key.to_string(),
                    msg: value,
                },
            )
            .await?;

        match reply {
            Payload::ForwardOk { offset } => Ok(offset),
            other => Err(unexpected_reply("forward_ok", &other)),
        }
    }

    /// Reads every entry from each requested offset up to the first gap.
    ///
    /// Keys are scanned concurrently; keys with nothing at or past their
    /// starting offset are left out of the result.
    pub async fn poll(
        &self,
        offsets: HashMap<String, u64>,
    ) -> RpcResult<HashMap<String, Vec<PolledEntry>>> {
        let results: Arc<DashMap<String, Vec<PolledEntry>>> = Arc::new(DashMap::new());
        let mut tasks = JoinSet::new();

        for (key, start) in offsets {
            let store = self.store.clone();
            let results = results.clone();
            tasks.spawn(async move {
                let entries = scan_from(store.as_ref(), &key, start).await?;
                if !entries.is_empty() {
                    results.insert(key, entries);
                }
                Ok::<(), RpcError>(())
            });
        }

        join_all(tasks).await?;

        Ok(results
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    /// Records each key's committed offset, overwriting whatever was there.
    ///
    /// Writes run concurrently; if one fails the others are kept.
    pub async fn commit_offsets(&self, offsets: HashMap<String, u64>) -> RpcResult<()> {
        let offsets = offsets
            .into_iter()
            .map(|(key, offset)| {
                i64::try_from(offset)
                    .map(|value| (key, value))
                    .map_err(|_| RpcError::malformed(format!("offset {} out of range", offset)))
            })
            .collect::<RpcResult<Vec<_>>>()?;

        let mut tasks = JoinSet::new();
        for (key, value) in offsets {
            let store = self.store.clone();
            tasks.spawn(async move { store.write(&committed_key(&key), value).await });
        }

        join_all(tasks).await
    }

    /// Committed offsets for `keys`; keys never committed are omitted.
    pub async fn list_committed_offsets(&self, keys: Vec<String>) -> RpcResult<HashMap<String, u64>> {
        let mut tasks = JoinSet::new();

        for key in keys {
            let store = self.store.clone();
            tasks.spawn(async move {
                let committed = store.read_optional(&committed_key(&key)).await?;
                Ok::<_, RpcError>(committed.map(|value| (key, value)))
            });
        }

        let mut offsets = HashMap::new();
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match flatten_join(joined) {
                Ok(Some((key, value))) => match u64::try_from(value) {
                    Ok(offset) => {
                        offsets.insert(key, offset);
                    }
                    Err(_) => {
                        first_error.get_or_insert(RpcError::new(
                            ErrorCode::Crash,
                            format!("committed offset of {} holds {}", key, value),
                        ));
                    }
                },
                Ok(None) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(offsets),
        }
    }
}

async fn scan_from(store: &dyn SharedStore, key: &str, start: u64) -> RpcResult<Vec<PolledEntry>> {
    let mut entries = Vec::new();
    let mut offset = start;

    while let Some(value) = store.read_optional(&entry_key(key, offset)).await? {
        entries.push((offset, value));
        offset += 1;
    }

    Ok(entries)
}

/// Waits for every task and reports the first failure observed, if any.
async fn join_all(mut tasks: JoinSet<RpcResult<()>>) -> RpcResult<()> {
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = flatten_join(joined) {
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn flatten_join<T>(joined: Result<RpcResult<T>, tokio::task::JoinError>) -> RpcResult<T> {
    joined.unwrap_or_else(|e| Err(RpcError::new(ErrorCode::Crash, format!("task failed: {}", e))))
}
