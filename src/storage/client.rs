use async_trait::async_trait;
use std::sync::Arc;

use super::memory::MemoryStore;
use crate::membership::types::NodeId;
use crate::transport::client::Transport;
use crate::transport::error::RpcResult;
use crate::transport::protocol::{Payload, unexpected_reply};

/// Access to the shared linearizable key/value store.
///
/// All authoritative log state (offset counters, entries, committed offsets)
/// lives behind this trait; correctness of offset allocation depends on
/// `compare_and_swap` being linearizable.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Fails with `KeyDoesNotExist` when the key was never written.
    async fn read(&self, key: &str) -> RpcResult<i64>;

    async fn write(&self, key: &str, value: i64) -> RpcResult<()>;

    async fn compare_and_swap(
        &self,
        key: &str,
        from: i64,
        to: i64,
        create_if_missing: bool,
    ) -> RpcResult<()>;

    /// Like `read`, but maps `KeyDoesNotExist` to `None`.
    async fn read_optional(&self, key: &str) -> RpcResult<Option<i64>> {
        match self.read(key).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_key_missing() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn read(&self, key: &str) -> RpcResult<i64> {
        MemoryStore::read(self, key)
    }

    async fn write(&self, key: &str, value: i64) -> RpcResult<()> {
        MemoryStore::write(self, key, value);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        from: i64,
        to: i64,
        create_if_missing: bool,
    ) -> RpcResult<()> {
        MemoryStore::compare_and_swap(self, key, from, to, create_if_missing)
    }
}

/// Store reached through the messaging substrate, like any other peer.
pub struct RemoteStore {
    transport: Arc<dyn Transport>,
    service: NodeId,
}

impl RemoteStore {
    pub fn new(transport: Arc<dyn Transport>, service: NodeId) -> Self {
        Self { transport, service }
    }
}

#[async_trait]
impl SharedStore for RemoteStore {
    async fn read(&self, key: &str) -> RpcResult<i64> {
        let reply = self
            .transport
            .call(
                &self.service,
                Payload::Read {
                    key: key.to_string(),
                },
            )
            .await?;
        match reply {
            Payload::ReadOk { value } => Ok(value),
            other => Err(unexpected_reply("read_ok", &other)),
        }
    }

    async fn write(&self, key: &str, value: i64) -> RpcResult<()> {
        let reply = self
            .transport
            .call(
                &self.service,
                Payload::Write {
                    key: key.to_string(),
                    value,
                },
            )
            .await?;
        match reply {
            Payload::WriteOk => Ok(()),
            other => Err(unexpected_reply("write_ok", &other)),
        }
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        from: i64,
        to: i64,
        create_if_missing: bool,
    ) -> RpcResult<()> {
        let reply = self
            .transport
            .call(
                &self.service,
                Payload::Cas {
                    key: key.to_string(),
                    from,
                    to,
                    create_if_not_exists: create_if_missing,
                },
            )
            .await?;
        match reply {
            Payload::CasOk => Ok(()),
            other => Err(unexpected_reply("cas_ok", &other)),
        }
    }
}
