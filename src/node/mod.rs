//! Node Module
//!
//! Ties the subsystems of one process together and dispatches inbound messages.
//!
//! ## Responsibilities
//! - **Bootstrap**: Builds membership, store access, transport and the log service from `NodeConfig`.
//! - **Dispatch**: Decodes a request body and hands it to the store, the log, or the utility handlers.
//! - **Replies**: Every request gets exactly one reply, either its `*_ok` type or a typed `error`.
//!
//! ## Submodules
//! - **`handlers`**: Axum endpoints exposing the node over HTTP.

pub mod handlers;

use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::{NodeConfig, StoreLocation};
use crate::log::{handlers::handle_log_request, service::LogService};
use crate::membership::service::MembershipService;
use crate::membership::types::{Node as Member, NodeId};
use crate::storage::client::{RemoteStore, SharedStore};
use crate::storage::handlers::handle_store_request;
use crate::storage::memory::MemoryStore;
use crate::transport::client::{HttpTransport, Transport};
use crate::transport::error::{RpcError, RpcResult};
use crate::transport::protocol::{Message, Payload, RawMessage};

pub struct Node {
    pub membership: Arc<MembershipService>,
    log: LogService,
    /// Present when this process hosts the shared store for the cluster.
    store: Option<Arc<MemoryStore>>,
    next_id: AtomicU64,
}

impl Node {
    pub fn new(
        membership: Arc<MembershipService>,
        log: LogService,
        store: Option<Arc<MemoryStore>>,
    ) -> Self {
        Self {
            membership,
            log,
            store,
            next_id: AtomicU64::new(0),
        }
    }

    /// Wires a node from configuration, talking to peers over HTTP.
    pub fn from_config(config: &NodeConfig) -> Result<Arc<Self>> {
        let local = Member::log(config.node_id.clone(), config.bind_addr);
        let mut members: Vec<Member> = config
            .peers
            .iter()
            .map(|(id, addr)| Member::log(id.clone(), *addr))
            .collect();
        if let StoreLocation::Remote(store_addr) = config.store {
            members.push(Member::store(store_addr));
        }
        let membership = MembershipService::new(local, members)?;

        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(
            membership.clone(),
            config.rpc_timeout,
            config.rpc_attempts,
        ));

        let (store, embedded): (Arc<dyn SharedStore>, Option<Arc<MemoryStore>>) =
            match config.store {
                StoreLocation::Remote(addr) => {
                    tracing::info!("Using shared store at {}", addr);
                    (
                        Arc::new(RemoteStore::new(transport.clone(), NodeId::store())),
                        None,
                    )
                }
                StoreLocation::Hosted => {
                    tracing::info!("Hosting the shared store in this node");
                    let memory = Arc::new(MemoryStore::new());
                    (memory.clone(), Some(memory))
                }
            };

        let log = LogService::new(membership.clone(), store, transport)?;
        Ok(Arc::new(Self::new(membership, log, embedded)))
    }

    pub fn id(&self) -> &NodeId {
        self.membership.local_id()
    }

    pub fn hosts_store(&self) -> bool {
        self.store.is_some()
    }

    pub fn log(&self) -> &LogService {
        &self.log
    }

    /// Answers one decoded request payload.
    pub async fn handle(&self, payload: Payload) -> RpcResult<Payload> {
        if let Some(store) = &self.store
            && let Some(result) = handle_store_request(store, &payload)
        {
            return result;
        }

        match payload {
            Payload::Echo { echo } => Ok(Payload::EchoOk { echo }),
            Payload::Generate => Ok(Payload::GenerateOk {
                id: self.generate_id(),
            }),
            Payload::Unsupported => Err(RpcError::not_supported("unsupported message type")),
            other => handle_log_request(&self.log, other).await,
        }
    }

    /// Decodes an inbound envelope, runs it, and builds the reply envelope.
    pub async fn handle_message(&self, raw: RawMessage) -> Message {
        let request = match raw.decode() {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Rejecting message from {}: {}", raw.src, e);
                return raw.error_reply(e);
            }
        };

        let payload = match self.handle(request.body.payload.clone()).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!("Request from {} failed: {}", request.src, e);
                Payload::from(e)
            }
        };

        request.reply(payload)
    }

    /// `<node id>_<n>`, unique across the cluster because node ids are.
    fn generate_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        format!("{}_{}", self.id(), n)
    }
}
