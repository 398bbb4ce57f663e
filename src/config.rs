//! Node configuration parsed from the command line.

use anyhow::{Context, Result, anyhow, bail};
use std::net::SocketAddr;
use std::time::Duration;

use crate::membership::types::NodeId;

pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_millis(500);
pub const DEFAULT_RPC_ATTEMPTS: usize = 3;

pub const USAGE: &str = "\
Usage: log-node --id <node id> --bind <addr:port> [--peer <id>=<addr:port>]...
                (--host-store | --store <addr:port>) [--rpc-timeout-ms <ms>] [--rpc-attempts <n>]

Exactly one node in the cluster runs with --host-store and serves the shared store;
every other node points --store at it.

Example: log-node --id n1 --bind 127.0.0.1:7001 --peer n2=127.0.0.1:7002 --host-store
Example: log-node --id n2 --bind 127.0.0.1:7002 --peer n1=127.0.0.1:7001 --store 127.0.0.1:7001";

/// Where the shared `lin-kv` store lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreLocation {
    /// This node holds the store and serves it to its peers.
    Hosted,
    Remote(SocketAddr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeConfig {
    pub node_id: NodeId,
    pub bind_addr: SocketAddr,
    pub peers: Vec<(NodeId, SocketAddr)>,
    pub store: StoreLocation,
    pub rpc_timeout: Duration,
    pub rpc_attempts: usize,
}

impl NodeConfig {
    /// Parses `args` without the program name.
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut node_id: Option<NodeId> = None;
        let mut bind_addr: Option<SocketAddr> = None;
        let mut peers = Vec::new();
        let mut store_addr: Option<SocketAddr> = None;
        let mut host_store = false;
        let mut rpc_timeout = DEFAULT_RPC_TIMEOUT;
        let mut rpc_attempts = DEFAULT_RPC_ATTEMPTS;

        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            if flag == "--host-store" {
                host_store = true;
                i += 1;
                continue;
            }

            let value = args
                .get(i + 1)
                .ok_or_else(|| anyhow!("{} requires a value", flag))?;

            match flag {
                "--id" => node_id = Some(NodeId::new(value.as_str())),
                "--bind" => {
                    bind_addr = Some(value.parse().with_context(|| format!("invalid --bind {}", value))?)
                }
                "--peer" => peers.push(parse_peer(value)?),
                "--store" => {
                    store_addr = Some(value.parse().with_context(|| format!("invalid --store {}", value))?)
                }
                "--rpc-timeout-ms" => {
                    let ms: u64 = value
                        .parse()
                        .with_context(|| format!("invalid --rpc-timeout-ms {}", value))?;
                    rpc_timeout = Duration::from_millis(ms);
                }
                "--rpc-attempts" => {
                    rpc_attempts = value
                        .parse()
                        .with_context(|| format!("invalid --rpc-attempts {}", value))?;
                }
                other => bail!("unknown flag {}", other),
            }
            i += 2;
        }

        let node_id = node_id.ok_or_else(|| anyhow!("--id is required"))?;
        let bind_addr = bind_addr.ok_or_else(|| anyhow!("--bind is required"))?;
        if node_id == NodeId::store() {
            bail!("{} is reserved for the shared store", node_id);
        }
        if rpc_attempts == 0 {
            bail!("--rpc-attempts must be at least 1");
        }
        let store = match (host_store, store_addr) {
            (true, None) => StoreLocation::Hosted,
            (false, Some(addr)) => StoreLocation::Remote(addr),
            (true, Some(_)) => bail!("--host-store and --store are mutually exclusive"),
            (false, None) => bail!("either --host-store or --store <addr:port> is required"),
        };

        Ok(Self {
            node_id,
            bind_addr,
            peers,
            store,
            rpc_timeout,
            rpc_attempts,
        })
    }
}

fn parse_peer(value: &str) -> Result<(NodeId, SocketAddr)> {
    let (id, addr) = value
        .split_once('=')
        .ok_or_else(|| anyhow!("--peer expects <id>=<addr:port>, got {}", value))?;
    if id.is_empty() {
        bail!("--peer {} has an empty node id", value);
    }
    let addr = addr
        .parse()
        .with_context(|| format!("invalid address in --peer {}", value))?;
    Ok((NodeId::new(id), addr))
}
