//! Partitioned Log Cluster Library
//!
//! This library crate defines the modules of a replicated, Kafka-style append-only log.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of loosely coupled subsystems:
//!
//! - **`config`**: Command line parsing into a `NodeConfig`.
//! - **`log`**: The log itself. Routes keys to owning nodes, allocates gap-free offsets
//!   through compare-and-swap, and serves polls and consumer offset commits.
//! - **`membership`**: The static cluster view. Knows every log node and where the
//!   shared store lives.
//! - **`node`**: Per-process wiring and request dispatch, exposed over HTTP.
//! - **`storage`**: The linearizable key-value store the log is built on, either embedded
//!   in a node or reached remotely.
//! - **`transport`**: The JSON message envelope, typed error codes and the HTTP RPC client.

pub mod config;
pub mod log;
pub mod membership;
pub mod node;
pub mod storage;
pub mod transport;
