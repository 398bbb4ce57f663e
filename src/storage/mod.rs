//! Shared Store Module
//!
//! The linearizable key/value store that holds all authoritative log state.
//!
//! ## Core Concepts
//! - **`SharedStore`**: `read`, `write` and `compare_and_swap`, the only operations the log needs.
//! - **Embedded**: `MemoryStore` keeps the data in-process with per-key atomic updates.
//! - **Remote**: `RemoteStore` reaches the `lin-kv` service through the messaging substrate.
//! - **Serving**: A node that embeds the store answers `read`/`write`/`cas` requests from peers.

pub mod client;
pub mod handlers;
pub mod memory;
