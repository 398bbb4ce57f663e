//! Partitioned Log Module
//!
//! Append-only logs keyed by string, with offsets allocated through the shared store.
//!
//! ## Core Concepts
//! - **Ownership**: `PartitionRouter` hashes each key to exactly one log node.
//! - **Forwarding**: A node receiving an append for a key it does not own relays it to the owner.
//! - **Allocation**: The owner wins offsets with compare-and-swap on the key's counter (`allocator`).
//! - **Reads**: `poll` scans each key forward to the first missing entry, keys in parallel.
//! - **Consumer Offsets**: Committed offsets are stored per key, last write wins.

pub mod allocator;
pub mod handlers;
pub mod keys;
pub mod partitioner;
pub mod service;

#[cfg(test)]
mod tests;
