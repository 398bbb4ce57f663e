//! Membership Module
//!
//! Holds the fixed set of cluster members known at process start.
//!
//! ## Core Concepts
//! - **NodeSet**: Every log node and the shared store service, with their HTTP addresses.
//! - **Roles**: Log nodes own partitions; the `lin-kv` store member only answers store requests.
//! - **Static**: Membership is fixed at startup and never changes while the process runs.

pub mod service;
pub mod types;
