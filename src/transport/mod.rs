//! Messaging Substrate
//!
//! The wire format and the request/response channel shared by every node.
//!
//! - **`protocol`**: JSON envelope, message bodies and endpoint paths.
//! - **`error`**: Numeric error codes and the typed `RpcError`.
//! - **`client`**: The `Transport` trait and its HTTP implementation.

pub mod client;
pub mod error;
pub mod protocol;
