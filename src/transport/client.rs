use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::error::{ErrorCode, RpcError, RpcResult};
use super::protocol::{Body, ENDPOINT_RPC, Message, Payload};
use crate::membership::{service::MembershipService, types::NodeId};

/// Blocking request/response channel to another member of the cluster.
///
/// Used for forwarding appends to their owner and for every call to the shared
/// store. Implementations own their timeout and retry policy; an `error` reply
/// from the destination comes back as `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, dest: &NodeId, payload: Payload) -> RpcResult<Payload>;
}

/// `Transport` over HTTP: one `POST /rpc` per request, reply in the response body.
pub struct HttpTransport {
    membership: Arc<MembershipService>,
    http_client: reqwest::Client,
    next_msg_id: AtomicU64,
    timeout: Duration,
    attempts: usize,
}

impl HttpTransport {
    pub fn new(membership: Arc<MembershipService>, timeout: Duration, attempts: usize) -> Self {
        Self {
            membership,
            http_client: reqwest::Client::new(),
            next_msg_id: AtomicU64::new(1),
            timeout,
            attempts: attempts.max(1),
        }
    }

    /// Posts `payload`, retrying only while the connection cannot be established.
    ///
    /// A request that reached the peer is never re-sent: appends and CAS calls
    /// are not idempotent, so a timeout after delivery is reported, not retried.
    async fn post_with_retry(&self, url: String, payload: &Message) -> RpcResult<reqwest::Response> {
        let mut delay_ms = 150u64;

        for attempt in 0..self.attempts {
            let response = self
                .http_client
                .post(url.clone())
                .json(payload)
                .timeout(self.timeout)
                .send()
                .await;

            match response {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_connect() && attempt + 1 < self.attempts => {
                    tracing::debug!("Connect to {} failed (attempt {}): {}", url, attempt + 1, e);
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(1200);
                }
                Err(e) => return Err(request_error(e)),
            }
        }

        Err(RpcError::new(
            ErrorCode::TemporarilyUnavailable,
            "retry attempts exhausted",
        ))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, dest: &NodeId, payload: Payload) -> RpcResult<Payload> {
        let node = self.membership.get_member(dest).ok_or_else(|| {
            RpcError::new(ErrorCode::NodeNotFound, format!("unknown node {}", dest))
        })?;

        let msg_id = self.next_msg_id.fetch_add(1, Ordering::Relaxed);
        let request = Message {
            src: self.membership.local_id().clone(),
            dest: dest.clone(),
            body: Body {
                msg_id: Some(msg_id),
                in_reply_to: None,
                payload,
            },
        };

        let response = self
            .post_with_retry(format!("http://{}{}", node.http_addr, ENDPOINT_RPC), &request)
            .await?;

        if !response.status().is_success() {
            return Err(RpcError::new(
                ErrorCode::Crash,
                format!("{} answered with status {}", dest, response.status()),
            ));
        }

        let reply: Message = response.json().await.map_err(request_error)?;
        if reply.body.in_reply_to != Some(msg_id) {
            tracing::warn!(
                "Reply from {} answers {:?}, expected {}",
                dest,
                reply.body.in_reply_to,
                msg_id
            );
            return Err(RpcError::new(ErrorCode::Crash, "mismatched reply"));
        }

        reply.body.payload.into_result()
    }
}

fn request_error(e: reqwest::Error) -> RpcError {
    if e.is_timeout() {
        RpcError::new(ErrorCode::Timeout, e.to_string())
    } else if e.is_connect() {
        RpcError::new(ErrorCode::TemporarilyUnavailable, e.to_string())
    } else {
        RpcError::new(ErrorCode::Crash, e.to_string())
    }
}
