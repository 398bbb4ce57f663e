//! Offset Allocation
//!
//! Hands out offsets per log key with optimistic concurrency control over the
//! shared store. The counter `offset_<key>` holds the highest offset handed out;
//! a caller wins offset `n` by swapping the counter from `n - 1` to `n`.
//!
//! Losing a swap means another allocator took that offset, so the loser moves
//! on to `n + 1` without re-reading the counter. The number of store round trips
//! therefore grows with the number of concurrent contenders only. There is no
//! fixed cap on attempts; sustained contention is logged once it passes
//! `CONTENTION_WARN_THRESHOLD`.

use std::future::Future;
use std::sync::Arc;

use super::keys::{entry_key, offset_key};
use crate::storage::client::SharedStore;
use crate::transport::error::{ErrorCode, RpcError, RpcResult};

pub const CONTENTION_WARN_THRESHOLD: u32 = 64;

/// Drives a compare-and-swap style `attempt` until it wins a candidate.
///
/// Starting from `start`, each `PreconditionFailed` moves to the next
/// candidate and each `KeyDoesNotExist` goes back to `first`. Any other error
/// ends the loop. Returns the candidate whose attempt succeeded.
pub async fn retry_on_conflict<F, Fut>(first: u64, start: u64, mut attempt: F) -> RpcResult<u64>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = RpcResult<()>>,
{
    let mut candidate = start;
    let mut retries = 0u32;

    loop {
        match attempt(candidate).await {
            Ok(()) => return Ok(candidate),
            Err(e) if e.is_conflict() => {
                tracing::debug!("Candidate {} lost a race, trying {}", candidate, candidate + 1);
                candidate += 1;
            }
            Err(e) if e.is_key_missing() => {
                tracing::debug!("Counter missing at candidate {}, restarting at {}", candidate, first);
                candidate = first;
            }
            Err(e) => return Err(e),
        }

        retries += 1;
        if retries == CONTENTION_WARN_THRESHOLD {
            tracing::warn!(
                "Allocation still contended after {} attempts (now at {})",
                retries,
                candidate
            );
        }
    }
}

pub struct OffsetAllocator {
    store: Arc<dyn SharedStore>,
}

impl OffsetAllocator {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    /// Reserves the next free offset for `key`.
    pub async fn allocate(&self, key: &str) -> RpcResult<u64> {
        let counter = offset_key(key);
        let current = self.store.read_optional(&counter).await?;
        let start = match current {
            None => 0,
            Some(highest) => highest
                .checked_add(1)
                .and_then(|next| u64::try_from(next).ok())
                .ok_or_else(|| {
                    RpcError::new(
                        ErrorCode::Crash,
                        format!("counter {} holds invalid value {}", counter, highest),
                    )
                })?,
        };

        let store = &self.store;
        let counter = &counter;
        retry_on_conflict(0, start, move |candidate| async move {
            let to = i64::try_from(candidate).map_err(|_| {
                RpcError::new(
                    ErrorCode::Crash,
                    format!("offset {} of {} is out of range", candidate, counter),
                )
            })?;
            store.compare_and_swap(counter, to - 1, to, true).await
        })
        .await
    }

    /// Allocates an offset for `key` and stores `value` under it.
    ///
    /// The entry write is unconditional: the offset is already exclusively ours.
    /// If it fails the offset stays consumed with no value behind it.
    pub async fn append(&self, key: &str, value: i64) -> RpcResult<u64> {
        let offset = self.allocate(key).await?;

        if let Err(e) = self.store.write(&entry_key(key, offset), value).await {
            tracing::error!(
                "Offset {} of {} allocated but its entry was not written: {}",
                offset,
                key,
                e
            );
            return Err(e);
        }

        tracing::debug!("Appended {} to {} at offset {}", value, key, offset);
        Ok(offset)
    }
}
