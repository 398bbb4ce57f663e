use super::memory::MemoryStore;
use crate::transport::error::RpcResult;
use crate::transport::protocol::Payload;

/// Answers a store request against the embedded store.
///
/// Returns `None` when `payload` is not a store request, so the caller can try
/// its other handlers.
pub fn handle_store_request(store: &MemoryStore, payload: &Payload) -> Option<RpcResult<Payload>> {
    let result = match payload {
        Payload::Read { key } => store.read(key).map(|value| Payload::ReadOk { value }),
        Payload::Write { key, value } => {
            store.write(key, *value);
            Ok(Payload::WriteOk)
        }
        Payload::Cas {
            key,
            from,
            to,
            create_if_not_exists,
        } => store
            .compare_and_swap(key, *from, *to, *create_if_not_exists)
            .map(|_| Payload::CasOk),
        _ => return None,
    };

    if let Err(e) = &result {
        tracing::debug!("Store request {:?} failed: {}", payload, e);
    }
    Some(result)
}
