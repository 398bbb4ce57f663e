use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::transport::error::{RpcError, RpcResult};

/// In-memory linearizable key/value store.
///
/// Each operation touches a single key and runs under that key's shard lock,
/// so reads, writes and compare-and-swap are atomic per key. This is the
/// backing store log nodes allocate offsets against, either embedded in the
/// process or served to peers as the `lin-kv` service.
#[derive(Default)]
pub struct MemoryStore {
    data: DashMap<String, i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    pub fn read(&self, key: &str) -> RpcResult<i64> {
        self.data
            .get(key)
            .map(|value| *value)
            .ok_or_else(|| RpcError::key_does_not_exist(key))
    }

    pub fn write(&self, key: &str, value: i64) {
        self.data.insert(key.to_string(), value);
    }

    /// Sets `key` to `to` only if it currently holds `from`.
    ///
    /// An absent key is created with `to` when `create_if_missing` is set,
    /// and reported as `KeyDoesNotExist` otherwise.
    pub fn compare_and_swap(
        &self,
        key: &str,
        from: i64,
        to: i64,
        create_if_missing: bool,
    ) -> RpcResult<()> {
        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let current = *entry.get();
                if current != from {
                    return Err(RpcError::precondition_failed(format!(
                        "expected {} but {} holds {}",
                        from, key, current
                    )));
                }
                entry.insert(to);
                Ok(())
            }
            Entry::Vacant(entry) => {
                if !create_if_missing {
                    return Err(RpcError::key_does_not_exist(key));
                }
                entry.insert(to);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
