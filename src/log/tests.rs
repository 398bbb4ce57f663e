//! Log Module Tests
//!
//! Validates routing, offset allocation and the read paths of the log on a
//! single node. Forwarding between nodes is covered by the node tests.
//!
//! ## Test Scopes
//! - **Partitioner**: Deterministic, order-independent ownership.
//! - **Allocator**: Gap-free offsets under contention and the conflict retry loop.
//! - **LogService**: Append, poll and consumer offsets against the shared store.

#[cfg(test)]
mod tests {
    use crate::log::allocator::{OffsetAllocator, retry_on_conflict};
    use crate::log::handlers::handle_log_request;
    use crate::log::keys::{committed_key, entry_key, offset_key};
    use crate::log::partitioner::PartitionRouter;
    use crate::log::service::LogService;
    use crate::membership::service::MembershipService;
    use crate::membership::types::{Node, NodeId};
    use crate::storage::client::SharedStore;
    use crate::storage::memory::MemoryStore;
    use crate::transport::client::Transport;
    use crate::transport::error::{ErrorCode, RpcError, RpcResult};
    use crate::transport::protocol::Payload;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Transport for a one-node cluster; nothing should ever be sent.
    struct NoPeers;

    #[async_trait]
    impl Transport for NoPeers {
        async fn call(&self, dest: &NodeId, _payload: Payload) -> RpcResult<Payload> {
            Err(RpcError::new(ErrorCode::NodeNotFound, dest.to_string()))
        }
    }

    /// Store wrapper that injects failures into selected operations.
    struct FaultyStore {
        inner: MemoryStore,
        missing_on_first_cas: AtomicBool,
        fail_entry_writes: bool,
        cas_calls: AtomicUsize,
    }

    impl FaultyStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                missing_on_first_cas: AtomicBool::new(false),
                fail_entry_writes: false,
                cas_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SharedStore for FaultyStore {
        async fn read(&self, key: &str) -> RpcResult<i64> {
            self.inner.read(key)
        }

        async fn write(&self, key: &str, value: i64) -> RpcResult<()> {
            if self.fail_entry_writes && !key.starts_with("offset_") {
                return Err(RpcError::new(ErrorCode::Crash, "disk on fire"));
            }
            self.inner.write(key, value);
            Ok(())
        }

        async fn compare_and_swap(
            &self,
            key: &str,
            from: i64,
            to: i64,
            create_if_missing: bool,
        ) -> RpcResult<()> {
            self.cas_calls.fetch_add(1, Ordering::SeqCst);
            if self.missing_on_first_cas.swap(false, Ordering::SeqCst) {
                return Err(RpcError::key_does_not_exist(key));
            }
            self.inner.compare_and_swap(key, from, to, create_if_missing)
        }
    }

    /// Yields to the scheduler around every store call so concurrent
    /// allocations interleave between their read and their swap.
    struct YieldingStore {
        inner: MemoryStore,
        conflicts: AtomicUsize,
    }

    impl YieldingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                conflicts: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SharedStore for YieldingStore {
        async fn read(&self, key: &str) -> RpcResult<i64> {
            let value = self.inner.read(key);
            tokio::task::yield_now().await;
            value
        }

        async fn write(&self, key: &str, value: i64) -> RpcResult<()> {
            tokio::task::yield_now().await;
            self.inner.write(key, value);
            Ok(())
        }

        async fn compare_and_swap(
            &self,
            key: &str,
            from: i64,
            to: i64,
            create_if_missing: bool,
        ) -> RpcResult<()> {
            tokio::task::yield_now().await;
            let result = self.inner.compare_and_swap(key, from, to, create_if_missing);
            if matches!(&result, Err(e) if e.is_conflict()) {
                self.conflicts.fetch_add(1, Ordering::SeqCst);
            }
            result
        }
    }

    fn single_node(store: Arc<dyn SharedStore>) -> LogService {
        let local = Node::log(NodeId::new("n1"), "127.0.0.1:7001".parse().unwrap());
        let membership = MembershipService::new(local, vec![]).unwrap();
        LogService::new(membership, store, Arc::new(NoPeers)).unwrap()
    }

    fn ids(names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|name| NodeId::new(*name)).collect()
    }

    // ============================================================
    // PARTITIONER TESTS
    // ============================================================

    #[test]
    fn test_owner_is_deterministic() {
        let router = PartitionRouter::new(NodeId::new("n1"), ids(&["n1", "n2", "n3"])).unwrap();

        let first = router.owner("k1").clone();
        for _ in 0..10 {
            assert_eq!(router.owner("k1"), &first);
        }
    }

    #[test]
    fn test_owner_ignores_configuration_order() {
        let a = PartitionRouter::new(NodeId::new("n1"), ids(&["n1", "n2", "n3"])).unwrap();
        let b = PartitionRouter::new(NodeId::new("n3"), ids(&["n3", "n1", "n2", "n1"])).unwrap();

        assert_eq!(b.node_ids(), a.node_ids());
        for i in 0..200 {
            let key = format!("{}", i);
            assert_eq!(a.owner(&key), b.owner(&key));
        }
    }

    #[test]
    fn test_owner_matches_digest_modulo() {
        let router = PartitionRouter::new(NodeId::new("n1"), ids(&["n1", "n2"])).unwrap();
        let expected = &router.node_ids()[PartitionRouter::hash_key("k1") % 2];
        assert_eq!(router.owner("k1"), expected);
    }

    #[test]
    fn test_keys_spread_over_all_nodes() {
        let router = PartitionRouter::new(NodeId::new("n1"), ids(&["n1", "n2", "n3"])).unwrap();

        let owners: HashSet<NodeId> = (0..300)
            .map(|i| router.owner(&format!("key_{}", i)).clone())
            .collect();
        assert_eq!(owners.len(), 3, "every node should own some keys");
    }

    #[test]
    fn test_is_local_agrees_with_owner() {
        let router = PartitionRouter::new(NodeId::new("n2"), ids(&["n1", "n2"])).unwrap();
        for i in 0..50 {
            let key = format!("{}", i);
            assert_eq!(router.is_local(&key), router.owner(&key) == &NodeId::new("n2"));
        }
    }

    #[test]
    fn test_router_rejects_bad_node_sets() {
        assert!(PartitionRouter::new(NodeId::new("n1"), vec![]).is_err());
        assert!(PartitionRouter::new(NodeId::new("n9"), ids(&["n1", "n2"])).is_err());
    }

    // ============================================================
    // STORE KEY TESTS
    // ============================================================

    #[test]
    fn test_store_key_layout() {
        assert_eq!(offset_key("k1"), "offset_k1");
        assert_eq!(entry_key("k1", 7), "k1_7");
        assert_eq!(committed_key("k1"), "committed_k1");
    }

    // ============================================================
    // RETRY HELPER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_retry_advances_past_conflicts() {
        let mut attempts = Vec::new();
        let won = retry_on_conflict(0, 2, |candidate| {
            attempts.push(candidate);
            async move {
                if candidate < 5 {
                    Err(RpcError::precondition_failed("taken"))
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(won, 5);
        assert_eq!(attempts, vec![2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_retry_restarts_when_key_is_missing() {
        let mut attempts = Vec::new();
        let won = retry_on_conflict(0, 4, |candidate| {
            attempts.push(candidate);
            let first = attempts.len() == 1;
            async move {
                if first {
                    Err(RpcError::key_does_not_exist("offset_k1"))
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(won, 0);
        assert_eq!(attempts, vec![4, 0]);
    }

    #[tokio::test]
    async fn test_retry_stops_on_other_errors() {
        let err = retry_on_conflict(0, 0, |_| async {
            Err::<(), _>(RpcError::new(ErrorCode::Timeout, "store unreachable"))
        })
        .await
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::Timeout);
    }

    // ============================================================
    // ALLOCATOR TESTS
    // ============================================================

    #[tokio::test]
    async fn test_first_allocations_start_at_zero() {
        let store = Arc::new(MemoryStore::new());
        let allocator = OffsetAllocator::new(store.clone());

        assert_eq!(allocator.append("k1", 10).await.unwrap(), 0);
        assert_eq!(allocator.append("k1", 20).await.unwrap(), 1);
        assert_eq!(allocator.append("k2", 30).await.unwrap(), 0);

        assert_eq!(store.read("offset_k1").unwrap(), 1);
        assert_eq!(store.read("k1_0").unwrap(), 10);
        assert_eq!(store.read("k1_1").unwrap(), 20);
        assert_eq!(store.read("k2_0").unwrap(), 30);
    }

    #[tokio::test]
    async fn test_allocation_continues_from_stored_counter() {
        let store = Arc::new(MemoryStore::new());
        store.write("offset_k1", 41);
        let allocator = OffsetAllocator::new(store.clone());

        assert_eq!(allocator.allocate("k1").await.unwrap(), 42);
        assert_eq!(store.read("offset_k1").unwrap(), 42);
    }

    #[tokio::test]
    async fn test_concurrent_allocations_are_gap_free() {
        let store = Arc::new(MemoryStore::new());
        let allocator = Arc::new(OffsetAllocator::new(store.clone()));

        let mut handles = Vec::new();
        for i in 0..100 {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move {
                allocator.append("k1", i).await.unwrap()
            }));
        }

        let mut offsets = Vec::new();
        for handle in handles {
            offsets.push(handle.await.unwrap());
        }
        offsets.sort();

        assert_eq!(offsets, (0..100).collect::<Vec<u64>>());
        assert_eq!(store.read("offset_k1").unwrap(), 99);
    }

    #[tokio::test]
    async fn test_contended_allocations_retry_and_stay_gap_free() {
        let store = Arc::new(YieldingStore::new());
        let allocator = Arc::new(OffsetAllocator::new(store.clone()));

        let mut handles = Vec::new();
        for i in 0..50 {
            let allocator = allocator.clone();
            handles.push(tokio::spawn(async move {
                allocator.append("k1", i).await.unwrap()
            }));
        }

        let mut offsets = Vec::new();
        for handle in handles {
            offsets.push(handle.await.unwrap());
        }
        offsets.sort();

        assert!(store.conflicts.load(Ordering::SeqCst) > 0);
        assert_eq!(offsets, (0..50).collect::<Vec<u64>>());
        assert_eq!(store.inner.read("offset_k1").unwrap(), 49);
        for offset in 0..50u64 {
            assert!(store.inner.read(&entry_key("k1", offset)).is_ok());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_contended_allocations_on_many_keys() {
        let store = Arc::new(YieldingStore::new());
        let allocator = Arc::new(OffsetAllocator::new(store.clone()));
        let keys = ["k1", "k2", "k3"];

        let mut handles = Vec::new();
        for key in keys {
            for i in 0..40 {
                let allocator = allocator.clone();
                handles.push(tokio::spawn(async move {
                    (key, allocator.append(key, i).await.unwrap())
                }));
            }
        }

        let mut allocated: HashMap<&str, Vec<u64>> = HashMap::new();
        for handle in handles {
            let (key, offset) = handle.await.unwrap();
            allocated.entry(key).or_default().push(offset);
        }

        assert!(store.conflicts.load(Ordering::SeqCst) > 0);
        for key in keys {
            let mut offsets = allocated.remove(key).unwrap();
            offsets.sort();
            assert_eq!(offsets, (0..40).collect::<Vec<u64>>());
        }
    }

    #[tokio::test]
    async fn test_exhausted_counter_is_reported() {
        let store = Arc::new(MemoryStore::new());
        store.write(&offset_key("k1"), i64::MAX);
        let allocator = OffsetAllocator::new(store.clone());

        let err = allocator.allocate("k1").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Crash);
        assert_eq!(store.read(&offset_key("k1")).unwrap(), i64::MAX);
    }

    #[tokio::test]
    async fn test_missing_counter_during_swap_restarts_at_zero() {
        let store = Arc::new(FaultyStore::new());
        store.missing_on_first_cas.store(true, Ordering::SeqCst);
        let allocator = OffsetAllocator::new(store.clone());

        assert_eq!(allocator.append("k1", 5).await.unwrap(), 0);
        assert_eq!(store.cas_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.inner.read("offset_k1").unwrap(), 0);
        assert_eq!(store.inner.read("k1_0").unwrap(), 5);
    }

    #[tokio::test]
    async fn test_failed_entry_write_consumes_offset() {
        let mut faulty = FaultyStore::new();
        faulty.fail_entry_writes = true;
        let store = Arc::new(faulty);
        let allocator = OffsetAllocator::new(store.clone());

        let err = allocator.append("k1", 5).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Crash);
        assert_eq!(store.inner.read("offset_k1").unwrap(), 0);
        assert!(store.inner.read("k1_0").is_err());
    }

    // ============================================================
    // LOG SERVICE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_append_then_poll() {
        let log = single_node(Arc::new(MemoryStore::new()));

        assert_eq!(log.append("k1", 10).await.unwrap(), 0);
        assert_eq!(log.append("k1", 20).await.unwrap(), 1);

        let msgs = log
            .poll(HashMap::from([("k1".to_string(), 0)]))
            .await
            .unwrap();
        assert_eq!(msgs, HashMap::from([("k1".to_string(), vec![(0, 10), (1, 20)])]));
    }

    #[tokio::test]
    async fn test_poll_from_middle_and_past_end() {
        let log = single_node(Arc::new(MemoryStore::new()));
        for value in [1, 2, 3] {
            log.append("k1", value).await.unwrap();
        }
        log.append("k2", 9).await.unwrap();

        let msgs = log
            .poll(HashMap::from([
                ("k1".to_string(), 1),
                ("k2".to_string(), 5),
                ("k3".to_string(), 0),
            ]))
            .await
            .unwrap();

        assert_eq!(msgs.get("k1"), Some(&vec![(1, 2), (2, 3)]));
        assert!(!msgs.contains_key("k2"));
        assert!(!msgs.contains_key("k3"));
    }

    #[tokio::test]
    async fn test_poll_stops_at_first_missing_entry() {
        let store = Arc::new(MemoryStore::new());
        store.write("k1_0", 1);
        store.write("k1_1", 2);
        store.write("k1_3", 4);
        let log = single_node(store);

        let msgs = log
            .poll(HashMap::from([("k1".to_string(), 0)]))
            .await
            .unwrap();
        assert_eq!(msgs.get("k1"), Some(&vec![(0, 1), (1, 2)]));
    }

    #[tokio::test]
    async fn test_commit_is_last_write_wins() {
        let log = single_node(Arc::new(MemoryStore::new()));

        log.commit_offsets(HashMap::from([("k1".to_string(), 1)]))
            .await
            .unwrap();
        let listed = log
            .list_committed_offsets(vec!["k1".to_string()])
            .await
            .unwrap();
        assert_eq!(listed, HashMap::from([("k1".to_string(), 1)]));

        log.commit_offsets(HashMap::from([("k1".to_string(), 0)]))
            .await
            .unwrap();
        let listed = log
            .list_committed_offsets(vec!["k1".to_string()])
            .await
            .unwrap();
        assert_eq!(listed, HashMap::from([("k1".to_string(), 0)]));
    }

    #[tokio::test]
    async fn test_list_omits_uncommitted_keys() {
        let log = single_node(Arc::new(MemoryStore::new()));
        log.commit_offsets(HashMap::from([
            ("k1".to_string(), 3),
            ("k3".to_string(), 7),
        ]))
        .await
        .unwrap();

        let listed = log
            .list_committed_offsets(vec!["k1".to_string(), "k2".to_string(), "k3".to_string()])
            .await
            .unwrap();
        assert_eq!(
            listed,
            HashMap::from([("k1".to_string(), 3), ("k3".to_string(), 7)])
        );
    }

    #[tokio::test]
    async fn test_commit_failure_is_reported() {
        let mut faulty = FaultyStore::new();
        faulty.fail_entry_writes = true;
        let log = single_node(Arc::new(faulty));

        let err = log
            .commit_offsets(HashMap::from([("k1".to_string(), 1)]))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Crash);
    }

    #[tokio::test]
    async fn test_commit_does_not_touch_log_counter() {
        let store = Arc::new(MemoryStore::new());
        let log = single_node(store.clone());

        log.commit_offsets(HashMap::from([("k1".to_string(), 10)]))
            .await
            .unwrap();
        assert!(store.read("offset_k1").is_err());
        assert_eq!(log.append("k1", 1).await.unwrap(), 0);
    }

    // ============================================================
    // HANDLER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_handler_replies_with_ok_types() {
        let log = single_node(Arc::new(MemoryStore::new()));

        let reply = handle_log_request(
            &log,
            Payload::Send {
                key: "k1".to_string(),
                msg: 10,
            },
        )
        .await
        .unwrap();
        assert_eq!(reply, Payload::SendOk { offset: 0 });

        let reply = handle_log_request(
            &log,
            Payload::Forward {
                key: "k1".to_string(),
                msg: 11,
            },
        )
        .await
        .unwrap();
        assert_eq!(reply, Payload::ForwardOk { offset: 1 });

        let reply = handle_log_request(
            &log,
            Payload::CommitOffsets {
                offsets: HashMap::from([("k1".to_string(), 1)]),
            },
        )
        .await
        .unwrap();
        assert_eq!(reply, Payload::CommitOffsetsOk);
    }

    #[tokio::test]
    async fn test_handler_rejects_non_log_payloads() {
        let log = single_node(Arc::new(MemoryStore::new()));
        let err = handle_log_request(&log, Payload::SendOk { offset: 1 })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotSupported);
    }
}
