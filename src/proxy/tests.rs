//! Proxy Module Tests
//!
//! ## Test Scopes
//! - **Single-flight creation**: one factory call and one shared handle per key under contention.
//! - **Destroy semantics**: release hooks, notification order, recreation after destroy.
//! - **Listener hub**: registration ids, removal, isolation of failing listeners.

#[cfg(test)]
mod tests {
    use crate::error::GridError;
    use crate::proxy::listeners::ProxyListenerHub;
    use crate::proxy::registry::ProxyRegistry;
    use crate::proxy::types::{
        DistributedObject, DistributedObjectEvent, EventKind, NamedProxy, ObjectKey, ProxyHandle,
    };
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct TrackedProxy {
        key: ObjectKey,
        destroyed: Arc<AtomicUsize>,
    }

    impl DistributedObject for TrackedProxy {
        fn key(&self) -> &ObjectKey {
            &self.key
        }

        fn on_destroy(&self) {
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn registry_with_map_service() -> (Arc<ProxyRegistry>, Arc<AtomicUsize>) {
        let registry = ProxyRegistry::new(ProxyListenerHub::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();

        registry.register_service("map", move |key| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                // Keep the creation window open so concurrent callers overlap.
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(Arc::new(NamedProxy::new(key)) as ProxyHandle)
            }
        });

        (registry, calls)
    }

    fn record_events(hub: &ProxyListenerHub) -> Arc<Mutex<Vec<DistributedObjectEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        hub.add_listener(move |event| {
            events_clone.lock().push(event.clone());
            Ok(())
        });
        events
    }

    fn key(service: &str, name: &str) -> ObjectKey {
        ObjectKey::new(service, name).unwrap()
    }

    // ============================================================
    // OBJECT KEY
    // ============================================================

    #[test]
    fn test_object_key_equality() {
        assert_eq!(key("map", "orders"), key("map", "orders"));
        assert_ne!(key("map", "orders"), key("queue", "orders"));
        assert_ne!(key("map", "orders"), key("map", "users"));
    }

    #[test]
    fn test_object_key_rejects_empty_names() {
        assert!(matches!(
            ObjectKey::new("map", ""),
            Err(GridError::InvalidArgument(_))
        ));
        assert!(matches!(
            ObjectKey::new("", "orders"),
            Err(GridError::InvalidArgument(_))
        ));
    }

    // ============================================================
    // SINGLE-FLIGHT CREATION
    // ============================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_get_or_create_invokes_factory_once() {
        // ARRANGE
        let (registry, calls) = registry_with_map_service();
        let events = record_events(registry.listeners());

        // ACT: 16 callers race on the same key
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.get_or_create("map", "orders").await.unwrap()
            }));
        }
        let mut proxies = Vec::new();
        for handle in handles {
            proxies.push(handle.await.unwrap());
        }

        // ASSERT: one factory call, one identity, one CREATED event
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        for proxy in &proxies {
            assert!(Arc::ptr_eq(proxy, &proxies[0]));
        }
        assert_eq!(registry.list_all(), vec![key("map", "orders")]);
        assert_eq!(
            *events.lock(),
            vec![DistributedObjectEvent::created(key("map", "orders"))]
        );
        assert_eq!(registry.proxy_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_callers_before_first_returns() {
        let (registry, calls) = registry_with_map_service();
        let events = record_events(registry.listeners());

        let (first, second) = tokio::join!(
            registry.get_or_create("map", "orders"),
            registry.get_or_create("map", "orders")
        );

        assert!(Arc::ptr_eq(&first.unwrap(), &second.unwrap()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.list_all(), vec![key("map", "orders")]);
        assert_eq!(events.lock().len(), 1);
        assert_eq!(events.lock()[0].kind, EventKind::Created);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_keys_do_not_wait_for_each_other() {
        // ARRANGE: the factory for "slow" blocks until released
        let registry = ProxyRegistry::new(ProxyListenerHub::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let release_clone = release.clone();

        registry.register_service("map", move |key| {
            let release = release_clone.clone();
            async move {
                if key.object_name() == "slow" {
                    release.notified().await;
                }
                Ok(Arc::new(NamedProxy::new(key)) as ProxyHandle)
            }
        });

        let slow = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.get_or_create("map", "slow").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // ACT: a different key completes while "slow" is still in flight
        let fast = tokio::time::timeout(
            Duration::from_secs(1),
            registry.get_or_create("map", "fast"),
        )
        .await;

        // ASSERT
        assert!(fast.expect("distinct key was blocked").is_ok());
        assert_eq!(registry.list_all(), vec![key("map", "fast")]);

        release.notify_one();
        assert!(slow.await.unwrap().is_ok());
        assert_eq!(registry.proxy_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_service() {
        let registry = ProxyRegistry::new(ProxyListenerHub::new());

        let result = registry.get_or_create("nope", "orders").await;

        assert!(matches!(result, Err(GridError::UnknownService(ref s)) if s == "nope"));
        assert!(registry.list_all().is_empty());
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected_without_calling_factory() {
        let (registry, calls) = registry_with_map_service();

        let result = registry.get_or_create("map", "").await;

        assert!(matches!(result, Err(GridError::InvalidArgument(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failing_factory_leaves_registry_unchanged() {
        // ARRANGE: fails on the first call only
        let registry = ProxyRegistry::new(ProxyListenerHub::new());
        let events = record_events(registry.listeners());
        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = attempts.clone();

        registry.register_service("queue", move |key| {
            let attempts = attempts_clone.clone();
            async move {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(anyhow::anyhow!("metadata agreement failed"));
                }
                Ok(Arc::new(NamedProxy::new(key)) as ProxyHandle)
            }
        });

        // ACT
        let first = registry.get_or_create("queue", "jobs").await;

        // ASSERT
        assert!(matches!(first, Err(GridError::Factory { .. })));
        assert!(registry.list_all().is_empty());
        assert!(events.lock().is_empty());

        // A later call retries the factory
        assert!(registry.get_or_create("queue", "jobs").await.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(events.lock().len(), 1);
    }

    // ============================================================
    // DESTROY
    // ============================================================

    #[tokio::test]
    async fn test_destroy_then_get_creates_new_handle() {
        // ARRANGE
        let (registry, calls) = registry_with_map_service();
        let original = registry.get_or_create("map", "orders").await.unwrap();
        let events = record_events(registry.listeners());

        // ACT
        assert!(registry.destroy("map", "orders").unwrap());
        let recreated = registry.get_or_create("map", "orders").await.unwrap();

        // ASSERT: new identity, DESTROYED then CREATED
        assert!(!Arc::ptr_eq(&original, &recreated));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            *events.lock(),
            vec![
                DistributedObjectEvent::destroyed(key("map", "orders")),
                DistributedObjectEvent::created(key("map", "orders")),
            ]
        );
    }

    #[tokio::test]
    async fn test_destroy_absent_is_noop() {
        let (registry, _) = registry_with_map_service();
        let events = record_events(registry.listeners());

        assert!(!registry.destroy("map", "missing").unwrap());
        assert!(events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_destroy_runs_release_hook_once() {
        let registry = ProxyRegistry::new(ProxyListenerHub::new());
        let destroyed = Arc::new(AtomicUsize::new(0));
        let destroyed_clone = destroyed.clone();

        registry.register_service("lock", move |key| {
            let destroyed = destroyed_clone.clone();
            async move { Ok(Arc::new(TrackedProxy { key, destroyed }) as ProxyHandle) }
        });

        registry.get_or_create("lock", "l1").await.unwrap();
        assert!(registry.destroy("lock", "l1").unwrap());
        assert!(!registry.destroy("lock", "l1").unwrap());

        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(registry.proxy_count(), 0);
    }

    #[tokio::test]
    async fn test_destroy_all_is_idempotent() {
        // ARRANGE
        let (registry, _) = registry_with_map_service();
        for name in ["a", "b", "c"] {
            registry.get_or_create("map", name).await.unwrap();
        }
        let events = record_events(registry.listeners());

        // ACT
        let first = registry.destroy_all();
        let second = registry.destroy_all();

        // ASSERT
        assert_eq!(first, 3);
        assert_eq!(second, 0);
        assert!(registry.list_all().is_empty());
        let events = events.lock();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.kind == EventKind::Destroyed));
    }

    #[tokio::test]
    async fn test_closed_registry_rejects_creation() {
        let (registry, calls) = registry_with_map_service();

        registry.close();
        let result = registry.get_or_create("map", "orders").await;

        assert!(matches!(result, Err(GridError::NotActive(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_get_distributed_objects_snapshot() {
        let (registry, _) = registry_with_map_service();
        registry.get_or_create("map", "a").await.unwrap();
        registry.get_or_create("map", "b").await.unwrap();

        let mut names: Vec<String> = registry
            .get_distributed_objects()
            .iter()
            .map(|proxy| proxy.key().object_name().to_string())
            .collect();
        names.sort();

        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_creation_finishing_after_close_is_released() {
        // ARRANGE: a creation that is still inside its 50ms factory
        let (registry, _) = registry_with_map_service();
        let events = record_events(registry.listeners());
        let creator = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.get_or_create("map", "late").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // ACT: close and destroy without waiting for the creation
        registry.close();
        let drained = registry.destroy_all();
        let result = creator.await.unwrap();

        // ASSERT
        assert_eq!(drained, 0);
        assert!(matches!(result, Err(GridError::NotActive(_))));
        assert!(registry.list_all().is_empty());
        assert_eq!(registry.proxy_count(), 0);
        assert_eq!(
            *events.lock(),
            vec![
                DistributedObjectEvent::created(key("map", "late")),
                DistributedObjectEvent::destroyed(key("map", "late")),
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_drain_waits_for_in_flight_creation() {
        // ARRANGE
        let (registry, _) = registry_with_map_service();
        registry.get_or_create("map", "ready").await.unwrap();
        let events = record_events(registry.listeners());
        let creator = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.get_or_create("map", "slow").await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // ACT
        let drained = registry.drain().await;

        // ASSERT: both proxies are gone before drain returns
        let kinds: Vec<EventKind> = events.lock().iter().map(|event| event.kind).collect();
        assert_eq!(drained, 1);
        assert!(registry.list_all().is_empty());
        assert_eq!(registry.proxy_count(), 0);
        assert_eq!(
            kinds,
            vec![EventKind::Created, EventKind::Destroyed, EventKind::Destroyed]
        );
        assert!(matches!(
            creator.await.unwrap(),
            Err(GridError::NotActive(_))
        ));
    }

    #[tokio::test]
    async fn test_drain_on_idle_registry() {
        let (registry, _) = registry_with_map_service();
        registry.get_or_create("map", "a").await.unwrap();

        assert_eq!(registry.drain().await, 1);
        assert_eq!(registry.drain().await, 0);
        assert!(registry.is_closed());
    }

    // ============================================================
    // LISTENER HUB
    // ============================================================

    #[test]
    fn test_listener_ids_are_unique() {
        let hub = ProxyListenerHub::new();

        let first = hub.add_listener(|_| Ok(()));
        let second = hub.add_listener(|_| Ok(()));

        assert_ne!(first, second);
        assert_eq!(hub.listener_count(), 2);
    }

    #[test]
    fn test_removed_listener_receives_nothing() {
        let hub = ProxyListenerHub::new();
        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = received.clone();
        let id = hub.add_listener(move |_| {
            received_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        hub.publish(&DistributedObjectEvent::created(key("map", "a")));
        assert!(hub.remove_listener(&id));
        hub.publish(&DistributedObjectEvent::created(key("map", "b")));

        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_unknown_listener_returns_false() {
        let hub = ProxyListenerHub::new();
        hub.add_listener(|_| Ok(()));

        let unknown = crate::proxy::types::ListenerId::new();

        assert!(!hub.remove_listener(&unknown));
        assert_eq!(hub.listener_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_listeners_are_isolated() {
        // ARRANGE: one erroring and one panicking listener next to a healthy one
        let (registry, _) = registry_with_map_service();
        registry
            .listeners()
            .add_listener(|_| Err(anyhow::anyhow!("listener failure")));
        registry
            .listeners()
            .add_listener(|_| panic!("listener panic"));
        let events = record_events(registry.listeners());

        // ACT
        let created = registry.get_or_create("map", "orders").await;
        let destroyed = registry.destroy("map", "orders");

        // ASSERT: the caller never sees the listener failures
        assert!(created.is_ok());
        assert!(destroyed.unwrap());
        assert_eq!(events.lock().len(), 2);
    }
}
