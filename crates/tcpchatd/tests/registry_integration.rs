//! Integration tests for the Registry Actor.
//!
//! These tests verify the registry works correctly as a complete system,
//! testing the spawn_registry() function and RegistryHandle interface.
//!
//! Tests CAN use `.unwrap()` and `.expect()`; the panic-free behavior of
//! production code is checked through assertions.

use std::sync::Arc;

use tcpchat_core::{DisplayName, SessionId};
use tcpchat_protocol::Outbound;
use tcpchatd::registry::{spawn_registry, RegistryError, RegistryHandle, SessionEntry};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Test Helpers
// ============================================================================

fn name(s: &str) -> DisplayName {
    DisplayName::parse(s).expect("valid test name")
}

/// Builds an entry with a fresh outbound queue. The receiver is returned so
/// the queue stays open.
fn create_entry(id: u64, who: &str) -> (SessionEntry, mpsc::Receiver<Outbound>) {
    let (tx, rx) = mpsc::channel(10);
    let entry = SessionEntry::new(
        SessionId::new(id),
        name(who),
        "127.0.0.1:40000".parse().unwrap(),
        tx,
        CancellationToken::new(),
    );
    (entry, rx)
}

async fn register(handle: &RegistryHandle, id: u64, who: &str) -> mpsc::Receiver<Outbound> {
    let (entry, rx) = create_entry(id, who);
    handle.register(entry).await.expect("registration should succeed");
    rx
}

// ============================================================================
// Basic Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_basic_lifecycle() {
    let handle = spawn_registry();

    let _rx = register(&handle, 1, "alice").await;

    assert_eq!(handle.count().await, 1);
    assert!(handle.name_exists(name("alice")).await);

    let snapshot = handle.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, SessionId::new(1));
    assert_eq!(snapshot[0].name, "alice");

    let removed = handle.unregister(SessionId::new(1)).await;
    assert_eq!(removed.map(|e| e.name), Some(name("alice")));
    assert_eq!(handle.count().await, 0);
    assert!(!handle.name_exists(name("alice")).await);

    assert!(handle.is_connected());
}

#[tokio::test]
async fn test_unregister_is_idempotent() {
    let handle = spawn_registry();
    let _rx = register(&handle, 1, "alice").await;

    assert!(handle.unregister(SessionId::new(1)).await.is_some());
    assert!(handle.unregister(SessionId::new(1)).await.is_none());
    assert!(handle.unregister(SessionId::new(99)).await.is_none());
}

#[tokio::test]
async fn test_name_freed_after_unregister() {
    let handle = spawn_registry();
    let _rx1 = register(&handle, 1, "alice").await;
    handle.unregister(SessionId::new(1)).await;

    let _rx2 = register(&handle, 2, "alice").await;
    assert_eq!(handle.count().await, 1);
}

// ============================================================================
// Name Uniqueness Tests
// ============================================================================

#[tokio::test]
async fn test_duplicate_name_rejected() {
    let handle = spawn_registry();
    let _rx = register(&handle, 1, "alice").await;

    let (entry, _rx2) = create_entry(2, "alice");
    let result = handle.register(entry).await;

    assert_eq!(
        result,
        Err(RegistryError::NameTaken {
            name: name("alice")
        })
    );
    assert_eq!(handle.count().await, 1);
}

#[tokio::test]
async fn test_names_are_case_sensitive() {
    let handle = spawn_registry();
    let _rx1 = register(&handle, 1, "alice").await;
    let _rx2 = register(&handle, 2, "Alice").await;

    assert_eq!(handle.count().await, 2);
}

#[tokio::test]
async fn test_concurrent_claims_for_same_name() {
    let handle = spawn_registry();
    let mut tasks = Vec::new();

    for id in 0..20 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            let (entry, rx) = create_entry(id, "carol");
            let result = handle.register(entry).await;
            (result, rx)
        }));
    }

    let mut winners = 0;
    let mut receivers = Vec::new();
    for task in tasks {
        let (result, rx) = task.await.unwrap();
        match result {
            Ok(()) => winners += 1,
            Err(RegistryError::NameTaken { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
        receivers.push(rx);
    }

    assert_eq!(winners, 1, "exactly one claim for a name may win");
    assert_eq!(handle.count().await, 1);
}

// ============================================================================
// Rename Tests
// ============================================================================

#[tokio::test]
async fn test_rename_returns_previous_name() {
    let handle = spawn_registry();
    let _rx = register(&handle, 1, "alice").await;

    let old = handle.rename(SessionId::new(1), name("alicia")).await;
    assert_eq!(old, Ok(name("alice")));

    assert!(!handle.name_exists(name("alice")).await);
    assert!(handle.name_exists(name("alicia")).await);
}

#[tokio::test]
async fn test_rename_to_taken_name_keeps_old_name() {
    let handle = spawn_registry();
    let _rx1 = register(&handle, 1, "alice").await;
    let _rx2 = register(&handle, 2, "bob").await;

    let result = handle.rename(SessionId::new(2), name("alice")).await;
    assert!(matches!(result, Err(RegistryError::NameTaken { .. })));

    let snapshot = handle.snapshot().await;
    let bob = snapshot.iter().find(|e| e.id == SessionId::new(2)).unwrap();
    assert_eq!(bob.name, "bob");
}

#[tokio::test]
async fn test_rename_unknown_session() {
    let handle = spawn_registry();

    let result = handle.rename(SessionId::new(7), name("ghost")).await;
    assert_eq!(
        result,
        Err(RegistryError::SessionNotFound {
            session_id: SessionId::new(7)
        })
    );
}

// ============================================================================
// Shutdown Tests
// ============================================================================

#[tokio::test]
async fn test_drain_empties_registry() {
    let handle = spawn_registry();
    let _rx1 = register(&handle, 1, "alice").await;
    let _rx2 = register(&handle, 2, "bob").await;

    let drained = handle.drain().await;
    assert_eq!(drained.len(), 2);
    assert_eq!(handle.count().await, 0);

    // Drained sessions no longer own a departure
    assert!(handle.unregister(SessionId::new(1)).await.is_none());
}

#[tokio::test]
async fn test_snapshot_queues_are_live() {
    let handle = spawn_registry();
    let mut rx = register(&handle, 1, "alice").await;

    for entry in handle.snapshot().await {
        entry
            .outbound
            .send(Outbound::Joined(name("bob")))
            .await
            .unwrap();
    }

    assert_eq!(rx.recv().await, Some(Outbound::Joined(name("bob"))));
}

#[tokio::test]
async fn test_many_handles_share_state() {
    let handle = Arc::new(spawn_registry());
    let mut tasks = Vec::new();

    for id in 0..10u64 {
        let handle = Arc::clone(&handle);
        tasks.push(tokio::spawn(async move {
            let (entry, rx) = create_entry(id, &format!("user{id}"));
            handle.register(entry).await.unwrap();
            rx
        }));
    }

    let mut receivers = Vec::new();
    for task in tasks {
        receivers.push(task.await.unwrap());
    }

    assert_eq!(handle.count().await, 10);
}
