//! Integration tests for the Registry Actor.
//!
//! These tests drive the registry through `spawn_registry()` and the
//! `RegistryHandle` API, including many concurrent callers.
//!
//! Tests CAN use `.unwrap()` and `.expect()`; the panic-free behavior of
//! production code is checked through assertions.

use std::time::Duration;

use relay_core::{DisplayName, SessionId};
use relay_protocol::Notification;
use relayd::registry::{
    spawn_registry, Outbound, RegistryError, RegistryEvent, RegistryHandle, RemovalReason,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for an event
const EVENT_TIMEOUT: Duration = Duration::from_secs(1);

/// Number of sessions racing for one name
const RACERS: u64 = 32;

// ============================================================================
// Test Helpers
// ============================================================================

type Inbox = mpsc::UnboundedReceiver<Outbound>;

/// Joins `name` as session `id`, panicking on rejection.
async fn join(handle: &RegistryHandle, id: u64, name: &str) -> Inbox {
    let (outbox, inbox) = mpsc::unbounded_channel();
    handle
        .try_register(SessionId::new(id), name.to_string(), outbox)
        .await
        .expect("join should succeed");
    inbox
}

/// Collects every item queued so far.
fn drain(inbox: &mut Inbox) -> Vec<Outbound> {
    let mut items = Vec::new();
    while let Ok(item) = inbox.try_recv() {
        items.push(item);
    }
    items
}

fn line(text: &str) -> Outbound {
    Outbound::Line(text.to_string())
}

fn names(snapshot: Vec<DisplayName>) -> Vec<String> {
    snapshot.into_iter().map(String::from).collect()
}

// ============================================================================
// Join Tests
// ============================================================================

#[tokio::test]
async fn test_join_then_snapshot() {
    let handle = spawn_registry();
    let _alice = join(&handle, 1, "alice").await;

    assert_eq!(names(handle.snapshot().await), vec!["alice"]);
    assert!(handle.is_connected());
}

#[tokio::test]
async fn test_joiner_sees_join_then_user_list() {
    let handle = spawn_registry();
    let mut alice = join(&handle, 1, "alice").await;
    let mut bob = join(&handle, 2, "bob").await;

    assert_eq!(
        drain(&mut alice),
        vec![
            line("SERVER: alice has joined the chat."),
            line("SERVER: Current users: alice"),
            line("SERVER: bob has joined the chat."),
        ]
    );
    assert_eq!(
        drain(&mut bob),
        vec![
            line("SERVER: bob has joined the chat."),
            line("SERVER: Current users: alice, bob"),
        ]
    );
}

#[tokio::test]
async fn test_duplicate_name_rejected() {
    let handle = spawn_registry();
    let _alice = join(&handle, 1, "alice").await;

    let (outbox, mut inbox) = mpsc::unbounded_channel();
    let result = handle
        .try_register(SessionId::new(2), "alice".to_string(), outbox)
        .await;

    assert!(matches!(result, Err(RegistryError::NameTaken(_))));
    assert!(drain(&mut inbox).is_empty());
    assert_eq!(names(handle.snapshot().await), vec!["alice"]);
}

#[tokio::test]
async fn test_concurrent_same_name_joins_one_winner() {
    let handle = spawn_registry();

    let mut tasks = Vec::new();
    for id in 0..RACERS {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            let (outbox, inbox) = mpsc::unbounded_channel();
            let result = handle
                .try_register(SessionId::new(id), "alice".to_string(), outbox)
                .await;
            (result, inbox)
        }));
    }

    let mut winners = 0;
    let mut _inboxes = Vec::new();
    for task in tasks {
        let (result, inbox) = task.await.unwrap();
        match result {
            Ok(name) => {
                assert_eq!(name.as_str(), "alice");
                winners += 1;
            }
            Err(e) => assert!(e.is_join_rejection(), "unexpected error: {e}"),
        }
        _inboxes.push(inbox);
    }

    assert_eq!(winners, 1);
    assert_eq!(names(handle.snapshot().await), vec!["alice"]);
}

#[tokio::test]
async fn test_concurrent_distinct_joins_all_succeed() {
    let handle = spawn_registry();

    let mut tasks = Vec::new();
    for id in 0..RACERS {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            let (outbox, inbox) = mpsc::unbounded_channel();
            handle
                .try_register(SessionId::new(id), format!("user{id:02}"), outbox)
                .await
                .map(|_| inbox)
        }));
    }

    let mut _inboxes = Vec::new();
    for task in tasks {
        _inboxes.push(task.await.unwrap().expect("distinct names should join"));
    }

    let snapshot = names(handle.snapshot().await);
    assert_eq!(snapshot.len(), RACERS as usize);
    let mut sorted = snapshot.clone();
    sorted.sort();
    assert_eq!(snapshot, sorted);
}

// ============================================================================
// Removal Tests
// ============================================================================

#[tokio::test]
async fn test_name_free_after_remove() {
    let handle = spawn_registry();
    let _alice = join(&handle, 1, "alice").await;

    assert!(handle.remove(SessionId::new(1), RemovalReason::Quit).await);
    assert!(!handle.remove(SessionId::new(1), RemovalReason::Disconnected).await);

    let _again = join(&handle, 2, "alice").await;
    assert_eq!(names(handle.snapshot().await), vec!["alice"]);
}

#[tokio::test]
async fn test_remove_notifies_others() {
    let handle = spawn_registry();
    let _alice = join(&handle, 1, "alice").await;
    let mut bob = join(&handle, 2, "bob").await;
    drain(&mut bob);

    handle.remove(SessionId::new(1), RemovalReason::Disconnected).await;

    assert_eq!(drain(&mut bob), vec![line("SERVER: alice has left the chat.")]);
}

// ============================================================================
// Kick Tests
// ============================================================================

#[tokio::test]
async fn test_kick_closes_target_and_frees_name() {
    let handle = spawn_registry();
    let mut alice = join(&handle, 1, "alice").await;
    let mut bob = join(&handle, 2, "bob").await;
    drain(&mut alice);
    drain(&mut bob);

    assert!(handle.kick("bob").await);

    assert_eq!(
        drain(&mut bob),
        vec![
            line("SERVER: You have been kicked from the chat."),
            Outbound::Close,
        ]
    );
    assert_eq!(
        drain(&mut alice),
        vec![line("SERVER: bob has been kicked from the chat.")]
    );

    // Cleanup from the kicked session's own teardown is a no-op
    assert!(!handle.remove(SessionId::new(2), RemovalReason::Disconnected).await);
    assert!(drain(&mut alice).is_empty());

    let _bob_again = join(&handle, 3, "bob").await;
}

#[tokio::test]
async fn test_kick_unknown_name_is_noop() {
    let handle = spawn_registry();
    let mut alice = join(&handle, 1, "alice").await;
    drain(&mut alice);

    assert!(!handle.kick("nobody").await);
    assert!(!handle.kick("").await);

    assert!(drain(&mut alice).is_empty());
    assert_eq!(names(handle.snapshot().await), vec!["alice"]);
}

#[tokio::test]
async fn test_kick_as_requires_live_issuer() {
    let handle = spawn_registry();
    let mut alice = join(&handle, 1, "alice").await;
    let _bob = join(&handle, 2, "bob").await;

    // Never joined
    assert!(matches!(
        handle.kick_as(SessionId::new(9), "alice").await,
        Err(RegistryError::NotJoined(_))
    ));

    // Kicked before its own KICK was processed
    assert!(handle.kick_as(SessionId::new(1), "bob").await.unwrap());
    drain(&mut alice);
    assert!(matches!(
        handle.kick_as(SessionId::new(2), "alice").await,
        Err(RegistryError::NotJoined(_))
    ));

    assert!(drain(&mut alice).is_empty());
    assert_eq!(names(handle.snapshot().await), vec!["alice"]);
}

// ============================================================================
// Broadcast Tests
// ============================================================================

#[tokio::test]
async fn test_broadcast_once_per_member() {
    let handle = spawn_registry();
    let mut inboxes = Vec::new();
    for (id, name) in ["carol", "alice", "bob"].iter().enumerate() {
        inboxes.push(join(&handle, id as u64, name).await);
    }
    for inbox in &mut inboxes {
        drain(inbox);
    }

    let recipients = handle
        .broadcast(Notification::Operator("hello all".to_string()))
        .await;
    assert_eq!(recipients, 3);

    for inbox in &mut inboxes {
        assert_eq!(drain(inbox), vec![line("SERVER: hello all")]);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_broadcasts_racing_removals_deliver_once() {
    const SURVIVORS: u64 = 4;
    const LEAVERS: u64 = 4;
    const MESSAGES: usize = 50;

    let handle = spawn_registry();

    let mut survivors = Vec::new();
    for id in 0..SURVIVORS {
        survivors.push(join(&handle, id, &format!("stay{id}")).await);
    }
    let mut leavers = Vec::new();
    for id in SURVIVORS..SURVIVORS + LEAVERS {
        leavers.push(join(&handle, id, &format!("go{id}")).await);
    }
    for inbox in survivors.iter_mut().chain(leavers.iter_mut()) {
        drain(inbox);
    }

    let mut tasks = Vec::new();
    for i in 0..MESSAGES {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            handle
                .broadcast(Notification::Operator(format!("msg-{i}")))
                .await;
        }));
    }
    for id in SURVIVORS..SURVIVORS + LEAVERS {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            // Half leave on their own, half are kicked
            if id % 2 == 0 {
                handle.remove(SessionId::new(id), RemovalReason::Quit).await;
            } else {
                handle.kick(format!("go{id}")).await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let expected: Vec<String> = (0..MESSAGES).map(|i| format!("SERVER: msg-{i}")).collect();
    let is_broadcast = |item: &Outbound| match item {
        Outbound::Line(text) => expected.contains(text),
        Outbound::Close => false,
    };

    // Every survivor sees every broadcast exactly once, all in the same order
    let mut first: Option<Vec<Outbound>> = None;
    for inbox in &mut survivors {
        let received = drain(inbox);
        let broadcasts = received.iter().filter(|item| is_broadcast(item)).count();
        assert_eq!(broadcasts, MESSAGES);
        for text in &expected {
            let copies = received.iter().filter(|item| **item == line(text)).count();
            assert_eq!(copies, 1, "{text:?} delivered {copies} times");
        }
        assert_eq!(received.len(), MESSAGES + LEAVERS as usize);

        match &first {
            Some(reference) => assert_eq!(&received, reference),
            None => first = Some(received),
        }
    }

    // A removed session gets each broadcast at most once, and nothing after Close
    for inbox in &mut leavers {
        let received = drain(inbox);
        for text in &expected {
            let copies = received.iter().filter(|item| **item == line(text)).count();
            assert!(copies <= 1, "{text:?} delivered {copies} times to a leaver");
        }
        if let Some(close_at) = received.iter().position(|item| *item == Outbound::Close) {
            assert_eq!(close_at, received.len() - 1);
        }
    }

    assert_eq!(names(handle.snapshot().await).len(), SURVIVORS as usize);
}

#[tokio::test]
async fn test_chat_requires_join() {
    let handle = spawn_registry();
    let result = handle.chat(SessionId::new(9), "hi".to_string()).await;
    assert!(matches!(result, Err(RegistryError::NotJoined(_))));
}

#[tokio::test]
async fn test_chat_strips_own_prefix() {
    let handle = spawn_registry();
    let mut alice = join(&handle, 1, "alice").await;
    let mut bob = join(&handle, 2, "bob").await;
    drain(&mut alice);
    drain(&mut bob);

    handle
        .chat(SessionId::new(1), "alice: hi".to_string())
        .await
        .unwrap();

    assert_eq!(drain(&mut alice), vec![line("alice: hi")]);
    assert_eq!(drain(&mut bob), vec![line("alice: hi")]);
}

// ============================================================================
// Event Tests
// ============================================================================

#[tokio::test]
async fn test_events_follow_registry_changes() {
    let handle = spawn_registry();
    let mut events = handle.subscribe();

    let _alice = join(&handle, 1, "alice").await;
    handle.kick("alice").await;

    let joined = timeout(EVENT_TIMEOUT, events.recv()).await.unwrap().unwrap();
    assert!(matches!(
        joined,
        RegistryEvent::Joined { session_id, .. } if session_id == SessionId::new(1)
    ));

    let removed = timeout(EVENT_TIMEOUT, events.recv()).await.unwrap().unwrap();
    assert!(matches!(
        removed,
        RegistryEvent::Removed { reason: RemovalReason::Kicked, .. }
    ));
    assert_eq!(
        removed.notification().to_line(),
        "SERVER: alice has been kicked from the chat."
    );
}
