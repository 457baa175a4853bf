//! End-to-end room scenarios, driven through the registry and worker loops
//! against a scripted in-process backend.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use rt_backend::{CompletionBackend, CompletionRequest, ModelInfo};
use rt_domain::config::Config;
use rt_domain::error::{Error, Result};
use rt_domain::event::ServerEvent;
use rt_domain::message::Role;
use rt_domain::stream::ChunkStream;
use rt_gateway::room::registry::RoomRegistry;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scripted backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What one `stream_chat` call should do.
enum Script {
    /// Yield these deltas, then end the stream.
    Chunks(Vec<&'static str>),
    /// Fail the call itself with a timeout error.
    TimesOut(&'static str),
    /// Serve items pushed through the receiver; the stream stays open
    /// until the sender is dropped.
    Held(mpsc::UnboundedReceiver<Result<String>>),
}

/// A backend whose calls consume a queue of scripted outcomes.
struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
}

impl ScriptedBackend {
    fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
        })
    }
}

#[async_trait::async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn stream_chat(&self, _req: CompletionRequest) -> Result<ChunkStream> {
        let script = self
            .scripts
            .lock()
            .pop_front()
            .expect("backend called more times than scripted");

        match script {
            Script::Chunks(chunks) => Ok(Box::pin(async_stream::stream! {
                for chunk in chunks {
                    yield Ok(chunk.to_string());
                }
            })),
            Script::TimesOut(msg) => Err(Error::Timeout(msg.to_string())),
            Script::Held(mut rx) => Ok(Box::pin(async_stream::stream! {
                while let Some(item) = rx.recv().await {
                    yield item;
                }
            })),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(Vec::new())
    }

    async fn health(&self) -> Result<()> {
        Ok(())
    }

    fn backend_id(&self) -> &str {
        "scripted"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn test_config(workers: usize) -> Arc<Config> {
    let mut config = Config::default();
    config.rooms.workers = workers;
    config.rooms.poll_interval_ms = 10;
    Arc::new(config)
}

async fn recv_event(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Skip events until the next `generation_start` and return its user id.
async fn next_generation_start(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> String {
    loop {
        if let ServerEvent::GenerationStart { user_id, .. } = recv_event(rx).await {
            return user_id;
        }
    }
}

async fn assert_quiet(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) {
    match tokio::time::timeout(Duration::from_millis(200), rx.recv()).await {
        Err(_) => {}
        Ok(event) => panic!("expected no further events, got {event:?}"),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scenarios
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn streamed_reply_lands_in_submitters_thread() {
    let backend = ScriptedBackend::new(vec![Script::Chunks(vec!["H", "i", "!"])]);
    let registry = RoomRegistry::new(test_config(1), backend);
    let room_id = registry.create_room();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let alice = registry.join(&room_id, Some("alice"), tx).unwrap();
    assert_eq!(alice.nickname, "@alice");

    let ack = registry
        .enqueue_message(&room_id, &alice.user_id, "hi", None)
        .unwrap()
        .expect("non-empty message should enqueue");
    assert_eq!(ack.position, 1);
    // Empty estimator window: one job ahead at the default per-job cost.
    assert_eq!(ack.eta_seconds, 15);

    match recv_event(&mut rx).await {
        ServerEvent::MessageAdded { content, .. } => assert_eq!(content, "hi"),
        other => panic!("expected message_added, got {other:?}"),
    }
    match recv_event(&mut rx).await {
        ServerEvent::GenerationStart { user_id, nickname, .. } => {
            assert_eq!(user_id, alice.user_id);
            assert_eq!(nickname, "@alice");
        }
        other => panic!("expected generation_start, got {other:?}"),
    }

    let mut streamed = String::new();
    let mut chunk_count = 0;
    loop {
        match recv_event(&mut rx).await {
            ServerEvent::Chunk { delta, thread_id, .. } => {
                assert_eq!(thread_id, alice.thread_id);
                streamed.push_str(&delta);
                chunk_count += 1;
            }
            ServerEvent::GenerationDone { .. } => break,
            other => panic!("unexpected event during stream: {other:?}"),
        }
    }
    assert_eq!(chunk_count, 3);
    assert_eq!(streamed, "Hi!");

    let room = registry.get(&room_id).unwrap();
    let thread = room.thread_snapshot(&alice.thread_id).unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[0].role, Role::User);
    assert_eq!(thread[0].content, "hi");
    assert_eq!(thread[1].role, Role::Assistant);
    assert_eq!(thread[1].content, "Hi!");

    registry.shutdown();
}

#[tokio::test]
async fn dispatch_follows_rotation_order_not_arrival_order() {
    let (hold_tx, hold_rx) = mpsc::unbounded_channel();
    let backend = ScriptedBackend::new(vec![
        Script::Held(hold_rx),
        Script::Chunks(vec!["for alice"]),
        Script::Chunks(vec!["for bob"]),
    ]);
    let registry = RoomRegistry::new(test_config(1), backend);
    let room_id = registry.create_room();

    // Rotation order is join order: alice, bob, carol.
    let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
    let alice = registry.join(&room_id, Some("alice"), alice_tx).unwrap();
    let (bob_tx, _bob_rx) = mpsc::unbounded_channel();
    let bob = registry.join(&room_id, Some("bob"), bob_tx).unwrap();
    let (carol_tx, _carol_rx) = mpsc::unbounded_channel();
    let carol = registry.join(&room_id, Some("carol"), carol_tx).unwrap();

    // carol's job grabs the only worker and holds it mid-stream.
    registry
        .enqueue_message(&room_id, &carol.user_id, "go", None)
        .unwrap()
        .unwrap();
    assert_eq!(next_generation_start(&mut alice_rx).await, carol.user_id);

    // While carol streams, bob submits before alice.
    registry
        .enqueue_message(&room_id, &bob.user_id, "bob's ask", None)
        .unwrap()
        .unwrap();
    registry
        .enqueue_message(&room_id, &alice.user_id, "alice's ask", None)
        .unwrap()
        .unwrap();

    // Release the held stream.
    hold_tx.send(Ok("done".to_string())).unwrap();
    drop(hold_tx);

    // alice sits ahead of bob in the rotation, so she dispatches first
    // even though her job arrived last.
    assert_eq!(next_generation_start(&mut alice_rx).await, alice.user_id);
    assert_eq!(next_generation_start(&mut alice_rx).await, bob.user_id);

    registry.shutdown();
}

#[tokio::test]
async fn backend_timeout_recovers_as_single_error_chunk() {
    let backend = ScriptedBackend::new(vec![Script::TimesOut("request timed out")]);
    let registry = RoomRegistry::new(test_config(1), backend);
    let room_id = registry.create_room();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let alice = registry.join(&room_id, Some("alice"), tx).unwrap();
    registry
        .enqueue_message(&room_id, &alice.user_id, "hello", None)
        .unwrap()
        .unwrap();

    assert_eq!(next_generation_start(&mut rx).await, alice.user_id);

    // Exactly one chunk, carrying the error text, then generation_done.
    let error_text = match recv_event(&mut rx).await {
        ServerEvent::Chunk { delta, .. } => delta,
        other => panic!("expected error chunk, got {other:?}"),
    };
    assert!(error_text.starts_with("Error:"), "got: {error_text}");
    assert!(error_text.contains("timed out"), "got: {error_text}");
    match recv_event(&mut rx).await {
        ServerEvent::GenerationDone { .. } => {}
        other => panic!("expected generation_done, got {other:?}"),
    }

    // The thread gains the error string as an assistant message, so the
    // conversation stays coherent.
    let room = registry.get(&room_id).unwrap();
    let thread = room.thread_snapshot(&alice.thread_id).unwrap();
    assert_eq!(thread.len(), 2);
    assert_eq!(thread[1].role, Role::Assistant);
    assert_eq!(thread[1].content, error_text);

    registry.shutdown();
}

#[tokio::test]
async fn leave_is_idempotent_and_broadcasts_once() {
    let backend = ScriptedBackend::new(Vec::new());
    let registry = RoomRegistry::new(test_config(1), backend);
    let room_id = registry.create_room();

    let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
    let _alice = registry.join(&room_id, Some("alice"), alice_tx).unwrap();
    let (bob_tx, _bob_rx) = mpsc::unbounded_channel();
    let bob = registry.join(&room_id, Some("bob"), bob_tx).unwrap();

    match recv_event(&mut alice_rx).await {
        ServerEvent::UserJoined { user_id, .. } => assert_eq!(user_id, bob.user_id),
        other => panic!("expected user_joined, got {other:?}"),
    }

    // Explicit leave and the connection-closed path may both fire.
    registry.leave(&room_id, &bob.user_id);
    registry.leave(&room_id, &bob.user_id);

    match recv_event(&mut alice_rx).await {
        ServerEvent::UserLeft { user_id } => assert_eq!(user_id, bob.user_id),
        other => panic!("expected user_left, got {other:?}"),
    }
    assert_quiet(&mut alice_rx).await;

    assert_eq!(registry.status(&room_id).unwrap().user_count, 1);
    registry.shutdown();
}

#[tokio::test]
async fn disconnect_purges_only_that_users_pending_jobs() {
    let (hold_tx, hold_rx) = mpsc::unbounded_channel();
    let backend = ScriptedBackend::new(vec![
        Script::Held(hold_rx),
        Script::Chunks(vec!["for bob"]),
    ]);
    let registry = RoomRegistry::new(test_config(1), backend);
    let room_id = registry.create_room();

    let (alice_tx, _alice_rx) = mpsc::unbounded_channel();
    let alice = registry.join(&room_id, Some("alice"), alice_tx).unwrap();
    let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
    let bob = registry.join(&room_id, Some("bob"), bob_tx).unwrap();
    let (carol_tx, _carol_rx) = mpsc::unbounded_channel();
    let carol = registry.join(&room_id, Some("carol"), carol_tx).unwrap();

    // carol occupies the only worker.
    registry
        .enqueue_message(&room_id, &carol.user_id, "go", None)
        .unwrap()
        .unwrap();
    assert_eq!(next_generation_start(&mut bob_rx).await, carol.user_id);

    // alice queues two jobs, bob one.
    let first = registry
        .enqueue_message(&room_id, &alice.user_id, "one", None)
        .unwrap()
        .unwrap();
    assert_eq!(first.position, 1);
    let second = registry
        .enqueue_message(&room_id, &alice.user_id, "two", None)
        .unwrap()
        .unwrap();
    assert_eq!(second.position, 2);
    registry
        .enqueue_message(&room_id, &bob.user_id, "three", None)
        .unwrap()
        .unwrap();
    assert_eq!(registry.status(&room_id).unwrap().pending_jobs, 3);

    // alice disconnects: exactly her jobs vanish.
    registry.leave(&room_id, &alice.user_id);
    assert_eq!(registry.status(&room_id).unwrap().pending_jobs, 1);

    hold_tx.send(Ok("done".to_string())).unwrap();
    drop(hold_tx);

    // The surviving job is bob's; alice never generates.
    assert_eq!(next_generation_start(&mut bob_rx).await, bob.user_id);

    registry.shutdown();
}

#[tokio::test]
async fn dropped_channel_is_evicted_on_next_broadcast() {
    let backend = ScriptedBackend::new(vec![Script::Chunks(vec!["ok"])]);
    let registry = RoomRegistry::new(test_config(1), backend);
    let room_id = registry.create_room();

    let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
    let alice = registry.join(&room_id, Some("alice"), alice_tx).unwrap();
    let (bob_tx, bob_rx) = mpsc::unbounded_channel();
    let bob = registry.join(&room_id, Some("bob"), bob_tx).unwrap();
    assert_eq!(registry.status(&room_id).unwrap().user_count, 2);

    // bob's client goes away without a close frame.
    drop(bob_rx);

    // The next broadcast notices the dead channel, evicts bob, and still
    // delivers to alice.
    registry
        .enqueue_message(&room_id, &alice.user_id, "hi all", None)
        .unwrap()
        .unwrap();

    let mut saw_message_added = false;
    let mut saw_bob_leave = false;
    while !(saw_message_added && saw_bob_leave) {
        match recv_event(&mut alice_rx).await {
            ServerEvent::MessageAdded { .. } => saw_message_added = true,
            ServerEvent::UserLeft { user_id } => {
                assert_eq!(user_id, bob.user_id);
                saw_bob_leave = true;
            }
            _ => {}
        }
    }
    assert_eq!(registry.status(&room_id).unwrap().user_count, 1);

    registry.shutdown();
}

#[tokio::test]
async fn cancel_hook_ends_streaming_between_chunks() {
    let (hold_tx, hold_rx) = mpsc::unbounded_channel();
    let backend = ScriptedBackend::new(vec![Script::Held(hold_rx)]);
    let registry = RoomRegistry::new(test_config(1), backend);
    let room_id = registry.create_room();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let alice = registry.join(&room_id, Some("alice"), tx).unwrap();
    let ack = registry
        .enqueue_message(&room_id, &alice.user_id, "long story please", None)
        .unwrap()
        .unwrap();

    assert_eq!(next_generation_start(&mut rx).await, alice.user_id);

    hold_tx.send(Ok("once".to_string())).unwrap();
    match recv_event(&mut rx).await {
        ServerEvent::Chunk { delta, .. } => assert_eq!(delta, "once"),
        other => panic!("expected chunk, got {other:?}"),
    }

    assert!(registry.cancel_job(&ack.job_id));

    // The stream is still open, but the next delta trips the cancel check
    // and the job finalizes.
    hold_tx.send(Ok(" upon".to_string())).unwrap();
    match recv_event(&mut rx).await {
        ServerEvent::Chunk { delta, .. } => assert_eq!(delta, " upon"),
        other => panic!("expected chunk, got {other:?}"),
    }
    match recv_event(&mut rx).await {
        ServerEvent::GenerationDone { .. } => {}
        other => panic!("expected generation_done, got {other:?}"),
    }

    // The partial response was still recorded.
    let room = registry.get(&room_id).unwrap();
    let thread = room.thread_snapshot(&alice.thread_id).unwrap();
    assert_eq!(thread.last().unwrap().content, "once upon");

    registry.shutdown();
}

#[tokio::test]
async fn second_user_watches_who_is_generating() {
    let backend = ScriptedBackend::new(vec![Script::Chunks(vec!["shared", " view"])]);
    let registry = RoomRegistry::new(test_config(1), backend);
    let room_id = registry.create_room();

    let (alice_tx, _alice_rx) = mpsc::unbounded_channel();
    let alice = registry.join(&room_id, Some("alice"), alice_tx).unwrap();
    let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
    let _bob = registry.join(&room_id, Some("bob"), bob_tx).unwrap();

    registry
        .enqueue_message(&room_id, &alice.user_id, "tell us", None)
        .unwrap()
        .unwrap();

    // bob, a pure observer, receives alice's whole generation live.
    assert_eq!(next_generation_start(&mut bob_rx).await, alice.user_id);
    let mut streamed = String::new();
    loop {
        match recv_event(&mut bob_rx).await {
            ServerEvent::Chunk { delta, user_id, .. } => {
                assert_eq!(user_id, alice.user_id);
                streamed.push_str(&delta);
            }
            ServerEvent::GenerationDone { .. } => break,
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(streamed, "shared view");

    registry.shutdown();
}
