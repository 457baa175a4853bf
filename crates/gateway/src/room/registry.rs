//! Room lifecycle, membership, and broadcast fan-out.
//!
//! One process hosts many rooms. Each room's mutable state (sessions,
//! threads, queue, estimator, in-flight slots) sits behind a single mutex;
//! rooms share nothing, so cross-room operations never contend. The
//! registry map itself is under an `RwLock`.
//!
//! The backend streaming call is the only slow operation in the system and
//! is never made while a room lock is held — see `worker.rs`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::Notify;
use uuid::Uuid;

use rt_backend::CompletionBackend;
use rt_domain::config::Config;
use rt_domain::error::{Error, Result};
use rt_domain::event::ServerEvent;
use rt_domain::job::Job;
use rt_domain::message::Message;

use super::cancel::CancelMap;
use super::eta::EtaEstimator;
use super::queue::FairQueue;
use super::session::{generate_room_id, normalize_nickname, EventSink, SessionHandle};
use super::thread::ThreadStore;
use super::worker;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Room
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A job a worker is currently streaming, kept for status display.
#[derive(Debug, Clone, Serialize)]
pub struct InFlightJob {
    pub job_id: String,
    pub user_id: String,
    pub thread_id: String,
}

pub(crate) struct RoomState {
    pub(crate) sessions: HashMap<String, SessionHandle>,
    pub(crate) threads: ThreadStore,
    pub(crate) queue: FairQueue,
    pub(crate) eta: EtaEstimator,
    /// One slot per worker; a missing key means that worker is idle.
    pub(crate) in_flight: HashMap<usize, InFlightJob>,
}

/// One isolated multi-user session scope.
pub struct Room {
    pub room_id: String,
    pub created_at: DateTime<Utc>,
    pub(crate) state: Mutex<RoomState>,
    /// Wakes an idle worker when a job lands in the queue.
    pub(crate) jobs_ready: Notify,
}

impl Room {
    fn new(room_id: String, config: &Config) -> Self {
        Self {
            room_id,
            created_at: Utc::now(),
            state: Mutex::new(RoomState {
                sessions: HashMap::new(),
                threads: ThreadStore::new(config.rooms.max_thread_history),
                queue: FairQueue::new(),
                eta: EtaEstimator::new(config.rooms.eta_window, config.rooms.default_job_secs),
                in_flight: HashMap::new(),
            }),
            jobs_ready: Notify::new(),
        }
    }

    /// Read one thread's full history (any room member may observe any
    /// thread).
    pub fn thread_snapshot(&self, thread_id: &str) -> Option<Vec<Message>> {
        self.state.lock().threads.snapshot(thread_id)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Acks & status snapshots
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Returned by [`RoomRegistry::join`]; mirrors the `joined` wire event.
#[derive(Debug, Clone)]
pub struct JoinAck {
    pub user_id: String,
    pub thread_id: String,
    pub nickname: String,
    pub room_id: String,
}

/// Returned by [`RoomRegistry::enqueue_message`]; mirrors the `enqueued`
/// wire event.
#[derive(Debug, Clone)]
pub struct EnqueueAck {
    pub job_id: String,
    pub position: usize,
    pub eta_seconds: u64,
}

/// Point-in-time room summary for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RoomStatus {
    pub room_id: String,
    pub created_at: DateTime<Utc>,
    pub user_count: usize,
    pub pending_jobs: usize,
    pub workers: usize,
    pub generating: Vec<InFlightJob>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Process-wide table of live rooms.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    pub(crate) config: Arc<Config>,
    pub(crate) backend: Arc<dyn CompletionBackend>,
    pub(crate) cancels: CancelMap,
    shutting_down: AtomicBool,
}

impl RoomRegistry {
    pub fn new(config: Arc<Config>, backend: Arc<dyn CompletionBackend>) -> Arc<Self> {
        Arc::new(Self {
            rooms: RwLock::new(HashMap::new()),
            config,
            backend,
            cancels: CancelMap::new(),
            shutting_down: AtomicBool::new(false),
        })
    }

    /// Allocate a fresh room and start its worker loops.
    pub fn create_room(self: &Arc<Self>) -> String {
        let room_id = generate_room_id();
        let room = Arc::new(Room::new(room_id.clone(), &self.config));
        self.rooms.write().insert(room_id.clone(), room.clone());

        let workers = self.config.rooms.workers;
        for slot in 0..workers {
            tokio::spawn(worker::worker_loop(self.clone(), room.clone(), slot));
        }

        tracing::info!(room_id = %room_id, workers, "room created");
        room_id
    }

    pub fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.read().get(room_id).cloned()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().len()
    }

    // ── Membership ─────────────────────────────────────────────────

    /// Register a new session in a room.
    ///
    /// Allocates fresh user and thread ids, normalizes the nickname, and
    /// announces the arrival to everyone else.
    pub fn join(&self, room_id: &str, nickname: Option<&str>, sink: EventSink) -> Result<JoinAck> {
        let room = self
            .get(room_id)
            .ok_or_else(|| Error::RoomNotFound(room_id.to_string()))?;

        let nickname = normalize_nickname(nickname);
        let user_id = Uuid::new_v4().to_string();
        let thread_id = Uuid::new_v4().to_string();

        {
            let mut state = room.state.lock();
            state.queue.register_user(&user_id);
            state.threads.ensure(&thread_id);
            state.sessions.insert(
                user_id.clone(),
                SessionHandle {
                    user_id: user_id.clone(),
                    nickname: nickname.clone(),
                    thread_id: thread_id.clone(),
                    joined_at: Utc::now(),
                    sink,
                },
            );
        }

        tracing::info!(room_id = %room_id, user_id = %user_id, nickname = %nickname, "user joined");

        self.broadcast_room(
            &room,
            ServerEvent::UserJoined {
                user_id: user_id.clone(),
                nickname: nickname.clone(),
            },
            Some(&user_id),
        );

        Ok(JoinAck {
            user_id,
            thread_id,
            nickname,
            room_id: room_id.to_string(),
        })
    }

    /// Remove a session, purge its pending jobs, and announce the
    /// departure.
    ///
    /// Idempotent: both the connection-closed path and an explicit leave
    /// may call this, and only the call that actually removes the session
    /// broadcasts `user_left`.
    pub fn leave(&self, room_id: &str, user_id: &str) {
        let Some(room) = self.get(room_id) else {
            return;
        };

        let removed = {
            let mut state = room.state.lock();
            if state.sessions.remove(user_id).is_some() {
                state.queue.purge_user(user_id);
                true
            } else {
                false
            }
        };

        if removed {
            tracing::info!(room_id = %room_id, user_id = %user_id, "user left");
            self.broadcast_room(
                &room,
                ServerEvent::UserLeft {
                    user_id: user_id.to_string(),
                },
                None,
            );
        }
    }

    // ── Message submission ─────────────────────────────────────────

    /// Append a user message to its thread, snapshot the context window
    /// into a job, and enqueue it.
    ///
    /// Returns `Ok(None)` when there is nothing to do (blank content or a
    /// sender without a session) — mirrored from the wire contract where
    /// such frames are silently ignored.
    pub fn enqueue_message(
        &self,
        room_id: &str,
        user_id: &str,
        content: &str,
        thread_id: Option<&str>,
    ) -> Result<Option<EnqueueAck>> {
        let room = self
            .get(room_id)
            .ok_or_else(|| Error::RoomNotFound(room_id.to_string()))?;

        let content = content.trim();
        if content.is_empty() {
            return Ok(None);
        }

        let (ack, nickname, thread_id) = {
            let mut state = room.state.lock();
            let Some(session) = state.sessions.get(user_id) else {
                return Ok(None);
            };
            let nickname = session.nickname.clone();
            let thread_id = thread_id
                .map(str::to_string)
                .unwrap_or_else(|| session.thread_id.clone());

            state.threads.append(&thread_id, Message::user(content));
            let window = state
                .threads
                .window(&thread_id, self.config.rooms.context_window);

            let job = Job {
                job_id: Uuid::new_v4().to_string(),
                room_id: room_id.to_string(),
                thread_id: thread_id.clone(),
                user_id: user_id.to_string(),
                messages: window,
                enqueued_at: Utc::now(),
            };
            let job_id = job.job_id.clone();

            let position = state.queue.enqueue(job);
            let eta_seconds = state.eta.estimate(position);

            (
                EnqueueAck {
                    job_id,
                    position,
                    eta_seconds,
                },
                nickname,
                thread_id,
            )
        };

        room.jobs_ready.notify_one();

        tracing::debug!(
            room_id = %room_id,
            user_id = %user_id,
            job_id = %ack.job_id,
            position = ack.position,
            eta_seconds = ack.eta_seconds,
            "job enqueued"
        );

        self.broadcast_room(
            &room,
            ServerEvent::MessageAdded {
                user_id: user_id.to_string(),
                thread_id,
                content: content.to_string(),
                nickname,
            },
            None,
        );

        Ok(Some(ack))
    }

    /// Relay a typing indicator to everyone but the sender.
    pub fn typing(&self, room_id: &str, user_id: &str, is_typing: bool, thread_id: Option<&str>) {
        let Some(room) = self.get(room_id) else {
            return;
        };

        let (nickname, thread_id) = {
            let state = room.state.lock();
            let Some(session) = state.sessions.get(user_id) else {
                return;
            };
            (
                session.nickname.clone(),
                thread_id
                    .map(str::to_string)
                    .unwrap_or_else(|| session.thread_id.clone()),
            )
        };

        self.broadcast_room(
            &room,
            ServerEvent::Typing {
                user_id: user_id.to_string(),
                thread_id,
                is_typing,
                nickname,
            },
            Some(user_id),
        );
    }

    // ── Broadcast ──────────────────────────────────────────────────

    /// Deliver an event to every session in a room except the optionally
    /// excluded one.
    pub fn broadcast(&self, room_id: &str, event: ServerEvent, exclude_user_id: Option<&str>) {
        if let Some(room) = self.get(room_id) {
            self.broadcast_room(&room, event, exclude_user_id);
        }
    }

    /// Fan an event out to a room's sessions.
    ///
    /// A session whose channel is closed counts as disconnected: it is
    /// removed (with the usual `user_left` announcement) after the
    /// delivery pass, and never blocks delivery to the others.
    pub(crate) fn broadcast_room(
        &self,
        room: &Arc<Room>,
        event: ServerEvent,
        exclude_user_id: Option<&str>,
    ) {
        let targets: Vec<(String, EventSink)> = {
            let state = room.state.lock();
            state
                .sessions
                .values()
                .filter(|s| exclude_user_id != Some(s.user_id.as_str()))
                .map(|s| (s.user_id.clone(), s.sink.clone()))
                .collect()
        };

        let mut disconnected = Vec::new();
        for (user_id, sink) in targets {
            if sink.send(event.clone()).is_err() {
                disconnected.push(user_id);
            }
        }

        for user_id in disconnected {
            tracing::debug!(
                room_id = %room.room_id,
                user_id = %user_id,
                "delivery failed, treating session as disconnected"
            );
            self.leave(&room.room_id, &user_id);
        }
    }

    // ── Status & control ───────────────────────────────────────────

    pub fn status(&self, room_id: &str) -> Option<RoomStatus> {
        let room = self.get(room_id)?;
        let state = room.state.lock();
        let mut generating: Vec<InFlightJob> = state.in_flight.values().cloned().collect();
        generating.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        Some(RoomStatus {
            room_id: room.room_id.clone(),
            created_at: room.created_at,
            user_count: state.sessions.len(),
            pending_jobs: state.queue.pending_len(),
            workers: self.config.rooms.workers,
            generating,
        })
    }

    /// Cancellation hook: abort a streaming job between chunks. The
    /// default disconnect path never calls this.
    pub fn cancel_job(&self, job_id: &str) -> bool {
        self.cancels.cancel(job_id)
    }

    /// Stop all worker loops (process teardown).
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        for room in self.rooms.read().values() {
            room.jobs_ready.notify_waiters();
        }
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
