//! The worker execution loop.
//!
//! Each room runs N of these as independent tasks. A worker cycles
//! idle → dequeue → dispatch → stream → finalize; the backend call is the
//! only slow step and runs without the room lock, so joins, enqueues and
//! status queries stay responsive while a generation is in flight.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;

use rt_backend::{ChatMessage, CompletionRequest};
use rt_domain::event::ServerEvent;
use rt_domain::job::Job;
use rt_domain::message::Message;

use super::registry::{InFlightJob, Room, RoomRegistry};

pub(crate) async fn worker_loop(registry: Arc<RoomRegistry>, room: Arc<Room>, slot: usize) {
    let poll_interval = Duration::from_millis(registry.config.rooms.poll_interval_ms);
    tracing::debug!(room_id = %room.room_id, slot, "worker started");

    loop {
        if registry.is_shutting_down() {
            break;
        }

        let job = { room.state.lock().queue.next_job() };
        let Some(job) = job else {
            // Idle: wait for an enqueue wakeup, with a timed fallback so a
            // missed notification can never strand a queued job.
            tokio::select! {
                _ = room.jobs_ready.notified() => {}
                _ = tokio::time::sleep(poll_interval) => {}
            }
            continue;
        };

        run_job(&registry, &room, slot, job).await;
    }

    tracing::debug!(room_id = %room.room_id, slot, "worker stopped");
}

/// Execute one dequeued job through dispatch, streaming, and finalize.
async fn run_job(registry: &Arc<RoomRegistry>, room: &Arc<Room>, slot: usize, job: Job) {
    // ── Dispatch ─────────────────────────────────────────────────────
    let nickname = {
        let state = room.state.lock();
        state.sessions.get(&job.user_id).map(|s| s.nickname.clone())
    };
    let Some(nickname) = nickname else {
        // The submitter left while the job was pending in another worker's
        // dequeue window; drop it without a word.
        tracing::debug!(
            room_id = %room.room_id,
            user_id = %job.user_id,
            job_id = %job.job_id,
            "submitter gone, dropping job"
        );
        return;
    };

    tracing::info!(
        room_id = %room.room_id,
        slot,
        user_id = %job.user_id,
        job_id = %job.job_id,
        "job dispatched"
    );

    registry.broadcast_room(
        room,
        ServerEvent::GenerationStart {
            user_id: job.user_id.clone(),
            thread_id: job.thread_id.clone(),
            nickname,
        },
        None,
    );

    {
        let mut state = room.state.lock();
        state.in_flight.insert(
            slot,
            InFlightJob {
                job_id: job.job_id.clone(),
                user_id: job.user_id.clone(),
                thread_id: job.thread_id.clone(),
            },
        );
    }

    let cancel = registry.cancels.register(&job.job_id);
    let started = Instant::now();

    // ── Stream (no room lock held) ───────────────────────────────────
    let request = CompletionRequest {
        messages: job.messages.iter().map(ChatMessage::from).collect(),
        model: None,
    };

    let mut full_response = String::new();
    match registry.backend.stream_chat(request).await {
        Ok(mut stream) => {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(delta) => {
                        full_response.push_str(&delta);
                        registry.broadcast_room(
                            room,
                            ServerEvent::Chunk {
                                thread_id: job.thread_id.clone(),
                                user_id: job.user_id.clone(),
                                delta,
                            },
                            None,
                        );
                    }
                    Err(e) => {
                        // Recovered: the error becomes the last chunk and the
                        // job still finishes its lifecycle.
                        let error_text = format!("Error: {e}");
                        tracing::warn!(
                            room_id = %room.room_id,
                            job_id = %job.job_id,
                            error = %e,
                            "backend stream failed mid-generation"
                        );
                        full_response.push_str(&error_text);
                        registry.broadcast_room(
                            room,
                            ServerEvent::Chunk {
                                thread_id: job.thread_id.clone(),
                                user_id: job.user_id.clone(),
                                delta: error_text,
                            },
                            None,
                        );
                        break;
                    }
                }

                if cancel.is_cancelled() {
                    tracing::info!(
                        room_id = %room.room_id,
                        job_id = %job.job_id,
                        "generation cancelled"
                    );
                    break;
                }
            }
        }
        Err(e) => {
            let error_text = format!("Error: {e}");
            tracing::warn!(
                room_id = %room.room_id,
                job_id = %job.job_id,
                error = %e,
                "backend call failed"
            );
            full_response = error_text.clone();
            registry.broadcast_room(
                room,
                ServerEvent::Chunk {
                    thread_id: job.thread_id.clone(),
                    user_id: job.user_id.clone(),
                    delta: error_text,
                },
                None,
            );
        }
    }

    // ── Finalize ─────────────────────────────────────────────────────
    let duration = started.elapsed().as_secs_f64();
    {
        let mut state = room.state.lock();
        if state.sessions.contains_key(&job.user_id) {
            state
                .threads
                .append(&job.thread_id, Message::assistant(full_response));
        }
        // The submitter leaving mid-stream discards the response but still
        // feeds the estimator: the worker was busy either way.
        state.eta.record(duration);
        state.in_flight.remove(&slot);
    }
    registry.cancels.remove(&job.job_id);

    registry.broadcast_room(
        room,
        ServerEvent::GenerationDone {
            user_id: job.user_id.clone(),
            thread_id: job.thread_id.clone(),
        },
        None,
    );

    tracing::info!(
        room_id = %room.room_id,
        slot,
        job_id = %job.job_id,
        duration_secs = duration,
        "job finished"
    );
}
