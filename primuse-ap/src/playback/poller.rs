//! Position polling
//!
//! While a track plays, one task per generation asks the backend for its
//! status at a fixed period and folds the answer into the session. A task
//! exits as soon as its generation is stale or playback stopped, so a track
//! change can never leave a timer behind.
//!
//! Reaching the end pauses the backend before the session reports
//! `Finished`, so a later seek cannot make a finished track audible again.

use super::coordinator::{Inner, Slot};
use crate::backend::{AudioHandle, BackendStatus};
use primuse_common::SessionChange;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub(super) struct Poller {
    generation: u64,
    task: JoinHandle<()>,
}

impl Poller {
    pub(super) fn spawn(
        inner: Weak<Inner>,
        generation: u64,
        handle: Arc<dyn AudioHandle>,
        period: Duration,
    ) -> Self {
        debug!("Starting position poll for generation {}", generation);
        let task = tokio::spawn(poll_loop(inner, generation, handle, period));
        Self { generation, task }
    }

    pub(super) fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    pub(super) fn stop(self) {
        debug!("Stopping position poll for generation {}", self.generation);
        self.task.abort();
    }
}

enum Tick {
    Continue,
    Stop,
    /// Backend lost the sound; unload it after leaving the lock
    Lost,
    /// Position reached the duration; pause the backend, then commit
    Ended,
}

async fn poll_loop(
    inner: Weak<Inner>,
    generation: u64,
    handle: Arc<dyn AudioHandle>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let status = handle.status().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };

        let tick = apply_status(&inner, generation, status);
        inner.flush();

        match tick {
            Tick::Continue => {}
            Tick::Stop => break,
            Tick::Lost => {
                handle.unload().await;
                break;
            }
            Tick::Ended => {
                if finish(&inner, generation, handle.as_ref()).await {
                    break;
                }
            }
        }
    }

    debug!("Position poll for generation {} finished", generation);
}

fn apply_status(inner: &Inner, generation: u64, status: BackendStatus) -> Tick {
    let mut slot = inner.lock();
    if slot.session.generation != generation || !slot.session.is_playing {
        return Tick::Stop;
    }

    if !status.is_loaded {
        warn!("Backend lost sound for generation {}, releasing", generation);
        // This task is the poller; clear it without aborting
        slot.poller.take();
        slot.session.generation += 1;
        slot.session.clear_track();
        slot.handle = None;
        inner.publish(&slot, SessionChange::Released);
        return Tick::Lost;
    }

    if status.duration_ms > 0 && status.duration_ms != slot.session.duration_ms {
        slot.session.duration_ms = status.duration_ms;
        slot.session.position_ms = status.position_ms.min(status.duration_ms);
        inner.publish(&slot, SessionChange::DurationKnown);
    } else {
        let position_ms = match slot.session.duration_ms {
            0 => status.position_ms,
            duration_ms => status.position_ms.min(duration_ms),
        };
        if position_ms != slot.session.position_ms {
            slot.session.position_ms = position_ms;
            inner.publish(&slot, SessionChange::PositionChanged);
        }
    }

    if reached_end(&slot) {
        return Tick::Ended;
    }

    Tick::Continue
}

fn reached_end(slot: &Slot) -> bool {
    let duration_ms = slot.session.duration_ms;
    duration_ms > 0 && slot.session.position_ms >= duration_ms
}

/// Pause the backend at the end of the track and mark the session finished
///
/// Holds the transport lock so a concurrent toggle or seek either lands
/// before the check (and the track is no longer at its end) or after the
/// commit. Returns false when polling should carry on.
async fn finish(inner: &Inner, generation: u64, handle: &dyn AudioHandle) -> bool {
    let _transport = inner.transport.lock().await;

    {
        let slot = inner.lock();
        if slot.session.generation != generation || !slot.session.is_playing {
            return true;
        }
        if !reached_end(&slot) {
            debug!("Generation {} moved away from the end", generation);
            return false;
        }
    }

    if let Err(e) = handle.pause().await {
        warn!("Failed to pause finished generation {}: {}", generation, e);
    }

    {
        let mut slot = inner.lock();
        if slot.session.generation != generation {
            return true;
        }
        info!("Generation {} reached the end", generation);
        // This task is the poller; clear it without aborting
        slot.poller.take();
        slot.session.is_playing = false;
        slot.session.position_ms = slot.session.duration_ms;
        inner.publish(&slot, SessionChange::Finished);
    }
    inner.flush();
    true
}
