//! Playback coordinator
//!
//! Exactly one coordinator owns the audio handle for the lifetime of the
//! process. Every mutation runs through it and is published to observers.
//!
//! **Concurrency model:**
//! - Session state and the handle slot live behind one `std::sync::Mutex`
//!   that is never held across an `.await`.
//! - Each track change bumps `generation`. Work started for an older
//!   generation (a slow load, a poll tick, a toggle) compares against it
//!   before committing and discards itself when stale.
//! - Transport changes (toggle, seek, end-of-track pause) hold an async
//!   `transport` lock across their backend call, so they never interleave.
//! - Events are queued while the slot is locked and delivered once it is
//!   released, in commit order. Observers may read the coordinator.

use super::observers::{ObserverRegistry, SessionObserver, Subscription};
use super::poller::Poller;
use crate::backend::{AudioBackend, AudioHandle};
use crate::error::PlaybackError;
use primuse_common::{PlaybackSession, SessionChange, SessionEvent, Track};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tunables for the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Period of the position poll while playing
    pub poll_interval: Duration,
    /// Step used by `skip_forward` / `skip_backward`
    pub skip_step_ms: u64,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            skip_step_ms: 15_000,
        }
    }
}

pub(super) struct Slot {
    pub(super) session: PlaybackSession,
    pub(super) handle: Option<Arc<dyn AudioHandle>>,
    pub(super) poller: Option<Poller>,
}

impl Slot {
    pub(super) fn stop_poller(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
    }

    /// Drop the current track; the returned handle still needs unloading
    fn take_track(&mut self) -> Option<Arc<dyn AudioHandle>> {
        self.stop_poller();
        self.session.clear_track();
        self.handle.take()
    }
}

pub(super) struct Inner {
    backend: Arc<dyn AudioBackend>,
    settings: CoordinatorSettings,
    slot: Mutex<Slot>,
    /// Serializes backend play/pause/seek against the end-of-track pause
    pub(super) transport: tokio::sync::Mutex<()>,
    observers: Arc<ObserverRegistry>,
}

impl Inner {
    pub(super) fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a change for observers; caller holds the slot lock
    pub(super) fn publish(&self, slot: &Slot, change: SessionChange) {
        debug!(
            "Session {} (state={}, position={}ms, generation={})",
            change,
            slot.session.state(),
            slot.session.position_ms,
            slot.session.generation
        );
        self.observers
            .enqueue(SessionEvent::new(change, slot.session.clone()));
    }

    /// Deliver queued changes; call after the slot lock is released
    pub(super) fn flush(&self) {
        self.observers.flush();
    }
}

/// Unloads a handle on drop unless it was handed to the slot
///
/// Covers cancellation of a `load_and_play` future between awaits.
struct ReleaseGuard {
    handle: Option<Arc<dyn AudioHandle>>,
}

impl ReleaseGuard {
    fn new(handle: Arc<dyn AudioHandle>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    fn take(&mut self) -> Option<Arc<dyn AudioHandle>> {
        self.handle.take()
    }

    async fn release(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.unload().await;
        }
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(async move { handle.unload().await });
            }
        }
    }
}

/// Clamp a requested position into `[0, duration_ms]`
///
/// ```
/// use primuse_ap::playback::clamp_position;
///
/// assert_eq!(clamp_position(-500, 90_000), 0);
/// assert_eq!(clamp_position(120_000, 90_000), 90_000);
/// assert_eq!(clamp_position(30_000, 90_000), 30_000);
/// ```
pub fn clamp_position(requested_ms: i64, duration_ms: u64) -> u64 {
    u64::try_from(requested_ms).unwrap_or(0).min(duration_ms)
}

/// Single owner of the playback session
///
/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct PlaybackCoordinator {
    inner: Arc<Inner>,
}

impl PlaybackCoordinator {
    pub fn new(backend: Arc<dyn AudioBackend>, settings: CoordinatorSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                settings,
                slot: Mutex::new(Slot {
                    session: PlaybackSession::default(),
                    handle: None,
                    poller: None,
                }),
                transport: tokio::sync::Mutex::new(()),
                observers: Arc::new(ObserverRegistry::default()),
            }),
        }
    }

    pub fn settings(&self) -> CoordinatorSettings {
        self.inner.settings
    }

    /// Copy of the current session
    pub fn snapshot(&self) -> PlaybackSession {
        self.inner.lock().session.clone()
    }

    /// True while a poll task for the current track is running
    pub fn is_polling(&self) -> bool {
        self.inner
            .lock()
            .poller
            .as_ref()
            .is_some_and(Poller::is_active)
    }

    pub fn observer_count(&self) -> usize {
        self.inner.observers.len()
    }

    /// Register an observer for every session mutation
    ///
    /// Callbacks run synchronously after the mutation is committed and the
    /// session lock is released. They may call `snapshot` or `is_polling`,
    /// but should stay short: they run on whichever task committed a change.
    pub fn subscribe<O>(&self, observer: O) -> Subscription
    where
        O: SessionObserver + 'static,
    {
        self.inner.observers.register(Arc::new(observer))
    }

    /// Replace whatever is playing with `track` and start it
    ///
    /// The previous handle is unloaded before the new load begins, so a
    /// failed load leaves the session idle. When a newer request changes the
    /// track while this load is in flight, the freshly loaded handle is
    /// unloaded and `Superseded` is returned.
    pub async fn load_and_play(&self, track: Track) -> Result<(), PlaybackError> {
        let (generation, previous) = {
            let mut slot = self.inner.lock();
            slot.session.generation += 1;
            let was_active = !slot.session.is_idle();
            let previous = slot.take_track();
            if was_active {
                self.inner.publish(&slot, SessionChange::TrackChanged);
            }
            (slot.session.generation, previous)
        };
        self.inner.flush();

        if let Some(previous) = previous {
            debug!("Unloading previous sound before generation {}", generation);
            previous.unload().await;
        }

        info!(
            "Loading '{}' by {} from {} (generation {})",
            track.title(),
            track.artist(),
            track.audio_locator(),
            generation
        );

        let loaded = match self.inner.backend.load(track.audio_locator()).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("Failed to load {}: {}", track.audio_locator(), e);
                return Err(if self.is_current(generation) {
                    PlaybackError::load(e)
                } else {
                    PlaybackError::Superseded
                });
            }
        };

        let duration_ms = loaded.duration_ms;
        let handle: Arc<dyn AudioHandle> = Arc::from(loaded.handle);
        let mut guard = ReleaseGuard::new(Arc::clone(&handle));

        if !self.is_current(generation) {
            debug!("Load for generation {} superseded, discarding sound", generation);
            guard.release().await;
            return Err(PlaybackError::Superseded);
        }

        if let Err(e) = handle.play().await {
            warn!("Failed to start {}: {}", track.audio_locator(), e);
            let current = self.is_current(generation);
            guard.release().await;
            return Err(if current {
                PlaybackError::load(e)
            } else {
                PlaybackError::Superseded
            });
        }

        let installed = {
            let mut slot = self.inner.lock();
            if slot.session.generation == generation {
                slot.handle = guard.take();
                slot.session.current_track = Some(track);
                slot.session.is_playing = true;
                slot.session.position_ms = 0;
                slot.session.duration_ms = duration_ms;
                self.start_poller(&mut slot, Arc::clone(&handle));
                self.inner.publish(&slot, SessionChange::TrackChanged);
                true
            } else {
                false
            }
        };
        self.inner.flush();

        if !installed {
            debug!("Generation {} superseded after start, discarding sound", generation);
            guard.release().await;
            return Err(PlaybackError::Superseded);
        }

        info!("Playing generation {} ({}ms)", generation, duration_ms);
        Ok(())
    }

    /// Flip between playing and paused
    ///
    /// State changes only after the backend confirms. Resuming a finished
    /// track restarts it from the beginning.
    pub async fn toggle_play_pause(&self) -> Result<(), PlaybackError> {
        let _transport = self.inner.transport.lock().await;
        let (handle, was_playing, generation, restart) = {
            let slot = self.inner.lock();
            let Some(handle) = slot.handle.clone() else {
                return Err(PlaybackError::NoActiveTrack);
            };
            let session = &slot.session;
            let finished = session.duration_ms > 0 && session.position_ms >= session.duration_ms;
            (
                handle,
                session.is_playing,
                session.generation,
                !session.is_playing && finished,
            )
        };

        if was_playing {
            handle.pause().await.map_err(PlaybackError::transport)?;
        } else {
            if restart {
                handle.seek_to(0).await.map_err(PlaybackError::transport)?;
            }
            handle.play().await.map_err(PlaybackError::transport)?;
        }

        {
            let mut slot = self.inner.lock();
            if slot.session.generation != generation {
                debug!("Toggle for generation {} superseded", generation);
                return Err(PlaybackError::Superseded);
            }

            slot.session.is_playing = !was_playing;
            if restart {
                slot.session.position_ms = 0;
            }
            if was_playing {
                slot.stop_poller();
            } else {
                self.start_poller(&mut slot, handle);
            }
            self.inner.publish(&slot, SessionChange::PlayStateChanged);
        }
        self.inner.flush();
        Ok(())
    }

    /// Move to `position_ms`, clamped into `[0, duration]`
    ///
    /// The clamped position is published before the backend is asked to
    /// seek. A backend failure is returned but the position is not rolled
    /// back; the next poll tick corrects it.
    pub async fn seek(&self, position_ms: i64) -> Result<(), PlaybackError> {
        let _transport = self.inner.transport.lock().await;
        let (handle, target) = {
            let mut slot = self.inner.lock();
            let Some(handle) = slot.handle.clone() else {
                return Err(PlaybackError::NoActiveTrack);
            };
            let target = clamp_position(position_ms, slot.session.duration_ms);
            if slot.session.position_ms != target {
                slot.session.position_ms = target;
                self.inner.publish(&slot, SessionChange::PositionChanged);
            }
            (handle, target)
        };
        self.inner.flush();

        handle.seek_to(target).await.map_err(|e| {
            warn!("Seek to {}ms failed: {}", target, e);
            PlaybackError::seek(e)
        })
    }

    /// Seek relative to the last known position
    pub async fn skip_by(&self, delta_ms: i64) -> Result<(), PlaybackError> {
        let position_ms = {
            let slot = self.inner.lock();
            if slot.handle.is_none() {
                return Err(PlaybackError::NoActiveTrack);
            }
            slot.session.position_ms
        };

        let current = i64::try_from(position_ms).unwrap_or(i64::MAX);
        self.seek(current.saturating_add(delta_ms)).await
    }

    pub async fn skip_forward(&self) -> Result<(), PlaybackError> {
        self.skip_by(self.skip_step()).await
    }

    pub async fn skip_backward(&self) -> Result<(), PlaybackError> {
        self.skip_by(-self.skip_step()).await
    }

    /// Return to idle, unloading the current sound
    ///
    /// Idempotent. Always invalidates in-flight loads; observers are only
    /// notified when a track was actually dropped.
    pub async fn release(&self) {
        let handle = {
            let mut slot = self.inner.lock();
            slot.session.generation += 1;
            let was_active = !slot.session.is_idle();
            let handle = slot.take_track();
            if was_active {
                self.inner.publish(&slot, SessionChange::Released);
            }
            handle
        };
        self.inner.flush();

        if let Some(handle) = handle {
            info!("Releasing current sound");
            handle.unload().await;
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.inner.lock().session.generation == generation
    }

    fn skip_step(&self) -> i64 {
        i64::try_from(self.inner.settings.skip_step_ms).unwrap_or(i64::MAX)
    }

    fn start_poller(&self, slot: &mut Slot, handle: Arc<dyn AudioHandle>) {
        slot.stop_poller();
        slot.poller = Some(Poller::spawn(
            Arc::downgrade(&self.inner),
            slot.session.generation,
            handle,
            self.inner.settings.poll_interval,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_position_bounds() {
        assert_eq!(clamp_position(i64::MIN, 10), 0);
        assert_eq!(clamp_position(i64::MAX, 10), 10);
        assert_eq!(clamp_position(5, 0), 0);
        assert_eq!(clamp_position(0, 10), 0);
        assert_eq!(clamp_position(10, 10), 10);
    }

    #[test]
    fn test_default_settings() {
        let settings = CoordinatorSettings::default();
        assert_eq!(settings.poll_interval, Duration::from_millis(1000));
        assert_eq!(settings.skip_step_ms, 15_000);
    }
}
