//! Scripted audio backend for coordinator and API tests
//!
//! Loads complete immediately unless a gate is installed for the locator,
//! failures are injected per locator, and every backend call is appended to
//! a shared log so ordering can be asserted.

#![allow(dead_code)]

use async_trait::async_trait;
use primuse_ap::backend::{
    AudioBackend, AudioHandle, BackendError, BackendResult, BackendStatus, LoadedSound,
};
use primuse_ap::playback::CoordinatorSettings;
use primuse_ap::PlaybackCoordinator;
use primuse_common::{SessionChange, SessionEvent, Track};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

pub const DEFAULT_DURATION_MS: u64 = 180_000;

type CallLog = Arc<Mutex<Vec<String>>>;

/// One sound handed out by [`MockBackend`]
pub struct MockSound {
    pub locator: String,
    log: CallLog,
    playing: AtomicBool,
    loaded: AtomicBool,
    position_ms: AtomicU64,
    duration_ms: AtomicU64,
    unload_calls: AtomicUsize,
    status_calls: AtomicUsize,
    fail_seek: AtomicBool,
    fail_transport: AtomicBool,
}

impl MockSound {
    fn record(&self, call: &str) {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{}", call, self.locator));
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    pub fn unload_calls(&self) -> usize {
        self.unload_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn position_ms(&self) -> u64 {
        self.position_ms.load(Ordering::SeqCst)
    }

    /// Simulate playback progress
    pub fn set_position(&self, position_ms: u64) {
        self.position_ms.store(position_ms, Ordering::SeqCst);
    }

    pub fn set_duration(&self, duration_ms: u64) {
        self.duration_ms.store(duration_ms, Ordering::SeqCst);
    }

    /// Simulate the platform dropping the sound
    pub fn set_loaded(&self, loaded: bool) {
        self.loaded.store(loaded, Ordering::SeqCst);
    }

    pub fn fail_seek(&self, fail: bool) {
        self.fail_seek.store(fail, Ordering::SeqCst);
    }

    pub fn fail_transport(&self, fail: bool) {
        self.fail_transport.store(fail, Ordering::SeqCst);
    }
}

struct SharedSound(Arc<MockSound>);

#[async_trait]
impl AudioHandle for SharedSound {
    async fn play(&self) -> BackendResult<()> {
        self.0.record("play");
        if self.0.fail_transport.load(Ordering::SeqCst) {
            return Err(BackendError::Device("device busy".to_string()));
        }
        self.0.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn pause(&self) -> BackendResult<()> {
        self.0.record("pause");
        if self.0.fail_transport.load(Ordering::SeqCst) {
            return Err(BackendError::Device("device busy".to_string()));
        }
        self.0.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn seek_to(&self, position_ms: u64) -> BackendResult<()> {
        self.0.record(&format!("seek({})", position_ms));
        if self.0.fail_seek.load(Ordering::SeqCst) {
            return Err(BackendError::Device("seek rejected".to_string()));
        }
        self.0.position_ms.store(position_ms, Ordering::SeqCst);
        Ok(())
    }

    async fn status(&self) -> BackendStatus {
        self.0.status_calls.fetch_add(1, Ordering::SeqCst);
        BackendStatus {
            position_ms: self.0.position_ms.load(Ordering::SeqCst),
            duration_ms: self.0.duration_ms.load(Ordering::SeqCst),
            is_loaded: self.0.loaded.load(Ordering::SeqCst),
        }
    }

    async fn unload(&self) {
        self.0.record("unload");
        self.0.unload_calls.fetch_add(1, Ordering::SeqCst);
        self.0.loaded.store(false, Ordering::SeqCst);
        self.0.playing.store(false, Ordering::SeqCst);
    }
}

/// Holds a load at the backend until opened
pub struct LoadGate(oneshot::Sender<()>);

impl LoadGate {
    pub fn open(self) {
        let _ = self.0.send(());
    }
}

#[derive(Default)]
struct Script {
    gates: HashMap<String, oneshot::Receiver<()>>,
    failing: HashSet<String>,
    failing_start: HashSet<String>,
    durations: HashMap<String, u64>,
    sounds: Vec<Arc<MockSound>>,
}

#[derive(Default)]
pub struct MockBackend {
    script: Mutex<Script>,
    log: CallLog,
    loads_started: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next load of `locator` wait until the gate opens
    pub fn gate(&self, locator: &str) -> LoadGate {
        let (tx, rx) = oneshot::channel();
        self.script
            .lock()
            .unwrap()
            .gates
            .insert(locator.to_string(), rx);
        LoadGate(tx)
    }

    pub fn fail_load(&self, locator: &str) {
        self.script
            .lock()
            .unwrap()
            .failing
            .insert(locator.to_string());
    }

    /// Load succeeds but the sound refuses to play
    pub fn fail_start(&self, locator: &str) {
        self.script
            .lock()
            .unwrap()
            .failing_start
            .insert(locator.to_string());
    }

    pub fn set_duration(&self, locator: &str, duration_ms: u64) {
        self.script
            .lock()
            .unwrap()
            .durations
            .insert(locator.to_string(), duration_ms);
    }

    /// Every sound handed out, oldest first
    pub fn sounds(&self) -> Vec<Arc<MockSound>> {
        self.script.lock().unwrap().sounds.clone()
    }

    /// Most recent sound loaded for `locator`
    pub fn sound(&self, locator: &str) -> Arc<MockSound> {
        self.sounds()
            .into_iter()
            .rev()
            .find(|sound| sound.locator == locator)
            .unwrap_or_else(|| panic!("no sound loaded for {}", locator))
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Yield until `count` loads have reached the backend
    pub async fn wait_for_loads(&self, count: usize) {
        while self.loads_started.load(Ordering::SeqCst) < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl AudioBackend for MockBackend {
    async fn load(&self, locator: &str) -> BackendResult<LoadedSound> {
        self.log.lock().unwrap().push(format!("load:{}", locator));
        let gate = self.script.lock().unwrap().gates.remove(locator);
        self.loads_started.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let mut script = self.script.lock().unwrap();
        if script.failing.contains(locator) {
            return Err(BackendError::Unreachable(format!("{} not found", locator)));
        }

        let duration_ms = script
            .durations
            .get(locator)
            .copied()
            .unwrap_or(DEFAULT_DURATION_MS);
        let sound = Arc::new(MockSound {
            locator: locator.to_string(),
            log: Arc::clone(&self.log),
            playing: AtomicBool::new(false),
            loaded: AtomicBool::new(true),
            position_ms: AtomicU64::new(0),
            duration_ms: AtomicU64::new(duration_ms),
            unload_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            fail_seek: AtomicBool::new(false),
            fail_transport: AtomicBool::new(script.failing_start.contains(locator)),
        });
        script.sounds.push(Arc::clone(&sound));

        Ok(LoadedSound {
            handle: Box::new(SharedSound(sound)),
            duration_ms,
        })
    }
}

/// Collects every event delivered to an observer
#[derive(Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl EventRecorder {
    pub fn observer(&self) -> impl Fn(&SessionEvent) + Send + Sync + 'static {
        let events = Arc::clone(&self.events);
        move |event: &SessionEvent| events.lock().unwrap().push(event.clone())
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn changes(&self) -> Vec<SessionChange> {
        self.events().iter().map(|event| event.change).collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

pub fn track(locator: &str) -> Track {
    Track::new(
        locator,
        &format!("Title {}", locator),
        "Test Artist",
        locator,
    )
    .unwrap()
}

pub fn settings() -> CoordinatorSettings {
    CoordinatorSettings {
        poll_interval: Duration::from_millis(1000),
        skip_step_ms: 15_000,
    }
}

pub fn coordinator(backend: &Arc<MockBackend>) -> PlaybackCoordinator {
    PlaybackCoordinator::new(backend.clone(), settings())
}
