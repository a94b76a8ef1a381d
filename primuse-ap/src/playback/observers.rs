//! Observer registry
//!
//! Screens and other consumers register a callback and receive every
//! session mutation as a [`SessionEvent`]. Deregistration is RAII: dropping
//! the returned [`Subscription`] removes the callback.
//!
//! Events are queued while the session is locked and delivered after the
//! lock is released. One caller at a time drains the queue, so observers
//! see events in commit order and may read the coordinator freely.

use primuse_common::SessionEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tracing::debug;

/// Receives session changes
///
/// Implemented for any `Fn(&SessionEvent) + Send + Sync` closure.
pub trait SessionObserver: Send + Sync {
    fn on_state_change(&self, event: &SessionEvent);
}

impl<F> SessionObserver for F
where
    F: Fn(&SessionEvent) + Send + Sync,
{
    fn on_state_change(&self, event: &SessionEvent) {
        self(event)
    }
}

type ObserverList = Vec<(u64, Arc<dyn SessionObserver>)>;

#[derive(Default)]
pub(super) struct ObserverRegistry {
    next_id: AtomicU64,
    observers: Mutex<ObserverList>,
    pending: Mutex<VecDeque<SessionEvent>>,
    draining: AtomicBool,
}

/// Clears the draining flag even if an observer panics
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ObserverRegistry {
    fn list(&self) -> std::sync::MutexGuard<'_, ObserverList> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, VecDeque<SessionEvent>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn register(self: &Arc<Self>, observer: Arc<dyn SessionObserver>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.list().push((id, observer));
        debug!("Observer {} subscribed", id);

        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64) {
        let mut list = self.list();
        let before = list.len();
        list.retain(|(observer_id, _)| *observer_id != id);
        if list.len() != before {
            debug!("Observer {} unsubscribed", id);
        }
    }

    pub(super) fn len(&self) -> usize {
        self.list().len()
    }

    /// Queue an event for delivery by the next [`flush`](Self::flush)
    pub(super) fn enqueue(&self, event: SessionEvent) {
        self.queue().push_back(event);
    }

    /// Deliver queued events in order
    ///
    /// Must be called without the session lock held. If another caller is
    /// already draining, it picks up whatever was queued here.
    pub(super) fn flush(&self) {
        loop {
            if self.draining.swap(true, Ordering::SeqCst) {
                return;
            }

            {
                let _draining = DrainGuard(&self.draining);
                loop {
                    let next = self.queue().pop_front();
                    match next {
                        Some(event) => self.notify(&event),
                        None => break,
                    }
                }
            }

            // An event queued after the last pop but before the flag cleared
            if self.queue().is_empty() {
                return;
            }
        }
    }

    pub(super) fn notify(&self, event: &SessionEvent) {
        let observers: Vec<Arc<dyn SessionObserver>> =
            self.list().iter().map(|(_, observer)| Arc::clone(observer)).collect();

        for observer in observers {
            observer.on_state_change(event);
        }
    }
}

/// Registration token; dropping it deregisters the observer
#[must_use = "dropping a Subscription immediately unsubscribes the observer"]
pub struct Subscription {
    id: u64,
    registry: Weak<ObserverRegistry>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Deregister now
    pub fn unsubscribe(self) {}

    /// Keep the observer registered for the coordinator's whole lifetime
    pub fn detach(mut self) {
        self.registry = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primuse_common::{PlaybackSession, SessionChange};

    fn event() -> SessionEvent {
        SessionEvent::new(SessionChange::PositionChanged, PlaybackSession::default())
    }

    #[test]
    fn test_drop_unsubscribes() {
        let registry = Arc::new(ObserverRegistry::default());
        let hits = Arc::new(AtomicU64::new(0));

        let counter = Arc::clone(&hits);
        let subscription = registry.register(Arc::new(move |_: &SessionEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(registry.len(), 1);

        registry.notify(&event());
        drop(subscription);
        registry.notify(&event());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_flush_delivers_queued_events_in_order() {
        let registry = Arc::new(ObserverRegistry::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let _subscription = registry.register(Arc::new(move |event: &SessionEvent| {
            sink.lock().unwrap().push(event.change);
        }));

        registry.enqueue(SessionEvent::new(
            SessionChange::TrackChanged,
            PlaybackSession::default(),
        ));
        registry.enqueue(event());
        assert!(seen.lock().unwrap().is_empty());

        registry.flush();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![SessionChange::TrackChanged, SessionChange::PositionChanged]
        );

        // Queue is drained
        registry.flush();
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_observer_may_reenter_registry() {
        let registry = Arc::new(ObserverRegistry::default());
        let counts = Arc::new(Mutex::new(Vec::new()));

        let inner_registry = Arc::downgrade(&registry);
        let sink = Arc::clone(&counts);
        let _subscription = registry.register(Arc::new(move |_: &SessionEvent| {
            if let Some(registry) = inner_registry.upgrade() {
                sink.lock().unwrap().push(registry.len());
                // Nested flush while draining returns immediately
                registry.flush();
            }
        }));

        registry.enqueue(event());
        registry.enqueue(event());
        registry.flush();

        assert_eq!(*counts.lock().unwrap(), vec![1, 1]);
    }

    #[test]
    fn test_detach_keeps_observer() {
        let registry = Arc::new(ObserverRegistry::default());
        registry.register(Arc::new(|_: &SessionEvent| {})).detach();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unsubscribe_only_removes_own_entry() {
        let registry = Arc::new(ObserverRegistry::default());
        let first = registry.register(Arc::new(|_: &SessionEvent| {}));
        let second = registry.register(Arc::new(|_: &SessionEvent| {}));
        assert_ne!(first.id(), second.id());

        first.unsubscribe();
        assert_eq!(registry.len(), 1);
        drop(second);
        assert_eq!(registry.len(), 0);
    }
}
