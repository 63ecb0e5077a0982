//! Change notification for editable curves and surfaces.
//!
//! External consumers (drawers, samplers) register a callback and receive a
//! stable key.  Keys stay valid until unregistered; notifying after an
//! observer has been removed is a no-op rather than a dangling access.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    pub struct ObserverKey;
}

/// What changed about the observed curve or surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurveEvent {
    /// The span `[t0, t1]` must be recomputed.
    Invalidated { t0: f64, t1: f64 },
    /// The whole object must be recomputed.
    InvalidatedAll,
    /// The observed object is being destroyed; drop any borrowed state.
    Destroyed,
}

type Callback = Box<dyn FnMut(CurveEvent) + Send>;

/// A registry of invalidation callbacks keyed by stable slotmap handles.
#[derive(Default)]
pub struct Observers {
    callbacks: SlotMap<ObserverKey, Callback>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, callback: impl FnMut(CurveEvent) + Send + 'static) -> ObserverKey {
        self.callbacks.insert(Box::new(callback))
    }

    /// Remove a previously registered observer.  Returns false if the key
    /// was already gone.
    pub fn unregister(&mut self, key: ObserverKey) -> bool {
        self.callbacks.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Notify every observer that `[t0, t1]`, clamped against the current
    /// domain, must be recomputed.  An inverted span is ignored.
    pub fn invalidate(&mut self, t0: f64, t1: f64, max_t: f64) {
        if t0 > t1 {
            return;
        }
        let t0 = t0.max(0.0);
        let t1 = t1.min(max_t);
        for callback in self.callbacks.values_mut() {
            callback(CurveEvent::Invalidated { t0, t1 });
        }
    }

    pub fn invalidate_all(&mut self) {
        for callback in self.callbacks.values_mut() {
            callback(CurveEvent::InvalidatedAll);
        }
    }
}

impl Drop for Observers {
    fn drop(&mut self) {
        // Every remaining observer hears about the teardown before the
        // registry goes away.
        for callback in self.callbacks.values_mut() {
            callback(CurveEvent::Destroyed);
        }
    }
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("len", &self.callbacks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_register_and_invalidate() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut observers = Observers::new();
        let h = hits.clone();
        let key = observers.register(move |event| {
            if let CurveEvent::Invalidated { t0, t1 } = event {
                assert_eq!(t0, 0.0);
                assert_eq!(t1, 2.0);
                h.fetch_add(1, Ordering::SeqCst);
            }
        });

        observers.invalidate(-1.0, 5.0, 2.0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(observers.unregister(key));
        observers.invalidate(0.0, 1.0, 2.0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!observers.unregister(key));
    }

    #[test]
    fn test_inverted_span_is_ignored() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut observers = Observers::new();
        let h = hits.clone();
        observers.register(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        observers.invalidate(1.0, 0.5, 2.0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_destroyed_on_drop() {
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let mut observers = Observers::new();
            let h = hits.clone();
            observers.register(move |event| {
                if event == CurveEvent::Destroyed {
                    h.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
