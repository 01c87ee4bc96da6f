use crate::registry::{HandleKey, HandleRegistry};
use std::sync::{Arc, Mutex};
use transport::{Outcome, Settle, Transport};

/// Observers attached to a live handle. Whoever takes them out of the handle
/// runs the completion routine.
struct Armed {
    registry: Arc<dyn HandleRegistry>,
}

/// The transient object that keeps one in-flight request alive.
///
/// Created per dispatch, held by the live-handle registry until the transport
/// reports a terminal [`Outcome`], then released. Load, error and abort all
/// complete the handle the same way, and only the first of them does anything.
pub struct DispatchHandle {
    key: HandleKey,
    url: String,
    armed: Mutex<Option<Armed>>,
}

impl DispatchHandle {
    pub fn new(key: HandleKey, url: String) -> Self {
        DispatchHandle {
            key,
            url,
            armed: Mutex::new(None),
        }
    }

    pub fn key(&self) -> HandleKey {
        self.key
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// True while terminal observers are attached.
    pub fn is_armed(&self) -> bool {
        self.slot().is_some()
    }

    fn arm(&self, registry: Arc<dyn HandleRegistry>) {
        *self.slot() = Some(Armed { registry });
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Armed>> {
        // A panic elsewhere must not stop a handle from being released.
        self.armed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Completion routine shared by every terminal event.
    fn complete(&self, _outcome: Outcome) {
        // Detach first: a cached, animated resource can report load again and again.
        let armed = self.slot().take();
        let Some(armed) = armed else {
            return;
        };

        if let Err(_err) = armed.registry.release(&self.key) {
            #[cfg(debug_assertions)]
            log::debug!("failed to release beacon handle {}: {_err}", self.key);
        }

        #[cfg(debug_assertions)]
        log::debug!("beacon {} settled: {_outcome:?}", self.key);
    }
}

/// Fires beacons and keeps their handles alive until they settle.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<dyn HandleRegistry>,
    transport: Arc<dyn Transport>,
}

impl Dispatcher {
    pub fn new(registry: Arc<dyn HandleRegistry>, transport: Arc<dyn Transport>) -> Self {
        Dispatcher {
            registry,
            transport,
        }
    }

    /// Attempt `url` once and clean up whatever happens. Never reports back.
    pub fn dispatch(&self, url: String) {
        let key = HandleKey::next();
        let handle = Arc::new(DispatchHandle::new(key, url.clone()));

        if let Err(_err) = self.registry.register(key, handle.clone()) {
            #[cfg(debug_assertions)]
            log::debug!("beacon {key} sent untracked: {_err}");
        }

        handle.arm(self.registry.clone());
        let observer = handle.clone();
        let settle = Settle::new(move |outcome| observer.complete(outcome));

        // Point the transport at the target only once observers are attached;
        // a cached response may settle before `fire` returns.
        self.transport.fire(url, settle);
    }

    pub fn in_flight(&self) -> usize {
        self.registry.len()
    }

    pub fn registry(&self) -> &Arc<dyn HandleRegistry> {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }
}
