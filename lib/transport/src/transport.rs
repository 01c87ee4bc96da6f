use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Terminal state of one fire-and-forget request.
///
/// All three are treated the same by the dispatcher: the request is over and
/// whatever was keeping it alive can be released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Loaded,
    Errored,
    Aborted,
}

type Notify = Box<dyn Fn(Outcome) + Send + Sync>;

/// Completion token handed to a [`Transport`] together with the URL to fire.
///
/// A transport reports terminal events through [`Settle::settle`]. It may do so
/// from inside `fire` (the response was already cached), later from another
/// task, or more than once. A token that is dropped without ever being settled
/// reports [`Outcome::Aborted`] on drop, so an abandoned request still
/// completes.
pub struct Settle {
    notify: Notify,
    settled: AtomicBool,
}

impl Settle {
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn(Outcome) + Send + Sync + 'static,
    {
        Settle {
            notify: Box::new(notify),
            settled: AtomicBool::new(false),
        }
    }

    pub fn settle(&self, outcome: Outcome) {
        self.settled.store(true, Ordering::SeqCst);
        (self.notify)(outcome);
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::SeqCst)
    }
}

impl Drop for Settle {
    fn drop(&mut self) {
        if !*self.settled.get_mut() {
            (self.notify)(Outcome::Aborted);
        }
    }
}

impl fmt::Debug for Settle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settle")
            .field("settled", &self.is_settled())
            .finish()
    }
}

pub trait Transport: Send + Sync {
    /// Start a single GET against `url` and return immediately.
    /// The outcome is reported through `settle`; nothing is returned to the caller.
    fn fire(&self, url: String, settle: Settle);

    /// Returns the name of the transport (e.g., "http")
    fn name(&self) -> &'static str;
}
