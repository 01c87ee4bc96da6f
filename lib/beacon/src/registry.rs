use crate::dispatch::DispatchHandle;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

lazy_static::lazy_static! {
    // Creation time of this process, shared by every key it hands out.
    static ref SALT: u64 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();

    static ref LIVE: Arc<LiveHandles> = Arc::new(LiveHandles::new());
}

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique name of one in-flight dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleKey {
    salt: u64,
    seq: u64,
}

impl HandleKey {
    /// Next key in this process. Never repeats.
    pub fn next() -> Self {
        HandleKey {
            salt: *SALT,
            seq: NEXT_SEQ.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

impl fmt::Display for HandleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "__log__{}{}", self.salt, self.seq)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("handle {0} is already registered")]
    AlreadyRegistered(HandleKey),
    #[error("handle {0} is not registered")]
    NotRegistered(HandleKey),
    #[error("live-handle registry is poisoned")]
    Poisoned,
}

/// Keeps in-flight dispatch handles alive until their request settles.
pub trait HandleRegistry: Send + Sync {
    fn register(&self, key: HandleKey, handle: Arc<DispatchHandle>) -> Result<(), RegistryError>;

    fn release(&self, key: &HandleKey) -> Result<(), RegistryError>;

    fn contains(&self, key: &HandleKey) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct LiveHandles {
    handles: Mutex<BTreeMap<HandleKey, Arc<DispatchHandle>>>,
}

impl LiveHandles {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> Arc<LiveHandles> {
        LIVE.clone()
    }

    pub fn keys(&self) -> Vec<HandleKey> {
        self.handles
            .lock()
            .map(|handles| handles.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl HandleRegistry for LiveHandles {
    fn register(&self, key: HandleKey, handle: Arc<DispatchHandle>) -> Result<(), RegistryError> {
        let mut handles = self.handles.lock().map_err(|_| RegistryError::Poisoned)?;
        if handles.contains_key(&key) {
            return Err(RegistryError::AlreadyRegistered(key));
        }
        handles.insert(key, handle);
        Ok(())
    }

    fn release(&self, key: &HandleKey) -> Result<(), RegistryError> {
        let removed = self
            .handles
            .lock()
            .map_err(|_| RegistryError::Poisoned)?
            .remove(key);

        // The handle itself is dropped here, outside the lock.
        match removed {
            Some(_) => Ok(()),
            None => Err(RegistryError::NotRegistered(*key)),
        }
    }

    fn contains(&self, key: &HandleKey) -> bool {
        self.handles
            .lock()
            .map(|handles| handles.contains_key(key))
            .unwrap_or(false)
    }

    fn len(&self) -> usize {
        self.handles.lock().map(|handles| handles.len()).unwrap_or(0)
    }
}
