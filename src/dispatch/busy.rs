//! Single-flight busy slot
//!
//! At most one capture cycle holds the slot. Holding is represented by a
//! [`BusyGuard`]; the slot frees itself when the guard drops, which also
//! covers early returns, panics and task aborts.
//!
//! With a lock file the slot is also shared between processes, so a
//! `hotprompt clipboard` bound to a desktop shortcut can't overlap the
//! daemon or another one-shot run.

use pidlock::Pidlock;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared single-slot lock
#[derive(Debug, Clone, Default)]
pub struct BusySlot {
    busy: Arc<AtomicBool>,
    lock_file: Option<Arc<PathBuf>>,
}

impl BusySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// A slot that additionally holds a pid lock at `path` while taken
    pub fn with_lock_file(path: impl Into<PathBuf>) -> Self {
        Self {
            busy: Arc::default(),
            lock_file: Some(Arc::new(path.into())),
        }
    }

    /// Take the slot if it is free
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;

        let mut guard = BusyGuard {
            busy: self.busy.clone(),
            lock: None,
        };

        if let Some(path) = &self.lock_file {
            let mut lock = Pidlock::new(&path.to_string_lossy());
            if lock.acquire().is_err() {
                tracing::debug!("Cycle lock {:?} is held by another process", path);
                // Dropping the guard frees the in-process flag again
                return None;
            }
            guard.lock = Some(lock);
        }

        Some(guard)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Proof of holding the slot; releases it on drop
pub struct BusyGuard {
    busy: Arc<AtomicBool>,
    lock: Option<Pidlock>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        if let Some(lock) = self.lock.as_mut() {
            if let Err(e) = lock.release() {
                tracing::warn!("Failed to release cycle lock: {:?}", e);
            }
        }
        self.busy.store(false, Ordering::Release);
    }
}
