//! Observer list safe to mutate from any thread while a delivery runs.
//!
//! Delivery iterates over a snapshot taken under a short read lock, so a
//! callback may register or unregister observers (itself included) without
//! deadlocking. Each entry carries a liveness flag that removal clears; an
//! observer removed mid-delivery is skipped for the rest of that delivery.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::ClientId;

struct Entry<T: ?Sized> {
    client: ClientId,
    callback: Arc<T>,
    live: Arc<AtomicBool>,
}

impl<T: ?Sized> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client,
            callback: Arc::clone(&self.callback),
            live: Arc::clone(&self.live),
        }
    }
}

impl<T: ?Sized> Entry<T> {
    fn retire(&self) {
        self.live.store(false, Ordering::Release);
    }
}

fn same<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

pub struct Registry<T: ?Sized> {
    entries: RwLock<Vec<Entry<T>>>,
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }
}

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer owned by `client`.
    ///
    /// Returns false if this exact observer is already registered.
    pub fn register(&self, client: ClientId, callback: Arc<T>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.iter().any(|e| same(&e.callback, &callback)) {
            return false;
        }
        entries.push(Entry {
            client,
            callback,
            live: Arc::new(AtomicBool::new(true)),
        });
        true
    }

    pub fn unregister(&self, callback: &Arc<T>) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|e| {
            let keep = !same(&e.callback, callback);
            if !keep {
                e.retire();
            }
            keep
        });
        entries.len() != before
    }

    /// Remove every observer owned by `client`, returning how many went.
    pub fn remove_client(&self, client: ClientId) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|e| {
            let keep = e.client != client;
            if !keep {
                e.retire();
            }
            keep
        });
        before - entries.len()
    }

    pub fn count(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Deliver to every observer, skipping any removed during the delivery.
    pub fn for_each(&self, mut deliver: impl FnMut(&T)) {
        let snapshot: Vec<Entry<T>> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for entry in snapshot {
            if entry.live.load(Ordering::Acquire) {
                deliver(entry.callback.as_ref());
            }
        }
    }
}
