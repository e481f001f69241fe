// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{
    cell::Cell,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
};

use parking_lot::{Mutex, ReentrantMutex};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Held for the duration of every call to an observer, so that releasing it
/// from another thread waits for an in-flight call to finish.
type Live = Arc<ReentrantMutex<Cell<bool>>>;

struct Registration<T> {
    id: u64,
    live: Live,
    callback: Callback<T>,
}

/// Handle to a registered observer. Releasing it, either explicitly or by
/// dropping it, deregisters the observer exactly once.
#[must_use = "dropping a subscription releases it immediately"]
pub(crate) struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new<F: FnOnce() + Send + Sync + 'static>(release: F) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub(crate) fn unsubscribe(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    pub(crate) const fn is_active(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Ordered set of callbacks.
///
/// Notification runs over a snapshot of the registrations so that a callback
/// may register or release observers without deadlocking. A registration
/// released while a notification is in flight is skipped, and once release
/// returns the callback is not running and never runs again.
pub(crate) struct Observers<T> {
    registrations: Arc<Mutex<Vec<Registration<T>>>>,
    next_id: AtomicU64,
}

impl<T: 'static> Observers<T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let live: Live = Arc::new(ReentrantMutex::new(Cell::new(true)));
        self.registrations.lock().push(Registration {
            id,
            live: Arc::clone(&live),
            callback: Arc::new(callback),
        });

        let registrations: Weak<Mutex<Vec<Registration<T>>>> = Arc::downgrade(&self.registrations);
        Subscription::new(move || {
            live.lock().set(false);
            if let Some(registrations) = registrations.upgrade() {
                registrations.lock().retain(|r| r.id != id);
            }
        })
    }

    pub(crate) fn notify(&self, value: &T) {
        let snapshot: Vec<(Live, Callback<T>)> = self
            .registrations
            .lock()
            .iter()
            .map(|r| (Arc::clone(&r.live), Arc::clone(&r.callback)))
            .collect();

        for (live, callback) in snapshot {
            let guard = live.lock();
            if guard.get() {
                callback(value);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.registrations.lock().len()
    }
}

impl<T> Default for Observers<T> {
    fn default() -> Self {
        Self {
            registrations: Arc::new(Mutex::new(Vec::new())),
            next_id: AtomicU64::new(0),
        }
    }
}
