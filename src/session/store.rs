// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use tokio::sync::watch;

use crate::subscription::{Observers, Subscription};

use super::Session;

/// Holder of the one current [`Session`].
///
/// Reads hand out snapshots. Only the session manager writes, and every write
/// is followed by a synchronous fan-out to observers in the order they
/// subscribed.
pub(crate) struct SessionStore {
    current: watch::Sender<Session>,
    observers: Observers<Session>,
}

impl SessionStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn current(&self) -> Session {
        self.current.borrow().clone()
    }

    pub(crate) fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        self.observers.register(observer)
    }

    pub(crate) fn watch(&self) -> watch::Receiver<Session> {
        self.current.subscribe()
    }

    pub(super) fn set(&self, next: Session) {
        let snapshot = next.clone();
        _ = self.current.send_replace(next);
        self.observers.notify(&snapshot);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        let (current, _) = watch::channel(Session::default());
        Self {
            current,
            observers: Observers::new(),
        }
    }
}
