// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

mod memory;
mod model;
mod toolkit;

use std::{cell::RefCell, sync::Arc};

use async_trait::async_trait;
use log::debug;
use parking_lot::ReentrantMutex;
use secrecy::SecretString;

use crate::{
    error::Result,
    session::UserIdentity,
    subscription::{Observers, Subscription},
};

pub(crate) use memory::Memory;
pub(crate) use model::Credential;
pub(crate) use toolkit::{Toolkit, ToolkitConfig};
#[cfg(test)]
pub(crate) use toolkit::fixtures;

pub(crate) type IdentityListener = Box<dyn Fn(&Option<Arc<UserIdentity>>) + Send + Sync>;

/// An external service that authenticates users.
///
/// Operations report what happened to the caller, but the session only ever
/// learns about identity changes through listeners registered with
/// [`IdentityProvider::on_identity_change`]. A listener is called at least
/// once after registration with the provider's best-known identity.
#[async_trait]
pub(crate) trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &SecretString) -> Result<Arc<UserIdentity>>;
    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Arc<UserIdentity>>;
    async fn sign_in_federated(&self) -> Result<Arc<UserIdentity>>;
    async fn sign_out(&self) -> Result<()>;
    fn on_identity_change(&self, listener: IdentityListener) -> Subscription;
}

#[async_trait]
impl<T: IdentityProvider + ?Sized> IdentityProvider for Box<T> {
    async fn sign_up(&self, email: &str, password: &SecretString) -> Result<Arc<UserIdentity>> {
        (**self).sign_up(email, password).await
    }

    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Arc<UserIdentity>> {
        (**self).sign_in(email, password).await
    }

    async fn sign_in_federated(&self) -> Result<Arc<UserIdentity>> {
        (**self).sign_in_federated().await
    }

    async fn sign_out(&self) -> Result<()> {
        (**self).sign_out().await
    }

    fn on_identity_change(&self, listener: IdentityListener) -> Subscription {
        (**self).on_identity_change(listener)
    }
}

/// Tracks a provider's best-known identity and tells listeners about it.
///
/// Reports and the replay to a new listener are serialized on `current`, so a
/// listener never sees an identity older than one it was already given.
struct IdentityFeed {
    current: ReentrantMutex<RefCell<Option<Arc<UserIdentity>>>>,
    listeners: Observers<Option<Arc<UserIdentity>>>,
}

impl IdentityFeed {
    fn new(initial: Option<Arc<UserIdentity>>) -> Self {
        Self {
            current: ReentrantMutex::new(RefCell::new(initial)),
            listeners: Observers::new(),
        }
    }

    fn current(&self) -> Option<Arc<UserIdentity>> {
        self.current.lock().borrow().clone()
    }

    fn report(&self, identity: Option<Arc<UserIdentity>>) {
        debug!(
            "Identity changed: {}",
            identity
                .as_deref()
                .map_or_else(|| "<none>".to_owned(), |i| i.uid().to_owned())
        );
        let current = self.current.lock();
        _ = current.replace(identity.clone());
        self.listeners.notify(&identity);
    }

    fn listen(&self, listener: IdentityListener) -> Subscription {
        let current = self.current.lock();
        let listener: Arc<IdentityListener> = Arc::new(listener);
        let subscription = {
            let listener = Arc::clone(&listener);
            self.listeners
                .register(move |identity: &Option<Arc<UserIdentity>>| listener(identity))
        };
        let replay = current.borrow().clone();
        listener(&replay);
        subscription
    }
}

/// Lowercased, trimmed email address, or `None` if it can't be one.
fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    match normalized.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {
            Some(normalized)
        }
        Some(_) | None => None,
    }
}
