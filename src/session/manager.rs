// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{future::Future, sync::Arc, time::Duration};

use log::{debug, info, warn};
use secrecy::SecretString;
use tokio::time;

use crate::{
    error::{AuthError, Error, Internal, Result},
    provider::IdentityProvider,
    subscription::Subscription,
};

use super::{Session, SessionState, SessionStore, UserIdentity};

/// Coordinates an identity provider with the session store.
///
/// The store is written in exactly one place: the identity-change listener
/// registered at construction. Operation results go back to the caller and
/// nowhere else, so the store only ever reflects what the provider delivered.
pub(crate) struct SessionManager<P: IdentityProvider> {
    provider: Arc<P>,
    store: Arc<SessionStore>,
    subscription: Subscription,
    timeout: Option<Duration>,
}

impl<P: IdentityProvider + 'static> SessionManager<P> {
    pub(crate) fn new(provider: P, store: Arc<SessionStore>) -> Self {
        let subscription = {
            let store = Arc::clone(&store);
            provider.on_identity_change(Box::new(move |identity: &Option<Arc<UserIdentity>>| {
                let next = Session::delivered(identity.clone());
                log_transition(&store.current().state(), &next.state());
                store.set(next);
            }))
        };

        Self {
            provider: Arc::new(provider),
            store,
            subscription,
            timeout: None,
        }
    }

    /// Stops waiting on any operation the provider hasn't answered within
    /// `limit`. The operation itself keeps running, and whatever it
    /// eventually delivers still reaches the session.
    pub(crate) fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    pub(crate) fn session(&self) -> Session {
        self.store.current()
    }

    pub(crate) fn on_session_change<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        self.store.subscribe(observer)
    }

    /// Waits for the provider's first delivery.
    pub(crate) async fn initialized(&self) -> Result<Session> {
        let mut rx = self.store.watch();
        let session = rx
            .wait_for(Session::is_initialized)
            .await
            .map_err(Internal::from)?
            .clone();
        Ok(session)
    }

    pub(crate) async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Arc<UserIdentity>, AuthError> {
        debug!("Creating account for {}", email);
        let (email, password) = (email.to_owned(), password.clone());
        self.run("sign up", move |provider| async move {
            provider.sign_up(&email, &password).await
        })
        .await
    }

    pub(crate) async fn sign_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Arc<UserIdentity>, AuthError> {
        debug!("Signing in {}", email);
        let (email, password) = (email.to_owned(), password.clone());
        self.run("sign in", move |provider| async move {
            provider.sign_in(&email, &password).await
        })
        .await
    }

    pub(crate) async fn sign_in_with_federated_provider(
        &self,
    ) -> Result<Arc<UserIdentity>, AuthError> {
        debug!("Signing in with federated provider");
        self.run("sign in", |provider| async move {
            provider.sign_in_federated().await
        })
        .await
    }

    pub(crate) async fn sign_out(&self) -> Result<(), AuthError> {
        debug!("Signing out");
        self.run("sign out", |provider| async move { provider.sign_out().await })
            .await
    }

    /// Releases the provider subscription. The store keeps its last value.
    pub(crate) fn shutdown(mut self) {
        self.subscription.unsubscribe();
        debug!("Session manager shut down");
    }

    /// Runs `call` as its own task so that giving up on it never cancels the
    /// provider's work halfway through.
    async fn run<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, AuthError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let task = tokio::spawn(call(Arc::clone(&self.provider)));
        let joined = match self.timeout {
            Some(limit) => match time::timeout(limit, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    debug!("Leaving {} to finish in the background", operation);
                    Ok(Err(AuthError::ProviderUnavailable(format!(
                        "no response within {}ms",
                        limit.as_millis()
                    ))
                    .into()))
                }
            },
            None => task.await,
        };

        joined.map_err(Error::from).and_then(|result| result).map_err(|err| {
            let err = AuthError::from(err);
            warn!("Failed to {}: {}", operation, err);
            err
        })
    }
}

fn log_transition(from: &SessionState, to: &SessionState) {
    match (from, to) {
        (SessionState::Uninitialized, _) => info!("Session initialized: {}", to),
        (SessionState::SignedIn(a), SessionState::SignedIn(b)) if a.uid() != b.uid() => {
            info!("Switched account from {} to {}", a, b);
        }
        (_, _) if from == to => debug!("Session unchanged: {}", to),
        (_, _) => info!("Session changed: {}", to),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        error,
        prompt::fixtures::Canned,
        provider::{fixtures as wire, Credential, IdentityListener, Toolkit},
        storage::Memory,
        session::fixtures,
        subscription::Observers,
    };

    enum Reply {
        Identity(Arc<UserIdentity>),
        Fail(Error),
        Hang,
    }

    #[derive(Default)]
    struct Script {
        listeners: Observers<Option<Arc<UserIdentity>>>,
        startup: Mutex<Option<Option<Arc<UserIdentity>>>>,
        reply: Mutex<Option<Reply>>,
        deliver_on_success: AtomicBool,
    }

    /// Provider whose replies and deliveries are driven by the test.
    #[derive(Clone, Default)]
    struct Scripted(Arc<Script>);

    impl Scripted {
        fn starting_with(identity: Option<Arc<UserIdentity>>) -> Self {
            let provider = Self::default();
            *provider.0.startup.lock() = Some(identity);
            provider
        }

        fn delivering(self) -> Self {
            self.0.deliver_on_success.store(true, Ordering::SeqCst);
            self
        }

        fn reply_with(&self, reply: Reply) {
            *self.0.reply.lock() = Some(reply);
        }

        fn deliver(&self, identity: Option<Arc<UserIdentity>>) {
            self.0.listeners.notify(&identity);
        }

        fn delivers(&self) -> bool {
            self.0.deliver_on_success.load(Ordering::SeqCst)
        }

        async fn respond(&self) -> Result<Arc<UserIdentity>> {
            let reply = self.0.reply.lock().take();
            match reply {
                Some(Reply::Identity(identity)) => {
                    if self.delivers() {
                        self.deliver(Some(Arc::clone(&identity)));
                    }
                    Ok(identity)
                }
                Some(Reply::Fail(err)) => Err(err),
                Some(Reply::Hang) => std::future::pending().await,
                None => Err(AuthError::ProviderUnavailable("nothing scripted".to_owned()).into()),
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for Scripted {
        async fn sign_up(&self, _: &str, _: &SecretString) -> Result<Arc<UserIdentity>> {
            self.respond().await
        }

        async fn sign_in(&self, _: &str, _: &SecretString) -> Result<Arc<UserIdentity>> {
            self.respond().await
        }

        async fn sign_in_federated(&self) -> Result<Arc<UserIdentity>> {
            self.respond().await
        }

        async fn sign_out(&self) -> Result<()> {
            let reply = self.0.reply.lock().take();
            match reply {
                Some(Reply::Fail(err)) => Err(err),
                Some(Reply::Hang) => std::future::pending().await,
                Some(Reply::Identity(_)) | None => {
                    if self.delivers() {
                        self.deliver(None);
                    }
                    Ok(())
                }
            }
        }

        fn on_identity_change(&self, listener: IdentityListener) -> Subscription {
            let subscription = self.0.listeners.register(listener);
            let startup = self.0.startup.lock().clone();
            if let Some(identity) = startup {
                self.deliver(identity);
            }
            subscription
        }
    }

    fn password() -> SecretString {
        SecretString::new("pw".to_owned())
    }

    fn manager(provider: &Scripted) -> SessionManager<Scripted> {
        SessionManager::new(provider.clone(), Arc::new(SessionStore::new()))
    }

    #[test]
    fn startup_delivery_of_signed_out_initializes_the_session() {
        let manager = manager(&Scripted::starting_with(None));

        let session = manager.session();

        assert!(session.is_initialized());
        assert!(session.identity().is_none());
        assert_eq!(session.state(), SessionState::SignedOut);
    }

    #[test]
    fn stays_uninitialized_until_the_first_delivery() {
        let provider = Scripted::default();
        let manager = manager(&provider);
        assert_eq!(manager.session().state(), SessionState::Uninitialized);

        provider.deliver(Some(fixtures::identity("u1", "a@b.com")));
        assert!(manager.session().is_initialized());

        provider.deliver(None);
        assert!(manager.session().is_initialized());
    }

    #[test]
    fn restored_identity_is_the_first_delivery() {
        let u1 = fixtures::identity("u1", "a@b.com");
        let manager = manager(&Scripted::starting_with(Some(Arc::clone(&u1))));

        assert_eq!(manager.session().state(), SessionState::SignedIn(u1));
    }

    #[tokio::test]
    async fn operation_result_alone_does_not_change_the_session() -> Result<()> {
        let provider = Scripted::starting_with(None);
        let manager = manager(&provider);
        let u1 = fixtures::identity("u1", "a@b.com");
        provider.reply_with(Reply::Identity(Arc::clone(&u1)));

        let returned = manager.sign_in("a@b.com", &password()).await?;

        assert_eq!(returned, u1);
        assert_eq!(manager.session().state(), SessionState::SignedOut);

        provider.deliver(Some(Arc::clone(&u1)));
        assert_eq!(manager.session().state(), SessionState::SignedIn(u1));
        Ok(())
    }

    #[tokio::test]
    async fn delivery_before_the_result_ends_in_the_same_session() -> Result<()> {
        let provider = Scripted::starting_with(None).delivering();
        let manager = manager(&provider);
        let u1 = fixtures::identity("u1", "a@b.com");
        provider.reply_with(Reply::Identity(Arc::clone(&u1)));

        let _ = manager.sign_in("a@b.com", &password()).await?;

        let session = manager.session();
        assert!(session.is_initialized());
        assert_eq!(session.identity(), Some(&u1));
        Ok(())
    }

    #[tokio::test]
    async fn rejected_sign_in_leaves_the_session_untouched() {
        let provider = Scripted::starting_with(None).delivering();
        let manager = manager(&provider);
        let before = manager.session();
        provider.reply_with(Reply::Fail(AuthError::InvalidCredentials.into()));

        let result = manager.sign_in("a@b.com", &password()).await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
        assert_eq!(manager.session(), before);
    }

    #[tokio::test]
    async fn unclassified_provider_errors_are_unknown() {
        let provider = Scripted::starting_with(None);
        let manager = manager(&provider);
        provider.reply_with(Reply::Fail(
            error::Api::ServerError {
                code: 400,
                message: "OPERATION_NOT_ALLOWED".to_owned(),
            }
            .into(),
        ));

        let result = manager.sign_up("a@b.com", &password()).await;

        assert!(matches!(result, Err(AuthError::Unknown(_))));
    }

    #[tokio::test]
    async fn dismissed_federated_sign_in_is_cancelled() {
        let provider = Scripted::starting_with(None);
        let manager = manager(&provider);
        provider.reply_with(Reply::Fail(Error::Cancelled));

        let result = manager.sign_in_with_federated_provider().await;

        assert!(matches!(result, Err(AuthError::UserCancelled)));
        assert_eq!(manager.session().state(), SessionState::SignedOut);
    }

    #[tokio::test]
    async fn sign_out_delivers_signed_out() -> Result<()> {
        let u1 = fixtures::identity("u1", "a@b.com");
        let provider = Scripted::starting_with(Some(u1)).delivering();
        let manager = manager(&provider);

        manager.sign_out().await?;

        let session = manager.session();
        assert!(session.is_initialized());
        assert!(session.identity().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn sign_out_while_signed_out_is_a_no_op() -> Result<()> {
        let provider = Scripted::starting_with(None).delivering();
        let manager = manager(&provider);
        let before = manager.session();

        manager.sign_out().await?;
        manager.sign_out().await?;

        assert_eq!(manager.session(), before);
        Ok(())
    }

    #[tokio::test]
    async fn failed_sign_out_keeps_the_identity() {
        let u1 = fixtures::identity("u1", "a@b.com");
        let provider = Scripted::starting_with(Some(Arc::clone(&u1))).delivering();
        let manager = manager(&provider);
        provider.reply_with(Reply::Fail(
            AuthError::ProviderUnavailable("offline".to_owned()).into(),
        ));

        let result = manager.sign_out().await;

        assert!(matches!(result, Err(AuthError::ProviderUnavailable(_))));
        assert_eq!(manager.session().state(), SessionState::SignedIn(u1));
    }

    #[test]
    fn account_switch_replaces_the_identity() {
        let provider = Scripted::starting_with(Some(fixtures::identity("u1", "a@b.com")));
        let manager = manager(&provider);
        let u2 = fixtures::identity("u2", "c@d.com");

        provider.deliver(Some(Arc::clone(&u2)));

        assert_eq!(manager.session().state(), SessionState::SignedIn(u2));
    }

    #[test]
    fn session_observers_run_in_subscription_order() {
        let provider = Scripted::starting_with(None);
        let manager = manager(&provider);
        let order = Arc::new(Mutex::new(Vec::new()));

        let _first = {
            let order = Arc::clone(&order);
            manager.on_session_change(move |_: &Session| order.lock().push("first"))
        };
        let _second = {
            let order = Arc::clone(&order);
            manager.on_session_change(move |_: &Session| order.lock().push("second"))
        };

        provider.deliver(Some(fixtures::identity("u1", "a@b.com")));
        provider.deliver(None);

        assert_eq!(*order.lock(), vec!["first", "second", "first", "second"]);
    }

    #[test]
    fn unsubscribed_observer_hears_nothing_further() {
        let provider = Scripted::starting_with(None);
        let manager = manager(&provider);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let mut sub = {
            let seen = Arc::clone(&seen);
            manager.on_session_change(move |s: &Session| seen.lock().push(s.state()))
        };
        provider.deliver(Some(fixtures::identity("u1", "a@b.com")));
        sub.unsubscribe();
        provider.deliver(None);
        provider.deliver(Some(fixtures::identity("u2", "c@d.com")));

        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn hung_operation_times_out_without_touching_the_session() {
        let provider = Scripted::starting_with(None);
        let manager = manager(&provider).with_timeout(Duration::from_millis(20));
        provider.reply_with(Reply::Hang);

        let result = manager.sign_in("a@b.com", &password()).await;

        assert!(matches!(result, Err(AuthError::ProviderUnavailable(_))));
        assert_eq!(manager.session().state(), SessionState::SignedOut);

        let u1 = fixtures::identity("u1", "a@b.com");
        provider.deliver(Some(Arc::clone(&u1)));
        assert_eq!(manager.session().state(), SessionState::SignedIn(u1));
    }

    #[tokio::test]
    async fn slow_answer_after_a_timeout_still_signs_in() -> Result<()> {
        let server = wire::Server::start(vec![wire::Reply::signed_in("U1", "jane@example.com")
            .after(Duration::from_millis(300))])
        .await?;
        let cache: Memory<Credential> = Memory::new();
        let provider = Toolkit::new(
            server.config()?,
            Arc::new(futures_util::lock::Mutex::new(cache.clone())),
            Arc::new(Canned::new([None])),
        )
        .await?;
        let manager = SessionManager::new(provider, Arc::new(SessionStore::new()))
            .with_timeout(Duration::from_millis(50));

        let result = manager.sign_in("jane@example.com", &password()).await;

        assert!(matches!(result, Err(AuthError::ProviderUnavailable(_))));
        assert_eq!(manager.session().state(), SessionState::SignedOut);

        time::sleep(Duration::from_millis(800)).await;

        let session = manager.session();
        assert_eq!(session.identity().map(|i| i.uid()), Some("U1"));
        assert_eq!(wire::cached_uid(&cache).await?, Some("U1".to_owned()));
        Ok(())
    }

    #[tokio::test]
    async fn initialized_waits_for_the_first_delivery() -> Result<()> {
        let provider = Scripted::default();
        let manager = manager(&provider);

        let (session, ()) = tokio::join!(manager.initialized(), async { provider.deliver(None) });

        assert_eq!(session?.state(), SessionState::SignedOut);
        Ok(())
    }

    #[test]
    fn shutdown_releases_the_provider_subscription() {
        let provider = Scripted::starting_with(None);
        let store = Arc::new(SessionStore::new());
        let manager = SessionManager::new(provider.clone(), Arc::clone(&store));
        assert_eq!(provider.0.listeners.len(), 1);

        manager.shutdown();
        provider.deliver(Some(fixtures::identity("u1", "a@b.com")));

        assert_eq!(provider.0.listeners.len(), 0);
        assert_eq!(store.current().state(), SessionState::SignedOut);
    }
}
