// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use log::debug;
use parking_lot::Mutex;
use secrecy::{ExposeSecret as _, SecretString};

use crate::{
    error::{AuthError, Result},
    prompt::{self, Prompt},
    session::{SignInMethod, UserIdentity},
    subscription::Subscription,
};

use super::{normalize_email, IdentityFeed, IdentityListener, IdentityProvider};

struct Account {
    identity: Arc<UserIdentity>,
    password: Option<SecretString>,
}

/// Identity provider that keeps its accounts in this process.
///
/// Nothing survives the process, so every run starts signed out.
pub(crate) struct Memory {
    accounts: Mutex<HashMap<String, Account>>,
    federated_provider: String,
    federated_prompt: Arc<dyn Prompt>,
    feed: IdentityFeed,
}

impl Memory {
    pub(crate) fn new(federated_provider: String, federated_prompt: Arc<dyn Prompt>) -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            federated_provider,
            federated_prompt,
            feed: IdentityFeed::new(None),
        }
    }

    fn new_uid() -> String {
        uuid::Builder::from_random_bytes(rand::random())
            .into_uuid()
            .simple()
            .to_string()
    }

    /// Ends the current session from the provider's side, as when a token is
    /// revoked elsewhere.
    #[cfg(test)]
    pub(crate) fn revoke(&self) {
        self.feed.report(None);
    }
}

#[async_trait]
impl IdentityProvider for Memory {
    async fn sign_up(&self, email: &str, password: &SecretString) -> Result<Arc<UserIdentity>> {
        let email = normalize_email(email).ok_or(AuthError::InvalidCredentials)?;
        if password.expose_secret().is_empty() {
            return Err(AuthError::InvalidCredentials.into());
        }

        let identity = {
            let mut accounts = self.accounts.lock();
            if accounts.contains_key(&email) {
                return Err(AuthError::AccountAlreadyExists.into());
            }

            let identity = Arc::new(UserIdentity::new(
                Self::new_uid(),
                Some(email.clone()),
                None,
                SignInMethod::Password,
            ));
            _ = accounts.insert(
                email,
                Account {
                    identity: Arc::clone(&identity),
                    password: Some(password.clone()),
                },
            );
            identity
        };

        debug!("Created account {}", identity.uid());
        self.feed.report(Some(Arc::clone(&identity)));
        Ok(identity)
    }

    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Arc<UserIdentity>> {
        let email = normalize_email(email).ok_or(AuthError::InvalidCredentials)?;
        let identity = self
            .accounts
            .lock()
            .get(&email)
            .filter(|account| {
                account
                    .password
                    .as_ref()
                    .map_or(false, |p| p.expose_secret() == password.expose_secret())
            })
            .map(|account| Arc::clone(&account.identity))
            .ok_or(AuthError::InvalidCredentials)?;

        self.feed.report(Some(Arc::clone(&identity)));
        Ok(identity)
    }

    async fn sign_in_federated(&self) -> Result<Arc<UserIdentity>> {
        let provider = &self.federated_provider;
        let req = prompt::RequestBuilder::new(&format!(
            "Enter the account you want to use with {provider}."
        ))
        .with_label("Account")
        .into_request();

        let assertion = self
            .federated_prompt
            .prompt(req)
            .await?
            .ok_or(AuthError::UserCancelled)?;
        let subject = assertion.expose_secret().trim().to_ascii_lowercase();
        if subject.is_empty() {
            return Err(AuthError::UserCancelled.into());
        }

        let identity = {
            let mut accounts = self.accounts.lock();
            let account = accounts
                .entry(format!("{provider}:{subject}"))
                .or_insert_with(|| Account {
                    identity: Arc::new(UserIdentity::new(
                        Self::new_uid(),
                        normalize_email(&subject),
                        None,
                        SignInMethod::Federated(provider.clone()),
                    )),
                    password: None,
                });
            Arc::clone(&account.identity)
        };

        self.feed.report(Some(Arc::clone(&identity)));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<()> {
        self.feed.report(None);
        Ok(())
    }

    fn on_identity_change(&self, listener: IdentityListener) -> Subscription {
        self.feed.listen(listener)
    }
}
