// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::lock::Mutex;
use log::{debug, info, warn};
use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;
use url::Url;

use crate::{
    error::{AuthError, Result},
    metadata,
    prompt::{self, Prompt},
    session::{SignInMethod, UserIdentity},
    storage,
    subscription::Subscription,
};

use super::{
    model::{self, Credential},
    IdentityFeed, IdentityListener, IdentityProvider,
};

/// Where the identity toolkit lives and how to present ourselves to it.
pub(crate) struct ToolkitConfig {
    pub(crate) endpoint: Url,
    pub(crate) api_key: SecretString,
    pub(crate) federated_provider: String,
    pub(crate) request_uri: String,
}

impl ToolkitConfig {
    pub(crate) fn new(mut endpoint: Url, api_key: SecretString, federated_provider: String) -> Self {
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        Self {
            endpoint,
            api_key,
            federated_provider,
            request_uri: "http://localhost".to_owned(),
        }
    }
}

/// Identity provider backed by an identity-toolkit style REST API.
///
/// The credential from the last successful sign-in is cached in `storage` so
/// that a later run starts out signed in.
pub(crate) struct Toolkit<Storage: storage::Storage<Credential>> {
    http: reqwest::Client,
    config: ToolkitConfig,
    storage: Arc<Mutex<Storage>>,
    federated_prompt: Arc<dyn Prompt>,
    feed: IdentityFeed,
}

impl<Storage: storage::Storage<Credential>> Toolkit<Storage> {
    pub(crate) async fn new(
        config: ToolkitConfig,
        storage: Arc<Mutex<Storage>>,
        federated_prompt: Arc<dyn Prompt>,
    ) -> Result<Self> {
        let restored = match storage.lock().await.get().await {
            Ok(credential) => credential.map(|c| c.identity()),
            Err(err) => {
                warn!("Ignoring cached credential that could not be read: {}", err);
                None
            }
        };
        if let Some(identity) = restored.as_ref() {
            info!("Restored session for {}", identity.uid());
        }

        let http = reqwest::Client::builder()
            .user_agent(metadata::USER_AGENT.as_str())
            .build()?;

        Ok(Self {
            http,
            config,
            storage,
            federated_prompt,
            feed: IdentityFeed::new(restored),
        })
    }

    fn url(&self, method: &str) -> Result<Url> {
        let mut url = self.config.endpoint.join(&format!("./accounts:{method}"))?;
        _ = url
            .query_pairs_mut()
            .append_pair("key", self.config.api_key.expose_secret());
        Ok(url)
    }

    async fn call<Req: Serialize + Sync>(
        &self,
        method: &str,
        body: &Req,
    ) -> Result<model::AuthResponse> {
        debug!("Calling identity toolkit method {}", method);

        let resp = self.http.post(self.url(method)?).json(body).send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(model::error_from_response(status.as_u16(), &bytes));
        }

        let resp: model::AuthResponse = serde_json::from_slice(&bytes)?;
        if let Some(expires_in) = resp.expires_in {
            debug!("Identity token for {} expires in {}s", resp.local_id, expires_in);
        }
        Ok(resp)
    }

    async fn establish(&self, credential: Credential) -> Arc<UserIdentity> {
        let identity = credential.identity();
        if let Err(err) = self.storage.lock().await.update(&credential).await {
            warn!("Signed in, but the credential could not be cached: {}", err);
        }
        self.feed.report(Some(Arc::clone(&identity)));
        identity
    }

    async fn password_call(
        &self,
        method: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<Arc<UserIdentity>> {
        let resp = self
            .call(
                method,
                &model::PasswordRequest {
                    email: email.trim(),
                    password: password.expose_secret(),
                    return_secure_token: true,
                },
            )
            .await?;
        Ok(self
            .establish(resp.into_credential(SignInMethod::Password))
            .await)
    }
}

#[async_trait]
impl<Storage: storage::Storage<Credential>> IdentityProvider for Toolkit<Storage> {
    async fn sign_up(&self, email: &str, password: &SecretString) -> Result<Arc<UserIdentity>> {
        self.password_call("signUp", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Arc<UserIdentity>> {
        self.password_call("signInWithPassword", email, password).await
    }

    async fn sign_in_federated(&self) -> Result<Arc<UserIdentity>> {
        let provider = &self.config.federated_provider;
        let req = prompt::RequestBuilder::new(&format!(
            "Sign in with {provider}, then paste the ID token it issued to continue."
        ))
        .with_label("ID token")
        .into_request();

        let assertion = self
            .federated_prompt
            .prompt(req)
            .await?
            .ok_or(AuthError::UserCancelled)?;
        let token = assertion.expose_secret().trim();
        if token.is_empty() {
            return Err(AuthError::UserCancelled.into());
        }

        let post_body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("id_token", token)
            .append_pair("providerId", provider)
            .finish();
        let resp = self
            .call(
                "signInWithIdp",
                &model::IdpRequest {
                    post_body,
                    request_uri: &self.config.request_uri,
                    return_secure_token: true,
                    return_idp_credential: true,
                },
            )
            .await?;
        Ok(self
            .establish(resp.into_credential(SignInMethod::Federated(provider.clone())))
            .await)
    }

    async fn sign_out(&self) -> Result<()> {
        self.storage.lock().await.clear().await?;
        self.feed.report(None);
        Ok(())
    }

    fn on_identity_change(&self, listener: IdentityListener) -> Subscription {
        self.feed.listen(listener)
    }
}
