// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

mod manager;
mod store;

use std::{fmt, sync::Arc};

use inflector::Inflector as _;
use serde::{Deserialize, Serialize};

pub(crate) use manager::SessionManager;
pub(crate) use store::SessionStore;

/// How the provider authenticated an identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SignInMethod {
    Password,
    Federated(String),
}

impl SignInMethod {
    const PASSWORD_PROVIDER_ID: &'static str = "password";

    pub(crate) fn from_provider_id(provider_id: &str) -> Self {
        if provider_id.is_empty() || provider_id == Self::PASSWORD_PROVIDER_ID {
            Self::Password
        } else {
            Self::Federated(provider_id.to_owned())
        }
    }

    pub(crate) fn provider_id(&self) -> &str {
        match self {
            Self::Password => Self::PASSWORD_PROVIDER_ID,
            Self::Federated(id) => id,
        }
    }
}

/// A provider-issued identity. Never modified once received; a change of
/// identity replaces the whole value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserIdentity {
    uid: String,
    email: Option<String>,
    display_name: Option<String>,
    provider_id: String,
}

impl UserIdentity {
    pub(crate) fn new(
        uid: String,
        email: Option<String>,
        display_name: Option<String>,
        method: SignInMethod,
    ) -> Self {
        Self {
            uid,
            email,
            display_name,
            provider_id: method.provider_id().to_owned(),
        }
    }

    pub(crate) fn uid(&self) -> &str {
        &self.uid
    }

    pub(crate) fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub(crate) fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub(crate) fn method(&self) -> SignInMethod {
        SignInMethod::from_provider_id(&self.provider_id)
    }

    /// The best human-readable label: display name, then email, then uid.
    pub(crate) fn label(&self) -> &str {
        self.display_name()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| self.email())
            .unwrap_or(&self.uid)
    }

    /// Up to two initials for an avatar placeholder.
    pub(crate) fn initials(&self) -> String {
        let source = match self.display_name().filter(|name| !name.trim().is_empty()) {
            Some(name) => name.to_owned(),
            None => self
                .email()
                .and_then(|email| email.split('@').next())
                .unwrap_or(&self.uid)
                .to_title_case(),
        };

        source
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .take(2)
            .flat_map(char::to_uppercase)
            .collect()
    }
}

impl fmt::Display for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The process's current belief about who is signed in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Session {
    identity: Option<Arc<UserIdentity>>,
    initialized: bool,
}

impl Session {
    pub(crate) const fn identity(&self) -> Option<&Arc<UserIdentity>> {
        self.identity.as_ref()
    }

    pub(crate) const fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn state(&self) -> SessionState {
        match (self.initialized, &self.identity) {
            (false, _) => SessionState::Uninitialized,
            (true, None) => SessionState::SignedOut,
            (true, Some(identity)) => SessionState::SignedIn(Arc::clone(identity)),
        }
    }

    /// The session that follows a provider delivery of `identity`.
    fn delivered(identity: Option<Arc<UserIdentity>>) -> Self {
        Self {
            identity,
            initialized: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SessionState {
    Uninitialized,
    SignedOut,
    SignedIn(Arc<UserIdentity>),
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::SignedOut => write!(f, "signed out"),
            Self::SignedIn(identity) => write!(f, "signed in as {identity}"),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use super::{SignInMethod, UserIdentity};

    pub(crate) fn identity(uid: &str, email: &str) -> Arc<UserIdentity> {
        Arc::new(UserIdentity::new(
            uid.to_owned(),
            Some(email.to_owned()),
            None,
            SignInMethod::Password,
        ))
    }
}
