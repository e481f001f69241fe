// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use secrecy::{
    zeroize::Zeroize, CloneableSecret, DebugSecret, ExposeSecret as _, Secret, SecretString,
    SerializableSecret,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::{
    error::{self, AuthError, Error},
    session::{SignInMethod, UserIdentity},
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct PasswordRequest<'req> {
    pub(super) email: &'req str,
    pub(super) password: &'req str,
    pub(super) return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct IdpRequest<'req> {
    pub(super) post_body: String,
    pub(super) request_uri: &'req str,
    pub(super) return_secure_token: bool,
    pub(super) return_idp_credential: bool,
}

#[serde_as]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AuthResponse {
    pub(super) local_id: String,
    #[serde(default)]
    pub(super) email: Option<String>,
    #[serde(default)]
    pub(super) display_name: Option<String>,
    #[serde(default)]
    pub(super) provider_id: Option<String>,
    pub(super) id_token: SecretString,
    pub(super) refresh_token: SecretString,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub(super) expires_in: Option<u64>,
}

impl AuthResponse {
    pub(super) fn into_credential(self, fallback: SignInMethod) -> Credential {
        let method = self
            .provider_id
            .as_deref()
            .map_or(fallback, SignInMethod::from_provider_id);
        Credential {
            identity: UserIdentity::new(
                self.local_id,
                self.email.filter(|e| !e.is_empty()),
                self.display_name.filter(|n| !n.is_empty()),
                method,
            ),
            id_token: Secret::new(Token(self.id_token.expose_secret().clone())),
            refresh_token: Secret::new(Token(self.refresh_token.expose_secret().clone())),
        }
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: u16,
    message: String,
}

/// Error codes the identity toolkit reports at the start of an error
/// message, e.g. `"TOO_MANY_ATTEMPTS_TRY_LATER : Access to this account..."`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum ErrorCode {
    EmailExists,
    EmailNotFound,
    InvalidPassword,
    InvalidLoginCredentials,
    InvalidEmail,
    MissingPassword,
    WeakPassword,
    UserDisabled,
    TooManyAttempts,
    QuotaExceeded,
    Other,
}

impl ErrorCode {
    pub(super) fn parse(message: &str) -> Self {
        let code = message.split(" : ").next().unwrap_or(message).trim();
        match code {
            "EMAIL_EXISTS" => Self::EmailExists,
            "EMAIL_NOT_FOUND" => Self::EmailNotFound,
            "INVALID_PASSWORD" => Self::InvalidPassword,
            "INVALID_LOGIN_CREDENTIALS" => Self::InvalidLoginCredentials,
            "INVALID_EMAIL" => Self::InvalidEmail,
            "MISSING_PASSWORD" => Self::MissingPassword,
            "WEAK_PASSWORD" => Self::WeakPassword,
            "USER_DISABLED" => Self::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyAttempts,
            "QUOTA_EXCEEDED" => Self::QuotaExceeded,
            _ => Self::Other,
        }
    }
}

/// Turns an unsuccessful response into an error.
pub(super) fn error_from_response(status: u16, body: &[u8]) -> Error {
    let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(body) else {
        return if status >= 500 {
            AuthError::ProviderUnavailable(format!("server responded with HTTP status {status}"))
                .into()
        } else {
            error::Api::MalformedResponse(status).into()
        };
    };

    let ErrorBody { code, message } = envelope.error;
    match ErrorCode::parse(&message) {
        ErrorCode::EmailExists => AuthError::AccountAlreadyExists.into(),
        ErrorCode::EmailNotFound
        | ErrorCode::InvalidPassword
        | ErrorCode::InvalidLoginCredentials
        | ErrorCode::InvalidEmail
        | ErrorCode::MissingPassword
        | ErrorCode::WeakPassword
        | ErrorCode::UserDisabled => AuthError::InvalidCredentials.into(),
        ErrorCode::TooManyAttempts | ErrorCode::QuotaExceeded => {
            AuthError::ProviderUnavailable(message).into()
        }
        ErrorCode::Other if code >= 500 => AuthError::ProviderUnavailable(message).into(),
        ErrorCode::Other => error::Api::ServerError { code, message }.into(),
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct Token(String);

impl Zeroize for Token {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl CloneableSecret for Token {}
impl DebugSecret for Token {}
impl SerializableSecret for Token {}

/// What the toolkit provider keeps between runs to restore a signed-in
/// session.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Credential {
    identity: UserIdentity,
    id_token: Secret<Token>,
    refresh_token: Secret<Token>,
}

impl Credential {
    pub(super) fn identity(&self) -> Arc<UserIdentity> {
        Arc::new(self.identity.clone())
    }
}
