// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{io, result};

use thiserror::Error;
use tokio::sync::watch;

pub(crate) type Result<T, E = Error> = result::Result<T, E>;

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("IO operation failed: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("JSON format error: {0}")]
    Json(serde_json::Error),
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),
    #[error("API error: {0}")]
    Api(#[from] Api),
    #[cfg(any(feature = "secret-service", feature = "keychain"))]
    #[error("storage error: {0}")]
    Storage(#[from] Storage),
    #[error("password retrieval error: {0}")]
    Password(#[from] Password),
    #[error("internal communication error: {0}")]
    Internal(#[from] Internal),
    #[error("command execution failed")]
    Command,
    #[error("operation cancelled")]
    Cancelled,
}

impl From<pinentry::Error> for Error {
    fn from(value: pinentry::Error) -> Self {
        // LINT: Deliberate fall-through that should catch future cases added to
        // the enum.
        #[allow(
            clippy::wildcard_enum_match_arm,
            clippy::match_wildcard_for_single_variants
        )]
        match value {
            pinentry::Error::Cancelled | pinentry::Error::Timeout => Self::Cancelled,
            pinentry::Error::Io(e) => Self::Io(e),
            _ => Self::Password(Password::Pinentry(value)),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        // LINT: Deliberate fall-through that should catch future cases added to
        // the enum.
        #[allow(clippy::wildcard_enum_match_arm)]
        match value.classify() {
            serde_json::error::Category::Io => Self::Io(value.into()),
            _ => Self::Json(value),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        if value.is_connect() || value.is_timeout() {
            Self::Auth(AuthError::ProviderUnavailable(value.to_string()))
        } else {
            Self::Http(value)
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Io(value.into())
    }
}

/// The failures a session operation reports to its caller.
///
/// Every provider failure is folded into one of these categories before it
/// leaves the session manager. Nothing is retried.
#[derive(Error, Debug)]
pub(crate) enum AuthError {
    #[error("the email address or password was not accepted")]
    InvalidCredentials,
    #[error("an account already exists for this email address")]
    AccountAlreadyExists,
    #[error("the identity provider is unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("sign-in was cancelled")]
    UserCancelled,
    #[error("{0}")]
    Unknown(#[source] Box<Error>),
}

impl From<Error> for AuthError {
    fn from(value: Error) -> Self {
        // LINT: Anything we can't classify is reported as-is.
        #[allow(clippy::wildcard_enum_match_arm)]
        match value {
            Error::Auth(e) => e,
            Error::Cancelled => Self::UserCancelled,
            other => Self::Unknown(Box::new(other)),
        }
    }
}

#[derive(Error, Debug)]
pub(crate) enum Api {
    #[error("server error ({code}): {message}")]
    ServerError { code: u16, message: String },
    #[error("server sent a response that we could not interpret (HTTP status {0})")]
    MalformedResponse(u16),
}

#[cfg(any(feature = "secret-service", feature = "keychain"))]
#[derive(Error, Debug)]
pub(crate) enum Storage {
    #[cfg(feature = "secret-service")]
    #[error("secret service error: {0}")]
    SecretService(#[from] oo7::Error),
    #[cfg(feature = "keychain")]
    #[error("keychain error: {0}")]
    Keychain(#[from] security_framework::base::Error),
}

#[derive(Error, Debug)]
pub(crate) enum Password {
    #[error("no password prompt available")]
    NoPrompt,
    #[error("Pinentry implementation error: {0}")]
    Pinentry(pinentry::Error),
}

#[derive(Error, Debug)]
pub(crate) enum Internal {
    #[error("channel is closed")]
    ChannelClosed,
}

impl From<watch::error::RecvError> for Internal {
    fn from(_: watch::error::RecvError) -> Self {
        Self::ChannelClosed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_pass_through_unchanged() {
        let err = AuthError::from(Error::Auth(AuthError::AccountAlreadyExists));
        assert!(matches!(err, AuthError::AccountAlreadyExists));
    }

    #[test]
    fn cancellation_is_reported_as_user_cancelled() {
        assert!(matches!(
            AuthError::from(Error::Cancelled),
            AuthError::UserCancelled
        ));
    }

    #[test]
    fn unclassified_errors_are_wrapped() {
        let err = AuthError::from(Error::Api(Api::ServerError {
            code: 400,
            message: "OPERATION_NOT_ALLOWED".to_owned(),
        }));
        match err {
            AuthError::Unknown(inner) => {
                assert!(inner.to_string().contains("OPERATION_NOT_ALLOWED"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
