// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::{ffi::OsString, path::Path};

use async_trait::async_trait;
use secrecy::{ExposeSecret as _, SecretString};
use tokio::task;

use crate::{error::Result, metadata};

/// What to ask the user for.
#[derive(Debug, Clone)]
pub(crate) struct Request {
    description: String,
    label: String,
    error: Option<String>,
}

pub(crate) struct RequestBuilder {
    description: String,
    label: String,
    error: Option<String>,
}

impl RequestBuilder {
    pub(crate) fn new(description: &str) -> Self {
        Self {
            description: description.to_owned(),
            label: "Password".to_owned(),
            error: None,
        }
    }

    pub(crate) fn with_label(mut self, label: &str) -> Self {
        label.clone_into(&mut self.label);
        self
    }

    pub(crate) fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_owned());
        self
    }

    pub(crate) fn into_request(self) -> Request {
        Request {
            description: self.description,
            label: self.label,
            error: self.error,
        }
    }
}

#[async_trait]
pub(crate) trait Prompt: Send + Sync {
    /// Asks for a secret. `Ok(None)` means this prompt could not be shown.
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>>;
}

#[async_trait]
impl<T: Prompt + ?Sized> Prompt for Box<T> {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
        (**self).prompt(req).await
    }
}

#[async_trait]
impl<T: Prompt> Prompt for Vec<T> {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
        for candidate in self {
            if let r @ (Ok(Some(_)) | Err(_)) = candidate.prompt(req.clone()).await {
                return r;
            }
        }

        Ok(None)
    }
}

pub(crate) struct PinentryPrompt {
    executable: Option<OsString>,
}

impl PinentryPrompt {
    pub(crate) const fn new() -> Self {
        Self { executable: None }
    }

    pub(crate) fn new_with_executable<P: AsRef<Path>>(executable: P) -> Self {
        Self {
            executable: Some(executable.as_ref().as_os_str().into()),
        }
    }
}

#[async_trait]
impl Prompt for PinentryPrompt {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
        fn interact<'input>(
            mut input: pinentry::PassphraseInput<'input>,
            title: &'input str,
            req: &'input Request,
        ) -> Result<SecretString> {
            _ = input.with_title(title);
            _ = input.with_description(&req.description);
            _ = input.with_prompt(&req.label);
            if let Some(e) = req.error.as_ref() {
                _ = input.with_error(e);
            }

            Ok(input.interact()?)
        }

        let title = format!("{} - {}", req.label, *metadata::CLIENT_DISPLAY_NAME);

        let input = self
            .executable
            .as_ref()
            .and_then(pinentry::PassphraseInput::with_binary)
            .or_else(pinentry::PassphraseInput::with_default_binary)
            .map(|input| task::spawn_blocking(move || interact(input, &title, &req)));

        Ok(match input {
            Some(fut) => Some(fut.await??),
            None => None,
        })
    }
}

pub(crate) struct RpasswordPrompt;

#[async_trait]
impl Prompt for RpasswordPrompt {
    async fn prompt(&self, req: Request) -> Result<Option<SecretString>> {
        if let Some(error) = req.error.as_ref() {
            eprintln!("Error: {error}");
        }
        eprintln!("{}", req.description);

        let label = format!("{}: ", req.label);
        let answer = task::spawn_blocking(move || rpassword::prompt_password(label)).await??;

        // An empty answer on the terminal is how the user backs out.
        Ok(Some(SecretString::new(answer)).filter(|s| !s.expose_secret().is_empty()))
    }
}


#[cfg(test)]
mod tests {
    use super::{fixtures::Canned, *};
    use crate::error::Result;

    #[tokio::test]
    async fn first_prompt_with_an_answer_wins() -> Result<()> {
        let prompts = vec![Canned::new([None]), Canned::new([Some("hunter2")])];
        let req = RequestBuilder::new("Enter your password")
            .with_label("Secret")
            .into_request();

        let answer = prompts.prompt(req).await?;

        assert_eq!(answer.map(|s| s.expose_secret().clone()), Some("hunter2".to_owned()));
        assert_eq!(prompts[0].asked.lock().len(), 1);
        assert_eq!(prompts[1].asked.lock()[0].label, "Secret");
        Ok(())
    }

    #[tokio::test]
    async fn no_answer_from_any_prompt() -> Result<()> {
        let prompts = vec![Canned::new([None]), Canned::new([None])];
        let req = RequestBuilder::new("Enter your password").into_request();

        assert!(prompts.prompt(req).await?.is_none());
        Ok(())
    }
}
