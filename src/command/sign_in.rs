// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;
use log::debug;

use crate::{
    error::{AuthError, Result},
    prompt::RequestBuilder,
    route::Route,
};

use super::Context;

const ATTEMPTS: usize = 3;

/// Sign in with an email address and password.
#[derive(Debug, Parser)]
pub(crate) struct Command {
    /// The email address of the account.
    #[clap()]
    email: String,
}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: &Context) -> Result<()> {
        let _ = ctx.manager.initialized().await?;

        let mut error: Option<String> = None;
        for attempt in 1..=ATTEMPTS {
            let mut req = RequestBuilder::new(&format!("Enter the password for {}.", self.email));
            if let Some(e) = error.as_ref() {
                req = req.with_error(e);
            }
            let password = ctx.ask(req.into_request()).await?;

            match ctx.manager.sign_in(&self.email, &password).await {
                Ok(_) => {
                    println!("Welcome back!");
                    super::show(Route::Dashboard, &ctx.manager.session());
                    return Ok(());
                }
                Err(e @ AuthError::InvalidCredentials) if attempt < ATTEMPTS => {
                    debug!("Sign-in attempt {} of {} rejected", attempt, ATTEMPTS);
                    error = Some(e.to_string());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(AuthError::InvalidCredentials.into())
    }
}
