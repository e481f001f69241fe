// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;
use log::error;
use secrecy::ExposeSecret as _;

use crate::{
    error::{Error, Result},
    prompt::RequestBuilder,
    route::Route,
};

use super::Context;

/// Create an account with an email address and password.
#[derive(Debug, Parser)]
pub(crate) struct Command {
    /// The email address for the new account.
    #[clap()]
    email: String,
}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: &Context) -> Result<()> {
        let _ = ctx.manager.initialized().await?;

        let password = ctx
            .ask(
                RequestBuilder::new(&format!("Choose a password for {}.", self.email))
                    .into_request(),
            )
            .await?;
        let confirmation = ctx
            .ask(
                RequestBuilder::new("Enter the same password again.")
                    .with_label("Confirm password")
                    .into_request(),
            )
            .await?;
        if password.expose_secret() != confirmation.expose_secret() {
            error!("The passwords you entered do not match");
            return Err(Error::Command);
        }

        let _ = ctx.manager.sign_up(&self.email, &password).await?;
        println!("Account created!");
        super::show(Route::Dashboard, &ctx.manager.session());
        Ok(())
    }
}
