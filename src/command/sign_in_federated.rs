// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;

use crate::{error::Result, route::Route};

use super::Context;

/// Sign in through the configured federated identity provider.
#[derive(Debug, Parser)]
pub(crate) struct Command {}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: &Context) -> Result<()> {
        let _ = ctx.manager.initialized().await?;

        let _ = ctx.manager.sign_in_with_federated_provider().await?;
        println!("Welcome back!");
        super::show(Route::Dashboard, &ctx.manager.session());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        command::{fixtures, Command as _},
        error::{AuthError, Error},
        session::{SessionState, SignInMethod},
    };

    #[tokio::test]
    async fn signs_in_with_the_federated_account() -> Result<()> {
        let (ctx, _) = fixtures::context(vec![Some("jane@gmail.com")]);

        Command {}.execute(&ctx).await?;

        match ctx.manager.session().state() {
            SessionState::SignedIn(identity) => assert_eq!(
                identity.method(),
                SignInMethod::Federated("google.com".to_owned())
            ),
            other => panic!("unexpected state: {other}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn dismissed_popup_is_reported_as_cancelled() {
        let (ctx, _) = fixtures::context(vec![None]);

        let result = Command {}.execute(&ctx).await;

        assert!(matches!(result, Err(Error::Auth(AuthError::UserCancelled))));
        assert_eq!(ctx.manager.session().state(), SessionState::SignedOut);
    }
}
