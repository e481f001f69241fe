// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;

use crate::{
    error::{self, Result},
    metadata,
    prompt::{Prompt, Request},
    provider::IdentityProvider,
    route::{self, Access, Route},
    session::{Session, SessionManager},
};

pub(crate) mod dashboard;
pub(crate) mod sign_in;
pub(crate) mod sign_in_federated;
pub(crate) mod sign_out;
pub(crate) mod sign_up;
pub(crate) mod status;

/// Everything a command needs to talk to the user and the session.
pub(crate) struct Context {
    pub(crate) manager: SessionManager<Box<dyn IdentityProvider>>,
    pub(crate) prompt: Arc<dyn Prompt>,
}

impl Context {
    async fn ask(&self, req: Request) -> Result<SecretString> {
        self.prompt
            .prompt(req)
            .await?
            .ok_or_else(|| error::Password::NoPrompt.into())
    }
}

#[async_trait]
pub(crate) trait Command {
    async fn execute(self, ctx: &Context) -> Result<()>;
}

/// Prints what `route` shows for `session`, following redirects.
fn show(route: Route, session: &Session) {
    match route::resolve(route, session) {
        Access::Pending => println!("Loading..."),
        Access::Redirect(to) => {
            println!("Redirecting to {to}");
            show(to, session);
        }
        Access::Granted => match route {
            Route::Home => match session.identity() {
                Some(identity) => println!("Signed in as {identity}."),
                None => println!("Welcome to {}.", *metadata::CLIENT_DISPLAY_NAME),
            },
            Route::Login => println!(
                "Sign in with `{0} sign-in <email>` or `{0} sign-in-federated`.",
                *metadata::CLIENT_TYPE_ID
            ),
            Route::Dashboard => {
                if let Some(identity) = session.identity() {
                    dashboard::render(identity);
                }
            }
        },
    }
}
