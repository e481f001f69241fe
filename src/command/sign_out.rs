// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use async_trait::async_trait;
use clap::Parser;
use log::warn;

use crate::{error::Result, route::Route, session::Session};

use super::Context;

/// Sign out of the current account.
#[derive(Debug, Parser)]
pub(crate) struct Command {}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: &Context) -> Result<()> {
        let _ = ctx.manager.initialized().await?;

        let signed_out = Arc::new(AtomicBool::new(false));
        let mut subscription = {
            let signed_out = Arc::clone(&signed_out);
            ctx.manager.on_session_change(move |session: &Session| {
                signed_out.store(session.identity().is_none(), Ordering::Release);
            })
        };
        let result = ctx.manager.sign_out().await;
        subscription.unsubscribe();
        result?;

        if signed_out.load(Ordering::Acquire) {
            println!("Logged out");
        } else {
            warn!("The identity provider has not confirmed the sign-out yet");
        }
        super::show(Route::Home, &ctx.manager.session());
        Ok(())
    }
}
