// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;

use crate::{error::Result, route::Route, session::UserIdentity};

use super::Context;

/// Open the dashboard, which needs a signed-in account.
#[derive(Debug, Parser)]
pub(crate) struct Command {}

/// The avatar line shown at the top of the dashboard.
fn header(identity: &UserIdentity) -> String {
    format!("[{}] {}", identity.initials(), identity.label())
}

pub(super) fn render(identity: &UserIdentity) {
    println!("{}", header(identity));
    println!("Dashboard");
}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: &Context) -> Result<()> {
        let session = ctx.manager.initialized().await?;
        super::show(Route::Dashboard, &session);
        Ok(())
    }
}
