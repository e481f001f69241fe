// SPDX-FileCopyrightText: 2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;
use clap::Parser;
use tabled::{
    settings::{object::Segment, Alignment, Modify, Style},
    Table, Tabled,
};

use crate::{
    error::Result,
    session::{Session, SignInMethod},
};

use super::Context;

/// Show who is signed in.
#[derive(Debug, Parser)]
pub(crate) struct Command {}

#[derive(Debug, Tabled)]
struct Row {
    #[tabled(rename = "Field")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn rows(session: &Session) -> Vec<Row> {
    let mut rows = vec![Row {
        name: "State",
        value: session.state().to_string(),
    }];

    if let Some(identity) = session.identity() {
        rows.push(Row {
            name: "User ID",
            value: identity.uid().to_owned(),
        });
        if let Some(email) = identity.email() {
            rows.push(Row {
                name: "Email",
                value: email.to_owned(),
            });
        }
        if let Some(name) = identity.display_name() {
            rows.push(Row {
                name: "Name",
                value: name.to_owned(),
            });
        }
        rows.push(Row {
            name: "Signed in with",
            value: match identity.method() {
                SignInMethod::Password => "password".to_owned(),
                SignInMethod::Federated(provider) => provider,
            },
        });
    }

    rows
}

#[async_trait]
impl super::Command for Command {
    async fn execute(self, ctx: &Context) -> Result<()> {
        let session = ctx.manager.initialized().await?;

        println!(
            "{}",
            Table::new(rows(&session))
                .with(Style::rounded())
                .with(Modify::new(Segment::new(1.., 0..=1)).with(Alignment::left()))
        );
        Ok(())
    }
}
