// SPDX-FileCopyrightText: 2022-2024 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]
#![deny(elided_lifetimes_in_paths)]
#![warn(
    rust_2018_idioms,
    future_incompatible,
    unused,
    unused_lifetimes,
    unused_qualifications,
    unused_results,
    anonymous_parameters,
    deprecated_in_future,
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    keyword_idents,
    macro_use_extern_crate,
    missing_doc_code_examples,
    private_doc_tests,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::cargo,
    clippy::unseparated_literal_suffix,
    clippy::decimal_literal_representation,
    clippy::single_char_lifetime_names,
    clippy::fallible_impl_from,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::wildcard_enum_match_arm,
    clippy::deref_by_slicing,
    clippy::default_numeric_fallback,
    clippy::shadow_reuse,
    clippy::clone_on_ref_ptr,
    clippy::todo,
    clippy::string_add,
    clippy::use_debug,
    clippy::future_not_send
)]
#![cfg_attr(not(test), warn(clippy::panic_in_result_fn))]

mod command;
mod error;
mod metadata;
mod prompt;
mod provider;
mod route;
mod session;
mod storage;
mod subscription;

use std::{path::PathBuf, process, sync::Arc, time::Duration};

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use error::Result;
use futures_util::lock::Mutex;
use log::{error, warn};
use secrecy::SecretString;
use storage::IsPersistent as _;
use url::Url;

use crate::{
    prompt::Prompt,
    provider::{Credential, IdentityProvider},
    session::{SessionManager, SessionStore},
};

#[derive(Debug, Subcommand)]
enum Command {
    SignUp(command::sign_up::Command),
    SignIn(command::sign_in::Command),
    SignInFederated(command::sign_in_federated::Command),
    SignOut(command::sign_out::Command),
    Status(command::status::Command),
    Dashboard(command::dashboard::Command),
}

#[async_trait]
impl command::Command for Command {
    async fn execute(self, ctx: &command::Context) -> Result<()> {
        match self {
            Self::SignUp(cmd) => cmd.execute(ctx).await,
            Self::SignIn(cmd) => cmd.execute(ctx).await,
            Self::SignInFederated(cmd) => cmd.execute(ctx).await,
            Self::SignOut(cmd) => cmd.execute(ctx).await,
            Self::Status(cmd) => cmd.execute(ctx).await,
            Self::Dashboard(cmd) => cmd.execute(ctx).await,
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// The identity provider endpoint. Use `memory:` for a provider that only
    /// keeps accounts for the lifetime of this process.
    #[arg(
        long,
        env = "JOBWISE_URL",
        default_value = "https://identitytoolkit.googleapis.com/v1/",
        value_parser = Url::parse
    )]
    url: Url,

    /// The API key to present to the identity provider.
    #[arg(long, env = "JOBWISE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// The identifier of the federated identity provider to sign in with.
    #[arg(long, env = "JOBWISE_FEDERATED_PROVIDER", default_value = "google.com")]
    federated_provider: String,

    /// How long to wait for the identity provider, in seconds.
    #[arg(long, env = "JOBWISE_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Turn off caching of the signed-in session between runs.
    #[arg(long)]
    no_cache_session: bool,

    /// The path to the Pinentry program to use when asking for passwords.
    #[arg(long, value_hint = clap::ValueHint::ExecutablePath)]
    pinentry_program: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

async fn get_session_storage(args: &Args) -> Box<dyn storage::Storage<Credential>> {
    if !args.no_cache_session {
        #[cfg(feature = "secret-service")]
        match storage::SecretService::new(&args.url).await {
            Ok(secret_service_storage) => return Box::new(secret_service_storage),
            Err(e) => {
                warn!("We need to fall back to unencrypted file storage because we can't connect to the secret service: {}", e);
            }
        }

        #[cfg(feature = "keychain")]
        match storage::Keychain::new(&args.url) {
            Ok(keychain_storage) => return Box::new(keychain_storage),
            Err(e) => {
                warn!("We need to fall back to unencrypted file storage because we can't connect to Keychain: {}", e);
            }
        }

        if let Some(file_storage) = storage::File::new(&args.url) {
            return Box::new(file_storage);
        }
    }

    Box::new(storage::Memory::<Credential>::new())
}

async fn get_provider(
    args: &Args,
    prompt: &Arc<dyn Prompt>,
) -> Result<Box<dyn IdentityProvider>> {
    match args.url.scheme() {
        "memory" => Ok(Box::new(provider::Memory::new(
            args.federated_provider.clone(),
            Arc::clone(prompt),
        ))),
        "http" | "https" => {
            let Some(api_key) = args.api_key.clone() else {
                error!("An API key is required to use the identity provider at {}", args.url);
                return Err(error::Error::Command);
            };

            let storage = get_session_storage(args).await;
            if !args.no_cache_session && !storage.is_persistent() {
                warn!("Your session will not be remembered after this command exits");
            }

            let config = provider::ToolkitConfig::new(
                args.url.clone(),
                SecretString::new(api_key),
                args.federated_provider.clone(),
            );
            Ok(Box::new(
                provider::Toolkit::new(config, Arc::new(Mutex::new(storage)), Arc::clone(prompt))
                    .await?,
            ))
        }
        _ => {
            error!(
                "The URL scheme {} of URL {} is not supported",
                args.url.scheme(),
                args.url
            );
            Err(error::Error::Command)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let prompts: Vec<Box<dyn Prompt>> = vec![
        Box::new(args.pinentry_program.clone().map_or_else(
            prompt::PinentryPrompt::new,
            prompt::PinentryPrompt::new_with_executable,
        )),
        Box::new(prompt::RpasswordPrompt),
    ];
    let prompt: Arc<dyn Prompt> = Arc::new(prompts);

    let provider = get_provider(&args, &prompt).await?;
    let manager = SessionManager::new(provider, Arc::new(SessionStore::new()))
        .with_timeout(Duration::from_secs(args.timeout));
    let ctx = command::Context { manager, prompt };

    let result = command::Command::execute(args.command, &ctx).await;
    ctx.manager.shutdown();

    result
}

#[tokio::main]
async fn main() {
    let logger_env = env_logger::Env::new()
        .filter_or("JOBWISE_LOG", "warn")
        .write_style("JOBWISE_LOG_STYLE");
    env_logger::Builder::from_env(logger_env).init();

    if let Err(e) = run(Args::parse()).await {
        error!("We encountered an error: {}", e);
        process::exit(1);
    };
}
