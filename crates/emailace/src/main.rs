//! `EmailAce` - AI-assisted support email triage from the terminal
//!
//! Drives the dashboard core against the triage backend: list and search the
//! inbox, watch analytics, and draft, edit and send replies.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod commands;
mod settings;

use anyhow::Context;
use clap::Parser;
use emailace_api::ApiClient;
use emailace_core::Dashboard;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};
use settings::{load_settings, settings_path};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so command output stays pipeable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "emailace=info,emailace_core=info,emailace_api=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let path = cli.config.clone().unwrap_or_else(settings_path);
    let settings = load_settings(&path)
        .await?
        .with_overrides(cli.api_url.clone(), cli.timeout_secs);
    debug!("Using settings from {}: {settings:?}", path.display());

    if let Command::Settings { save } = cli.command {
        return commands::settings(&settings, &path, save).await;
    }

    let client = ApiClient::http(&settings.api_url, settings.request_timeout())
        .with_context(|| format!("invalid backend URL {}", settings.api_url))?;
    let dashboard = Dashboard::new(client, settings.dashboard_config());
    info!("Starting EmailAce against {}", settings.api_url);

    match cli.command {
        Command::Health => commands::health(&dashboard).await,
        Command::Inbox {
            search,
            sort,
            server_search,
            watch,
        } => commands::inbox(&dashboard, search, sort, server_search, watch).await,
        Command::Show { id } => commands::show(&dashboard, id).await,
        Command::Analytics { watch } => commands::analytics(&dashboard, watch).await,
        Command::Reply {
            id,
            prompt,
            text,
            send,
        } => commands::reply(&dashboard, id, prompt, text, send).await,
        Command::Archive { id } => commands::archive(&dashboard, id).await,
        Command::Sync => commands::sync(&dashboard).await,
        Command::Settings { .. } => Ok(()),
    }
}
