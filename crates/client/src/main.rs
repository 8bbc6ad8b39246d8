// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Diagnostic CLI for the lodge backend. The session (token and refresh
//! cookie) lives for the duration of one invocation.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::error;

use lodge::{ClientConfig, FileMarkerStore, SessionClient};

#[derive(Parser)]
#[command(name = "lodge", about = "Session client for the lodge marketplace backend")]
struct Cli {
    #[command(flatten)]
    config: ClientConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in, then optionally fetch a path with the fresh session.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Path to GET after logging in (e.g. /api/room/mine).
        path: Option<String>,
    },
    /// Resume the session silently and GET a path.
    Get { path: String },
    /// Log out and mark the session logged out for every context.
    Logout,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = rustls::crypto::ring::default_provider().install_default();

    let client =
        SessionClient::new(&cli.config, Arc::new(FileMarkerStore::in_state_dir()), None);

    if let Err(e) = run(&client, cli.command).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

async fn run(client: &SessionClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password, path } => {
            client.login(&email, &password).await?;
            println!("logged in");
            if let Some(path) = path {
                print_json(client, &path).await?;
            }
        }
        Command::Get { path } => {
            if !client.bootstrap().await {
                tracing::warn!("no session to resume, request goes out unauthenticated");
            }
            print_json(client, &path).await?;
        }
        Command::Logout => {
            client.logout().await;
            println!("logged out");
        }
    }
    Ok(())
}

async fn print_json(client: &SessionClient, path: &str) -> anyhow::Result<()> {
    let value: serde_json::Value = client.get_json(path).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
