//! Ledgerlens CLI - Natural-language search over transaction ledgers
//!
//! Usage:
//!   ledgerlens init                                  Initialize database
//!   ledgerlens import --user U --file CSV            Import a user's transactions
//!   ledgerlens ask --user U "How much on coffee?"    Run a search
//!   ledgerlens serve --port 3000                     Start web server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Import {
            file,
            user,
            account,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_import(&db, &file, &user, &account).map(|_| ())
        }
        Commands::Ask { user, question } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.quota_config.as_deref())?;
            let service = commands::build_service(db, commands::resolve_backend()?, &config)?;
            let reply = commands::cmd_ask(&service, &user, &question).await?;
            if reply.status != 200 {
                anyhow::bail!("Search failed with status {}", reply.status);
            }
            Ok(())
        }
        Commands::Usage { user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.quota_config.as_deref())?;
            commands::cmd_usage(&db, &config, &user).map(|_| ())
        }
        Commands::Tier { user, tier } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_tier(&db, &user, tier)
        }
        Commands::Schema => commands::cmd_schema(),
        Commands::Serve {
            port,
            host,
            no_auth,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                no_auth,
                cli.no_encrypt,
                cli.quota_config.as_deref(),
            )
            .await
        }
    }
}
