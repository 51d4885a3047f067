//! CLI argument definitions using clap
//!
//! This module contains the clap structs for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ledgerlens_core::SubscriptionTier;

/// Ledgerlens - Ask questions about your transactions in plain English
#[derive(Parser)]
#[command(name = "ledgerlens")]
#[command(about = "Natural-language search over personal transaction ledgers", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "ledgerlens.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set LEDGERLENS_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Quota and model settings file (TOML)
    ///
    /// Defaults to ~/.local/share/ledgerlens/config/quotas.toml when present,
    /// otherwise the built-in limits.
    #[arg(long, global = true)]
    pub quota_config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import a user's transactions from CSV
    ///
    /// Expected columns: date, name, amount (required) and merchant,
    /// category, pending (optional). Re-importing the same file is a no-op.
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// User who owns the ledger
        #[arg(short, long)]
        user: String,

        /// Account name (created if missing)
        #[arg(short, long, default_value = "Checking")]
        account: String,
    },

    /// Ask a question about a user's ledger and print the JSON answer
    ///
    /// Counts against the user's daily search quota like an API request.
    Ask {
        /// User whose ledger to search
        #[arg(short, long)]
        user: String,

        /// The question, e.g. "How much did I spend on groceries last month?"
        question: String,
    },

    /// Show today's (UTC) usage and limits for a user
    Usage {
        /// User to report on
        #[arg(short, long)]
        user: String,
    },

    /// Set a user's subscription tier
    Tier {
        /// User to update
        #[arg(short, long)]
        user: String,

        /// New tier: free or pro
        tier: SubscriptionTier,
    },

    /// Print the extract_search_filters tool definition as JSON
    Schema,

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// Every request is attributed to the "local-dev" user.
        #[arg(long)]
        no_auth: bool,
    },
}
