//! Core command implementations and shared utilities
//!
//! This module contains:
//! - `open_db` - Shared utility to open the database
//! - `load_config` / `resolve_backend` / `build_service` - Search wiring
//! - `cmd_init` - Initialize the database

use std::path::Path;

use anyhow::{Context, Result};
use ledgerlens_core::{AIClient, Database, LedgerlensConfig, PromptLibrary, SearchService};

/// Open database with encryption by default, or unencrypted if --no-encrypt
pub fn open_db(db_path: &Path, no_encrypt: bool) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path must be valid UTF-8")?;
    if no_encrypt {
        Database::new_unencrypted(path_str).context("Failed to open database (unencrypted)")
    } else {
        Database::new(path_str).context("Failed to open database")
    }
}

/// Quota and model settings from `path`, the data-dir override, or the defaults
pub fn load_config(path: Option<&Path>) -> Result<LedgerlensConfig> {
    LedgerlensConfig::load_from(path).context("Failed to load quota config")
}

/// The model backend configured in the environment
pub fn resolve_backend() -> Result<AIClient> {
    AIClient::from_env().context(
        "No model backend configured. Set ANTHROPIC_COMPATIBLE_HOST \
         (or AI_BACKEND=openai_compatible with OPENAI_COMPATIBLE_HOST, or AI_BACKEND=mock)",
    )
}

/// Wire the search pipeline over `db` and `backend`
pub fn build_service(
    db: Database,
    backend: AIClient,
    config: &LedgerlensConfig,
) -> Result<SearchService> {
    SearchService::with_backend(db, backend, config, &PromptLibrary::new())
        .context("Failed to load search prompt")
}

pub fn cmd_init(db_path: &Path, no_encrypt: bool) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    // Migrations run on open
    let db = open_db(db_path, no_encrypt)?;

    if !db.is_encrypted()? {
        println!("   ⚠️  Encryption: DISABLED (--no-encrypt)");
    } else {
        println!("   🔒 Encryption: ENABLED");
    }

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import transactions: ledgerlens import --user alice --file statement.csv");
    println!("  2. Ask a question: ledgerlens ask --user alice \"How much did I spend on coffee?\"");
    println!("  3. Start the API: ledgerlens serve");

    Ok(())
}
