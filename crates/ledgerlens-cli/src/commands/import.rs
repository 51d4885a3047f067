//! Ledger import command

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use ledgerlens_core::{import_ledger, Database, ImportStats};

pub fn cmd_import(db: &Database, file: &Path, user: &str, account: &str) -> Result<ImportStats> {
    println!("📥 Importing {} for {}...", file.display(), user);

    let reader =
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let stats = import_ledger(db, user, account, reader)
        .with_context(|| format!("Failed to import {}", file.display()))?;

    println!("   Account: {}", account);
    println!("   Parsed: {} rows", stats.parsed);
    println!("   Imported: {}", stats.imported);
    if stats.skipped_duplicates > 0 {
        println!("   Skipped (already imported): {}", stats.skipped_duplicates);
    }
    println!("✅ Import complete");

    Ok(stats)
}
