//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init plus shared utilities (open_db, config, service wiring)
//! - `import` - Ledger CSV import
//! - `search` - Ask a question, print the tool schema
//! - `account` - Usage report and tier assignment
//! - `serve` - Web server command

pub mod account;
pub mod core;
pub mod import;
pub mod search;
pub mod serve;

// Re-export command functions for main.rs
pub use account::*;
pub use core::*;
pub use import::*;
pub use search::*;
pub use serve::*;
