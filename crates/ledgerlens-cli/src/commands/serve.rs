//! Server command implementation

use std::path::Path;

use anyhow::Result;
use ledgerlens_core::ai::AIBackend;

use super::{build_service, load_config, open_db, resolve_backend};

/// Environment variable holding comma-separated `user:key` API keys
pub const API_KEYS_ENV: &str = "LEDGERLENS_API_KEYS";

pub async fn cmd_serve(
    db_path: &Path,
    host: &str,
    port: u16,
    no_auth: bool,
    no_encrypt: bool,
    quota_config: Option<&Path>,
) -> Result<()> {
    let config = load_config(quota_config)?;
    let backend = resolve_backend()?;
    let api_keys =
        ledgerlens_server::parse_api_keys(&std::env::var(API_KEYS_ENV).unwrap_or_default());

    println!("🚀 Starting Ledgerlens API server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    println!(
        "   Model backend: {} {} (model: {})",
        backend.kind(),
        backend.host(),
        backend.model()
    );

    if no_auth {
        println!();
        println!("   ⚠️  Authentication DISABLED - do not expose to network!");
    } else {
        println!("   🔒 Authentication: Cloudflare Access (header)");
        if !api_keys.is_empty() {
            println!(
                "   🔑 API keys: {} configured ({})",
                api_keys.len(),
                API_KEYS_ENV
            );
        }
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let db = open_db(db_path, no_encrypt)?;
    let search = build_service(db, backend.clone(), &config)?;

    let server_config = ledgerlens_server::ServerConfig {
        require_auth: !no_auth,
        allowed_origins: vec![],
        api_keys,
    };

    ledgerlens_server::serve_with_config(search, backend, host, port, server_config).await
}
