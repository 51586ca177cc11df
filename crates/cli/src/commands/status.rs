//! `tallygram status` — Show configuration and binding summary.

use std::sync::Arc;
use tallygram_config::AppConfig;
use tallygram_store::{BindingCache, SqliteStore};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("📊 Tallygram Status");
    println!("===================");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Mode:         {}", config.tracking.mode);
    println!("  Database:     {}", config.store.db_path);
    println!(
        "  Bot token:    {}",
        if config.has_bot_token() { "set" } else { "missing" }
    );
    println!(
        "  Sheets token: {}",
        if config.has_sheets_token() { "set" } else { "missing" }
    );
    println!(
        "  Poll timeout: {}s",
        config.telegram.poll_timeout_secs
    );

    match SqliteStore::new(&config.store.db_path).await {
        Ok(store) => {
            let bindings = BindingCache::load(Arc::new(store)).await?;
            println!("\n  ✅ Database reachable — {} sheet binding(s)", bindings.len().await);
        }
        Err(e) => println!("\n  ⚠️  Database unreachable: {e}"),
    }

    Ok(())
}
