//! `tallygram run` — Start the bot runtime.

use std::sync::Arc;
use tallygram_channels::TelegramChannel;
use tallygram_config::AppConfig;
use tallygram_core::channel::Channel;
use tallygram_engine::{MeasurementRegistry, RecordSink, Router};
use tallygram_ledger::SheetsLedger;
use tallygram_store::{BindingCache, SqliteStore};
use tracing::{info, warn};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let bot_token = config
        .telegram
        .bot_token
        .clone()
        .ok_or("No bot token configured (set TALLYGRAM_BOT_TOKEN or telegram.bot_token)")?;
    let sheets_token = config
        .sheets
        .access_token
        .clone()
        .ok_or("No Sheets token configured (set TALLYGRAM_SHEETS_TOKEN or sheets.access_token)")?;

    println!("📊 Tallygram — starting");
    println!("   Mode:     {}", config.tracking.mode);
    println!("   Database: {}", config.store.db_path);

    let store = Arc::new(SqliteStore::new(&config.store.db_path).await?);
    let bindings = Arc::new(BindingCache::load(store.clone()).await?);
    info!(bindings = bindings.len().await, "Binding cache loaded");

    let mut ledger = SheetsLedger::new(sheets_token);
    if let Some(base_url) = &config.sheets.base_url {
        ledger = ledger.with_base_url(base_url);
    }

    let channel: Arc<TelegramChannel> = Arc::new(
        TelegramChannel::new(bot_token).with_poll_timeout(config.telegram.poll_timeout_secs),
    );

    let router = Router::new(
        channel.clone(),
        bindings,
        MeasurementRegistry::new(store.clone()),
        RecordSink::new(Arc::new(ledger)),
        config.tracking.mode,
    );

    let mut events = channel.start().await?;
    info!("Bot started, polling for updates");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(Ok(event)) => {
                        // Events for one user arrive in order; handling them
                        // sequentially preserves that for the state machine.
                        if let Err(e) = router.handle_event(event).await {
                            warn!(error = %e, "Event handling failed");
                        }
                    }
                    Some(Err(e)) => warn!(error = %e, "Channel delivered an error"),
                    None => {
                        warn!("Event stream closed, shutting down");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, shutting down");
                channel.stop().await?;
                break;
            }
        }
    }

    Ok(())
}
