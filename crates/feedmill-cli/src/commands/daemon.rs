use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use feedmill_core::{scheduler::SchedulerService, storage::Database, AppConfig};

/// Run the scheduler in the foreground until Ctrl+C
pub async fn run(db: Database, config: Arc<AppConfig>) -> Result<()> {
    let pipeline = super::pipeline(db, &config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    println!(
        "feedmill daemon started (PID: {}). Press Ctrl+C to stop.",
        std::process::id()
    );
    println!("  Pull interval: {} seconds", config.pull.interval_secs);
    println!("  Pull concurrency: {}", config.pull.concurrency);
    println!(
        "  Full-content fetching by default: {}",
        if config.enrichment.auto_fetch_full_content { "on" } else { "off" }
    );

    SchedulerService::new(pipeline, config).run(shutdown_rx).await;

    println!("Daemon stopped.");
    Ok(())
}
