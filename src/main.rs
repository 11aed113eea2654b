use anyhow::Context;
use log::info;
use oref_alert_bot::{
    alerts::{AlertFetcher, AlertMonitor, AlertPipeline, DeduplicationFilter},
    config::Config,
    diagnostics::DiagnosticsLog,
    fanout::SubscriptionFanout,
    storage::{SqliteSubscriptionStore, SubscriptionStore},
    telegram::{commands::CommandRouter, TelegramClient},
    utils::setup_logging,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    setup_logging().context("Failed to initialize logging")?;

    let config = Config::from_env();
    config.validate()?;
    info!("🚨 Alert relay bot starting...");

    let store: Arc<dyn SubscriptionStore> = Arc::new(
        SqliteSubscriptionStore::open(&config.sqlite_db_path)
            .context("Failed to open subscription store")?,
    );
    store.add_admin(config.superuser_id)?;

    let telegram = Arc::new(TelegramClient::new(
        &config.telegram_bot_token,
        Duration::from_secs(config.http_timeout_secs),
    )?);

    let pipeline = Arc::new(AlertPipeline::new(
        DeduplicationFilter::new(Duration::from_secs(config.dedup_window_secs)),
        SubscriptionFanout::new(Arc::clone(&store), telegram.clone()),
    ));

    let fetcher = AlertFetcher::new(
        &config.alert_origin_url,
        &config.alert_feed_url,
        Duration::from_secs(config.http_timeout_secs),
    )?;
    let monitor = AlertMonitor::new(
        Arc::new(fetcher),
        Arc::clone(&pipeline),
        DiagnosticsLog::new(config.debug_folder.clone()),
        Duration::from_secs(config.alert_check_interval_secs),
    );
    tokio::spawn(async move { monitor.run().await });

    let router = CommandRouter::new(
        telegram,
        store,
        pipeline,
        config.dev_mode,
        config.update_poll_timeout_secs,
    );
    tokio::spawn(async move { router.run().await });

    info!(
        "Monitoring the alert feed every {}s. Press CTRL-C to exit.",
        config.alert_check_interval_secs
    );
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    info!("🛑 Shutting down...");
    Ok(())
}
