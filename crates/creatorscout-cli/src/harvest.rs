//! Command handlers. Both commands share one Chromium instance and close it
//! on every exit path, Ctrl-C included.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use creatorscout_core::{AppConfig, LogNotifier, MemoryStore, Notifier};
use creatorscout_scraper::{ChromiumDriver, ChromiumOptions, Harvester, TelegramNotifier};

pub(crate) async fn run_harvest(
    config: &AppConfig,
    country: &str,
    industries: &[String],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let harvester = build_harvester(config, Arc::clone(&store))?;

    let report = until_interrupted(&harvester, harvester.run(country, industries)).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    write_snapshot(&store, output).await
}

pub(crate) async fn run_sync_filters(config: &AppConfig, output: Option<&Path>) -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::new());
    let harvester = build_harvester(config, Arc::clone(&store))?;

    let (countries, industries) =
        until_interrupted(&harvester, harvester.sync_reference_data()).await?;
    println!("synced {countries} countries and {industries} industries");

    write_snapshot(&store, output).await
}

fn build_harvester(
    config: &AppConfig,
    store: Arc<MemoryStore>,
) -> anyhow::Result<Harvester<ChromiumDriver>> {
    let driver = Arc::new(ChromiumDriver::new(ChromiumOptions {
        headless: config.chrome_headless,
        user_agent: config.user_agent.clone(),
        request_timeout: Duration::from_secs(config.request_timeout_secs),
    }));
    let harvester = Harvester::from_config(config, driver, store, build_notifier(config)?)
        .map_err(|e| anyhow::anyhow!("failed to build harvester: {e}"))?;
    Ok(harvester)
}

fn build_notifier(config: &AppConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match (&config.telegram_bot_token, &config.telegram_chat_id) {
        (Some(token), Some(chat_id)) => {
            let notifier = TelegramNotifier::new(token, chat_id, config.request_timeout_secs)
                .map_err(|e| anyhow::anyhow!("failed to build Telegram notifier: {e}"))?;
            Ok(Arc::new(notifier))
        }
        (Some(_), None) | (None, Some(_)) => {
            tracing::warn!("Telegram needs both bot token and chat id; logging notifications only");
            Ok(Arc::new(LogNotifier))
        }
        (None, None) => Ok(Arc::new(LogNotifier)),
    }
}

/// Drive `work` to completion or until Ctrl-C, then close the browser.
async fn until_interrupted<T, E>(
    harvester: &Harvester<ChromiumDriver>,
    work: impl Future<Output = Result<T, E>>,
) -> anyhow::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    let outcome = tokio::select! {
        result = work => result.map_err(anyhow::Error::from),
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupt received, shutting down");
            Err(anyhow::anyhow!("interrupted"))
        }
    };
    if let Err(e) = harvester.shutdown().await {
        tracing::warn!(error = %e, "browser did not close cleanly");
    }
    outcome
}

async fn write_snapshot(store: &MemoryStore, output: Option<&Path>) -> anyhow::Result<()> {
    let Some(path) = output else {
        return Ok(());
    };
    let snapshot = store.snapshot().await;
    let json = serde_json::to_vec_pretty(&snapshot)?;
    tokio::fs::write(path, json).await?;
    tracing::info!(
        path = %path.display(),
        hashtags = snapshot.hashtags.len(),
        creators = snapshot.creators.len(),
        videos = snapshot.videos.len(),
        "snapshot written"
    );
    Ok(())
}
