use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use oss_watch::config::WatchConfig;
use oss_watch::github::{ApiClient, OctocrabTransport};
use oss_watch::persistence::FileSnapshotCache;
use oss_watch::watchlist::WatchList;
use oss_watch::worker::WatchOrchestrator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "oss_watch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WatchConfig::from_env();
    tracing::debug!(?config, "Loaded configuration");

    let list = WatchList::load(&config.watch_list_path).with_context(|| {
        format!(
            "failed to load watch list from {}",
            config.watch_list_path.display()
        )
    })?;
    if list.repos.is_empty() {
        tracing::info!(
            path = %config.watch_list_path.display(),
            "Watch list is empty, nothing to do"
        );
        return Ok(());
    }

    let transport =
        OctocrabTransport::from_token(config.github_token.clone(), config.request_timeout)
            .context("failed to build GitHub client")?;
    let watcher = WatchOrchestrator::new(
        ApiClient::new(transport),
        FileSnapshotCache::new(&config.state_dir),
        config.concurrency,
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            on_interrupt.cancel();
        }
    });

    let results = watcher.run_watch_list(&list, &cancel).await;

    let mut failed = 0;
    for result in &results {
        match &result.outcome {
            Ok(events) if events.is_empty() => println!("{}: no changes", result.repo),
            Ok(events) => {
                for event in events {
                    println!("{}: {}", result.repo, event);
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}: error: {}", result.repo, e);
            }
        }
    }

    if failed == results.len() {
        anyhow::bail!("all {} repositories failed", failed);
    }
    Ok(())
}
