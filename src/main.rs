use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use feed_collector::config::{CollectMode, Config};
use feed_collector::{export, session};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    info!("Starting feed-collector");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let mode = match config.mode {
        CollectMode::Api => "api",
        CollectMode::Scroll => "scroll",
    };
    info!(
        mode,
        target = %config.target,
        max_posts = config.max_posts,
        "Configuration loaded"
    );

    // Ctrl+C stops the run; the browser is still closed and partial
    // results are still exported
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let signal_handle = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Interrupt received, stopping collection");
        trigger.cancel();
    });

    let request = config.request();
    let collection = session::collect(&config, &request, &cancel)
        .await
        .context("Collection could not start")?;
    signal_handle.abort();

    info!(
        reason = %collection.reason,
        collected = collection.posts.len(),
        "Collection complete"
    );

    if collection.posts.is_empty() {
        warn!("No posts were collected");
        return Ok(());
    }

    let written = export::write_all(
        &collection.posts,
        &config.output_dir,
        &config.target.file_prefix(),
    )
    .await
    .context("Failed to export posts")?;

    for path in written {
        info!(path = %path.display(), "Wrote");
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,feed_collector=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
