//! Run entry points.
//!
//! Each function picks one acquisition strategy, injects it into a
//! [`Collector`] and owns whatever external resources the strategy needs
//! for the duration of the run.

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::browser::BrowserSession;
use crate::collector::{Collection, Collector};
use crate::config::{CollectMode, Config};
use crate::model::CollectionRequest;
use crate::sources::{ApiSource, ScrollSource};

/// Failures that prevent a run from starting at all.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to launch browser session: {0}")]
    ResourceLaunch(String),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Collect through the configured strategy.
///
/// # Errors
///
/// Returns an error only when the strategy's resources cannot be acquired.
pub async fn collect(
    config: &Config,
    request: &CollectionRequest,
    cancel: &CancellationToken,
) -> Result<Collection, CollectError> {
    match config.mode {
        CollectMode::Api => collect_via_api(config, request, cancel).await,
        CollectMode::Scroll => collect_via_browser(config, request, cancel).await,
    }
}

/// Collect by paging through the REST API.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub async fn collect_via_api(
    config: &Config,
    request: &CollectionRequest,
    cancel: &CancellationToken,
) -> Result<Collection, CollectError> {
    let mut source = ApiSource::new(config.api_settings(), request)?;
    let collector = Collector::new(config.collector_settings());
    Ok(collector.run(&mut source, request, cancel).await)
}

/// Collect by scrolling the rendered feed in a headless browser.
///
/// The browser is launched before collection begins and closed on every
/// path out of the run, including cancellation.
///
/// # Errors
///
/// Returns [`CollectError::ResourceLaunch`] if the browser or its tab
/// cannot be created.
pub async fn collect_via_browser(
    config: &Config,
    request: &CollectionRequest,
    cancel: &CancellationToken,
) -> Result<Collection, CollectError> {
    if request.start_date.is_some() || request.end_date.is_some() {
        warn!("Date bounds are ignored when scrolling the rendered feed");
    }

    let session = BrowserSession::launch(&config.browser_settings())
        .await
        .map_err(|e| CollectError::ResourceLaunch(format!("{e:#}")))?;

    let view = match session.open_view().await {
        Ok(view) => view,
        Err(e) => {
            session.close().await;
            return Err(CollectError::ResourceLaunch(format!("{e:#}")));
        }
    };

    let mut source = ScrollSource::new(view, request.target.clone(), config.scroll_settings());
    let collector = Collector::new(config.collector_settings());
    let collection = collector.run(&mut source, request, cancel).await;

    drop(source);
    session.close().await;
    Ok(collection)
}
