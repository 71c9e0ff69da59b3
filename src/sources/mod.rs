//! Acquisition strategies feeding the collector.
//!
//! Both strategies implement [`FeedSource`]: the API source pages through a
//! cursor, the scroll source drives a rendered view and reports how far the
//! page extends. Neither keeps run state of its own; the continuation it
//! reports is stored by the collector and handed back on the next call.

mod api;
mod scroll;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use api::{ApiSettings, ApiSource, PublicMetrics, Tweet};
pub use scroll::{extract_posts, RenderedView, ScrollSettings, ScrollSource, POST_SELECTOR};

/// Where the next batch starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position {
    /// Cursor pagination; `None` asks for the first page.
    Cursor(Option<String>),
    /// Scroll pagination; page extent observed after the previous step.
    Extent(u64),
}

/// Continuation reported alongside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Cursor for the next page, `None` when the source has nothing more.
    Cursor(Option<String>),
    /// Page extent after scrolling, and whether it differs from the last one.
    Extent { extent: u64, changed: bool },
}

/// One unit of raw output from a source.
#[derive(Debug, Clone)]
pub struct Batch {
    pub records: Vec<RawPost>,
    pub advance: Advance,
}

/// A candidate post before normalization.
#[derive(Debug, Clone)]
pub enum RawPost {
    /// Typed record from the API, with the author's handle when known.
    Api { tweet: Tweet, author: Option<String> },
    /// Fields lifted from one rendered post element.
    Scraped(ScrapedPost),
}

/// Text pulled from a rendered post element. `None` marks a lookup that
/// found nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapedPost {
    pub text: Option<String>,
    /// Raw `datetime` attribute of the timestamp element.
    pub timestamp: Option<String>,
    /// `href` of the first permalink, possibly relative.
    pub permalink: Option<String>,
    pub likes: Option<String>,
    pub retweets: Option<String>,
    pub replies: Option<String>,
}

/// Batch-level failures. Any of these ends the run; what was already
/// collected is kept.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("target not found: {0}")]
    NotFound(String),
    #[error("credentials rejected by source")]
    Unauthorized,
    #[error("rate limited by source")]
    RateLimited,
    #[error("page not ready after {0:?}")]
    PageLoadTimeout(Duration),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("browser error: {0}")]
    Browser(String),
}

/// A strategy that yields successive batches of candidate posts.
#[async_trait]
pub trait FeedSource: Send {
    /// Short label for logs.
    fn name(&self) -> &'static str;

    /// Fixed delay the collector waits between consecutive batches.
    fn pacing(&self) -> Duration {
        Duration::ZERO
    }

    /// Prepare the source and return where collection starts.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be resolved or the view never
    /// becomes ready.
    async fn open(&mut self) -> Result<Position, SourceError>;

    /// Fetch the batch that starts at `position`.
    ///
    /// # Errors
    ///
    /// Returns an error on any batch-level failure.
    async fn fetch_batch(&mut self, position: &Position) -> Result<Batch, SourceError>;
}
