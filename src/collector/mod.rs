//! The collection loop.
//!
//! [`Collector::run`] drives a [`FeedSource`] batch by batch, normalizes and
//! deduplicates what it yields, and stops on the first of: the requested
//! count is reached, the source runs dry, a batch-level failure, or
//! cancellation. Whatever was accepted before the stop is always returned.

pub mod counts;
pub mod dedup;
pub mod normalize;

use std::fmt;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use counts::parse_count;
pub use dedup::{Deduplicator, IdentityKey};
pub use normalize::{extract_post_id, RecordNormalizer};

use crate::model::{CollectionRequest, Post};
use crate::sources::{Advance, FeedSource, Position, SourceError};

/// Default number of consecutive scroll steps without extent change
/// before the feed is considered exhausted.
pub const DEFAULT_MAX_STALE_SCROLLS: u32 = 50;

/// Why a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    SourceExhausted,
    NotFound,
    Unauthorized,
    /// The run is abandoned rather than waiting out the limit.
    RateLimited,
    PageLoadTimeout,
    /// Any other batch-level failure, with its description.
    Failed(String),
    Cancelled,
}

impl StopReason {
    /// Whether the run ended because something went wrong.
    #[must_use]
    pub fn is_error(&self) -> bool {
        !matches!(
            self,
            Self::TargetReached | Self::SourceExhausted | Self::Cancelled
        )
    }
}

impl From<SourceError> for StopReason {
    fn from(e: SourceError) -> Self {
        match e {
            SourceError::NotFound(_) => Self::NotFound,
            SourceError::Unauthorized => Self::Unauthorized,
            SourceError::RateLimited => Self::RateLimited,
            SourceError::PageLoadTimeout(_) => Self::PageLoadTimeout,
            other => Self::Failed(other.to_string()),
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetReached => f.write_str("target reached"),
            Self::SourceExhausted => f.write_str("source exhausted"),
            Self::NotFound => f.write_str("not found"),
            Self::Unauthorized => f.write_str("unauthorized"),
            Self::RateLimited => f.write_str("rate limited"),
            Self::PageLoadTimeout => f.write_str("page load timeout"),
            Self::Failed(msg) => write!(f, "failed: {msg}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct Collection {
    /// Accepted posts in first-seen order.
    pub posts: Vec<Post>,
    pub reason: StopReason,
    pub batches: usize,
    pub duplicates: usize,
    /// Records dropped because no text could be extracted.
    pub skipped: usize,
}

/// Mutable state of one run. Created when the run starts and consumed
/// into a [`Collection`] when it ends.
#[derive(Debug)]
pub struct CollectionState {
    posts: Vec<Post>,
    dedup: Deduplicator,
    position: Position,
    stale_steps: u32,
    reason: Option<StopReason>,
    batches: usize,
    duplicates: usize,
    skipped: usize,
}

impl CollectionState {
    fn new(position: Position) -> Self {
        Self {
            posts: Vec::new(),
            dedup: Deduplicator::new(),
            position,
            stale_steps: 0,
            reason: None,
            batches: 0,
            duplicates: 0,
            skipped: 0,
        }
    }

    fn stop(&mut self, reason: StopReason) {
        if self.reason.is_none() {
            self.reason = Some(reason);
        }
    }

    /// Accept a post unless its identity was already seen.
    fn offer(&mut self, post: Post) -> bool {
        if self.dedup.accept(&post) {
            self.posts.push(post);
            true
        } else {
            self.duplicates += 1;
            false
        }
    }

    fn finish(mut self, max_count: usize) -> Collection {
        self.posts.truncate(max_count);
        Collection {
            posts: self.posts,
            reason: self.reason.unwrap_or(StopReason::SourceExhausted),
            batches: self.batches,
            duplicates: self.duplicates,
            skipped: self.skipped,
        }
    }
}

/// Settings for the collection loop.
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    /// Root used to resolve and synthesize permalinks.
    pub site_base_url: String,
    pub max_stale_scrolls: u32,
}

impl Default for CollectorSettings {
    fn default() -> Self {
        Self {
            site_base_url: crate::constants::DEFAULT_SITE_BASE_URL.to_string(),
            max_stale_scrolls: DEFAULT_MAX_STALE_SCROLLS,
        }
    }
}

/// Drives a source until the run is complete.
#[derive(Debug, Clone, Default)]
pub struct Collector {
    settings: CollectorSettings,
}

impl Collector {
    #[must_use]
    pub fn new(settings: CollectorSettings) -> Self {
        Self { settings }
    }

    /// Run one collection against `source`.
    ///
    /// Never fails: batch-level problems end the run and are reported
    /// through [`Collection::reason`] alongside everything collected so far.
    pub async fn run<S>(
        &self,
        source: &mut S,
        request: &CollectionRequest,
        cancel: &CancellationToken,
    ) -> Collection
    where
        S: FeedSource + ?Sized,
    {
        let started: DateTime<Utc> = Utc::now();
        let normalizer = RecordNormalizer::new(
            &self.settings.site_base_url,
            request.target.username(),
            started,
        );
        let max_count = request.max_count;

        info!(
            source = source.name(),
            target = %request.target,
            max_count,
            "Starting collection"
        );

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(None),
            result = source.open() => result.map_err(Some),
        };
        let mut state = match opened {
            Ok(position) => CollectionState::new(position),
            Err(err) => {
                let mut state = CollectionState::new(Position::Cursor(None));
                match err {
                    Some(e) => {
                        warn!(source = source.name(), error = %e, "Source failed to open");
                        state.stop(e.into());
                    }
                    None => state.stop(StopReason::Cancelled),
                }
                return Self::report(state.finish(max_count));
            }
        };

        let pacing = source.pacing();

        while state.reason.is_none() {
            if state.posts.len() >= max_count {
                state.stop(StopReason::TargetReached);
                break;
            }

            if state.batches > 0 && !pacing.is_zero() {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        state.stop(StopReason::Cancelled);
                        break;
                    }
                    () = tokio::time::sleep(pacing) => {}
                }
            }

            let fetched = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    state.stop(StopReason::Cancelled);
                    break;
                }
                result = source.fetch_batch(&state.position) => result,
            };

            let batch = match fetched {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(
                        source = source.name(),
                        error = %e,
                        collected = state.posts.len(),
                        "Batch failed, stopping with partial results"
                    );
                    state.stop(e.into());
                    break;
                }
            };
            state.batches += 1;

            let offered = batch.records.len();
            let mut accepted = 0usize;
            for raw in batch.records {
                let Some(post) = normalizer.normalize(raw) else {
                    state.skipped += 1;
                    continue;
                };
                if state.offer(post) {
                    accepted += 1;
                    if state.posts.len() >= max_count {
                        break;
                    }
                }
            }

            debug!(
                batch = state.batches,
                offered,
                accepted,
                total = state.posts.len(),
                seen = state.dedup.len(),
                "Processed batch"
            );

            if state.posts.len() >= max_count {
                state.stop(StopReason::TargetReached);
                break;
            }

            match batch.advance {
                Advance::Cursor(Some(cursor)) => {
                    state.position = Position::Cursor(Some(cursor));
                }
                Advance::Cursor(None) => state.stop(StopReason::SourceExhausted),
                Advance::Extent { extent, changed } => {
                    state.position = Position::Extent(extent);
                    if changed {
                        state.stale_steps = 0;
                    } else {
                        state.stale_steps += 1;
                        debug!(
                            stale_steps = state.stale_steps,
                            limit = self.settings.max_stale_scrolls,
                            "Page extent unchanged"
                        );
                        if state.stale_steps >= self.settings.max_stale_scrolls {
                            state.stop(StopReason::SourceExhausted);
                        }
                    }
                }
            }
        }

        Self::report(state.finish(max_count))
    }

    fn report(collection: Collection) -> Collection {
        if collection.reason.is_error() {
            warn!(
                reason = %collection.reason,
                collected = collection.posts.len(),
                "Collection stopped early"
            );
        } else {
            info!(
                reason = %collection.reason,
                collected = collection.posts.len(),
                batches = collection.batches,
                duplicates = collection.duplicates,
                skipped = collection.skipped,
                "Collection finished"
            );
        }
        collection
    }
}
