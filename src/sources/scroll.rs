//! Scroll-driven collection from a rendered feed.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use super::{Advance, Batch, FeedSource, Position, RawPost, ScrapedPost, SourceError};
use crate::model::Target;

/// Container of one rendered post.
pub const POST_SELECTOR: &str = r#"[data-testid="tweet"]"#;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

static POST: std::sync::LazyLock<Selector> =
    std::sync::LazyLock::new(|| Selector::parse(POST_SELECTOR).unwrap());
static TEXT: std::sync::LazyLock<Selector> =
    std::sync::LazyLock::new(|| Selector::parse(r#"[data-testid="tweetText"]"#).unwrap());
static TIME: std::sync::LazyLock<Selector> =
    std::sync::LazyLock::new(|| Selector::parse("time").unwrap());
static PERMALINK: std::sync::LazyLock<Selector> =
    std::sync::LazyLock::new(|| Selector::parse(r#"a[href*="/status/"]"#).unwrap());
static LIKES: std::sync::LazyLock<Selector> =
    std::sync::LazyLock::new(|| Selector::parse(r#"[data-testid="like"] span"#).unwrap());
static RETWEETS: std::sync::LazyLock<Selector> =
    std::sync::LazyLock::new(|| Selector::parse(r#"[data-testid="retweet"] span"#).unwrap());
static REPLIES: std::sync::LazyLock<Selector> =
    std::sync::LazyLock::new(|| Selector::parse(r#"[data-testid="reply"] span"#).unwrap());

/// A live document the scroll source can read and scroll.
#[async_trait]
pub trait RenderedView: Send + Sync {
    /// Load `url` in the view.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Whether at least one element currently matches `selector`.
    async fn has_element(&self, selector: &str) -> Result<bool>;

    /// Serialized DOM as currently rendered.
    async fn html(&self) -> Result<String>;

    /// Ask the page to render more content below the fold.
    async fn scroll_to_bottom(&self) -> Result<()>;

    /// Measurable size of the rendered feed.
    async fn scroll_extent(&self) -> Result<u64>;
}

/// Timing and addressing for the scroll source.
#[derive(Debug, Clone)]
pub struct ScrollSettings {
    pub site_base_url: String,
    /// Settle time after each scroll before the extent is measured.
    pub scroll_pause: Duration,
    /// Bound on waiting for the first post to render.
    pub load_timeout: Duration,
}

/// Collects posts by repeatedly reading and scrolling a [`RenderedView`].
pub struct ScrollSource<V> {
    view: V,
    target: Target,
    settings: ScrollSettings,
}

impl<V: RenderedView> ScrollSource<V> {
    #[must_use]
    pub fn new(view: V, target: Target, settings: ScrollSettings) -> Self {
        Self {
            view,
            target,
            settings,
        }
    }

    /// Address of the feed for this target.
    #[must_use]
    pub fn feed_url(&self) -> String {
        let base = self.settings.site_base_url.trim_end_matches('/');
        match self.target {
            Target::User(ref name) => format!("{base}/{name}"),
            Target::Search(ref query) => format!(
                "{base}/search?q={}&src=typed_query&f=live",
                urlencoding::encode(query)
            ),
        }
    }

    pub fn into_view(self) -> V {
        self.view
    }

    /// Navigate to `url` and wait for the first post to render, both within
    /// the configured load timeout.
    async fn load(&self, url: &str) -> Result<(), SourceError> {
        let loading = async {
            self.view.navigate(url).await?;
            loop {
                if self.view.has_element(POST_SELECTOR).await? {
                    return Ok::<_, anyhow::Error>(());
                }
                tokio::time::sleep(READY_POLL_INTERVAL).await;
            }
        };

        match tokio::time::timeout(self.settings.load_timeout, loading).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(browser_error(&e)),
            Err(_) => Err(SourceError::PageLoadTimeout(self.settings.load_timeout)),
        }
    }
}

#[async_trait]
impl<V: RenderedView> FeedSource for ScrollSource<V> {
    fn name(&self) -> &'static str {
        "scroll"
    }

    async fn open(&mut self) -> Result<Position, SourceError> {
        let url = self.feed_url();
        info!(url = %url, "Opening feed");

        self.load(&url).await?;

        let extent = self
            .view
            .scroll_extent()
            .await
            .map_err(|e| browser_error(&e))?;
        Ok(Position::Extent(extent))
    }

    async fn fetch_batch(&mut self, position: &Position) -> Result<Batch, SourceError> {
        let previous = match position {
            Position::Extent(extent) => *extent,
            Position::Cursor(_) => 0,
        };

        let html = self.view.html().await.map_err(|e| browser_error(&e))?;
        let records: Vec<RawPost> = extract_posts(&html)
            .into_iter()
            .map(RawPost::Scraped)
            .collect();

        self.view
            .scroll_to_bottom()
            .await
            .map_err(|e| browser_error(&e))?;
        tokio::time::sleep(self.settings.scroll_pause).await;

        let extent = self
            .view
            .scroll_extent()
            .await
            .map_err(|e| browser_error(&e))?;

        debug!(
            rendered = records.len(),
            previous,
            extent,
            "Scroll step complete"
        );

        Ok(Batch {
            records,
            advance: Advance::Extent {
                extent,
                changed: extent != previous,
            },
        })
    }
}

fn browser_error(e: &anyhow::Error) -> SourceError {
    SourceError::Browser(format!("{e:#}"))
}

/// Pull raw fields out of every rendered post container in `html`.
#[must_use]
pub fn extract_posts(html: &str) -> Vec<ScrapedPost> {
    let document = Html::parse_document(html);
    document.select(&POST).map(extract_post).collect()
}

fn extract_post(element: ElementRef<'_>) -> ScrapedPost {
    ScrapedPost {
        text: first_text(element, &TEXT),
        timestamp: element
            .select(&TIME)
            .find_map(|t| t.value().attr("datetime"))
            .map(str::to_string),
        permalink: element
            .select(&PERMALINK)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(str::to_string),
        likes: first_text(element, &LIKES),
        retweets: first_text(element, &RETWEETS),
        replies: first_text(element, &REPLIES),
    }
}

fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|e| e.text().collect::<String>())
}
