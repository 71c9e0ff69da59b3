//! Integration tests for scroll-mode collection against a scripted view.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use async_trait::async_trait;
use feed_collector::sources::{RenderedView, ScrollSettings, ScrollSource};
use feed_collector::{CollectionRequest, Collector, CollectorSettings, StopReason, Target};
use tokio_util::sync::CancellationToken;

/// A view that replays a fixed sequence of rendered snapshots. Each scroll
/// advances to the next snapshot until the last one, which then repeats.
struct ScriptedView {
    snapshots: Vec<(String, u64)>,
    current: Mutex<usize>,
    ready: bool,
    fail_reads: bool,
    /// When set, navigation hangs this long and then fails.
    navigate_stall: Option<Duration>,
    navigated: Mutex<Vec<String>>,
}

impl ScriptedView {
    fn new(snapshots: Vec<(String, u64)>) -> Self {
        Self {
            snapshots,
            current: Mutex::new(0),
            ready: true,
            fail_reads: false,
            navigate_stall: None,
            navigated: Mutex::new(Vec::new()),
        }
    }

    fn snapshot(&self) -> &(String, u64) {
        let index = *self.current.lock().unwrap();
        &self.snapshots[index]
    }
}

#[async_trait]
impl RenderedView for ScriptedView {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.navigated.lock().unwrap().push(url.to_string());
        if let Some(stall) = self.navigate_stall {
            tokio::time::sleep(stall).await;
            bail!("Request timed out");
        }
        Ok(())
    }

    async fn has_element(&self, _selector: &str) -> Result<bool> {
        Ok(self.ready)
    }

    async fn html(&self) -> Result<String> {
        if self.fail_reads {
            bail!("target closed");
        }
        Ok(self.snapshot().0.clone())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        let mut current = self.current.lock().unwrap();
        if *current + 1 < self.snapshots.len() {
            *current += 1;
        }
        Ok(())
    }

    async fn scroll_extent(&self) -> Result<u64> {
        Ok(self.snapshot().1)
    }
}

fn article(id: u32, text: &str) -> String {
    format!(
        r#"<article data-testid="tweet">
  <time datetime="2024-05-0{day}T10:00:00.000Z">May</time>
  <a href="/rustlang/status/{id}">link</a>
  <div data-testid="tweetText">{text}</div>
  <div data-testid="like"><span>{id}K</span></div>
</article>"#,
        day = id % 9 + 1,
    )
}

fn page(articles: &[String]) -> String {
    format!("<html><body>{}</body></html>", articles.join("\n"))
}

/// Three snapshots with overlapping windows of posts 1..=4.
fn overlapping_feed() -> Vec<(String, u64)> {
    vec![
        (page(&[article(1, "one"), article(2, "two")]), 1000),
        (
            page(&[article(1, "one"), article(2, "two"), article(3, "three")]),
            2000,
        ),
        (
            page(&[article(2, "two"), article(3, "three"), article(4, "four")]),
            3000,
        ),
    ]
}

fn settings() -> ScrollSettings {
    ScrollSettings {
        site_base_url: "https://x.com".to_string(),
        scroll_pause: Duration::ZERO,
        load_timeout: Duration::from_millis(300),
    }
}

fn collector() -> Collector {
    Collector::new(CollectorSettings {
        site_base_url: "https://x.com".to_string(),
        max_stale_scrolls: 3,
    })
}

fn user() -> Target {
    Target::User("rustlang".to_string())
}

#[tokio::test]
async fn test_overlapping_snapshots_are_deduplicated() {
    let mut source = ScrollSource::new(ScriptedView::new(overlapping_feed()), user(), settings());
    let request = CollectionRequest::new(user(), 50);

    let result = collector()
        .run(&mut source, &request, &CancellationToken::new())
        .await;

    let ids: Vec<_> = result.posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3", "4"]);
    assert_eq!(result.reason, StopReason::SourceExhausted);
    // Two steps that grow the page, then three that leave it unchanged.
    assert_eq!(result.batches, 5);
    assert!(result.duplicates > 0);

    let first = &result.posts[0];
    assert_eq!(first.url, "https://x.com/rustlang/status/1");
    assert_eq!(first.metrics.likes, 1000);
    assert_eq!(first.text, "one");

    let view = source.into_view();
    assert_eq!(
        view.navigated.lock().unwrap().as_slice(),
        ["https://x.com/rustlang"]
    );
}

#[tokio::test]
async fn test_stops_at_max_count() {
    let mut source = ScrollSource::new(ScriptedView::new(overlapping_feed()), user(), settings());
    let request = CollectionRequest::new(user(), 3);

    let result = collector()
        .run(&mut source, &request, &CancellationToken::new())
        .await;

    let ids: Vec<_> = result.posts.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(result.reason, StopReason::TargetReached);
    assert_eq!(result.batches, 2);
}

#[tokio::test]
async fn test_never_ready_is_page_load_timeout() {
    let view = ScriptedView {
        ready: false,
        ..ScriptedView::new(overlapping_feed())
    };
    let mut source = ScrollSource::new(view, user(), settings());
    let request = CollectionRequest::new(user(), 10);

    let result = collector()
        .run(&mut source, &request, &CancellationToken::new())
        .await;

    assert_eq!(result.reason, StopReason::PageLoadTimeout);
    assert!(result.posts.is_empty());
    assert_eq!(result.batches, 0);
}

#[tokio::test]
async fn test_hanging_navigation_is_page_load_timeout() {
    let view = ScriptedView {
        navigate_stall: Some(Duration::from_secs(5)),
        ..ScriptedView::new(overlapping_feed())
    };
    let mut source = ScrollSource::new(view, user(), settings());
    let request = CollectionRequest::new(user(), 10);

    let started = Instant::now();
    let result = collector()
        .run(&mut source, &request, &CancellationToken::new())
        .await;

    assert_eq!(result.reason, StopReason::PageLoadTimeout);
    assert!(result.posts.is_empty());
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "load timeout not applied to navigation: {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_search_feed_url_is_encoded() {
    let target = Target::Search("rust lang".to_string());
    let view = ScriptedView::new(overlapping_feed());
    let mut source = ScrollSource::new(view, target.clone(), settings());
    let request = CollectionRequest::new(target, 1);

    let result = collector()
        .run(&mut source, &request, &CancellationToken::new())
        .await;
    assert_eq!(result.posts.len(), 1);

    let view = source.into_view();
    assert_eq!(
        view.navigated.lock().unwrap().as_slice(),
        ["https://x.com/search?q=rust%20lang&src=typed_query&f=live"]
    );
}

#[tokio::test]
async fn test_posts_without_permalink_dedup_by_content() {
    let unlinked = |text: &str| {
        format!(
            r#"<article data-testid="tweet">
  <time datetime="2024-05-01T10:00:00.000Z">May 1</time>
  <div data-testid="tweetText">{text}</div>
</article>"#
        )
    };
    let snapshots = vec![
        (page(&[unlinked("hello   world")]), 100),
        (page(&[unlinked("hello world"), unlinked("second")]), 200),
    ];
    let mut source = ScrollSource::new(ScriptedView::new(snapshots), user(), settings());
    let request = CollectionRequest::new(user(), 10);

    let result = collector()
        .run(&mut source, &request, &CancellationToken::new())
        .await;

    assert_eq!(result.posts.len(), 2);
    assert_eq!(result.posts[0].id, "");
    assert_eq!(result.posts[0].url, "");
    assert_eq!(result.posts[1].text, "second");
    assert_eq!(result.reason, StopReason::SourceExhausted);
}

#[tokio::test]
async fn test_view_failure_keeps_nothing_and_reports() {
    let view = ScriptedView {
        fail_reads: true,
        ..ScriptedView::new(overlapping_feed())
    };
    let mut source = ScrollSource::new(view, user(), settings());
    let request = CollectionRequest::new(user(), 10);

    let result = collector()
        .run(&mut source, &request, &CancellationToken::new())
        .await;

    match result.reason {
        StopReason::Failed(msg) => assert!(msg.contains("target closed")),
        other => panic!("unexpected stop reason: {other}"),
    }
    assert!(result.posts.is_empty());
}
