//! Mapping of raw source output onto the canonical [`Post`] schema.

use chrono::{DateTime, Utc};
use regex::Regex;
use url::Url;

use super::counts::parse_count;
use crate::model::{Metrics, Post};
use crate::sources::{RawPost, ScrapedPost, Tweet};

/// Pattern to extract the post id from a permalink.
static POST_ID_PATTERN: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"/status/(\d+)").unwrap());

/// Extract the post id from a permalink.
///
/// Permalinks have the form `https://x.com/{user}/status/{id}`.
#[must_use]
pub fn extract_post_id(url: &str) -> Option<String> {
    POST_ID_PATTERN
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Converts raw records into posts for one run.
#[derive(Debug, Clone)]
pub struct RecordNormalizer {
    site_base_url: String,
    username: Option<String>,
    /// Stand-in timestamp for records the source did not date.
    collected_at: DateTime<Utc>,
}

impl RecordNormalizer {
    #[must_use]
    pub fn new(site_base_url: &str, username: Option<&str>, collected_at: DateTime<Utc>) -> Self {
        Self {
            site_base_url: site_base_url.trim_end_matches('/').to_string(),
            username: username.map(str::to_string),
            collected_at,
        }
    }

    /// Normalize a raw record. Returns `None` when no text could be extracted.
    #[must_use]
    pub fn normalize(&self, raw: RawPost) -> Option<Post> {
        match raw {
            RawPost::Api { tweet, author } => self.from_api(tweet, author.as_deref()),
            RawPost::Scraped(scraped) => self.from_scraped(scraped),
        }
    }

    fn from_api(&self, tweet: Tweet, author: Option<&str>) -> Option<Post> {
        let text = tweet.text.filter(|t| !t.trim().is_empty())?;
        let metrics = tweet
            .public_metrics
            .map(|m| Metrics {
                likes: m.like_count,
                retweets: m.retweet_count,
                replies: m.reply_count,
                quotes: m.quote_count,
            })
            .unwrap_or_default();
        let author = author.or(self.username.as_deref());

        Some(Post {
            url: self.permalink(author, &tweet.id),
            id: tweet.id,
            text,
            created_at: tweet.created_at.unwrap_or(self.collected_at),
            metrics,
        })
    }

    fn from_scraped(&self, scraped: ScrapedPost) -> Option<Post> {
        let text = scraped.text.filter(|t| !t.trim().is_empty())?;

        let url = scraped
            .permalink
            .as_deref()
            .and_then(|href| self.resolve(href))
            .unwrap_or_default();
        let id = extract_post_id(&url).unwrap_or_default();
        let url = if url.is_empty() {
            self.permalink(self.username.as_deref(), &id)
        } else {
            url
        };

        let created_at = scraped
            .timestamp
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts.trim()).ok())
            .map_or(self.collected_at, |ts| ts.with_timezone(&Utc));

        let count = |field: Option<&String>| field.map_or(0, |t| parse_count(t));

        Some(Post {
            id,
            text,
            created_at,
            url,
            metrics: Metrics {
                likes: count(scraped.likes.as_ref()),
                retweets: count(scraped.retweets.as_ref()),
                replies: count(scraped.replies.as_ref()),
                quotes: 0,
            },
        })
    }

    /// Resolve a possibly relative `href` against the site root.
    fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() {
            return None;
        }
        let base = Url::parse(&format!("{}/", self.site_base_url)).ok()?;
        base.join(href).ok().map(String::from)
    }

    /// Build a permalink when both the author and id are known.
    fn permalink(&self, author: Option<&str>, id: &str) -> String {
        match author {
            Some(author) if !author.is_empty() && !id.is_empty() => {
                format!("{}/{author}/status/{id}", self.site_base_url)
            }
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::sources::PublicMetrics;

    fn clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap()
    }

    fn normalizer(username: Option<&str>) -> RecordNormalizer {
        RecordNormalizer::new("https://x.com/", username, clock())
    }

    fn tweet(id: &str, text: Option<&str>) -> Tweet {
        Tweet {
            id: id.to_string(),
            text: text.map(str::to_string),
            created_at: None,
            public_metrics: None,
            author_id: None,
        }
    }

    #[test]
    fn test_extract_post_id() {
        assert_eq!(
            extract_post_id("https://x.com/user/status/1234567890?s=20"),
            Some("1234567890".to_string())
        );
        assert_eq!(extract_post_id("https://x.com/user"), None);
    }

    #[test]
    fn test_api_metrics_pass_through() {
        let mut t = tweet("42", Some("hello"));
        t.public_metrics = Some(PublicMetrics {
            like_count: 5,
            retweet_count: 6,
            reply_count: 7,
            quote_count: 8,
        });
        let created = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        t.created_at = Some(created);

        let post = normalizer(Some("rustlang"))
            .normalize(RawPost::Api {
                tweet: t,
                author: Some("rustlang".to_string()),
            })
            .unwrap();

        assert_eq!(post.id, "42");
        assert_eq!(post.url, "https://x.com/rustlang/status/42");
        assert_eq!(post.created_at, created);
        assert_eq!(
            post.metrics,
            Metrics {
                likes: 5,
                retweets: 6,
                replies: 7,
                quotes: 8
            }
        );
    }

    #[test]
    fn test_api_missing_metrics_and_date_default() {
        let post = normalizer(None)
            .normalize(RawPost::Api {
                tweet: tweet("1", Some("x")),
                author: None,
            })
            .unwrap();
        assert_eq!(post.metrics, Metrics::default());
        assert_eq!(post.created_at, clock());
        assert_eq!(post.url, "");
    }

    #[test]
    fn test_api_without_text_is_dropped() {
        let n = normalizer(None);
        assert!(n
            .normalize(RawPost::Api {
                tweet: tweet("1", None),
                author: None
            })
            .is_none());
        assert!(n
            .normalize(RawPost::Api {
                tweet: tweet("1", Some("  ")),
                author: None
            })
            .is_none());
    }

    #[test]
    fn test_scraped_relative_permalink() {
        let scraped = ScrapedPost {
            text: Some("hi".to_string()),
            timestamp: Some("2024-05-01T10:00:00.000Z".to_string()),
            permalink: Some("/rustlang/status/99".to_string()),
            likes: Some("1.2K".to_string()),
            retweets: Some("1,234".to_string()),
            replies: Some("oops".to_string()),
        };
        let post = normalizer(None).normalize(RawPost::Scraped(scraped)).unwrap();

        assert_eq!(post.id, "99");
        assert_eq!(post.url, "https://x.com/rustlang/status/99");
        assert_eq!(
            post.created_at,
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
        );
        assert_eq!(post.metrics.likes, 1200);
        assert_eq!(post.metrics.retweets, 1234);
        assert_eq!(post.metrics.replies, 0);
        assert_eq!(post.metrics.quotes, 0);
    }

    #[test]
    fn test_scraped_absolute_permalink_kept() {
        let scraped = ScrapedPost {
            text: Some("hi".to_string()),
            permalink: Some("https://twitter.com/a/status/7".to_string()),
            ..ScrapedPost::default()
        };
        let post = normalizer(Some("b")).normalize(RawPost::Scraped(scraped)).unwrap();
        assert_eq!(post.id, "7");
        assert_eq!(post.url, "https://twitter.com/a/status/7");
    }

    #[test]
    fn test_scraped_without_permalink() {
        let scraped = ScrapedPost {
            text: Some("hi".to_string()),
            timestamp: Some("not a date".to_string()),
            ..ScrapedPost::default()
        };
        let post = normalizer(Some("b")).normalize(RawPost::Scraped(scraped)).unwrap();
        assert_eq!(post.id, "");
        assert_eq!(post.url, "");
        assert_eq!(post.created_at, clock());
    }

    #[test]
    fn test_scraped_without_text_is_dropped() {
        let scraped = ScrapedPost {
            permalink: Some("/a/status/1".to_string()),
            ..ScrapedPost::default()
        };
        assert!(normalizer(None).normalize(RawPost::Scraped(scraped)).is_none());
    }
}
