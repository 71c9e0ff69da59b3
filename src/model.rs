//! Canonical records shared by both collection strategies.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Engagement counters attached to a post.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub likes: u64,
    pub retweets: u64,
    pub replies: u64,
    pub quotes: u64,
}

/// A normalized post, identical in shape regardless of how it was collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Stable identifier; empty when a scraped element carried no permalink.
    pub id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Permalink, empty when it cannot be built.
    pub url: String,
    pub metrics: Metrics,
}

/// What the collection is aimed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A user's timeline, by handle without the leading `@`.
    User(String),
    /// Free-text search.
    Search(String),
}

impl Target {
    /// The handle when the target is a user timeline.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::User(name) => Some(name),
            Self::Search(_) => None,
        }
    }

    /// Prefix used for exported file names.
    ///
    /// Search queries keep only alphanumerics, spaces, `-` and `_`, with
    /// spaces turned into underscores.
    #[must_use]
    pub fn file_prefix(&self) -> String {
        match self {
            Self::User(name) => format!("tweets_{name}"),
            Self::Search(query) => {
                let safe: String = query
                    .chars()
                    .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
                    .collect();
                format!("search_{}", safe.trim_end().replace(' ', "_"))
            }
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(name) => write!(f, "@{name}"),
            Self::Search(query) => write!(f, "search \"{query}\""),
        }
    }
}

/// Parameters for a single collection run.
#[derive(Debug, Clone)]
pub struct CollectionRequest {
    pub target: Target,
    /// Only honored by the API strategy.
    pub start_date: Option<NaiveDate>,
    /// Only honored by the API strategy.
    pub end_date: Option<NaiveDate>,
    /// Upper bound on returned posts. Always positive.
    pub max_count: usize,
}

impl CollectionRequest {
    #[must_use]
    pub fn new(target: Target, max_count: usize) -> Self {
        Self {
            target,
            start_date: None,
            end_date: None,
            max_count,
        }
    }

    #[must_use]
    pub fn with_dates(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }
}
