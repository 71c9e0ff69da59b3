//! Session-scoped duplicate suppression.
//!
//! Scrolling re-renders posts that were already on screen, and API pages may
//! overlap at their boundaries. Every accepted post is remembered by an
//! [`IdentityKey`] so it is only counted once per run.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::model::Post;

/// The value a post is recognized by.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    /// Stable identifier supplied by the source.
    Id(String),
    /// Fallback for scraped posts without a permalink.
    Content {
        text: String,
        created_at: DateTime<Utc>,
    },
}

impl IdentityKey {
    /// Derive the key for a post.
    #[must_use]
    pub fn of(post: &Post) -> Self {
        if post.id.is_empty() {
            Self::Content {
                text: normalize_text(&post.text),
                created_at: post.created_at,
            }
        } else {
            Self::Id(post.id.clone())
        }
    }
}

/// Collapse whitespace runs so re-rendered text compares equal.
fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Tracks identities accepted during the current run.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<IdentityKey>,
}

impl Deduplicator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the post's identity. Returns `false` if it was already seen.
    pub fn accept(&mut self, post: &Post) -> bool {
        self.seen.insert(IdentityKey::of(post))
    }

    #[cfg(test)]
    fn contains(&self, post: &Post) -> bool {
        self.seen.contains(&IdentityKey::of(post))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
