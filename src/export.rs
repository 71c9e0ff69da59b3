//! Writing collected posts to disk.
//!
//! Four files are produced per run: plain text, a detailed text listing,
//! JSON and CSV.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::info;

use crate::model::Post;

/// Column order of the CSV export.
const CSV_COLUMNS: [&str; 8] = [
    "id",
    "text",
    "created_at",
    "retweet_count",
    "like_count",
    "reply_count",
    "quote_count",
    "url",
];

/// One CSV record, fields in [`CSV_COLUMNS`] order.
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    id: &'a str,
    text: &'a str,
    created_at: String,
    retweet_count: u64,
    like_count: u64,
    reply_count: u64,
    quote_count: u64,
    url: &'a str,
}

impl<'a> From<&'a Post> for CsvRow<'a> {
    fn from(post: &'a Post) -> Self {
        Self {
            id: &post.id,
            text: &post.text,
            created_at: post.created_at.to_rfc3339(),
            retweet_count: post.metrics.retweets,
            like_count: post.metrics.likes,
            reply_count: post.metrics.replies,
            quote_count: post.metrics.quotes,
            url: &post.url,
        }
    }
}

/// Render posts as numbered plain text.
#[must_use]
pub fn render_simple(posts: &[Post], generated_at: DateTime<Local>) -> String {
    let mut out = header(posts.len(), generated_at);
    for (i, post) in posts.iter().enumerate() {
        out.push_str(&format!("Post {}:\n", i + 1));
        out.push_str(&post.text);
        out.push('\n');
        out.push_str(&format!("{}\n\n", "-".repeat(50)));
    }
    out
}

/// Render posts with their id, date, link and engagement counts.
#[must_use]
pub fn render_detailed(posts: &[Post], generated_at: DateTime<Local>) -> String {
    let mut out = header(posts.len(), generated_at);
    for (i, post) in posts.iter().enumerate() {
        out.push_str(&format!("=== Post {} ===\n", i + 1));
        out.push_str(&format!("ID: {}\n", post.id));
        out.push_str(&format!("Date: {}\n", post.created_at.to_rfc3339()));
        out.push_str(&format!("URL: {}\n", post.url));
        out.push_str(&format!(
            "Likes: {} | Retweets: {} | Replies: {}\n",
            post.metrics.likes, post.metrics.retweets, post.metrics.replies
        ));
        out.push_str(&format!("\nText:\n{}\n", post.text));
        out.push_str(&format!("{}\n\n", "=".repeat(80)));
    }
    out
}

fn header(count: usize, generated_at: DateTime<Local>) -> String {
    format!(
        "# X (Twitter) posts\n# Generated: {}\n# Total posts: {count}\n\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Render posts as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_json(posts: &[Post]) -> Result<String> {
    serde_json::to_string_pretty(posts).context("Failed to serialize posts")
}

/// Render posts as CSV with a header row.
///
/// # Errors
///
/// Returns an error if a record cannot be written.
pub fn render_csv(posts: &[Post]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer
        .write_record(CSV_COLUMNS)
        .context("Failed to write CSV header")?;
    for post in posts {
        writer
            .serialize(CsvRow::from(post))
            .with_context(|| format!("Failed to write CSV row for post {}", post.id))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV output: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

/// Write every export format into `dir`, creating it if needed.
///
/// Returns the written paths. Nothing is written for an empty collection.
///
/// # Errors
///
/// Returns an error if the directory or any file cannot be written.
pub async fn write_all(posts: &[Post], dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    if posts.is_empty() {
        return Ok(Vec::new());
    }

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let now = Local::now();
    let stem = format!("{prefix}_{}", now.format("%Y%m%d_%H%M%S"));

    let outputs = [
        (format!("{stem}_simple.txt"), render_simple(posts, now)),
        (format!("{stem}_detailed.txt"), render_detailed(posts, now)),
        (format!("{stem}.json"), render_json(posts)?),
        (format!("{stem}.csv"), render_csv(posts)?),
    ];

    let mut written = Vec::with_capacity(outputs.len());
    for (name, contents) in outputs {
        let path = dir.join(name);
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }

    info!(count = posts.len(), dir = %dir.display(), "Posts exported");
    Ok(written)
}
