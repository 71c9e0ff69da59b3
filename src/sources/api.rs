//! Cursor-paginated collection against the v2 REST API.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Advance, Batch, FeedSource, Position, RawPost, SourceError};
use crate::constants::BROWSER_USER_AGENT;
use crate::model::{CollectionRequest, Target};

/// Largest page the timeline and search endpoints will return.
pub const MAX_PAGE_SIZE: usize = 100;

const MIN_TIMELINE_PAGE_SIZE: usize = 5;
const MIN_SEARCH_PAGE_SIZE: usize = 10;

const TWEET_FIELDS: &str =
    "created_at,public_metrics,text,author_id,conversation_id,in_reply_to_user_id,referenced_tweets";

/// Connection settings for the API source.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: String,
    pub bearer_token: String,
    /// Pause between consecutive page requests.
    pub page_delay: Duration,
    pub request_timeout: Duration,
}

/// Engagement counters as the API reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub quote_count: u64,
}

/// A post record from the timeline or search endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tweet {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub public_metrics: Option<PublicMetrics>,
    #[serde(default)]
    pub author_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserLookupResponse {
    data: Option<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    includes: Option<Includes>,
    #[serde(default)]
    meta: Option<PageMeta>,
}

#[derive(Debug, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    #[serde(default)]
    next_token: Option<String>,
}

/// Pages through a user's timeline or a recent search.
pub struct ApiSource {
    client: Client,
    settings: ApiSettings,
    target: Target,
    start_time: Option<String>,
    end_time: Option<String>,
    page_size: usize,
    /// Internal account id, filled in by [`FeedSource::open`] for user targets.
    account_id: Option<String>,
}

impl ApiSource {
    /// Build a source for the given request.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(settings: ApiSettings, request: &CollectionRequest) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(settings.request_timeout)
            .build()?;

        let minimum = match request.target {
            Target::User(_) => MIN_TIMELINE_PAGE_SIZE,
            Target::Search(_) => MIN_SEARCH_PAGE_SIZE,
        };

        Ok(Self {
            client,
            settings,
            target: request.target.clone(),
            start_time: request.start_date.map(start_of_day),
            end_time: request.end_date.map(end_of_day),
            page_size: request.max_count.clamp(minimum, MAX_PAGE_SIZE),
            account_id: None,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.base_url.trim_end_matches('/'))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.settings.bearer_token)
            .query(query)
            .send()
            .await?;

        let response = check_status(response, &self.target)?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| SourceError::Decode(e.to_string()))
    }

    async fn resolve_account(&self, username: &str) -> Result<String, SourceError> {
        let url = self.url(&format!(
            "/2/users/by/username/{}",
            urlencoding::encode(username)
        ));
        let lookup: UserLookupResponse = self.get(&url, &[]).await?;

        let user = lookup
            .data
            .ok_or_else(|| SourceError::NotFound(self.target.to_string()))?;
        info!(username = %user.username, account_id = %user.id, "Resolved account");
        Ok(user.id)
    }

    fn page_query(&self, cursor: Option<&str>) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("max_results", self.page_size.to_string()),
            ("tweet.fields", TWEET_FIELDS.to_string()),
        ];
        if let Some(ref start) = self.start_time {
            query.push(("start_time", start.clone()));
        }
        if let Some(ref end) = self.end_time {
            query.push(("end_time", end.clone()));
        }

        match self.target {
            Target::User(_) => {
                if let Some(cursor) = cursor {
                    query.push(("pagination_token", cursor.to_string()));
                }
            }
            Target::Search(ref q) => {
                query.push(("query", q.clone()));
                query.push(("expansions", "author_id".to_string()));
                query.push(("user.fields", "username".to_string()));
                if let Some(cursor) = cursor {
                    query.push(("next_token", cursor.to_string()));
                }
            }
        }
        query
    }
}

#[async_trait]
impl FeedSource for ApiSource {
    fn name(&self) -> &'static str {
        "api"
    }

    fn pacing(&self) -> Duration {
        self.settings.page_delay
    }

    async fn open(&mut self) -> Result<Position, SourceError> {
        if let Target::User(ref username) = self.target {
            let id = self.resolve_account(username).await?;
            self.account_id = Some(id);
        }
        Ok(Position::Cursor(None))
    }

    async fn fetch_batch(&mut self, position: &Position) -> Result<Batch, SourceError> {
        let cursor = match position {
            Position::Cursor(cursor) => cursor.as_deref(),
            Position::Extent(_) => None,
        };

        let url = match (&self.target, &self.account_id) {
            (Target::User(_), Some(id)) => self.url(&format!("/2/users/{id}/tweets")),
            (Target::User(_), None) => {
                return Err(SourceError::NotFound(self.target.to_string()));
            }
            (Target::Search(_), _) => self.url("/2/tweets/search/recent"),
        };

        debug!(url = %url, cursor = ?cursor, page_size = self.page_size, "Fetching page");
        let page: PageResponse = self.get(&url, &self.page_query(cursor)).await?;

        let authors: HashMap<String, String> = page
            .includes
            .map(|inc| inc.users.into_iter().map(|u| (u.id, u.username)).collect())
            .unwrap_or_default();

        let records = page
            .data
            .into_iter()
            .map(|tweet| {
                let author = match self.target {
                    Target::User(ref name) => Some(name.clone()),
                    Target::Search(_) => tweet
                        .author_id
                        .as_ref()
                        .and_then(|id| authors.get(id))
                        .cloned(),
                };
                RawPost::Api { tweet, author }
            })
            .collect();

        let next = page.meta.and_then(|m| m.next_token);
        Ok(Batch {
            records,
            advance: Advance::Cursor(next),
        })
    }
}

/// Map the response status onto the source error taxonomy.
fn check_status(response: Response, target: &Target) -> Result<Response, SourceError> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SourceError::Unauthorized),
        StatusCode::NOT_FOUND => Err(SourceError::NotFound(target.to_string())),
        StatusCode::TOO_MANY_REQUESTS => Err(SourceError::RateLimited),
        status => Err(SourceError::Status(status.as_u16())),
    }
}

fn start_of_day(date: NaiveDate) -> String {
    format!("{}T00:00:00Z", date.format("%Y-%m-%d"))
}

fn end_of_day(date: NaiveDate) -> String {
    format!("{}T23:59:59Z", date.format("%Y-%m-%d"))
}
