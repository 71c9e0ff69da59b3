//! Shared constants used across the application.

/// User agent string used for API requests and the browser session.
///
/// Matches a current desktop Chrome so the rendered feed is served the same
/// markup a regular visitor would get.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Root of the rendered site, also used for permalinks.
pub const DEFAULT_SITE_BASE_URL: &str = "https://x.com";

/// Root of the REST API.
pub const DEFAULT_API_BASE_URL: &str = "https://api.twitter.com";
