use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDate;
use thiserror::Error;

use crate::browser::BrowserSettings;
use crate::collector::{CollectorSettings, DEFAULT_MAX_STALE_SCROLLS};
use crate::constants::{DEFAULT_API_BASE_URL, DEFAULT_SITE_BASE_URL};
use crate::model::{CollectionRequest, Target};
use crate::sources::{ApiSettings, ScrollSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
    #[error("failed to parse {name} as YYYY-MM-DD date: {source}")]
    ParseDate {
        name: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Collection
    pub mode: CollectMode,
    pub target: Target,
    pub max_posts: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,

    // API
    pub bearer_token: Option<String>,
    pub api_base_url: String,
    pub api_page_delay: Duration,
    pub api_timeout: Duration,

    // Rendered feed
    pub site_base_url: String,
    pub scroll_pause: Duration,
    pub max_stale_scrolls: u32,
    pub page_load_timeout: Duration,
    pub chrome_path: Option<String>,
    pub headless: bool,

    // Output
    pub output_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectMode {
    /// Cursor pagination against the REST API
    Api,
    /// Scrolling a rendered feed in a headless browser
    Scroll,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = parse_collect_mode(&env_or_default("COLLECT_MODE", "scroll"))?;
        let default_max = match mode {
            CollectMode::Api => 100,
            CollectMode::Scroll => 50,
        };

        Ok(Self {
            // Collection
            mode,
            target: parse_target(optional_env("TARGET_USER"), optional_env("SEARCH_QUERY"))?,
            max_posts: parse_env_usize("MAX_POSTS", default_max)?,
            start_date: parse_env_date("START_DATE")?,
            end_date: parse_env_date("END_DATE")?,

            // API
            bearer_token: optional_env("BEARER_TOKEN"),
            api_base_url: env_or_default("API_BASE_URL", DEFAULT_API_BASE_URL),
            api_page_delay: Duration::from_millis(parse_env_u64("API_PAGE_DELAY_MS", 500)?),
            api_timeout: Duration::from_secs(parse_env_u64("API_TIMEOUT_SECS", 30)?),

            // Rendered feed
            site_base_url: env_or_default("SITE_BASE_URL", DEFAULT_SITE_BASE_URL),
            scroll_pause: Duration::from_millis(parse_env_u64("SCROLL_PAUSE_MS", 2000)?),
            max_stale_scrolls: parse_env_u32("MAX_STALE_SCROLLS", DEFAULT_MAX_STALE_SCROLLS)?,
            page_load_timeout: Duration::from_secs(parse_env_u64("PAGE_LOAD_TIMEOUT_SECS", 10)?),
            chrome_path: optional_env("CHROME_PATH"),
            headless: parse_env_bool("HEADLESS", true)?,

            // Output
            output_dir: PathBuf::from(env_or_default("OUTPUT_DIR", "./twitter_data")),
        })
    }

    /// Configuration with defaults suitable for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            mode: CollectMode::Api,
            target: Target::User("testuser".to_string()),
            max_posts: 10,
            start_date: None,
            end_date: None,
            bearer_token: Some("test-token".to_string()),
            api_base_url: "http://127.0.0.1:9".to_string(),
            api_page_delay: Duration::ZERO,
            api_timeout: Duration::from_secs(5),
            site_base_url: DEFAULT_SITE_BASE_URL.to_string(),
            scroll_pause: Duration::ZERO,
            max_stale_scrolls: 3,
            page_load_timeout: Duration::from_secs(1),
            chrome_path: None,
            headless: true,
            output_dir: PathBuf::from("./twitter_data"),
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_posts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_POSTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_stale_scrolls == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_STALE_SCROLLS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                return Err(ConfigError::InvalidValue {
                    name: "START_DATE".to_string(),
                    message: format!("{start} is after END_DATE {end}"),
                });
            }
        }
        if self.mode == CollectMode::Api && self.bearer_token.is_none() {
            return Err(ConfigError::MissingEnvVar("BEARER_TOKEN".to_string()));
        }
        Ok(())
    }

    /// The collection request described by this configuration.
    #[must_use]
    pub fn request(&self) -> CollectionRequest {
        CollectionRequest::new(self.target.clone(), self.max_posts)
            .with_dates(self.start_date, self.end_date)
    }

    #[must_use]
    pub fn collector_settings(&self) -> CollectorSettings {
        CollectorSettings {
            site_base_url: self.site_base_url.clone(),
            max_stale_scrolls: self.max_stale_scrolls,
        }
    }

    #[must_use]
    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.api_base_url.clone(),
            bearer_token: self.bearer_token.clone().unwrap_or_default(),
            page_delay: self.api_page_delay,
            request_timeout: self.api_timeout,
        }
    }

    #[must_use]
    pub fn scroll_settings(&self) -> ScrollSettings {
        ScrollSettings {
            site_base_url: self.site_base_url.clone(),
            scroll_pause: self.scroll_pause,
            load_timeout: self.page_load_timeout,
        }
    }

    #[must_use]
    pub fn browser_settings(&self) -> BrowserSettings {
        BrowserSettings {
            chrome_path: self.chrome_path.clone(),
            headless: self.headless,
            request_timeout: self.page_load_timeout,
            ..BrowserSettings::default()
        }
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}

fn parse_env_date(name: &str) -> Result<Option<NaiveDate>, ConfigError> {
    optional_env(name)
        .map(|val| parse_date(name, &val))
        .transpose()
}

fn parse_date(name: &str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| ConfigError::ParseDate {
        name: name.to_string(),
        source: e,
    })
}

fn parse_collect_mode(value: &str) -> Result<CollectMode, ConfigError> {
    match value.to_lowercase().as_str() {
        "api" => Ok(CollectMode::Api),
        "scroll" | "browser" => Ok(CollectMode::Scroll),
        _ => Err(ConfigError::InvalidValue {
            name: "COLLECT_MODE".to_string(),
            message: format!("must be 'api' or 'scroll', got '{value}'"),
        }),
    }
}

fn parse_target(user: Option<String>, query: Option<String>) -> Result<Target, ConfigError> {
    match (user, query) {
        (Some(user), None) => Ok(Target::User(user.trim_start_matches('@').to_string())),
        (None, Some(query)) => Ok(Target::Search(query)),
        (Some(_), Some(_)) => Err(ConfigError::InvalidValue {
            name: "TARGET_USER".to_string(),
            message: "set either TARGET_USER or SEARCH_QUERY, not both".to_string(),
        }),
        (None, None) => Err(ConfigError::MissingEnvVar(
            "TARGET_USER or SEARCH_QUERY".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collect_mode() {
        assert_eq!(parse_collect_mode("api").unwrap(), CollectMode::Api);
        assert_eq!(parse_collect_mode("API").unwrap(), CollectMode::Api);
        assert_eq!(parse_collect_mode("scroll").unwrap(), CollectMode::Scroll);
        assert_eq!(parse_collect_mode("browser").unwrap(), CollectMode::Scroll);
        assert!(parse_collect_mode("invalid").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_env_bool("NONEXISTENT_VAR", true).unwrap());
        assert!(!parse_env_bool("NONEXISTENT_VAR", false).unwrap());
    }

    #[test]
    fn test_parse_target() {
        assert_eq!(
            parse_target(Some("@rustlang".to_string()), None).unwrap(),
            Target::User("rustlang".to_string())
        );
        assert_eq!(
            parse_target(None, Some("tokio".to_string())).unwrap(),
            Target::Search("tokio".to_string())
        );
        assert!(parse_target(Some("a".to_string()), Some("b".to_string())).is_err());
        assert!(matches!(
            parse_target(None, None),
            Err(ConfigError::MissingEnvVar(_))
        ));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("START_DATE", "2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(parse_date("START_DATE", "29/02/2024").is_err());
    }

    #[test]
    fn test_validate() {
        assert!(Config::for_testing().validate().is_ok());

        let zero = Config {
            max_posts: 0,
            ..Config::for_testing()
        };
        assert!(zero.validate().is_err());

        let inverted = Config {
            start_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Config::for_testing()
        };
        assert!(inverted.validate().is_err());

        let no_token = Config {
            bearer_token: None,
            ..Config::for_testing()
        };
        assert!(no_token.validate().is_err());

        let scroll_no_token = Config {
            mode: CollectMode::Scroll,
            bearer_token: None,
            ..Config::for_testing()
        };
        assert!(scroll_no_token.validate().is_ok());
    }

    #[test]
    fn test_browser_settings_use_page_load_timeout() {
        let config = Config {
            page_load_timeout: Duration::from_secs(7),
            chrome_path: Some("/opt/chrome".to_string()),
            ..Config::for_testing()
        };
        let settings = config.browser_settings();
        assert_eq!(settings.request_timeout, Duration::from_secs(7));
        assert_eq!(settings.chrome_path.as_deref(), Some("/opt/chrome"));
    }

    #[test]
    fn test_request_carries_dates() {
        let config = Config {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            ..Config::for_testing()
        };
        let request = config.request();
        assert_eq!(request.max_count, 10);
        assert_eq!(request.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(request.end_date, None);
    }
}
