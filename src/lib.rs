//! Feed collector library.
//!
//! Gathers a bounded, deduplicated sequence of posts from a user timeline or
//! search, either by paging through the REST API or by scrolling the
//! rendered feed in a headless browser.

// Selectors and HTML fixtures are written as raw strings
#![allow(clippy::needless_raw_string_hashes)]

pub mod browser;
pub mod collector;
pub mod config;
pub mod constants;
pub mod export;
pub mod model;
pub mod session;
pub mod sources;

pub use collector::{Collection, Collector, CollectorSettings, StopReason};
pub use model::{CollectionRequest, Metrics, Post, Target};
pub use session::{collect, collect_via_api, collect_via_browser, CollectError};
