//! discord-export Core Library
//!
//! Provides the following capabilities:
//! - Discover Discord sessions stored by Firefox and Chromium profiles
//! - Talk to the Discord REST API with retries and rate-limit handling
//! - Page through guilds and channel history
//! - Write exported messages to JSON files
//!
//! Pipeline: Discover (browser profiles) -> Select -> Fetch (REST API) -> Export (JSON)

pub mod accounts;
pub mod api;
pub mod config;
pub mod export;

// Re-export main types
pub use accounts::{AccountFinder, BrowserFamily, Credential, DiscoveryError, StoreError};
pub use api::{ApiClient, ApiError, Channel, Discord, Guild, User};
pub use config::Config;
