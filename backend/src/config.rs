//! Service configuration.
//!
//! Values come from a TOML file (path in `CONFFREE_CONFIG`, default
//! `config/default`), then `CONFFREE__*` environment overrides, then the
//! plain `PORT` variable.

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::time::Duration;

use crate::pollers::feed::UrlTemplate;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// How often every room is re-polled (minutes)
    #[serde(default = "default_poll_interval_minutes")]
    pub poll_interval_minutes: u64,

    /// Zone that defines "today" and the date substituted into feed URLs
    #[serde(default = "default_timezone")]
    pub timezone: Tz,

    pub feed: FeedConfig,

    /// Rooms to track, in display order
    pub rooms: Vec<RoomConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub url_template: UrlTemplate,

    /// Also turn plain VEVENTs into intervals
    #[serde(default)]
    pub include_events: bool,

    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RoomConfig {
    pub email: String,
    pub label: String,
}

fn default_port() -> u16 {
    5000
}

fn default_poll_interval_minutes() -> u64 {
    5
}

/// Upper bound for `poll_interval_minutes` (one week)
const MAX_POLL_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

fn default_timezone() -> Tz {
    Tz::UTC
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let path = env::var("CONFFREE_CONFIG").unwrap_or_else(|_| "config/default".to_string());
        tracing::debug!("Loading configuration from {}", path);

        Self::from_builder(config::Config::builder().add_source(File::with_name(&path)))
            .with_context(|| format!("Failed to load configuration from {}", path))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        let settings = builder
            .add_source(Environment::with_prefix("CONFFREE").separator("__"))
            .set_override_option("port", env::var("PORT").ok())?
            .build()?;

        let config: AppConfig = settings
            .try_deserialize()
            .context("Configuration has missing or invalid fields")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_minutes == 0 {
            bail!("poll_interval_minutes must be greater than zero");
        }
        if self.poll_interval_minutes > MAX_POLL_INTERVAL_MINUTES {
            bail!(
                "poll_interval_minutes must be at most {}",
                MAX_POLL_INTERVAL_MINUTES
            );
        }

        if self.rooms.is_empty() {
            bail!("At least one room must be configured");
        }

        let mut seen = HashSet::new();
        for room in &self.rooms {
            if room.email.trim().is_empty() {
                bail!("Room '{}' has an empty email", room.label);
            }
            if room.label.trim().is_empty() {
                bail!("Room {} has an empty label", room.email);
            }
            if !seen.insert(room.email.to_ascii_lowercase()) {
                bail!("Room {} is configured more than once", room.email);
            }
        }

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes.saturating_mul(60))
    }
}
