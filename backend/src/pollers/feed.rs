//! Fetching a room's free/busy feed.

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use conffree_shared::Interval;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use super::ical::{self, ParseError};
use crate::config::{FeedConfig, RoomConfig};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("feed URL template is empty")]
    Empty,

    #[error("feed URL template needs {{email}} and {{date}} placeholders, or two %s slots")]
    MissingPlaceholders,
}

/// Feed URL with a slot for the room email and one for the `YYYYMMDD` date.
///
/// Either named (`{email}`, `{date}`) or positional (`%s` twice, email
/// first).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct UrlTemplate {
    raw: String,
    positional: bool,
}

impl UrlTemplate {
    pub fn parse(raw: impl Into<String>) -> Result<Self, TemplateError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(TemplateError::Empty);
        }

        if raw.contains("{email}") && raw.contains("{date}") {
            Ok(Self {
                raw,
                positional: false,
            })
        } else if raw.matches("%s").count() == 2 {
            Ok(Self {
                raw,
                positional: true,
            })
        } else {
            Err(TemplateError::MissingPlaceholders)
        }
    }

    /// Substitute the URL-encoded `email` and `now`'s local date.
    pub fn render(&self, email: &str, now: DateTime<Tz>) -> String {
        let email = urlencoding::encode(email);
        let date = now.format("%Y%m%d").to_string();

        if self.positional {
            let mut parts = self.raw.splitn(3, "%s");
            let head = parts.next().unwrap_or_default();
            let middle = parts.next().unwrap_or_default();
            let tail = parts.next().unwrap_or_default();
            format!("{head}{email}{middle}{date}{tail}")
        } else {
            self.raw
                .replace("{email}", &email)
                .replace("{date}", &date)
        }
    }
}

impl TryFrom<String> for UrlTemplate {
    type Error = TemplateError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered {status}")]
    Status { url: String, status: StatusCode },

    #[error("could not parse feed from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: ParseError,
    },
}

/// Where a room's intervals come from
#[async_trait]
pub trait FreeBusySource: Send + Sync {
    /// Fetch the raw intervals for `room` for the day of `now`.
    async fn fetch(&self, room: &RoomConfig, now: DateTime<Tz>) -> Result<Vec<Interval>, FeedError>;
}

/// Fetches iCalendar feeds over HTTP(S)
pub struct HttpFeedSource {
    client: Client,
    template: UrlTemplate,
    include_events: bool,
}

impl HttpFeedSource {
    pub fn new(config: &FeedConfig) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            template: config.url_template.clone(),
            include_events: config.include_events,
        })
    }
}

#[async_trait]
impl FreeBusySource for HttpFeedSource {
    async fn fetch(&self, room: &RoomConfig, now: DateTime<Tz>) -> Result<Vec<Interval>, FeedError> {
        let url = self.template.render(&room.email, now);
        tracing::debug!(room = %room.email, %url, "Fetching free/busy feed");

        let transport = |source| FeedError::Transport {
            url: url.clone(),
            source,
        };

        let response = self.client.get(&url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status { url, status });
        }

        let body = response.text().await.map_err(transport)?;
        ical::parse_feed(&body, now.timezone(), self.include_events)
            .map_err(|source| FeedError::Parse { url, source })
    }
}
