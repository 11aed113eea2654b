//! Retrieval and decoding of the raw alert payload.
//!
//! The feed endpoint wants to be talked to like the website's own frontend:
//! a browser-ish User-Agent, the origin as Referer, the XHR marker header,
//! and session cookies obtained by visiting the origin first. The decode
//! step is a pure function over the body text; everything network-flavored
//! stays behind the [`AlertSource`] seam.

use crate::alerts::model::Alert;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER, USER_AGENT};
use std::time::Duration;

/// Literal body the feed returns when no alert is active: a byte-order-mark
/// followed by CRLF.
pub const EMPTY_FEED_BODY: &str = "\u{feff}\r\n";

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/122.0.0.0 Safari/537.36";

/// Outcome of one feed poll.
#[derive(Debug, Clone)]
pub enum FeedPoll {
    /// A decoded alert is in progress.
    Alert(Alert),
    /// The feed reported no current alert.
    Quiet,
}

/// Decodes a feed response body.
///
/// The exact empty-response sentinel short-circuits to [`FeedPoll::Quiet`]
/// without touching the JSON parser. A failed parse is retried after
/// stripping a leading UTF-8 BOM, which the source prepends inconsistently.
/// Bodies that are blank (before or after stripping) also count as quiet;
/// anything else that still fails to parse is a decode error carrying the
/// raw text.
pub fn decode_feed_body(body: &str) -> Result<FeedPoll> {
    if body == EMPTY_FEED_BODY {
        return Ok(FeedPoll::Quiet);
    }
    match serde_json::from_str::<Alert>(body) {
        Ok(alert) => Ok(FeedPoll::Alert(alert)),
        Err(_) => {
            if body.trim().is_empty() {
                warn!("Received non-standard empty response from alerts endpoint");
                return Ok(FeedPoll::Quiet);
            }
            let stripped = body.trim_start_matches('\u{feff}');
            if stripped.trim().is_empty() {
                warn!("Received BOM-wrapped blank response from alerts endpoint");
                return Ok(FeedPoll::Quiet);
            }
            match serde_json::from_str::<Alert>(stripped) {
                Ok(alert) => {
                    debug!("Feed body parsed only after BOM strip");
                    Ok(FeedPoll::Alert(alert))
                }
                Err(err) => Err(BotError::Decode {
                    reason: err.to_string(),
                    raw: body.to_string(),
                }),
            }
        }
    }
}

/// Something the monitor can poll for the current alert state.
#[async_trait]
pub trait AlertSource: Send + Sync {
    async fn poll(&self) -> Result<FeedPoll>;
}

/// HTTP fetcher for the public feed.
pub struct AlertFetcher {
    http: reqwest::Client,
    origin_url: String,
    feed_url: String,
}

impl AlertFetcher {
    pub fn new(origin_url: &str, feed_url: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(
            REFERER,
            HeaderValue::from_str(origin_url)
                .map_err(|e| BotError::Config(format!("Invalid origin URL for Referer: {}", e)))?,
        );
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| BotError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            origin_url: origin_url.to_string(),
            feed_url: feed_url.to_string(),
        })
    }
}

#[async_trait]
impl AlertSource for AlertFetcher {
    async fn poll(&self) -> Result<FeedPoll> {
        // The feed rejects cookie-less requests; visiting the origin first
        // populates the client's cookie store for the session.
        self.http.get(&self.origin_url).send().await?;

        let response = self
            .http
            .get(&self.feed_url)
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        decode_feed_body(&body)
    }
}
