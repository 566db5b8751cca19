/// Letterboxd RSS feed provider
///
/// Each diary entry in a member's feed carries namespaced extension elements:
/// `letterboxd:filmTitle`, `letterboxd:filmYear`, `letterboxd:memberRating`,
/// `letterboxd:watchedDate` and a TMDB id (`tmdb:movieId` or `tmdb:tvId`).
/// The poster only appears as an `<img>` inside the item description.
///
/// List and review items without a `watchedDate` are not diary entries and
/// are left out.
use std::time::Duration;

use chrono::NaiveDate;
use regex::Regex;
use reqwest::Client as HttpClient;
use rss::{extension::ExtensionMap, Channel, Item};

use crate::{
    error::{AppError, AppResult},
    models::{FeedRecord, DATE_FORMAT},
    services::{providers::FeedProvider, retry::with_retry},
};

const NS_LETTERBOXD: &str = "letterboxd";
const NS_TMDB: &str = "tmdb";

#[derive(Clone)]
pub struct LetterboxdFeed {
    http_client: HttpClient,
    max_retries: u32,
    cover_pattern: Regex,
}

impl LetterboxdFeed {
    pub fn new(timeout: Duration, max_retries: u32) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        let cover_pattern = Regex::new(r#"<img[^>]*\ssrc="([^"]+)""#)
            .map_err(|e| AppError::Internal(format!("Invalid cover pattern: {}", e)))?;

        Ok(Self {
            http_client,
            max_retries,
            cover_pattern,
        })
    }

    async fn download(&self, source_url: &str) -> AppResult<Vec<u8>> {
        let response = self.http_client.get(source_url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::UpstreamStatus {
                service: "Letterboxd",
                status,
                body,
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Parse an RSS document into diary records
    fn parse_feed(&self, body: &[u8]) -> AppResult<Vec<FeedRecord>> {
        let channel = Channel::read_from(body)
            .map_err(|e| AppError::Feed(format!("Failed to parse RSS feed: {}", e)))?;

        Ok(channel
            .items()
            .iter()
            .filter_map(|item| self.parse_item(item))
            .collect())
    }

    fn parse_item(&self, item: &Item) -> Option<FeedRecord> {
        let ext = item.extensions();

        let Some(raw_date) = extension_value(ext, NS_LETTERBOXD, "watchedDate") else {
            tracing::debug!(
                title = item.title().unwrap_or_default(),
                "Skipping feed item without a watched date"
            );
            return None;
        };

        let watched_at = match NaiveDate::parse_from_str(raw_date.trim(), DATE_FORMAT) {
            Ok(date) => date,
            Err(e) => {
                tracing::warn!(
                    title = item.title().unwrap_or_default(),
                    watched_date = %raw_date,
                    error = %e,
                    "Skipping feed item with unparsable watched date"
                );
                return None;
            }
        };

        let title = extension_value(ext, NS_LETTERBOXD, "filmTitle")
            .or(item.title())
            .unwrap_or_default()
            .trim()
            .to_string();

        let external_id = extension_value(ext, NS_TMDB, "movieId")
            .or_else(|| extension_value(ext, NS_TMDB, "tvId"))
            .unwrap_or_default()
            .trim()
            .to_string();

        Some(FeedRecord {
            external_id,
            title,
            year: extension_value(ext, NS_LETTERBOXD, "filmYear")
                .unwrap_or_default()
                .trim()
                .to_string(),
            rating: extension_value(ext, NS_LETTERBOXD, "memberRating")
                .unwrap_or_default()
                .trim()
                .to_string(),
            watched_at,
            cover_url: item
                .description()
                .and_then(|html| self.extract_cover(html))
                .unwrap_or_default(),
        })
    }

    fn extract_cover(&self, html: &str) -> Option<String> {
        self.cover_pattern
            .captures(html)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }
}

/// First value of `namespace:name`, if present and non-empty
fn extension_value<'a>(ext: &'a ExtensionMap, namespace: &str, name: &str) -> Option<&'a str> {
    ext.get(namespace)
        .and_then(|elements| elements.get(name))
        .and_then(|values| values.first())
        .and_then(|e| e.value())
        .filter(|v| !v.trim().is_empty())
}

#[async_trait::async_trait]
impl FeedProvider for LetterboxdFeed {
    async fn fetch_records(&self, source_url: &str) -> AppResult<Vec<FeedRecord>> {
        let body = with_retry("fetch feed", self.max_retries, || self.download(source_url)).await?;
        let records = self.parse_feed(&body)?;

        for record in &records {
            tracing::debug!(record = %record, watched_at = %record.watched_at, "Feed entry");
        }

        tracing::info!(
            url = %source_url,
            records = records.len(),
            provider = self.name(),
            "Feed fetched"
        );

        Ok(records)
    }

    fn name(&self) -> &'static str {
        "letterboxd"
    }
}
