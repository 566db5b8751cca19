use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod notion;
pub mod plan;

pub use plan::{
    DuplicateExternalId, ExecutionReport, OperationFailure, OperationKind, SkipReason,
    SkippedRecord, SyncPlan,
};

/// Date format written to the store and used by the feed's `watchedDate`
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One diary entry as read from the feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRecord {
    /// Catalog identifier (TMDB movie or TV id); empty when the feed has none
    pub external_id: String,
    pub title: String,
    /// Release year exactly as the feed spells it
    pub year: String,
    pub rating: String,
    pub watched_at: NaiveDate,
    pub cover_url: String,
}

/// A title as currently persisted in the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Store-assigned handle used for updates
    pub store_id: String,
    pub external_id: String,
    pub title: String,
    pub year: i32,
    pub rating: String,
    /// Last watch date in the store's own text format, `None` when unset
    pub watched_at: Option<String>,
    pub watch_count: u32,
    pub cover_url: String,
}

/// Payload for a title the store does not track yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub external_id: String,
    pub title: String,
    pub year: i32,
    pub rating: String,
    pub watched_at: NaiveDate,
    pub watch_count: u32,
    pub cover_url: String,
}

/// Fields to overwrite on a stored record; `None` leaves the field alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
    pub watched_at: Option<NaiveDate>,
    pub watch_count: Option<u32>,
    pub cover_url: Option<String>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.watched_at.is_none() && self.watch_count.is_none() && self.cover_url.is_none()
    }
}

/// A pending write against an existing stored record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateIntent {
    pub store_id: String,
    pub external_id: String,
    pub title: String,
    pub patch: RecordPatch,
}

impl StoredRecord {
    /// State of this record once `patch` has been written
    pub fn apply(&self, patch: &RecordPatch) -> StoredRecord {
        let mut next = self.clone();
        if let Some(date) = patch.watched_at {
            next.watched_at = Some(date.format(DATE_FORMAT).to_string());
        }
        if let Some(count) = patch.watch_count {
            next.watch_count = count;
        }
        if let Some(cover) = &patch.cover_url {
            next.cover_url = cover.clone();
        }
        next
    }
}

impl NewRecord {
    /// State of this record once created under `store_id`
    pub fn into_stored(self, store_id: String) -> StoredRecord {
        StoredRecord {
            store_id,
            external_id: self.external_id,
            title: self.title,
            year: self.year,
            rating: self.rating,
            watched_at: Some(self.watched_at.format(DATE_FORMAT).to_string()),
            watch_count: self.watch_count,
            cover_url: self.cover_url,
        }
    }
}

impl Display for FeedRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} ({}) -- {}",
            self.external_id, self.title, self.year, self.rating
        )
    }
}

impl Display for NewRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}) [{}]", self.title, self.year, self.external_id)
    }
}
