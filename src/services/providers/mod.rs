/// Adapters for the two ends of a sync pass
///
/// A `FeedProvider` yields the watch log (source of truth for what was
/// watched and when); a `RecordStore` holds the tracked titles. The sync
/// service only sees these traits, so either side can be swapped or mocked.
use crate::{
    error::AppResult,
    models::{FeedRecord, NewRecord, RecordPatch, StoredRecord},
};

pub mod letterboxd;
pub mod notion;

pub use letterboxd::LetterboxdFeed;
pub use notion::NotionStore;

/// Source of watch events
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    /// Fetch every diary entry currently published at `source_url`
    async fn fetch_records(&self, source_url: &str) -> AppResult<Vec<FeedRecord>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Destination database for tracked titles
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Read every stored record, following continuation cursors until exhausted
    async fn query_all(&self, page_size: u32) -> AppResult<Vec<StoredRecord>>;

    /// Create a record and return its store-assigned id
    async fn create(&self, record: &NewRecord) -> AppResult<String>;

    /// Overwrite the patched fields of an existing record
    async fn update(&self, store_id: &str, patch: &RecordPatch) -> AppResult<()>;

    /// Store name for logging and debugging
    fn name(&self) -> &'static str;
}
