use std::sync::Arc;

use serde::Serialize;

use crate::{
    error::AppResult,
    models::{ExecutionReport, SyncPlan},
    services::{
        executor::execute,
        providers::{FeedProvider, RecordStore},
        reconciler::reconcile,
    },
};

/// Per-run settings
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub feed_url: String,
    pub page_size: u32,
    /// Compute the plan without writing it
    pub dry_run: bool,
}

/// Everything a single pass saw and did
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub feed_records: usize,
    pub stored_records: usize,
    pub plan: SyncPlan,
    /// `None` on a dry run
    pub report: Option<ExecutionReport>,
}

impl SyncSummary {
    /// True when every planned write landed and the store had no conflicts
    pub fn is_success(&self) -> bool {
        self.plan.conflicts.is_empty()
            && self.report.as_ref().map_or(true, ExecutionReport::is_clean)
    }
}

/// One-directional sync from a watch feed into a record store
#[derive(Clone)]
pub struct SyncService {
    feed: Arc<dyn FeedProvider>,
    store: Arc<dyn RecordStore>,
    options: SyncOptions,
}

impl SyncService {
    pub fn new(
        feed: Arc<dyn FeedProvider>,
        store: Arc<dyn RecordStore>,
        options: SyncOptions,
    ) -> Self {
        Self {
            feed,
            store,
            options,
        }
    }

    /// Run one reconciliation pass.
    ///
    /// Both sides are read concurrently; if either read fails the pass stops
    /// before anything is written. Failures of individual writes are carried
    /// in the report instead.
    pub async fn run(&self) -> AppResult<SyncSummary> {
        let (feed_records, stored_records) = tokio::try_join!(
            self.feed.fetch_records(&self.options.feed_url),
            self.store.query_all(self.options.page_size),
        )?;

        tracing::info!(
            feed = self.feed.name(),
            store = self.store.name(),
            feed_records = feed_records.len(),
            stored_records = stored_records.len(),
            "Fetched both sides"
        );

        let plan = reconcile(&feed_records, &stored_records);

        tracing::info!(
            to_create = plan.to_create.len(),
            to_update = plan.to_update.len(),
            unchanged = plan.unchanged,
            skipped = plan.skipped.len(),
            conflicts = plan.conflicts.len(),
            "Reconciled"
        );

        let report = if self.options.dry_run {
            tracing::info!("Dry run; no writes issued");
            None
        } else {
            let report = execute(&plan, self.store.as_ref()).await;
            tracing::info!(
                created = report.created,
                updated = report.updated,
                failed = report.failures.len(),
                "Applied plan"
            );
            Some(report)
        };

        Ok(SyncSummary {
            feed_records: feed_records.len(),
            stored_records: stored_records.len(),
            plan,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{FeedRecord, StoredRecord};
    use crate::services::providers::{MockFeedProvider, MockRecordStore};
    use chrono::NaiveDate;
    use reqwest::StatusCode;

    fn options(dry_run: bool) -> SyncOptions {
        SyncOptions {
            feed_url: "https://letterboxd.com/cinephile/rss/".to_string(),
            page_size: 100,
            dry_run,
        }
    }

    fn feed_with(records: Vec<FeedRecord>) -> MockFeedProvider {
        let mut feed = MockFeedProvider::new();
        feed.expect_fetch_records()
            .withf(|url| url == "https://letterboxd.com/cinephile/rss/")
            .returning(move |_| Ok(records.clone()));
        feed.expect_name().return_const("mock-feed");
        feed
    }

    fn entry(id: &str, watched: (i32, u32, u32)) -> FeedRecord {
        FeedRecord {
            external_id: id.to_string(),
            title: format!("Film {}", id),
            year: "2020".to_string(),
            rating: "4".to_string(),
            watched_at: NaiveDate::from_ymd_opt(watched.0, watched.1, watched.2).unwrap(),
            cover_url: String::new(),
        }
    }

    fn stored(store_id: &str, id: &str, watched: &str) -> StoredRecord {
        StoredRecord {
            store_id: store_id.to_string(),
            external_id: id.to_string(),
            title: format!("Film {}", id),
            year: 2020,
            rating: "4".to_string(),
            watched_at: Some(watched.to_string()),
            watch_count: 1,
            cover_url: String::new(),
        }
    }

    #[tokio::test]
    async fn test_run_creates_and_updates() {
        let feed = feed_with(vec![entry("1", (2024, 5, 1)), entry("2", (2024, 5, 2))]);

        let mut store = MockRecordStore::new();
        store
            .expect_query_all()
            .withf(|page_size| *page_size == 100)
            .returning(|_| Ok(vec![stored("page-2", "2", "2024-01-01")]));
        store
            .expect_create()
            .times(1)
            .returning(|_| Ok("page-1".to_string()));
        store
            .expect_update()
            .withf(|store_id, patch| store_id == "page-2" && patch.watch_count == Some(2))
            .times(1)
            .returning(|_, _| Ok(()));
        store.expect_name().return_const("mock-store");

        let service = SyncService::new(Arc::new(feed), Arc::new(store), options(false));
        let summary = service.run().await.unwrap();

        assert_eq!(summary.feed_records, 2);
        assert_eq!(summary.stored_records, 1);
        let report = summary.report.as_ref().unwrap();
        assert_eq!(report.created, 1);
        assert_eq!(report.updated, 1);
        assert!(summary.is_success());
    }

    #[tokio::test]
    async fn test_dry_run_issues_no_writes() {
        let feed = feed_with(vec![entry("1", (2024, 5, 1))]);

        let mut store = MockRecordStore::new();
        store.expect_query_all().returning(|_| Ok(Vec::new()));
        store.expect_create().never();
        store.expect_update().never();
        store.expect_name().return_const("mock-store");

        let service = SyncService::new(Arc::new(feed), Arc::new(store), options(true));
        let summary = service.run().await.unwrap();

        assert_eq!(summary.plan.to_create.len(), 1);
        assert!(summary.report.is_none());
    }

    #[tokio::test]
    async fn test_store_failure_aborts_run() {
        let feed = feed_with(vec![entry("1", (2024, 5, 1))]);

        let mut store = MockRecordStore::new();
        store.expect_query_all().returning(|_| {
            Err(AppError::UpstreamStatus {
                service: "Notion",
                status: StatusCode::UNAUTHORIZED,
                body: "unauthorized".to_string(),
            })
        });
        store.expect_create().never();
        store.expect_name().return_const("mock-store");

        let service = SyncService::new(Arc::new(feed), Arc::new(store), options(false));
        let err = service.run().await.unwrap_err();

        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_feed_failure_aborts_run() {
        let mut feed = MockFeedProvider::new();
        feed.expect_fetch_records()
            .returning(|_| Err(AppError::Feed("Failed to parse RSS feed".to_string())));
        feed.expect_name().return_const("mock-feed");

        let mut store = MockRecordStore::new();
        store.expect_query_all().returning(|_| Ok(Vec::new()));
        store.expect_create().never();
        store.expect_name().return_const("mock-store");

        let service = SyncService::new(Arc::new(feed), Arc::new(store), options(false));
        assert!(matches!(service.run().await, Err(AppError::Feed(_))));
    }

    #[tokio::test]
    async fn test_conflicts_mark_run_unsuccessful() {
        let feed = feed_with(vec![entry("7", (2024, 5, 1))]);

        let mut store = MockRecordStore::new();
        store.expect_query_all().returning(|_| {
            Ok(vec![
                stored("page-a", "7", "2024-01-01"),
                stored("page-b", "7", "2024-02-01"),
            ])
        });
        store.expect_create().never();
        store.expect_update().never();
        store.expect_name().return_const("mock-store");

        let service = SyncService::new(Arc::new(feed), Arc::new(store), options(false));
        let summary = service.run().await.unwrap();

        assert_eq!(summary.plan.conflicts.len(), 1);
        assert!(!summary.is_success());
    }
}
