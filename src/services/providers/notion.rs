/// Notion database store
///
/// API Flow:
/// 1. Query: POST /v1/databases/{id}/query, repeated with `start_cursor`
///    while `has_more` is set
/// 2. Create: POST /v1/pages with the database as parent
/// 3. Update: PATCH /v1/pages/{page_id} with only the changed properties
use std::time::Duration;

use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::{
        notion::{create_properties, patch_properties, CreatedPage, QueryResponse},
        NewRecord, RecordPatch, StoredRecord,
    },
    services::{providers::RecordStore, retry::with_retry},
};

const MAX_PAGE_SIZE: u32 = 100;

#[derive(Clone)]
pub struct NotionStore {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    api_version: String,
    database_id: String,
    max_retries: u32,
}

impl NotionStore {
    pub fn new(
        api_key: String,
        api_url: String,
        api_version: String,
        database_id: String,
        timeout: Duration,
        max_retries: u32,
    ) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_version,
            database_id,
            max_retries,
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Accept", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Notion-Version", &self.api_version)
    }

    /// Send a JSON request and decode the JSON reply
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> AppResult<T> {
        let response = self.authorized(request).send().await?;
        let response = check_status(response).await?;
        let body = response.text().await?;

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, response = %body, "Failed to deserialize Notion response");
            AppError::Serialization(e)
        })
    }

    async fn query_page(&self, page_size: u32, cursor: Option<&str>) -> AppResult<QueryResponse> {
        let url = format!("{}/v1/databases/{}/query", self.api_url, self.database_id);

        let mut body = json!({ "page_size": page_size });
        if let Some(cursor) = cursor {
            body["start_cursor"] = Value::String(cursor.to_string());
        }

        self.send(self.http_client.post(&url).json(&body)).await
    }
}

async fn check_status(response: Response) -> AppResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::UpstreamStatus {
        service: "Notion",
        status,
        body,
    })
}

#[async_trait::async_trait]
impl RecordStore for NotionStore {
    async fn query_all(&self, page_size: u32) -> AppResult<Vec<StoredRecord>> {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let response = with_retry("query database", self.max_retries, || {
                self.query_page(page_size, cursor.as_deref())
            })
            .await?;

            pages += 1;
            records.extend(response.results.into_iter().map(StoredRecord::from));

            match response.next_cursor {
                Some(next) if response.has_more => cursor = Some(next),
                _ => break,
            }
        }

        tracing::info!(
            database_id = %self.database_id,
            records = records.len(),
            pages,
            store = self.name(),
            "Database queried"
        );

        Ok(records)
    }

    async fn create(&self, record: &NewRecord) -> AppResult<String> {
        let url = format!("{}/v1/pages", self.api_url);
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": create_properties(record),
        });

        let page: CreatedPage = with_retry("create page", self.max_retries, || {
            self.send(self.http_client.post(&url).json(&body))
        })
        .await?;

        tracing::debug!(
            page_id = %page.id,
            external_id = %record.external_id,
            "Page created"
        );

        Ok(page.id)
    }

    async fn update(&self, store_id: &str, patch: &RecordPatch) -> AppResult<()> {
        let url = format!("{}/v1/pages/{}", self.api_url, store_id);
        let body = json!({ "properties": patch_properties(patch) });

        let _: Value = with_retry("update page", self.max_retries, || {
            self.send(self.http_client.patch(&url).json(&body))
        })
        .await?;

        tracing::debug!(page_id = %store_id, "Page updated");

        Ok(())
    }

    fn name(&self) -> &'static str {
        "notion"
    }
}
