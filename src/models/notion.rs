//! Notion database wire types
//!
//! The database is expected to carry these properties:
//! `Title` (title), `MovieID` (rich text), `Year` (number), `Rating` (select),
//! `LatestWatch` (date), `WatchCount` (number) and `MovieCover` (files).
//! Every property is optional on read since rows can be edited by hand.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{NewRecord, RecordPatch, StoredRecord, DATE_FORMAT};

pub const PROP_TITLE: &str = "Title";
pub const PROP_EXTERNAL_ID: &str = "MovieID";
pub const PROP_YEAR: &str = "Year";
pub const PROP_RATING: &str = "Rating";
pub const PROP_LATEST_WATCH: &str = "LatestWatch";
pub const PROP_WATCH_COUNT: &str = "WatchCount";
pub const PROP_COVER: &str = "MovieCover";

const COVER_FILE_NAME: &str = "Movie Cover";

/// Response from POST /v1/databases/{id}/query
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<NotionPage>,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

/// Response from POST /v1/pages; only the id matters
#[derive(Debug, Clone, Deserialize)]
pub struct CreatedPage {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotionPage {
    pub id: String,
    #[serde(default)]
    pub properties: PageProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageProperties {
    #[serde(rename = "MovieID", default)]
    pub external_id: Option<RichTextProperty>,
    #[serde(rename = "Title", default)]
    pub title: Option<TitleProperty>,
    #[serde(rename = "MovieCover", default)]
    pub cover: Option<FilesProperty>,
    #[serde(rename = "Year", default)]
    pub year: Option<NumberProperty>,
    #[serde(rename = "Rating", default)]
    pub rating: Option<SelectProperty>,
    #[serde(rename = "LatestWatch", default)]
    pub latest_watch: Option<DateProperty>,
    #[serde(rename = "WatchCount", default)]
    pub watch_count: Option<NumberProperty>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RichTextProperty {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TitleProperty {
    #[serde(default)]
    pub title: Vec<RichText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NumberProperty {
    #[serde(default)]
    pub number: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelectProperty {
    #[serde(default)]
    pub select: Option<SelectOption>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectOption {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DateProperty {
    #[serde(default)]
    pub date: Option<DateValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateValue {
    pub start: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilesProperty {
    #[serde(default)]
    pub files: Vec<FileObject>,
}

/// A file attachment, either linked (`external`) or uploaded to Notion (`file`)
#[derive(Debug, Clone, Deserialize)]
pub struct FileObject {
    #[serde(default)]
    pub external: Option<FileUrl>,
    #[serde(default)]
    pub file: Option<FileUrl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileUrl {
    pub url: String,
}

fn plain_text(segments: &[RichText]) -> String {
    segments
        .iter()
        .map(|s| s.plain_text.as_str())
        .collect::<String>()
        .trim()
        .to_string()
}

impl From<NotionPage> for StoredRecord {
    fn from(page: NotionPage) -> Self {
        let props = page.properties;

        let cover_url = props
            .cover
            .and_then(|c| c.files.into_iter().next())
            .and_then(|f| f.external.or(f.file))
            .map(|u| u.url)
            .unwrap_or_default();

        StoredRecord {
            store_id: page.id,
            external_id: props
                .external_id
                .map(|p| plain_text(&p.rich_text))
                .unwrap_or_default(),
            title: props
                .title
                .map(|p| plain_text(&p.title))
                .unwrap_or_default(),
            year: props
                .year
                .and_then(|p| p.number)
                .map(|n| n as i32)
                .unwrap_or(0),
            rating: props
                .rating
                .and_then(|p| p.select)
                .map(|s| s.name)
                .unwrap_or_default(),
            watched_at: props.latest_watch.and_then(|p| p.date).map(|d| d.start),
            watch_count: props
                .watch_count
                .and_then(|p| p.number)
                .map(|n| n.max(0.0) as u32)
                .unwrap_or(0),
            cover_url,
        }
    }
}

fn text_value(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": content, "link": null } }])
}

fn cover_value(url: &str) -> Value {
    if url.is_empty() {
        return json!({ "files": [] });
    }
    json!({
        "files": [{
            "type": "external",
            "name": COVER_FILE_NAME,
            "external": { "url": url }
        }]
    })
}

/// Select options cannot be empty, so a missing rating clears the property
fn rating_value(rating: &str) -> Value {
    if rating.trim().is_empty() {
        json!({ "select": null })
    } else {
        json!({ "select": { "name": rating } })
    }
}

/// Full property set for a new page
pub fn create_properties(record: &NewRecord) -> Value {
    json!({
        PROP_TITLE: { "title": text_value(&record.title) },
        PROP_EXTERNAL_ID: { "rich_text": text_value(&record.external_id) },
        PROP_YEAR: { "number": record.year },
        PROP_RATING: rating_value(&record.rating),
        PROP_LATEST_WATCH: { "date": { "start": record.watched_at.format(DATE_FORMAT).to_string() } },
        PROP_WATCH_COUNT: { "number": record.watch_count },
        PROP_COVER: cover_value(&record.cover_url),
    })
}

/// Only the properties a patch changes
pub fn patch_properties(patch: &RecordPatch) -> Value {
    let mut props = Map::new();

    if let Some(date) = patch.watched_at {
        props.insert(
            PROP_LATEST_WATCH.to_string(),
            json!({ "date": { "start": date.format(DATE_FORMAT).to_string() } }),
        );
    }
    if let Some(count) = patch.watch_count {
        props.insert(PROP_WATCH_COUNT.to_string(), json!({ "number": count }));
    }
    if let Some(cover) = &patch.cover_url {
        props.insert(PROP_COVER.to_string(), cover_value(cover));
    }

    Value::Object(props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_page_deserialization() {
        let json = r#"{
            "object": "page",
            "id": "59833787-2cf9-4fdf-8782-e53db20768a5",
            "properties": {
                "MovieID": { "rich_text": [{ "plain_text": "603" }] },
                "Title": { "title": [{ "plain_text": "The " }, { "plain_text": "Matrix" }] },
                "Year": { "number": 1999 },
                "Rating": { "select": { "name": "★★★★½" } },
                "LatestWatch": { "date": { "start": "2023-01-01T00:00:00.000+00:00" } },
                "WatchCount": { "number": 2 },
                "MovieCover": { "files": [{
                    "name": "Movie Cover",
                    "type": "external",
                    "external": { "url": "https://img/matrix.jpg" }
                }] }
            }
        }"#;

        let page: NotionPage = serde_json::from_str(json).unwrap();
        let record = StoredRecord::from(page);

        assert_eq!(record.store_id, "59833787-2cf9-4fdf-8782-e53db20768a5");
        assert_eq!(record.external_id, "603");
        assert_eq!(record.title, "The Matrix");
        assert_eq!(record.year, 1999);
        assert_eq!(record.rating, "★★★★½");
        assert_eq!(
            record.watched_at.as_deref(),
            Some("2023-01-01T00:00:00.000+00:00")
        );
        assert_eq!(record.watch_count, 2);
        assert_eq!(record.cover_url, "https://img/matrix.jpg");
    }

    #[test]
    fn test_sparse_page_deserialization() {
        let json = r#"{
            "id": "page-2",
            "properties": {
                "Title": { "title": [] },
                "Year": { "number": null },
                "Rating": { "select": null },
                "LatestWatch": { "date": null },
                "MovieCover": { "files": [] }
            }
        }"#;

        let record = StoredRecord::from(serde_json::from_str::<NotionPage>(json).unwrap());
        assert_eq!(record.external_id, "");
        assert_eq!(record.year, 0);
        assert_eq!(record.rating, "");
        assert_eq!(record.watched_at, None);
        assert_eq!(record.watch_count, 0);
        assert_eq!(record.cover_url, "");
    }

    #[test]
    fn test_uploaded_cover_is_read() {
        let json = r#"{
            "id": "page-3",
            "properties": {
                "MovieCover": { "files": [{ "type": "file", "file": { "url": "https://s3/cover.png" } }] }
            }
        }"#;

        let record = StoredRecord::from(serde_json::from_str::<NotionPage>(json).unwrap());
        assert_eq!(record.cover_url, "https://s3/cover.png");
    }

    #[test]
    fn test_create_properties() {
        let record = NewRecord {
            external_id: "27205".to_string(),
            title: "Inception".to_string(),
            year: 2010,
            rating: String::new(),
            watched_at: NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
            watch_count: 1,
            cover_url: "https://img/inception.jpg".to_string(),
        };

        let props = create_properties(&record);
        assert_eq!(props["Title"]["title"][0]["text"]["content"], "Inception");
        assert_eq!(props["MovieID"]["rich_text"][0]["text"]["content"], "27205");
        assert_eq!(props["Year"]["number"], 2010);
        assert!(props["Rating"]["select"].is_null());
        assert_eq!(props["LatestWatch"]["date"]["start"], "2024-02-10");
        assert_eq!(props["WatchCount"]["number"], 1);
        assert_eq!(
            props["MovieCover"]["files"][0]["external"]["url"],
            "https://img/inception.jpg"
        );
    }

    #[test]
    fn test_patch_properties_only_changed_fields() {
        let patch = RecordPatch {
            watched_at: None,
            watch_count: None,
            cover_url: Some("https://img/new.jpg".to_string()),
        };

        let props = patch_properties(&patch);
        let keys: Vec<_> = props.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["MovieCover".to_string()]);
    }
}
