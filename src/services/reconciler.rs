//! Feed-to-store reconciliation.
//!
//! Joins feed entries against stored records by external id and decides
//! which titles to create and which stored records to patch. The function is
//! pure: stored records are never mutated, pending writes are returned as
//! values that reference store ids.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate};

use crate::models::{
    DuplicateExternalId, FeedRecord, NewRecord, RecordPatch, SkipReason, SkippedRecord,
    StoredRecord, SyncPlan, UpdateIntent, DATE_FORMAT,
};

/// Compute the writes that bring `stored` in line with `feed`.
///
/// Output lists follow the order in which external ids first appear in the
/// feed, and each id yields at most one create or one update.
pub fn reconcile(feed: &[FeedRecord], stored: &[StoredRecord]) -> SyncPlan {
    let mut plan = SyncPlan::default();
    let (index, duplicates) = index_stored(stored);

    for group in group_feed(feed, &mut plan.skipped) {
        let external_id = group.external_id;
        if duplicates.contains(&external_id) {
            continue;
        }

        match index.get(external_id) {
            None => plan.to_create.push(new_record(&group)),
            Some(existing) => match stored_watch_date(existing) {
                Ok(last_watch) => {
                    let patch = diff(existing, last_watch, &group);
                    if patch.is_empty() {
                        plan.unchanged += 1;
                    } else {
                        plan.to_update.push(UpdateIntent {
                            store_id: existing.store_id.clone(),
                            external_id: existing.external_id.clone(),
                            title: existing.title.clone(),
                            patch,
                        });
                    }
                }
                Err(raw) => {
                    tracing::warn!(
                        external_id = %external_id,
                        store_id = %existing.store_id,
                        stored_date = %raw,
                        "Skipping update: stored watch date is unparsable"
                    );
                    plan.skipped.push(SkippedRecord {
                        external_id: external_id.to_string(),
                        title: existing.title.clone(),
                        reason: SkipReason::UnparsableStoredDate,
                    });
                }
            },
        }
    }

    plan.conflicts = duplicates
        .iter()
        .map(|external_id| DuplicateExternalId {
            external_id: external_id.to_string(),
            store_ids: stored
                .iter()
                .filter(|r| r.external_id == *external_id)
                .map(|r| r.store_id.clone())
                .collect(),
        })
        .collect();

    for conflict in &plan.conflicts {
        tracing::error!(
            external_id = %conflict.external_id,
            store_ids = ?conflict.store_ids,
            "External id is stored more than once; leaving it untouched"
        );
    }

    plan
}

/// Lookup by external id, plus the ids held by more than one record
/// (in order of first appearance)
fn index_stored(stored: &[StoredRecord]) -> (HashMap<&str, &StoredRecord>, Vec<&str>) {
    let mut index: HashMap<&str, &StoredRecord> = HashMap::with_capacity(stored.len());
    let mut duplicates = Vec::new();

    for record in stored {
        let key = record.external_id.as_str();
        if key.is_empty() {
            tracing::warn!(
                store_id = %record.store_id,
                title = %record.title,
                "Stored record has no external id; it cannot be joined"
            );
            continue;
        }

        if index.insert(key, record).is_some() && !duplicates.contains(&key) {
            duplicates.push(key);
        }
    }

    (index, duplicates)
}

/// Every feed entry for one external id
struct FeedGroup<'a> {
    external_id: &'a str,
    /// Most recent entry; the first listed wins a tie
    newest: &'a FeedRecord,
    /// Distinct watch dates, so a diary date listed twice counts once
    dates: BTreeSet<NaiveDate>,
}

impl<'a> FeedGroup<'a> {
    fn new(record: &'a FeedRecord) -> Self {
        Self {
            external_id: record.external_id.as_str(),
            newest: record,
            dates: BTreeSet::from([record.watched_at]),
        }
    }

    fn add(&mut self, record: &'a FeedRecord) {
        self.dates.insert(record.watched_at);
        if record.watched_at > self.newest.watched_at {
            self.newest = record;
        }
    }
}

/// Feed entries grouped by external id, in order of first appearance.
/// Entries without an id are recorded as skipped.
fn group_feed<'a>(
    feed: &'a [FeedRecord],
    skipped: &mut Vec<SkippedRecord>,
) -> Vec<FeedGroup<'a>> {
    let mut groups: Vec<FeedGroup<'a>> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for record in feed {
        let key = record.external_id.as_str();
        if key.is_empty() {
            tracing::warn!(title = %record.title, "Feed entry has no external id; skipping");
            skipped.push(SkippedRecord {
                external_id: String::new(),
                title: record.title.clone(),
                reason: SkipReason::MissingExternalId,
            });
            continue;
        }

        match positions.get(key).and_then(|&pos| groups.get_mut(pos)) {
            Some(group) => group.add(record),
            None => {
                positions.insert(key, groups.len());
                groups.push(FeedGroup::new(record));
            }
        }
    }

    groups
}

fn watch_total(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

fn new_record(group: &FeedGroup<'_>) -> NewRecord {
    let newest = group.newest;

    NewRecord {
        external_id: group.external_id.to_string(),
        title: newest.title.clone(),
        year: parse_year(&newest.year, group.external_id),
        rating: newest.rating.clone(),
        watched_at: newest.watched_at,
        watch_count: watch_total(group.dates.len()),
        cover_url: newest.cover_url.clone(),
    }
}

/// Field changes for a matched record. Watch date and count move together;
/// the cover is tracked on its own.
fn diff(
    existing: &StoredRecord,
    last_watch: Option<NaiveDate>,
    group: &FeedGroup<'_>,
) -> RecordPatch {
    let newest = group.newest;
    let mut patch = RecordPatch::default();

    let new_watches = group
        .dates
        .iter()
        .filter(|date| last_watch.map_or(true, |last| **date > last))
        .count();

    if new_watches > 0 {
        patch.watched_at = Some(newest.watched_at);
        let added = watch_total(new_watches);
        patch.watch_count = Some(existing.watch_count.saturating_add(added));
    }

    if !newest.cover_url.is_empty() && newest.cover_url != existing.cover_url {
        patch.cover_url = Some(newest.cover_url.clone());
    }

    patch
}

/// Parse the stored watch date. `Ok(None)` means no date is on record;
/// `Err` carries the raw text that could not be read.
fn stored_watch_date(record: &StoredRecord) -> Result<Option<NaiveDate>, String> {
    match record.watched_at.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_store_date(raw).map(Some).ok_or_else(|| raw.to_string()),
    }
}

/// Store dates come back either as RFC 3339 datetimes
/// (`2023-06-01T00:00:00.000+00:00`) or as plain dates (`2023-06-01`)
pub fn parse_store_date(raw: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDate::parse_from_str(raw, DATE_FORMAT))
        .ok()
}

/// Feed years are free text; anything unreadable becomes 0
fn parse_year(raw: &str, external_id: &str) -> i32 {
    match raw.trim().parse::<i32>() {
        Ok(year) => year,
        Err(e) => {
            tracing::warn!(
                external_id = %external_id,
                year = %raw,
                error = %e,
                "Unparsable year; defaulting to 0"
            );
            0
        }
    }
}
