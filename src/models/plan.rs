use serde::Serialize;
use std::fmt::Display;

use super::{NewRecord, UpdateIntent};

/// Why a feed entry produced no write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The feed item carried no catalog id to join on
    MissingExternalId,
    /// The stored watch date could not be read
    UnparsableStoredDate,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingExternalId => write!(f, "missing external id"),
            SkipReason::UnparsableStoredDate => write!(f, "unparsable stored watch date"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    pub external_id: String,
    pub title: String,
    pub reason: SkipReason,
}

/// An external id held by more than one stored record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateExternalId {
    pub external_id: String,
    pub store_ids: Vec<String>,
}

/// Writes needed to bring the store in line with the feed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub to_create: Vec<NewRecord>,
    pub to_update: Vec<UpdateIntent>,
    /// Matched titles that need no write
    pub unchanged: usize,
    pub skipped: Vec<SkippedRecord>,
    pub conflicts: Vec<DuplicateExternalId>,
}

impl SyncPlan {
    /// True when applying the plan would not touch the store
    pub fn is_noop(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Update,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Create => write!(f, "create"),
            OperationKind::Update => write!(f, "update"),
        }
    }
}

/// A single write the store rejected or never answered
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationFailure {
    pub kind: OperationKind,
    pub external_id: String,
    pub title: String,
    pub cause: String,
}

/// Outcome of applying a plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    pub created: usize,
    pub updated: usize,
    pub failures: Vec<OperationFailure>,
}

impl ExecutionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failed_creates(&self) -> usize {
        self.count_failures(OperationKind::Create)
    }

    pub fn failed_updates(&self) -> usize {
        self.count_failures(OperationKind::Update)
    }

    /// Total number of writes attempted
    pub fn attempted(&self) -> usize {
        self.created + self.updated + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn count_failures(&self, kind: OperationKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(kind: OperationKind) -> OperationFailure {
        OperationFailure {
            kind,
            external_id: "1".to_string(),
            title: "Alien".to_string(),
            cause: "boom".to_string(),
        }
    }

    #[test]
    fn test_report_counters() {
        let report = ExecutionReport {
            created: 2,
            updated: 1,
            failures: vec![
                failure(OperationKind::Create),
                failure(OperationKind::Update),
                failure(OperationKind::Update),
            ],
        };

        assert_eq!(report.failed_creates(), 1);
        assert_eq!(report.failed_updates(), 2);
        assert_eq!(report.attempted(), 6);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_empty_plan_is_noop() {
        assert!(SyncPlan::default().is_noop());
        assert!(ExecutionReport::new().is_clean());
    }

    #[test]
    fn test_skip_reason_serialization() {
        let json = serde_json::to_string(&SkipReason::UnparsableStoredDate).unwrap();
        assert_eq!(json, "\"unparsable_stored_date\"");
    }
}
