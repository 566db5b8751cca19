use crate::{
    models::{ExecutionReport, OperationFailure, OperationKind, SyncPlan},
    services::providers::RecordStore,
};

/// Apply a plan against the store: all creates, then all updates.
///
/// Writes are issued one at a time. A failed write is logged and recorded in
/// the report; the remaining writes still run.
pub async fn execute(plan: &SyncPlan, store: &dyn RecordStore) -> ExecutionReport {
    let mut report = ExecutionReport::new();

    for record in &plan.to_create {
        match store.create(record).await {
            Ok(store_id) => {
                tracing::info!(
                    external_id = %record.external_id,
                    title = %record.title,
                    store_id = %store_id,
                    "Created record"
                );
                report.created += 1;
            }
            Err(e) => {
                tracing::error!(
                    external_id = %record.external_id,
                    title = %record.title,
                    error = %e,
                    store = store.name(),
                    "Create failed"
                );
                report.failures.push(OperationFailure {
                    kind: OperationKind::Create,
                    external_id: record.external_id.clone(),
                    title: record.title.clone(),
                    cause: e.to_string(),
                });
            }
        }
    }

    for intent in &plan.to_update {
        match store.update(&intent.store_id, &intent.patch).await {
            Ok(()) => {
                tracing::info!(
                    external_id = %intent.external_id,
                    title = %intent.title,
                    store_id = %intent.store_id,
                    patch = ?intent.patch,
                    "Updated record"
                );
                report.updated += 1;
            }
            Err(e) => {
                tracing::error!(
                    external_id = %intent.external_id,
                    store_id = %intent.store_id,
                    error = %e,
                    store = store.name(),
                    "Update failed"
                );
                report.failures.push(OperationFailure {
                    kind: OperationKind::Update,
                    external_id: intent.external_id.clone(),
                    title: intent.title.clone(),
                    cause: e.to_string(),
                });
            }
        }
    }

    if !report.is_clean() {
        tracing::warn!(
            created = report.created,
            updated = report.updated,
            failed = report.failures.len(),
            "Partial write failure"
        );
    }

    report
}
