pub mod executor;
pub mod providers;
pub mod reconciler;
pub mod retry;
pub mod sync;

pub use executor::execute;
pub use reconciler::reconcile;
pub use sync::{SyncOptions, SyncService, SyncSummary};
