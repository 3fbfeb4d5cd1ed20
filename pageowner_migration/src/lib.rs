//! Move every wiki page owned by one account to another account.
//!
//! A run finds the pages (optionally within one space), asks the operator to confirm, writes a
//! snapshot of the pages, and then changes the owner of each page in turn, one optimistic
//! concurrency round trip per page.
pub mod locator;
pub mod mutator;
pub mod operator;
pub mod orchestrator;
pub mod scanner;
pub mod snapshot;
pub mod store;
pub mod summary;

pub use locator::{LocateError, SpaceLookup, locate_space};
pub use mutator::{MutationFailure, MutationOutcome, Mutator};
pub use operator::{Operator, is_affirmative};
pub use orchestrator::{
    AbortReason, MigrationError, MigrationPlan, Orchestrator, Phase, RunOutcome, Scope,
};
pub use scanner::{OwnerFilter, ScanCompletion, ScanConfig, ScanError, ScanOutcome, Scanner};
pub use snapshot::{Snapshot, SnapshotError, SnapshotWriter};
pub use store::PageStore;
pub use summary::{FailedPage, RunSummary};
