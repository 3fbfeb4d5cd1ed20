//! Post-run accounting: counts, read-only verification, and the results file.

use std::{path::Path, time::Duration};

use observability_deps::tracing::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    mutator::MutationOutcome,
    snapshot::{SnapshotError, write_json},
    store::PageStore,
};

/// Default file name of the run summary
pub const DEFAULT_RESULTS_FILE: &str = "update_results.json";

/// A page whose ownership change was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPage {
    pub id: String,
    pub error: String,
}

/// What a batch of ownership changes achieved
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub success_count: usize,
    pub failure_count: usize,
    /// Pages re-read after the batch that now carry the new owner
    #[serde(rename = "updated_pages")]
    pub confirmed: Vec<String>,
    /// Pages whose write was accepted but that no longer show the new owner, or could not be
    /// re-read
    pub unconfirmed_pages: Vec<String>,
    pub failed_pages: Vec<FailedPage>,
}

impl RunSummary {
    /// Re-read every page that was changed successfully and check it is owned by `new_owner`
    ///
    /// Only reads: a page that fails verification is listed in `unconfirmed_pages`, it is never
    /// written a second time. `delay` is slept between re-reads.
    pub async fn verify<S>(
        store: &S,
        new_owner: &str,
        outcomes: &[MutationOutcome],
        delay: Duration,
    ) -> Self
    where
        S: PageStore + ?Sized,
    {
        let mut summary = Self::default();
        for outcome in outcomes {
            let failure = match &outcome.result {
                Ok(_) => {
                    summary.success_count += 1;
                    continue;
                }
                Err(e) => e,
            };
            summary.failure_count += 1;
            summary.failed_pages.push(FailedPage {
                id: outcome.page_id.clone(),
                error: failure.to_string(),
            });
        }

        let succeeded = outcomes.iter().filter(|o| o.succeeded());
        for (i, outcome) in succeeded.enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let id = &outcome.page_id;
            match store.get_page(id).await {
                Ok(page) if page.owner_id.as_deref() == Some(new_owner) => {
                    summary.confirmed.push(id.clone());
                }
                Ok(page) => {
                    warn!(page_id = %id, owner = ?page.owner_id, "page does not show the new owner");
                    summary.unconfirmed_pages.push(id.clone());
                }
                Err(e) => {
                    warn!(page_id = %id, error = %e, "unable to re-read page for verification");
                    summary.unconfirmed_pages.push(id.clone());
                }
            }
        }

        info!(
            succeeded = summary.success_count,
            failed = summary.failure_count,
            confirmed = summary.confirmed.len(),
            "verified ownership changes"
        );
        summary
    }

    /// Write the summary as pretty JSON, replacing any previous results file
    pub async fn write(&self, path: &Path) -> Result<(), SnapshotError> {
        write_json(path, self).await
    }
}
