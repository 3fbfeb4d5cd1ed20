//! Drive one ownership migration from discovery to the results file.

use std::{io, num::NonZeroUsize, path::PathBuf, time::Duration};

use observability_deps::tracing::{info, warn};
use pageowner_client::StatusCode;

use crate::{
    locator::{LocateError, SpaceLookup, locate_space},
    mutator::{DEFAULT_CHANGE_MESSAGE, Mutator},
    operator::Operator,
    scanner::{OwnerFilter, ScanCompletion, ScanConfig, ScanError, Scanner},
    snapshot::{DEFAULT_BACKUP_FILE, Snapshot, SnapshotError, SnapshotWriter},
    summary::{DEFAULT_RESULTS_FILE, RunSummary},
    store::PageStore,
};

/// Pause after every page update, a fixed throttle rather than a backoff policy
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(500);

/// Space keys tried before giving up on a scoped run
pub const DEFAULT_MAX_SPACE_ATTEMPTS: NonZeroUsize = NonZeroUsize::new(3).unwrap();

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error(transparent)]
    Locate(#[from] LocateError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(
        "page scan stopped after {pages_fetched} result pages with {matched} matches \
        and partial scans are not allowed: {message}"
    )]
    ScanTruncated {
        pages_fetched: usize,
        matched: usize,
        status: Option<StatusCode>,
        message: String,
    },

    #[error("failed to write snapshot, no pages were changed: {0}")]
    Snapshot(#[source] SnapshotError),

    #[error("failed to read operator input: {0}")]
    Prompt(#[from] io::Error),

    #[error("pages were updated but the results could not be saved: {0}")]
    Results(#[source] SnapshotError),
}

pub type Result<T, E = MigrationError> = std::result::Result<T, E>;

/// Which part of the page collection is searched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    AllSpaces,
    /// Only pages in the space with this key
    Space { key: String },
}

/// Everything a run needs to know, fixed before it starts
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    pub source_owner: String,
    pub target_owner: String,
    pub scope: Scope,
    pub scan: ScanConfig,
    pub request_delay: Duration,
    pub max_space_attempts: NonZeroUsize,
    pub backup_path: PathBuf,
    pub results_path: PathBuf,
    /// Continue with the matches of a scan that stopped early instead of failing the run
    pub allow_partial_scan: bool,
    pub change_message: String,
}

impl MigrationPlan {
    pub fn new(
        source_owner: impl Into<String>,
        target_owner: impl Into<String>,
        scope: Scope,
    ) -> Self {
        Self {
            source_owner: source_owner.into(),
            target_owner: target_owner.into(),
            scope,
            scan: ScanConfig::default(),
            request_delay: DEFAULT_REQUEST_DELAY,
            max_space_attempts: DEFAULT_MAX_SPACE_ATTEMPTS,
            backup_path: PathBuf::from(DEFAULT_BACKUP_FILE),
            results_path: PathBuf::from(DEFAULT_RESULTS_FILE),
            allow_partial_scan: false,
            change_message: DEFAULT_CHANGE_MESSAGE.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discover,
    AwaitConfirmation,
    Snapshot,
    Mutate,
    Summarize,
}

/// Why a run stopped before changing anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// None of the space keys tried exist
    SpaceNotFound { attempts: usize },
    /// The operator did not confirm the change set
    Declined,
    /// No page is owned by the source owner
    NothingToDo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Aborted(AbortReason),
    Completed(RunSummary),
}

/// Runs `Discover -> AwaitConfirmation -> Snapshot -> Mutate -> Summarize`
///
/// Discovery failures end the run before anything is written. Once the snapshot is on disk,
/// each page is updated in turn and a failed page does not stop the batch.
#[derive(Debug)]
pub struct Orchestrator<'a, S: ?Sized, O> {
    store: &'a S,
    plan: &'a MigrationPlan,
    operator: O,
}

impl<'a, S, O> Orchestrator<'a, S, O>
where
    S: PageStore + ?Sized,
    O: Operator,
{
    pub fn new(store: &'a S, plan: &'a MigrationPlan, operator: O) -> Self {
        Self {
            store,
            plan,
            operator,
        }
    }

    pub async fn run(mut self) -> Result<RunOutcome> {
        let plan = self.plan;
        let store = self.store;

        enter(Phase::Discover);
        let space_id = match &plan.scope {
            Scope::AllSpaces => None,
            Scope::Space { key } => match self.locate(key).await? {
                Ok(id) => Some(id),
                Err(reason) => return Ok(self.abort(reason)),
            },
        };
        let filter = match &space_id {
            Some(id) => OwnerFilter::new(&plan.source_owner).in_space(id),
            None => OwnerFilter::new(&plan.source_owner),
        };

        self.operator.say(&format!(
            "Finding all pages owned by {}...",
            plan.source_owner
        ));
        let scan = Scanner::new(plan.scan).scan(store, &filter).await?;
        if let ScanCompletion::Truncated { status, message } = &scan.completion {
            if !plan.allow_partial_scan {
                return Err(MigrationError::ScanTruncated {
                    pages_fetched: scan.pages_fetched,
                    matched: scan.pages.len(),
                    status: *status,
                    message: message.clone(),
                });
            }
            self.operator.say(&format!(
                "WARNING: the page scan stopped after {} result pages ({message}), \
                pages owned by {} beyond that point will not be updated",
                scan.pages_fetched, plan.source_owner
            ));
        }

        let pages = scan.pages.as_slice();
        if pages.is_empty() {
            self.operator
                .say(&format!("No pages found owned by {}", plan.source_owner));
            return Ok(self.abort(AbortReason::NothingToDo));
        }

        enter(Phase::AwaitConfirmation);
        self.operator.say(&format!(
            "Found {} pages owned by {}",
            pages.len(),
            plan.source_owner
        ));
        self.operator.say("Pages to be updated:");
        for page in pages {
            self.operator.say(&format!(
                "Title: {}, ID: {}, URL: {}",
                page.title,
                page.id,
                page.web_link()
            ));
        }
        let question = format!(
            "\nDo you want to update all {} pages to the new owner {}?",
            pages.len(),
            plan.target_owner
        );
        if !self.operator.confirm(&question)? {
            self.operator.say("Update operation cancelled.");
            return Ok(self.abort(AbortReason::Declined));
        }

        enter(Phase::Snapshot);
        let snapshot = Snapshot::new(
            &plan.source_owner,
            space_id.as_deref(),
            scan.is_complete(),
            pages,
        );
        SnapshotWriter::new(&plan.backup_path)
            .write(&snapshot)
            .await
            .map_err(MigrationError::Snapshot)?;
        self.operator.say(&format!(
            "Created backup in {}",
            plan.backup_path.display()
        ));

        enter(Phase::Mutate);
        self.operator.say(&format!(
            "\nUpdating page owners from {} to {}...",
            plan.source_owner, plan.target_owner
        ));
        let mutator =
            Mutator::new(store, &plan.target_owner).with_change_message(&plan.change_message);
        let mut outcomes = Vec::with_capacity(pages.len());
        for (i, page) in pages.iter().enumerate() {
            let outcome = mutator.reassign(&page.id).await;
            let status = if outcome.succeeded() {
                "SUCCESS"
            } else {
                "FAILED"
            };
            self.operator.say(&format!(
                "Updating {}/{}: {} ({})... {status}",
                i + 1,
                pages.len(),
                page.title,
                page.id
            ));
            if let Err(e) = &outcome.result {
                self.operator.say(&format!("  {e}"));
            }
            outcomes.push(outcome);

            if !plan.request_delay.is_zero() {
                tokio::time::sleep(plan.request_delay).await;
            }
        }

        enter(Phase::Summarize);
        let summary =
            RunSummary::verify(store, &plan.target_owner, &outcomes, plan.request_delay).await;
        self.operator.say("\nUpdate completed!");
        self.operator.say(&format!(
            "Successfully updated: {} pages",
            summary.success_count
        ));
        self.operator
            .say(&format!("Failed updates: {} pages", summary.failure_count));
        if !summary.unconfirmed_pages.is_empty() {
            self.operator.say(&format!(
                "Not showing the new owner on re-read: {}",
                summary.unconfirmed_pages.join(", ")
            ));
        }
        summary
            .write(&plan.results_path)
            .await
            .map_err(MigrationError::Results)?;
        self.operator.say(&format!(
            "Saved results in {}",
            plan.results_path.display()
        ));

        Ok(RunOutcome::Completed(summary))
    }

    /// Resolve `key`, asking the operator for other keys while it is not found
    ///
    /// Gives up after `max_space_attempts` keys or when the operator does not want to try
    /// another one.
    async fn locate(&mut self, key: &str) -> Result<Result<String, AbortReason>> {
        let max_attempts = self.plan.max_space_attempts.get();
        let mut key = key.to_owned();
        let mut attempts = 0;

        loop {
            attempts += 1;
            match locate_space(self.store, &key).await {
                Ok(SpaceLookup::Found { id }) => {
                    self.operator.say(&format!(
                        "Found space ID: {id} for space key: {}",
                        key.trim()
                    ));
                    return Ok(Ok(id));
                }
                Ok(SpaceLookup::NotFound) => {
                    self.operator
                        .say(&format!("Space with key '{}' not found", key.trim()));
                }
                Err(LocateError::EmptyKey) => self.operator.say("The space key must not be empty"),
                Err(e) => return Err(e.into()),
            }

            if attempts >= max_attempts
                || !self
                    .operator
                    .confirm("Do you want to try a different space key?")?
            {
                self.operator.say("Operation cancelled.");
                return Ok(Err(AbortReason::SpaceNotFound { attempts }));
            }
            key = self.operator.ask("Please enter the space key: ")?;
        }
    }

    fn abort(&self, reason: AbortReason) -> RunOutcome {
        warn!(?reason, "migration aborted, no pages were changed");
        RunOutcome::Aborted(reason)
    }
}

fn enter(phase: Phase) {
    info!(?phase, "migration phase");
}
