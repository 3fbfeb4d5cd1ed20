//! Reassign the owner of a single page under the server's optimistic-concurrency rules.

use observability_deps::tracing::{debug, warn};
use pageowner_client::{Page, PageUpdate, StatusCode, VersionUpdate};

use crate::store::PageStore;

/// Version message attached to every ownership change
pub const DEFAULT_CHANGE_MESSAGE: &str = "Updating page owner via pageowner";

/// Why a single page could not be reassigned
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationFailure {
    #[error("failed to read current version{}: {message}", fmt_status(.status))]
    Read {
        status: Option<StatusCode>,
        message: String,
    },

    #[error("version conflict [{}], the page changed since it was read: {message}", StatusCode::CONFLICT)]
    Conflict { message: String },

    #[error("update rejected{}: {message}", fmt_status(.status))]
    Write {
        status: Option<StatusCode>,
        message: String,
    },
}

fn fmt_status(status: &Option<StatusCode>) -> String {
    status.map(|s| format!(" [{s}]")).unwrap_or_default()
}

impl MutationFailure {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Read { status, .. } | Self::Write { status, .. } => *status,
            Self::Conflict { .. } => Some(StatusCode::CONFLICT),
        }
    }

    fn read(e: pageowner_client::Error) -> Self {
        Self::Read {
            status: e.status(),
            message: error_body(e),
        }
    }

    fn write(e: pageowner_client::Error) -> Self {
        if e.is_conflict() {
            Self::Conflict {
                message: error_body(e),
            }
        } else {
            Self::Write {
                status: e.status(),
                message: error_body(e),
            }
        }
    }
}

/// The server's response body for API errors, the full error text otherwise
fn error_body(e: pageowner_client::Error) -> String {
    match e {
        pageowner_client::Error::ApiError { message, .. } => message,
        other => other.to_string(),
    }
}

/// Result of one [`Mutator::reassign`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub page_id: String,
    /// The version number written on success
    pub result: Result<u64, MutationFailure>,
}

impl MutationOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Build the `PUT` body that moves `page` to `new_owner`
///
/// Status and title are carried over unchanged and the version is bumped by exactly one, so the
/// server only accepts it if nobody wrote to the page since it was read. A page read without a
/// status or title, or at the last representable version, cannot be written back.
pub fn ownership_update(
    page: &Page,
    new_owner: &str,
    message: &str,
) -> Result<PageUpdate, MutationFailure> {
    let incomplete = |field: &str| MutationFailure::Read {
        status: None,
        message: format!("page {} was returned without a {field}", page.id),
    };
    if page.status.is_empty() {
        return Err(incomplete("status"));
    }
    if page.title.is_empty() {
        return Err(incomplete("title"));
    }
    let number = page
        .version
        .number
        .checked_add(1)
        .ok_or_else(|| MutationFailure::Read {
            status: None,
            message: format!(
                "page {} is at version {}, which cannot be incremented",
                page.id, page.version.number
            ),
        })?;

    Ok(PageUpdate {
        id: page.id.clone(),
        status: page.status.clone(),
        title: page.title.clone(),
        owner_id: new_owner.to_owned(),
        version: VersionUpdate {
            number,
            message: message.to_owned(),
        },
    })
}

#[derive(Debug)]
pub struct Mutator<'a, S: ?Sized> {
    store: &'a S,
    new_owner: &'a str,
    change_message: &'a str,
}

impl<'a, S> Mutator<'a, S>
where
    S: PageStore + ?Sized,
{
    pub fn new(store: &'a S, new_owner: &'a str) -> Self {
        Self {
            store,
            new_owner,
            change_message: DEFAULT_CHANGE_MESSAGE,
        }
    }

    pub fn with_change_message(mut self, change_message: &'a str) -> Self {
        self.change_message = change_message;
        self
    }

    /// Move the page with `page_id` to the new owner
    ///
    /// Reads the page to learn its current version, then writes it back with the new owner and
    /// the next version number. A failed read means no write is attempted. Nothing is retried:
    /// calling this again re-reads the page, so repeating a failed or successful call is safe.
    pub async fn reassign(&self, page_id: &str) -> MutationOutcome {
        let result = self.try_reassign(page_id).await;
        if let Err(e) = &result {
            warn!(page_id, error = %e, "page ownership change failed");
        }
        MutationOutcome {
            page_id: page_id.to_owned(),
            result,
        }
    }

    async fn try_reassign(&self, page_id: &str) -> Result<u64, MutationFailure> {
        let current = self
            .store
            .get_page(page_id)
            .await
            .map_err(MutationFailure::read)?;

        let update = ownership_update(&current, self.new_owner, self.change_message)?;
        let version = update.version.number;
        self.store
            .update_page(page_id, &update)
            .await
            .map_err(MutationFailure::write)?;

        debug!(page_id, version, new_owner = self.new_owner, "page reassigned");
        Ok(version)
    }
}
