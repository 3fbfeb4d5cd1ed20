//! Walk the full page collection and collect the pages owned by one identity.

use std::{collections::HashSet, num::NonZeroUsize};

use observability_deps::tracing::{debug, info, warn};
use pageowner_client::{Page, StatusCode};

use crate::store::PageStore;

/// Default number of results requested per page, the maximum the API allows
pub const DEFAULT_PAGE_LIMIT: NonZeroUsize = NonZeroUsize::new(100).unwrap();

/// Default ceiling on the number of result pages fetched in one scan
pub const DEFAULT_MAX_PAGES: NonZeroUsize = NonZeroUsize::new(10_000).unwrap();

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(
        "pagination exceeded the limit of {max_pages} result pages ({matched} matches so far), \
        the server kept returning a next link"
    )]
    PageLimitExceeded { max_pages: usize, matched: usize },

    #[error("unable to continue pagination after {pages_fetched} result pages: {source}")]
    Cursor {
        pages_fetched: usize,
        #[source]
        source: pageowner_client::Error,
    },
}

/// Which pages a scan keeps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerFilter {
    owner_id: String,
    space_id: Option<String>,
}

impl OwnerFilter {
    /// Keep pages owned by `owner_id`, in any space
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            space_id: None,
        }
    }

    /// Additionally require the page to live in the space with the given id
    pub fn in_space(mut self, space_id: impl Into<String>) -> Self {
        self.space_id = Some(space_id.into());
        self
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn space_id(&self) -> Option<&str> {
        self.space_id.as_deref()
    }

    pub fn matches(&self, page: &Page) -> bool {
        page.owner_id.as_deref() == Some(self.owner_id.as_str())
            && self
                .space_id
                .as_deref()
                .is_none_or(|space| page.space_id.as_deref() == Some(space))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanConfig {
    /// Results requested per `GET /pages` call
    pub page_limit: NonZeroUsize,
    /// Result pages fetched before giving up on a server that never stops paginating
    pub max_pages: NonZeroUsize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            page_limit: DEFAULT_PAGE_LIMIT,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Whether a scan saw the whole collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanCompletion {
    /// The last response carried no `next` link
    Complete,
    /// A page fetch failed, the matches only cover the result pages fetched before it
    Truncated {
        status: Option<StatusCode>,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    /// Matching pages in discovery order, without duplicates
    pub pages: Vec<Page>,
    /// Number of successful `GET /pages` calls
    pub pages_fetched: usize,
    pub completion: ScanCompletion,
}

impl ScanOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self.completion, ScanCompletion::Complete)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Fetch every result page, following `next` cursors, and keep the pages `filter` accepts
    ///
    /// A failed page fetch ends the scan with whatever was collected so far, flagged as
    /// [`ScanCompletion::Truncated`]. Following more than `max_pages` result pages, or a `next`
    /// link without a cursor, is an error.
    pub async fn scan<S>(&self, store: &S, filter: &OwnerFilter) -> Result<ScanOutcome, ScanError>
    where
        S: PageStore + ?Sized,
    {
        let mut pages = Vec::new();
        let mut seen = HashSet::new();
        let mut cursor: Option<String> = None;
        let mut pages_fetched = 0;

        loop {
            let list = match store
                .list_pages(self.config.page_limit.get(), cursor.as_deref())
                .await
            {
                Ok(list) => list,
                Err(e) => {
                    warn!(
                        pages_fetched,
                        matched = pages.len(),
                        error = %e,
                        "page fetch failed, scan result is partial"
                    );
                    return Ok(ScanOutcome {
                        pages,
                        pages_fetched,
                        completion: ScanCompletion::Truncated {
                            status: e.status(),
                            message: e.to_string(),
                        },
                    });
                }
            };
            pages_fetched += 1;

            let next = list
                .next_cursor()
                .map_err(|source| ScanError::Cursor {
                    pages_fetched,
                    source,
                })?;

            let before = pages.len();
            for page in list.results {
                if filter.matches(&page) && seen.insert(page.id.clone()) {
                    pages.push(page);
                }
            }
            debug!(
                page = pages_fetched,
                new_matches = pages.len() - before,
                "scanned result page"
            );

            match next {
                Some(next) if pages_fetched >= self.config.max_pages.get() => {
                    warn!(%next, pages_fetched, "giving up on pagination");
                    return Err(ScanError::PageLimitExceeded {
                        max_pages: self.config.max_pages.get(),
                        matched: pages.len(),
                    });
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        info!(
            pages_fetched,
            matched = pages.len(),
            owner = filter.owner_id(),
            space = ?filter.space_id(),
            "scan complete"
        );
        Ok(ScanOutcome {
            pages,
            pages_fetched,
            completion: ScanCompletion::Complete,
        })
    }
}
