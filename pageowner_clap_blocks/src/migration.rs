//! CLI config for how a migration walks and changes the page collection.

use std::{num::NonZeroUsize, path::PathBuf, time::Duration};

/// Pagination, pacing and artifact settings for a migration run
#[derive(Debug, Clone, clap::Parser)]
pub struct MigrationConfig {
    /// Number of pages requested per listing call.
    #[clap(
        long = "page-limit",
        env = "PAGEOWNER_PAGE_LIMIT",
        default_value = "100",
        action
    )]
    pub page_limit: NonZeroUsize,

    /// Give up once this many listing calls were made and the server still
    /// returns a next link.
    #[clap(
        long = "max-pages",
        env = "PAGEOWNER_MAX_PAGES",
        default_value = "10000",
        action
    )]
    pub max_pages: NonZeroUsize,

    /// Pause after each page update, e.g. `500ms` or `2s`.
    #[clap(
        long = "request-delay",
        env = "PAGEOWNER_REQUEST_DELAY",
        default_value = "500ms",
        value_parser = humantime::parse_duration
    )]
    pub request_delay: Duration,

    /// Number of space keys to try before giving up.
    #[clap(long = "max-space-attempts", default_value = "3", action)]
    pub max_space_attempts: NonZeroUsize,

    /// Where the matched pages are saved before any of them is changed.
    #[clap(long = "backup-file", default_value = "pages_backup.json", action)]
    pub backup_file: PathBuf,

    /// Where the outcome of the run is saved.
    #[clap(long = "results-file", default_value = "update_results.json", action)]
    pub results_file: PathBuf,

    /// Continue with the pages found so far if listing pages fails part way.
    ///
    /// By default a listing failure aborts the run before anything is changed.
    #[clap(long = "allow-partial-scan", action)]
    pub allow_partial_scan: bool,
}
