//! Durable copies of the matched pages, written before anything is changed.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use observability_deps::tracing::{info, warn};
use pageowner_client::Page;
use serde::Serialize;
use tokio::{fs, io::AsyncWriteExt};

/// Default file name of the pre-migration snapshot
pub const DEFAULT_BACKUP_FILE: &str = "pages_backup.json";

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to serialize {path:?}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The matched pages plus enough context to tell which run produced them
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Snapshot<'a> {
    pub taken_at: DateTime<Utc>,
    pub source_owner: &'a str,
    pub space_id: Option<&'a str>,
    /// `false` if the scan that found these pages stopped early
    pub complete: bool,
    pub pages: &'a [Page],
}

impl<'a> Snapshot<'a> {
    pub fn new(
        source_owner: &'a str,
        space_id: Option<&'a str>,
        complete: bool,
        pages: &'a [Page],
    ) -> Self {
        Self {
            taken_at: Utc::now(),
            source_owner,
            space_id,
            complete,
            pages,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Write `snapshot` to the configured path, replacing any previous snapshot
    ///
    /// Returns once the file is synced and renamed into place.
    pub async fn write(&self, snapshot: &Snapshot<'_>) -> Result<(), SnapshotError> {
        write_json(&self.path, snapshot).await?;
        info!(
            path = %self.path.display(),
            pages = snapshot.pages.len(),
            complete = snapshot.complete,
            "wrote snapshot"
        );
        Ok(())
    }
}

/// Serialize `value` as pretty JSON into a temporary sibling of `path`, sync it, and rename it
/// over `path`
///
/// The temporary file is removed again if any step fails.
pub(crate) async fn write_json<T>(path: &Path, value: &T) -> Result<(), SnapshotError>
where
    T: Serialize + Sync + ?Sized,
{
    let json = serde_json::to_vec_pretty(value).map_err(|source| SnapshotError::Serialize {
        path: path.to_owned(),
        source,
    })?;

    let tmp_path = tmp_path(path);
    if let Err(source) = replace_with(&tmp_path, path, &json).await {
        if let Err(e) = fs::remove_file(&tmp_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %tmp_path.display(), error = %e, "failed to remove temporary file");
            }
        }
        return Err(SnapshotError::Io {
            path: path.to_owned(),
            source,
        });
    }
    Ok(())
}

async fn replace_with(tmp_path: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp_path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(tmp_path, path).await?;
    sync_parent(path).await
}

/// `pages_backup.json` is staged as `pages_backup.json.tmp`
fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_owned();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Make the rename itself durable
#[cfg(unix)]
async fn sync_parent(path: &Path) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::File::open(parent).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
