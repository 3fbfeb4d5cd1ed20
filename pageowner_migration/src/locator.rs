//! Resolve a human-readable space key to the space id pages refer to.

use observability_deps::tracing::{debug, info};

use crate::store::PageStore;

#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[error("space key must not be empty")]
    EmptyKey,

    #[error("failed to look up space '{key}': {source}")]
    Lookup {
        key: String,
        #[source]
        source: pageowner_client::Error,
    },
}

/// Result of a space lookup that reached the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceLookup {
    Found { id: String },
    NotFound,
}

/// Look up the id of the space with the given key
///
/// One round trip, no retries. An empty result from the server is [`SpaceLookup::NotFound`],
/// which callers may recover from by asking for another key. Transport and API errors are
/// returned as [`LocateError::Lookup`].
pub async fn locate_space<S>(store: &S, key: &str) -> Result<SpaceLookup, LocateError>
where
    S: PageStore + ?Sized,
{
    let key = key.trim();
    if key.is_empty() {
        return Err(LocateError::EmptyKey);
    }
    let spaces = store
        .spaces_by_key(key)
        .await
        .map_err(|source| LocateError::Lookup {
            key: key.to_owned(),
            source,
        })?;
    debug!(key, results = spaces.len(), "space lookup returned");

    // the API matches keys exactly, so the first result is the space we asked for
    Ok(match spaces.into_iter().next() {
        Some(space) => {
            info!(key, space_id = %space.id, "resolved space key");
            SpaceLookup::Found { id: space.id }
        }
        None => SpaceLookup::NotFound,
    })
}
