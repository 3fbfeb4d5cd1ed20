//! Wire types for the `pages` and `spaces` endpoints of the wiki REST API (v2).
//!
//! Only the fields the migration reads or writes are typed. Everything else the server sends is
//! kept verbatim in the `other` maps, so a serialized [`Page`] round-trips the full remote
//! representation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::{Error, Result};

/// Name of the query parameter that carries the continuation token in `next` links
pub const CURSOR_PARAM: &str = "cursor";

/// A single wiki page as returned by `GET /pages` and `GET /pages/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "ownerId", default)]
    pub owner_id: Option<String>,
    #[serde(rename = "spaceId", default)]
    pub space_id: Option<String>,
    #[serde(default)]
    pub version: Version,
    #[serde(rename = "_links", default)]
    pub links: Links,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Page {
    /// The browser link of the page, or an empty string if the server did not send one
    pub fn web_link(&self) -> &str {
        self.links.webui.as_deref().unwrap_or_default()
    }
}

/// The version block of a [`Page`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Version {
    #[serde(default)]
    pub number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// The `_links` block found on pages and on list responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Links {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webui: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// One page of results from `GET /pages`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageList {
    #[serde(default)]
    pub results: Vec<Page>,
    #[serde(rename = "_links", default)]
    pub links: Links,
}

impl PageList {
    /// The `next` link of the response, if present and not empty
    pub fn next_link(&self) -> Option<&str> {
        self.links.next.as_deref().filter(|link| !link.trim().is_empty())
    }

    /// Extract the continuation cursor for the following request
    ///
    /// Returns `Ok(None)` when this is the last page. A non-empty `next` link without a cursor
    /// parameter is an error: following it would request the same page again.
    pub fn next_cursor(&self) -> Result<Option<String>> {
        self.next_link().map(cursor_from_link).transpose()
    }
}

/// Extract the value of the [`CURSOR_PARAM`] query parameter from a `next` link
///
/// The link may be absolute or relative to the API host, and the cursor may appear anywhere in
/// the query string.
pub fn cursor_from_link(link: &str) -> Result<String> {
    // Relative links only need some base to resolve against, the host is never used.
    let placeholder = Url::parse("http://localhost/")?;
    let url = placeholder.join(link.trim())?;
    url.query_pairs()
        .find(|(name, value)| name == CURSOR_PARAM && !value.is_empty())
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| Error::MalformedNextLink {
            link: link.to_owned(),
        })
}

/// A space as returned by `GET /spaces`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct SpaceList {
    #[serde(default)]
    pub(crate) results: Vec<Space>,
}

/// Request body for `PUT /pages/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageUpdate {
    pub id: String,
    pub status: String,
    pub title: String,
    #[serde(rename = "ownerId")]
    pub owner_id: String,
    pub version: VersionUpdate,
}

/// The version block of a [`PageUpdate`]
///
/// The server accepts the update only if `number` is exactly one more than the version it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionUpdate {
    pub number: u64,
    pub message: String,
}
