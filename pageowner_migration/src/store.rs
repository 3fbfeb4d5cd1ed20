//! The remote page collection as seen by the migration.

use std::fmt::Debug;

use async_trait::async_trait;
use pageowner_client::{Client, Page, PageList, PageUpdate, Space};

/// The four remote operations the migration depends on
///
/// Implemented for [`pageowner_client::Client`]. Every call is a single round trip; nothing is
/// cached between calls.
#[async_trait]
pub trait PageStore: Debug + Send + Sync {
    /// `GET /spaces?keys=K`
    async fn spaces_by_key(&self, key: &str) -> pageowner_client::Result<Vec<Space>>;

    /// `GET /pages?limit=N[&cursor=C]`
    async fn list_pages(
        &self,
        limit: usize,
        cursor: Option<&str>,
    ) -> pageowner_client::Result<PageList>;

    /// `GET /pages/{id}`
    async fn get_page(&self, id: &str) -> pageowner_client::Result<Page>;

    /// `PUT /pages/{id}`, conditioned on `update.version.number`
    async fn update_page(&self, id: &str, update: &PageUpdate) -> pageowner_client::Result<()>;
}

#[async_trait]
impl PageStore for Client {
    async fn spaces_by_key(&self, key: &str) -> pageowner_client::Result<Vec<Space>> {
        Self::spaces_by_key(self, key).await
    }

    async fn list_pages(
        &self,
        limit: usize,
        cursor: Option<&str>,
    ) -> pageowner_client::Result<PageList> {
        Self::list_pages(self, limit, cursor).await
    }

    async fn get_page(&self, id: &str) -> pageowner_client::Result<Page> {
        Self::get_page(self, id).await
    }

    async fn update_page(&self, id: &str, update: &PageUpdate) -> pageowner_client::Result<()> {
        Self::update_page(self, id, update).await
    }
}
