pub mod memory;
pub mod supabase;

use crate::models::{Advertisement, HeaderRecord, Marketplace, StyleRecord};
use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use supabase::SupabaseStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    Deserialize(String),
    #[error("advertisement {0} not found")]
    NotFound(i64),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Advertisement rows, publish flags and the style/header records used for
/// descriptions. The pipeline's only write is flipping a publish flag.
#[async_trait]
pub trait AdvertisementStore: Send + Sync {
    /// Ready advertisements not yet published on `marketplace`, oldest first.
    async fn list_unpublished(
        &self,
        marketplace: Marketplace,
        user_id: Option<&str>,
    ) -> Result<Vec<Advertisement>, StoreError>;

    async fn set_published(
        &self,
        advertisement_id: i64,
        marketplace: Marketplace,
        published: bool,
    ) -> Result<(), StoreError>;

    async fn list_active_styles(&self) -> Result<Vec<StyleRecord>, StoreError>;

    async fn get_style_by_sub_type(&self, sub_type: &str)
    -> Result<Option<StyleRecord>, StoreError>;

    async fn list_active_headers(
        &self,
        marketplace: Marketplace,
    ) -> Result<Vec<HeaderRecord>, StoreError>;
}
