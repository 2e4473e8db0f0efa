use super::{AdvertisementStore, StoreError};
use crate::mapping::normalize_key;
use crate::models::{Advertisement, HeaderRecord, Marketplace, StyleRecord};
use async_trait::async_trait;
use serde::Deserialize;
use std::{path::Path, sync::Arc};
use tokio::sync::Mutex;

#[derive(Debug, Default, Deserialize)]
struct Snapshot {
    #[serde(default)]
    advertisements: Vec<Advertisement>,
    #[serde(default)]
    styles: Vec<StyleRecord>,
    #[serde(default)]
    headers: Vec<HeaderRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Bare(Vec<Advertisement>),
    Full(Snapshot),
}

#[derive(Debug, Default)]
struct MemoryState {
    snapshot: Snapshot,
    publish_calls: Vec<(i64, Marketplace, bool)>,
}

/// Store backed by a JSON file or test fixtures. Writes stay in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    auxiliary_down: bool,
}

impl MemoryStore {
    pub fn new(advertisements: Vec<Advertisement>) -> Self {
        Self::with_records(advertisements, Vec::new(), Vec::new())
    }

    pub fn with_records(
        advertisements: Vec<Advertisement>,
        styles: Vec<StyleRecord>,
        headers: Vec<HeaderRecord>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                snapshot: Snapshot {
                    advertisements,
                    styles,
                    headers,
                },
                publish_calls: Vec::new(),
            })),
            auxiliary_down: false,
        }
    }

    /// Accepts either `{"advertisements": [..], "styles": [..], "headers": [..]}`
    /// or a bare array of advertisements.
    pub fn from_json_file(path: &Path) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| StoreError::Unavailable(format!("{}: {err}", path.display())))?;
        let file: SnapshotFile =
            serde_json::from_str(&raw).map_err(|err| StoreError::Deserialize(err.to_string()))?;
        let snapshot = match file {
            SnapshotFile::Full(snapshot) => snapshot,
            SnapshotFile::Bare(advertisements) => Snapshot {
                advertisements,
                ..Snapshot::default()
            },
        };
        Ok(Self::with_records(
            snapshot.advertisements,
            snapshot.styles,
            snapshot.headers,
        ))
    }

    /// Style and header lookups fail, as when those tables are unreachable.
    pub fn without_auxiliary(mut self) -> Self {
        self.auxiliary_down = true;
        self
    }

    pub async fn publish_calls(&self) -> Vec<(i64, Marketplace, bool)> {
        self.state.lock().await.publish_calls.clone()
    }

    pub async fn advertisement(&self, id: i64) -> Option<Advertisement> {
        self.state
            .lock()
            .await
            .snapshot
            .advertisements
            .iter()
            .find(|ad| ad.id == id)
            .cloned()
    }

    fn check_auxiliary(&self) -> Result<(), StoreError> {
        if self.auxiliary_down {
            return Err(StoreError::Unavailable("auxiliary tables offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AdvertisementStore for MemoryStore {
    async fn list_unpublished(
        &self,
        marketplace: Marketplace,
        user_id: Option<&str>,
    ) -> Result<Vec<Advertisement>, StoreError> {
        let state = self.state.lock().await;
        let mut ads: Vec<Advertisement> = state
            .snapshot
            .advertisements
            .iter()
            .filter(|ad| ad.is_ready && !ad.is_published(marketplace))
            .filter(|ad| match user_id {
                Some(user) => ad.user_id.as_deref() == Some(user),
                None => true,
            })
            .cloned()
            .collect();
        ads.sort_by_key(|ad| ad.id);
        Ok(ads)
    }

    async fn set_published(
        &self,
        advertisement_id: i64,
        marketplace: Marketplace,
        published: bool,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let ad = state
            .snapshot
            .advertisements
            .iter_mut()
            .find(|ad| ad.id == advertisement_id)
            .ok_or(StoreError::NotFound(advertisement_id))?;
        match marketplace {
            Marketplace::Vinted => ad.published_vinted = published,
            Marketplace::Grailed => ad.published_grailed = published,
        }
        state
            .publish_calls
            .push((advertisement_id, marketplace, published));
        Ok(())
    }

    async fn list_active_styles(&self) -> Result<Vec<StyleRecord>, StoreError> {
        self.check_auxiliary()?;
        let state = self.state.lock().await;
        Ok(state
            .snapshot
            .styles
            .iter()
            .filter(|style| style.is_active)
            .cloned()
            .collect())
    }

    async fn get_style_by_sub_type(
        &self,
        sub_type: &str,
    ) -> Result<Option<StyleRecord>, StoreError> {
        self.check_auxiliary()?;
        let wanted = normalize_key(sub_type);
        let state = self.state.lock().await;
        Ok(state
            .snapshot
            .styles
            .iter()
            .find(|style| normalize_key(&style.product_type) == wanted)
            .cloned())
    }

    async fn list_active_headers(
        &self,
        marketplace: Marketplace,
    ) -> Result<Vec<HeaderRecord>, StoreError> {
        self.check_auxiliary()?;
        let state = self.state.lock().await;
        Ok(state
            .snapshot
            .headers
            .iter()
            .filter(|header| header.is_active && header.marketplace == marketplace)
            .cloned()
            .collect())
    }
}
