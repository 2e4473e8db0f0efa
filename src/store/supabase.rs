use super::{AdvertisementStore, StoreError};
use crate::http::build_client;
use crate::models::{Advertisement, HeaderRecord, Marketplace, StyleRecord};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

const ADVERTISEMENTS: &str = "advertisements";
const STYLES: &str = "styles";
const HEADERS: &str = "description_headers";

/// PostgREST client over the advertisements database.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    base_url: String,
    service_key: String,
    http: Client,
}

impl SupabaseStore {
    pub fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            http: build_client(),
        }
    }

    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("SUPABASE_URL").ok()?;
        let service_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .or_else(|_| std::env::var("SUPABASE_SERVICE_KEY"))
            .or_else(|_| std::env::var("SUPABASE_KEY"))
            .ok()?;
        Some(Self::new(&base_url, &service_key))
    }

    fn table_url(&self, table: &str, query: &str) -> String {
        format!("{}/rest/v1/{table}?{query}", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, url: String) -> Result<Vec<T>, StoreError> {
        debug!(target = "hermes.store", url = %url, "store_select");
        let response = self
            .authorized(self.http.get(url))
            .send()
            .await
            .map_err(|err| StoreError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|err| StoreError::Deserialize(err.to_string()))
    }
}

#[async_trait]
impl AdvertisementStore for SupabaseStore {
    async fn list_unpublished(
        &self,
        marketplace: Marketplace,
        user_id: Option<&str>,
    ) -> Result<Vec<Advertisement>, StoreError> {
        let mut query = format!(
            "select=*&is_ready=eq.true&{}=eq.false&order=id.asc",
            marketplace.publish_column()
        );
        if let Some(user_id) = user_id {
            query.push_str(&format!("&user_id=eq.{}", urlencoding::encode(user_id)));
        }
        self.fetch_rows(self.table_url(ADVERTISEMENTS, &query)).await
    }

    async fn set_published(
        &self,
        advertisement_id: i64,
        marketplace: Marketplace,
        published: bool,
    ) -> Result<(), StoreError> {
        let url = self.table_url(ADVERTISEMENTS, &format!("id=eq.{advertisement_id}"));
        let body = json!({ marketplace.publish_column(): published });
        let response = self
            .authorized(self.http.patch(url))
            .header("Prefer", "return=representation")
            .json(&body)
            .send()
            .await
            .map_err(|err| StoreError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }
        let updated: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|err| StoreError::Deserialize(err.to_string()))?;
        if updated.is_empty() {
            return Err(StoreError::NotFound(advertisement_id));
        }
        Ok(())
    }

    async fn list_active_styles(&self) -> Result<Vec<StyleRecord>, StoreError> {
        self.fetch_rows(self.table_url(STYLES, "select=*&is_active=eq.true&order=id.asc"))
            .await
    }

    async fn get_style_by_sub_type(
        &self,
        sub_type: &str,
    ) -> Result<Option<StyleRecord>, StoreError> {
        let query = format!(
            "select=*&product_type=eq.{}&limit=1",
            urlencoding::encode(sub_type.trim())
        );
        let mut rows: Vec<StyleRecord> = self.fetch_rows(self.table_url(STYLES, &query)).await?;
        Ok(rows.pop())
    }

    async fn list_active_headers(
        &self,
        marketplace: Marketplace,
    ) -> Result<Vec<HeaderRecord>, StoreError> {
        let query = format!(
            "select=*&marketplace=eq.{}&is_active=eq.true&order=id.asc",
            marketplace.as_str()
        );
        self.fetch_rows(self.table_url(HEADERS, &query)).await
    }
}
