use crate::ophim::api;
use crate::traits::{CatalogSource, SortMode};
use crate::SourceError;
use async_trait::async_trait;
use filmflex_config::ApiConfig;
use filmflex_models::{CatalogPage, MovieDetail};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the Ophim / PhimAPI catalog
#[derive(Clone)]
pub struct OphimClient {
    client: Client,
    base_url: String,
    list_path: String,
    detail_path: String,
}

impl OphimClient {
    pub fn new(client: Client, base_url: &str, list_path: &str, detail_path: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            list_path: list_path.trim_matches('/').to_string(),
            detail_path: detail_path.trim_matches('/').to_string(),
        }
    }

    pub fn from_config(api: &ApiConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(api.user_agent.as_str())
            .timeout(Duration::from_secs(api.request_timeout_secs))
            .build()?;
        Ok(Self::new(client, &api.base_url, &api.list_path, &api.detail_path))
    }

    fn list_url(&self) -> String {
        format!("{}/{}", self.base_url, self.list_path)
    }

    fn detail_url(&self, slug: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.detail_path, urlencoding::encode(slug))
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, SourceError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| SourceError::transport(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SourceError::transport(url, &e))?;
        serde_json::from_slice(&bytes).map_err(|e| SourceError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl CatalogSource for OphimClient {
    fn source_name(&self) -> &str {
        "ophim"
    }

    #[instrument(skip(self))]
    async fn fetch_page(&self, page: u32, sort: &SortMode) -> Result<CatalogPage, SourceError> {
        let url = self.list_url();
        let body = self
            .get_json(&url, &[("page", page.to_string()), ("sort", sort.as_str().to_string())])
            .await?;
        let parsed = api::parse_list_envelope(page, body, &url)?;
        debug!("Fetched page {}: {} stubs", page, parsed.stubs.len());
        Ok(parsed)
    }

    #[instrument(skip(self))]
    async fn fetch_detail(&self, slug: &str) -> Result<MovieDetail, SourceError> {
        let url = self.detail_url(slug);
        let body = self.get_json(&url, &[]).await?;
        api::parse_detail_envelope(slug, body)
    }

    async fn health_check(&self) -> Result<(), SourceError> {
        let response = self
            .client
            .head(&self.base_url)
            .timeout(HEALTH_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(|e| SourceError::transport(&self.base_url, &e))?;

        // Plenty of API hosts answer HEAD with 404/405; only server errors count as down
        let status = response.status();
        if status.is_server_error() {
            return Err(SourceError::Status {
                url: self.base_url.clone(),
                status: status.as_u16(),
                body: String::new(),
            });
        }
        Ok(())
    }
}
