use crate::errors::ApiError;
use crate::models::{
    CreateManyRequest, CreateManyResponse, DeleteManyRequest, DeleteManyResponse, ErrorBody,
    ListResponse, Record, StatDoc, StatPatch,
};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Remote operations over the `trafficStats` collection.
#[async_trait]
pub trait StatsApi: Send + Sync {
    async fn list(&self) -> Result<Vec<Record>, ApiError>;
    async fn create(&self, doc: &StatDoc) -> Result<Record, ApiError>;
    async fn create_many(&self, docs: &[StatDoc]) -> Result<Vec<Record>, ApiError>;
    async fn update(&self, id: &str, patch: &StatPatch) -> Result<Record, ApiError>;
    async fn delete(&self, id: &str) -> Result<(), ApiError>;
    async fn delete_many(&self, ids: &[String]) -> Result<DeleteManyResponse, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

pub struct HttpStatsApi {
    http: Client,
    base_url: String,
}

impl HttpStatsApi {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::InvalidBaseUrl(config.base_url));
        }
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl StatsApi for HttpStatsApi {
    async fn list(&self) -> Result<Vec<Record>, ApiError> {
        let response = self.http.get(self.url("/trafficStats")).send().await?;
        let body: ListResponse = ensure_success(response).await?.json().await?;
        debug!(count = body.stats.len(), "listed traffic stats");
        Ok(body.stats)
    }

    async fn create(&self, doc: &StatDoc) -> Result<Record, ApiError> {
        let response = self
            .http
            .post(self.url("/trafficStat"))
            .json(doc)
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn create_many(&self, docs: &[StatDoc]) -> Result<Vec<Record>, ApiError> {
        let request = CreateManyRequest {
            docs: docs.to_vec(),
        };
        let response = self
            .http
            .post(self.url("/trafficStats"))
            .json(&request)
            .send()
            .await?;
        let body: CreateManyResponse = ensure_success(response).await?.json().await?;
        Ok(body.all_stats)
    }

    async fn update(&self, id: &str, patch: &StatPatch) -> Result<Record, ApiError> {
        let response = self
            .http
            .put(self.url(&format!("/trafficStats/{id}")))
            .json(patch)
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn delete(&self, id: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .delete(self.url(&format!("/trafficStats/{id}")))
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn delete_many(&self, ids: &[String]) -> Result<DeleteManyResponse, ApiError> {
        let request = DeleteManyRequest { ids: ids.to_vec() };
        let response = self
            .http
            .delete(self.url("/trafficStats"))
            .json(&request)
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
    };
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}
