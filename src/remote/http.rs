//! REST backend over `reqwest`.
//!
//! Talks to a collection resource at `base_url`:
//! - `GET    {base}?page=P&size=S` -> `{"items": [...], "totalCount": N}`
//! - `POST   {base}`               -> created record
//! - `PUT    {base}/{id}`          -> stored record, 404 if missing
//! - `DELETE {base}/{id}`          -> 204/200, 404 if missing

use crate::error::{Result, StoreError};
use crate::types::{Page, PageRequest, Record};
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::time::Duration;

use super::backend::CollectionBackend;

/// HTTP backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpBackendConfig {
    /// URL of the collection resource.
    pub base_url: String,

    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api/posts".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Backend for a REST collection resource.
pub struct HttpBackend<R> {
    client: reqwest::Client,
    base_url: String,
    _record: PhantomData<fn() -> R>,
}

impl<R> HttpBackend<R>
where
    R: Record + Serialize + DeserializeOwned,
{
    /// Build a client for the configured resource.
    pub fn new(config: HttpBackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            _record: PhantomData,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, id)
    }

    /// Map a non-success status to an error; 404 means the target is gone.
    async fn check(response: Response, id: Option<&str>) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            if let Some(id) = id {
                return Err(StoreError::NotFound(id.to_string()));
            }
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_owned());
        Err(StoreError::Transport(format!(
            "{} returned {}: {}",
            id.unwrap_or("collection"),
            status,
            body
        )))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| StoreError::Transport(format!("response parse failed: {e}")))
    }
}

#[async_trait]
impl<R> CollectionBackend<R> for HttpBackend<R>
where
    R: Record + Serialize + DeserializeOwned,
{
    async fn fetch(&self, page: Option<PageRequest>) -> Result<Page<R>> {
        let mut request = self.client.get(&self.base_url);
        if let Some(page) = page {
            request = request.query(&[("page", page.page), ("size", page.size)]);
        }

        let response = Self::check(request.send().await?, None).await?;
        Self::decode(response).await
    }

    async fn create(&self, record: R) -> Result<R> {
        let response = self.client.post(&self.base_url).json(&record).send().await?;
        let response = Self::check(response, None).await?;
        Self::decode(response).await
    }

    async fn update(&self, id: &str, record: R) -> Result<R> {
        let response = self
            .client
            .put(self.item_url(id))
            .json(&record)
            .send()
            .await?;
        let response = Self::check(response, Some(id)).await?;
        Self::decode(response).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let response = self.client.delete(self.item_url(id)).send().await?;
        Self::check(response, Some(id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Post;

    #[test]
    fn test_base_url_trailing_slash() {
        let backend = HttpBackend::<Post>::new(HttpBackendConfig {
            base_url: "http://localhost:3000/api/posts/".to_string(),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(backend.base_url(), "http://localhost:3000/api/posts");
        assert_eq!(backend.item_url("42"), "http://localhost:3000/api/posts/42");
    }

    #[tokio::test]
    async fn test_unreachable_is_transport_error() {
        let backend = HttpBackend::<Post>::new(HttpBackendConfig {
            base_url: "http://127.0.0.1:9/api/posts".to_string(),
            timeout_ms: 500,
        })
        .unwrap();

        let result = backend.fetch(None).await;
        assert!(matches!(result, Err(StoreError::Transport(_))));
    }
}
