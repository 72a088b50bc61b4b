//! Search engine client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::SearchError;
use crate::types::{DocumentsPage, DocumentsQuery, SearchQuery, SearchResults};

/// Operations the corpus needs from a search engine.
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Full-text search on `index`.
    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchResults, SearchError>;

    /// Filtered document listing on `index`.
    async fn documents(
        &self,
        index: &str,
        query: &DocumentsQuery,
    ) -> Result<DocumentsPage, SearchError>;
}

/// Meilisearch over HTTP.
#[derive(Debug, Clone)]
pub struct MeiliClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl MeiliClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, SearchError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(SearchError::Config(format!(
                "search url must be http(s), got {base_url:?}"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn index_url(&self, index: &str, path: &str) -> String {
        format!("{}/indexes/{}/{}", self.base_url, index, path)
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: String,
        body: &B,
    ) -> Result<T, SearchError> {
        let mut req = self.client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!("Search engine answered {} for {}", status, url);
            return Err(SearchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| SearchError::Decode(e.to_string()))
    }
}

#[async_trait]
impl SearchService for MeiliClient {
    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchResults, SearchError> {
        self.post(self.index_url(index, "search"), query).await
    }

    async fn documents(
        &self,
        index: &str,
        query: &DocumentsQuery,
    ) -> Result<DocumentsPage, SearchError> {
        self.post(self.index_url(index, "documents/fetch"), query)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalised() {
        let client = MeiliClient::new(" http://search:7700/ ", None).unwrap();
        assert_eq!(
            client.index_url("corpus_docs", "search"),
            "http://search:7700/indexes/corpus_docs/search"
        );
    }

    #[test]
    fn non_http_url_is_rejected() {
        assert!(matches!(
            MeiliClient::new("search:7700", None),
            Err(SearchError::Config(_))
        ));
    }
}
