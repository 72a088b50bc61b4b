#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use broker::{Broker, BrokerConfig, DbError};
use search::{DocumentsPage, DocumentsQuery, SearchError, SearchQuery, SearchResults, SearchService};
use serde_json::Value;
use tower::ServiceExt;

/// Connect a fresh in-memory broker.
pub async fn setup_broker() -> Result<Broker, DbError> {
    Broker::connect(&BrokerConfig::memory()).await
}

/// Send one request through the router and decode the JSON body.
///
/// Bodies that are not JSON come back as `Value::Null`.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send_raw(app, request).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

pub async fn send_raw(
    app: &Router,
    request: Request<Body>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body.to_vec())
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

pub fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

pub fn post_form(uri: &str, form: &str) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

/// Search engine answering fixed results and logging requests.
#[derive(Default)]
pub struct CannedSearch {
    pub results: SearchResults,
    pub page: DocumentsPage,
    pub searches: Mutex<Vec<(String, SearchQuery)>>,
    pub fetches: Mutex<Vec<(String, DocumentsQuery)>>,
}

impl CannedSearch {
    pub fn new(results: SearchResults, page: DocumentsPage) -> Self {
        Self {
            results,
            page,
            ..Default::default()
        }
    }

    pub fn searches(&self) -> Vec<(String, SearchQuery)> {
        self.searches.lock().unwrap().clone()
    }

    pub fn fetches(&self) -> Vec<(String, DocumentsQuery)> {
        self.fetches.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchService for CannedSearch {
    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchResults, SearchError> {
        self.searches
            .lock()
            .unwrap()
            .push((index.to_string(), query.clone()));
        Ok(self.results.clone())
    }

    async fn documents(
        &self,
        index: &str,
        query: &DocumentsQuery,
    ) -> Result<DocumentsPage, SearchError> {
        self.fetches
            .lock()
            .unwrap()
            .push((index.to_string(), query.clone()));
        Ok(self.page.clone())
    }
}

/// Search engine that is always down.
pub struct FailingSearch;

#[async_trait]
impl SearchService for FailingSearch {
    async fn search(&self, _: &str, _: &SearchQuery) -> Result<SearchResults, SearchError> {
        Err(SearchError::Status {
            status: 503,
            body: "index unavailable".into(),
        })
    }

    async fn documents(&self, _: &str, _: &DocumentsQuery) -> Result<DocumentsPage, SearchError> {
        Err(SearchError::Status {
            status: 503,
            body: "index unavailable".into(),
        })
    }
}
