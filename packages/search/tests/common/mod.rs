#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use search::{DocumentsPage, DocumentsQuery, SearchError, SearchQuery, SearchResults, SearchService};

type SearchFn = Box<dyn Fn(&str, &SearchQuery) -> SearchResults + Send + Sync>;
type DocumentsFn = Box<dyn Fn(&str, &DocumentsQuery) -> DocumentsPage + Send + Sync>;

/// In-process search engine answering from closures and logging requests.
pub struct FakeSearch {
    search_fn: SearchFn,
    documents_fn: DocumentsFn,
    pub searches: Mutex<Vec<(String, SearchQuery)>>,
    pub fetches: Mutex<Vec<(String, DocumentsQuery)>>,
}

impl FakeSearch {
    pub fn new(
        search_fn: impl Fn(&str, &SearchQuery) -> SearchResults + Send + Sync + 'static,
        documents_fn: impl Fn(&str, &DocumentsQuery) -> DocumentsPage + Send + Sync + 'static,
    ) -> Self {
        Self {
            search_fn: Box::new(search_fn),
            documents_fn: Box::new(documents_fn),
            searches: Mutex::new(Vec::new()),
            fetches: Mutex::new(Vec::new()),
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
impl SearchService for FakeSearch {
    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchResults, SearchError> {
        self.searches
            .lock()
            .unwrap()
            .push((index.to_string(), query.clone()));
        Ok((self.search_fn)(index, query))
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
        Ok((self.documents_fn)(index, query))
    }
}

pub fn page_of(results: Vec<serde_json::Value>, total: u64) -> DocumentsPage {
    DocumentsPage {
        results,
        total,
        ..Default::default()
    }
}
