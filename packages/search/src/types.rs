//! Request and response types of the search engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Facet name to (value to count).
pub type FacetDistribution = BTreeMap<String, BTreeMap<String, u64>>;

/// Full-text search request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub q: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// One-based page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hits_per_page: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes_to_highlight: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes_to_search_on: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<String>,
}

impl SearchQuery {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_page(mut self, page: usize, hits_per_page: usize) -> Self {
        self.page = Some(page);
        self.hits_per_page = Some(hits_per_page);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn highlight(mut self, attribute: impl Into<String>) -> Self {
        self.attributes_to_highlight.push(attribute.into());
        self
    }

    pub fn search_on(mut self, attribute: impl Into<String>) -> Self {
        self.attributes_to_search_on.push(attribute.into());
        self
    }

    pub fn facet(mut self, attribute: impl Into<String>) -> Self {
        self.facets.push(attribute.into());
        self
    }
}

/// Search response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    #[serde(default)]
    pub hits: Vec<Value>,
    /// Exact in page mode, estimated otherwise.
    #[serde(default, alias = "estimatedTotalHits")]
    pub total_hits: u64,
    #[serde(default)]
    pub facet_distribution: FacetDistribution,
}

impl SearchResults {
    /// Counts of one facet; empty if the engine returned none.
    pub fn facet(&self, name: &str) -> BTreeMap<String, u64> {
        self.facet_distribution.get(name).cloned().unwrap_or_default()
    }
}

/// Document listing request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    pub offset: usize,
    pub limit: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<String>,
}

impl DocumentsQuery {
    pub fn new(filter: impl Into<String>, limit: usize) -> Self {
        Self {
            filter: Some(filter.into()),
            offset: 0,
            limit,
            sort: Vec::new(),
        }
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn sorted_by(mut self, sort: impl Into<String>) -> Self {
        self.sort.push(sort.into());
        self
    }
}

/// Document listing response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentsPage {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub limit: usize,
    #[serde(default)]
    pub total: u64,
}
