//! Corpus views built on the search engine: snippet search, document
//! listings and statistics.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};

use crate::client::SearchService;
use crate::error::SearchError;
use crate::snippets::{Snippet, extract_snippets};
use crate::types::{DocumentsQuery, SearchQuery};

/// Hits per search results page.
pub const SEARCH_PAGE_SIZE: usize = 20;
/// Documents per listing page.
pub const DOCS_PAGE_SIZE: usize = 60;
/// Cap for whole-corpus document fetches.
pub const MAX_FETCH: usize = 3000;
/// Words kept on each side of a match.
pub const DEFAULT_NUM_WORDS: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnippetPage {
    pub query: String,
    pub page: usize,
    pub last_page: bool,
    pub total_hits: u64,
    pub results: Vec<Snippet>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentList {
    pub page: usize,
    pub last_page: bool,
    pub total: u64,
    pub results: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentDetail {
    pub sentence_num: i64,
    /// Description record, `{}` if missing.
    pub info: Value,
    /// Original text record, `{"text": ""}` if missing.
    pub original: Value,
    pub elements: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralStats {
    /// Record count per `type` in the docs index.
    pub total_types: BTreeMap<String, u64>,
    /// Record count per `type` in the graph index.
    pub total_graphs: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryStats {
    pub total_countries: BTreeMap<String, u64>,
    pub total_nodes_country: BTreeMap<String, u64>,
    pub total_sentences: u64,
    pub total_nodes: u64,
}

/// Coverage of one described document across the indexes and storage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentCoverage {
    pub sentence_num: Value,
    pub has_original: bool,
    pub has_first_element: bool,
    pub has_graph_node: bool,
    pub has_pdf: bool,
}

/// The corpus over its two indexes.
#[derive(Clone)]
pub struct Corpus {
    service: Arc<dyn SearchService>,
    docs_index: String,
    graph_index: String,
}

impl std::fmt::Debug for Corpus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Corpus")
            .field("docs_index", &self.docs_index)
            .field("graph_index", &self.graph_index)
            .finish()
    }
}

impl Corpus {
    pub fn new(
        service: Arc<dyn SearchService>,
        docs_index: impl Into<String>,
        graph_index: impl Into<String>,
    ) -> Self {
        Self {
            service,
            docs_index: docs_index.into(),
            graph_index: graph_index.into(),
        }
    }

    pub fn docs_index(&self) -> &str {
        &self.docs_index
    }

    pub fn graph_index(&self) -> &str {
        &self.graph_index
    }

    /// Search element texts and cut snippets around every match.
    ///
    /// `page` is zero-based. A blank query returns an empty last page
    /// without asking the engine.
    pub async fn search_snippets(
        &self,
        query: &str,
        page: usize,
        num_words: usize,
    ) -> Result<SnippetPage, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(SnippetPage {
                query: String::new(),
                page,
                last_page: true,
                total_hits: 0,
                results: Vec::new(),
            });
        }

        // Pages past the end saturate; the engine answers them with no hits.
        let engine_page = page.saturating_add(1);
        let request = SearchQuery::new(query)
            .with_filter(r#"type = "element""#)
            .with_page(engine_page, SEARCH_PAGE_SIZE)
            .highlight("text")
            .search_on("text");
        let results = self.service.search(&self.docs_index, &request).await?;

        tracing::debug!("Search {:?} page {}: {} hits", query, page, results.total_hits);

        Ok(SnippetPage {
            query: query.to_string(),
            page,
            last_page: engine_page.saturating_mul(SEARCH_PAGE_SIZE) as u64 >= results.total_hits,
            total_hits: results.total_hits,
            results: extract_snippets(&results.hits, num_words)?,
        })
    }

    /// Described documents, newest first. `page` is zero-based.
    pub async fn documents(&self, page: usize) -> Result<DocumentList, SearchError> {
        let request = DocumentsQuery::new(r#"type = "description""#, DOCS_PAGE_SIZE)
            .with_offset(page.saturating_mul(DOCS_PAGE_SIZE))
            .sorted_by("sentence_num:desc");
        let docs = self.service.documents(&self.docs_index, &request).await?;

        Ok(DocumentList {
            page,
            last_page: page
                .saturating_add(1)
                .saturating_mul(DOCS_PAGE_SIZE)
                .saturating_add(1) as u64
                > docs.total,
            total: docs.total,
            results: docs.results,
        })
    }

    /// Description, original text and elements of one document.
    pub async fn document(&self, sentence_num: i64) -> Result<DocumentDetail, SearchError> {
        let info = self
            .service
            .documents(
                &self.docs_index,
                &DocumentsQuery::new(
                    format!(r#"type = "description" AND sentence_num = {sentence_num}"#),
                    1,
                ),
            )
            .await?;
        let original = self
            .service
            .documents(
                &self.docs_index,
                &DocumentsQuery::new(
                    format!(r#"type = "original" AND sentence_num = {sentence_num}"#),
                    1,
                ),
            )
            .await?;
        let elements = self
            .service
            .documents(
                &self.docs_index,
                &DocumentsQuery::new(
                    format!(r#"type = "element" AND sentence_num = {sentence_num}"#),
                    MAX_FETCH,
                ),
            )
            .await?;

        Ok(DocumentDetail {
            sentence_num,
            info: info.results.into_iter().next().unwrap_or_else(|| json!({})),
            original: original
                .results
                .into_iter()
                .next()
                .unwrap_or_else(|| json!({"text": ""})),
            elements: elements.results,
        })
    }

    /// Record counts per `type` on both indexes.
    pub async fn general_stats(&self) -> Result<GeneralStats, SearchError> {
        let request = SearchQuery::new("").facet("type");
        let docs = self.service.search(&self.docs_index, &request).await?;
        let graph = self.service.search(&self.graph_index, &request).await?;

        Ok(GeneralStats {
            total_types: docs.facet("type"),
            total_graphs: graph.facet("type"),
        })
    }

    /// Record counts per `country`; graph counts only sentence nodes.
    pub async fn per_country_stats(&self) -> Result<CountryStats, SearchError> {
        let docs = self
            .service
            .search(&self.docs_index, &SearchQuery::new("").facet("country"))
            .await?;
        let graph = self
            .service
            .search(
                &self.graph_index,
                &SearchQuery::new("")
                    .with_filter("type = 'sentence'")
                    .with_limit(MAX_FETCH)
                    .facet("country"),
            )
            .await?;

        let total_countries = docs.facet("country");
        let total_nodes_country = graph.facet("country");
        Ok(CountryStats {
            total_sentences: total_countries.values().sum(),
            total_nodes: total_nodes_country.values().sum(),
            total_countries,
            total_nodes_country,
        })
    }

    /// Coverage of every described document, newest first.
    ///
    /// `available_pdfs` holds the stored file names; a document has its PDF
    /// when the last segment of its `links.pdf` is among them.
    pub async fn per_document_stats(
        &self,
        available_pdfs: &HashSet<String>,
    ) -> Result<Vec<DocumentCoverage>, SearchError> {
        let descriptions = self
            .service
            .documents(
                &self.docs_index,
                &DocumentsQuery::new(r#"type = "description""#, MAX_FETCH)
                    .sorted_by("sentence_num:desc"),
            )
            .await?;
        let originals = self
            .sentence_nums(&self.docs_index, r#"type = "original""#)
            .await?;
        let first_elements = self
            .sentence_nums(&self.docs_index, r#"type = "element" AND oder = 1"#)
            .await?;
        let nodes = self
            .sentence_nums(&self.graph_index, r#"type = "sentence""#)
            .await?;

        Ok(descriptions
            .results
            .iter()
            .map(|doc| {
                let num = doc.get("sentence_num").cloned().unwrap_or(Value::Null);
                let key = sentence_key(&num);
                let has_pdf = doc
                    .pointer("/links/pdf")
                    .and_then(Value::as_str)
                    .and_then(|link| link.rsplit('/').next())
                    .is_some_and(|name| !name.is_empty() && available_pdfs.contains(name));
                DocumentCoverage {
                    has_original: originals.contains(&key),
                    has_first_element: first_elements.contains(&key),
                    has_graph_node: nodes.contains(&key),
                    has_pdf,
                    sentence_num: num,
                }
            })
            .collect())
    }

    async fn sentence_nums(&self, index: &str, filter: &str) -> Result<HashSet<String>, SearchError> {
        let page = self
            .service
            .documents(index, &DocumentsQuery::new(filter, MAX_FETCH))
            .await?;
        Ok(page
            .results
            .iter()
            .filter_map(|doc| doc.get("sentence_num"))
            .map(sentence_key)
            .collect())
    }
}

/// `12` and `"12"` name the same document.
fn sentence_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}
