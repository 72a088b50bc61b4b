//! Search engine facade for the document corpus.
//!
//! - [`SearchService`]: the two engine operations the corpus needs
//! - [`MeiliClient`]: Meilisearch implementation over HTTP
//! - [`Corpus`]: snippet search, document listings and statistics

mod client;
mod config;
mod corpus;
mod error;
pub mod snippets;
mod types;

pub use client::{MeiliClient, SearchService};
pub use config::{DEFAULT_DOCS_INDEX, DEFAULT_GRAPH_INDEX, SearchConfig};
pub use corpus::{
    CountryStats, Corpus, DEFAULT_NUM_WORDS, DocumentCoverage, DocumentDetail, DocumentList,
    GeneralStats, SnippetPage,
};
pub use error::SearchError;
pub use snippets::{Point, Snippet};
pub use types::{DocumentsPage, DocumentsQuery, FacetDistribution, SearchQuery, SearchResults};

/// Build the corpus from config, talking to Meilisearch.
pub fn connect(config: &SearchConfig) -> Result<Corpus, SearchError> {
    let client = MeiliClient::new(&config.url, config.api_key.clone())?;
    Ok(Corpus::new(
        std::sync::Arc::new(client),
        &config.docs_index,
        &config.graph_index,
    ))
}
