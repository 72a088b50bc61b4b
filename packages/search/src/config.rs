/// Default index holding descriptions, originals and elements.
pub const DEFAULT_DOCS_INDEX: &str = "corpus_docs";
/// Default index holding the sentence graph.
pub const DEFAULT_GRAPH_INDEX: &str = "corpus_graph";

/// Search engine connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub docs_index: String,
    pub graph_index: String,
}

impl SearchConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            docs_index: DEFAULT_DOCS_INDEX.to_string(),
            graph_index: DEFAULT_GRAPH_INDEX.to_string(),
        }
    }

    /// Read `SEARCH_URL`, `SEARCH_API_KEY`, `SEARCH_DOCS_INDEX` and
    /// `SEARCH_GRAPH_INDEX`. `None` when no URL is set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let url = get("SEARCH_URL")?;
        Some(Self {
            url,
            api_key: get("SEARCH_API_KEY"),
            docs_index: get("SEARCH_DOCS_INDEX").unwrap_or_else(|| DEFAULT_DOCS_INDEX.into()),
            graph_index: get("SEARCH_GRAPH_INDEX").unwrap_or_else(|| DEFAULT_GRAPH_INDEX.into()),
        })
    }
}
