use thiserror::Error;

/// Search engine errors.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Search engine returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Unexpected search response: {0}")]
    Decode(String),
    #[error("Invalid highlight pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("Invalid search config: {0}")]
    Config(String),
}
