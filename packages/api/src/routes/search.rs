use axum::Json;
use axum::extract::{Form, Path, Query, State};
use search::{DEFAULT_NUM_WORDS, DocumentDetail, DocumentList, SnippetPage};
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

use super::stats::{corpus, search_failed};

#[derive(Debug, Deserialize)]
pub struct SearchForm {
    #[serde(default)]
    query: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    page: usize,
    #[serde(default = "default_num_words")]
    num_words: usize,
}

fn default_num_words() -> usize {
    DEFAULT_NUM_WORDS
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    page: usize,
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
    Form(form): Form<SearchForm>,
) -> Result<Json<SnippetPage>, ApiError> {
    corpus(&state)?
        .search_snippets(&form.query, params.page, params.num_words)
        .await
        .map(Json)
        .map_err(search_failed)
}

pub async fn documents(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<DocumentList>, ApiError> {
    corpus(&state)?
        .documents(params.page)
        .await
        .map(Json)
        .map_err(search_failed)
}

pub async fn document(
    State(state): State<AppState>,
    Path(sentence_num): Path<i64>,
) -> Result<Json<DocumentDetail>, ApiError> {
    corpus(&state)?
        .document(sentence_num)
        .await
        .map(Json)
        .map_err(search_failed)
}
