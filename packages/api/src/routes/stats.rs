use std::collections::HashSet;

use axum::Json;
use axum::extract::State;
use search::{CountryStats, Corpus, DocumentCoverage, GeneralStats, SearchError};

use crate::error::ApiError;
use crate::state::AppState;

pub(super) fn corpus(state: &AppState) -> Result<&Corpus, ApiError> {
    state.corpus.as_ref().ok_or(ApiError::SearchUnavailable)
}

pub(super) fn search_failed(err: SearchError) -> ApiError {
    tracing::error!("Search engine error: {}", err);
    ApiError::SearchFailed
}

pub async fn general_stats(State(state): State<AppState>) -> Result<Json<GeneralStats>, ApiError> {
    corpus(&state)?
        .general_stats()
        .await
        .map(Json)
        .map_err(search_failed)
}

pub async fn per_country_stats(
    State(state): State<AppState>,
) -> Result<Json<CountryStats>, ApiError> {
    corpus(&state)?
        .per_country_stats()
        .await
        .map(Json)
        .map_err(search_failed)
}

pub async fn per_document_stats(
    State(state): State<AppState>,
) -> Result<Json<Vec<DocumentCoverage>>, ApiError> {
    let corpus = corpus(&state)?;
    let pdfs = stored_file_names(&state).await;
    corpus
        .per_document_stats(&pdfs)
        .await
        .map(Json)
        .map_err(search_failed)
}

/// File names in document storage. Storage errors count as no files.
async fn stored_file_names(state: &AppState) -> HashSet<String> {
    let Some(storage) = &state.storage else {
        return HashSet::new();
    };

    match storage.list_names(None).await {
        Ok(names) => names
            .iter()
            .filter_map(|name| name.rsplit('/').next())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to list stored documents: {}", e);
            HashSet::new()
        }
    }
}
