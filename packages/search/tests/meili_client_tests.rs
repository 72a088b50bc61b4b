#![allow(clippy::disallowed_methods)]

use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use search::{DocumentsQuery, MeiliClient, SearchError, SearchQuery, SearchService};

async fn fake_search(
    Path(index): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if index == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Index `missing` not found."})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "hits": [{"index": index, "auth": auth, "q": body["q"]}],
            "totalHits": 1,
        })),
    )
}

async fn fake_fetch(Path(index): Path<String>, Json(body): Json<Value>) -> Json<Value> {
    Json(json!({
        "results": [{"index": index, "filter": body["filter"], "sort": body["sort"]}],
        "offset": body["offset"],
        "limit": body["limit"],
        "total": 99,
    }))
}

async fn serve() -> String {
    let app = Router::new()
        .route("/indexes/{index}/search", post(fake_search))
        .route("/indexes/{index}/documents/fetch", post(fake_fetch));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn search_posts_json_with_bearer_key() {
    let url = serve().await;
    let client = MeiliClient::new(url, Some("secret".into())).unwrap();

    let results = client
        .search("corpus_docs", &SearchQuery::new("agua"))
        .await
        .unwrap();
    assert_eq!(results.total_hits, 1);
    assert_eq!(
        results.hits[0],
        json!({"index": "corpus_docs", "auth": "Bearer secret", "q": "agua"})
    );
}

#[tokio::test]
async fn documents_fetch_sends_filter_and_sort() {
    let url = serve().await;
    let client = MeiliClient::new(url, None).unwrap();

    let page = client
        .documents(
            "corpus_docs",
            &DocumentsQuery::new(r#"type = "description""#, 60)
                .with_offset(120)
                .sorted_by("sentence_num:desc"),
        )
        .await
        .unwrap();
    assert_eq!(page.total, 99);
    assert_eq!(page.offset, 120);
    assert_eq!(
        page.results[0],
        json!({
            "index": "corpus_docs",
            "filter": "type = \"description\"",
            "sort": ["sentence_num:desc"],
        })
    );
}

#[tokio::test]
async fn engine_errors_keep_status_and_body() {
    let url = serve().await;
    let client = MeiliClient::new(url, None).unwrap();

    let err = client
        .search("missing", &SearchQuery::new("x"))
        .await
        .unwrap_err();
    match err {
        SearchError::Status { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("not found"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
