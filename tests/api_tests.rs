//! REST endpoint tests through the router, without a listening socket.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::util::ServiceExt;

use translation_helps_server::fetcher::{FetcherSettings, UnifiedFetcher};
use translation_helps_server::rest::{build_router, AppState};
use translation_helps_server::testing::MockCatalog;
use translation_helps_server::trace::{TraceTree, CACHE_STATUS_HEADER, TRACE_HEADER};

fn setup_app() -> (Arc<MockCatalog>, Router) {
    let catalog = Arc::new(MockCatalog::door43());
    let fetcher = UnifiedFetcher::new(catalog.clone(), FetcherSettings::default());
    let app = build_router(AppState::new(Arc::new(fetcher)));
    (catalog, app)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, HeaderMap, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_health_endpoint() {
    let (_, app) = setup_app();
    let (status, _, body) = get(&app, "/api/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["cache"]["archives"], 0);
}

#[tokio::test]
async fn test_scripture_reports_miss_then_hit() {
    let (catalog, app) = setup_app();
    let uri = "/api/fetch-scripture?reference=John%203:16&language=en";

    let (status, headers, body) = get(&app, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reference"], "John 3:16");
    let text = body["scripture"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("16 For God so loved the world"), "{text}");
    assert_eq!(header(&headers, CACHE_STATUS_HEADER), "miss");
    assert_eq!(body["cacheStats"]["hits"], 0);

    let trace = TraceTree::decode(header(&headers, TRACE_HEADER)).unwrap();
    assert!(trace.spans.iter().any(|s| s.url.starts_with("internal://archive/")));
    assert!(trace.spans.iter().any(|s| s.url.ends_with("/archive/v86.zip")));

    let (status, headers, body) = get(&app, uri).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, CACHE_STATUS_HEADER), "hit");
    assert_eq!(body["cacheStats"]["misses"], 0);
    assert!(body["cacheStats"]["hits"].as_u64().unwrap() > 0);
    assert_eq!(catalog.archive_fetches(), 1);
}

#[tokio::test]
async fn test_invalid_reference_is_bad_request() {
    let (_, app) = setup_app();
    let (status, headers, body) = get(&app, "/api/fetch-scripture?reference=Hezekiah%201:1").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_reference");
    assert!(!header(&headers, TRACE_HEADER).is_empty());
}

#[tokio::test]
async fn test_missing_reference_parameter() {
    let (_, app) = setup_app();
    let (status, _, body) = get(&app, "/api/fetch-scripture?language=en").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_arguments");
}

#[tokio::test]
async fn test_unknown_book_in_archive_is_not_found() {
    let (_, app) = setup_app();
    let (status, _, body) = get(&app, "/api/fetch-scripture?reference=Genesis%201:1").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_translation_notes() {
    let (_, app) = setup_app();
    let (status, _, body) = get(&app, "/api/translation-notes?reference=Titus%201:1").await;

    assert_eq!(status, StatusCode::OK);
    let notes = body["notes"].as_array().unwrap();
    assert_eq!(notes.len(), 4);
    assert_eq!(notes[0]["Reference"], "front:intro");
    assert_eq!(notes[2]["ID"], "rtc9");

    let (_, _, body) = get(
        &app,
        "/api/translation-notes?reference=Titus%201:1&includeIntro=false",
    )
    .await;
    assert_eq!(body["notes"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_questions_and_word_links() {
    let (_, app) = setup_app();
    let (_, _, questions) = get(&app, "/api/translation-questions?reference=Titus%201:2").await;
    assert_eq!(questions["questions"][0]["Question"], "What did God promise?");

    let (_, _, links) = get(&app, "/api/fetch-translation-word-links?reference=Titus%201:1").await;
    assert_eq!(links["links"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_translation_word_by_term_and_link() {
    let (_, app) = setup_app();
    let (status, _, body) = get(&app, "/api/fetch-translation-word?term=paul").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["words"][0]["path"], "bible/names/paul.md");
    assert_eq!(body["words"][0]["title"], "Paul, Saul");

    let (status, _, body) = get(
        &app,
        "/api/fetch-translation-word?rcLink=rc%3A%2F%2F*%2Ftw%2Fdict%2Fbible%2Fkt%2Fgod",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["article"]["title"], "God");
}

#[tokio::test]
async fn test_translation_word_needs_a_selector() {
    let (_, app) = setup_app();
    let (status, _, body) = get(&app, "/api/fetch-translation-word?language=en").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_arguments");
}

#[tokio::test]
async fn test_words_for_reference_count_nested_cache_activity() {
    let (_, app) = setup_app();
    let (status, headers, body) = get(&app, "/api/fetch-translation-word?reference=Titus%201:1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["words"].as_array().unwrap().len(), 2);
    let trace = TraceTree::decode(header(&headers, TRACE_HEADER)).unwrap();
    assert!(trace
        .spans
        .iter()
        .any(|s| s.url == "internal://archive/unfoldingWord/en_twl/v40"));
    assert!(trace
        .spans
        .iter()
        .any(|s| s.url == "internal://archive/unfoldingWord/en_tw/v40"));
}

#[tokio::test]
async fn test_translation_academy() {
    let (_, app) = setup_app();
    let (status, _, body) = get(&app, "/api/fetch-translation-academy?moduleId=figs-metaphor").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["article"]["path"], "translate/figs-metaphor");

    let (status, _, body) = get(&app, "/api/fetch-translation-academy").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["article"]["content"]
        .as_str()
        .unwrap()
        .starts_with("# Translation Academy"));
}

#[tokio::test]
async fn test_list_languages() {
    let (_, app) = setup_app();
    let (status, headers, body) = get(&app, "/api/list-languages").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["languages"][1]["lc"], "es-419");
    // Only a network span: nothing cached, nothing missed.
    assert_eq!(header(&headers, CACHE_STATUS_HEADER), "miss");
    assert_eq!(body["cacheStats"]["total"], 0);
}

#[tokio::test]
async fn test_catalog_outage_is_bad_gateway() {
    let (catalog, app) = setup_app();
    catalog.set_catalog_down(true);
    let (status, _, body) = get(&app, "/api/translation-notes?reference=Titus%201:1").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "fetch_error");
}
