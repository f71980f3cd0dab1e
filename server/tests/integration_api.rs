use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use server::{build_app, SharedIndex};
use std::sync::Arc;
use tower::ServiceExt;
use webindex_core::{Index, MemoryStore, Store, TermCounter};

const JAVA: &str = "https://en.wikipedia.org/wiki/Java_(programming_language)";
const LANG: &str = "https://en.wikipedia.org/wiki/Programming_language";

fn tiny_index() -> (SharedIndex, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let index: SharedIndex = Arc::new(Index::new(Box::new(store.clone()) as Box<dyn Store>));

    let mut java = TermCounter::new(JAVA);
    java.put("java", 4);
    java.put("program", 2);
    index.index_page(JAVA, &java).unwrap();

    let mut lang = TermCounter::new(LANG);
    lang.put("program", 5);
    index.index_page(LANG, &lang).unwrap();
    (index, store)
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn counts_for_term_lists_every_page() {
    let (index, _) = tiny_index();
    let (status, body) = call(build_app(index, None), get("/terms/programming/counts")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["term"], "program");
    assert_eq!(body["counts"][JAVA], 2);
    assert_eq!(body["counts"][LANG], 5);
}

#[tokio::test]
async fn urls_for_unknown_term_is_empty() {
    let (index, _) = tiny_index();
    let (status, body) = call(build_app(index, None), get("/terms/cobol/urls")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["urls"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn missing_count_is_not_found() {
    let (index, _) = tiny_index();
    let uri = format!("/count?url={}&term=java", "https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FProgramming_language");
    let (status, body) = call(build_app(index.clone(), None), get(&uri)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));

    let uri = format!("/count?url={}&term=java", "https%3A%2F%2Fen.wikipedia.org%2Fwiki%2FJava_(programming_language)");
    let (status, body) = call(build_app(index, None), get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 4);
}

#[tokio::test]
async fn stop_word_query_is_rejected_unless_raw() {
    let (index, _) = tiny_index();
    let (status, _) = call(build_app(index.clone(), None), get("/terms/the/urls")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(build_app(index, None), get("/terms/the/urls?raw=true")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn store_outage_is_service_unavailable() {
    let (index, store) = tiny_index();
    store.set_offline(true);
    let (status, _) = call(build_app(index, None), get("/indexed?url=x")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn page_upload_requires_token() {
    let (index, _) = tiny_index();
    let body = r#"{"url":"https://a.test/rust","text":"Rust is a systems programming language. Rust!"}"#;
    let upload = |token: Option<&str>| {
        let mut req = Request::post("/pages").header("content-type", "application/json");
        if let Some(t) = token {
            req = req.header("X-ADMIN-TOKEN", t);
        }
        req.body(Body::from(body)).unwrap()
    };

    let app = build_app(index.clone(), Some("sekrit".into()));
    let (status, _) = call(app.clone(), upload(None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(app.clone(), upload(Some("wrong"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, resp) = call(app.clone(), upload(Some("sekrit"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["url"], "https://a.test/rust");
    assert_eq!(index.count_at("https://a.test/rust", "rust").unwrap(), 2);

    let (status, resp) = call(app, get("/indexed?url=https%3A%2F%2Fa.test%2Frust")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["indexed"], true);
}
