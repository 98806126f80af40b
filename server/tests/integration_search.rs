use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::tempdir;
use textdex_core::{IndexConfig, SearchIndex};
use tower::ServiceExt;

const KEY: &str = "supersecret";

fn app_in(dir: &std::path::Path) -> Router {
    let index = SearchIndex::open(IndexConfig::new(dir)).unwrap();
    textdex_server::build_app(Arc::new(index), Some(KEY.to_string()))
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).header("X-API-KEY", KEY).body(Body::empty()).unwrap()
}

fn ingest(payload: Value) -> Request<Body> {
    Request::post("/ingest")
        .header("X-API-KEY", KEY)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn reviews() -> Value {
    json!([
        {"id": 1, "location": "NYC", "rating": 5, "text": "great service friendly staff", "date": "2025-06-12"},
        {"id": 2, "location": "NYC", "rating": 1, "text": "bad service rude staff", "date": "2025-06-13"},
        {"id": 3, "location": "SF", "rating": 4, "text": "delicious food great price", "date": "2025-06-14"}
    ])
}

#[tokio::test]
async fn ingest_then_search() {
    let dir = tempdir().unwrap();
    let app = app_in(dir.path());

    let (status, body) = call(app.clone(), ingest(reviews())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ingested"], 3);
    assert_eq!(body["skipped"], 0);

    let (status, body) = call(app.clone(), ingest(reviews())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ingested"], 0);
    assert_eq!(body["skipped"], 3);

    let (status, body) = call(app.clone(), get("/search?q=service&k=2")).await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    let mut ids: Vec<i64> = results.iter().map(|r| r["id"].as_i64().unwrap()).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2]);
    assert!(results[0]["score"].as_f64().unwrap() >= results[1]["score"].as_f64().unwrap());

    let (status, body) = call(app, get("/search?q=nonexistentterm&k=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn search_on_empty_index_is_empty() {
    let dir = tempdir().unwrap();
    let (status, body) = call(app_in(dir.path()), get("/search?q=anything")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_hits"], 0);
}

#[tokio::test]
async fn rejects_out_of_range_k_and_blank_query() {
    let dir = tempdir().unwrap();
    let app = app_in(dir.path());
    let (status, _) = call(app.clone(), get("/search?q=food&k=21")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(app.clone(), get("/search?q=food&k=0")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = call(app, get("/search?q=%20")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn rejects_empty_payload() {
    let dir = tempdir().unwrap();
    let (status, _) = call(app_in(dir.path()), ingest(json!([]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn requires_api_key() {
    let dir = tempdir().unwrap();
    let app = app_in(dir.path());
    let req = Request::get("/search?q=food").body(Body::empty()).unwrap();
    let (status, _) = call(app.clone(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::get("/search?q=food").header("X-API-KEY", "wrong").body(Body::empty()).unwrap();
    let (status, _) = call(app.clone(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body) = call(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "empty");
}

#[tokio::test]
async fn restart_serves_persisted_index() {
    let dir = tempdir().unwrap();
    let (_, before) = {
        let app = app_in(dir.path());
        call(app.clone(), ingest(reviews())).await;
        call(app, get("/search?q=service&k=2")).await
    };

    let app = app_in(dir.path());
    let (status, after) = call(app.clone(), get("/search?q=service&k=2")).await;
    assert_eq!(status, StatusCode::OK);
    let ids = |v: &Value| -> Vec<i64> {
        v["results"].as_array().unwrap().iter().map(|r| r["id"].as_i64().unwrap()).collect()
    };
    assert_eq!(ids(&before), ids(&after));

    let (_, health) = call(app, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(health["documents"], 3);
    assert_eq!(health["state"], "fitted");
}
