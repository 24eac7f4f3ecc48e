use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, Item};
use serde_json::Value;
use tower::{Service, ServiceExt};

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

async fn call(app: &mut Router, request: Request<String>) -> axum::response::Response {
    ServiceExt::<Request<String>>::ready(app)
        .await
        .unwrap()
        .call(request)
        .await
        .unwrap()
}

async fn list(app: &mut Router, uri: &str) -> Vec<Item> {
    let resp = call(app, empty_request("GET", uri)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    serde_json::from_value(body["items"].clone()).unwrap()
}

// --- index ---

#[tokio::test]
async fn index_reports_app_name() {
    let resp = app().oneshot(empty_request("GET", "/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body["message"], "TODO APP");
}

#[tokio::test]
async fn responses_allow_any_origin() {
    let request = Request::builder()
        .uri("/items")
        .header(http::header::ORIGIN, "http://localhost:3000")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(request).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[http::header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}

#[tokio::test]
async fn preflight_is_answered() {
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/item/update/1/true")
        .header(http::header::ORIGIN, "http://localhost:3000")
        .header(http::header::ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(request).await.unwrap();
    assert!(resp.status().is_success());
    assert!(resp.headers().contains_key(http::header::ACCESS_CONTROL_ALLOW_METHODS));
}

// --- list ---

#[tokio::test]
async fn list_items_empty() {
    let resp = app().oneshot(empty_request("GET", "/items")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body, serde_json::json!({ "items": [] }));
}

#[tokio::test]
async fn filter_rejects_non_boolean() {
    let resp = app()
        .oneshot(empty_request("GET", "/items/filter/maybe"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_ACCEPTABLE);
}

// --- create ---

#[tokio::test]
async fn create_item_returns_201_with_singular_items_object() {
    let resp = app()
        .oneshot(json_request("POST", "/item/create", r#"{"item":"Buy milk"}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = body_json(resp).await;
    let item: Item = serde_json::from_value(body["items"].clone()).unwrap();
    assert_eq!(item.id, "1");
    assert_eq!(item.item, "Buy milk");
    assert!(!item.done);
}

#[tokio::test]
async fn create_item_trims_text() {
    let resp = app()
        .oneshot(json_request("POST", "/item/create", r#"{"item":"  padded  "}"#))
        .await
        .unwrap();
    let body: Value = body_json(resp).await;
    assert_eq!(body["items"]["item"], "padded");
}

#[tokio::test]
async fn create_item_empty_text_returns_406() {
    let resp = app()
        .oneshot(json_request("POST", "/item/create", r#"{"item":"   "}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_ACCEPTABLE);
}

#[tokio::test]
async fn create_item_malformed_json_returns_400() {
    let resp = app()
        .oneshot(json_request("POST", "/item/create", "{not json"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- update / delete ---

#[tokio::test]
async fn update_item_not_found() {
    let resp = app()
        .oneshot(empty_request("PATCH", "/item/update/42/true"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_item_not_found() {
    let resp = app()
        .oneshot(empty_request("DELETE", "/item/delete/42"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- full lifecycle ---

#[tokio::test]
async fn crud_lifecycle() {
    let mut app = app();

    // create two, listing keeps insertion order
    for text in ["Walk dog", "Feed cat"] {
        let body = format!(r#"{{"item":"{text}"}}"#);
        let resp = call(&mut app, json_request("POST", "/item/create", &body)).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }
    let items = list(&mut app, "/items").await;
    let texts: Vec<&str> = items.iter().map(|i| i.item.as_str()).collect();
    assert_eq!(texts, ["Walk dog", "Feed cat"]);

    // mark the first done
    let resp = call(&mut app, empty_request("PATCH", "/item/update/1/true")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = body_json(resp).await;
    assert_eq!(body["todo"], "1");

    // filtered listings
    let done = list(&mut app, "/items/filter/true").await;
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, "1");
    let open = list(&mut app, "/items/filter/false").await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, "2");

    // anything but "true" clears the flag
    let resp = call(&mut app, empty_request("PATCH", "/item/update/1/false")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(list(&mut app, "/items/filter/true").await.is_empty());

    // delete
    let resp = call(&mut app, empty_request("DELETE", "/item/delete/1")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(!body_bytes(resp).await.is_empty());

    // delete again: 404
    let resp = call(&mut app, empty_request("DELETE", "/item/delete/1")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // ids are not reused
    let resp = call(&mut app, json_request("POST", "/item/create", r#"{"item":"Again"}"#)).await;
    let body: Value = body_json(resp).await;
    assert_eq!(body["items"]["id"], "3");

    let items = list(&mut app, "/items").await;
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, ["2", "3"]);
}
