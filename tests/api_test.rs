use axum::body::Body;
use axum::http::{Request, StatusCode, header::CONTENT_RANGE};
use crudlite::CRUDResource;
use serde_json::{Value, json};
use tower::ServiceExt;

mod common;
use common::article_entity::Article;
use common::{seed_articles, setup_test_app, setup_test_db};

fn encode(raw: &str) -> String {
    raw.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}

async fn get(app: &axum::Router, uri: &str) -> (StatusCode, Option<String>, Value) {
    let request = Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let range = response
        .headers()
        .get(CONTENT_RANGE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap() };
    (status, range, json)
}

async fn send_json(app: &axum::Router, method: &str, uri: &str, payload: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(payload).unwrap()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() { Value::Null } else { serde_json::from_slice(&body).unwrap() };
    (status, json)
}

#[tokio::test]
async fn test_list_returns_envelope_and_content_range() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    seed_articles(&db).await.unwrap();
    let app = setup_test_app(&db);

    let (status, range, body) = get(&app, "/api/v1/articles").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(range.as_deref(), Some("articles 0-9/10"));
    assert_eq!(body["items"].as_array().unwrap().len(), 10);
    assert_eq!(body["total"], 10);
    assert_eq!(body["page"], 1);
    assert_eq!(body["per_page"], 20);
    assert_eq!(body["total_pages"], 1);
    assert_eq!(body["has_next"], false);
    assert_eq!(body["has_prev"], false);
}

#[tokio::test]
async fn test_list_paging_parameters() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    seed_articles(&db).await.unwrap();
    let app = setup_test_app(&db);

    let (status, range, body) = get(&app, "/api/v1/articles?page=2&per_page=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(range.as_deref(), Some("articles 5-9/10"));
    assert_eq!(body["page"], 2);
    assert_eq!(body["items"][0]["views"], 50);
    assert_eq!(body["has_prev"], true);
    assert_eq!(body["has_next"], false);

    // Non-numeric values fall back to the defaults
    let (status, _, body) = get(&app, "/api/v1/articles?page=abc&per_page=xyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 1);
    assert_eq!(body["per_page"], 20);

    // Out-of-range values are clamped
    let (status, _, body) = get(&app, "/api/v1/articles?page=0&per_page=100000").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], 1);
    assert_eq!(body["per_page"], 1000);

    let (status, _, body) = get(&app, "/api/v1/articles?page=9223372036854775807&per_page=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(0));
    assert_eq!(body["total"], 10);
    assert_eq!(body["has_next"], false);
}

#[tokio::test]
async fn test_list_filter_and_sort_parameters() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    seed_articles(&db).await.unwrap();
    let app = setup_test_app(&db);

    let filter = encode(r#"{"status": "published", "views": {">=": 40}}"#);
    let sort = encode(r#"["views","DESC"]"#);
    let (status, range, body) = get(&app, &format!("/api/v1/articles?filter={filter}&sort={sort}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(range.as_deref(), Some("articles 0-2/3"));
    let views: Vec<i64> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|item| item["views"].as_i64().unwrap())
        .collect();
    assert_eq!(views, vec![80, 60, 40]);

    let (_, _, body) = get(&app, "/api/v1/articles?sort_by=rating&order=desc&per_page=1").await;
    assert_eq!(body["items"][0]["views"], 90);

    let (_, _, body) = get(&app, "/api/v1/articles?q=RUST").await;
    assert_eq!(body["total"], 5);
}

#[tokio::test]
async fn test_list_rejects_invalid_filters() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    seed_articles(&db).await.unwrap();
    let app = setup_test_app(&db);

    let cases = [
        (r#"{"password": "x"}"#, "password"),
        (r#"{"views": {"~": 3}}"#, "~"),
        (r#"{"views": {">": 1, "<": 5}}"#, "views"),
        (r#"{"views": {"between": [1]}}"#, "between"),
        (r#"{"published": 1}"#, "published"),
        ("{not json", "filter"),
    ];

    for (filter, mention) in cases {
        let (status, range, body) = get(&app, &format!("/api/v1/articles?filter={}", encode(filter))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "filter {filter}");
        assert!(range.is_none());
        let message = body["error"].as_str().unwrap();
        assert!(message.contains(mention), "`{message}` should mention `{mention}`");
    }
}

#[tokio::test]
async fn test_get_one() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    let articles = seed_articles(&db).await.unwrap();
    let app = setup_test_app(&db);

    let (status, _, body) = get(&app, &format!("/api/v1/articles/{}", articles[4].id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Article 04");

    let (status, _, body) = get(&app, "/api/v1/articles/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "article not found");
}

#[tokio::test]
async fn test_create_update_delete() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    let app = setup_test_app(&db);

    let (status, created) = send_json(
        &app,
        "POST",
        "/api/v1/articles",
        &json!({"title": "Fresh", "author_email": "writer@example.com", "views": 3}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "draft");
    let id = created["id"].as_i64().unwrap();

    let (status, updated) = send_json(
        &app,
        "PUT",
        &format!("/api/v1/articles/{id}"),
        &json!({"title": "Renamed", "published": true}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Renamed");
    assert_eq!(updated["published"], true);
    assert_eq!(updated["views"], 3);

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/v1/articles/{id}"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _, _) = get(&app, &format!("/api/v1/articles/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_validation_failures_are_422() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    let app = setup_test_app(&db);

    let (status, body) = send_json(
        &app,
        "POST",
        "/api/v1/articles",
        &json!({"title": "", "author_email": "nobody"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Validation failed");
    assert_eq!(body["details"].as_array().unwrap().len(), 2);

    let (status, _) = send_json(&app, "PUT", "/api/v1/articles/9999", &json!({"title": "x"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_soft_deleted_rows_are_hidden_unless_requested() {
    let db = setup_test_db().await.expect("Failed to setup test database");
    let articles = seed_articles(&db).await.unwrap();
    let app = setup_test_app(&db);

    Article::soft_delete(&db, articles[0].id).await.unwrap();

    let (_, range, body) = get(&app, "/api/v1/articles").await;
    assert_eq!(body["total"], 9);
    assert_eq!(range.as_deref(), Some("articles 0-8/9"));

    let (_, _, body) = get(&app, "/api/v1/articles?include_deleted=true").await;
    assert_eq!(body["total"], 10);

    let (status, _, _) = get(&app, &format!("/api/v1/articles/{}", articles[0].id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
