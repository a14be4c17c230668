use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::json;
use tower::ServiceExt;
use tripwise_api::build_app;

const API_KEY: &str = "dev-tripwise-key";

#[tokio::test]
async fn health_is_public() {
    let app = build_app().await.expect("app should build");

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["status"], "ok");
    assert!(parsed.get("metrics").is_some());
}

#[tokio::test]
async fn create_plan_requires_api_key() {
    let app = build_app().await.expect("app should build");

    let request = Request::builder()
        .method("POST")
        .uri("/v1/trips")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "destination": "Goa",
                "start_date": "2024-01-10",
                "end_date": "2024-01-12",
                "budget": 20000,
                "trip_style": "mid"
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_request_lists_field_problems() {
    let app = build_app().await.expect("app should build");

    let request = Request::builder()
        .method("POST")
        .uri("/v1/trips")
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(
            json!({
                "destination": "x",
                "start_date": "not-a-date",
                "end_date": "2024-01-12",
                "budget": 50,
                "trip_style": "royal"
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["message"], "Invalid input");
    assert!(parsed["errors"].as_array().is_some_and(|e| e.len() >= 3));
}

#[tokio::test]
async fn low_budget_is_rejected_with_computed_minimum() {
    let app = build_app().await.expect("app should build");

    let request = Request::builder()
        .method("POST")
        .uri("/v1/trips")
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(
            json!({
                "destination": "Goa",
                "start_date": "2024-01-10",
                "end_date": "2024-01-12",
                "budget": 1000,
                "trip_style": "mid"
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let message = parsed["message"].as_str().unwrap_or_default();
    assert!(message.contains("4500"), "unexpected message: {message}");
    assert!(message.contains("3 days"), "unexpected message: {message}");
}

#[tokio::test]
async fn unknown_trip_returns_not_found() {
    let app = build_app().await.expect("app should build");

    let uri = format!("/v1/trips/{}", uuid::Uuid::new_v4());
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-api-key", API_KEY)
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn regenerate_rejects_non_positive_day() {
    let app = build_app().await.expect("app should build");

    let uri = format!("/v1/trips/{}/regenerate_day", uuid::Uuid::new_v4());
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(json!({ "day": 0 }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn add_place_on_unknown_trip_returns_not_found() {
    let app = build_app().await.expect("app should build");

    let uri = format!("/v1/trips/{}/places", uuid::Uuid::new_v4());
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(
            json!({
                "name": "Cafe Lilliput",
                "day": 1,
                "lat": 15.57,
                "lng": 73.74
            })
            .to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
