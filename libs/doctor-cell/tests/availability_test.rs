use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::router::doctor_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockRows, TestConfig, TestUser};

fn create_test_app(config: AppConfig) -> Router {
    doctor_routes(Arc::new(config))
}

fn config_for(mock_server: &MockServer) -> AppConfig {
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = mock_server.uri();
    config
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn doctor_sets_their_own_unavailability() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(24));

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_unavailability"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockRows::unavailability(&doctor.id, "2025-06-20", false, vec!["10:00 AM", "02:00 PM"])
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/{}/unavailability", doctor.id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "date": "2025-06-20",
                "full_day": false,
                "slots": ["10:00 AM", "02:00 PM"]
            })
            .to_string(),
        ))
        .unwrap();

    let response = create_test_app(config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["unavailability"]["full_day"], json!(false));
    assert_eq!(
        body["unavailability"]["slots"],
        json!(["10:00 AM", "02:00 PM"])
    );
}

#[tokio::test]
async fn malformed_slot_label_is_rejected_before_storage() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(24));

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/{}/unavailability", doctor.id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({
                "date": "2025-06-20",
                "full_day": false,
                "slots": ["sometime in the morning"]
            })
            .to_string(),
        ))
        .unwrap();

    let response = create_test_app(config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["kind"], json!("validation"));
}

#[tokio::test]
async fn doctor_cannot_manage_another_doctors_calendar() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(24));

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/{}/unavailability", Uuid::new_v4()))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"date": "2025-06-20", "full_day": true, "slots": []}).to_string(),
        ))
        .unwrap();

    let response = create_test_app(config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_may_manage_any_calendar() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");
    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(24));
    let doctor_id = Uuid::new_v4().to_string();

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_unavailability"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockRows::unavailability(&doctor_id, "2025-06-20", true, vec![])
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/{}/unavailability", doctor_id))
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"date": "2025-06-20", "full_day": true, "slots": []}).to_string(),
        ))
        .unwrap();

    let response = create_test_app(config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["unavailability"]["full_day"], json!(true));
}

#[tokio::test]
async fn range_query_returns_entries_in_window() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(24));

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_unavailability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::unavailability(&doctor.id, "2025-06-20", false, vec!["10:00 AM"]),
            MockRows::unavailability(&doctor.id, "2025-06-22", true, vec![]),
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri(format!(
            "/{}/unavailability?from=2025-06-19&to=2025-06-25",
            doctor.id
        ))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = create_test_app(config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let entries = body["unavailability"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["date"], json!("2025-06-20"));
    assert_eq!(entries[1]["date"], json!("2025-06-22"));
}

#[tokio::test]
async fn inverted_range_is_rejected() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(24));

    let request = Request::builder()
        .method("GET")
        .uri(format!(
            "/{}/unavailability?from=2025-06-25&to=2025-06-19",
            doctor.id
        ))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = create_test_app(config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_signature_token_is_rejected() {
    let mock_server = MockServer::start().await;
    let doctor = TestUser::doctor("doctor@example.com");
    let config = config_for(&mock_server);
    let token = JwtTestUtils::create_invalid_signature_token(&doctor);

    let request = Request::builder()
        .method("GET")
        .uri(format!(
            "/{}/unavailability?from=2025-06-19&to=2025-06-25",
            doctor.id
        ))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();

    let response = create_test_app(config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
