//! HTTP 接口测试

mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use card_activation::api::http::{AppState, HttpOptions, build_router};
use common::{DEFAULT_OTP, Harness, PIN};
use serde_json::{Value, json};
use tower::ServiceExt;

fn router(h: &Harness) -> Router {
    build_router(AppState::new(h.service.clone()), &HttpOptions::default())
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, header::HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn create_card(app: &Router) -> String {
    let (status, _, body) = send(app, post("/api/cards/create", json!({ "pin": PIN }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pin"], PIN);
    body["card_token"].as_str().unwrap().to_string()
}

fn otp_request(token: &str, pin: &str) -> Value {
    json!({
        "card_token": token,
        "pin": pin,
        "channel": "email",
        "email": "holder@example.com",
    })
}

#[tokio::test]
async fn test_full_activation_over_http() {
    let h = Harness::new();
    let app = router(&h);
    let token = create_card(&app).await;

    let (status, _, body) = send(&app, post("/api/cards/request-otp", otp_request(&token, PIN))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["delivery"], "sent");
    assert_eq!(body["expires_in_seconds"], 300);

    let (status, _, body) = send(
        &app,
        post(
            "/api/cards/verify",
            json!({ "card_token": token, "otp": DEFAULT_OTP, "activated_by": "admin-1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    let (status, _, body) = send(&app, get(&format!("/api/cards/{token}/status"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], true);
    assert!(body["activated_at"].is_string());
}

#[tokio::test]
async fn test_wrong_pin_is_problem_json() {
    let h = Harness::new();
    let app = router(&h);
    let token = create_card(&app).await;

    let (status, headers, body) =
        send(&app, post("/api/cards/request-otp", otp_request(&token, "0000"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::CONTENT_TYPE], "application/problem+json");
    assert_eq!(body["status"], 401);
}

#[tokio::test]
async fn test_lockout_sets_retry_after() {
    let h = Harness::new();
    let app = router(&h);
    let token = create_card(&app).await;

    for _ in 0..5 {
        let (status, _, _) =
            send(&app, post("/api/cards/request-otp", otp_request(&token, "0000"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, headers, _) =
        send(&app, post("/api/cards/request-otp", otp_request(&token, PIN))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(headers[header::RETRY_AFTER], "900");
}

#[tokio::test]
async fn test_bad_requests() {
    let h = Harness::new();
    let app = router(&h);
    let token = create_card(&app).await;

    let mut bad_channel = otp_request(&token, PIN);
    bad_channel["channel"] = json!("fax");
    let (status, _, _) = send(&app, post("/api/cards/request-otp", bad_channel)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut no_email = otp_request(&token, PIN);
    no_email["email"] = Value::Null;
    let (status, _, _) = send(&app, post("/api/cards/request-otp", no_email)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &app,
        post("/api/cards/verify", json!({ "card_token": "", "otp": DEFAULT_OTP })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let malformed = Request::post("/api/cards/verify")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, headers, _) = send(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers[header::CONTENT_TYPE], "application/problem+json");
}

#[tokio::test]
async fn test_otp_errors_map_to_status() {
    let h = Harness::new();
    let app = router(&h);
    let token = create_card(&app).await;

    let verify = |otp: &str| post("/api/cards/verify", json!({ "card_token": token, "otp": otp }));

    let (status, _, _) = send(&app, verify(DEFAULT_OTP)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    send(&app, post("/api/cards/request-otp", otp_request(&token, PIN))).await;

    let (status, _, _) = send(&app, verify("000000")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(&app, verify(DEFAULT_OTP)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(&app, verify(DEFAULT_OTP)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unknown_card_is_not_found() {
    let h = Harness::new();
    let app = router(&h);

    let (status, _, _) = send(&app, get("/api/cards/missing/status")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) =
        send(&app, post("/api/cards/request-otp", otp_request("missing", PIN))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let h = Harness::new();
    let app = router(&h);

    let (status, _, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);

    let (status, _, _) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
