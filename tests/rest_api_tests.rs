//! REST API endpoint tests (tower test utilities, no server needed).

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use scripteval::config::HttpConfig;
use scripteval::protocol::rest::create_router;
use scripteval::protocol::Handler;
use scripteval::Config;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn create_test_app() -> axum::Router {
    let handler = Arc::new(Handler::from_config(&Config::default()));
    create_router(handler, &HttpConfig::default())
}

async fn send_json_request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let req = match method {
        "GET" => Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
        "POST" => Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_string(&body.unwrap_or(json!({}))).unwrap(),
            ))
            .unwrap(),
        _ => panic!("Unsupported method"),
    };

    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap_or(json!({}));
    (status, json)
}

fn numeric_rows(values: &[f64]) -> Value {
    let rows: Vec<Value> = values
        .iter()
        .map(|v| json!({"duals": [{"numData": v}]}))
        .collect();
    json!({ "rows": rows })
}

// Health & Admin Endpoints
#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let (status, json) = send_json_request(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["success"].as_bool().unwrap_or(false));
    assert_eq!(json["data"]["status"], "healthy");
    assert!(json["data"]["version"].is_string());
    assert!(json["data"]["uptime_secs"].is_number());
}

#[tokio::test]
async fn test_live_endpoint() {
    let app = create_test_app();

    let (status, json) = send_json_request(&app, "GET", "/live", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], "alive");
}

#[tokio::test]
async fn test_metrics_count_invocations() {
    let app = create_test_app();

    let body = json!({
        "header": {"script": "sum(args[0])", "returnType": "NUMERIC", "params": [{"dataType": 1, "name": "x"}]},
        "batches": [numeric_rows(&[1.0, 2.0])]
    });
    send_json_request(&app, "POST", "/api/v1/evaluate-script", Some(body)).await;
    let bad = json!({"header": {"script": "1 +", "returnType": "NUMERIC"}});
    send_json_request(&app, "POST", "/api/v1/evaluate-script", Some(bad)).await;

    let (status, json) = send_json_request(&app, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["invocations"], 2);
    assert_eq!(json["data"]["failures"], 1);
    assert_eq!(json["data"]["rows_in"], 2);
    assert_eq!(json["data"]["rows_out"], 1);
    assert!(json["data"]["uptime_secs"].is_number());
}

// Script Endpoint
#[tokio::test]
async fn test_evaluate_numeric_sequence() {
    let app = create_test_app();

    let body = json!({
        "header": {
            "script": "args[0] * 2",
            "functionType": "SCALAR",
            "returnType": "NUMERIC",
            "params": [{"dataType": "NUMERIC", "name": "x"}]
        },
        "batches": [numeric_rows(&[1.0, 2.5]), numeric_rows(&[4.0])]
    });
    let (status, json) = send_json_request(&app, "POST", "/api/v1/evaluate-script", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["success"].as_bool().unwrap_or(false));
    let batches = json["data"]["batches"].as_array().unwrap();
    assert_eq!(batches.len(), 1);
    let nums: Vec<f64> = batches[0]["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["duals"][0]["numData"].as_f64().unwrap())
        .collect();
    assert_eq!(nums, vec![2.0, 5.0, 8.0]);
}

#[tokio::test]
async fn test_evaluate_string_no_params() {
    let app = create_test_app();

    let body = json!({
        "header": {"script": "'ok'", "returnType": "STRING"},
        "metadata": {"client": "test"}
    });
    let (status, json) = send_json_request(&app, "POST", "/api/v1/evaluate-script", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["batches"][0]["rows"][0]["duals"][0]["strData"], "ok");
}

#[tokio::test]
async fn test_evaluate_mixed_params() {
    let app = create_test_app();

    let body = json!({
        "header": {
            "script": "[n if s == 'keep' else 0 for s, n in zip(args[0], args[1])]",
            "returnType": "NUMERIC",
            "params": [{"dataType": "STRING", "name": "s"}, {"dataType": "NUMERIC", "name": "n"}]
        },
        "batches": [{"rows": [
            {"duals": [{"strData": "keep"}, {"numData": 3}]},
            {"duals": [{"strData": "drop"}, {"numData": 4}]}
        ]}]
    });
    let (status, json) = send_json_request(&app, "POST", "/api/v1/evaluate-script", Some(body)).await;

    assert_eq!(status, StatusCode::OK);
    let rows = json["data"]["batches"][0]["rows"].as_array().unwrap();
    assert_eq!(rows[0]["duals"][0]["numData"], 3.0);
    assert_eq!(rows[1]["duals"][0]["numData"], 0.0);
}

#[tokio::test]
async fn test_evaluate_script_error_is_unknown() {
    let app = create_test_app();

    let body = json!({"header": {"script": "1 / 0", "returnType": "NUMERIC"}});
    let (status, json) = send_json_request(&app, "POST", "/api/v1/evaluate-script", Some(body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(!json["success"].as_bool().unwrap_or(true));
    assert_eq!(json["error"]["code"], "UNKNOWN");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("ZeroDivisionError"));
}

#[tokio::test]
async fn test_evaluate_unrecognized_param_is_invalid_argument() {
    let app = create_test_app();

    let body = json!({
        "header": {"script": "args", "returnType": "NUMERIC", "params": [{"dataType": 5, "name": "x"}]},
        "batches": [numeric_rows(&[1.0])]
    });
    let (status, json) = send_json_request(&app, "POST", "/api/v1/evaluate-script", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_evaluate_dual_return_is_unimplemented() {
    let app = create_test_app();

    let body = json!({"header": {"script": "1", "returnType": "DUAL"}});
    let (status, json) = send_json_request(&app, "POST", "/api/v1/evaluate-script", Some(body)).await;

    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(json["error"]["code"], "UNIMPLEMENTED");
}

#[tokio::test]
async fn test_evaluate_row_limit_is_resource_exhausted() {
    let mut config = Config::default();
    config.script.max_rows = 2;
    let app = create_router(Arc::new(Handler::from_config(&config)), &config.http);

    let body = json!({
        "header": {"script": "args[0]", "returnType": "NUMERIC", "params": [{"dataType": 1, "name": "x"}]},
        "batches": [numeric_rows(&[1.0, 2.0, 3.0])]
    });
    let (status, json) = send_json_request(&app, "POST", "/api/v1/evaluate-script", Some(body)).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json["error"]["code"], "RESOURCE_EXHAUSTED");
}

#[tokio::test]
async fn test_evaluate_malformed_body_rejected() {
    let app = create_test_app();

    let (status, _json) = send_json_request(
        &app,
        "POST",
        "/api/v1/evaluate-script",
        Some(json!({"batches": []})),
    )
    .await;

    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = create_test_app();

    let (status, _json) = send_json_request(&app, "GET", "/api/v1/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
