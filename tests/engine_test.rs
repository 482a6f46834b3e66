//! Socket-level tests: the native reqwest engine driven through the full
//! router against a wiremock server.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt; // for `oneshot`
use wiremock::matchers::{body_string, header as header_matcher, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use relaybox::api::build_router;
use relaybox::api::models::ResponseWrapper;
use relaybox::api::state::AppState;
use relaybox::config::Config;
use relaybox::engine::native::NativeEngine;

fn native_app() -> Router {
    let config = Config::default();
    let engine = Arc::new(NativeEngine::new(config.engine.clone()));
    build_router(AppState::new(config, engine))
}

fn post_json(uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(payload).unwrap()))
        .unwrap()
}

async fn wrapper_for(app: Router, descriptor: Value) -> ResponseWrapper {
    let response = app.oneshot(post_json("/request", &descriptor)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn roundtrip_with_headers_params_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/submit"))
        .and(query_param("page", "2"))
        .and(header_matcher("x-probe", "on"))
        .and(body_string("pass=b&user=a"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-served-by", "wiremock")
                .set_body_string("accepted"),
        )
        .mount(&server)
        .await;

    let wrapper = wrapper_for(
        native_app(),
        json!({
            "url": format!("{}/submit", server.uri()),
            "method": "POST",
            "headers": {"X-Probe": "on"},
            "params": {"page": "2"},
            "data": {"user": "a", "pass": "b"},
        }),
    )
    .await;

    let record = wrapper.response.unwrap();
    assert_eq!(record.status, 200);
    assert_eq!(record.body, "accepted");
    assert_eq!(record.used_protocol, "HTTP/1.1");
    assert_eq!(
        record.header("x-served-by"),
        Some("wiremock")
    );
    assert!(record.target.ends_with("/submit?page=2"));
}

#[tokio::test]
async fn engine_follows_redirects_for_a_single_dispatch() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/landed"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/landed"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .mount(&server)
        .await;

    let wrapper = wrapper_for(
        native_app(),
        json!({"url": format!("{}/start", server.uri())}),
    )
    .await;

    let record = wrapper.response.unwrap();
    assert_eq!(record.status, 200);
    assert_eq!(record.body, "done");
    // target reflects where the engine actually landed
    assert!(record.target.ends_with("/landed"));
}

#[tokio::test]
async fn history_walk_reports_each_hop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/middle"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/middle"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/landed"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/landed"))
        .respond_with(ResponseTemplate::new(200).set_body_string("done"))
        .mount(&server)
        .await;

    let wrapper = wrapper_for(
        native_app(),
        json!({
            "url": format!("{}/start", server.uri()),
            "wantHistory": true,
            "followRedirects": true,
        }),
    )
    .await;

    assert!(wrapper.is_history);
    let history = wrapper.history.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].status, 302);
    assert_eq!(history[1].status, 301);
    assert_eq!(history[2].status, 200);
    assert_eq!(history[2].body, "done");
    for hop in &history[..2] {
        assert!((300..=399).contains(&hop.status));
    }
}

#[tokio::test]
async fn batch_against_real_sockets_preserves_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow")
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fast"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fast"))
        .mount(&server)
        .await;

    let batch = json!([
        {"url": format!("{}/slow", server.uri())},
        {"url": format!("{}/fast", server.uri())},
        {"url": "http://127.0.0.1:1/unreachable", "timeout": 2.0},
    ]);

    let response = native_app()
        .oneshot(post_json("/multirequest", &batch))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let wrappers: Vec<ResponseWrapper> = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(wrappers.len(), 3);
    assert_eq!(wrappers[0].response.as_ref().unwrap().body, "slow");
    assert_eq!(wrappers[1].response.as_ref().unwrap().body, "fast");
    // the unreachable sibling fails alone, in its own slot
    let failed = wrappers[2].response.as_ref().unwrap();
    assert_eq!(failed.status, 0);
    assert!(!failed.body.is_empty());
}

#[tokio::test]
async fn session_cookies_survive_across_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/set"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "sid=abc123; Path=/")
                .set_body_string("cookie set"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/check"))
        .and(header_matcher("cookie", "sid=abc123"))
        .respond_with(ResponseTemplate::new(200).set_body_string("cookie seen"))
        .mount(&server)
        .await;

    let app = native_app();

    let first = wrapper_for(
        app.clone(),
        json!({"url": format!("{}/set", server.uri()), "sessionId": "jar-test"}),
    )
    .await;
    let record = first.response.unwrap();
    assert_eq!(record.session_id.as_deref(), Some("jar-test"));
    assert_eq!(record.cookies.get("sid"), Some(&"abc123".to_string()));

    let second = wrapper_for(
        app,
        json!({"url": format!("{}/check", server.uri()), "sessionId": "jar-test"}),
    )
    .await;
    assert_eq!(second.response.unwrap().body, "cookie seen");
}

#[tokio::test]
async fn binary_body_is_base64_with_detection() {
    let server = MockServer::start().await;
    let payload: Vec<u8> = vec![0x89, b'P', b'N', b'G', 0xff, 0xfe];
    Mock::given(method("GET"))
        .and(path("/blob"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&server)
        .await;

    let wrapper = wrapper_for(
        native_app(),
        json!({
            "url": format!("{}/blob", server.uri()),
            "detectEncoding": true,
        }),
    )
    .await;

    let record = wrapper.response.unwrap();
    assert!(record.is_base64);

    use base64::Engine as _;
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(record.body.as_bytes())
        .unwrap();
    assert_eq!(decoded, payload);
}

#[tokio::test]
async fn descriptor_timeout_bounds_the_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stall"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("too late")
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let wrapper = wrapper_for(
        native_app(),
        json!({
            "url": format!("{}/stall", server.uri()),
            "timeout": 0.3,
        }),
    )
    .await;

    let record = wrapper.response.unwrap();
    assert_eq!(record.status, 0);
    assert!(record.body.contains("timed out"));
}
