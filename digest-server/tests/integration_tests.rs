//! Integration tests for the digest gateway

use digest_core::{Gate, GateConfig};
use digest_server::{build_router, AppState, BackendClient, BackendProxy, HealthResponse, HealthStatus};
use serde_json::{json, Value};
use std::sync::{Arc, Once};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

static INIT: Once = Once::new();

/// Nothing listens on port 1
const UNREACHABLE_BACKEND: &str = "http://127.0.0.1:1";

fn gate(tokens: &[&str]) -> Arc<Gate> {
    let config = GateConfig {
        tokens: tokens.iter().map(|t| t.to_string()).collect(),
        token_env: None,
        ..GateConfig::default()
    };
    Arc::new(Gate::new(&config).expect("valid gate config"))
}

/// Start the gateway in front of `backend_url`, return its base URL
async fn setup_test_server(tokens: &[&str], backend_url: &str) -> (String, tokio::task::JoinHandle<()>) {
    setup_with_gate(gate(tokens), backend_url).await
}

async fn setup_with_gate(gate: Arc<Gate>, backend_url: &str) -> (String, tokio::task::JoinHandle<()>) {
    INIT.call_once(|| {
        digest_server::metrics::init_prometheus().expect("Failed to init Prometheus");
        digest_server::metrics::init_metrics();
    });

    let proxy = BackendProxy::new(backend_url).expect("valid backend URL");
    let backend = BackendClient::new(backend_url).expect("valid backend URL");
    let state = AppState::new(gate, proxy, backend);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to port");
    let addr = listener.local_addr().expect("Failed to get local address");
    let base_url = format!("http://{}", addr);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (base_url, handle)
}

/// Client that reports redirects instead of following them
fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("Failed to build client")
}

#[tokio::test]
async fn test_api_path_without_credential_is_401() {
    let (base_url, _handle) = setup_test_server(&["secret"], UNREACHABLE_BACKEND).await;

    let response = client()
        .get(format!("{}/api/report/xyz", base_url))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 401);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body, json!({ "error": "unauthorized" }));
}

#[tokio::test]
async fn test_page_without_credential_redirects_to_login() {
    let (base_url, _handle) = setup_test_server(&["secret"], UNREACHABLE_BACKEND).await;

    let response = client()
        .get(format!("{}/dashboard", base_url))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 307);
    assert_eq!(
        response.headers()["location"].to_str().unwrap(),
        "/onboarding?from=%2Fdashboard"
    );
}

#[tokio::test]
async fn test_nested_page_redirect_keeps_full_path() {
    let (base_url, _handle) = setup_test_server(&["secret"], UNREACHABLE_BACKEND).await;

    let response = client()
        .get(format!("{}/report/abc", base_url))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 307);
    assert_eq!(
        response.headers()["location"].to_str().unwrap(),
        "/onboarding?from=%2Freport%2Fabc"
    );
}

#[tokio::test]
async fn test_health_always_passes() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "healthy" })))
        .mount(&backend)
        .await;

    let (base_url, _handle) = setup_test_server(&["secret"], &backend.uri()).await;

    let response = client()
        .get(format!("{}/health", base_url))
        .header("authorization", "Bearer wrong")
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 200);
    let body: HealthResponse = response.json().await.expect("Failed to parse response");
    assert_eq!(body.status, HealthStatus::Healthy);
    assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_health_degraded_when_backend_down() {
    let (base_url, _handle) = setup_test_server(&[], UNREACHABLE_BACKEND).await;

    let response = client()
        .get(format!("{}/health", base_url))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["backend"], "disconnected");
}

#[tokio::test]
async fn test_proxy_relays_upstream_404_unchanged() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reports/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "not_found" })))
        .mount(&backend)
        .await;

    let (base_url, _handle) = setup_test_server(&["secret"], &backend.uri()).await;

    let response = client()
        .get(format!("{}/api/report/missing", base_url))
        .header("authorization", "Bearer secret")
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body, json!({ "error": "not_found" }));
}

#[tokio::test]
async fn test_proxy_connection_failure_is_502() {
    let (base_url, _handle) = setup_test_server(&["secret"], UNREACHABLE_BACKEND).await;

    let response = client()
        .get(format!("{}/api/report/xyz", base_url))
        .header("authorization", "Bearer secret")
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 502);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"]["code"], "PROXY_ERROR");
    assert!(!body["error"]["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_proxy_non_json_body_is_502() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reports/r1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&backend)
        .await;

    let (base_url, _handle) = setup_test_server(&[], &backend.uri()).await;

    let response = client()
        .get(format!("{}/api/report/r1", base_url))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 502);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"]["code"], "PROXY_ERROR");
}

#[tokio::test]
async fn test_proxy_forwards_credentials_and_post_body() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/reports/r1"))
        .and(header("authorization", "Bearer secret"))
        .and(header("cookie", "digest-session=s1"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({ "lang": "en" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "r1" })))
        .expect(1)
        .mount(&backend)
        .await;

    let (base_url, _handle) = setup_test_server(&["secret"], &backend.uri()).await;

    let response = client()
        .post(format!("{}/api/report/r1", base_url))
        .header("authorization", "Bearer secret")
        .header("cookie", "digest-session=s1")
        .body(r#"{"lang":"en"}"#)
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body, json!({ "id": "r1" }));
}

#[tokio::test]
async fn test_proxy_forwards_every_cookie_header() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reports/r1"))
        .respond_with(|req: &Request| {
            let cookies: Vec<&[u8]> = req
                .headers
                .get_all("cookie")
                .iter()
                .map(|value| value.as_bytes())
                .collect();
            let expected: [&[u8]; 2] = [b"name=Jos\xc3\xa9", b"digest-token=secret"];
            if cookies == expected {
                ResponseTemplate::new(200).set_body_json(json!({ "id": "r1" }))
            } else {
                ResponseTemplate::new(400)
            }
        })
        .expect(1)
        .mount(&backend)
        .await;

    let (base_url, _handle) = setup_test_server(&["secret"], &backend.uri()).await;

    let response = client()
        .get(format!("{}/api/report/r1", base_url))
        .header(
            "cookie",
            reqwest::header::HeaderValue::from_bytes("name=José".as_bytes()).unwrap(),
        )
        .header("cookie", "digest-token=secret")
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn test_proxy_relays_body_bytes_verbatim() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reports/r1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"zeta":1, "alpha":[2,1]}"#, "application/json"),
        )
        .mount(&backend)
        .await;

    let (base_url, _handle) = setup_test_server(&[], &backend.uri()).await;

    let response = client()
        .get(format!("{}/api/report/r1", base_url))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let body = response.text().await.expect("Failed to read body");
    assert_eq!(body, r#"{"zeta":1, "alpha":[2,1]}"#);
}

#[tokio::test]
async fn test_proxy_relays_empty_body() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reports/r1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&backend)
        .await;

    let (base_url, _handle) = setup_test_server(&[], &backend.uri()).await;

    let response = client()
        .get(format!("{}/api/report/r1", base_url))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 204);
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_proxy_without_credentials_sends_none() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/reports/r1"))
        .respond_with(|req: &Request| {
            if req.headers.contains_key("authorization") || req.headers.contains_key("cookie") {
                ResponseTemplate::new(400)
            } else {
                ResponseTemplate::new(200).set_body_json(json!({ "id": "r1" }))
            }
        })
        .mount(&backend)
        .await;

    // Empty allow-list: the gate fails open
    let (base_url, _handle) = setup_test_server(&[], &backend.uri()).await;

    let response = client()
        .get(format!("{}/api/report/r1", base_url))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn test_token_cookie_admits_page() {
    let (base_url, _handle) = setup_test_server(&["secret"], UNREACHABLE_BACKEND).await;

    let response = client()
        .get(format!("{}/dashboard", base_url))
        .header("cookie", "foo=1; digest-token=secret")
        .send()
        .await
        .expect("Failed to send request");

    // Admitted by the gate, then no route matches
    assert_eq!(response.status().as_u16(), 404);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_configured_session_cookie_admits_page() {
    let config = GateConfig {
        tokens: vec!["secret".into()],
        token_env: None,
        session_cookies: vec!["digest-session".into()],
        ..GateConfig::default()
    };
    let gate = Arc::new(Gate::new(&config).expect("valid gate config"));
    let (base_url, _handle) = setup_with_gate(gate, UNREACHABLE_BACKEND).await;

    let response = client()
        .get(format!("{}/subscriptions", base_url))
        .header("cookie", "digest-session=abc")
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn test_session_cookie_refused_by_default() {
    let (base_url, _handle) = setup_test_server(&["secret"], UNREACHABLE_BACKEND).await;

    let response = client()
        .get(format!("{}/api/report/x", base_url))
        .header("cookie", "digest-session=anything")
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn test_wrong_token_still_redirects() {
    let (base_url, _handle) = setup_test_server(&["secret"], UNREACHABLE_BACKEND).await;

    let response = client()
        .get(format!("{}/account", base_url))
        .header("authorization", "Bearer nope")
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 307);
}

#[tokio::test]
async fn test_lookalike_prefix_is_not_gated() {
    let (base_url, _handle) = setup_test_server(&["secret"], UNREACHABLE_BACKEND).await;

    let response = client()
        .get(format!("{}/dashboards", base_url))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (base_url, _handle) = setup_test_server(&["secret"], UNREACHABLE_BACKEND).await;

    // Produce at least one gate decision
    client()
        .get(format!("{}/dashboard", base_url))
        .send()
        .await
        .expect("Failed to send request");

    let response = client()
        .get(format!("{}/metrics", base_url))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status().as_u16(), 200);
    let body = response.text().await.expect("Failed to read body");
    assert!(body.contains("digest_gate_decisions_total"));
    assert!(body.contains(r#"reason="redirect""#));
}

#[tokio::test]
async fn test_gate_reload_applies_to_running_server() {
    let gate = gate(&["old"]);
    let proxy = BackendProxy::new(UNREACHABLE_BACKEND).unwrap();
    let backend = BackendClient::new(UNREACHABLE_BACKEND).unwrap();
    let app = build_router(AppState::new(gate.clone(), proxy, backend));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let send = |token: &'static str| {
        client()
            .get(format!("{}/dashboard", base_url))
            .header("authorization", format!("Bearer {}", token))
            .send()
    };

    assert_eq!(send("old").await.unwrap().status().as_u16(), 404);
    assert_eq!(send("new").await.unwrap().status().as_u16(), 307);

    gate.reload(&GateConfig {
        tokens: vec!["new".into()],
        token_env: None,
        ..GateConfig::default()
    })
    .unwrap();

    assert_eq!(send("new").await.unwrap().status().as_u16(), 404);
    assert_eq!(send("old").await.unwrap().status().as_u16(), 307);
}
