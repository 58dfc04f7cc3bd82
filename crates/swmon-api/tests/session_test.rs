#![allow(clippy::unwrap_used)]
// Integration tests for `SwitchClient` and `DeviceSession` using wiremock.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use swmon_api::{
    Credentials, DeviceSession, Endpoint, Error, SessionPhase, SwitchClient, TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn credentials() -> Credentials {
    Credentials::new("admin", SecretString::from("hunter2"))
}

fn client_for(server: &MockServer) -> SwitchClient {
    SwitchClient::with_client(reqwest::Client::new(), Url::parse(&server.uri()).unwrap())
}

async fn setup() -> (MockServer, DeviceSession) {
    let server = MockServer::start().await;
    let session = DeviceSession::new("sw-core", client_for(&server), credentials())
        .with_request_spacing(Duration::ZERO);
    (server, session)
}

fn login_ok(tid: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "errorcode": 0,
        "data": { "_tid_": tid, "usrLvl": 1 }
    }))
}

fn cpu_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "data": { "cpu": [17] }
    }))
}

async fn mount_login(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/data/login.json"))
        .and(body_partial_json(json!({
            "username": "admin",
            "password": "hunter2",
            "operation": "write"
        })))
        .respond_with(login_ok("tid-1"))
        .expect(expected_calls)
        .mount(server)
        .await;
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn test_login_success_returns_token() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;

    let token = client_for(&server)
        .login(&credentials(), Some(Duration::from_secs(600)))
        .await
        .unwrap();

    assert_eq!(token.tid, "tid-1");
    assert_eq!(token.user_level, 1);
    assert!(token.expires_at.is_some());
}

#[tokio::test]
async fn test_login_rejected_credentials() {
    let (server, session) = setup().await;

    Mock::given(method("POST"))
        .and(path("/data/login.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "errorcode": -1
        })))
        .mount(&server)
        .await;

    let result = session.authenticate().await;

    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert_eq!(session.phase(), SessionPhase::Unauthenticated);
}

#[tokio::test]
async fn test_login_forbidden() {
    let (server, session) = setup().await;

    Mock::given(method("POST"))
        .and(path("/data/login.json"))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let result = session.authenticate().await;
    assert!(matches!(result, Err(Error::Authentication { .. })));
}

#[tokio::test]
async fn test_login_server_error_is_transient_not_auth() {
    let (server, session) = setup().await;

    Mock::given(method("POST"))
        .and(path("/data/login.json"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(1)
        .mount(&server)
        .await;

    let err = session.authenticate().await.unwrap_err();
    assert!(
        matches!(err, Error::Unavailable { status: 503, .. }),
        "expected Unavailable, got: {err:?}"
    );
    assert!(err.is_transient());
    assert!(err.is_unreachable());
}

#[tokio::test]
async fn test_login_timeout_reports_configured_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/data/login.json"))
        .respond_with(login_ok("tid-1").set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let transport = TransportConfig {
        timeout: Duration::from_millis(200),
        ..TransportConfig::default()
    };
    let client = SwitchClient::new(Url::parse(&server.uri()).unwrap(), &transport).unwrap();

    let err = client.login(&credentials(), None).await.unwrap_err();
    assert!(
        matches!(err, Error::Timeout { timeout_ms: 200 }),
        "expected Timeout, got: {err:?}"
    );
}

// ── Requests ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_first_request_authenticates_lazily() {
    let (server, session) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/data/cpuInfo.json"))
        .and(query_param("_tid_", "tid-1"))
        .and(query_param("usrLvl", "1"))
        .and(body_partial_json(json!({ "unit": "unit1" })))
        .respond_with(cpu_ok())
        .expect(2)
        .mount(&server)
        .await;

    assert_eq!(session.phase(), SessionPhase::Unauthenticated);
    let data = session.fetch(Endpoint::CpuInfo).await.unwrap();
    assert_eq!(data, json!({ "cpu": [17] }));
    assert_eq!(session.phase(), SessionPhase::Authenticated);

    // Token is reused: login mock expects exactly one call.
    session.fetch(Endpoint::CpuInfo).await.unwrap();
}

#[tokio::test]
async fn test_requests_are_spaced() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/data/cpuInfo.json"))
        .respond_with(cpu_ok())
        .expect(2)
        .mount(&server)
        .await;

    let spacing = Duration::from_millis(300);
    let session = DeviceSession::new("sw-core", client_for(&server), credentials())
        .with_request_spacing(spacing);

    // Login, then two fetches: two enforced gaps.
    let started = std::time::Instant::now();
    session.fetch(Endpoint::CpuInfo).await.unwrap();
    session.fetch(Endpoint::CpuInfo).await.unwrap();
    assert!(
        started.elapsed() >= spacing * 2,
        "requests completed in {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_log_table_sends_token_in_headers() {
    let (server, session) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/data/logtable.json"))
        .and(header("_tid_", "tid-1"))
        .and(header("usrLvl", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{ "time": "2024-01-01 10:00:00", "module": 196, "severity": 5, "content": "hi" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let data = session.fetch(Endpoint::LogTable).await.unwrap();
    assert_eq!(data.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_expired_session_reauthenticates_exactly_once() {
    let (server, session) = setup().await;
    mount_login(&server, 2).await;

    // First data call answers with the login page, later ones succeed.
    Mock::given(method("POST"))
        .and(path("/data/cpuInfo.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>login</body></html>"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/data/cpuInfo.json"))
        .respond_with(cpu_ok())
        .expect(1)
        .mount(&server)
        .await;

    let data = session.fetch(Endpoint::CpuInfo).await.unwrap();
    assert_eq!(data["cpu"][0], 17);
    assert_eq!(session.phase(), SessionPhase::Authenticated);
}

#[tokio::test]
async fn test_second_expiry_surfaces_session_error() {
    let (server, session) = setup().await;
    mount_login(&server, 2).await;

    Mock::given(method("POST"))
        .and(path("/data/cpuInfo.json"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;

    let result = session.fetch(Endpoint::CpuInfo).await;

    assert!(
        matches!(result, Err(Error::Session { .. })),
        "expected Session error, got: {result:?}"
    );
    assert_eq!(session.phase(), SessionPhase::Unauthenticated);
}

#[tokio::test]
async fn test_envelope_timeout_code_counts_as_expiry() {
    let (server, session) = setup().await;
    mount_login(&server, 2).await;

    Mock::given(method("POST"))
        .and(path("/data/systemInfo.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "errorcode": swmon_api::switch::client::SESSION_TIMEOUT_CODE
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/data/systemInfo.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": { "dev_name": "core" }
        })))
        .mount(&server)
        .await;

    let data = session.fetch(Endpoint::SystemInfo).await.unwrap();
    assert_eq!(data["dev_name"], "core");
}

#[tokio::test]
async fn test_device_error_is_not_retried() {
    let (server, session) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/data/portStatusCfg.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "errorcode": 7
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = session.fetch(Endpoint::PortStatus).await;
    assert!(
        matches!(result, Err(Error::DeviceApi { code: 7, .. })),
        "expected DeviceApi error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_malformed_json_is_deserialization_error() {
    let (server, session) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/data/swtMacTableCfg.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"success\": tru"))
        .mount(&server)
        .await;

    let result = session.fetch(Endpoint::MacTable).await;
    assert!(matches!(result, Err(Error::Deserialization { .. })));
}

#[tokio::test]
async fn test_unreachable_device() {
    // Nothing listens on the discard port.
    let client = SwitchClient::with_client(
        reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap(),
        Url::parse("http://127.0.0.1:9").unwrap(),
    );
    let session = DeviceSession::new("sw-gone", client, credentials());

    let err = session.fetch(Endpoint::CpuInfo).await.unwrap_err();
    assert!(err.is_unreachable(), "expected unreachable, got: {err:?}");
}

#[tokio::test]
async fn test_logout_drops_token() {
    let (server, session) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/data/logout.json"))
        .and(query_param("_tid_", "tid-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    session.authenticate().await.unwrap();
    session.logout().await.unwrap();
    assert_eq!(session.phase(), SessionPhase::Unauthenticated);

    // A second logout without a token is a no-op.
    session.logout().await.unwrap();
}
