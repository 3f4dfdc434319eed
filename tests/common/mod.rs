#![allow(dead_code)]

use aria2_capture::app::config::{Config, RpcServerConfig};
use aria2_capture::app::state::AppState;
use aria2_capture::host::headless::HeadlessHost;
use aria2_capture::host::native::NativeDownloader;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

// Initialize logging once for all tests
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// JSON-RPC success body
pub fn rpc_result(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result
    }))
}

/// JSON-RPC error body
pub fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": {"code": code, "message": message}
    }))
}

/// Answer every call to `rpc_method` on `/jsonrpc` with `result`
pub async fn mount_aria2_method(server: &MockServer, rpc_method: &str, result: Value) {
    Mock::given(method("POST"))
        .and(path("/jsonrpc"))
        .and(body_partial_json(json!({"method": rpc_method})))
        .respond_with(rpc_result(result))
        .mount(server)
        .await;
}

/// Mock Aria2 that accepts `addUri` and reports an idle global stat
pub async fn setup_mock_aria2() -> MockServer {
    let server = MockServer::start().await;
    mount_aria2_method(&server, "aria2.addUri", json!("2089b05ecca3d829")).await;
    mount_aria2_method(
        &server,
        "aria2.getGlobalStat",
        json!({
            "downloadSpeed": "0",
            "uploadSpeed": "0",
            "numActive": "0",
            "numWaiting": "0",
            "numStopped": "0",
            "numStoppedTotal": "0"
        }),
    )
    .await;
    server
}

pub fn jsonrpc_url(server: &MockServer) -> String {
    format!("{}/jsonrpc", server.uri())
}

pub fn server_config(name: &str, url: &str, pattern: &str) -> RpcServerConfig {
    let mut server = RpcServerConfig::new(name, url);
    server.pattern = pattern.to_string();
    server
}

/// Config with the given servers, monitor off and no fallback cooldown
pub fn create_test_config(servers: Vec<RpcServerConfig>) -> Config {
    let mut config = Config::default();
    config.rpc = servers;
    config.monitor.enabled = false;
    config.capture.fallback_cooldown_secs = 0;
    config
}

/// App state on a headless host whose native downloads land in a temp dir
pub fn create_test_state(config: Config) -> (AppState, TempDir) {
    let dir = TempDir::new().unwrap();
    let native = NativeDownloader::new(dir.path().to_path_buf(), None).unwrap();
    let host = Arc::new(HeadlessHost::new(native, None, None));
    (AppState::with_host(config, host), dir)
}

/// Decoded JSON-RPC requests the mock received for `rpc_method`
pub async fn received_calls(server: &MockServer, rpc_method: &str) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter_map(|r: &Request| serde_json::from_slice::<Value>(&r.body).ok())
        .filter(|body| body["method"] == rpc_method)
        .collect()
}

/// Serve `content` for GET `file_path`
pub async fn setup_mock_file_server(file_path: &str, content: Vec<u8>) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(file_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content))
        .mount(&server)
        .await;
    server
}
