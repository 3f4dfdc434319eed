mod common;

use aria2_capture::host::BadgeSink;
use aria2_capture::ipc::{BridgeContext, start_bridge_server};
use common::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::{Duration, timeout};

const TOKEN: &str = "bridge-token";

struct Shim {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Shim {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send(&mut self, message: Value) {
        let mut line = message.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = timeout(Duration::from_secs(2), self.lines.next_line())
            .await
            .expect("bridge did not answer")
            .unwrap()
            .expect("bridge closed the connection");
        serde_json::from_str(&line).unwrap()
    }

    async fn request(&mut self, message: Value) -> Value {
        self.send(message).await;
        self.recv().await
    }
}

async fn start_bridge() -> (aria2_capture::AppState, SocketAddr, tempfile::TempDir) {
    let mut config = create_test_config(vec![server_config(
        "Remote",
        "http://nas.invalid:6800/jsonrpc",
        "",
    )]);
    // Keep emitted events away from any daemon
    config.capture.blocked_sites = vec!["example.com".to_string()];
    let (state, dir) = create_test_state(config);

    let context = BridgeContext {
        host: state.host.clone(),
        capture: state.capture.clone(),
        token: TOKEN.to_string(),
    };
    let (addr, _handle) = start_bridge_server(0, context).await.unwrap();
    assert!(addr.ip().is_loopback());
    (state, addr, dir)
}

#[tokio::test]
async fn test_ping_and_token_check() {
    init_logging();
    let (_state, addr, _dir) = start_bridge().await;
    let mut shim = Shim::connect(addr).await;

    let reply = shim.request(json!({"type": "ping", "token": TOKEN})).await;
    assert_eq!(reply, json!({"type": "pong"}));

    let reply = shim.request(json!({"type": "ping", "token": "nope"})).await;
    assert_eq!(reply["type"], "error");
    assert_eq!(reply["message"], "unauthorized");

    let reply = shim.request(json!({"type": "bogus"})).await;
    assert_eq!(reply["type"], "error");

    // Still usable after bad input
    let reply = shim.request(json!({"type": "ping", "token": TOKEN})).await;
    assert_eq!(reply["type"], "pong");
}

#[tokio::test]
async fn test_download_event_needs_enabled_capture() {
    let (state, addr, _dir) = start_bridge().await;
    let mut shim = Shim::connect(addr).await;
    let event = json!({
        "type": "download_determined",
        "token": TOKEN,
        "event": {"id": 1, "url": "http://example.com/a.zip", "fileSize": 10}
    });

    let reply = shim.request(event.clone()).await;
    assert_eq!(reply["type"], "skipped");
    assert_eq!(reply["reason"], "capture disabled");

    state.capture.enable();
    let reply = shim.request(event).await;
    assert_eq!(reply["type"], "ok");
}

#[tokio::test]
async fn test_active_tab_updates_capture() {
    let (state, addr, _dir) = start_bridge().await;
    let mut shim = Shim::connect(addr).await;

    let reply = shim
        .request(json!({"type": "active_tab", "token": TOKEN, "url": "https://example.org/page"}))
        .await;
    assert_eq!(reply["type"], "ok");
    assert_eq!(
        state.capture.active_tab().as_deref(),
        Some("https://example.org/page")
    );

    shim.request(json!({"type": "active_tab", "token": TOKEN})).await;
    assert_eq!(state.capture.active_tab(), None);
}

#[tokio::test]
async fn test_subscribed_shim_receives_host_commands() {
    let (state, addr, _dir) = start_bridge().await;
    let mut shim = Shim::connect(addr).await;

    let reply = shim.request(json!({"type": "subscribe", "token": TOKEN})).await;
    assert_eq!(reply["type"], "ok");
    assert_eq!(state.host.shim_count(), 1);

    state.host.set_badge("3", [0x1e, 0x88, 0xe5, 0xff]);
    let command = shim.recv().await;
    assert_eq!(
        command,
        json!({"type": "badge", "text": "3", "color": "#1e88e5ff"})
    );

    state.host.set_title("Aria2: 1/1 connected");
    let command = shim.recv().await;
    assert_eq!(command["type"], "title");
}
