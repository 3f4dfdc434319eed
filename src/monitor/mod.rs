//! Periodic polling of the configured Aria2 daemons
//!
//! One cycle polls the servers, updates badge, keep-awake and the progress
//! animation, then picks the next interval. A changed interval replaces the
//! timer instead of mutating it.

pub mod badge;
pub mod snapshot;

pub use snapshot::MonitorSnapshot;

use crate::animation::{AnimationEngine, AnimationKind, Timer};
use crate::app::config::{Config, MonitorConfig, RpcServerConfig};
use crate::host::{BadgeSink, PowerManager};
use crate::notify::NotificationDispatcher;
use crate::rpc::message::GlobalStat;
use crate::rpc::{ClientPool, RpcClient, RpcResult};
use badge::BadgeState;
use snapshot::aggregate_progress;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

const PROGRESS_KEYS: &[&str] = &["totalLength", "completedLength"];

#[derive(Default)]
struct LoopState {
    running: bool,
    /// Bumped on start/stop so stale cycles bail out
    generation: u64,
    timer: Timer,
    interval: Option<Duration>,
    replacements: u64,
    listeners: HashMap<String, JoinHandle<()>>,
}

pub struct Monitor {
    config: Arc<RwLock<Config>>,
    clients: Arc<ClientPool>,
    animation: Arc<AnimationEngine>,
    dispatcher: Arc<NotificationDispatcher>,
    badge: Arc<dyn BadgeSink>,
    power: Arc<dyn PowerManager>,
    state: Mutex<LoopState>,
    latest: Mutex<Option<MonitorSnapshot>>,
}

impl Monitor {
    pub fn new(
        config: Arc<RwLock<Config>>,
        clients: Arc<ClientPool>,
        animation: Arc<AnimationEngine>,
        dispatcher: Arc<NotificationDispatcher>,
        badge: Arc<dyn BadgeSink>,
        power: Arc<dyn PowerManager>,
    ) -> Self {
        Self {
            config,
            clients,
            animation,
            dispatcher,
            badge,
            power,
            state: Mutex::new(LoopState::default()),
            latest: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().running
    }

    /// Interval the current timer was armed with
    pub fn current_interval(&self) -> Option<Duration> {
        self.state.lock().unwrap().interval
    }

    /// Times an armed timer was torn down for a different interval
    pub fn timer_replacements(&self) -> u64 {
        self.state.lock().unwrap().replacements
    }

    pub fn latest(&self) -> Option<MonitorSnapshot> {
        self.latest.lock().unwrap().clone()
    }

    /// Poll once right away, then keep polling on the adaptive timer
    pub async fn start(self: &Arc<Self>) {
        let generation = {
            let mut st = self.state.lock().unwrap();
            if st.running {
                return;
            }
            st.running = true;
            st.generation += 1;
            st.generation
        };
        tracing::info!("Monitor started");
        self.cycle(generation).await;
    }

    /// Stop polling, close sockets and release keep-awake
    pub async fn stop(&self) {
        let listeners = {
            let mut st = self.state.lock().unwrap();
            if !st.running {
                return;
            }
            st.running = false;
            st.generation += 1;
            st.timer.stop();
            st.interval = None;
            std::mem::take(&mut st.listeners)
        };
        for (_, handle) in listeners {
            handle.abort();
        }
        self.clients.close_all().await;
        self.power.keep_awake(false);
        tracing::info!("Monitor stopped");
    }

    /// Follow the `monitor.enabled` flag
    pub async fn sync_with_config(self: &Arc<Self>) {
        let enabled = self.config.read().await.monitor.enabled;
        if enabled {
            self.start().await;
        } else {
            self.stop().await;
        }
    }

    fn is_live(&self, generation: u64) -> bool {
        let st = self.state.lock().unwrap();
        st.running && st.generation == generation
    }

    async fn cycle(self: &Arc<Self>, generation: u64) -> bool {
        if !self.is_live(generation) {
            return false;
        }
        let snapshot = self.poll_once().await;
        if !self.is_live(generation) {
            return false;
        }

        let settings = self.config.read().await.monitor.clone();
        self.apply(&snapshot, &settings);
        *self.latest.lock().unwrap() = Some(snapshot.clone());

        // Last step: replacing the timer aborts the task running this cycle
        self.rearm(&snapshot, &settings, generation);
        true
    }

    /// Poll every monitored server once
    pub async fn poll_once(&self) -> MonitorSnapshot {
        let (servers, monitor_all) = {
            let config = self.config.read().await;
            (config.rpc.clone(), config.monitor.monitor_all)
        };

        let mut snapshot = MonitorSnapshot::default();
        for (index, server) in servers.iter().enumerate() {
            let primary = index == 0;
            match self.poll_server(server, primary).await {
                Ok((stat, progress)) => {
                    snapshot.record_success(server, &stat);
                    if primary {
                        snapshot.progress = progress;
                    }
                }
                Err(e) => {
                    tracing::debug!("Polling '{}' failed: {}", server.name, e);
                    snapshot.record_failure(server, &e, primary);
                }
            }
            if !monitor_all {
                break;
            }
        }
        snapshot
    }

    async fn poll_server(
        &self,
        server: &RpcServerConfig,
        primary: bool,
    ) -> RpcResult<(GlobalStat, Option<f32>)> {
        let client = self.clients.client_for(server).await?;

        // One-off polls stay on HTTP
        if self.is_running() {
            match client.open_socket().await {
                Ok(()) => self.ensure_listener(&server.name, &client),
                Err(e) => tracing::trace!("No socket to '{}', using HTTP: {}", server.name, e),
            }
        }

        let result = query_server(&client, &server.name, primary).await;

        // Stopped while this poll was in flight
        if !self.is_running() {
            client.close_socket().await;
        }
        result
    }

    fn ensure_listener(&self, name: &str, client: &Arc<RpcClient>) {
        let mut st = self.state.lock().unwrap();
        let alive = st.listeners.get(name).is_some_and(|h| !h.is_finished());
        if !alive {
            let handle = self.dispatcher.listen(client.clone());
            st.listeners.insert(name.to_string(), handle);
        }
    }

    fn apply(&self, snapshot: &MonitorSnapshot, monitor: &MonitorConfig) {
        if monitor.badge {
            let state = BadgeState::from_snapshot(snapshot);
            self.badge.set_badge(&state.text(), state.color());
        } else {
            self.badge.set_badge("", BadgeState::Idle.color());
        }
        self.badge.set_title(&badge::title(snapshot));

        self.power
            .keep_awake(monitor.keep_awake && snapshot.local_active > 0);

        if let Some(progress) = snapshot.progress {
            if let Err(e) = self.animation.start(AnimationKind::Progress, Some(progress)) {
                tracing::debug!("Progress animation skipped: {}", e);
            }
        }
    }

    /// Arm the timer for the interval `snapshot` calls for
    fn rearm(self: &Arc<Self>, snapshot: &MonitorSnapshot, monitor: &MonitorConfig, generation: u64) {
        let desired = Duration::from_millis(if snapshot.active > 0 {
            monitor.active_interval_ms
        } else {
            monitor.idle_interval_ms
        });

        let mut st = self.state.lock().unwrap();
        if !st.running || st.generation != generation {
            return;
        }
        if st.interval == Some(desired) && st.timer.is_active() {
            return;
        }

        let weak = Arc::downgrade(self);
        let timer = Timer::repeating(desired, move || {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(monitor) => monitor.cycle(generation).await,
                    None => false,
                }
            }
        });
        if st.timer.replace(timer) {
            st.replacements += 1;
            tracing::debug!("Monitor interval now {:?}", desired);
        }
        st.interval = Some(desired);
    }
}

/// Global stat, plus aggregate progress for a busy primary server
async fn query_server(
    client: &RpcClient,
    name: &str,
    primary: bool,
) -> RpcResult<(GlobalStat, Option<f32>)> {
    let stat = client.get_global_stat().await?;
    if !primary || stat.num_active == 0 {
        return Ok((stat, None));
    }
    let progress = match client.tell_active(PROGRESS_KEYS).await {
        Ok(tasks) => aggregate_progress(&tasks),
        Err(e) => {
            tracing::debug!("tellActive on '{}' failed: {}", name, e);
            None
        }
    };
    Ok((stat, progress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::engine::tests::RecordingIcon;
    use crate::host::{BadgeColor, Notifier};
    use crate::rpc::RpcFailureKind;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct FakeHost {
        badge: Mutex<(String, BadgeColor)>,
        title: Mutex<String>,
        awake: AtomicBool,
    }

    impl BadgeSink for FakeHost {
        fn set_badge(&self, text: &str, color: BadgeColor) {
            *self.badge.lock().unwrap() = (text.to_string(), color);
        }
        fn set_title(&self, title: &str) {
            *self.title.lock().unwrap() = title.to_string();
        }
    }

    impl PowerManager for FakeHost {
        fn keep_awake(&self, enabled: bool) {
            self.awake.store(enabled, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Notifier for FakeHost {
        async fn notify(&self, _title: &str, _message: &str) -> Result<()> {
            Ok(())
        }
    }

    fn stat_response(active: u64, speed: u64) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "downloadSpeed": speed.to_string(),
                "uploadSpeed": "0",
                "numActive": active.to_string(),
                "numWaiting": "0",
                "numStopped": "0",
                "numStoppedTotal": "0"
            }
        }))
    }

    async fn mount_tell_active(server: &MockServer) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "aria2.tellActive"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": [{"totalLength": "200", "completedLength": "50"}]
            })))
            .mount(server)
            .await;
    }

    fn monitor(config: Config) -> (Arc<Monitor>, Arc<FakeHost>, Arc<AnimationEngine>) {
        let config = Arc::new(RwLock::new(config));
        let host = Arc::new(FakeHost::default());
        let animation = Arc::new(AnimationEngine::new(
            Arc::new(RecordingIcon::default()),
            Default::default(),
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            animation.clone(),
            host.clone(),
            config.clone(),
        ));
        let monitor = Arc::new(Monitor::new(
            config,
            Arc::new(ClientPool::new()),
            animation.clone(),
            dispatcher,
            host.clone(),
            host.clone(),
        ));
        (monitor, host, animation)
    }

    fn config_for(urls: &[String]) -> Config {
        let mut config = Config::default();
        config.rpc = urls
            .iter()
            .enumerate()
            .map(|(i, url)| RpcServerConfig::new(format!("S{}", i), url.clone()))
            .collect();
        config
    }

    #[tokio::test]
    async fn test_idle_cycle_replaces_short_timer_exactly_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "aria2.getGlobalStat"})))
            .respond_with(stat_response(1, 0))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "aria2.getGlobalStat"})))
            .respond_with(stat_response(0, 0))
            .mount(&server)
            .await;
        mount_tell_active(&server).await;

        let mut config = config_for(&[format!("{}/jsonrpc", server.uri())]);
        config.monitor.active_interval_ms = 50;
        config.monitor.idle_interval_ms = 400;
        let (monitor, _host, _animation) = monitor(config);

        monitor.start().await;
        assert_eq!(monitor.current_interval(), Some(Duration::from_millis(50)));
        assert_eq!(monitor.timer_replacements(), 0);

        // Second poll sees no active tasks
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(monitor.current_interval(), Some(Duration::from_millis(400)));
        assert_eq!(monitor.timer_replacements(), 1);

        // Further idle polls keep the same timer
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(monitor.timer_replacements(), 1);

        monitor.stop().await;
        assert!(!monitor.is_running());
        assert_eq!(monitor.current_interval(), None);
    }

    #[tokio::test]
    async fn test_poll_drives_badge_progress_and_keep_awake() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "aria2.getGlobalStat"})))
            .respond_with(stat_response(2, 3 * 1024 * 1024 / 2))
            .mount(&server)
            .await;
        mount_tell_active(&server).await;

        let mut config = config_for(&[format!("{}/jsonrpc", server.uri())]);
        config.monitor.keep_awake = true;
        let (monitor, host, animation) = monitor(config);

        monitor.start().await;

        let snapshot = monitor.latest().unwrap();
        assert_eq!(snapshot.active, 2);
        assert_eq!(snapshot.local_active, 2);
        assert_eq!(snapshot.progress, Some(0.25));

        assert_eq!(host.badge.lock().unwrap().0, "1.5M");
        assert!(host.title.lock().unwrap().contains("1.50 MB/s"));
        assert!(host.awake.load(Ordering::SeqCst));
        assert_eq!(animation.current_kind(), Some(AnimationKind::Progress));
        assert_eq!(animation.progress().target, 0.25);

        monitor.stop().await;
        assert!(!host.awake.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_monitor_all_aggregates_and_classifies_primary() {
        let up = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(stat_response(0, 100))
            .mount(&up)
            .await;

        // Primary is unreachable, secondary answers
        let urls = [
            "http://127.0.0.1:1/jsonrpc".to_string(),
            format!("{}/jsonrpc", up.uri()),
        ];
        let mut config = config_for(&urls);
        config.monitor.monitor_all = true;
        let (monitor, _host, _animation) = monitor(config.clone());

        let snapshot = monitor.poll_once().await;
        assert_eq!(snapshot.connected, 1);
        assert_eq!(snapshot.disconnected, 1);
        assert_eq!(snapshot.download_speed, 100);
        assert_eq!(snapshot.primary_error, Some(RpcFailureKind::Unreachable));

        // Only the primary without monitor_all
        config.monitor.monitor_all = false;
        let (monitor, _host, _animation) = self::monitor(config);
        let snapshot = monitor.poll_once().await;
        assert_eq!(snapshot.servers.len(), 1);
        assert_eq!(snapshot.connected, 0);
    }

    #[tokio::test]
    async fn test_error_badge_when_nothing_connected() {
        let config = config_for(&["http://127.0.0.1:1/jsonrpc".to_string()]);
        let (monitor, host, _animation) = monitor(config);

        monitor.start().await;
        assert_eq!(host.badge.lock().unwrap().0, "E");
        assert_eq!(*host.title.lock().unwrap(), "Aria2: not connected");
        monitor.stop().await;
    }
}
