use super::config::Config;
use crate::animation::AnimationEngine;
use crate::capture::CaptureEngine;
use crate::host::headless::HeadlessHost;
use crate::host::native::NativeDownloader;
use crate::monitor::Monitor;
use crate::notify::NotificationDispatcher;
use crate::rpc::ClientPool;
use crate::util::paths::resolve_default_download_directory;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Every long-lived component, built once per process
///
/// Components share configuration and RPC clients by reference; nothing lives
/// in module-level statics.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Config>>,
    pub host: Arc<HeadlessHost>,
    pub clients: Arc<ClientPool>,
    pub animation: Arc<AnimationEngine>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub capture: Arc<CaptureEngine>,
    pub monitor: Arc<Monitor>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let directory = config
            .bridge
            .download_directory
            .clone()
            .unwrap_or_else(resolve_default_download_directory);
        let native = NativeDownloader::new(directory, config.general.user_agent.as_deref())?;

        let default_icon = Some(config.animation.default_icon.as_str())
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        let host = Arc::new(HeadlessHost::new(
            native,
            config.bridge.icon_output.clone(),
            default_icon,
        ));

        Ok(Self::with_host(config, host))
    }

    /// Wire components around an existing host
    pub fn with_host(config: Config, host: Arc<HeadlessHost>) -> Self {
        let handles = host.handles();
        let animation = Arc::new(AnimationEngine::new(
            handles.icon.clone(),
            config.animation.clone(),
        ));
        let config = Arc::new(RwLock::new(config));
        let clients = Arc::new(ClientPool::new());

        let dispatcher = Arc::new(NotificationDispatcher::new(
            animation.clone(),
            handles.notifier.clone(),
            config.clone(),
        ));
        let capture = Arc::new(CaptureEngine::new(
            config.clone(),
            handles.downloads.clone(),
            clients.clone(),
            dispatcher.clone(),
        ));
        let monitor = Arc::new(Monitor::new(
            config.clone(),
            clients.clone(),
            animation.clone(),
            dispatcher.clone(),
            handles.badge.clone(),
            handles.power.clone(),
        ));

        Self {
            config,
            host,
            clients,
            animation,
            dispatcher,
            capture,
            monitor,
        }
    }

    /// Bring capture and monitoring in line with the current config
    pub async fn start(&self) {
        self.capture.sync_with_config().await;
        self.monitor.sync_with_config().await;
    }

    /// Swap in a new configuration and re-sync every component
    pub async fn reload(&self, config: Config) {
        let servers = config.rpc.clone();
        *self.config.write().await = config;
        self.clients.retain_configured(&servers).await;
        self.start().await;
        tracing::info!("Configuration reloaded ({} servers)", servers.len());
    }

    /// Stop every component and release host resources
    pub async fn shutdown(&self) {
        self.capture.disable();
        self.monitor.stop().await;
        self.animation.shutdown().await;
        self.clients.close_all().await;
        tracing::info!("Shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureState;
    use crate::rpc::RpcClient;
    use tempfile::TempDir;

    fn state(config: Config) -> (AppState, TempDir) {
        let dir = TempDir::new().unwrap();
        let native = NativeDownloader::new(dir.path().to_path_buf(), None).unwrap();
        let host = Arc::new(HeadlessHost::new(native, None, None));
        (AppState::with_host(config, host), dir)
    }

    #[tokio::test]
    async fn test_start_follows_flags() {
        let mut config = Config::default_with_servers();
        config.capture.enabled = true;
        config.monitor.enabled = false;
        let (state, _dir) = state(config);

        state.start().await;
        assert_eq!(state.capture.state(), CaptureState::Enabled);
        assert_eq!(state.host.listener_count(), 1);
        assert!(!state.monitor.is_running());

        state.shutdown().await;
        assert_eq!(state.capture.state(), CaptureState::Disabled);
        assert_eq!(state.host.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_reload_disables_capture_and_drops_clients() {
        let mut config = Config::default_with_servers();
        config.capture.enabled = true;
        config.monitor.enabled = false;
        let (state, _dir) = state(config.clone());
        state.start().await;

        let server = config.rpc[0].clone();
        let _client: Arc<RpcClient> = state.clients.client_for(&server).await.unwrap();
        assert_eq!(state.clients.len().await, 1);

        config.capture.enabled = false;
        config.rpc[0].name = "Renamed".to_string();
        state.reload(config).await;

        assert_eq!(state.capture.state(), CaptureState::Disabled);
        assert!(state.clients.is_empty().await);
    }
}
