use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete configuration (saved to config/settings.toml)
///
/// The runtime only ever reads this; writes come from `config init` or an
/// external options editor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default = "default_rpc_servers")]
    pub rpc: Vec<RpcServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Identifier of this extension; downloads it started itself are never captured
    #[serde(default = "default_self_extension_id")]
    pub self_extension_id: String,
    /// Sent as a `User-Agent:` header line with captured downloads when set
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_self_extension_id() -> String {
    "aria2-capture".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            self_extension_id: default_self_extension_id(),
            user_agent: None,
        }
    }
}

/// One Aria2 endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcServerConfig {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub secret: String,
    /// Download directory passed as the `dir` option (empty: daemon default)
    #[serde(default)]
    pub location: String,
    /// Comma-separated wildcard list used to route downloads to this server
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub ignore_insecure_warning: bool,
}

impl RpcServerConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            secret: String::new(),
            location: String::new(),
            pattern: String::new(),
            ignore_insecure_warning: false,
        }
    }

    /// `location` as a directory, `None` when left to the daemon
    pub fn download_directory(&self) -> Option<PathBuf> {
        Some(self.location.trim())
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
    }

    pub fn is_local(&self) -> bool {
        crate::util::net::is_loopback_url(&self.url)
    }
}

fn default_rpc_servers() -> Vec<RpcServerConfig> {
    vec![RpcServerConfig::new("Aria2", "http://localhost:6800/jsonrpc")]
}

/// Download capture rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Host wildcards that are always captured
    #[serde(default)]
    pub allowed_sites: Vec<String>,
    /// Host wildcards that are never captured
    #[serde(default)]
    pub blocked_sites: Vec<String>,
    /// Filename suffixes that are always captured (`*` for any)
    #[serde(default)]
    pub allowed_exts: Vec<String>,
    /// Filename suffixes that are never captured (`*` for any)
    #[serde(default)]
    pub blocked_exts: Vec<String>,
    /// Size threshold for everything the lists above did not decide
    #[serde(default)]
    pub min_file_size_mb: u64,
    /// Extensions whose downloads may still be captured
    #[serde(default)]
    pub allowed_extension_ids: Vec<String>,
    /// Extensions whose downloads are left alone (`*` for all)
    #[serde(default)]
    pub blocked_extension_ids: Vec<String>,
    /// Pause after a failed capture against a local daemon
    #[serde(default = "default_fallback_cooldown_secs")]
    pub fallback_cooldown_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_fallback_cooldown_secs() -> u64 {
    30
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_sites: Vec::new(),
            blocked_sites: Vec::new(),
            allowed_exts: Vec::new(),
            blocked_exts: Vec::new(),
            min_file_size_mb: 0,
            allowed_extension_ids: Vec::new(),
            blocked_extension_ids: Vec::new(),
            fallback_cooldown_secs: default_fallback_cooldown_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Poll every configured server instead of only the first
    #[serde(default)]
    pub monitor_all: bool,
    /// Hold a keep-awake lock while a local server has active tasks
    #[serde(default)]
    pub keep_awake: bool,
    #[serde(default = "default_true")]
    pub badge: bool,
    /// Poll interval while tasks are active
    #[serde(default = "default_active_interval_ms")]
    pub active_interval_ms: u64,
    /// Poll interval while idle
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,
}

fn default_active_interval_ms() -> u64 {
    1000
}

fn default_idle_interval_ms() -> u64 {
    3000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            monitor_all: false,
            keep_awake: false,
            badge: true,
            active_interval_ms: default_active_interval_ms(),
            idle_interval_ms: default_idle_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationConfig {
    #[serde(default = "default_icon_size")]
    pub icon_size: u32,
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    #[serde(default = "default_transition_ms")]
    pub transition_ms: u64,
    #[serde(default = "default_fade_steps")]
    pub fade_steps: u32,
    #[serde(default = "default_fade_step_ms")]
    pub fade_step_ms: u64,
    /// Progress movement per frame, as a fraction of the full ring
    #[serde(default = "default_progress_step")]
    pub progress_step: f32,
    #[serde(default = "default_download_duration_ms")]
    pub download_duration_ms: u64,
    #[serde(default = "default_complete_duration_ms")]
    pub complete_duration_ms: u64,
    #[serde(default = "default_error_duration_ms")]
    pub error_duration_ms: u64,
    #[serde(default = "default_progress_duration_ms")]
    pub progress_duration_ms: u64,
    #[serde(default = "default_pause_duration_ms")]
    pub pause_duration_ms: u64,
    /// Static icon restored when no animation is showing
    #[serde(default = "default_icon_path")]
    pub default_icon: String,
}

fn default_icon_size() -> u32 {
    32
}
fn default_frame_interval_ms() -> u64 {
    60
}
fn default_transition_ms() -> u64 {
    300
}
fn default_fade_steps() -> u32 {
    10
}
fn default_fade_step_ms() -> u64 {
    50
}
fn default_progress_step() -> f32 {
    0.02
}
fn default_download_duration_ms() -> u64 {
    2500
}
fn default_complete_duration_ms() -> u64 {
    2500
}
fn default_error_duration_ms() -> u64 {
    3000
}
fn default_progress_duration_ms() -> u64 {
    6000
}
fn default_pause_duration_ms() -> u64 {
    3000
}
fn default_icon_path() -> String {
    "images/logo64.png".to_string()
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            icon_size: default_icon_size(),
            frame_interval_ms: default_frame_interval_ms(),
            transition_ms: default_transition_ms(),
            fade_steps: default_fade_steps(),
            fade_step_ms: default_fade_step_ms(),
            progress_step: default_progress_step(),
            download_duration_ms: default_download_duration_ms(),
            complete_duration_ms: default_complete_duration_ms(),
            error_duration_ms: default_error_duration_ms(),
            progress_duration_ms: default_progress_duration_ms(),
            pause_duration_ms: default_pause_duration_ms(),
            default_icon: default_icon_path(),
        }
    }
}

/// Local bridge that a browser shim feeds with download events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_bridge_port")]
    pub port: u16,
    /// Shared token the shim must present (empty: no check)
    #[serde(default)]
    pub token: String,
    /// Latest icon frame is written here as PNG when set
    #[serde(default)]
    pub icon_output: Option<PathBuf>,
    /// Target directory for native fallback downloads
    #[serde(default)]
    pub download_directory: Option<PathBuf>,
}

fn default_bridge_port() -> u16 {
    16801
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_bridge_port(),
            token: String::new(),
            icon_output: None,
            download_directory: None,
        }
    }
}

impl Config {
    /// Load configuration from the resolved config directory
    ///
    /// A missing file yields defaults; an unparsable or invalid one is an error.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = crate::util::paths::get_app_config_path()?;
        if !config_path.exists() {
            tracing::info!("Config not found at {:?}, using defaults", config_path);
            return Ok(Self::default_with_servers());
        }
        Self::load_from(&config_path)
    }

    /// Load and validate a specific settings file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let content =
            std::fs::read_to_string(path).context(format!("Failed to read {:?}", path))?;
        let config: Self =
            toml::from_str(&content).context(format!("Failed to parse {:?}", path))?;

        if let Err(errors) = crate::app::settings::validate_config(&config) {
            return Err(anyhow::anyhow!(
                "Invalid configuration: {}",
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Save configuration to the resolved config directory
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = crate::util::paths::get_app_config_path()?;
        self.save_to(&config_path)
    }

    /// Validate and atomically write to `path` (temp file + rename)
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        if let Err(errors) = crate::app::settings::validate_config(self) {
            return Err(anyhow::anyhow!(
                "Cannot save invalid config: {}",
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        let temp_path = path.with_extension("toml.tmp");
        std::fs::write(&temp_path, &content).context("Failed to write temp config file")?;
        std::fs::rename(&temp_path, path).context("Failed to rename temp config file")?;

        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// `Default` leaves the server list empty; this adds the local daemon
    pub fn default_with_servers() -> Self {
        Self {
            rpc: default_rpc_servers(),
            ..Self::default()
        }
    }

    /// First configured server, the one the monitor treats as primary
    pub fn primary_server(&self) -> Option<&RpcServerConfig> {
        self.rpc.first()
    }

    /// Look up a server by display name
    pub fn server_by_name(&self, name: &str) -> Option<&RpcServerConfig> {
        self.rpc.iter().find(|s| s.name == name)
    }
}
