use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::RwLock;

/// Environment variable that points at a config directory
pub const CONFIG_DIR_ENV: &str = "ARIA2_CAPTURE_CONFIG_DIR";

/// Environment variable that lets tests use a not-yet-created override
pub const TEST_MODE_ENV: &str = "ARIA2_CAPTURE_TEST_MODE";

const APP_DIR_NAME: &str = "aria2-capture";

// Config directory override (for --config flag and tests)
static CONFIG_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Set config directory override (used by --config flag and tests)
pub fn set_config_dir_override(path: Option<PathBuf>) {
    let mut override_path = CONFIG_DIR_OVERRIDE.write().unwrap();
    *override_path = path;
}

/// Get current config directory override
pub fn get_config_dir_override() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE.read().unwrap().clone()
}

/// Find config directory by searching in priority order:
/// 1. Override from --config flag or set_config_dir_override()
/// 2. Environment variable ARIA2_CAPTURE_CONFIG_DIR
/// 3. User config directory (`~/.config/aria2-capture/` on Unix)
/// 4. Current working directory (`./config/`)
/// 5. Executable directory (`<exe_dir>/config/`)
///
/// If nothing exists yet, the user config directory is created.
pub fn find_config_directory() -> Result<PathBuf> {
    if let Some(override_path) = get_config_dir_override() {
        if override_path.exists() || std::env::var(TEST_MODE_ENV).is_ok() {
            tracing::debug!("Using config directory override: {:?}", override_path);
            return Ok(override_path);
        }
        tracing::warn!("Config directory override does not exist: {:?}", override_path);
    }

    if let Ok(env_path) = std::env::var(CONFIG_DIR_ENV) {
        let env_config = PathBuf::from(env_path);
        if env_config.exists() {
            tracing::debug!("Found config directory from {}: {:?}", CONFIG_DIR_ENV, env_config);
            return Ok(env_config);
        }
    }

    if let Ok(user_config) = get_user_config_dir() {
        if user_config.exists() {
            return Ok(user_config);
        }
    }

    let local_candidates = [
        std::env::current_dir().ok().map(|cwd| cwd.join("config")),
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|dir| dir.join("config"))),
    ];
    if let Some(found) = local_candidates.into_iter().flatten().find(|p| p.exists()) {
        tracing::debug!("Found config directory at: {:?}", found);
        return Ok(found);
    }

    let user_config = get_user_config_dir()?;
    std::fs::create_dir_all(&user_config).context("Failed to create user config directory")?;
    tracing::info!("Created config directory at: {:?}", user_config);
    Ok(user_config)
}

/// Platform config dir joined with the application name
fn get_user_config_dir() -> Result<PathBuf> {
    let base_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine user config directory"))?;
    Ok(base_dir.join(APP_DIR_NAME))
}

/// Get absolute path to settings.toml
pub fn get_app_config_path() -> Result<PathBuf> {
    Ok(find_config_directory()?.join("settings.toml"))
}

/// Get absolute path to the logs directory
pub fn get_logs_dir() -> Result<PathBuf> {
    Ok(find_config_directory()?.join("logs"))
}

/// Directory used by the native downloader when nothing else is configured
pub fn resolve_default_download_directory() -> PathBuf {
    dirs::download_dir()
        .or_else(|| std::env::current_dir().ok().map(|cwd| cwd.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("Downloads"))
}
