use super::config::Config;

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    NoRpcServers,
    InvalidRpcUrl { name: String, url: String },
    DuplicateRpcName(String),
    IntervalOrder { active_ms: u64, idle_ms: u64 },
    ZeroInterval(&'static str),
    InvalidProgressStep,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRpcServers => write!(f, "At least one RPC server must be configured"),
            Self::InvalidRpcUrl { name, url } => {
                write!(f, "RPC server '{}' has an invalid URL: {}", name, url)
            }
            Self::DuplicateRpcName(name) => write!(f, "Duplicate RPC server name: {}", name),
            Self::IntervalOrder { active_ms, idle_ms } => write!(
                f,
                "Active poll interval ({}ms) must not exceed idle interval ({}ms)",
                active_ms, idle_ms
            ),
            Self::ZeroInterval(field) => write!(f, "{} must be greater than zero", field),
            Self::InvalidProgressStep => write!(f, "animation.progress_step must be in (0, 1]"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Check that an RPC URL uses a supported scheme and has a host
pub fn is_valid_rpc_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https" | "ws" | "wss")
                && parsed.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

/// Validate a loaded configuration, collecting every problem found
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.rpc.is_empty() {
        errors.push(ValidationError::NoRpcServers);
    }

    let mut seen = std::collections::HashSet::new();
    for server in &config.rpc {
        if !is_valid_rpc_url(&server.url) {
            errors.push(ValidationError::InvalidRpcUrl {
                name: server.name.clone(),
                url: server.url.clone(),
            });
        }
        if !seen.insert(server.name.as_str()) {
            errors.push(ValidationError::DuplicateRpcName(server.name.clone()));
        }
    }

    let monitor = &config.monitor;
    if monitor.active_interval_ms == 0 {
        errors.push(ValidationError::ZeroInterval("monitor.active_interval_ms"));
    }
    if monitor.idle_interval_ms == 0 {
        errors.push(ValidationError::ZeroInterval("monitor.idle_interval_ms"));
    }
    if monitor.active_interval_ms > monitor.idle_interval_ms {
        errors.push(ValidationError::IntervalOrder {
            active_ms: monitor.active_interval_ms,
            idle_ms: monitor.idle_interval_ms,
        });
    }

    let animation = &config.animation;
    if animation.frame_interval_ms == 0 {
        errors.push(ValidationError::ZeroInterval("animation.frame_interval_ms"));
    }
    if animation.fade_step_ms == 0 {
        errors.push(ValidationError::ZeroInterval("animation.fade_step_ms"));
    }
    if !(animation.progress_step > 0.0 && animation.progress_step <= 1.0) {
        errors.push(ValidationError::InvalidProgressStep);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}
