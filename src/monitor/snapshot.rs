use crate::app::config::RpcServerConfig;
use crate::rpc::RpcError;
use crate::rpc::RpcFailureKind;
use crate::rpc::message::{GlobalStat, TaskStatus};
use chrono::{DateTime, Local};
use serde::Serialize;

/// Per-server result of one poll
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerSummary {
    pub name: String,
    pub connected: bool,
    pub local: bool,
    pub active: u64,
    pub waiting: u64,
    pub stopped: u64,
    pub download_speed: u64,
    pub upload_speed: u64,
    pub error: Option<String>,
}

/// Aggregate of one poll over every monitored server
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    pub connected: usize,
    pub disconnected: usize,
    pub local_connected: usize,
    /// Active tasks on loopback servers
    pub local_active: u64,
    pub active: u64,
    pub waiting: u64,
    pub stopped: u64,
    pub download_speed: u64,
    pub upload_speed: u64,
    /// Failure class of the primary server only
    pub primary_error: Option<RpcFailureKind>,
    pub primary_error_reason: Option<String>,
    /// Completed fraction of the primary server's active tasks
    pub progress: Option<f32>,
    pub servers: Vec<ServerSummary>,
    pub taken_at: DateTime<Local>,
}

impl Default for MonitorSnapshot {
    fn default() -> Self {
        Self {
            connected: 0,
            disconnected: 0,
            local_connected: 0,
            local_active: 0,
            active: 0,
            waiting: 0,
            stopped: 0,
            download_speed: 0,
            upload_speed: 0,
            primary_error: None,
            primary_error_reason: None,
            progress: None,
            servers: Vec::new(),
            taken_at: Local::now(),
        }
    }
}

impl MonitorSnapshot {
    pub fn record_success(&mut self, server: &RpcServerConfig, stat: &GlobalStat) {
        let local = server.is_local();
        self.connected += 1;
        if local {
            self.local_connected += 1;
            self.local_active += stat.num_active;
        }
        self.active += stat.num_active;
        self.waiting += stat.num_waiting;
        self.stopped += stat.num_stopped;
        self.download_speed += stat.download_speed;
        self.upload_speed += stat.upload_speed;

        self.servers.push(ServerSummary {
            name: server.name.clone(),
            connected: true,
            local,
            active: stat.num_active,
            waiting: stat.num_waiting,
            stopped: stat.num_stopped,
            download_speed: stat.download_speed,
            upload_speed: stat.upload_speed,
            error: None,
        });
    }

    pub fn record_failure(&mut self, server: &RpcServerConfig, error: &RpcError, primary: bool) {
        self.disconnected += 1;
        if primary {
            self.primary_error = Some(error.kind());
            self.primary_error_reason = Some(error.reason());
        }

        self.servers.push(ServerSummary {
            name: server.name.clone(),
            connected: false,
            local: server.is_local(),
            active: 0,
            waiting: 0,
            stopped: 0,
            download_speed: 0,
            upload_speed: 0,
            error: Some(error.to_string()),
        });
    }
}

/// Completed fraction over tasks with a known size
pub fn aggregate_progress(tasks: &[TaskStatus]) -> Option<f32> {
    let total: u64 = tasks.iter().map(|t| t.total_length).sum();
    if total == 0 {
        return None;
    }
    let done: u64 = tasks
        .iter()
        .map(|t| t.completed_length.min(t.total_length))
        .sum();
    Some((done as f64 / total as f64).clamp(0.0, 1.0) as f32)
}
