use crate::capture::decision::{CaptureReason, Decision};
use crate::monitor::MonitorSnapshot;
use crate::rpc::message::TaskStatus;
use crate::util::format::{format_bytes, format_speed};

/// Format one monitor poll (human or JSON)
pub fn format_snapshot(snapshot: &MonitorSnapshot, json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(snapshot).unwrap_or_else(|_| "{}".to_string());
    }

    if snapshot.servers.is_empty() {
        return "No servers configured.".to_string();
    }

    let mut output = String::new();
    for server in &snapshot.servers {
        if server.connected {
            output.push_str(&format!(
                "✓ {} active={} waiting={} stopped={} ↓{} ↑{}\n",
                server.name,
                server.active,
                server.waiting,
                server.stopped,
                format_speed(server.download_speed),
                format_speed(server.upload_speed)
            ));
        } else {
            output.push_str(&format!(
                "✗ {} {}\n",
                server.name,
                server.error.as_deref().unwrap_or("not connected")
            ));
        }
    }

    output.push_str(&format!(
        "Total: {} active, {} waiting, {} stopped, ↓{}",
        snapshot.active,
        snapshot.waiting,
        snapshot.stopped,
        format_speed(snapshot.download_speed)
    ));
    if let Some(progress) = snapshot.progress {
        output.push_str(&format!(", {:.0}% done", progress * 100.0));
    }
    output
}

/// Format one Aria2 task (human or JSON)
pub fn format_task(task: &TaskStatus, json: bool) -> String {
    if json {
        return serde_json::to_string_pretty(task).unwrap_or_else(|_| "{}".to_string());
    }

    let mut output = String::new();
    output.push_str(&format!("GID: {}\n", task.gid));
    output.push_str(&format!("Status: {}\n", task.status));
    if let Some(name) = task.torrent_name() {
        output.push_str(&format!("Torrent: {}\n", name));
    }
    if !task.dir.is_empty() {
        output.push_str(&format!("Directory: {}\n", task.dir));
    }
    if task.total_length > 0 {
        let progress = (task.completed_length as f64 / task.total_length as f64 * 100.0) as u8;
        output.push_str(&format!(
            "Progress: {} / {} ({}%)\n",
            format_bytes(task.completed_length),
            format_bytes(task.total_length),
            progress
        ));
    }
    for file in &task.files {
        output.push_str(&format!("File: {}\n", file.path));
    }
    output.trim_end().to_string()
}

/// One-line verdict for `decide`
pub fn format_decision(decision: &Decision) -> String {
    match decision {
        Decision::Capture(CaptureReason::AllowedHost(pattern)) => {
            format!("capture: host matches allowed pattern {}", pattern)
        }
        Decision::Capture(CaptureReason::AllowedExtension(ext)) => {
            format!("capture: filename matches allowed extension {}", ext)
        }
        Decision::Capture(CaptureReason::SizeThreshold) => {
            "capture: at or above the size threshold".to_string()
        }
        Decision::Skip(reason) => format!("skip: {}", reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::decision::SkipReason;
    use crate::rpc::message::GlobalStat;
    use crate::app::config::RpcServerConfig;
    use crate::rpc::RpcError;

    #[test]
    fn test_format_snapshot_lists_servers() {
        let mut snapshot = MonitorSnapshot::default();
        snapshot.record_success(
            &RpcServerConfig::new("Local", "http://localhost:6800/jsonrpc"),
            &GlobalStat {
                num_active: 1,
                download_speed: 2048,
                ..Default::default()
            },
        );
        snapshot.record_failure(
            &RpcServerConfig::new("NAS", "http://nas.lan:6800/jsonrpc"),
            &RpcError::ConnectionClosed,
            false,
        );

        let text = format_snapshot(&snapshot, false);
        assert!(text.contains("✓ Local active=1"));
        assert!(text.contains("↓2.00 KB/s"));
        assert!(text.contains("✗ NAS Connection closed"));

        let json: serde_json::Value =
            serde_json::from_str(&format_snapshot(&snapshot, true)).unwrap();
        assert_eq!(json["connected"], 1);
        assert_eq!(json["servers"][1]["name"], "NAS");
    }

    #[test]
    fn test_format_task_progress() {
        let task: TaskStatus = serde_json::from_value(serde_json::json!({
            "gid": "2089b05ecca3d829",
            "status": "active",
            "totalLength": "1048576",
            "completedLength": "524288"
        }))
        .unwrap();
        let text = format_task(&task, false);
        assert!(text.contains("GID: 2089b05ecca3d829"));
        assert!(text.contains("Progress: 512.00 KB / 1.00 MB (50%)"));
    }

    #[test]
    fn test_format_decision() {
        assert_eq!(
            format_decision(&Decision::Skip(SkipReason::BelowSizeThreshold)),
            "skip: smaller than the size threshold"
        );
        assert_eq!(
            format_decision(&Decision::Capture(CaptureReason::SizeThreshold)),
            "capture: at or above the size threshold"
        );
    }
}
