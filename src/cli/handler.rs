use super::error;
use super::output;
use super::{Commands, ConfigAction};
use crate::app::config::{Config, RpcServerConfig};
use crate::app::state::AppState;
use crate::capture::{CaptureRuleSet, DownloadEvent, DownloadRequest, should_capture};
use crate::rpc::RpcError;
use crate::rpc::resolve::resolve_server;
use anyhow::{Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Handle a CLI command and return exit code
pub async fn handle_command(command: Commands, state: AppState) -> i32 {
    let result = match command {
        Commands::Run => super::daemon::run_daemon(state).await.map(|_| error::SUCCESS),
        Commands::Add {
            urls,
            filename,
            server,
            referrer,
            multi,
        } => handle_add(urls, filename, server, referrer, multi, &state).await,
        Commands::Stats { json } => handle_stats(&state, json).await,
        Commands::Status { gid, server, json } => handle_status(gid, server, json, &state).await,
        Commands::Decide { event, tab } => handle_decide(&event, tab, &state).await,
        Commands::Config { action } => handle_config(action, &state).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            error::ERROR
        }
    }
}

/// Pick a server by name, or by URL routing when no name is given
fn pick_server(config: &Config, name: Option<&str>, url: &str) -> Option<RpcServerConfig> {
    match name {
        Some(name) => config.server_by_name(name).cloned(),
        None => resolve_server(&config.rpc, url).cloned(),
    }
}

/// Send URLs to Aria2
async fn handle_add(
    urls: Vec<String>,
    filename: Option<String>,
    server: Option<String>,
    referrer: Option<String>,
    multi: bool,
    state: &AppState,
) -> Result<i32> {
    if let Some(bad) = urls.iter().find(|u| url::Url::parse(u).is_err()) {
        eprintln!("Invalid URL: {}", bad);
        return Ok(error::INVALID_INPUT);
    }

    let (target, user_agent) = {
        let config = state.config.read().await;
        (
            pick_server(&config, server.as_deref(), &urls[0]),
            config.general.user_agent.clone(),
        )
    };
    let Some(target) = target else {
        eprintln!("No matching RPC server configured");
        return Ok(error::NOT_FOUND);
    };

    let mut request = DownloadRequest::new(urls);
    request.filename = filename;
    request.referrer = referrer;
    request.is_multi_task = multi;
    request.directory = target.download_directory();
    if let Some(ua) = user_agent {
        request.header_lines.push(format!("User-Agent: {}", ua));
    }

    let client = state.clients.client_for(&target).await?;
    let gids = request
        .send(&client)
        .await
        .with_context(|| format!("Failed to send to '{}'", target.name))?;

    for gid in &gids {
        println!("Added to {}: {} (GID: {})", target.name, request.label(), gid);
    }
    Ok(error::SUCCESS)
}

/// Poll every monitored server once
async fn handle_stats(state: &AppState, json: bool) -> Result<i32> {
    let snapshot = state.monitor.poll_once().await;
    println!("{}", output::format_snapshot(&snapshot, json));
    state.clients.close_all().await;

    Ok(if snapshot.connected > 0 {
        error::SUCCESS
    } else {
        error::ERROR
    })
}

/// Show one task
async fn handle_status(
    gid: String,
    server: Option<String>,
    json: bool,
    state: &AppState,
) -> Result<i32> {
    let target = {
        let config = state.config.read().await;
        match server {
            Some(name) => config.server_by_name(&name).cloned(),
            None => config.primary_server().cloned(),
        }
    };
    let Some(target) = target else {
        eprintln!("No matching RPC server configured");
        return Ok(error::NOT_FOUND);
    };

    let client = state.clients.client_for(&target).await?;
    match client.tell_status(&gid, &[]).await {
        Ok(task) => {
            println!("{}", output::format_task(&task, json));
            Ok(error::SUCCESS)
        }
        Err(RpcError::Protocol { message, .. }) if message.contains("not found") => {
            eprintln!("Task not found: {}", gid);
            Ok(error::NOT_FOUND)
        }
        Err(e) => Err(e.into()),
    }
}

/// Evaluate capture rules without touching Aria2 or the browser
async fn handle_decide(event_path: &Path, tab: Option<String>, state: &AppState) -> Result<i32> {
    let raw = if event_path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(event_path)
            .with_context(|| format!("Failed to read {:?}", event_path))?
    };

    let event: DownloadEvent = match serde_json::from_str(&raw) {
        Ok(event) => event,
        Err(e) => {
            eprintln!("Invalid download event: {}", e);
            return Ok(error::INVALID_INPUT);
        }
    };

    let config = state.config.read().await;
    let rules = CaptureRuleSet::from_config(&config.capture, &config.general.self_extension_id);
    let decision = should_capture(&event, &rules, tab.as_deref());
    println!("{}", output::format_decision(&decision));

    if !decision.is_capture() {
        return Ok(error::SKIPPED);
    }
    if let Some(server) = resolve_server(&config.rpc, event.effective_url()) {
        println!("server: {} ({})", server.name, server.url);
    }
    if !config.capture.enabled {
        println!("note: capture is currently disabled");
    }
    Ok(error::SUCCESS)
}

async fn handle_config(action: ConfigAction, state: &AppState) -> Result<i32> {
    match action {
        ConfigAction::Show { json } => {
            let config = state.config.read().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&*config)?);
            } else {
                println!("{}", toml::to_string_pretty(&*config)?);
            }
            Ok(error::SUCCESS)
        }
        ConfigAction::Path => {
            println!("{}", crate::util::paths::get_app_config_path()?.display());
            Ok(error::SUCCESS)
        }
        ConfigAction::Init { force } => {
            let path: PathBuf = crate::util::paths::get_app_config_path()?;
            if path.exists() && !force {
                eprintln!("{} already exists (use --force to overwrite)", path.display());
                return Ok(error::INVALID_INPUT);
            }
            Config::default_with_servers().save_to(&path)?;
            println!("Wrote default configuration to {}", path.display());
            Ok(error::SUCCESS)
        }
    }
}
