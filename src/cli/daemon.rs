use crate::app::state::AppState;
use crate::ipc::{BridgeContext, start_bridge_server};
use anyhow::Result;
use tokio::signal;

/// Run in headless daemon mode
pub async fn run_daemon(state: AppState) -> Result<()> {
    tracing::info!("Starting daemon mode...");

    let bridge = {
        let config = state.config.read().await;
        config
            .bridge
            .enabled
            .then(|| (config.bridge.port, config.bridge.token.clone()))
    };

    let bridge_handle = match bridge {
        Some((port, token)) => {
            let context = BridgeContext {
                host: state.host.clone(),
                capture: state.capture.clone(),
                token,
            };
            let (addr, handle) = start_bridge_server(port, context).await?;
            println!("Bridge listening on {}", addr);
            Some(handle)
        }
        None => {
            tracing::info!("Bridge disabled");
            None
        }
    };

    state.start().await;
    tracing::info!("Press Ctrl+C to stop");

    // Wait for Ctrl+C
    match signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        Err(e) => {
            tracing::error!("Error waiting for Ctrl+C: {}", e);
        }
    }

    if let Some(handle) = bridge_handle {
        handle.abort();
    }
    state.shutdown().await;

    tracing::info!("Daemon stopped");

    Ok(())
}
