//! Standalone host for the bridge extension.
//!
//! Serves captures recorded as JSON documents through [`DocumentEngine`] on
//! the channel configured by the `RENDERDOC_MCP_*` environment variables.
//! An optional first argument names a capture to open at startup.

use renderdoc_bridge_core::protocol::operations;
use renderdoc_bridge_core::{BridgeConfig, BridgeRequest};
use renderdoc_bridge_extension::{BridgeExtension, DocumentEngine};
use serde_json::{json, Map};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = BridgeConfig::from_env();
    let extension = BridgeExtension::register(Box::new(DocumentEngine::new()), &config).await?;

    if let Some(capture_path) = std::env::args().nth(1) {
        let mut args = Map::new();
        args.insert("capture_path".to_string(), json!(capture_path));
        let response = extension
            .worker()
            .dispatch(BridgeRequest::new(0, operations::OPEN_CAPTURE, args))
            .await;
        match (&response.result, &response.error) {
            (Some(result), _) => tracing::info!("Opened {}", result["filename"]),
            (None, Some(error)) => tracing::warn!("Could not open {}: {}", capture_path, error.message),
            (None, None) => {}
        }
    }

    tracing::info!(
        "RenderDoc bridge host ready on {} (Ctrl+C to stop)",
        extension.endpoint()
    );
    tokio::signal::ctrl_c().await?;

    extension.unregister().await;
    Ok(())
}

fn init_tracing() {
    // stdout may be a pipe owned by whoever launched us; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
