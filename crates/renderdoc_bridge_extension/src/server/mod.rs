//! IPC servers that carry requests from the MCP server to the replay worker.
//!
//! Both channels hand each decoded request to [`WorkerHandle::dispatch`] and
//! write back exactly one response.

mod file;
mod socket;

use std::net::SocketAddr;

use renderdoc_bridge_core::transport::FileSlot;
use renderdoc_bridge_core::{BridgeConfig, BridgeResponse, ChannelConfig};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::worker::WorkerHandle;

pub struct BridgeServer;

impl BridgeServer {
    /// Binds the configured channel and starts serving in the background.
    ///
    /// The socket channel fails here if the address is taken. The file
    /// channel creates its directory and clears files left by an earlier run.
    pub async fn start(config: &BridgeConfig, worker: WorkerHandle) -> std::io::Result<ServerHandle> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (local_addr, task) = match &config.channel {
            ChannelConfig::Socket { host, port } => {
                let listener = tokio::net::TcpListener::bind((host.as_str(), *port)).await?;
                let addr = listener.local_addr()?;
                let task = tokio::spawn(socket::serve(listener, worker, shutdown_rx));
                (Some(addr), task)
            }
            ChannelConfig::File { dir } => {
                tokio::fs::create_dir_all(dir).await?;
                let slot = FileSlot::new(dir.clone());
                slot.remove_request().await?;
                slot.remove_response().await?;
                slot.unlock().await?;
                let task = tokio::spawn(file::serve(
                    slot,
                    config.poll_interval,
                    worker,
                    shutdown_rx,
                ));
                (None, task)
            }
        };

        let endpoint = match local_addr {
            Some(addr) => addr.to_string(),
            None => config.channel.endpoint(),
        };
        tracing::info!("RenderDoc bridge listening on {}", endpoint);

        Ok(ServerHandle {
            endpoint,
            local_addr,
            shutdown: shutdown_tx,
            task,
        })
    }
}

pub struct ServerHandle {
    endpoint: String,
    local_addr: Option<SocketAddr>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Bound address of the socket channel; `None` for the file channel.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Stops accepting work and waits for the serving task to finish. A
    /// request already handed to the worker is answered first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!("Bridge server task ended abnormally: {}", e);
        }
        tracing::info!("RenderDoc bridge stopped listening on {}", self.endpoint);
    }
}

fn encode(response: &BridgeResponse) -> Vec<u8> {
    serde_json::to_vec(response).unwrap_or_else(|e| {
        let fallback = BridgeResponse::err(
            response.id,
            renderdoc_bridge_core::ErrorKind::Internal,
            format!("Failed to encode response: {e}"),
        );
        serde_json::to_vec(&fallback).unwrap_or_default()
    })
}
