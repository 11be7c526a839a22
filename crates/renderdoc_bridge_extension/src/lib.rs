//! Embedded side of the RenderDoc MCP bridge.
//!
//! [`BridgeExtension::register`] starts a replay worker thread around a
//! [`ReplayEngine`] and an IPC server on the configured channel. Requests are
//! decoded by the [`router`], executed against the [`facade`] on the worker
//! thread, and answered with one response each.

pub mod document;
pub mod error;
pub mod facade;
pub mod replay;
pub mod router;
pub mod server;
pub mod session;
pub mod worker;

use std::net::SocketAddr;

use renderdoc_bridge_core::BridgeConfig;

pub use document::DocumentEngine;
pub use error::{FacadeError, ReplayError};
pub use facade::CaptureFacade;
pub use replay::{ReplayController, ReplayEngine};
pub use router::Router;
pub use server::{BridgeServer, ServerHandle};
pub use worker::{ReplayWorker, WorkerHandle};

/// A running extension: the replay worker plus the server feeding it.
pub struct BridgeExtension {
    worker: ReplayWorker,
    server: ServerHandle,
}

impl BridgeExtension {
    pub async fn register(
        engine: Box<dyn ReplayEngine>,
        config: &BridgeConfig,
    ) -> std::io::Result<Self> {
        let worker = ReplayWorker::spawn(engine, config.max_blob_bytes)?;
        let server = match BridgeServer::start(config, worker.handle()).await {
            Ok(server) => server,
            Err(e) => {
                tracing::error!(
                    "Failed to start bridge on {}: {}",
                    config.channel.endpoint(),
                    e
                );
                worker.shutdown().await;
                return Err(e);
            }
        };
        Ok(Self { worker, server })
    }

    /// Handle for issuing requests straight to the worker, bypassing IPC.
    pub fn worker(&self) -> WorkerHandle {
        self.worker.handle()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.local_addr()
    }

    pub fn endpoint(&self) -> &str {
        self.server.endpoint()
    }

    /// Stops the server, then closes any loaded capture and joins the worker.
    pub async fn unregister(self) {
        self.server.shutdown().await;
        self.worker.shutdown().await;
        tracing::info!("RenderDoc bridge extension unloaded");
    }
}
