//! The replay worker: a dedicated OS thread that owns the router, and with it
//! the facade and the loaded capture.
//!
//! Replay handles are not safe to touch from arbitrary threads, so the IPC
//! servers never call the facade directly. They post a request to this thread
//! and await the answer on a oneshot channel.

use std::thread::JoinHandle;

use renderdoc_bridge_core::{BridgeRequest, BridgeResponse, ErrorKind};
use tokio::sync::{mpsc, oneshot};

use crate::facade::CaptureFacade;
use crate::replay::ReplayEngine;
use crate::router::Router;

pub const WORKER_THREAD_NAME: &str = "renderdoc-replay";

pub(crate) enum Message {
    Request(BridgeRequest, oneshot::Sender<BridgeResponse>),
    Shutdown,
}

pub struct ReplayWorker {
    handle: WorkerHandle,
    thread: Option<JoinHandle<()>>,
}

impl ReplayWorker {
    pub fn spawn(engine: Box<dyn ReplayEngine>, max_blob_bytes: usize) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let thread = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let mut router = Router::new(CaptureFacade::new(engine, max_blob_bytes));
                tracing::debug!("Replay worker started");
                while let Some(message) = rx.blocking_recv() {
                    match message {
                        Message::Request(request, reply) => {
                            let response = router.handle(request);
                            // The requester may have timed out and gone away.
                            let _ = reply.send(response);
                        }
                        Message::Shutdown => break,
                    }
                }
                router.shutdown();
                tracing::debug!("Replay worker stopped");
            })?;

        Ok(Self {
            handle: WorkerHandle { tx },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Stops accepting work, closes the loaded capture and joins the thread.
    /// A request already being replayed finishes first.
    pub async fn shutdown(mut self) {
        let _ = self.handle.tx.send(Message::Shutdown);
        if let Some(thread) = self.thread.take() {
            let joined = tokio::task::spawn_blocking(move || thread.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                tracing::warn!("Replay worker thread did not exit cleanly");
            }
        }
    }
}

impl Drop for ReplayWorker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.handle.tx.send(Message::Shutdown);
        }
    }
}

/// Cheap, cloneable sender side of the worker.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl WorkerHandle {
    /// Test double: a handle whose messages land on a channel the test drains.
    #[cfg(test)]
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Runs one request on the worker thread. Answers `Unavailable` instead
    /// of failing when the worker is gone.
    pub async fn dispatch(&self, request: BridgeRequest) -> BridgeResponse {
        let id = request.id;
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.tx.send(Message::Request(request, reply_tx)).is_err() {
            return stopped(id);
        }
        reply_rx.await.unwrap_or_else(|_| stopped(id))
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}

fn stopped(id: u64) -> BridgeResponse {
    BridgeResponse::err(
        Some(id),
        ErrorKind::Unavailable,
        "Replay worker is not running",
    )
}
