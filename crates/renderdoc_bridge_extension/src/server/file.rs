use std::time::Duration;

use renderdoc_bridge_core::protocol::recover_request_id;
use renderdoc_bridge_core::transport::FileSlot;
use renderdoc_bridge_core::{BridgeRequest, BridgeResponse, ErrorKind};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::encode;
use crate::worker::WorkerHandle;

pub(super) async fn serve(
    slot: FileSlot,
    poll_interval: Duration,
    worker: WorkerHandle,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(poll_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        if let Err(e) = poll_once(&slot, &worker).await {
            tracing::warn!("File channel poll in {} failed: {}", slot.dir().display(), e);
            let _ = slot.unlock().await;
        }
    }
}

/// Answers the pending request, if there is one. Returns whether a response
/// was written.
async fn poll_once(slot: &FileSlot, worker: &WorkerHandle) -> std::io::Result<bool> {
    let Some(body) = slot.read_request().await? else {
        return Ok(false);
    };

    let request = match serde_json::from_slice::<BridgeRequest>(&body) {
        Ok(request) => Ok(request),
        // Still being written by a client without atomic rename.
        Err(e) if e.is_eof() => return Ok(false),
        Err(e) => Err(e),
    };
    slot.remove_request().await?;
    slot.lock().await?;

    let response = match request {
        Ok(request) => worker.dispatch(request).await,
        Err(e) => BridgeResponse::err(
            recover_request_id(&body),
            ErrorKind::TransportError,
            format!("Malformed request: {e}"),
        ),
    };

    let written = slot.write_response(&encode(&response)).await;
    slot.unlock().await?;
    written?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::test_support::unique_dir;
    use crate::server::BridgeServer;
    use crate::worker::{Message, WorkerHandle};
    use renderdoc_bridge_core::protocol::operations;
    use renderdoc_bridge_core::{BridgeConfig, ChannelConfig};
    use serde_json::{json, Map};

    fn config(dir: &std::path::Path) -> BridgeConfig {
        BridgeConfig::new(ChannelConfig::file(dir), Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(5))
    }

    async fn wait_for_response(slot: &FileSlot) -> BridgeResponse {
        loop {
            if !slot.is_locked().await {
                if let Some(bytes) = slot.read_response().await.unwrap() {
                    return serde_json::from_slice(&bytes).unwrap();
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[tokio::test]
    async fn test_request_file_is_consumed_and_answered() {
        let dir = unique_dir("file-server");
        let (worker, mut inbox) = WorkerHandle::detached();
        let server = BridgeServer::start(&config(&dir), worker).await.unwrap();
        assert_eq!(server.local_addr(), None);

        let slot = FileSlot::new(&dir);
        let request = BridgeRequest::new(21, operations::GET_CAPTURE_STATUS, Map::new());
        slot.write_request(&serde_json::to_vec(&request).unwrap())
            .await
            .unwrap();

        let Some(Message::Request(received, reply)) = inbox.recv().await else {
            panic!("expected the request on the worker");
        };
        assert_eq!(received, request);
        assert!(slot.read_request().await.unwrap().is_none());
        assert!(slot.is_locked().await);
        reply.send(BridgeResponse::ok(21, json!({"loaded": false}))).unwrap();

        let response = wait_for_response(&slot).await;
        assert_eq!(response.id, Some(21));
        assert_eq!(response.result, Some(json!({"loaded": false})));
        assert!(!slot.is_locked().await);

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_request_file_gets_transport_error() {
        let dir = unique_dir("file-server-bad");
        let (worker, _inbox) = WorkerHandle::detached();
        let server = BridgeServer::start(&config(&dir), worker).await.unwrap();

        let slot = FileSlot::new(&dir);
        slot.write_request(br#"{"id": 8, "operation": ["ping"]}"#).await.unwrap();

        let response = wait_for_response(&slot).await;
        assert_eq!(response.id, Some(8));
        assert_eq!(response.error_kind(), Some(ErrorKind::TransportError));
        assert!(slot.read_request().await.unwrap().is_none());

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_clears_leftover_files() {
        let dir = unique_dir("file-server-stale");
        let slot = FileSlot::new(&dir);
        slot.write_response(b"{\"id\": 1, \"success\": true}").await.unwrap();
        slot.lock().await.unwrap();

        let (worker, _inbox) = WorkerHandle::detached();
        let server = BridgeServer::start(&config(&dir), worker).await.unwrap();
        assert!(slot.read_response().await.unwrap().is_none());
        assert!(!slot.is_locked().await);
        server.shutdown().await;
    }
}
