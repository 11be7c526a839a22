use std::sync::Arc;
use std::time::Duration;

use renderdoc_bridge_core::protocol::recover_request_id;
use renderdoc_bridge_core::transport::{read_frame, write_frame, MAX_FRAME_LEN};
use renderdoc_bridge_core::{BridgeRequest, BridgeResponse, ErrorKind};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use super::encode;
use crate::worker::WorkerHandle;

pub(super) async fn serve(
    listener: TcpListener,
    worker: WorkerHandle,
    mut shutdown: watch::Receiver<bool>,
) {
    // One request reaches the worker at a time; others are told Busy.
    let gate = Arc::new(Semaphore::new(1));
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tracing::debug!("Bridge connection from {}", peer);
                    let _ = stream.set_nodelay(true);
                    connections.spawn(handle_connection(
                        stream,
                        worker.clone(),
                        gate.clone(),
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    tracing::warn!("Failed to accept bridge connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            _ = shutdown.changed() => break,
        }
    }

    connections.shutdown().await;
}

async fn handle_connection(
    mut stream: TcpStream,
    worker: WorkerHandle,
    gate: Arc<Semaphore>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let frame = tokio::select! {
            frame = read_frame(&mut stream) => frame,
            _ = shutdown.changed() => return,
        };

        let body = match frame {
            Ok(Some(body)) => body,
            Ok(None) => {
                tracing::debug!("Bridge connection closed by peer");
                return;
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                // The stream cannot be resynchronized after a bad length.
                let response = BridgeResponse::err(None, ErrorKind::TransportError, e.to_string());
                let _ = send(&mut stream, &response).await;
                return;
            }
            Err(e) => {
                tracing::debug!("Bridge connection dropped: {}", e);
                return;
            }
        };

        let response = match serde_json::from_slice::<BridgeRequest>(&body) {
            Ok(request) => match gate.try_acquire() {
                Ok(_permit) => worker.dispatch(request).await,
                Err(_) => {
                    tracing::debug!("Rejecting {} #{}: bridge busy", request.operation, request.id);
                    BridgeResponse::err(
                        Some(request.id),
                        ErrorKind::Busy,
                        "Another request is being processed. Retry when it completes.",
                    )
                }
            },
            Err(e) => BridgeResponse::err(
                recover_request_id(&body),
                ErrorKind::TransportError,
                format!("Malformed request: {e}"),
            ),
        };

        if let Err(e) = send(&mut stream, &response).await {
            tracing::debug!("Failed to write bridge response: {}", e);
            return;
        }
    }
}

async fn send(stream: &mut TcpStream, response: &BridgeResponse) -> std::io::Result<()> {
    let mut body = encode(response);
    if body.len() > MAX_FRAME_LEN {
        let too_large = BridgeResponse::err(
            response.id,
            ErrorKind::TransportError,
            format!(
                "Response of {} bytes exceeds the {MAX_FRAME_LEN} byte frame limit",
                body.len()
            ),
        );
        body = encode(&too_large);
    }
    write_frame(stream, &body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::BridgeServer;
    use crate::worker::{Message, WorkerHandle};
    use renderdoc_bridge_core::protocol::operations;
    use renderdoc_bridge_core::{BridgeConfig, ChannelConfig};
    use serde_json::{json, Map};
    use std::net::SocketAddr;
    use tokio::io::AsyncWriteExt;

    fn config() -> BridgeConfig {
        BridgeConfig::new(ChannelConfig::socket("127.0.0.1", 0), Duration::from_secs(5))
    }

    async fn round_trip(stream: &mut TcpStream, body: &[u8]) -> BridgeResponse {
        write_frame(stream, body).await.unwrap();
        let frame = read_frame(stream).await.unwrap().expect("response frame");
        serde_json::from_slice(&frame).unwrap()
    }

    fn request_body(id: u64, operation: &str) -> Vec<u8> {
        serde_json::to_vec(&BridgeRequest::new(id, operation, Map::new())).unwrap()
    }

    async fn connect(addr: SocketAddr) -> TcpStream {
        TcpStream::connect(addr).await.unwrap()
    }

    #[tokio::test]
    async fn test_second_concurrent_request_is_busy() {
        let (worker, mut inbox) = WorkerHandle::detached();
        let server = BridgeServer::start(&config(), worker).await.unwrap();
        let addr = server.local_addr().unwrap();

        let mut first = connect(addr).await;
        write_frame(&mut first, &request_body(1, operations::GET_FRAME_SUMMARY))
            .await
            .unwrap();
        let Some(Message::Request(held, reply)) = inbox.recv().await else {
            panic!("expected the first request on the worker");
        };
        assert_eq!(held.id, 1);

        let mut second = connect(addr).await;
        let busy = round_trip(&mut second, &request_body(2, operations::PING)).await;
        assert_eq!(busy.id, Some(2));
        assert_eq!(busy.error_kind(), Some(ErrorKind::Busy));

        reply.send(BridgeResponse::ok(1, json!({"done": true}))).unwrap();
        let frame = read_frame(&mut first).await.unwrap().unwrap();
        let answered: BridgeResponse = serde_json::from_slice(&frame).unwrap();
        assert_eq!(answered.id, Some(1));
        assert!(answered.success);

        // The gate is free again once the first answer is out.
        write_frame(&mut second, &request_body(3, operations::PING)).await.unwrap();
        let Some(Message::Request(next, reply)) = inbox.recv().await else {
            panic!("expected the third request on the worker");
        };
        assert_eq!(next.id, 3);
        reply.send(BridgeResponse::ok(3, json!({}))).unwrap();
        assert!(read_frame(&mut second).await.unwrap().is_some());

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_request_keeps_connection_open() {
        let (worker, _inbox) = WorkerHandle::detached();
        let server = BridgeServer::start(&config(), worker).await.unwrap();
        let mut stream = connect(server.local_addr().unwrap()).await;

        let response = round_trip(&mut stream, br#"{"id": 7, "operation": 5}"#).await;
        assert_eq!(response.id, Some(7));
        assert_eq!(response.error_kind(), Some(ErrorKind::TransportError));

        let response = round_trip(&mut stream, b"not json at all").await;
        assert_eq!(response.id, None);
        assert_eq!(response.error_kind(), Some(ErrorKind::TransportError));

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversized_frame_closes_connection() {
        let (worker, _inbox) = WorkerHandle::detached();
        let server = BridgeServer::start(&config(), worker).await.unwrap();
        let mut stream = connect(server.local_addr().unwrap()).await;

        let header = ((MAX_FRAME_LEN as u32) + 1).to_be_bytes();
        stream.write_all(&header).await.unwrap();
        let frame = read_frame(&mut stream).await.unwrap().expect("error frame");
        let response: BridgeResponse = serde_json::from_slice(&frame).unwrap();
        assert_eq!(response.error_kind(), Some(ErrorKind::TransportError));
        assert!(read_frame(&mut stream).await.unwrap().is_none());

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_releases_port() {
        let (worker, _inbox) = WorkerHandle::detached();
        let server = BridgeServer::start(&config(), worker.clone()).await.unwrap();
        let addr = server.local_addr().unwrap();
        server.shutdown().await;

        let rebound = BridgeConfig::new(
            ChannelConfig::socket("127.0.0.1", addr.port()),
            Duration::from_secs(5),
        );
        let server = BridgeServer::start(&rebound, worker).await.unwrap();
        assert_eq!(server.local_addr(), Some(addr));
        server.shutdown().await;
    }
}
