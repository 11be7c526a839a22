use crate::config::{BridgeConfig, ChannelConfig};
use crate::protocol::{recover_request_id, BridgeRequest, BridgeResponse};
use crate::transport::{read_frame, write_frame, FileSlot};
use crate::{BridgeError, Result};
use serde_json::{Map, Value};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Issues one request at a time to the extension and waits, bounded by
/// `BridgeConfig::timeout`, for the response carrying the same id.
///
/// The client never retries. A refused connection or missing channel
/// directory fails fast with [`BridgeError::Unreachable`]; a silent bridge
/// fails with [`BridgeError::Timeout`].
#[derive(Debug, Clone)]
pub struct BridgeClient {
    config: BridgeConfig,
    channel: Channel,
    request_id: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
enum Channel {
    /// Lazily connected; dropped after any failure so the next call reconnects.
    Socket(Arc<Mutex<Option<TcpStream>>>),
    File {
        slot: FileSlot,
        in_flight: Arc<Mutex<()>>,
    },
}

impl BridgeClient {
    pub fn new(config: BridgeConfig) -> Self {
        let channel = match &config.channel {
            ChannelConfig::Socket { .. } => Channel::Socket(Arc::new(Mutex::new(None))),
            ChannelConfig::File { dir } => Channel::File {
                slot: FileSlot::new(dir.clone()),
                in_flight: Arc::new(Mutex::new(())),
            },
        };

        Self {
            config,
            channel,
            request_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Sends `operation` with `args` (an object, or null for none) and returns
    /// the `result` payload of a successful response.
    pub async fn send_request(&self, operation: &str, args: Value) -> Result<Value> {
        let args = match args {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(BridgeError::Transport(format!(
                    "arguments must be a JSON object, got {other}"
                )))
            }
        };

        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::to_vec(&BridgeRequest::new(id, operation, args))?;

        tracing::debug!("Sending bridge request: operation={}, id={}", operation, id);

        let exchange = async {
            match &self.channel {
                Channel::Socket(conn) => self.exchange_socket(conn, id, &body).await,
                Channel::File { slot, in_flight } => {
                    let _turn = in_flight.lock().await;
                    self.exchange_file(slot, id, &body).await
                }
            }
        };

        let response = match tokio::time::timeout(self.config.timeout, exchange).await {
            Ok(response) => response?,
            Err(_) => {
                match &self.channel {
                    // A late answer must not be read as the reply to the next request.
                    Channel::Socket(conn) => {
                        conn.lock().await.take();
                    }
                    Channel::File { slot, in_flight } => {
                        let _turn = in_flight.lock().await;
                        withdraw_request(slot, id).await;
                    }
                }
                tracing::warn!(
                    "Bridge request timed out: operation={}, id={}, after {:?}",
                    operation,
                    id,
                    self.config.timeout
                );
                return Err(BridgeError::Timeout(self.config.timeout));
            }
        };

        into_result(operation, id, response)
    }

    /// Convenience wrapper that serializes typed args and deserializes the result.
    pub async fn call<A, R>(&self, operation: &str, args: &A) -> Result<R>
    where
        A: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let args = serde_json::to_value(args)?;
        let result = self.send_request(operation, args).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    async fn exchange_socket(
        &self,
        conn: &Mutex<Option<TcpStream>>,
        id: u64,
        body: &[u8],
    ) -> Result<BridgeResponse> {
        let mut guard = conn.lock().await;

        if guard.is_none() {
            let ChannelConfig::Socket { host, port } = &self.config.channel else {
                return Err(BridgeError::Transport("socket channel misconfigured".into()));
            };
            let stream = TcpStream::connect((host.as_str(), *port))
                .await
                .map_err(|e| BridgeError::unreachable(self.config.channel.endpoint(), e))?;
            stream.set_nodelay(true)?;
            tracing::debug!("Connected to bridge at {}", self.config.channel.endpoint());
            *guard = Some(stream);
        }

        let Some(stream) = guard.as_mut() else {
            return Err(BridgeError::Transport("connection unavailable".into()));
        };

        match socket_round_trip(stream, id, body).await {
            Ok(response) => Ok(response),
            Err(e) => {
                *guard = None;
                Err(e)
            }
        }
    }

    async fn exchange_file(&self, slot: &FileSlot, id: u64, body: &[u8]) -> Result<BridgeResponse> {
        if !slot.exists().await {
            return Err(BridgeError::unreachable(
                self.config.channel.endpoint(),
                "channel directory does not exist",
            ));
        }

        slot.write_request(body).await?;

        loop {
            if !slot.is_locked().await {
                if let Some(bytes) = slot.read_response().await? {
                    match serde_json::from_slice::<BridgeResponse>(&bytes) {
                        Ok(response) if answers(&response, id) => {
                            slot.remove_response().await?;
                            return Ok(response);
                        }
                        Ok(response) => {
                            tracing::debug!(
                                "Discarding stale response: expected id={}, got {:?}",
                                id,
                                response.id
                            );
                            slot.remove_response().await?;
                        }
                        Err(e) => {
                            tracing::debug!("Response file not readable yet: {}", e);
                        }
                    }
                }
            }
            tokio::time::sleep(self.config.poll_interval.max(Duration::from_millis(1))).await;
        }
    }
}

impl Default for BridgeClient {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}

/// Removes our request if the bridge never picked it up, so a bridge that
/// starts later does not run it.
async fn withdraw_request(slot: &FileSlot, id: u64) {
    match slot.read_request().await {
        Ok(Some(bytes)) if recover_request_id(&bytes) == Some(id) => {
            if let Err(e) = slot.remove_request().await {
                tracing::warn!("Could not withdraw timed-out request id={}: {}", id, e);
            }
        }
        Ok(_) => {}
        Err(e) => tracing::debug!("Request file not readable while withdrawing id={}: {}", id, e),
    }
}

async fn socket_round_trip(stream: &mut TcpStream, id: u64, body: &[u8]) -> Result<BridgeResponse> {
    write_frame(stream, body).await?;

    loop {
        let Some(frame) = read_frame(stream).await? else {
            return Err(BridgeError::Transport("connection closed by bridge".into()));
        };
        let response: BridgeResponse = serde_json::from_slice(&frame)?;
        if answers(&response, id) {
            return Ok(response);
        }
        tracing::debug!(
            "Discarding stale response: expected id={}, got {:?}",
            id,
            response.id
        );
    }
}

/// A response without an id is the bridge reporting that it could not parse
/// the request at all, which can only be ours.
fn answers(response: &BridgeResponse, id: u64) -> bool {
    match response.id {
        Some(got) => got == id,
        None => !response.success,
    }
}

fn into_result(operation: &str, id: u64, response: BridgeResponse) -> Result<Value> {
    if response.success {
        tracing::debug!("Bridge request successful: operation={}, id={}", operation, id);
        return Ok(response.result.unwrap_or(Value::Null));
    }

    match response.error {
        Some(error) => {
            tracing::warn!(
                "Bridge error: operation={}, kind={}, message={}",
                operation,
                error.kind,
                error.message
            );
            Err(BridgeError::remote(error.kind, error.message))
        }
        None => Err(BridgeError::InvalidResponse(
            "failed response without an error body".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ErrorKind;
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::Instant;
    use tokio::net::TcpListener;

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn unique_dir(name: &str) -> PathBuf {
        let seq = COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!(
            "renderdoc-bridge-client-{name}-{}-{seq}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir
    }

    fn socket_client(port: u16, timeout: Duration) -> BridgeClient {
        BridgeClient::new(BridgeConfig::new(
            ChannelConfig::socket("127.0.0.1", port),
            timeout,
        ))
    }

    /// Answers every request on the first connection with `reply`.
    async fn fake_bridge<F>(reply: F) -> u16
    where
        F: Fn(BridgeRequest) -> Vec<BridgeResponse> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            while let Ok(Some(frame)) = read_frame(&mut stream).await {
                let request: BridgeRequest = serde_json::from_slice(&frame).unwrap();
                for response in reply(request) {
                    let body = serde_json::to_vec(&response).unwrap();
                    write_frame(&mut stream, &body).await.unwrap();
                }
            }
        });
        port
    }

    #[test]
    fn test_request_id_increment() {
        let client = BridgeClient::default();
        assert_eq!(client.request_id.fetch_add(1, Ordering::Relaxed), 1);
        assert_eq!(client.request_id.fetch_add(1, Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_successful_round_trip() {
        let port = fake_bridge(|req| {
            vec![BridgeResponse::ok(
                req.id,
                json!({"operation": req.operation, "args": req.args}),
            )]
        })
        .await;
        let client = socket_client(port, Duration::from_secs(5));

        let result = client
            .send_request("get_draw_call_details", json!({"event_id": 7}))
            .await
            .unwrap();
        assert_eq!(result["operation"], "get_draw_call_details");
        assert_eq!(result["args"]["event_id"], 7);

        // The connection is reused for the next request.
        let result = client.send_request("ping", Value::Null).await.unwrap();
        assert_eq!(result["operation"], "ping");
    }

    #[tokio::test]
    async fn test_stale_response_is_discarded() {
        let port = fake_bridge(|req| {
            vec![
                BridgeResponse::ok(req.id + 1000, json!("stale")),
                BridgeResponse::ok(req.id, json!("fresh")),
            ]
        })
        .await;
        let client = socket_client(port, Duration::from_secs(5));

        let result = client.send_request("ping", Value::Null).await.unwrap();
        assert_eq!(result, json!("fresh"));
    }

    #[tokio::test]
    async fn test_remote_error_keeps_kind() {
        let port = fake_bridge(|req| {
            vec![BridgeResponse::err(
                Some(req.id),
                ErrorKind::NotLoaded,
                "No capture loaded",
            )]
        })
        .await;
        let client = socket_client(port, Duration::from_secs(5));

        let err = client.send_request("get_frame_summary", Value::Null).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotLoaded);
        assert!(err.to_string().contains("No capture loaded"));
    }

    #[tokio::test]
    async fn test_refused_connection_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = socket_client(port, Duration::from_secs(5));
        let err = client.send_request("ping", Value::Null).await.unwrap_err();
        assert!(matches!(err, BridgeError::Unreachable { .. }), "got {err:?}");
        assert_eq!(err.kind(), ErrorKind::TransportError);
    }

    #[tokio::test]
    async fn test_silent_bridge_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(stream);
        });

        let client = socket_client(port, Duration::from_millis(200));
        let started = Instant::now();
        let err = client.send_request("ping", Value::Null).await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(_)), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_non_object_args_are_rejected() {
        let client = BridgeClient::default();
        let err = client.send_request("ping", json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
    }

    #[tokio::test]
    async fn test_file_channel_missing_directory() {
        let dir = std::env::temp_dir().join("renderdoc-bridge-client-missing-dir");
        let client = BridgeClient::new(BridgeConfig::new(
            ChannelConfig::file(dir),
            Duration::from_secs(5),
        ));
        let err = client.send_request("ping", Value::Null).await.unwrap_err();
        assert!(matches!(err, BridgeError::Unreachable { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_file_channel_times_out_without_server() {
        let dir = unique_dir("timeout");
        let client = BridgeClient::new(
            BridgeConfig::new(ChannelConfig::file(&dir), Duration::from_millis(150))
                .with_poll_interval(Duration::from_millis(10)),
        );
        let err = client.send_request("ping", Value::Null).await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(_)), "got {err:?}");
        assert!(!dir.join("request.json").exists());
    }

    #[tokio::test]
    async fn test_timeout_leaves_other_requests_in_place() {
        let dir = unique_dir("foreign");
        let slot = FileSlot::new(&dir);
        let client = BridgeClient::new(
            BridgeConfig::new(ChannelConfig::file(&dir), Duration::from_millis(150))
                .with_poll_interval(Duration::from_millis(10)),
        );

        // Another writer replaces our request while we wait.
        let writer = slot.clone();
        tokio::spawn(async move {
            loop {
                if writer.read_request().await.unwrap().is_some() {
                    let foreign = BridgeRequest::new(4242, "ping", Map::new());
                    writer
                        .write_request(&serde_json::to_vec(&foreign).unwrap())
                        .await
                        .unwrap();
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let err = client.send_request("ping", Value::Null).await.unwrap_err();
        assert!(matches!(err, BridgeError::Timeout(_)), "got {err:?}");
        let left = slot.read_request().await.unwrap().unwrap();
        assert_eq!(recover_request_id(&left), Some(4242));
    }

    #[tokio::test]
    async fn test_file_channel_round_trip_skips_stale_response() {
        let dir = unique_dir("roundtrip");
        let slot = FileSlot::new(&dir);
        slot.write_response(&serde_json::to_vec(&BridgeResponse::ok(999, json!("old"))).unwrap())
            .await
            .unwrap();

        let server_slot = slot.clone();
        tokio::spawn(async move {
            loop {
                // Answer only once the client has cleared the stale response.
                let stale_pending = server_slot.read_response().await.unwrap().is_some();
                if stale_pending {
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    continue;
                }
                if let Some(bytes) = server_slot.read_request().await.unwrap() {
                    let request: BridgeRequest = serde_json::from_slice(&bytes).unwrap();
                    server_slot.remove_request().await.unwrap();
                    let body =
                        serde_json::to_vec(&BridgeResponse::ok(request.id, json!("pong"))).unwrap();
                    server_slot.write_response(&body).await.unwrap();
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let client = BridgeClient::new(
            BridgeConfig::new(ChannelConfig::file(&dir), Duration::from_secs(5))
                .with_poll_interval(Duration::from_millis(5)),
        );
        let result = client.send_request("ping", Value::Null).await.unwrap();
        assert_eq!(result, json!("pong"));
        assert!(!dir.join("response.json").exists());
    }
}
