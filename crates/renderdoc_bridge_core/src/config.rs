use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 19876;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_BLOB_BYTES: usize = 64 * 1024 * 1024;

/// Where the two halves of the bridge meet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelConfig {
    /// Length-prefixed JSON frames over a loopback TCP socket.
    Socket { host: String, port: u16 },
    /// `request.json` / `response.json` / `lock` files in a shared directory.
    File { dir: PathBuf },
}

impl ChannelConfig {
    pub fn socket(host: impl Into<String>, port: u16) -> Self {
        Self::Socket {
            host: host.into(),
            port,
        }
    }

    pub fn file(dir: impl Into<PathBuf>) -> Self {
        Self::File { dir: dir.into() }
    }

    /// Human readable endpoint, used in logs and error messages.
    pub fn endpoint(&self) -> String {
        match self {
            Self::Socket { host, port } => format!("{host}:{port}"),
            Self::File { dir } => dir.display().to_string(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::socket(DEFAULT_HOST, DEFAULT_PORT)
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub channel: ChannelConfig,
    /// Upper bound on how long the client waits for one response.
    pub timeout: Duration,
    /// Detection latency of the file channel, on both sides.
    pub poll_interval: Duration,
    /// Largest buffer or texture payload the extension will encode.
    pub max_blob_bytes: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel: ChannelConfig::default(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_blob_bytes: DEFAULT_MAX_BLOB_BYTES,
        }
    }
}

impl BridgeConfig {
    pub fn new(channel: ChannelConfig, timeout: Duration) -> Self {
        Self {
            channel,
            timeout,
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_blob_bytes(mut self, max_blob_bytes: usize) -> Self {
        self.max_blob_bytes = max_blob_bytes;
        self
    }

    pub fn from_env() -> Self {
        let channel = match std::env::var("RENDERDOC_MCP_CHANNEL")
            .map(|v| v.to_ascii_lowercase())
            .as_deref()
        {
            Ok("file") => {
                let dir = std::env::var("RENDERDOC_MCP_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| default_channel_dir());
                ChannelConfig::File { dir }
            }
            other => {
                if let Ok(unknown) = other {
                    if unknown != "socket" {
                        tracing::warn!(
                            "Ignoring RENDERDOC_MCP_CHANNEL={:?}: expected socket or file, using socket",
                            unknown
                        );
                    }
                }
                let host =
                    std::env::var("RENDERDOC_MCP_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
                let port = env_parse("RENDERDOC_MCP_PORT").unwrap_or(DEFAULT_PORT);
                ChannelConfig::Socket { host, port }
            }
        };

        let timeout = env_millis("RENDERDOC_MCP_TIMEOUT_MS").unwrap_or(DEFAULT_TIMEOUT);
        let poll_interval = env_millis("RENDERDOC_MCP_POLL_MS").unwrap_or(DEFAULT_POLL_INTERVAL);
        let max_blob_bytes =
            env_parse("RENDERDOC_MCP_MAX_BLOB_BYTES").unwrap_or(DEFAULT_MAX_BLOB_BYTES);

        Self {
            channel,
            timeout,
            poll_interval,
            max_blob_bytes,
        }
    }
}

pub fn default_channel_dir() -> PathBuf {
    std::env::temp_dir().join("renderdoc_mcp")
}

fn env_millis(name: &str) -> Option<Duration> {
    env_parse(name).map(Duration::from_millis)
}

/// Unset variables fall back quietly; unparseable ones are logged first.
fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    parse_setting(name, &raw)
}

fn parse_setting<T: FromStr>(name: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a valid value, using the default", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 7] = [
        "RENDERDOC_MCP_CHANNEL",
        "RENDERDOC_MCP_HOST",
        "RENDERDOC_MCP_PORT",
        "RENDERDOC_MCP_DIR",
        "RENDERDOC_MCP_TIMEOUT_MS",
        "RENDERDOC_MCP_POLL_MS",
        "RENDERDOC_MCP_MAX_BLOB_BYTES",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.channel, ChannelConfig::socket("127.0.0.1", 19876));
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.poll_interval, Duration::from_millis(100));
    }

    #[test]
    fn test_new_config() {
        let config = BridgeConfig::new(ChannelConfig::file("/tmp/bridge"), Duration::from_secs(5))
            .with_poll_interval(Duration::from_millis(20));
        assert_eq!(config.channel, ChannelConfig::file("/tmp/bridge"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.poll_interval, Duration::from_millis(20));
        assert_eq!(config.max_blob_bytes, DEFAULT_MAX_BLOB_BYTES);
    }

    #[test]
    fn test_endpoint_display() {
        assert_eq!(ChannelConfig::default().endpoint(), "127.0.0.1:19876");
        assert_eq!(ChannelConfig::file("/tmp/x").endpoint(), "/tmp/x");
    }

    // Environment mutation is process-wide, so all env cases share one test.
    #[test]
    fn test_from_env() {
        clear_env();
        let config = BridgeConfig::from_env();
        assert_eq!(config.channel, ChannelConfig::socket("127.0.0.1", 19876));
        assert_eq!(config.timeout, Duration::from_secs(30));

        std::env::set_var("RENDERDOC_MCP_HOST", "localhost");
        std::env::set_var("RENDERDOC_MCP_PORT", "4000");
        std::env::set_var("RENDERDOC_MCP_TIMEOUT_MS", "2500");
        std::env::set_var("RENDERDOC_MCP_POLL_MS", "not-a-number");
        std::env::set_var("RENDERDOC_MCP_MAX_BLOB_BYTES", "-1");
        let config = BridgeConfig::from_env();
        assert_eq!(config.channel, ChannelConfig::socket("localhost", 4000));
        assert_eq!(config.max_blob_bytes, DEFAULT_MAX_BLOB_BYTES);
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);

        std::env::set_var("RENDERDOC_MCP_CHANNEL", "FILE");
        std::env::set_var("RENDERDOC_MCP_DIR", "/tmp/rdc-bridge");
        std::env::set_var("RENDERDOC_MCP_MAX_BLOB_BYTES", "1024");
        let config = BridgeConfig::from_env();
        assert_eq!(config.channel, ChannelConfig::file("/tmp/rdc-bridge"));
        assert_eq!(config.max_blob_bytes, 1024);

        std::env::set_var("RENDERDOC_MCP_CHANNEL", "pipe");
        std::env::set_var("RENDERDOC_MCP_PORT", "70000");
        let config = BridgeConfig::from_env();
        assert_eq!(config.channel, ChannelConfig::socket("localhost", DEFAULT_PORT));

        clear_env();
    }

    #[test]
    fn test_unparseable_settings_are_rejected() {
        assert_eq!(parse_setting::<u16>("RENDERDOC_MCP_PORT", " 4000 "), Some(4000));
        assert_eq!(parse_setting::<u16>("RENDERDOC_MCP_PORT", "70000"), None);
        assert_eq!(parse_setting::<u64>("RENDERDOC_MCP_TIMEOUT_MS", "2.5s"), None);
        assert_eq!(parse_setting::<usize>("RENDERDOC_MCP_MAX_BLOB_BYTES", ""), None);
    }
}
