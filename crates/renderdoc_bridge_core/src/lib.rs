//! RenderDoc Bridge Core
//!
//! Shared vocabulary of the RenderDoc MCP bridge: the request/response
//! envelope, the socket and file transports, typed operation records, and an
//! async client that talks to the extension running inside RenderDoc.

pub mod client;
pub mod config;
pub mod error;
pub mod ops;
pub mod protocol;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use client::BridgeClient;
pub use config::{BridgeConfig, ChannelConfig};
pub use error::BridgeError;
pub use protocol::{BridgeRequest, BridgeResponse, ErrorKind};

/// Result type alias using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;
