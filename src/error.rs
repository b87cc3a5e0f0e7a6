//! Crate-level error type.
//!
//! Engine-internal failures (vote rejections, registration errors, service
//! error events) are never represented here; those are surfaced as
//! transient view state by the state machine. `PollError` covers the
//! fallible edges: transport, wire protocol, storage, and configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("storage encode error: {0}")]
    StorageEncode(#[from] toml::ser::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
