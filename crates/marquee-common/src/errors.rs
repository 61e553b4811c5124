use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures delivering a message to a webview endpoint.
///
/// Emitters never see these; the fan-out layer logs and drops them.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("endpoint closed: {0}")]
    EndpointClosed(String),

    #[error("message serialization failed: {0}")]
    Serialize(String),

    #[error("no endpoint acknowledged within {0}ms")]
    Timeout(u64),

    #[error("no endpoints to register with")]
    NoEndpoints,
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid namespace: {0:?}")]
    InvalidNamespace(String),

    #[error("state serialization failed: {0}")]
    Serialize(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("message is not a JSON object")]
    NotAnObject,

    #[error("message carries no namespace")]
    MissingNamespace,

    #[error("malformed message: {0}")]
    Malformed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WebviewError {
    #[error("failed to create panel: {0}")]
    PanelCreation(String),

    #[error("webview never signalled readiness after {0} attempts")]
    ReadinessExhausted(u32),
}

#[derive(Debug, thiserror::Error)]
pub enum MarqueeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Webview(#[from] WebviewError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
