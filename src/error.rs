use thiserror::Error;

/// Errors surfaced by the live session and its collaborators
#[derive(Debug, Error)]
pub enum LiveError {
    /// Microphone or camera access was refused (or the device is missing)
    #[error("media device access denied: {0}")]
    PermissionDenied(String),

    /// No credential (or an invalid setting) prevents opening the transport
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Remote connection failure
    #[error("transport error: {0}")]
    TransportError(String),

    /// Remote side closed the connection gracefully
    #[error("transport closed")]
    TransportClosed,

    /// A session is already starting or open on this controller
    #[error("a live session is already active")]
    AlreadyActive,

    /// A pending start was called off by `stop`
    #[error("live session start was cancelled")]
    Cancelled,

    /// A single inbound or outbound media payload could not be decoded/encoded
    #[error("media decode error: {0}")]
    Decode(String),

    /// Device failure after acquisition (capture or playback pipeline)
    #[error("device error: {0}")]
    Device(String),
}

pub type Result<T> = std::result::Result<T, LiveError>;
