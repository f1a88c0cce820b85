use thiserror::Error;

/// Dispatch-wide error types for the Gapool server.
#[derive(Debug, Error)]
pub enum GapoolError {
    /// No job template has been fetched from the chain node yet.
    #[error("No job available yet")]
    NoJobAvailable,

    /// The chain node could not be reached or did not answer in time.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The chain node answered with something we could not interpret.
    #[error("Upstream malformed response: {0}")]
    UpstreamMalformedResponse(String),

    /// Peer connection failed (disconnect, broken pipe).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The listener cannot bind or accept; terminal for the server.
    #[error("Listener error: {0}")]
    ListenerFatal(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl GapoolError {
    /// Upstream failures are always worth retrying on the next attempt.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            GapoolError::UpstreamUnavailable(_) | GapoolError::UpstreamMalformedResponse(_)
        )
    }
}

impl From<serde_json::Error> for GapoolError {
    fn from(e: serde_json::Error) -> Self {
        GapoolError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for GapoolError {
    fn from(e: std::io::Error) -> Self {
        GapoolError::Transport(e.to_string())
    }
}
