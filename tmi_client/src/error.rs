use thiserror::Error;

/// An error on the transport byte stream.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection closed")]
    Closed,
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// An error surfaced by the client API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A required credential was empty. Fatal at construction time.
    #[error("Missing required credential: {0}")]
    MissingCredential(&'static str),
    /// An enqueue was attempted after the queue was closed. The caller
    /// should stop sending.
    #[error("Dispatch queue is closed")]
    QueueClosed,
    #[error("Session is not connected")]
    NotConnected,
    #[error("Session is already connected")]
    AlreadyConnected,
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
