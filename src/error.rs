use thiserror::Error;

/// Error returned from most functions
#[derive(Debug, Error)]
pub enum Error {
    /// The peer sent a syntactically or semantically invalid command.
    /// Recovered at the handler: written back as a RESP error frame, the
    /// connection stays open.
    #[error("{0}")]
    BadRequest(String),

    /// The encoder was handed a value it cannot represent on the wire.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Read timeout or unexpected EOF. Closes the socket.
    #[error("connection error: {0}")]
    Connection(String),

    /// Client-side wrapper for transport failures surfaced through
    /// `execute`, `acquire` and `close`.
    #[error("client error: {0}")]
    Client(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Specialized Result returned from most functions for convenience
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn bad_request(msg: impl Into<String>) -> Error {
        Error::BadRequest(msg.into())
    }

    pub(crate) fn client(msg: impl Into<String>) -> Error {
        Error::Client(msg.into())
    }
}
