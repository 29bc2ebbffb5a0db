use crate::packet::PacketCode;

pub type Result<T> = std::result::Result<T, Error>;

/// The error type for MaazDB protocol and associated I/O operations.
#[derive(Debug)]
pub enum Error {
    /// Socket- or TLS-level failure.
    Io(std::io::Error),
    /// The peer closed the connection while a request was pending.
    ConnectionClosed,
    /// The server rejected the credential handshake.
    Auth(String),
    /// The server sent a packet code this driver does not recognize.
    Protocol(PacketCode),
    /// The connection is not ready for queries.
    NotConnected,
    /// The slot already holds a pending request. Unreachable through the
    /// public API; reported instead of silently replacing the continuation.
    RequestInFlight,
    /// The payload byte length does not fit the 4 byte wire length field.
    PayloadTooLarge,
    Unexpected(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "encountered I/O error: {e}"),
            Error::ConnectionClosed => write!(f, "connection closed by peer"),
            Error::Auth(msg) => write!(f, "authentication rejected by server: {msg}"),
            Error::Protocol(code) => write!(f, "unknown packet code {code}"),
            Error::NotConnected => write!(f, "not connected to server"),
            Error::RequestInFlight => {
                write!(f, "a request is already in flight on this connection")
            }
            Error::PayloadTooLarge => write!(f, "payload length exceeds the u32 wire limit"),
            Error::Unexpected(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Unexpected(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Error::Unexpected(value.to_string())
    }
}
