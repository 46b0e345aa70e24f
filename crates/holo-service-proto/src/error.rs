// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Failure taxonomy shared by the daemon and the client.

use std::io;

use holo_cbor::CodecError;

/// Errors raised while talking to the display daemon.
///
/// The first group mirrors the daemon's numeric client-error codes; see
/// [`ProtocolError::code`] and [`ProtocolError::from_code`].
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The daemon is not running or refused the connection.
    #[error("display service is not running or unreachable")]
    NoService,
    /// The daemon speaks an incompatible protocol version.
    #[error("display service version mismatch: {0}")]
    VersionMismatch(String),
    /// A request could not be serialized.
    #[error("serialize error: {0}")]
    SerializeError(String),
    /// A message could not be deserialized.
    #[error("deserialize error: {0}")]
    DeserializeError(String),
    /// A message exceeds the transport limit.
    #[error("message of {0} bytes is too big")]
    MessageTooBig(u64),
    /// Send or receive did not finish within the timeout.
    #[error("timed out waiting for the display service")]
    Timeout,
    /// The transport was closed under the client.
    #[error("connection to the display service was lost")]
    BrokenPipe,
    /// The daemon has not been sent `init` yet.
    #[error("display service session not initialized")]
    NotInitialized,
    /// The connection is not `Ready`; nothing was sent.
    #[error("display service connection is not ready")]
    NotReady,
    /// A reply failed to decode or a request failed to encode.
    #[error("codec: {0}")]
    Codec(#[from] CodecError),
    /// The daemon reported a code this client does not know.
    #[error("display service error code {0}")]
    Daemon(u32),
    /// Any other transport failure.
    #[error("io: {0}")]
    Io(io::Error),
}

impl ProtocolError {
    /// Map a daemon `error` field to a failure; `None` for code 0.
    pub fn from_code(code: u32) -> Option<Self> {
        let reported = || format!("reported by daemon (code {code})");
        Some(match code {
            0 => return None,
            1 => Self::NoService,
            2 => Self::VersionMismatch(reported()),
            3 => Self::SerializeError(reported()),
            4 => Self::DeserializeError(reported()),
            5 => Self::MessageTooBig(0),
            6 | 7 => Self::Timeout,
            8 => Self::BrokenPipe,
            9 => Self::NotInitialized,
            other => Self::Daemon(other),
        })
    }

    /// Numeric code of this failure, when it has one on the wire.
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::NoService => Some(1),
            Self::VersionMismatch(_) => Some(2),
            Self::SerializeError(_) => Some(3),
            Self::DeserializeError(_) => Some(4),
            Self::MessageTooBig(_) => Some(5),
            Self::Timeout => Some(7),
            Self::BrokenPipe => Some(8),
            Self::NotInitialized => Some(9),
            Self::Daemon(code) => Some(*code),
            Self::NotReady | Self::Codec(_) | Self::Io(_) => None,
        }
    }

    /// Only timeouts and broken pipes are worth retrying unchanged
    /// (the latter after a fresh dial).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::BrokenPipe)
    }

    /// Whether the transport must be re-dialed before further use.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::BrokenPipe)
    }

    /// Classify a transport error.
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::Timeout,
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof => Self::BrokenPipe,
            io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => Self::NoService,
            _ => Self::Io(err),
        }
    }
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        Self::from_io(err)
    }
}
