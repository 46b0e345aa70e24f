// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Message transports to the display daemon.

use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::time::Duration;

use holo_service_proto::wire::{exchange_handshake, read_message, PROTO_REP, PROTO_REQ};
use holo_service_proto::ProtocolError;
use tracing::debug;

/// Default send/receive timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected, message-oriented channel to the daemon.
pub trait Transport: Send {
    /// Write one fully framed message.
    fn send(&mut self, frame: &[u8]) -> Result<(), ProtocolError>;
    /// Block for the next message body (request id + payload).
    ///
    /// `Timeout` means no byte of the next frame was consumed; a stall after
    /// that is reported as `BrokenPipe`.
    fn recv(&mut self) -> Result<Vec<u8>, ProtocolError>;
}

/// Something that can open a fresh [`Transport`].
pub trait Dialer: Send {
    /// Open a connection; fails with `NoService` when nobody listens.
    fn dial(&self) -> Result<Box<dyn Transport>, ProtocolError>;
    /// Human readable endpoint for logs.
    fn endpoint(&self) -> String;
}

/// SP requester over a Unix-domain stream socket.
#[derive(Debug)]
pub struct SpTransport {
    stream: UnixStream,
}

impl SpTransport {
    /// Connect to `path` and complete the SP header exchange.
    pub fn dial(path: &Path, timeout: Duration) -> Result<Self, ProtocolError> {
        let stream = UnixStream::connect(path).map_err(|err| {
            debug!(path = %path.display(), %err, "display daemon socket unavailable");
            ProtocolError::NoService
        })?;
        Self::from_stream(stream, timeout)
    }

    /// Wrap an already connected stream (e.g. one end of `UnixStream::pair`).
    pub fn from_stream(mut stream: UnixStream, timeout: Duration) -> Result<Self, ProtocolError> {
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        exchange_handshake(&mut stream, PROTO_REQ, PROTO_REP)?;
        Ok(Self { stream })
    }
}

impl Transport for SpTransport {
    fn send(&mut self, frame: &[u8]) -> Result<(), ProtocolError> {
        self.stream.write_all(frame)?;
        self.stream.flush()?;
        Ok(())
    }

    fn recv(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let mut counted = Counted {
            inner: &mut self.stream,
            read: 0,
        };
        match read_message(&mut counted) {
            // the next read would start inside this frame
            Err(ProtocolError::Timeout) if counted.read > 0 => {
                debug!(bytes = counted.read, "reply stalled mid-frame");
                Err(ProtocolError::BrokenPipe)
            }
            other => other,
        }
    }
}

/// Counts bytes pulled through to the inner reader.
struct Counted<'a, R> {
    inner: &'a mut R,
    read: usize,
}

impl<R: Read> Read for Counted<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.read += n;
        Ok(n)
    }
}

/// Dials [`SpTransport`]s to a fixed socket path.
#[derive(Debug, Clone)]
pub struct SocketDialer {
    path: PathBuf,
    timeout: Duration,
}

impl SocketDialer {
    /// Dialer for `path` with the given send/receive timeout.
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    /// Socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Dialer for SocketDialer {
    fn dial(&self) -> Result<Box<dyn Transport>, ProtocolError> {
        Ok(Box::new(SpTransport::dial(&self.path, self.timeout)?))
    }

    fn endpoint(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_socket_is_no_service() {
        let dir = std::env::temp_dir().join("holo-no-such-daemon.ipc");
        assert!(matches!(
            SpTransport::dial(&dir, DEFAULT_TIMEOUT),
            Err(ProtocolError::NoService)
        ));
    }

    #[test]
    fn silent_peer_times_out_during_handshake() {
        let (ours, _theirs) = UnixStream::pair().unwrap();
        assert!(matches!(
            SpTransport::from_stream(ours, Duration::from_millis(50)),
            Err(ProtocolError::Timeout)
        ));
    }

    #[test]
    fn closed_peer_is_a_broken_pipe() {
        let (ours, theirs) = UnixStream::pair().unwrap();
        drop(theirs);
        let err = SpTransport::from_stream(ours, Duration::from_millis(50)).unwrap_err();
        assert!(err.is_disconnect(), "{err:?}");
    }

    #[test]
    fn stall_inside_a_frame_is_a_broken_pipe() {
        let (ours, mut theirs) = UnixStream::pair().unwrap();
        theirs
            .write_all(&holo_service_proto::wire::handshake(PROTO_REP))
            .unwrap();
        let mut transport = SpTransport::from_stream(ours, Duration::from_millis(50)).unwrap();
        let mut peer = [0u8; 8];
        theirs.read_exact(&mut peer).unwrap();

        assert!(matches!(transport.recv(), Err(ProtocolError::Timeout)));

        // header promises 16 bytes, only 3 arrive
        theirs.write_all(&[0x01, 0, 0, 0, 0, 0, 0, 0, 16, 0x80, 0, 0]).unwrap();
        let err = transport.recv().unwrap_err();
        assert!(err.is_disconnect(), "{err:?}");
    }
}
