// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire schema for the holographic display service.
//!
//! Every request is one CBOR map `{cmd: {<verb>: {...}}, bin: <bytes>}` and
//! every reply a map `{error: <code>, ...}`. Messages travel over the daemon's
//! scalability-protocols IPC socket; [`wire`] owns that framing.

#![forbid(unsafe_code)]

pub mod command;
mod error;
pub mod report;
pub mod wire;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use command::{BinPayload, Command, ShowSettings, ShowSource};
pub use error::ProtocolError;
pub use report::{DefaultQuilt, InfoReply, RawCalibration, ReportedDevice};

/// Environment variable overriding the daemon socket path.
pub const SOCKET_ENV: &str = "HOLO_DRIVER_SOCKET";

/// Socket the display daemon listens on when nothing overrides it.
pub const WELL_KNOWN_SOCKET: &str = "/tmp/holoplay-driver.ipc";

/// Default socket path for the display daemon.
///
/// Honors [`SOCKET_ENV`] and falls back to [`WELL_KNOWN_SOCKET`].
pub fn default_socket_path() -> PathBuf {
    resolve_socket_path(std::env::var(SOCKET_ENV).ok().as_deref())
}

fn resolve_socket_path(env: Option<&str>) -> PathBuf {
    match env {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(WELL_KNOWN_SOCKET),
    }
}

/// `major.minor.patch` version reported by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceVersion {
    /// Breaking-change counter.
    pub major: u32,
    /// Feature counter.
    pub minor: u32,
    /// Fix counter; 0 when the daemon omits it.
    pub patch: u32,
}

impl ServiceVersion {
    /// Oldest daemon major version this client talks to.
    pub const MIN_MAJOR: u32 = 1;

    /// Whether this client can drive a daemon of this version.
    pub fn is_supported(&self) -> bool {
        self.major >= Self::MIN_MAJOR
    }
}

impl FromStr for ServiceVersion {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ProtocolError::DeserializeError(format!("bad version string '{s}'"));
        let mut parts = s.trim().trim_start_matches('v').split('.');
        let mut next = |required: bool| -> Result<u32, ProtocolError> {
            match parts.next() {
                Some(p) => p.parse().map_err(|_| bad()),
                None if required => Err(bad()),
                None => Ok(0),
            }
        };
        let version = Self {
            major: next(true)?,
            minor: next(true)?,
            patch: next(false)?,
        };
        if parts.next().is_some() {
            return Err(bad());
        }
        Ok(version)
    }
}

impl fmt::Display for ServiceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_prefers_override() {
        assert_eq!(
            resolve_socket_path(Some("/run/holo.ipc")),
            PathBuf::from("/run/holo.ipc")
        );
        assert_eq!(resolve_socket_path(Some("")), PathBuf::from(WELL_KNOWN_SOCKET));
        assert_eq!(resolve_socket_path(None), PathBuf::from(WELL_KNOWN_SOCKET));
    }

    #[test]
    fn versions_parse_with_optional_patch() {
        let v: ServiceVersion = "1.2.3".parse().unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 2, 3));
        let v: ServiceVersion = "v2.0".parse().unwrap();
        assert_eq!(v.to_string(), "2.0.0");
        assert!("1".parse::<ServiceVersion>().is_err());
        assert!("1.2.3.4".parse::<ServiceVersion>().is_err());
        assert!("one.two".parse::<ServiceVersion>().is_err());
    }

    #[test]
    fn pre_release_daemons_are_unsupported() {
        assert!(!"0.9.1".parse::<ServiceVersion>().unwrap().is_supported());
        assert!("1.0.0".parse::<ServiceVersion>().unwrap().is_supported());
    }
}
