// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for holo crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`daemon`] - Scripted display daemon speaking the SP framing on a socket
//! - [`devices`] - Device-report builders for `info` replies

pub mod config;
pub mod daemon;
pub mod devices;

pub use config::InMemoryConfigStore;
pub use daemon::{DaemonScript, FakeDaemon};
pub use devices::DeviceReportBuilder;
