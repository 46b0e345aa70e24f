// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Client for the holographic display daemon plus the service registry.
//!
//! [`DisplayServiceClient`] speaks the request/reply protocol over a
//! [`Transport`]; [`ServiceRegistry`] tracks backends and which one is active.

mod client;
mod registry;
mod service;
pub mod transport;

pub use client::{ConnectionState, DisplayServiceClient};
pub use registry::{RegistryError, ServiceConfig, ServiceFactory, ServiceRegistry};
pub use service::DisplayService;
pub use transport::{Dialer, SocketDialer, SpTransport, Transport, DEFAULT_TIMEOUT};

/// Type tag of the local display-daemon backend.
pub const HOLOPLAY_SERVICE: &str = "holoplay";
