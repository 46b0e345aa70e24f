// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Capability interface shared by every display-service backend.

use holo_service_proto::{
    BinPayload, ProtocolError, ReportedDevice, ServiceVersion, ShowSettings, ShowSource,
};

/// A backend that can put quilts on lightfield displays.
///
/// Targets are daemon-assigned device indices, not local registry ids.
pub trait DisplayService: Send {
    /// Type tag this backend was registered under.
    fn kind(&self) -> &'static str;
    /// True once the backend has completed its handshake.
    fn is_ready(&self) -> bool;
    /// Open (or reopen) the backend.
    fn connect(&mut self) -> Result<ServiceVersion, ProtocolError>;
    /// Close the backend; idempotent.
    fn disconnect(&mut self);
    /// Version reported by the backend, once known.
    fn version(&self) -> Option<ServiceVersion>;
    /// Currently attached devices.
    fn devices(&mut self) -> Result<Vec<ReportedDevice>, ProtocolError>;
    /// Send a quilt; does not wait for delivery.
    fn show(
        &mut self,
        target: u32,
        settings: ShowSettings,
        bin: &dyn BinPayload,
    ) -> Result<(), ProtocolError>;
    /// Show cached or demo content.
    fn show_source(&mut self, target: u32, source: ShowSource) -> Result<(), ProtocolError>;
    /// Clear a display.
    fn hide(&mut self, target: u32) -> Result<(), ProtocolError>;
}
