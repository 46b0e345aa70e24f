// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lightfield display devices.
//!
//! - [`calibration`]: derived lenticular parameters from raw firmware fields
//! - [`hardware`]: hardware classes and their emulation templates
//! - [`record`]: [`DeviceRecord`] plus `display` / `clear`
//! - [`registry`]: [`DeviceRegistry`], refreshed from a display service

#![forbid(unsafe_code)]

pub mod calibration;
pub mod hardware;
mod payload;
pub mod record;
pub mod registry;

use holo_quilt::FormatError;
use holo_service_proto::ProtocolError;

pub use calibration::Calibration;
pub use hardware::HardwareType;
pub use payload::QuiltPayload;
pub use record::{DeviceId, DeviceRecord};
pub use registry::{DeviceRegistry, RefreshSummary};

/// Device lookup and device I/O failures.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No device with this id.
    #[error("device {0} not found")]
    DeviceNotFound(DeviceId),
    /// The device is known but the service no longer reports it.
    #[error("device {0} is disconnected")]
    DeviceDisconnected(DeviceId),
    /// No device given and none is active.
    #[error("no active device")]
    NoActiveDevice,
    /// Hardware tag with no emulation template.
    #[error("unknown hardware type: {0}")]
    UnknownHardwareType(String),
    /// Service-table failure.
    #[error(transparent)]
    Service(#[from] holo_service_client::RegistryError),
    /// Display-service failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Quilt packing failure.
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Result alias for device operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
