// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! One physical or emulated display and the calls that drive it.

use holo_quilt::LightfieldImage;
use holo_service_client::DisplayService;
use holo_service_proto::{DefaultQuilt, ReportedDevice, ShowSettings, ShowSource};
use serde::Serialize;
use tracing::{debug, info};

use crate::calibration::Calibration;
use crate::hardware::HardwareType;
use crate::payload::QuiltPayload;
use crate::{RegistryError, Result};

/// Local device id; monotonic, never reused.
pub type DeviceId = u32;

/// What the registry knows about one display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    /// Registry id.
    pub id: DeviceId,
    /// Hardware class tag as reported (e.g. `portrait`).
    pub hardware_type: String,
    /// Stable serial used to match reports across refreshes.
    pub serial: String,
    /// Daemon-assigned index while connected.
    pub service_index: Option<u32>,
    /// Reported by the service on the last refresh.
    pub connected: bool,
    /// Synthesised offline record.
    pub emulated: bool,
    /// Derived calibration.
    pub calibration: Calibration,
    /// Preferred quilt geometry.
    pub default_quilt: Option<DefaultQuilt>,
    /// Window origin on the desktop.
    pub window_coords: Option<(i32, i32)>,
}

impl DeviceRecord {
    pub(crate) fn from_report(id: DeviceId, report: &ReportedDevice) -> Self {
        let mut record = Self {
            id,
            hardware_type: String::new(),
            serial: report.serial().to_owned(),
            service_index: None,
            connected: true,
            emulated: false,
            calibration: Calibration::default(),
            default_quilt: None,
            window_coords: None,
        };
        record.apply_report(report);
        record
    }

    /// Copy the service-reported fields into this record.
    pub(crate) fn apply_report(&mut self, report: &ReportedDevice) {
        let template = report.hardware_version.parse::<HardwareType>().ok();
        self.hardware_type.clone_from(&report.hardware_version);
        self.service_index = Some(report.index);
        self.connected = true;
        let fallback = template.map(HardwareType::calibration);
        self.calibration = report
            .calibration
            .as_ref()
            .or(fallback.as_ref())
            .map(Calibration::derive)
            .unwrap_or_default();
        self.default_quilt = report
            .default_quilt
            .or_else(|| template.map(HardwareType::default_quilt));
        self.window_coords = report.window_coords;
    }

    pub(crate) fn emulated(id: DeviceId, hardware: HardwareType) -> Self {
        Self {
            id,
            hardware_type: hardware.as_str().to_owned(),
            serial: format!("emulated-{}-{id}", hardware.as_str()),
            service_index: None,
            connected: true,
            emulated: true,
            calibration: Calibration::derive(&hardware.calibration()),
            default_quilt: Some(hardware.default_quilt()),
            window_coords: None,
        }
    }

    /// View cone in radians.
    pub fn view_cone_radians(&self) -> f64 {
        self.calibration.view_cone_radians()
    }

    /// Panel aspect ratio (width / height).
    pub fn aspect(&self) -> f64 {
        self.calibration.aspect
    }

    /// Daemon index to address, or why the device cannot be addressed.
    fn target(&self) -> Result<u32> {
        match (self.connected, self.service_index) {
            (true, Some(index)) => Ok(index),
            _ => Err(RegistryError::DeviceDisconnected(self.id)),
        }
    }

    /// Pack `lightfield` and send it to this display.
    ///
    /// `aspect` defaults to the lightfield's view aspect. Emulated devices
    /// pack the quilt and return without any I/O.
    pub fn display(
        &self,
        service: &mut dyn DisplayService,
        lightfield: &mut LightfieldImage,
        flip_views: bool,
        aspect: Option<f32>,
        invert: bool,
    ) -> Result<()> {
        let settings = ShowSettings {
            columns: lightfield.columns() as u32,
            rows: lightfield.rows() as u32,
            total_views: lightfield.view_count() as u32,
            aspect: aspect.unwrap_or_else(|| lightfield.format().view_aspect()),
            invert,
        };
        let target = if self.emulated {
            None
        } else {
            Some(self.target()?)
        };
        let quilt = lightfield.quilt(flip_views)?;
        let Some(target) = target else {
            info!(device = self.id, "emulated display: quilt accepted");
            return Ok(());
        };
        debug!(
            device = self.id,
            target,
            width = quilt.width,
            height = quilt.height,
            "sending quilt"
        );
        service.show(target, settings, &QuiltPayload::new(quilt))?;
        Ok(())
    }

    /// Show the daemon's cached quilt or its demo content.
    pub fn show_source(&self, service: &mut dyn DisplayService, source: ShowSource) -> Result<()> {
        if self.emulated {
            info!(device = self.id, source = source.as_str(), "emulated display: show");
            return Ok(());
        }
        service.show_source(self.target()?, source)?;
        Ok(())
    }

    /// Clear this display.
    pub fn clear(&self, service: &mut dyn DisplayService) -> Result<()> {
        if self.emulated {
            info!(device = self.id, "emulated display cleared");
            return Ok(());
        }
        service.hide(self.target()?)?;
        Ok(())
    }
}
