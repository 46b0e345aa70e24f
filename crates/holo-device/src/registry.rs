// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Device registry: known displays, matched by serial across refreshes.
//!
//! Ids are allocated monotonically and never reused. A device the service
//! stops reporting is marked disconnected, not removed, so a selection that
//! refers to it survives a daemon restart.

use std::collections::{BTreeMap, BTreeSet};

use holo_quilt::LightfieldImage;
use holo_service_client::DisplayService;
use holo_service_proto::ShowSource;
use tracing::{debug, info, warn};

use crate::hardware::HardwareType;
use crate::record::{DeviceId, DeviceRecord};
use crate::{RegistryError, Result};

/// What one [`DeviceRegistry::refresh`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Newly created records.
    pub added: Vec<DeviceId>,
    /// Existing records matched and updated.
    pub updated: Vec<DeviceId>,
    /// Records the service no longer reports.
    pub lost: Vec<DeviceId>,
}

/// Known devices plus the active pointer.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<DeviceId, DeviceRecord>,
    active: Option<DeviceId>,
    next_id: DeviceId,
}

impl DeviceRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> DeviceId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Re-read the device list from `service` and reconcile it.
    ///
    /// When no device is active afterwards, the first connected one becomes
    /// active.
    pub fn refresh(&mut self, service: &mut dyn DisplayService) -> Result<RefreshSummary> {
        let reports = service.devices()?;
        let mut summary = RefreshSummary::default();
        let mut seen = BTreeSet::new();

        for report in &reports {
            // Without a serial only the live record at the same index is the same unit.
            let serial = report.serial();
            let existing = self
                .devices
                .values()
                .filter(|d| !d.emulated && !seen.contains(&d.id))
                .find(|d| {
                    if serial.is_empty() {
                        d.serial.is_empty() && d.connected && d.service_index == Some(report.index)
                    } else {
                        d.serial == serial
                    }
                })
                .map(|d| d.id);
            let id = match existing {
                Some(id) => {
                    if let Some(record) = self.devices.get_mut(&id) {
                        if !record.connected {
                            info!(device = id, serial = %record.serial, "device reconnected");
                        }
                        record.apply_report(report);
                    }
                    summary.updated.push(id);
                    id
                }
                None => {
                    let id = self.allocate();
                    let record = DeviceRecord::from_report(id, report);
                    info!(
                        device = id,
                        serial = %record.serial,
                        hardware = %record.hardware_type,
                        index = report.index,
                        "device added"
                    );
                    self.devices.insert(id, record);
                    summary.added.push(id);
                    id
                }
            };
            seen.insert(id);
        }

        for record in self.devices.values_mut() {
            if record.emulated || !record.connected || seen.contains(&record.id) {
                continue;
            }
            record.connected = false;
            record.service_index = None;
            warn!(device = record.id, serial = %record.serial, "device disconnected");
            summary.lost.push(record.id);
        }

        if self.active.is_none() {
            let first = self.list(false).find(|d| !d.emulated).map(|d| d.id);
            if let Some(first) = first {
                self.set_active(first)?;
            }
        }
        debug!(
            added = summary.added.len(),
            updated = summary.updated.len(),
            lost = summary.lost.len(),
            "device refresh"
        );
        Ok(summary)
    }

    /// Add an offline device built from the hardware class template.
    pub fn add_emulated(&mut self, hardware: HardwareType) -> DeviceId {
        let id = self.allocate();
        let record = DeviceRecord::emulated(id, hardware);
        info!(device = id, hardware = %hardware, "emulated device added");
        self.devices.insert(id, record);
        id
    }

    /// Make `id` the active device.
    pub fn set_active(&mut self, id: DeviceId) -> Result<()> {
        if !self.devices.contains_key(&id) {
            return Err(RegistryError::DeviceNotFound(id));
        }
        if self.active != Some(id) {
            info!(device = id, "active device");
        }
        self.active = Some(id);
        Ok(())
    }

    /// The active device, if any.
    pub fn get_active(&self) -> Option<&DeviceRecord> {
        self.active.and_then(|id| self.devices.get(&id))
    }

    /// Id of the active device.
    pub fn active_id(&self) -> Option<DeviceId> {
        self.active
    }

    /// Forget a device, clearing the active pointer first if it pointed here.
    pub fn remove(&mut self, id: DeviceId) -> Result<DeviceRecord> {
        if self.active == Some(id) {
            self.active = None;
        }
        let record = self
            .devices
            .remove(&id)
            .ok_or(RegistryError::DeviceNotFound(id))?;
        info!(device = id, serial = %record.serial, "device removed");
        Ok(record)
    }

    /// Devices in id order; disconnected ones only when asked for.
    pub fn list(&self, include_disconnected: bool) -> impl Iterator<Item = &DeviceRecord> + '_ {
        self.devices
            .values()
            .filter(move |d| include_disconnected || d.connected)
    }

    /// Device by id.
    pub fn get(&self, id: DeviceId) -> Result<&DeviceRecord> {
        self.devices.get(&id).ok_or(RegistryError::DeviceNotFound(id))
    }

    /// Device by serial. An empty serial names no device.
    pub fn find_by_serial(&self, serial: &str) -> Option<&DeviceRecord> {
        if serial.is_empty() {
            return None;
        }
        self.devices.values().find(|d| d.serial == serial)
    }

    /// Number of records, disconnected included.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// True when no device is known.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Show `lightfield` on device `id` (or the active device).
    pub fn display(
        &self,
        id: Option<DeviceId>,
        service: &mut dyn DisplayService,
        lightfield: &mut LightfieldImage,
        flip_views: bool,
        aspect: Option<f32>,
        invert: bool,
    ) -> Result<()> {
        self.resolve(id)?
            .display(service, lightfield, flip_views, aspect, invert)
    }

    /// Show cached or demo content on device `id` (or the active device).
    pub fn show_source(
        &self,
        id: Option<DeviceId>,
        service: &mut dyn DisplayService,
        source: ShowSource,
    ) -> Result<()> {
        self.resolve(id)?.show_source(service, source)
    }

    /// Clear device `id` (or the active device).
    pub fn clear(&self, id: Option<DeviceId>, service: &mut dyn DisplayService) -> Result<()> {
        self.resolve(id)?.clear(service)
    }

    /// The given device, or the active one.
    pub fn resolve(&self, id: Option<DeviceId>) -> Result<&DeviceRecord> {
        match id.or(self.active) {
            Some(id) => self.get(id),
            None => Err(RegistryError::NoActiveDevice),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn emulated_devices_get_fresh_ids() {
        let mut reg = DeviceRegistry::new();
        let a = reg.add_emulated(HardwareType::Portrait);
        let b = reg.add_emulated(HardwareType::Go);
        assert_ne!(a, b);
        let go = reg.get(b).unwrap();
        assert!(go.emulated && go.connected);
        assert_eq!(go.hardware_type, "go");
        assert_eq!(go.default_quilt.map(|q| q.tile_x), Some(11));
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut reg = DeviceRegistry::new();
        let a = reg.add_emulated(HardwareType::Portrait);
        reg.remove(a).unwrap();
        let b = reg.add_emulated(HardwareType::Portrait);
        assert!(b > a);
    }

    #[test]
    fn active_pointer_follows_set_and_remove() {
        let mut reg = DeviceRegistry::new();
        let a = reg.add_emulated(HardwareType::Standard);
        assert!(reg.get_active().is_none());
        assert!(matches!(
            reg.set_active(42),
            Err(RegistryError::DeviceNotFound(42))
        ));
        reg.set_active(a).unwrap();
        assert_eq!(reg.get_active().map(|d| d.id), Some(a));
        reg.remove(a).unwrap();
        assert!(reg.get_active().is_none());
        assert!(matches!(reg.remove(a), Err(RegistryError::DeviceNotFound(_))));
    }

    #[test]
    fn resolve_without_active_fails() {
        let reg = DeviceRegistry::new();
        assert!(matches!(reg.resolve(None), Err(RegistryError::NoActiveDevice)));
    }

    #[test]
    fn find_by_serial_sees_emulated_records() {
        let mut reg = DeviceRegistry::new();
        let id = reg.add_emulated(HardwareType::Pro);
        let serial = reg.get(id).unwrap().serial.clone();
        assert_eq!(reg.find_by_serial(&serial).map(|d| d.id), Some(id));
        assert!(reg.find_by_serial("nope").is_none());
    }
}
