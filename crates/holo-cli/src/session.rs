// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-invocation state: saved prefs, quilt formats, the display service and
//! the devices it reports.

use anyhow::{Context, Result};
use holo_app_core::config::ConfigService;
use holo_app_core::config_port::PrefsPort;
use holo_app_core::prefs::ClientPrefs;
use holo_config_fs::FsConfigStore;
use holo_device::{DeviceRegistry, HardwareType};
use holo_quilt::QuiltFormatRegistry;
use holo_service_client::{DisplayService, DisplayServiceClient, ServiceConfig, ServiceRegistry};
use holo_service_proto::default_socket_path;
use tracing::{info, warn};

use crate::GlobalArgs;

pub(crate) struct Session {
    pub(crate) prefs: ClientPrefs,
    pub(crate) formats: QuiltFormatRegistry,
    pub(crate) devices: DeviceRegistry,
    services: ServiceRegistry,
}

impl Session {
    /// Prefs and formats only; nothing is dialed.
    pub(crate) fn offline(global: &GlobalArgs) -> Self {
        let prefs = load_prefs(global);
        let mut formats = QuiltFormatRegistry::with_builtins();
        prefs.apply_presets(&mut formats);
        Self {
            prefs,
            formats,
            devices: DeviceRegistry::new(),
            services: ServiceRegistry::with_defaults(),
        }
    }

    /// Prefs and formats plus a live service and its devices.
    pub(crate) fn online(global: &GlobalArgs) -> Result<Self> {
        let mut session = Self::offline(global);
        session.connect(global)?;
        Ok(session)
    }

    /// Dial the daemon, read its device list and add the emulated devices.
    ///
    /// An unreachable daemon is fatal unless emulated devices are configured.
    pub(crate) fn connect(&mut self, global: &GlobalArgs) -> Result<()> {
        let config = self.service_config(global);
        let mut client = DisplayServiceClient::for_socket(
            config.endpoint.clone(),
            config.timeout,
            config.app_id.clone(),
        );
        let connected = client.connect();
        self.services.add_service(Box::new(client));

        match connected {
            Ok(version) => {
                info!(%version, endpoint = %config.endpoint.display(), "display service ready");
                let service = self.services.active_service_mut()?;
                self.devices
                    .refresh(service)
                    .context("read device list")?;
            }
            Err(err) if self.prefs.emulated.is_empty() => {
                let endpoint = config.endpoint.display();
                return Err(anyhow::Error::new(err)
                    .context(format!("connect to display service at {endpoint}")));
            }
            Err(err) => warn!(%err, "display service unavailable; emulated devices only"),
        }

        for tag in &self.prefs.emulated {
            match tag.parse::<HardwareType>() {
                Ok(hardware) => {
                    self.devices.add_emulated(hardware);
                }
                Err(err) => warn!(%err, "emulated device skipped"),
            }
        }
        if self.devices.active_id().is_none() {
            let first = self.devices.list(false).next().map(|d| d.id);
            if let Some(first) = first {
                self.devices.set_active(first)?;
            }
        }
        Ok(())
    }

    /// Flags win over saved prefs; the endpoint falls back to the daemon's
    /// default address.
    fn service_config(&self, global: &GlobalArgs) -> ServiceConfig {
        let endpoint = global
            .socket
            .clone()
            .or_else(|| self.prefs.endpoint.clone())
            .unwrap_or_else(default_socket_path);
        let timeout = global
            .timeout_ms
            .map_or_else(|| self.prefs.timeout(), std::time::Duration::from_millis);
        ServiceConfig {
            endpoint,
            app_id: self.prefs.app_id.clone(),
            timeout,
        }
    }

    /// Split borrow for calls that need the device table and the service.
    pub(crate) fn parts(&mut self) -> Result<(&DeviceRegistry, &mut dyn DisplayService)> {
        let service = self.services.active_service_mut()?;
        Ok((&self.devices, service))
    }
}

fn load_prefs(global: &GlobalArgs) -> ClientPrefs {
    let store = match &global.config_dir {
        Some(dir) => FsConfigStore::at(dir),
        None => FsConfigStore::new(),
    };
    match store {
        Ok(store) => ConfigService::new(store).load_or_init_prefs(),
        Err(err) => {
            warn!(%err, "config directory unavailable; using default prefs");
            ClientPrefs::default()
        }
    }
}
