// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Process-wide table of display-service backends and the active pointer.
//!
//! Backends are built from a type tag through registered factories. Adding a
//! backend while no other one is ready promotes it to active, so the first
//! backend that dials successfully becomes the default. At most one backend
//! is ready at a time: a ready newcomer is disconnected when another backend
//! already holds a session.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use holo_service_proto::default_socket_path;
use thiserror::Error;
use tracing::{info, warn};

use crate::client::DisplayServiceClient;
use crate::service::DisplayService;
use crate::transport::DEFAULT_TIMEOUT;
use crate::HOLOPLAY_SERVICE;

/// Service-table lookup failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No service with this id.
    #[error("service {0} not found")]
    ServiceNotFound(u32),
    /// No factory registered for this type tag.
    #[error("unknown service type: {0}")]
    UnknownServiceType(String),
    /// The registry has no active service.
    #[error("no active display service")]
    NoActiveService,
}

/// Settings passed to a service factory.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Daemon endpoint (socket path).
    pub endpoint: PathBuf,
    /// Application id announced on `init`.
    pub app_id: String,
    /// Send/receive timeout.
    pub timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: default_socket_path(),
            app_id: "holo".into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Constructor for one backend type.
pub type ServiceFactory = fn(&ServiceConfig) -> Box<dyn DisplayService>;

fn holoplay_factory(config: &ServiceConfig) -> Box<dyn DisplayService> {
    Box::new(DisplayServiceClient::for_socket(
        config.endpoint.clone(),
        config.timeout,
        config.app_id.clone(),
    ))
}

/// Registered backends keyed by a monotonic id.
pub struct ServiceRegistry {
    factories: BTreeMap<String, ServiceFactory>,
    services: BTreeMap<u32, Box<dyn DisplayService>>,
    active: Option<u32>,
    next_id: u32,
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .field("services", &self.services.keys().collect::<Vec<_>>())
            .field("active", &self.active)
            .finish()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ServiceRegistry {
    /// Registry with no factories.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
            services: BTreeMap::new(),
            active: None,
            next_id: 0,
        }
    }

    /// Registry with the built-in `holoplay` daemon backend.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register_factory(HOLOPLAY_SERVICE, holoplay_factory);
        registry
    }

    /// Register (or replace) the constructor for `tag`.
    pub fn register_factory(&mut self, tag: impl Into<String>, factory: ServiceFactory) {
        self.factories.insert(tag.into(), factory);
    }

    /// Registered type tags, sorted.
    pub fn service_types(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build a backend of type `tag`, try to connect it and register it.
    ///
    /// A failed connect is logged, not returned: the backend stays registered
    /// and may be connected later.
    pub fn add(&mut self, tag: &str, config: &ServiceConfig) -> Result<u32, RegistryError> {
        let factory = self
            .factories
            .get(tag)
            .ok_or_else(|| RegistryError::UnknownServiceType(tag.to_owned()))?;
        let mut service = factory(config);
        if let Err(err) = service.connect() {
            warn!(service = tag, %err, "display service not reachable");
        }
        Ok(self.add_service(service))
    }

    /// Register an already built backend.
    pub fn add_service(&mut self, mut service: Box<dyn DisplayService>) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        let kind = service.kind();
        let other_ready = self.ready_id();
        if service.is_ready() {
            if let Some(holder) = other_ready {
                warn!(service = id, kind, holder, "another display service is ready; disconnecting");
                service.disconnect();
            }
        }
        let ready = service.is_ready();
        self.services.insert(id, service);
        if self.active.is_none() || ready {
            self.active = Some(id);
            info!(service = id, kind, "active display service");
        }
        id
    }

    /// The service currently holding a session, if any.
    pub fn ready_id(&self) -> Option<u32> {
        self.services
            .iter()
            .find(|(_, s)| s.is_ready())
            .map(|(id, _)| *id)
    }

    /// Make `id` active; readiness is not checked.
    pub fn set_active(&mut self, id: u32) -> Result<(), RegistryError> {
        if !self.services.contains_key(&id) {
            return Err(RegistryError::ServiceNotFound(id));
        }
        if self.active != Some(id) {
            info!(service = id, "active display service");
        }
        self.active = Some(id);
        Ok(())
    }

    /// Id of the active service.
    pub fn active(&self) -> Option<u32> {
        self.active
    }

    /// The active service.
    pub fn active_service_mut(&mut self) -> Result<&mut dyn DisplayService, RegistryError> {
        let id = self.active.ok_or(RegistryError::NoActiveService)?;
        self.get_mut(id)
    }

    /// Service by id.
    pub fn get(&self, id: u32) -> Result<&dyn DisplayService, RegistryError> {
        self.services
            .get(&id)
            .map(|s| &**s)
            .ok_or(RegistryError::ServiceNotFound(id))
    }

    /// Mutable service by id.
    pub fn get_mut(&mut self, id: u32) -> Result<&mut dyn DisplayService, RegistryError> {
        match self.services.get_mut(&id) {
            Some(s) => Ok(&mut **s),
            None => Err(RegistryError::ServiceNotFound(id)),
        }
    }

    /// Disconnect and drop a service, clearing the active pointer first.
    pub fn remove(&mut self, id: u32) -> Result<(), RegistryError> {
        if !self.services.contains_key(&id) {
            return Err(RegistryError::ServiceNotFound(id));
        }
        if self.active == Some(id) {
            self.active = None;
        }
        if let Some(mut service) = self.services.remove(&id) {
            service.disconnect();
        }
        info!(service = id, "display service removed");
        Ok(())
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<u32> {
        self.services.keys().copied().collect()
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// True when no service is registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
