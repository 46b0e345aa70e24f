// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted client preferences: daemon endpoint, timeouts and quilt presets.

use std::path::PathBuf;
use std::time::Duration;

use holo_quilt::{FormatId, QuiltFormat, QuiltFormatRegistry};
use serde::{Deserialize, Serialize};

/// Config key the client prefs are stored under.
pub const CLIENT_PREFS_KEY: &str = "client";

/// Saved preferences for a display-service client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientPrefs {
    /// Daemon socket; `None` uses the daemon's well-known address.
    pub endpoint: Option<PathBuf>,
    /// Application id announced on `init`.
    pub app_id: String,
    /// Send/receive timeout in milliseconds.
    pub timeout_ms: u64,
    /// Extra quilt formats registered at start-up.
    pub presets: Vec<QuiltFormat>,
    /// Hardware type tags added as emulated devices at start-up.
    pub emulated: Vec<String>,
}

impl Default for ClientPrefs {
    fn default() -> Self {
        Self {
            endpoint: None,
            app_id: "holo".into(),
            timeout_ms: 5000,
            presets: Vec::new(),
            emulated: Vec::new(),
        }
    }
}

impl ClientPrefs {
    /// Timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Register every valid preset; invalid ones are logged and skipped.
    pub fn apply_presets(&self, registry: &mut QuiltFormatRegistry) -> Vec<FormatId> {
        registry.load_presets(self.presets.iter().cloned())
    }
}
