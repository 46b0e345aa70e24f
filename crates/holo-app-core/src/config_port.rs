// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config port for client preferences.

use tracing::warn;

use crate::config::{ConfigService, ConfigStore};
use crate::prefs::{ClientPrefs, CLIENT_PREFS_KEY};

/// Config-facing port for loading/saving client preferences.
pub trait PrefsPort {
    /// Load client preferences (returns None if missing or unreadable).
    fn load_prefs(&self) -> Option<ClientPrefs>;
    /// Persist client preferences (best-effort; errors are logged).
    fn save_prefs(&self, prefs: &ClientPrefs);

    /// Stored prefs, or defaults persisted once when nothing is stored yet.
    fn load_or_init_prefs(&self) -> ClientPrefs;
}

impl<S: ConfigStore> PrefsPort for ConfigService<S> {
    fn load_prefs(&self) -> Option<ClientPrefs> {
        match self.load::<ClientPrefs>(CLIENT_PREFS_KEY) {
            Ok(prefs) => prefs,
            Err(err) => {
                warn!(%err, "client prefs unreadable; using defaults");
                None
            }
        }
    }

    fn save_prefs(&self, prefs: &ClientPrefs) {
        if let Err(err) = self.save(CLIENT_PREFS_KEY, prefs) {
            warn!(%err, "failed to save client prefs");
        }
    }

    fn load_or_init_prefs(&self) -> ClientPrefs {
        match self.load::<ClientPrefs>(CLIENT_PREFS_KEY) {
            Ok(Some(prefs)) => prefs,
            Ok(None) => {
                let prefs = ClientPrefs::default();
                self.save_prefs(&prefs);
                prefs
            }
            Err(err) => {
                warn!(%err, "client prefs unreadable; using defaults");
                ClientPrefs::default()
            }
        }
    }
}
