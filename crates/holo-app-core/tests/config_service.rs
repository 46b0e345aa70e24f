// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::unwrap_used, clippy::expect_used)]
//! ConfigService and client prefs against the in-memory store.

use holo_app_core::config::{ConfigError, ConfigService, ConfigStore};
use holo_app_core::config_port::PrefsPort;
use holo_app_core::prefs::{ClientPrefs, CLIENT_PREFS_KEY};
use holo_dry_tests::InMemoryConfigStore;
use holo_quilt::{QuiltFormat, QuiltFormatRegistry};
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Sample {
    socket: String,
    retries: u32,
}

#[test]
fn save_then_load() {
    let service = ConfigService::new(InMemoryConfigStore::new());
    let value = Sample {
        socket: "/tmp/x.ipc".into(),
        retries: 2,
    };
    service.save("sample", &value).unwrap();
    assert_eq!(service.load::<Sample>("sample").unwrap(), Some(value));
}

#[test]
fn missing_and_empty_are_none() {
    let store = InMemoryConfigStore::new();
    store.save_raw("empty", b"").unwrap();
    let service = ConfigService::new(store);
    assert!(service.load::<Sample>("absent").unwrap().is_none());
    assert!(service.load::<Sample>("empty").unwrap().is_none());
}

#[test]
fn garbage_is_a_serde_error() {
    let store = InMemoryConfigStore::new();
    store.save_raw("bad", b"{not json").unwrap();
    let service = ConfigService::new(store);
    assert!(matches!(
        service.load::<Sample>("bad"),
        Err(ConfigError::Serde(_))
    ));
}

#[test]
fn first_load_persists_defaults_once() {
    let store = InMemoryConfigStore::new();
    let service = ConfigService::new(store.clone());
    let prefs = service.load_or_init_prefs();
    assert_eq!(prefs, ClientPrefs::default());
    assert!(store.contains_key(CLIENT_PREFS_KEY));
    assert_eq!(store.save_count(), 1);

    let again = service.load_or_init_prefs();
    assert_eq!(again, prefs);
    assert_eq!(store.save_count(), 1);
}

#[test]
fn unreadable_store_falls_back_to_defaults_without_saving() {
    let store = InMemoryConfigStore::new();
    store.set_fail_on_load(true);
    let service = ConfigService::new(store.clone());
    assert_eq!(service.load_or_init_prefs(), ClientPrefs::default());
    assert_eq!(store.save_count(), 0);
}

#[test]
fn corrupt_prefs_fall_back_to_defaults() {
    let store = InMemoryConfigStore::new();
    store.save_raw(CLIENT_PREFS_KEY, br#""nope""#).unwrap();
    let service = ConfigService::new(store);
    assert!(service.load_prefs().is_none());
    assert_eq!(service.load_or_init_prefs(), ClientPrefs::default());
}

#[test]
fn presets_survive_a_save_and_load_into_the_registry() {
    let service = ConfigService::new(InMemoryConfigStore::new());
    let mut prefs = ClientPrefs::default();
    prefs.presets.push(QuiltFormat::from_grid("Wide 3x3", 1536, 1536, 3, 3));
    let mut broken = QuiltFormat::from_grid("Broken", 100, 100, 4, 4);
    broken.total_views = 3;
    prefs.presets.push(broken);
    prefs.emulated = vec!["portrait".into()];
    service.save_prefs(&prefs);

    let loaded = service.load_prefs().unwrap();
    assert_eq!(loaded.presets.len(), 2);
    let mut registry = QuiltFormatRegistry::with_builtins();
    let ids = loaded.apply_presets(&mut registry);
    assert_eq!(ids.len(), 1, "invalid preset is skipped");
    assert_eq!(registry.get(ids[0]).unwrap().description, "Wide 3x3");
}

#[test]
fn partial_prefs_fill_in_defaults() {
    let store = InMemoryConfigStore::new();
    store
        .save_raw(CLIENT_PREFS_KEY, br#"{"app_id":"viewer"}"#)
        .unwrap();
    let service = ConfigService::new(store);
    let prefs = service.load_prefs().unwrap();
    assert_eq!(prefs.app_id, "viewer");
    assert_eq!(prefs.timeout_ms, 5000);
    assert!(prefs.endpoint.is_none());
    assert!(prefs.presets.is_empty());
}
