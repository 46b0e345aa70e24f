// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for holo tools (config, client prefs).
//! Keeps CLI and host adapters thin.

pub mod config;
pub mod config_port;
pub mod prefs;
