// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Client state machine against a scripted daemon on a real socket.

use std::time::Duration;

use holo_cbor::Value;
use holo_dry_tests::{DaemonScript, DeviceReportBuilder, FakeDaemon};
use holo_service_client::{
    ConnectionState, DisplayService, DisplayServiceClient, ServiceConfig, ServiceRegistry,
    HOLOPLAY_SERVICE,
};
use holo_service_proto::{ProtocolError, ShowSettings, ShowSource};

const SHORT: Duration = Duration::from_millis(300);

fn client_for(daemon: &FakeDaemon) -> DisplayServiceClient {
    DisplayServiceClient::for_socket(daemon.path(), SHORT, "holo-test")
}

fn settings() -> ShowSettings {
    ShowSettings {
        columns: 2,
        rows: 2,
        total_views: 4,
        aspect: 1.0,
        invert: false,
    }
}

#[test]
fn connect_sends_init_and_reads_version() {
    let daemon = FakeDaemon::start(DaemonScript::default().version("1.4.2")).unwrap();
    let mut client = client_for(&daemon);
    let version = client.connect().unwrap();
    assert_eq!((version.major, version.minor, version.patch), (1, 4, 2));
    assert_eq!(client.state(), ConnectionState::Ready);

    let init = &daemon.received()[0];
    let appid = init
        .get("cmd")
        .and_then(|c| c.get("init"))
        .and_then(|i| i.get("appid"))
        .and_then(Value::as_text);
    assert_eq!(appid, Some("holo-test"));
}

#[test]
fn info_lists_reported_devices() {
    let daemon = FakeDaemon::start(DaemonScript::default().devices(vec![
        DeviceReportBuilder::new(0, "A").build(),
        DeviceReportBuilder::new(1, "B").hardware("standard").build(),
    ]))
    .unwrap();
    let mut client = client_for(&daemon);
    client.connect().unwrap();
    let info = client.info().unwrap();
    assert_eq!(info.devices.len(), 2);
    assert_eq!(info.devices[1].serial(), "B");
    assert_eq!(info.devices[1].hardware_version, "standard");
    assert_eq!(daemon.verbs(), vec!["init", "info"]);
}

#[test]
fn missing_daemon_is_no_service() {
    let dir = tempfile_path();
    let mut client = DisplayServiceClient::for_socket(dir, SHORT, "holo");
    assert!(matches!(client.connect(), Err(ProtocolError::NoService)));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

fn tempfile_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("holo-absent-{}.ipc", std::process::id()))
}

#[test]
fn old_daemon_is_a_version_mismatch() {
    let daemon = FakeDaemon::start(DaemonScript::default().version("0.9.0")).unwrap();
    let mut client = client_for(&daemon);
    assert!(matches!(
        client.connect(),
        Err(ProtocolError::VersionMismatch(_))
    ));
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[test]
fn show_is_one_way() {
    let daemon = FakeDaemon::start(DaemonScript::default()).unwrap();
    let mut client = client_for(&daemon);
    client.connect().unwrap();
    let pixels = vec![7u8; 64];
    client.show(0, settings(), pixels.as_slice()).unwrap();
    client.hide(0).unwrap();

    let received = daemon.received();
    assert_eq!(daemon.verbs(), vec!["init", "show", "hide"]);
    let show = &received[1];
    assert_eq!(show.get("bin").and_then(Value::as_bytes), Some(&pixels[..]));
    let quilt_settings = show
        .get("cmd")
        .and_then(|c| c.get("show"))
        .and_then(|s| s.get("quilt"))
        .and_then(|q| q.get("settings"))
        .unwrap();
    assert_eq!(quilt_settings.get("vtotal").and_then(Value::as_integer), Some(4));
}

#[test]
fn stale_show_acks_are_skipped() {
    let daemon = FakeDaemon::start(DaemonScript::default().ack_shows()).unwrap();
    let mut client = client_for(&daemon);
    client.connect().unwrap();
    client.show_source(0, ShowSource::Demo).unwrap();
    client.show_source(0, ShowSource::Cache).unwrap();
    let info = client.info().unwrap();
    assert!(info.devices.is_empty());
    assert_eq!(client.state(), ConnectionState::Ready);
}

#[test]
fn timeout_leaves_the_connection_ready() {
    let daemon = FakeDaemon::start(DaemonScript::default().stall_on("info")).unwrap();
    let mut client = client_for(&daemon);
    client.connect().unwrap();
    let err = client.info().unwrap_err();
    assert!(matches!(err, ProtocolError::Timeout), "{err:?}");
    assert!(err.is_retryable());
    assert_eq!(client.state(), ConnectionState::Ready);
    client.hide(0).unwrap();
}

#[test]
fn reply_cut_off_mid_frame_drops_the_session() {
    let daemon = FakeDaemon::start(DaemonScript::default().truncate_on("info")).unwrap();
    let mut client = client_for(&daemon);
    client.connect().unwrap();
    let err = client.info().unwrap_err();
    assert!(err.is_disconnect(), "{err:?}");
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(matches!(client.hide(0), Err(ProtocolError::NotReady)));

    // the rest of that frame never reaches the next session
    daemon.update_script(|s| s.truncate_on.clear());
    client.connect().unwrap();
    assert!(client.info().unwrap().devices.is_empty());
    assert_eq!(daemon.connections(), 2);
}

#[test]
fn hang_up_moves_to_disconnected() {
    let daemon = FakeDaemon::start(DaemonScript::default().close_on("hide")).unwrap();
    let mut client = client_for(&daemon);
    client.connect().unwrap();
    let err = client.hide(0).unwrap_err();
    assert!(matches!(err, ProtocolError::BrokenPipe), "{err:?}");
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(matches!(client.hide(0), Err(ProtocolError::NotReady)));

    // A fresh dial recovers.
    daemon.update_script(|s| s.close_on = None);
    client.connect().unwrap();
    client.hide(0).unwrap();
    assert_eq!(daemon.connections(), 2);
}

#[test]
fn daemon_error_codes_are_typed() {
    let daemon = FakeDaemon::start(DaemonScript::default().error_on("hide", 9)).unwrap();
    let mut client = client_for(&daemon);
    client.connect().unwrap();
    assert!(matches!(client.hide(0), Err(ProtocolError::NotInitialized)));
    assert_eq!(client.state(), ConnectionState::Ready);
}

#[test]
fn registry_promotes_the_first_reachable_daemon() {
    let daemon = FakeDaemon::start(DaemonScript::default()).unwrap();
    let mut registry = ServiceRegistry::with_defaults();
    let absent = registry
        .add(
            HOLOPLAY_SERVICE,
            &ServiceConfig {
                endpoint: tempfile_path(),
                app_id: "holo".into(),
                timeout: SHORT,
            },
        )
        .unwrap();
    assert_eq!(registry.active(), Some(absent));
    assert!(!registry.get(absent).unwrap().is_ready());

    let live = registry
        .add(
            HOLOPLAY_SERVICE,
            &ServiceConfig {
                endpoint: daemon.path().to_path_buf(),
                app_id: "holo".into(),
                timeout: SHORT,
            },
        )
        .unwrap();
    assert_eq!(registry.active(), Some(live));
    let active = registry.active_service_mut().unwrap();
    assert!(active.is_ready());
    assert!(active.devices().unwrap().is_empty());
}

#[test]
fn second_live_daemon_is_added_disconnected() {
    let first = FakeDaemon::start(DaemonScript::default()).unwrap();
    let second = FakeDaemon::start(DaemonScript::default()).unwrap();
    let mut registry = ServiceRegistry::with_defaults();
    let config = |daemon: &FakeDaemon| ServiceConfig {
        endpoint: daemon.path().to_path_buf(),
        app_id: "holo".into(),
        timeout: SHORT,
    };
    let a = registry.add(HOLOPLAY_SERVICE, &config(&first)).unwrap();
    let b = registry.add(HOLOPLAY_SERVICE, &config(&second)).unwrap();

    assert_eq!(registry.active(), Some(a));
    assert_eq!(registry.ready_id(), Some(a));
    assert!(!registry.get(b).unwrap().is_ready());
    assert_eq!(second.verbs(), vec!["init"]);
}
