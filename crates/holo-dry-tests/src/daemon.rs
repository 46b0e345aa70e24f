// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scripted display daemon for client, device and CLI tests.
//!
//! Binds a Unix socket in a temporary directory and answers as the SP replier.
//! Connections are served one at a time on a background thread; every decoded
//! request is recorded for later inspection.

use std::collections::HashMap;
use std::io::Write;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use holo_cbor::Value;
use holo_service_proto::wire::{
    decode_body, encode_reply, exchange_handshake, read_message_within, MAX_REQUEST, PROTO_REP,
    PROTO_REQ,
};
use holo_service_proto::ProtocolError;
use tempfile::TempDir;

/// A connection idle this long is dropped so the daemon can shut down.
const IDLE_LIMIT: Duration = Duration::from_secs(10);

/// How the fake daemon answers.
#[derive(Debug, Clone)]
pub struct DaemonScript {
    /// Version string sent with `init` and `info` replies.
    pub version: String,
    /// `devices[]` entries of the `info` reply.
    pub devices: Vec<Value>,
    /// Nonzero `error` codes returned for a verb.
    pub errors: HashMap<String, u32>,
    /// Verbs that are read but never answered.
    pub stall_on: Vec<String>,
    /// Verbs answered with only the first half of the reply frame.
    pub truncate_on: Vec<String>,
    /// Verb on which the daemon hangs up instead of answering.
    pub close_on: Option<String>,
    /// Reply to `show` even though clients never wait for it.
    pub ack_shows: bool,
}

impl Default for DaemonScript {
    fn default() -> Self {
        Self {
            version: "1.2.0".into(),
            devices: Vec::new(),
            errors: HashMap::new(),
            stall_on: Vec::new(),
            truncate_on: Vec::new(),
            close_on: None,
            ack_shows: false,
        }
    }
}

impl DaemonScript {
    /// Report `version` from `init`/`info`.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Report these `info` device entries.
    pub fn devices(mut self, devices: Vec<Value>) -> Self {
        self.devices = devices;
        self
    }

    /// Answer `verb` with error `code`.
    pub fn error_on(mut self, verb: impl Into<String>, code: u32) -> Self {
        self.errors.insert(verb.into(), code);
        self
    }

    /// Never answer `verb`.
    pub fn stall_on(mut self, verb: impl Into<String>) -> Self {
        self.stall_on.push(verb.into());
        self
    }

    /// Write half of the reply to `verb`, then go quiet.
    pub fn truncate_on(mut self, verb: impl Into<String>) -> Self {
        self.truncate_on.push(verb.into());
        self
    }

    /// Hang up when `verb` arrives.
    pub fn close_on(mut self, verb: impl Into<String>) -> Self {
        self.close_on = Some(verb.into());
        self
    }

    /// Send an (unexpected) reply to every `show`.
    pub fn ack_shows(mut self) -> Self {
        self.ack_shows = true;
        self
    }

    fn reply_for(&self, verb: &str) -> Option<Value> {
        if self.stall_on.iter().any(|v| v == verb) || (verb == "show" && !self.ack_shows) {
            return None;
        }
        if let Some(code) = self.errors.get(verb) {
            return Some(Value::map().with("error", *code));
        }
        let reply = Value::map().with("error", 0);
        Some(match verb {
            "init" => reply.with("version", self.version.as_str()),
            "info" => reply
                .with("version", self.version.as_str())
                .with("devices", self.devices.clone()),
            _ => reply,
        })
    }
}

#[derive(Default)]
struct Shared {
    script: Mutex<DaemonScript>,
    received: Mutex<Vec<Value>>,
    connections: Mutex<usize>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// A running fake daemon; stops when dropped.
pub struct FakeDaemon {
    _dir: TempDir,
    path: PathBuf,
    shared: Arc<Shared>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for FakeDaemon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeDaemon").field("path", &self.path).finish()
    }
}

impl FakeDaemon {
    /// Bind a fresh socket and start serving `script`.
    pub fn start(script: DaemonScript) -> std::io::Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("holoplay-driver.ipc");
        let listener = UnixListener::bind(&path)?;
        let shared = Arc::new(Shared {
            script: Mutex::new(script),
            ..Shared::default()
        });
        let stop = Arc::new(AtomicBool::new(false));
        let worker = {
            let shared = Arc::clone(&shared);
            let stop = Arc::clone(&stop);
            std::thread::spawn(move || accept_loop(&listener, &shared, &stop))
        };
        Ok(Self {
            _dir: dir,
            path,
            shared,
            stop,
            worker: Some(worker),
        })
    }

    /// Socket path clients should dial.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the `info` device list (e.g. to simulate a hot-plug).
    pub fn set_devices(&self, devices: Vec<Value>) {
        lock(&self.shared.script).devices = devices;
    }

    /// Edit the script in place.
    pub fn update_script(&self, edit: impl FnOnce(&mut DaemonScript)) {
        edit(&mut lock(&self.shared.script));
    }

    /// Every request payload received so far, in arrival order.
    pub fn received(&self) -> Vec<Value> {
        lock(&self.shared.received).clone()
    }

    /// Verbs of the received requests.
    pub fn verbs(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter_map(|r| verb_of(r).map(str::to_owned))
            .collect()
    }

    /// Connections accepted so far.
    pub fn connections(&self) -> usize {
        *lock(&self.shared.connections)
    }
}

impl Drop for FakeDaemon {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        // Wake the blocking accept.
        let _ = UnixStream::connect(&self.path);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn accept_loop(listener: &UnixListener, shared: &Shared, stop: &AtomicBool) {
    for stream in listener.incoming() {
        if stop.load(Ordering::SeqCst) {
            return;
        }
        let Ok(stream) = stream else { continue };
        *lock(&shared.connections) += 1;
        // A client hanging up mid-conversation just ends that connection.
        let _ = serve(stream, shared, stop);
    }
}

fn serve(mut stream: UnixStream, shared: &Shared, stop: &AtomicBool) -> Result<(), ProtocolError> {
    stream.set_read_timeout(Some(IDLE_LIMIT))?;
    exchange_handshake(&mut stream, PROTO_REP, PROTO_REQ)?;
    while !stop.load(Ordering::SeqCst) {
        let body = read_message_within(&mut stream, MAX_REQUEST)?;
        let (id, request) = decode_body(&body)?;
        let verb = verb_of(&request).unwrap_or_default().to_owned();
        lock(&shared.received).push(request);

        let script = lock(&shared.script).clone();
        if script.close_on.as_deref() == Some(verb.as_str()) {
            return Ok(());
        }
        if let Some(reply) = script.reply_for(&verb) {
            let frame = encode_reply(id, &reply)?;
            let end = if script.truncate_on.contains(&verb) {
                frame.len() / 2
            } else {
                frame.len()
            };
            stream.write_all(&frame[..end])?;
            stream.flush()?;
        }
    }
    Ok(())
}

/// The single key under `cmd`.
pub fn verb_of(request: &Value) -> Option<&str> {
    request
        .get("cmd")
        .and_then(Value::as_map)
        .and_then(|entries| entries.first())
        .and_then(|(k, _)| k.as_text())
}
