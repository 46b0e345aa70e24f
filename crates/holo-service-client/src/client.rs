// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Synchronous request/reply client for the display daemon.
//!
//! State machine: `Disconnected → Dialing → Ready`, back to `Disconnected`
//! on an explicit close or any transport failure that may have left part of a
//! frame on the wire. A reply timeout before any byte arrives leaves the
//! connection `Ready`. One request is in flight at a time; `show` is
//! fire-and-forget.

use std::path::PathBuf;
use std::time::Duration;

use holo_cbor::Value;
use holo_service_proto::report::{check_reply, reply_version};
use holo_service_proto::wire::{decode_body, encode_request_with, request_id};
use holo_service_proto::{
    BinPayload, Command, InfoReply, ProtocolError, ReportedDevice, ServiceVersion, ShowSettings,
    ShowSource,
};
use tracing::{debug, info, warn};

use crate::service::DisplayService;
use crate::transport::{Dialer, SocketDialer, Transport};

/// Connection state of a [`DisplayServiceClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport.
    Disconnected,
    /// Transport open, `init` not yet acknowledged.
    Dialing,
    /// Session initialized; requests may be sent.
    Ready,
}

/// Client for one display daemon.
pub struct DisplayServiceClient {
    dialer: Box<dyn Dialer>,
    app_id: String,
    transport: Option<Box<dyn Transport>>,
    state: ConnectionState,
    version: Option<ServiceVersion>,
    next_seq: u32,
}

impl std::fmt::Debug for DisplayServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayServiceClient")
            .field("endpoint", &self.dialer.endpoint())
            .field("app_id", &self.app_id)
            .field("state", &self.state)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl DisplayServiceClient {
    /// Client that dials through `dialer`; nothing is opened yet.
    pub fn new(dialer: impl Dialer + 'static, app_id: impl Into<String>) -> Self {
        Self {
            dialer: Box::new(dialer),
            app_id: app_id.into(),
            transport: None,
            state: ConnectionState::Disconnected,
            version: None,
            next_seq: 1,
        }
    }

    /// Client for the daemon socket at `path`.
    pub fn for_socket(path: impl Into<PathBuf>, timeout: Duration, app_id: impl Into<String>) -> Self {
        Self::new(SocketDialer::new(path, timeout), app_id)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Dial, send `init` and check the daemon version.
    pub fn connect(&mut self) -> Result<ServiceVersion, ProtocolError> {
        if self.state == ConnectionState::Ready {
            if let Some(v) = self.version {
                return Ok(v);
            }
        }
        self.close();
        self.state = ConnectionState::Dialing;
        let transport = match self.dialer.dial() {
            Ok(t) => t,
            Err(err) => {
                self.state = ConnectionState::Disconnected;
                return Err(err);
            }
        };
        self.transport = Some(transport);

        match self.init_session() {
            Ok(version) => {
                self.version = Some(version);
                self.state = ConnectionState::Ready;
                info!(endpoint = %self.dialer.endpoint(), %version, "display service connected");
                Ok(version)
            }
            Err(err) => {
                warn!(endpoint = %self.dialer.endpoint(), %err, "display service init failed");
                self.close();
                Err(err)
            }
        }
    }

    fn init_session(&mut self) -> Result<ServiceVersion, ProtocolError> {
        let reply = self
            .exchange(&Command::init(&self.app_id), &[] as &[u8])?
            .unwrap_or(Value::Null);
        let version = reply_version(&reply)?
            .ok_or_else(|| ProtocolError::DeserializeError("init reply without version".into()))?;
        if !version.is_supported() {
            return Err(ProtocolError::VersionMismatch(format!(
                "daemon {version} is older than {}.0",
                ServiceVersion::MIN_MAJOR
            )));
        }
        Ok(version)
    }

    /// Close the transport.
    pub fn disconnect(&mut self) {
        if self.transport.is_some() {
            info!(endpoint = %self.dialer.endpoint(), "display service disconnected");
        }
        self.close();
    }

    /// Daemon version from the last successful `connect`.
    pub fn version(&self) -> Option<ServiceVersion> {
        self.version
    }

    /// Query version and connected devices.
    pub fn info(&mut self) -> Result<InfoReply, ProtocolError> {
        let reply = self.request(&Command::info(), &[] as &[u8])?;
        let info = InfoReply::parse(&reply.unwrap_or(Value::Null))?;
        if let Some(v) = info.version {
            self.version = Some(v);
        }
        Ok(info)
    }

    /// Send a quilt to display `target`; returns once the write completes.
    pub fn show<B>(&mut self, target: u32, settings: ShowSettings, bin: &B) -> Result<(), ProtocolError>
    where
        B: BinPayload + ?Sized,
    {
        self.request(&Command::show_quilt(target, settings), bin)
            .map(|_| ())
    }

    /// Show cached or demo content on display `target`.
    pub fn show_source(&mut self, target: u32, source: ShowSource) -> Result<(), ProtocolError> {
        self.request(&Command::show_source(target, source), &[] as &[u8])
            .map(|_| ())
    }

    /// Clear display `target`.
    pub fn hide(&mut self, target: u32) -> Result<(), ProtocolError> {
        self.request(&Command::hide(target), &[] as &[u8]).map(|_| ())
    }

    fn request<B>(&mut self, command: &Command, bin: &B) -> Result<Option<Value>, ProtocolError>
    where
        B: BinPayload + ?Sized,
    {
        if self.state != ConnectionState::Ready {
            return Err(ProtocolError::NotReady);
        }
        self.exchange(command, bin)
    }

    /// Send one command and, unless it is one-way, wait for its reply.
    fn exchange<B>(&mut self, command: &Command, bin: &B) -> Result<Option<Value>, ProtocolError>
    where
        B: BinPayload + ?Sized,
    {
        let id = request_id(self.next_seq);
        self.next_seq = self.next_seq.wrapping_add(1) & 0x7fff_ffff;
        let frame = encode_request_with(id, command, bin)?;
        let Some(transport) = self.transport.as_mut() else {
            return Err(ProtocolError::NotReady);
        };
        if let Err(err) = transport.send(&frame) {
            // a failed write may have stopped mid-frame
            return Err(self.lose(err));
        }
        debug!(verb = command.verb(), id, bytes = frame.len(), "request sent");
        if !command.expects_reply() {
            return Ok(None);
        }
        loop {
            let body = match self.transport.as_mut().map(|t| t.recv()) {
                Some(Ok(body)) => body,
                Some(Err(ProtocolError::Timeout)) => return Err(ProtocolError::Timeout),
                Some(Err(err)) => return Err(self.lose(err)),
                None => return Err(ProtocolError::NotReady),
            };
            let (reply_id, reply) = decode_body(&body)?;
            if reply_id != id {
                warn!(expected = id, got = reply_id, "dropping stale reply");
                continue;
            }
            debug!(verb = command.verb(), id, "reply decoded");
            return check_reply(reply).map(Some);
        }
    }

    fn lose(&mut self, err: ProtocolError) -> ProtocolError {
        warn!(endpoint = %self.dialer.endpoint(), %err, "display service transport lost");
        self.close();
        err
    }

    fn close(&mut self) {
        self.transport = None;
        self.state = ConnectionState::Disconnected;
    }
}

impl DisplayService for DisplayServiceClient {
    fn kind(&self) -> &'static str {
        crate::HOLOPLAY_SERVICE
    }

    fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    fn connect(&mut self) -> Result<ServiceVersion, ProtocolError> {
        DisplayServiceClient::connect(self)
    }

    fn disconnect(&mut self) {
        DisplayServiceClient::disconnect(self);
    }

    fn version(&self) -> Option<ServiceVersion> {
        self.version
    }

    fn devices(&mut self) -> Result<Vec<ReportedDevice>, ProtocolError> {
        Ok(self.info()?.devices)
    }

    fn show(
        &mut self,
        target: u32,
        settings: ShowSettings,
        bin: &dyn BinPayload,
    ) -> Result<(), ProtocolError> {
        DisplayServiceClient::show(self, target, settings, bin)
    }

    fn show_source(&mut self, target: u32, source: ShowSource) -> Result<(), ProtocolError> {
        DisplayServiceClient::show_source(self, target, source)
    }

    fn hide(&mut self, target: u32) -> Result<(), ProtocolError> {
        DisplayServiceClient::hide(self, target)
    }
}
