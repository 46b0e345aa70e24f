// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Request builders.
//!
//! A command is encoded as `{cmd: {<verb>: fields}, bin: <bytes>}`. The `bin`
//! entry is written last by a [`BinPayload`] so a multi-megabyte quilt can be
//! streamed straight into the output buffer.

use holo_cbor::{encode_into, encode_map_header, CodecError, Value};

/// Writer for the out-of-band `bin` entry of a command.
pub trait BinPayload {
    /// Append one CBOR byte string to `out`.
    fn write_bin(&self, out: &mut Vec<u8>) -> Result<(), CodecError>;

    /// Rough encoded size, used to size the output buffer once.
    fn size_hint(&self) -> usize {
        0
    }
}

impl BinPayload for [u8] {
    fn write_bin(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        encode_into(&Value::Bytes(self.to_vec()), out)
    }

    fn size_hint(&self) -> usize {
        self.len() + 9
    }
}

/// Where `show` takes its pixels from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowSource {
    /// Pixels follow in the `bin` entry.
    BinData,
    /// The last quilt the daemon cached.
    Cache,
    /// The daemon's built-in demo content.
    Demo,
}

impl ShowSource {
    /// Wire name of the source.
    pub fn as_str(self) -> &'static str {
        match self {
            ShowSource::BinData => "bindata",
            ShowSource::Cache => "cache",
            ShowSource::Demo => "demo",
        }
    }
}

/// Quilt layout sent with a `show`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShowSettings {
    /// Views per quilt row (`vx`).
    pub columns: u32,
    /// Quilt rows (`vy`).
    pub rows: u32,
    /// `columns * rows` (`vtotal`).
    pub total_views: u32,
    /// Aspect ratio of one view.
    pub aspect: f32,
    /// Render the lightfield inverted.
    pub invert: bool,
}

impl ShowSettings {
    fn to_value(self) -> Value {
        Value::map()
            .with("vx", self.columns)
            .with("vy", self.rows)
            .with("vtotal", self.total_views)
            .with("aspect", self.aspect)
            .with("invert", self.invert)
    }
}

/// One request to the daemon.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    verb: &'static str,
    fields: Value,
}

impl Command {
    /// Open a session; the reply carries the daemon `version`.
    pub fn init(app_id: &str) -> Self {
        Self::new("init", Value::map().with("appid", app_id))
    }

    /// Ask for `version` and the connected `devices`.
    pub fn info() -> Self {
        Self::new("info", Value::map())
    }

    /// Show the quilt carried in `bin` on display `target`.
    pub fn show_quilt(target: u32, settings: ShowSettings) -> Self {
        let quilt = Value::map()
            .with("type", "image")
            .with("settings", settings.to_value());
        Self::new(
            "show",
            Value::map()
                .with("targetDisplay", target)
                .with("source", ShowSource::BinData.as_str())
                .with("quilt", quilt),
        )
    }

    /// Show cached or demo content on display `target`.
    pub fn show_source(target: u32, source: ShowSource) -> Self {
        Self::new(
            "show",
            Value::map()
                .with("targetDisplay", target)
                .with("source", source.as_str()),
        )
    }

    /// Clear display `target`.
    pub fn hide(target: u32) -> Self {
        Self::new("hide", Value::map().with("targetDisplay", target))
    }

    fn new(verb: &'static str, fields: Value) -> Self {
        Self { verb, fields }
    }

    /// Verb name (`init`, `info`, `show`, `hide`).
    pub fn verb(&self) -> &'static str {
        self.verb
    }

    /// Verb-specific fields.
    pub fn fields(&self) -> &Value {
        &self.fields
    }

    /// `show` is one-way; every other verb gets exactly one reply.
    pub fn expects_reply(&self) -> bool {
        self.verb != "show"
    }

    /// The `cmd` entry as a value.
    pub fn cmd_value(&self) -> Value {
        Value::map().with(self.verb, self.fields.clone())
    }

    /// Append the full command with an empty `bin`.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        self.encode_with(&[] as &[u8], out)
    }

    /// Append the full command, letting `bin` write the payload entry.
    pub fn encode_with<B>(&self, bin: &B, out: &mut Vec<u8>) -> Result<(), CodecError>
    where
        B: BinPayload + ?Sized,
    {
        out.reserve(64 + bin.size_hint());
        encode_map_header(2, out);
        encode_into(&Value::from("cmd"), out)?;
        encode_into(&self.cmd_value(), out)?;
        encode_into(&Value::from("bin"), out)?;
        bin.write_bin(out)
    }

    /// Encode into a fresh buffer with an empty `bin`.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        self.encode_into(&mut out)?;
        Ok(out)
    }
}
