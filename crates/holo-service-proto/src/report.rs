// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reply parsing: error codes, `info` results and device reports.
//!
//! Calibration fields arrive either as bare numbers or as `{value: x}`
//! records, and nested records may be JSON-encoded strings; both shapes are
//! accepted.

use holo_cbor::Value;
use serde::{Deserialize, Serialize};

use crate::{ProtocolError, ServiceVersion};

/// Fail with the mapped error when a reply carries a nonzero `error` field.
pub fn check_reply(reply: Value) -> Result<Value, ProtocolError> {
    let code = reply.get("error").and_then(Value::as_integer).unwrap_or(0);
    let code = u32::try_from(code).unwrap_or(u32::MAX);
    match ProtocolError::from_code(code) {
        Some(err) => Err(err),
        None => Ok(reply),
    }
}

/// Read the `version` field of an `init` or `info` reply.
pub fn reply_version(reply: &Value) -> Result<Option<ServiceVersion>, ProtocolError> {
    reply
        .get("version")
        .and_then(Value::as_text)
        .map(str::parse::<ServiceVersion>)
        .transpose()
}

/// Raw calibration record as the display firmware reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCalibration {
    /// Serial number burned into the calibration, if present.
    pub serial: Option<String>,
    /// Lenticular pitch in lenses per inch.
    pub pitch: f64,
    /// Lenticular slope.
    pub slope: f64,
    /// Horizontal lens offset.
    pub center: f64,
    /// Fringe correction.
    pub fringe: f64,
    /// View cone in degrees.
    pub view_cone: f64,
    /// Nonzero when views run right-to-left.
    pub inv_view: f64,
    /// Vertical viewing angle.
    pub vertical_angle: f64,
    /// Panel dots per inch.
    pub dpi: f64,
    /// Panel width in pixels.
    pub screen_w: f64,
    /// Panel height in pixels.
    pub screen_h: f64,
    /// Nonzero when the image is mirrored horizontally.
    pub flip_image_x: f64,
    /// Nonzero when the image is mirrored vertically.
    pub flip_image_y: f64,
    /// Nonzero when subpixels run BGR.
    pub flip_subp: f64,
}

impl RawCalibration {
    fn parse(v: &Value) -> Self {
        let num = |key: &str| v.get(key).and_then(number).unwrap_or(0.0);
        Self {
            serial: v.get("serial").and_then(Value::as_text).map(str::to_owned),
            pitch: num("pitch"),
            slope: num("slope"),
            center: num("center"),
            fringe: num("fringe"),
            view_cone: num("viewCone"),
            inv_view: num("invView"),
            vertical_angle: num("verticalAngle"),
            dpi: num("DPI"),
            screen_w: num("screenW"),
            screen_h: num("screenH"),
            flip_image_x: num("flipImageX"),
            flip_image_y: num("flipImageY"),
            flip_subp: num("flipSubp"),
        }
    }
}

/// Quilt geometry the device prefers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefaultQuilt {
    /// Aspect ratio of one view.
    pub quilt_aspect: f64,
    /// Quilt width in pixels.
    pub quilt_x: u32,
    /// Quilt height in pixels.
    pub quilt_y: u32,
    /// Views per row.
    pub tile_x: u32,
    /// Rows of views.
    pub tile_y: u32,
}

impl DefaultQuilt {
    fn parse(v: &Value) -> Option<Self> {
        let int = |key: &str| {
            v.get(key)
                .and_then(number)
                .and_then(|n| (n >= 0.0).then_some(n.round() as u32))
        };
        Some(Self {
            quilt_aspect: v.get("quiltAspect").and_then(number)?,
            quilt_x: int("quiltX")?,
            quilt_y: int("quiltY")?,
            tile_x: int("tileX")?,
            tile_y: int("tileY")?,
        })
    }
}

/// One device entry from an `info` reply.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportedDevice {
    /// Server-assigned index used as `targetDisplay`.
    pub index: u32,
    /// USB hardware id string.
    pub hwid: String,
    /// Hardware class name (e.g. `portrait`).
    pub hardware_version: String,
    /// Daemon-reported state (e.g. `ok`).
    pub state: String,
    /// Calibration, when the device reported one.
    pub calibration: Option<RawCalibration>,
    /// Preferred quilt geometry.
    pub default_quilt: Option<DefaultQuilt>,
    /// Window origin `(x, y)` on the desktop.
    pub window_coords: Option<(i32, i32)>,
}

impl ReportedDevice {
    /// Stable identity used to match reports across refreshes.
    ///
    /// The calibration serial when present, else the hardware id.
    pub fn serial(&self) -> &str {
        self.calibration
            .as_ref()
            .and_then(|c| c.serial.as_deref())
            .unwrap_or(&self.hwid)
    }

    /// Parse one `devices[]` entry.
    pub fn parse(v: &Value) -> Result<Self, ProtocolError> {
        let index = v
            .get("index")
            .and_then(Value::as_integer)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| ProtocolError::DeserializeError("device entry without index".into()))?;
        let text = |key: &str| {
            v.get(key)
                .and_then(Value::as_text)
                .unwrap_or_default()
                .to_owned()
        };
        let calibration = v
            .get("calibration")
            .and_then(nested)
            .map(|c| RawCalibration::parse(&c));
        let default_quilt = v
            .get("defaultQuilt")
            .and_then(nested)
            .and_then(|q| DefaultQuilt::parse(&q));
        let window_coords = v.get("windowCoords").and_then(Value::as_array).and_then(|xy| {
            let coord = |i: usize| {
                xy.get(i)
                    .and_then(Value::as_integer)
                    .and_then(|n| i32::try_from(n).ok())
            };
            Some((coord(0)?, coord(1)?))
        });
        Ok(Self {
            index,
            hwid: text("hwid"),
            hardware_version: text("hardwareVersion"),
            state: text("state"),
            calibration,
            default_quilt,
            window_coords,
        })
    }
}

/// Parsed `info` reply.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoReply {
    /// Daemon version, when reported.
    pub version: Option<ServiceVersion>,
    /// Connected devices in report order.
    pub devices: Vec<ReportedDevice>,
}

impl InfoReply {
    /// Parse an already-checked `info` reply.
    pub fn parse(reply: &Value) -> Result<Self, ProtocolError> {
        let devices = match reply.get("devices") {
            None => Vec::new(),
            Some(d) if d.is_null() => Vec::new(),
            Some(d) => d
                .as_array()
                .ok_or_else(|| ProtocolError::DeserializeError("devices is not an array".into()))?
                .iter()
                .map(ReportedDevice::parse)
                .collect::<Result<_, _>>()?,
        };
        Ok(Self {
            version: reply_version(reply)?,
            devices,
        })
    }
}

/// A number, or a `{value: number}` record.
fn number(v: &Value) -> Option<f64> {
    v.as_f64().or_else(|| v.get("value").and_then(Value::as_f64))
}

/// A nested record given inline or as a JSON-encoded string.
fn nested(v: &Value) -> Option<Value> {
    match v {
        Value::Map(_) => Some(v.clone()),
        Value::Text(s) => serde_json::from_str::<serde_json::Value>(s)
            .ok()
            .map(from_json),
        _ => None,
    }
}

fn from_json(j: serde_json::Value) -> Value {
    use serde_json::Value as Json;
    match j {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i128::from(i)),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::Text(s),
        Json::Array(items) => Value::Array(items.into_iter().map(from_json).collect()),
        Json::Object(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| (Value::Text(k), from_json(v)))
                .collect(),
        ),
    }
}
