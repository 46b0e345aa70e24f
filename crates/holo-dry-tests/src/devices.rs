// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Builders for `devices[]` entries of an `info` reply.

use holo_cbor::Value;

/// Builds one device entry the way the daemon reports it.
///
/// Calibration numbers use the `{value: x}` record shape.
#[derive(Debug, Clone)]
pub struct DeviceReportBuilder {
    index: u32,
    serial: String,
    hardware: String,
    state: String,
    screen: (u32, u32),
    dpi: f64,
    pitch: f64,
    slope: f64,
    center: f64,
    flip_subp: bool,
    flip_x: bool,
    quilt: Option<(u32, u32, u32, u32, f64)>,
}

impl DeviceReportBuilder {
    /// A portrait-class device with the given daemon index and serial.
    pub fn new(index: u32, serial: impl Into<String>) -> Self {
        Self {
            index,
            serial: serial.into(),
            hardware: "portrait".into(),
            state: "ok".into(),
            screen: (1536, 2048),
            dpi: 324.0,
            pitch: 52.0,
            slope: -7.0,
            center: 0.5,
            flip_subp: false,
            flip_x: false,
            quilt: Some((3360, 3360, 8, 6, 0.75)),
        }
    }

    /// Hardware class string.
    pub fn hardware(mut self, hardware: impl Into<String>) -> Self {
        self.hardware = hardware.into();
        self
    }

    /// Daemon index.
    pub fn index(mut self, index: u32) -> Self {
        self.index = index;
        self
    }

    /// Panel size in pixels.
    pub fn screen(mut self, width: u32, height: u32) -> Self {
        self.screen = (width, height);
        self
    }

    /// Calibration pitch, slope and DPI.
    pub fn optics(mut self, pitch: f64, slope: f64, dpi: f64) -> Self {
        self.pitch = pitch;
        self.slope = slope;
        self.dpi = dpi;
        self
    }

    /// BGR subpixel order.
    pub fn flip_subpixels(mut self) -> Self {
        self.flip_subp = true;
        self
    }

    /// Horizontally mirrored panel.
    pub fn flip_x(mut self) -> Self {
        self.flip_x = true;
        self
    }

    /// Omit `defaultQuilt`.
    pub fn without_default_quilt(mut self) -> Self {
        self.quilt = None;
        self
    }

    /// The `info` entry.
    pub fn build(&self) -> Value {
        let num = |x: f64| Value::map().with("value", x);
        let flag = |b: bool| num(if b { 1.0 } else { 0.0 });
        let calibration = Value::map()
            .with("serial", self.serial.as_str())
            .with("pitch", num(self.pitch))
            .with("slope", num(self.slope))
            .with("center", num(self.center))
            .with("fringe", num(0.0))
            .with("viewCone", num(40.0))
            .with("invView", num(1.0))
            .with("verticalAngle", num(0.0))
            .with("DPI", num(self.dpi))
            .with("screenW", num(f64::from(self.screen.0)))
            .with("screenH", num(f64::from(self.screen.1)))
            .with("flipImageX", flag(self.flip_x))
            .with("flipImageY", flag(false))
            .with("flipSubp", flag(self.flip_subp));
        let mut entry = Value::map()
            .with("index", self.index)
            .with("hwid", format!("LKG-{}", self.serial))
            .with("hardwareVersion", self.hardware.as_str())
            .with("state", self.state.as_str())
            .with("calibration", calibration)
            .with("windowCoords", vec![Value::from(1440), Value::from(0)]);
        if let Some((qx, qy, tx, ty, aspect)) = self.quilt {
            entry = entry.with(
                "defaultQuilt",
                Value::map()
                    .with("quiltAspect", aspect)
                    .with("quiltX", qx)
                    .with("quiltY", qy)
                    .with("tileX", tx)
                    .with("tileY", ty),
            );
        }
        entry
    }
}
