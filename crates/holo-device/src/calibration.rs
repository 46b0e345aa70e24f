// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lenticular calibration as consumed by the interleaving shader.
//!
//! Derived once per refresh from the raw firmware record:
//!
//! * `pitch = raw_pitch * (screen_w / dpi) * cos(atan(1 / slope))`
//! * `tilt  = screen_h / (screen_w * slope)`, negated when the panel is
//!   mirrored horizontally
//! * `subp  = pitch / (3 * screen_w)`
//! * `(ri, bi) = (2, 0)` for BGR panels, `(0, 2)` otherwise
//!
//! These are exact relations; the shader depends on the precise values.

use holo_service_proto::RawCalibration;
use serde::{Deserialize, Serialize};

/// Calibration ready for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Calibration {
    /// Lens pitch in panel pixels along the lens slope.
    pub pitch: f64,
    /// Lens tilt.
    pub tilt: f64,
    /// Horizontal lens offset.
    pub center: f64,
    /// Subpixel pitch.
    pub subp: f64,
    /// Fringe correction.
    pub fringe: f64,
    /// Red channel index in the subpixel triple.
    pub ri: u8,
    /// Blue channel index in the subpixel triple.
    pub bi: u8,
    /// Views run right-to-left.
    pub invert: bool,
    /// View cone in degrees.
    pub view_cone: f64,
    /// Vertical viewing angle.
    pub vertical_angle: f64,
    /// Panel width / height.
    pub aspect: f64,
    /// Panel width in pixels.
    pub screen_width: u32,
    /// Panel height in pixels.
    pub screen_height: u32,
    /// Panel dots per inch.
    pub dpi: f64,
}

impl Calibration {
    /// Apply the fixed derivations to a raw record.
    pub fn derive(raw: &RawCalibration) -> Self {
        let pitch = raw.pitch * (raw.screen_w / raw.dpi) * (1.0 / raw.slope).atan().cos();
        let mut tilt = raw.screen_h / (raw.screen_w * raw.slope);
        if raw.flip_image_x != 0.0 {
            tilt = -tilt;
        }
        let subp = pitch / (3.0 * raw.screen_w);
        let (ri, bi) = if raw.flip_subp != 0.0 { (2, 0) } else { (0, 2) };
        Self {
            pitch,
            tilt,
            center: raw.center,
            subp,
            fringe: raw.fringe,
            ri,
            bi,
            invert: raw.inv_view != 0.0,
            view_cone: raw.view_cone,
            vertical_angle: raw.vertical_angle,
            aspect: raw.screen_w / raw.screen_h,
            screen_width: raw.screen_w.max(0.0).round() as u32,
            screen_height: raw.screen_h.max(0.0).round() as u32,
            dpi: raw.dpi,
        }
    }

    /// View cone in radians.
    pub fn view_cone_radians(&self) -> f64 {
        self.view_cone.to_radians()
    }
}
