// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hardware classes and the static records used to emulate them offline.

use std::fmt;
use std::str::FromStr;

use holo_service_proto::{DefaultQuilt, RawCalibration};
use serde::{Deserialize, Serialize};

use crate::RegistryError;

/// Supported display hardware classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareType {
    /// 7.9" portrait display.
    Portrait,
    /// 8.9" standard display.
    Standard,
    /// 15.6" large display.
    Large,
    /// 15.6" pro display.
    Pro,
    /// 32" 8K display.
    #[serde(rename = "8k")]
    EightK,
    /// 6" Go display.
    Go,
}

struct Template {
    screen_w: f64,
    screen_h: f64,
    dpi: f64,
    pitch: f64,
    slope: f64,
    center: f64,
    view_cone: f64,
    quilt: (u32, u32, u32, u32),
}

impl HardwareType {
    /// Every class, in listing order.
    pub const ALL: [HardwareType; 6] = [
        HardwareType::Portrait,
        HardwareType::Standard,
        HardwareType::Large,
        HardwareType::Pro,
        HardwareType::EightK,
        HardwareType::Go,
    ];

    /// Tag used in configs and device reports.
    pub fn as_str(self) -> &'static str {
        match self {
            HardwareType::Portrait => "portrait",
            HardwareType::Standard => "standard",
            HardwareType::Large => "large",
            HardwareType::Pro => "pro",
            HardwareType::EightK => "8k",
            HardwareType::Go => "go",
        }
    }

    fn template(self) -> Template {
        match self {
            HardwareType::Portrait => Template {
                screen_w: 1536.0,
                screen_h: 2048.0,
                dpi: 324.0,
                pitch: 52.0,
                slope: -7.0,
                center: 0.5,
                view_cone: 40.0,
                quilt: (3360, 3360, 8, 6),
            },
            HardwareType::Standard => Template {
                screen_w: 2560.0,
                screen_h: 1600.0,
                dpi: 338.0,
                pitch: 50.0,
                slope: 5.0,
                center: 0.0,
                view_cone: 40.0,
                quilt: (4096, 4096, 5, 9),
            },
            HardwareType::Large | HardwareType::Pro => Template {
                screen_w: 3840.0,
                screen_h: 2160.0,
                dpi: 283.0,
                pitch: 53.0,
                slope: -7.0,
                center: 0.0,
                view_cone: 40.0,
                quilt: (4096, 4096, 5, 9),
            },
            HardwareType::EightK => Template {
                screen_w: 7680.0,
                screen_h: 4320.0,
                dpi: 280.0,
                pitch: 50.0,
                slope: -8.0,
                center: 0.0,
                view_cone: 40.0,
                quilt: (8192, 8192, 5, 9),
            },
            HardwareType::Go => Template {
                screen_w: 1440.0,
                screen_h: 2560.0,
                dpi: 491.0,
                pitch: 80.0,
                slope: 7.0,
                center: 0.0,
                view_cone: 54.0,
                quilt: (4092, 4092, 11, 6),
            },
        }
    }

    /// Raw calibration an emulated device of this class reports.
    pub fn calibration(self) -> RawCalibration {
        let t = self.template();
        RawCalibration {
            serial: None,
            pitch: t.pitch,
            slope: t.slope,
            center: t.center,
            fringe: 0.0,
            view_cone: t.view_cone,
            inv_view: 1.0,
            vertical_angle: 0.0,
            dpi: t.dpi,
            screen_w: t.screen_w,
            screen_h: t.screen_h,
            flip_image_x: 0.0,
            flip_image_y: 0.0,
            flip_subp: 0.0,
        }
    }

    /// Quilt geometry this class prefers.
    pub fn default_quilt(self) -> DefaultQuilt {
        let t = self.template();
        let (quilt_x, quilt_y, tile_x, tile_y) = t.quilt;
        DefaultQuilt {
            quilt_aspect: t.screen_w / t.screen_h,
            quilt_x,
            quilt_y,
            tile_x,
            tile_y,
        }
    }
}

impl fmt::Display for HardwareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HardwareType {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        HardwareType::ALL
            .into_iter()
            .find(|h| h.as_str() == tag)
            .ok_or_else(|| RegistryError::UnknownHardwareType(s.to_owned()))
    }
}
