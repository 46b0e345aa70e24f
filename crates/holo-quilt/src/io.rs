// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Still-image files for views and quilts.
//!
//! Decoding keeps alpha when the file has it (RGBA8) and otherwise reads RGB8.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GrayAlphaImage, GrayImage, ImageOutputFormat, RgbImage, RgbaImage};
use tracing::debug;

use crate::view::{Pixels, ViewImage};
use crate::{FormatError, Result};

impl ViewImage {
    /// Decode an image file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path)?;
        let view = from_dynamic(img);
        debug!(
            path = %path.display(),
            width = view.width,
            height = view.height,
            channels = view.channels,
            "image loaded"
        );
        Ok(view)
    }

    /// Encode to disk; the container follows the file extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        to_dynamic(self)?.save(path)?;
        debug!(path = %path.display(), "image saved");
        Ok(())
    }

    /// Encode as an in-memory PNG.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        to_dynamic(self)?.write_to(&mut cursor, ImageOutputFormat::Png)?;
        Ok(cursor.into_inner())
    }
}

fn from_dynamic(img: DynamicImage) -> ViewImage {
    let (width, height) = (img.width() as usize, img.height() as usize);
    if img.color().has_alpha() {
        ViewImage {
            width,
            height,
            channels: 4,
            pixels: Pixels::U8(img.to_rgba8().into_raw()),
        }
    } else {
        ViewImage {
            width,
            height,
            channels: 3,
            pixels: Pixels::U8(img.to_rgb8().into_raw()),
        }
    }
}

fn to_dynamic(view: &ViewImage) -> Result<DynamicImage> {
    let too_large = || FormatError::ViewFormatMismatch {
        index: 0,
        reason: format!("{}x{} exceeds image size limits", view.width, view.height),
    };
    let w = u32::try_from(view.width).map_err(|_| too_large())?;
    let h = u32::try_from(view.height).map_err(|_| too_large())?;
    let raw = view.to_u8();
    let short = || FormatError::ViewFormatMismatch {
        index: 0,
        reason: "pixel buffer shorter than image".into(),
    };
    let img = match view.channels {
        1 => DynamicImage::ImageLuma8(GrayImage::from_raw(w, h, raw).ok_or_else(short)?),
        2 => DynamicImage::ImageLumaA8(GrayAlphaImage::from_raw(w, h, raw).ok_or_else(short)?),
        3 => DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, raw).ok_or_else(short)?),
        4 => DynamicImage::ImageRgba8(RgbaImage::from_raw(w, h, raw).ok_or_else(short)?),
        c => {
            return Err(FormatError::ViewFormatMismatch {
                index: 0,
                reason: format!("{c} channels cannot be written as an image"),
            })
        }
    };
    Ok(img)
}
