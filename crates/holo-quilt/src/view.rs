// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Dense pixel containers for views and quilts.

use holo_cbor::{RowOrder, Shape};
use serde::{Deserialize, Serialize};

use crate::{FormatError, Result};

/// Channel layout of a pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorMode {
    /// Single luminance channel.
    Gray,
    /// Luminance + alpha.
    GrayAlpha,
    /// Red, green, blue.
    Rgb,
    /// Red, green, blue, alpha.
    Rgba,
}

impl ColorMode {
    /// Samples per pixel.
    pub fn channels(self) -> usize {
        match self {
            ColorMode::Gray => 1,
            ColorMode::GrayAlpha => 2,
            ColorMode::Rgb => 3,
            ColorMode::Rgba => 4,
        }
    }

    /// Color mode for a channel count, if one exists.
    pub fn from_channels(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(ColorMode::Gray),
            2 => Some(ColorMode::GrayAlpha),
            3 => Some(ColorMode::Rgb),
            4 => Some(ColorMode::Rgba),
            _ => None,
        }
    }
}

/// Storage type of one channel sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleType {
    /// 8-bit unsigned.
    U8,
    /// 32-bit float in `0.0..=1.0`.
    F32,
}

/// Channel-interleaved, row-major samples.
#[derive(Debug, Clone, PartialEq)]
pub enum Pixels {
    /// One byte per channel.
    U8(Vec<u8>),
    /// One float per channel.
    F32(Vec<f32>),
}

impl Pixels {
    /// Number of samples (not pixels).
    pub fn len(&self) -> usize {
        match self {
            Pixels::U8(v) => v.len(),
            Pixels::F32(v) => v.len(),
        }
    }

    /// True when no samples are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Storage type of the samples.
    pub fn sample_type(&self) -> SampleType {
        match self {
            Pixels::U8(_) => SampleType::U8,
            Pixels::F32(_) => SampleType::F32,
        }
    }
}

/// One decoded 2D image: a view, or a whole quilt.
///
/// Rows run top-to-bottom unless the producer says otherwise; pass
/// `flip_views` when packing bottom-to-top sources.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewImage {
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Samples per pixel.
    pub channels: usize,
    /// Sample storage, `height * width * channels` long.
    pub pixels: Pixels,
}

/// A whole quilt is stored the same way as a single view.
pub type QuiltBuffer = ViewImage;

impl ViewImage {
    /// Wrap 8-bit samples, checking the buffer length.
    pub fn from_u8(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        Self::new(width, height, channels, Pixels::U8(data))
    }

    /// Wrap float samples, checking the buffer length.
    pub fn from_f32(width: usize, height: usize, channels: usize, data: Vec<f32>) -> Result<Self> {
        Self::new(width, height, channels, Pixels::F32(data))
    }

    /// Wrap samples, checking the buffer length.
    pub fn new(width: usize, height: usize, channels: usize, pixels: Pixels) -> Result<Self> {
        let image = Self {
            width,
            height,
            channels,
            pixels,
        };
        match image.sample_mismatch() {
            Some(reason) => Err(FormatError::ViewFormatMismatch { index: 0, reason }),
            None => Ok(image),
        }
    }

    /// Describes a buffer whose length disagrees with its declared extent.
    ///
    /// The fields are public, so a hand-built image can carry any buffer.
    pub(crate) fn sample_mismatch(&self) -> Option<String> {
        let expected = self
            .width
            .checked_mul(self.height)
            .and_then(|n| n.checked_mul(self.channels));
        let held = self.pixels.len();
        match expected {
            Some(n) if n == held => None,
            Some(n) => Some(format!(
                "{}x{}x{} needs {n} samples, buffer holds {held}",
                self.width, self.height, self.channels
            )),
            None => Some(format!(
                "{}x{}x{} overflows the address space",
                self.width, self.height, self.channels
            )),
        }
    }

    /// All-zero 8-bit image.
    pub fn blank(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
            pixels: Pixels::U8(vec![0; width * height * channels]),
        }
    }

    /// Color mode implied by the channel count.
    pub fn color_mode(&self) -> Option<ColorMode> {
        ColorMode::from_channels(self.channels)
    }

    /// Storage type of the samples.
    pub fn sample_type(&self) -> SampleType {
        self.pixels.sample_type()
    }

    /// `(height, width, channels)` as used by the bitmap encoder.
    pub fn shape(&self) -> Shape {
        Shape::new(self.height, self.width, self.channels)
    }

    /// Samples quantised to 8 bits.
    pub fn to_u8(&self) -> Vec<u8> {
        match &self.pixels {
            Pixels::U8(v) => v.clone(),
            Pixels::F32(v) => v.iter().map(|&s| holo_cbor::Sample::to_u8(s)).collect(),
        }
    }

    /// Append this image as a CBOR bitmap byte string (see [`holo_cbor::bitmap`]).
    pub fn encode_bitmap(&self, order: RowOrder, out: &mut Vec<u8>) -> Result<()> {
        match &self.pixels {
            Pixels::U8(v) => holo_cbor::encode_bitmap(v, self.shape(), order, out)?,
            Pixels::F32(v) => holo_cbor::encode_bitmap(v, self.shape(), order, out)?,
        }
        Ok(())
    }

    /// Standalone BMP file for this image.
    pub fn bitmap_file(&self, order: RowOrder) -> Result<Vec<u8>> {
        let bytes = match &self.pixels {
            Pixels::U8(v) => holo_cbor::bitmap_file(v, self.shape(), order)?,
            Pixels::F32(v) => holo_cbor::bitmap_file(v, self.shape(), order)?,
        };
        Ok(bytes)
    }

    /// Describe how `other` differs in layout, or `None` when compatible.
    pub(crate) fn layout_mismatch(&self, other: &ViewImage) -> Option<String> {
        if (self.width, self.height) != (other.width, other.height) {
            return Some(format!(
                "size {}x{} differs from {}x{}",
                other.width, other.height, self.width, self.height
            ));
        }
        if self.channels != other.channels {
            return Some(format!(
                "{} channels differ from {}",
                other.channels, self.channels
            ));
        }
        if self.sample_type() != other.sample_type() {
            return Some(format!(
                "{:?} samples differ from {:?}",
                other.sample_type(),
                self.sample_type()
            ));
        }
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn constructor_checks_length() {
        assert!(ViewImage::from_u8(2, 2, 3, vec![0; 12]).is_ok());
        assert!(matches!(
            ViewImage::from_u8(2, 2, 3, vec![0; 11]),
            Err(FormatError::ViewFormatMismatch { .. })
        ));
    }

    #[test]
    fn layout_mismatch_reports_first_difference() {
        let a = ViewImage::blank(4, 4, 4);
        assert!(a.layout_mismatch(&ViewImage::blank(4, 4, 4)).is_none());
        assert!(a
            .layout_mismatch(&ViewImage::blank(4, 3, 4))
            .unwrap()
            .contains("size"));
        let f = ViewImage::from_f32(4, 4, 4, vec![0.0; 64]).unwrap();
        assert!(a.layout_mismatch(&f).unwrap().contains("samples"));
    }

    #[test]
    fn float_samples_quantise() {
        let f = ViewImage::from_f32(1, 1, 3, vec![0.0, 0.5, 1.0]).unwrap();
        assert_eq!(f.to_u8(), vec![0, 128, 255]);
    }
}
