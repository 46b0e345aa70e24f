// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bitmap fast path: wrap a dense pixel buffer as a CBOR byte string holding a
//! 24-bit BMP file, without routing each sample through [`Value`](crate::Value).
//!
//! Layout written (all little-endian):
//!
//! ``'BM' || file_size(4) || 0(4) || 54(4) || BITMAPINFOHEADER(40) || rows``
//!
//! Rows are BGR, stored bottom-up, each padded with zeros to a 4-byte boundary.

use crate::encode::write_head;
use crate::{CodecError, Result};

const FILE_HEADER_LEN: usize = 14;
const INFO_HEADER_LEN: usize = 40;
const PIXEL_OFFSET: usize = FILE_HEADER_LEN + INFO_HEADER_LEN;
/// 72 DPI expressed in pixels per metre.
const PIXELS_PER_METRE: i32 = 2835;

/// Vertical order of rows in a source pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowOrder {
    /// Row 0 is the top of the image.
    #[default]
    TopDown,
    /// Row 0 is the bottom of the image (GL convention).
    BottomUp,
}

/// Shape of a dense, channel-interleaved pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    /// Rows.
    pub height: usize,
    /// Columns.
    pub width: usize,
    /// Samples per pixel (1, 3 or 4).
    pub channels: usize,
}

impl Shape {
    /// Build a shape from `(height, width, channels)`.
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    /// Number of samples the shape describes; `None` when that overflows.
    pub fn samples(&self) -> Option<usize> {
        self.height.checked_mul(self.width)?.checked_mul(self.channels)
    }
}

/// A pixel sample that can be quantised to an 8-bit channel.
pub trait Sample: Copy {
    /// Quantise to `0..=255`.
    fn to_u8(self) -> u8;
}

impl Sample for u8 {
    #[inline]
    fn to_u8(self) -> u8 {
        self
    }
}

impl Sample for f32 {
    #[inline]
    fn to_u8(self) -> u8 {
        (self.clamp(0.0, 1.0) * 255.0).round() as u8
    }
}

fn row_stride(width: usize) -> Option<usize> {
    Some(width.checked_mul(3)?.checked_add(3)? & !3)
}

fn too_large(width: usize, height: usize) -> CodecError {
    CodecError::UnsupportedType(format!("bitmap of {width}x{height} pixels is too large"))
}

/// Size in bytes of the BMP container for a `width × height` image.
pub fn bitmap_len(width: usize, height: usize) -> Result<usize> {
    row_stride(width)
        .and_then(|stride| stride.checked_mul(height))
        .and_then(|rows| rows.checked_add(PIXEL_OFFSET))
        .ok_or_else(|| too_large(width, height))
}

/// Header fields, all range-checked before the first byte is written.
struct Layout {
    width: i32,
    height: i32,
    file_size: u32,
    stride: usize,
}

impl Layout {
    fn of(shape: Shape) -> Result<Self> {
        let total = bitmap_len(shape.width, shape.height)?;
        let stride = row_stride(shape.width).ok_or_else(|| too_large(shape.width, shape.height))?;
        let width = i32::try_from(shape.width)
            .map_err(|_| CodecError::UnsupportedType("bitmap wider than i32::MAX".into()))?;
        let height = i32::try_from(shape.height)
            .map_err(|_| CodecError::UnsupportedType("bitmap taller than i32::MAX".into()))?;
        let file_size = u32::try_from(total)
            .map_err(|_| CodecError::UnsupportedType("bitmap larger than 4 GiB".into()))?;
        Ok(Self {
            width,
            height,
            file_size,
            stride,
        })
    }
}

/// Append `pixels` to `out` as a CBOR byte string containing a BMP file.
///
/// The output is byte-for-byte what encoding a conforming BMP file as an
/// opaque byte string would produce. On error `out` is left as it was.
pub fn encode_bitmap<P: Sample>(
    pixels: &[P],
    shape: Shape,
    order: RowOrder,
    out: &mut Vec<u8>,
) -> Result<()> {
    check_shape(pixels.len(), shape)?;
    let layout = Layout::of(shape)?;
    out.reserve(9 + layout.file_size as usize);
    write_head(2, u64::from(layout.file_size), out);
    write_bmp(pixels, shape, &layout, order, out);
    Ok(())
}

/// Produce a standalone BMP file for `pixels` (no CBOR framing).
pub fn bitmap_file<P: Sample>(pixels: &[P], shape: Shape, order: RowOrder) -> Result<Vec<u8>> {
    check_shape(pixels.len(), shape)?;
    let layout = Layout::of(shape)?;
    let mut out = Vec::with_capacity(layout.file_size as usize);
    write_bmp(pixels, shape, &layout, order, &mut out);
    Ok(out)
}

fn check_shape(samples: usize, shape: Shape) -> Result<()> {
    if !matches!(shape.channels, 1 | 3 | 4) {
        return Err(CodecError::UnsupportedType(format!(
            "bitmap needs 1, 3 or 4 channels, got {}",
            shape.channels
        )));
    }
    let expected = shape
        .samples()
        .ok_or_else(|| too_large(shape.width, shape.height))?;
    if samples != expected {
        return Err(CodecError::ShapeMismatch {
            expected,
            actual: samples,
        });
    }
    Ok(())
}

fn write_bmp<P: Sample>(
    pixels: &[P],
    shape: Shape,
    layout: &Layout,
    order: RowOrder,
    out: &mut Vec<u8>,
) {
    let image_size = layout.file_size - PIXEL_OFFSET as u32;

    // file header
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&layout.file_size.to_le_bytes());
    out.extend_from_slice(&[0u8; 4]);
    out.extend_from_slice(&(PIXEL_OFFSET as u32).to_le_bytes());

    // BITMAPINFOHEADER; positive height means bottom-up rows
    out.extend_from_slice(&(INFO_HEADER_LEN as u32).to_le_bytes());
    out.extend_from_slice(&layout.width.to_le_bytes());
    out.extend_from_slice(&layout.height.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&image_size.to_le_bytes());
    out.extend_from_slice(&PIXELS_PER_METRE.to_le_bytes());
    out.extend_from_slice(&PIXELS_PER_METRE.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    let row_len = shape.width * shape.channels;
    let padding = layout.stride - shape.width * 3;
    for i in 0..shape.height {
        let y = match order {
            RowOrder::TopDown => shape.height - 1 - i,
            RowOrder::BottomUp => i,
        };
        let row = &pixels[y * row_len..(y + 1) * row_len];
        match shape.channels {
            1 => {
                for &g in row {
                    let g = g.to_u8();
                    out.extend_from_slice(&[g, g, g]);
                }
            }
            c => {
                for px in row.chunks_exact(c) {
                    out.extend_from_slice(&[px[2].to_u8(), px[1].to_u8(), px[0].to_u8()]);
                }
            }
        }
        out.extend(std::iter::repeat(0u8).take(padding));
    }
}
