// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Quilt ⇄ view tensor codec.
//!
//! Viewed as a tensor, a quilt buffer is `(rows, view_height, columns,
//! view_width, channels)` with quilt row 0 at the top of the buffer. Views are
//! numbered `row * columns + column` with `row` counted from the *bottom*, so
//! unpacking reverses the row groups and swaps the column and in-view-row axes
//! to make each view contiguous. Packing is the exact inverse.

use std::borrow::Cow;

use crate::format::{FormatId, QuiltFormat, QuiltFormatRegistry};
use crate::view::{Pixels, QuiltBuffer, ViewImage};
use crate::{FormatError, Result};

/// Grid geometry used by the transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tiling {
    /// Quilt rows.
    pub rows: usize,
    /// Views per quilt row.
    pub columns: usize,
    /// Width of one view.
    pub view_width: usize,
    /// Height of one view.
    pub view_height: usize,
}

impl Tiling {
    /// `rows * columns`.
    pub fn view_count(&self) -> usize {
        self.rows * self.columns
    }

    /// Width covered by the views.
    pub fn width(&self) -> usize {
        self.columns * self.view_width
    }

    /// Height covered by the views.
    pub fn height(&self) -> usize {
        self.rows * self.view_height
    }

    /// Top-to-bottom row group holding view-row `row` (counted from the bottom).
    #[inline]
    fn block(&self, row: usize) -> usize {
        self.rows - 1 - row
    }
}

impl From<&QuiltFormat> for Tiling {
    fn from(f: &QuiltFormat) -> Self {
        Self {
            rows: f.rows,
            columns: f.columns,
            view_width: f.view_width,
            view_height: f.view_height,
        }
    }
}

/// Split a quilt buffer into views, resolving its format from the registry.
pub fn unpack(registry: &QuiltFormatRegistry, quilt: &QuiltBuffer) -> Result<(FormatId, Vec<ViewImage>)> {
    let (id, format) = registry.find_by_dimensions(quilt.width, quilt.height)?;
    let views = unpack_with(quilt, Tiling::from(format))?;
    Ok((id, views))
}

/// Split a quilt buffer into views using a known tiling.
///
/// The buffer is cropped (or zero-padded) to the tiled extent first. Fails
/// when the sample buffer does not hold `width * height * channels` samples.
pub fn unpack_with(quilt: &QuiltBuffer, tiling: Tiling) -> Result<Vec<ViewImage>> {
    if let Some(reason) = quilt.sample_mismatch() {
        return Err(FormatError::ViewFormatMismatch { index: 0, reason });
    }
    let c = quilt.channels;
    Ok(match &quilt.pixels {
        Pixels::U8(data) => {
            let fitted = fit(data, quilt.width, quilt.height, c, tiling);
            split(&fitted, c, tiling)
                .into_iter()
                .map(|v| view(tiling, c, Pixels::U8(v)))
                .collect()
        }
        Pixels::F32(data) => {
            let fitted = fit(data, quilt.width, quilt.height, c, tiling);
            split(&fitted, c, tiling)
                .into_iter()
                .map(|v| view(tiling, c, Pixels::F32(v)))
                .collect()
        }
    })
}

fn view(t: Tiling, channels: usize, pixels: Pixels) -> ViewImage {
    ViewImage {
        width: t.view_width,
        height: t.view_height,
        channels,
        pixels,
    }
}

/// Assemble views into a quilt of the format's tiled extent.
///
/// `flip_views` mirrors every view vertically as it is placed, for producers
/// whose row 0 is the bottom of the image.
pub fn pack(views: &[ViewImage], format: &QuiltFormat, flip_views: bool) -> Result<QuiltBuffer> {
    let tiling = Tiling::from(format);
    let incomplete = || FormatError::IncompleteViewSet {
        expected: tiling.view_count(),
        actual: views.len(),
    };
    if views.len() != tiling.view_count() {
        return Err(incomplete());
    }
    let first = views.first().ok_or_else(incomplete)?;
    for (index, v) in views.iter().enumerate() {
        if (v.width, v.height) != (tiling.view_width, tiling.view_height) {
            return Err(FormatError::ViewFormatMismatch {
                index,
                reason: format!(
                    "view is {}x{}, format needs {}x{}",
                    v.width, v.height, tiling.view_width, tiling.view_height
                ),
            });
        }
        if let Some(reason) = first.layout_mismatch(v).or_else(|| v.sample_mismatch()) {
            return Err(FormatError::ViewFormatMismatch { index, reason });
        }
    }

    let channels = first.channels;
    let pixels = match &first.pixels {
        Pixels::U8(_) => {
            let slices: Vec<&[u8]> = views
                .iter()
                .filter_map(|v| match &v.pixels {
                    Pixels::U8(d) => Some(d.as_slice()),
                    Pixels::F32(_) => None,
                })
                .collect();
            Pixels::U8(join(&slices, channels, tiling, flip_views))
        }
        Pixels::F32(_) => {
            let slices: Vec<&[f32]> = views
                .iter()
                .filter_map(|v| match &v.pixels {
                    Pixels::F32(d) => Some(d.as_slice()),
                    Pixels::U8(_) => None,
                })
                .collect();
            Pixels::F32(join(&slices, channels, tiling, flip_views))
        }
    };
    Ok(ViewImage {
        width: tiling.width(),
        height: tiling.height(),
        channels,
        pixels,
    })
}

/// Crop or zero-pad a buffer to exactly the tiled extent.
fn fit<T: Copy + Default>(
    data: &[T],
    width: usize,
    height: usize,
    channels: usize,
    t: Tiling,
) -> Cow<'_, [T]> {
    let (tw, th) = (t.width(), t.height());
    if (width, height) == (tw, th) {
        return Cow::Borrowed(data);
    }
    let src_row = width * channels;
    let dst_row = tw * channels;
    let copy = src_row.min(dst_row);
    let mut out = vec![T::default(); dst_row * th];
    for y in 0..th.min(height) {
        out[y * dst_row..y * dst_row + copy].copy_from_slice(&data[y * src_row..y * src_row + copy]);
    }
    Cow::Owned(out)
}

/// Cut a tiled-extent buffer into per-view sample vectors.
fn split<T: Copy>(quilt: &[T], channels: usize, t: Tiling) -> Vec<Vec<T>> {
    let view_row = t.view_width * channels;
    let quilt_row = t.columns * view_row;
    (0..t.view_count())
        .map(|index| {
            let (row, column) = (index / t.columns, index % t.columns);
            let top = t.block(row) * t.view_height;
            let mut out = Vec::with_capacity(view_row * t.view_height);
            for y in 0..t.view_height {
                let start = (top + y) * quilt_row + column * view_row;
                out.extend_from_slice(&quilt[start..start + view_row]);
            }
            out
        })
        .collect()
}

/// Place per-view sample slices into one tiled-extent buffer.
fn join<T: Copy + Default>(views: &[&[T]], channels: usize, t: Tiling, flip: bool) -> Vec<T> {
    let view_row = t.view_width * channels;
    let quilt_row = t.columns * view_row;
    let mut out = vec![T::default(); quilt_row * t.height()];
    for (index, view) in views.iter().enumerate() {
        let (row, column) = (index / t.columns, index % t.columns);
        let top = t.block(row) * t.view_height;
        for y in 0..t.view_height {
            let src_y = if flip { t.view_height - 1 - y } else { y };
            let src = &view[src_y * view_row..(src_y + 1) * view_row];
            let start = (top + y) * quilt_row + column * view_row;
            out[start..start + view_row].copy_from_slice(src);
        }
    }
    out
}
