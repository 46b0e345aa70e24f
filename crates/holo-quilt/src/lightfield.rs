// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Lightfield images: an ordered view set bound to one quilt format.
//!
//! Packing a large quilt costs tens of milliseconds, so the packed buffer is
//! memoised per instance. Every mutation of the view set bumps a generation
//! counter; the cached quilt is reused only while its generation and flip flag
//! still match.

use std::path::Path;

use holo_cbor::RowOrder;
use tracing::debug;

use crate::format::{FormatId, QuiltFormat, QuiltFormatRegistry};
use crate::tensor;
use crate::view::{ColorMode, QuiltBuffer, ViewImage};
use crate::{FormatError, Result};

/// Byte encodings [`LightfieldImage::decode`] can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Packed quilt samples, 8 bits each, row-major top-down.
    Raw,
    /// Uncompressed 24-bit BMP file.
    Bitmap,
    /// PNG file.
    Png,
}

#[derive(Debug, Clone)]
struct CachedQuilt {
    generation: u64,
    flip_views: bool,
    quilt: QuiltBuffer,
}

/// Views plus the format they tile into.
#[derive(Debug, Clone)]
pub struct LightfieldImage {
    format_id: FormatId,
    format: QuiltFormat,
    views: Vec<ViewImage>,
    generation: u64,
    cache: Option<CachedQuilt>,
}

impl LightfieldImage {
    /// Empty lightfield for a registered format.
    pub fn new(registry: &QuiltFormatRegistry, format_id: FormatId) -> Result<Self> {
        let format = registry.require(format_id)?.clone();
        Ok(Self {
            format_id,
            views: Vec::with_capacity(format.total_views),
            format,
            generation: 0,
            cache: None,
        })
    }

    /// Decode an existing quilt buffer into views.
    pub fn from_quilt(registry: &QuiltFormatRegistry, quilt: &QuiltBuffer) -> Result<Self> {
        let (format_id, views) = tensor::unpack(registry, quilt)?;
        let mut lf = Self::new(registry, format_id)?;
        lf.views = views;
        debug!(
            format_id,
            width = quilt.width,
            height = quilt.height,
            "lightfield decoded from quilt"
        );
        Ok(lf)
    }

    /// Load a quilt image file and decode it into views.
    pub fn from_quilt_file(path: impl AsRef<Path>, registry: &QuiltFormatRegistry) -> Result<Self> {
        let quilt = ViewImage::load(path)?;
        Self::from_quilt(registry, &quilt)
    }

    /// Id of the format this lightfield tiles into.
    pub fn format_id(&self) -> FormatId {
        self.format_id
    }

    /// Format descriptor.
    pub fn format(&self) -> &QuiltFormat {
        &self.format
    }

    /// Nominal quilt width.
    pub fn quilt_width(&self) -> usize {
        self.format.quilt_width
    }

    /// Nominal quilt height.
    pub fn quilt_height(&self) -> usize {
        self.format.quilt_height
    }

    /// Width of one view.
    pub fn view_width(&self) -> usize {
        self.format.view_width
    }

    /// Height of one view.
    pub fn view_height(&self) -> usize {
        self.format.view_height
    }

    /// Quilt rows.
    pub fn rows(&self) -> usize {
        self.format.rows
    }

    /// Views per quilt row.
    pub fn columns(&self) -> usize {
        self.format.columns
    }

    /// Views the format holds (`rows * columns`).
    pub fn view_count(&self) -> usize {
        self.format.total_views
    }

    /// Color mode of the views, once any are present.
    pub fn color_mode(&self) -> Option<ColorMode> {
        self.views.first().and_then(ViewImage::color_mode)
    }

    /// Channels per pixel of the views, 0 while empty.
    pub fn channels(&self) -> usize {
        self.views.first().map_or(0, |v| v.channels)
    }

    /// Views in index order.
    pub fn views(&self) -> &[ViewImage] {
        &self.views
    }

    /// True once every slot of the format is filled.
    pub fn is_complete(&self) -> bool {
        self.views.len() == self.format.total_views
    }

    /// Replace the whole view set.
    pub fn set_views(&mut self, views: Vec<ViewImage>) -> Result<()> {
        if views.len() != self.format.total_views {
            return Err(FormatError::IncompleteViewSet {
                expected: self.format.total_views,
                actual: views.len(),
            });
        }
        for (index, v) in views.iter().enumerate() {
            self.check_view(index, v, &views[0])?;
        }
        self.views = views;
        self.touch();
        Ok(())
    }

    /// Add the next view.
    pub fn append_view(&mut self, view: ViewImage) -> Result<()> {
        let index = self.views.len();
        if index >= self.format.total_views {
            return Err(FormatError::TooManyViews {
                capacity: self.format.total_views,
            });
        }
        let reference = self.views.first().unwrap_or(&view);
        self.check_view(index, &view, reference)?;
        self.views.push(view);
        self.touch();
        Ok(())
    }

    /// Swap the view at `index`, returning the previous one.
    pub fn replace_view(&mut self, index: usize, view: ViewImage) -> Result<ViewImage> {
        let Some(current) = self.views.get(index) else {
            return Err(FormatError::ViewFormatMismatch {
                index,
                reason: format!("no view at index {index} (holding {})", self.views.len()),
            });
        };
        if let Some(reason) = current.layout_mismatch(&view) {
            return Err(FormatError::ViewFormatMismatch { index, reason });
        }
        self.touch();
        Ok(std::mem::replace(&mut self.views[index], view))
    }

    /// Mutable access to one view's pixels; invalidates the cached quilt.
    pub fn view_mut(&mut self, index: usize) -> Option<&mut ViewImage> {
        if index < self.views.len() {
            self.touch();
        }
        self.views.get_mut(index)
    }

    /// Drop every view.
    pub fn clear_views(&mut self) {
        self.views.clear();
        self.touch();
    }

    /// The packed quilt, rebuilt only when views or `flip_views` changed.
    pub fn quilt(&mut self, flip_views: bool) -> Result<&QuiltBuffer> {
        let generation = self.generation;
        let hit = self
            .cache
            .take()
            .filter(|c| c.generation == generation && c.flip_views == flip_views);
        let entry = match hit {
            Some(entry) => entry,
            None => {
                let quilt = tensor::pack(&self.views, &self.format, flip_views)?;
                debug!(
                    format_id = self.format_id,
                    generation, flip_views, "quilt packed"
                );
                CachedQuilt {
                    generation,
                    flip_views,
                    quilt,
                }
            }
        };
        Ok(&self.cache.insert(entry).quilt)
    }

    /// Whether [`quilt`](Self::quilt) would return a memoised buffer.
    pub fn is_quilt_cached(&self, flip_views: bool) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|c| c.generation == self.generation && c.flip_views == flip_views)
    }

    /// Encode the packed quilt.
    pub fn decode(&mut self, target: ExportFormat) -> Result<Vec<u8>> {
        let quilt = self.quilt(false)?;
        match target {
            ExportFormat::Raw => Ok(quilt.to_u8()),
            ExportFormat::Bitmap => quilt.bitmap_file(RowOrder::TopDown),
            ExportFormat::Png => quilt.to_png(),
        }
    }

    /// Write the packed quilt to an image file.
    pub fn save_quilt(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.quilt(false)?.save(path)
    }

    fn touch(&mut self) {
        self.generation += 1;
    }

    fn check_view(&self, index: usize, view: &ViewImage, reference: &ViewImage) -> Result<()> {
        let f = &self.format;
        if (view.width, view.height) != (f.view_width, f.view_height) {
            return Err(FormatError::ViewFormatMismatch {
                index,
                reason: format!(
                    "view is {}x{}, format needs {}x{}",
                    view.width, view.height, f.view_width, f.view_height
                ),
            });
        }
        match reference.layout_mismatch(view) {
            Some(reason) => Err(FormatError::ViewFormatMismatch { index, reason }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn registry() -> (QuiltFormatRegistry, FormatId) {
        let mut reg = QuiltFormatRegistry::empty();
        let id = reg.add(QuiltFormat::from_grid("tiny", 4, 6, 2, 3)).unwrap();
        (reg, id)
    }

    fn filled() -> LightfieldImage {
        let (reg, id) = registry();
        let mut lf = LightfieldImage::new(&reg, id).unwrap();
        for i in 0..6u8 {
            lf.append_view(ViewImage::from_u8(2, 2, 3, vec![i; 12]).unwrap())
                .unwrap();
        }
        lf
    }

    #[test]
    fn metadata_follows_format() {
        let lf = filled();
        assert_eq!((lf.rows(), lf.columns(), lf.view_count()), (3, 2, 6));
        assert_eq!((lf.view_width(), lf.view_height()), (2, 2));
        assert_eq!(lf.color_mode(), Some(ColorMode::Rgb));
        assert_eq!(lf.channels(), 3);
        assert!(lf.is_complete());
    }

    #[test]
    fn unknown_format_is_rejected() {
        let (reg, _) = registry();
        assert!(matches!(
            LightfieldImage::new(&reg, 42),
            Err(FormatError::UnknownFormat(42))
        ));
    }

    #[test]
    fn append_past_capacity_fails() {
        let mut lf = filled();
        assert!(matches!(
            lf.append_view(ViewImage::blank(2, 2, 3)),
            Err(FormatError::TooManyViews { capacity: 6 })
        ));
    }

    #[test]
    fn append_checks_size_and_layout() {
        let (reg, id) = registry();
        let mut lf = LightfieldImage::new(&reg, id).unwrap();
        assert!(matches!(
            lf.append_view(ViewImage::blank(3, 2, 3)),
            Err(FormatError::ViewFormatMismatch { index: 0, .. })
        ));
        lf.append_view(ViewImage::blank(2, 2, 3)).unwrap();
        assert!(matches!(
            lf.append_view(ViewImage::blank(2, 2, 4)),
            Err(FormatError::ViewFormatMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn set_views_requires_full_set() {
        let (reg, id) = registry();
        let mut lf = LightfieldImage::new(&reg, id).unwrap();
        assert!(matches!(
            lf.set_views(vec![ViewImage::blank(2, 2, 1); 5]),
            Err(FormatError::IncompleteViewSet {
                expected: 6,
                actual: 5
            })
        ));
        lf.set_views(vec![ViewImage::blank(2, 2, 1); 6]).unwrap();
        assert_eq!(lf.views().len(), 6);
    }

    #[test]
    fn partial_set_cannot_be_packed() {
        let (reg, id) = registry();
        let mut lf = LightfieldImage::new(&reg, id).unwrap();
        lf.append_view(ViewImage::blank(2, 2, 3)).unwrap();
        assert!(matches!(
            lf.quilt(false),
            Err(FormatError::IncompleteViewSet { .. })
        ));
    }

    #[test]
    fn quilt_is_memoised_until_views_change() {
        let mut lf = filled();
        assert!(!lf.is_quilt_cached(false));
        let first = lf.quilt(false).unwrap().clone();
        assert!(lf.is_quilt_cached(false));
        assert_eq!(lf.quilt(false).unwrap(), &first);

        if let Some(v) = lf.view_mut(0) {
            v.pixels = crate::Pixels::U8(vec![99; 12]);
        }
        assert!(!lf.is_quilt_cached(false));
        assert_ne!(lf.quilt(false).unwrap(), &first);
    }

    #[test]
    fn flip_flag_is_part_of_the_cache_key() {
        let mut lf = filled();
        lf.quilt(false).unwrap();
        assert!(!lf.is_quilt_cached(true));
        lf.quilt(true).unwrap();
        assert!(lf.is_quilt_cached(true));
        assert!(!lf.is_quilt_cached(false));
    }

    #[test]
    fn replace_and_clear_invalidate() {
        let mut lf = filled();
        lf.quilt(false).unwrap();
        let old = lf.replace_view(5, ViewImage::blank(2, 2, 3)).unwrap();
        assert_eq!(old.to_u8(), vec![5; 12]);
        assert!(!lf.is_quilt_cached(false));
        lf.clear_views();
        assert!(lf.views().is_empty());
        assert_eq!(lf.channels(), 0);
    }

    #[test]
    fn decode_targets() {
        let mut lf = filled();
        let raw = lf.decode(ExportFormat::Raw).unwrap();
        assert_eq!(raw.len(), 4 * 6 * 3);
        // bottom-left view 0 lands in the last quilt row
        assert_eq!(raw[raw.len() - 12], 0);
        assert_eq!(raw[0], 4);

        let bmp = lf.decode(ExportFormat::Bitmap).unwrap();
        assert_eq!(&bmp[..2], b"BM");
        assert_eq!(bmp.len(), holo_cbor::bitmap_len(4, 6).unwrap());

        let png = lf.decode(ExportFormat::Png).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn quilt_round_trips_through_lightfield() {
        let (reg, _) = registry();
        let mut lf = filled();
        let quilt = lf.quilt(false).unwrap().clone();
        let mut back = LightfieldImage::from_quilt(&reg, &quilt).unwrap();
        assert_eq!(back.views(), lf.views());
        assert_eq!(back.quilt(false).unwrap(), &quilt);
    }
}
