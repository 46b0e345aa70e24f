// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Registry of quilt tiling formats.
//!
//! Ids are assigned once and never reused, so a host that stored an id keeps
//! pointing at the same format (or at nothing) across edits.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{FormatError, Result};

/// Identifier of a registered quilt format.
pub type FormatId = u32;

/// Accepted difference between a buffer size and a format's nominal size.
pub const DIMENSION_TOLERANCE: usize = 1;

/// Tiling descriptor for one quilt format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuiltFormat {
    /// Human readable label.
    pub description: String,
    /// Nominal quilt width in pixels.
    pub quilt_width: usize,
    /// Nominal quilt height in pixels.
    pub quilt_height: usize,
    /// Width of one view.
    pub view_width: usize,
    /// Height of one view.
    pub view_height: usize,
    /// Views per quilt row.
    pub columns: usize,
    /// Quilt rows.
    pub rows: usize,
    /// `rows * columns`.
    pub total_views: usize,
    /// Excluded from user-facing listings.
    #[serde(default)]
    pub hidden: bool,
}

impl QuiltFormat {
    /// Describe a format from its quilt size and grid; view size is derived
    /// by integer division.
    pub fn from_grid(
        description: impl Into<String>,
        quilt_width: usize,
        quilt_height: usize,
        columns: usize,
        rows: usize,
    ) -> Self {
        Self {
            description: description.into(),
            quilt_width,
            quilt_height,
            view_width: quilt_width.checked_div(columns).unwrap_or(0),
            view_height: quilt_height.checked_div(rows).unwrap_or(0),
            columns,
            rows,
            total_views: columns * rows,
            hidden: false,
        }
    }

    /// Width actually covered by views (`columns * view_width`).
    pub fn tiled_width(&self) -> usize {
        self.columns * self.view_width
    }

    /// Height actually covered by views (`rows * view_height`).
    pub fn tiled_height(&self) -> usize {
        self.rows * self.view_height
    }

    /// Aspect ratio of a single view.
    pub fn view_aspect(&self) -> f32 {
        if self.view_height == 0 {
            return 0.0;
        }
        self.view_width as f32 / self.view_height as f32
    }

    /// Check the tiling invariants.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| {
            Err(FormatError::InvalidFormat {
                description: self.description.clone(),
                reason,
            })
        };
        if self.rows == 0 || self.columns == 0 || self.view_width == 0 || self.view_height == 0 {
            return fail("rows, columns and view size must be non-zero".into());
        }
        if self.total_views != self.rows * self.columns {
            return fail(format!(
                "total_views {} != rows {} * columns {}",
                self.total_views, self.rows, self.columns
            ));
        }
        if self.view_width != self.quilt_width / self.columns {
            return fail(format!(
                "view_width {} != quilt_width {} / columns {}",
                self.view_width, self.quilt_width, self.columns
            ));
        }
        if self.view_height != self.quilt_height / self.rows {
            return fail(format!(
                "view_height {} != quilt_height {} / rows {}",
                self.view_height, self.quilt_height, self.rows
            ));
        }
        Ok(())
    }

    /// Whether a `width × height` buffer should be read with this format.
    ///
    /// Each axis may be within [`DIMENSION_TOLERANCE`] of the nominal size or
    /// equal to the tiled extent.
    pub fn matches(&self, width: usize, height: usize) -> bool {
        let axis = |got: usize, nominal: usize, tiled: usize| {
            got.abs_diff(nominal) <= DIMENSION_TOLERANCE || got == tiled
        };
        axis(width, self.quilt_width, self.tiled_width())
            && axis(height, self.quilt_height, self.tiled_height())
    }
}

fn builtin_formats() -> Vec<QuiltFormat> {
    vec![
        QuiltFormat::from_grid("Looking Glass Portrait (48 views)", 3360, 3360, 8, 6),
        QuiltFormat::from_grid("2k Quilt, 32 Views", 2048, 2048, 4, 8),
        QuiltFormat::from_grid("4k Quilt, 45 Views", 4096, 4096, 5, 9),
        QuiltFormat::from_grid("8k Quilt, 45 Views", 8192, 8192, 5, 9),
        QuiltFormat::from_grid("Looking Glass Go (66 views)", 4092, 4092, 11, 6),
    ]
}

/// Mutable table of quilt formats keyed by id.
#[derive(Debug, Clone)]
pub struct QuiltFormatRegistry {
    formats: BTreeMap<FormatId, QuiltFormat>,
    next_id: FormatId,
}

impl Default for QuiltFormatRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl QuiltFormatRegistry {
    /// A registry with no formats.
    pub fn empty() -> Self {
        Self {
            formats: BTreeMap::new(),
            next_id: 0,
        }
    }

    /// A registry seeded with the built-in formats (ids 0..=4).
    pub fn with_builtins() -> Self {
        let mut reg = Self::empty();
        for f in builtin_formats() {
            let id = reg.next_id;
            reg.next_id += 1;
            reg.formats.insert(id, f);
        }
        reg
    }

    /// Register a format and return its new id.
    pub fn add(&mut self, format: QuiltFormat) -> Result<FormatId> {
        format.validate()?;
        let id = self.next_id;
        self.next_id += 1;
        debug!(id, description = %format.description, "quilt format registered");
        self.formats.insert(id, format);
        Ok(id)
    }

    /// Register presets loaded from configuration, skipping invalid ones.
    ///
    /// Returns the ids assigned to the accepted presets.
    pub fn load_presets<I>(&mut self, presets: I) -> Vec<FormatId>
    where
        I: IntoIterator<Item = QuiltFormat>,
    {
        let mut ids = Vec::new();
        for preset in presets {
            match self.add(preset) {
                Ok(id) => ids.push(id),
                Err(err) => warn!(%err, "quilt preset rejected"),
            }
        }
        ids
    }

    /// Remove a format. Its id is never handed out again.
    pub fn remove(&mut self, id: FormatId) -> Option<QuiltFormat> {
        self.formats.remove(&id)
    }

    /// Hide or unhide a format in listings.
    pub fn set_hidden(&mut self, id: FormatId, hidden: bool) -> Result<()> {
        let f = self
            .formats
            .get_mut(&id)
            .ok_or(FormatError::UnknownFormat(id))?;
        f.hidden = hidden;
        Ok(())
    }

    /// Look up a format.
    pub fn get(&self, id: FormatId) -> Option<&QuiltFormat> {
        self.formats.get(&id)
    }

    /// Look up a format, failing with [`FormatError::UnknownFormat`].
    pub fn require(&self, id: FormatId) -> Result<&QuiltFormat> {
        self.get(id).ok_or(FormatError::UnknownFormat(id))
    }

    /// Formats in id order; hidden ones only when asked for.
    pub fn list(&self, include_hidden: bool) -> impl Iterator<Item = (FormatId, &QuiltFormat)> + '_ {
        self.formats
            .iter()
            .filter(move |(_, f)| include_hidden || !f.hidden)
            .map(|(id, f)| (*id, f))
    }

    /// Number of registered formats (hidden included).
    pub fn len(&self) -> usize {
        self.formats.len()
    }

    /// True when no formats are registered.
    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    /// Resolve buffer dimensions to a format; the lowest matching id wins.
    pub fn find_by_dimensions(&self, width: usize, height: usize) -> Result<(FormatId, &QuiltFormat)> {
        self.formats
            .iter()
            .find(|(_, f)| f.matches(width, height))
            .map(|(id, f)| (*id, f))
            .ok_or(FormatError::UnsupportedQuiltDimensions { width, height })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn builtins_satisfy_invariants() {
        let reg = QuiltFormatRegistry::with_builtins();
        assert_eq!(reg.len(), 5);
        for (_, f) in reg.list(true) {
            f.validate().unwrap();
            assert_eq!(f.rows * f.columns, f.total_views);
        }
    }

    #[test]
    fn format_two_is_the_4k_quilt() {
        let reg = QuiltFormatRegistry::with_builtins();
        let f = reg.get(2).unwrap();
        assert_eq!((f.quilt_width, f.quilt_height), (4096, 4096));
        assert_eq!((f.columns, f.rows, f.total_views), (5, 9, 45));
        assert_eq!((f.view_width, f.view_height), (819, 455));
    }

    #[test]
    fn dimensions_resolve_within_one_pixel() {
        let reg = QuiltFormatRegistry::with_builtins();
        for (w, h) in [(4096, 4096), (4095, 4097), (4097, 4095)] {
            assert_eq!(reg.find_by_dimensions(w, h).unwrap().0, 2);
        }
        // 8k tiled extent is two pixels short of nominal
        assert_eq!(reg.find_by_dimensions(8190, 8190).unwrap().0, 3);
        assert!(matches!(
            reg.find_by_dimensions(4098, 4096),
            Err(FormatError::UnsupportedQuiltDimensions { .. })
        ));
    }

    #[test]
    fn ids_are_never_reused() {
        let mut reg = QuiltFormatRegistry::with_builtins();
        let a = reg
            .add(QuiltFormat::from_grid("tiny", 8, 6, 4, 3))
            .unwrap();
        assert_eq!(a, 5);
        reg.remove(a);
        let b = reg
            .add(QuiltFormat::from_grid("tiny again", 8, 6, 4, 3))
            .unwrap();
        assert_eq!(b, 6);
        assert!(reg.get(a).is_none());
    }

    #[test]
    fn hidden_formats_leave_listings_but_still_match() {
        let mut reg = QuiltFormatRegistry::with_builtins();
        reg.set_hidden(1, true).unwrap();
        assert!(reg.list(false).all(|(id, _)| id != 1));
        assert_eq!(reg.list(true).count(), 5);
        assert_eq!(reg.find_by_dimensions(2048, 2048).unwrap().0, 1);
        assert!(matches!(
            reg.set_hidden(99, true),
            Err(FormatError::UnknownFormat(99))
        ));
    }

    #[test]
    fn invalid_presets_are_skipped() {
        let mut reg = QuiltFormatRegistry::empty();
        let mut broken = QuiltFormat::from_grid("broken", 100, 100, 4, 4);
        broken.total_views = 15;
        let ids = reg.load_presets(vec![broken, QuiltFormat::from_grid("ok", 100, 100, 4, 4)]);
        assert_eq!(ids, vec![0]);
        assert_eq!(reg.get(0).unwrap().description, "ok");
    }
}
