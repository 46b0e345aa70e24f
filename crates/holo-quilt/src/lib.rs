// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Quilts and views for lightfield displays.
//!
//! A quilt is one large image tiling `rows × columns` equal-sized perspective
//! views. Quilt row 0 is the *bottom* strip of views while pixel row 0 of the
//! buffer is the *top* of the image; [`tensor`] owns that origin flip.
//!
//! - [`format`]: registry of named tiling formats
//! - [`view`]: pixel containers ([`ViewImage`], [`Pixels`], [`ColorMode`])
//! - [`tensor`]: `pack` / `unpack` between quilt buffers and view lists
//! - [`lightfield`]: [`LightfieldImage`], the memoising owner of a view set
//! - [`io`]: still-image file load/save through the `image` crate

#![forbid(unsafe_code)]

pub mod format;
pub mod io;
pub mod lightfield;
pub mod tensor;
pub mod view;

pub use format::{FormatId, QuiltFormat, QuiltFormatRegistry};
pub use lightfield::{ExportFormat, LightfieldImage};
pub use tensor::{pack, unpack, Tiling};
pub use view::{ColorMode, Pixels, QuiltBuffer, SampleType, ViewImage};

/// Errors raised by the quilt/view codec and format registry.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// No registered format matches the buffer size.
    #[error("unsupported quilt dimensions {width}x{height}")]
    UnsupportedQuiltDimensions {
        /// Buffer width in pixels.
        width: usize,
        /// Buffer height in pixels.
        height: usize,
    },
    /// The view list does not fill the tiling.
    #[error("incomplete view set: format needs {expected} views, got {actual}")]
    IncompleteViewSet {
        /// Views the format requires.
        expected: usize,
        /// Views supplied.
        actual: usize,
    },
    /// A view differs in size or pixel format from the lightfield's views.
    #[error("view {index} does not match the lightfield: {reason}")]
    ViewFormatMismatch {
        /// Position of the offending view.
        index: usize,
        /// What differs.
        reason: String,
    },
    /// The lightfield already holds every view its format allows.
    #[error("view set is full ({capacity} views)")]
    TooManyViews {
        /// Views the format allows.
        capacity: usize,
    },
    /// Lookup of an unregistered format id.
    #[error("unknown quilt format id {0}")]
    UnknownFormat(FormatId),
    /// A format descriptor breaks the tiling invariants.
    #[error("invalid quilt format '{description}': {reason}")]
    InvalidFormat {
        /// Descriptor label.
        description: String,
        /// Broken invariant.
        reason: String,
    },
    /// Pixel data could not be wrapped for export.
    #[error("encode: {0}")]
    Codec(#[from] holo_cbor::CodecError),
    /// Still-image decode/encode failure.
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}

/// Result alias for quilt operations.
pub type Result<T> = std::result::Result<T, FormatError>;
