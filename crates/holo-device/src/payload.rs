// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `bin` payload that streams a packed quilt through the bitmap fast path.

use holo_cbor::{bitmap_len, encode_bitmap, CodecError, RowOrder};
use holo_quilt::{Pixels, QuiltBuffer};
use holo_service_proto::BinPayload;

/// A quilt written as a CBOR-wrapped BMP straight into the request buffer.
#[derive(Debug, Clone, Copy)]
pub struct QuiltPayload<'a> {
    quilt: &'a QuiltBuffer,
}

impl<'a> QuiltPayload<'a> {
    /// Borrow `quilt` for one request.
    pub fn new(quilt: &'a QuiltBuffer) -> Self {
        Self { quilt }
    }
}

impl BinPayload for QuiltPayload<'_> {
    fn write_bin(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        let shape = self.quilt.shape();
        match &self.quilt.pixels {
            Pixels::U8(v) => encode_bitmap(v, shape, RowOrder::TopDown, out),
            Pixels::F32(v) => encode_bitmap(v, shape, RowOrder::TopDown, out),
        }
    }

    fn size_hint(&self) -> usize {
        bitmap_len(self.quilt.width, self.quilt.height).map_or(0, |n| n + 9)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use holo_cbor::decode_exact;

    #[test]
    fn payload_is_the_bitmap_file_as_bytes() {
        let quilt = QuiltBuffer::from_u8(3, 2, 3, (0..18).collect()).unwrap();
        let mut out = Vec::new();
        QuiltPayload::new(&quilt).write_bin(&mut out).unwrap();
        let value = decode_exact(&out).unwrap();
        let file = quilt.bitmap_file(RowOrder::TopDown).unwrap();
        assert_eq!(value.as_bytes(), Some(file.as_slice()));
        assert!(out.len() <= QuiltPayload::new(&quilt).size_hint());
    }

    #[test]
    fn two_channel_quilts_are_refused() {
        let quilt = QuiltBuffer::from_u8(1, 1, 2, vec![1, 2]).unwrap();
        let mut out = Vec::new();
        assert!(matches!(
            QuiltPayload::new(&quilt).write_bin(&mut out),
            Err(CodecError::UnsupportedType(_))
        ));
    }

    #[test]
    fn every_builtin_quilt_fits_in_one_request() {
        use holo_service_proto::wire::{MAX_MESSAGE, MAX_REQUEST};
        let formats = holo_quilt::QuiltFormatRegistry::with_builtins();
        for (_, f) in formats.list(true) {
            let bin = bitmap_len(f.tiled_width(), f.tiled_height()).unwrap() + 9;
            assert!(bin as u64 + 256 < MAX_REQUEST, "{}", f.description);
        }
        // 8k tiles to 8190x8190, well past the reply limit
        let eight_k = formats.get(3).unwrap();
        let bmp = bitmap_len(eight_k.tiled_width(), eight_k.tiled_height()).unwrap();
        assert_eq!(bmp, 54 + 24_572 * 8190);
        assert!(bmp as u64 > MAX_MESSAGE);
    }
}
