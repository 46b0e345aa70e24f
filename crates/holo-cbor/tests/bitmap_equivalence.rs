// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(clippy::unwrap_used, clippy::expect_used)]
//! The bitmap fast path must describe the same image as the generic
//! array-of-arrays encoding of the same buffer.

use holo_cbor::{
    bitmap_len, decode_exact, encode, encode_bitmap, RowOrder, Shape, Value as Cbor,
};

fn test_pixels(width: usize, height: usize) -> Vec<u8> {
    (0..width * height * 3)
        .map(|i| ((i * 37 + 11) % 251) as u8)
        .collect()
}

/// Generic path: rows of pixels of channels, top row first.
fn generic_image(pixels: &[u8], width: usize, height: usize) -> Cbor {
    let rows = (0..height)
        .map(|y| {
            Cbor::Array(
                (0..width)
                    .map(|x| {
                        let i = (y * width + x) * 3;
                        Cbor::Array(pixels[i..i + 3].iter().map(|&c| Cbor::from(c)).collect())
                    })
                    .collect(),
            )
        })
        .collect();
    Cbor::Array(rows)
}

#[test]
fn fast_path_matches_generic_path() {
    // width 5 → 15-byte rows, exercising the padding branch
    let (width, height) = (5, 3);
    let pixels = test_pixels(width, height);

    let generic = decode_exact(&encode(&generic_image(&pixels, width, height)).unwrap()).unwrap();

    let mut fast = Vec::new();
    encode_bitmap(&pixels, Shape::new(height, width, 3), RowOrder::TopDown, &mut fast).unwrap();
    let fast = decode_exact(&fast).unwrap();
    let bmp = fast.as_bytes().unwrap();
    assert_eq!(bmp.len(), bitmap_len(width, height).unwrap());

    let img = image::load_from_memory_with_format(bmp, image::ImageFormat::Bmp)
        .unwrap()
        .to_rgb8();
    assert_eq!((img.width() as usize, img.height() as usize), (width, height));

    let rows = generic.as_array().unwrap();
    for (y, row) in rows.iter().enumerate() {
        for (x, px) in row.as_array().unwrap().iter().enumerate() {
            let want: Vec<u8> = px
                .as_array()
                .unwrap()
                .iter()
                .map(|c| c.as_integer().unwrap() as u8)
                .collect();
            assert_eq!(img.get_pixel(x as u32, y as u32).0.to_vec(), want, "pixel ({x},{y})");
        }
    }
}

#[test]
fn bottom_up_source_yields_same_image_when_flipped() {
    let (width, height) = (4, 4);
    let top_down = test_pixels(width, height);
    let row = width * 3;
    let bottom_up: Vec<u8> = top_down
        .chunks_exact(row)
        .rev()
        .flatten()
        .copied()
        .collect();

    let mut a = Vec::new();
    let mut b = Vec::new();
    encode_bitmap(&top_down, Shape::new(height, width, 3), RowOrder::TopDown, &mut a).unwrap();
    encode_bitmap(&bottom_up, Shape::new(height, width, 3), RowOrder::BottomUp, &mut b).unwrap();
    assert_eq!(a, b);
}

#[test]
fn rgba_alpha_is_dropped() {
    let rgba = [10u8, 20, 30, 255, 40, 50, 60, 0];
    let rgb = [10u8, 20, 30, 40, 50, 60];
    let mut a = Vec::new();
    let mut b = Vec::new();
    encode_bitmap(&rgba, Shape::new(1, 2, 4), RowOrder::TopDown, &mut a).unwrap();
    encode_bitmap(&rgb, Shape::new(1, 2, 3), RowOrder::TopDown, &mut b).unwrap();
    assert_eq!(a, b);
}
