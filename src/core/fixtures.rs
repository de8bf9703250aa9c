//! Synthetic images for tests.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma};
use std::f64::consts::PI;
use std::io::Cursor;

use crate::core::pixels::PixelGrid;

// Records of `textured_luma(256, 256, seed)` at the default resolution.
// Changing one of these changes every record already on a ledger.
pub(crate) const TEXTURE_31_RECORD: &str = concat!(
    "e8cc71e1f4e4b0e0f0e2e8e0e861ece5c4f0d6f0c278e568e578e4e4f0dc62c0#",
    "9399c349c98d2194a5c692cb9ac399ed0da5a5c294c29ad9cb49c9858594868c#",
    "590083cd01f7d4ad022b8caeaa05ddd2c72bfdb20d2dddb6f50bf531772a0851",
);
pub(crate) const TEXTURE_32_RECORD: &str = concat!(
    "c72f0b6f0b6d1b1c3f687e5cf800f01cf86dd07d41e80368dbe0dfc3c3019207#",
    "1a6d5e5936d9b658f2dab4d830e4c0e9c2c936c9d34996cbb6c33686061b265c#",
    "5d67878d8df79a0f3558ea507d08ea1a84167a1877527e6592027e2403f7792d",
);
pub(crate) const TEXTURE_34_RECORD: &str = concat!(
    "2fe7e3c7e3dfcfffc08300000180f787c7ebc763f7e7f7efc10781008700cbc3#",
    "5b0d471c96b71e0b15a7b78fd70b8d3d1c2abd432b0f270e8e1f4e0b3c571287#",
    "2ddd808b575e955cf007015ca35d160cc4a9962c0aa797d5677de620f2357b75",
);

/// Deterministic texture built from a dozen plane waves with 1/f amplitudes.
/// Different seeds give visually unrelated images.
pub(crate) fn textured_luma(width: u32, height: u32, seed: u64) -> GrayImage {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move || {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as f64 / (1u64 << 31) as f64
    };

    let mut waves = Vec::new();
    while waves.len() < 12 {
        let kx = (next() * 17.0).floor() - 8.0;
        let ky = (next() * 17.0).floor() - 8.0;
        if kx == 0.0 && ky == 0.0 {
            continue;
        }
        let phase = next() * 2.0 * PI;
        let amplitude = 1.0 / (1.0 + (kx * kx + ky * ky).sqrt());
        waves.push((kx, ky, phase, amplitude));
    }
    let scale = 110.0 / waves.iter().map(|w| w.3).sum::<f64>();

    ImageBuffer::from_fn(width, height, |x, y| {
        let fx = x as f64 / width as f64;
        let fy = y as f64 / height as f64;
        let value: f64 = waves
            .iter()
            .map(|&(kx, ky, phase, amplitude)| {
                amplitude * scale * (2.0 * PI * (kx * fx + ky * fy) + phase).sin()
            })
            .sum();
        Luma([(128.0 + value).round().clamp(0.0, 255.0) as u8])
    })
}

pub(crate) fn textured_grid(width: u32, height: u32, seed: u64) -> PixelGrid {
    PixelGrid::from_luma(textured_luma(width, height, seed)).unwrap()
}

pub(crate) fn encode_png(image: &GrayImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageLuma8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

pub(crate) fn encode_jpeg(image: &GrayImage, quality: u8) -> Vec<u8> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(image)
        .unwrap();
    bytes
}
