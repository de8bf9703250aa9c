use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat, ImageReader};
use std::io::Cursor;
use thiserror::Error;

use crate::core::error::FingerprintError;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },

    #[error(transparent)]
    InvalidInput(#[from] FingerprintError),
}

/// Single-channel 8-bit luminance matrix, never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    image: GrayImage,
}

impl PixelGrid {
    /// Build a grid from a row-major luma buffer.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, FingerprintError> {
        if width == 0 || height == 0 {
            return Err(FingerprintError::invalid_input(format!(
                "pixel grid must not be empty (got {}x{})",
                width, height
            )));
        }

        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(FingerprintError::invalid_input(format!(
                "pixel buffer holds {} values, expected {} for {}x{}",
                pixels.len(),
                expected,
                width,
                height
            )));
        }

        let image = GrayImage::from_raw(width, height, pixels)
            .ok_or_else(|| FingerprintError::invalid_input("pixel buffer does not fit grid"))?;
        Ok(Self { image })
    }

    pub fn from_luma(image: GrayImage) -> Result<Self, FingerprintError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(FingerprintError::invalid_input("decoded image has no pixels"));
        }
        Ok(Self { image })
    }

    /// Convert any decoded image to luminance.
    pub fn from_image(image: &DynamicImage) -> Result<Self, FingerprintError> {
        Self::from_luma(image.to_luma8())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.image.get_pixel(x, y).0[0]
    }

    pub fn as_luma(&self) -> &GrayImage {
        &self.image
    }
}

/// Turns raw bytes into a pixel grid.
pub trait PixelSource {
    fn decode(&self, bytes: &[u8]) -> Result<PixelGrid, DecodeError>;
}

/// `PixelSource` backed by the `image` crate's decoders.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder;

impl ImageDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Sniff the container format from magic bytes.
    pub fn guess_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    pub fn decode_image(&self, bytes: &[u8]) -> Result<DynamicImage, DecodeError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| DecodeError::UnsupportedFormat {
                reason: e.to_string(),
            })?;

        if reader.format().is_none() {
            return Err(DecodeError::UnsupportedFormat {
                reason: "unrecognized image signature".to_string(),
            });
        }

        reader.decode().map_err(|e| DecodeError::UnsupportedFormat {
            reason: e.to_string(),
        })
    }
}

impl PixelSource for ImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<PixelGrid, DecodeError> {
        let image = self.decode_image(bytes)?;
        log::debug!(
            "decoded {}x{} image ({:?})",
            image.width(),
            image.height(),
            image.color()
        );
        Ok(PixelGrid::from_image(&image)?)
    }
}
