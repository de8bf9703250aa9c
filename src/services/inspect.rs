use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, ColorType, GenericImageView, ImageFormat};
use serde::Serialize;
use std::io::Cursor;

use crate::core::pixels::{DecodeError, ImageDecoder};

/// Basic properties of an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageReport {
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub color_type: String,
    pub is_animated: bool,
    pub size_bytes: usize,
}

pub struct InspectService {
    decoder: ImageDecoder,
}

impl InspectService {
    pub fn new() -> Self {
        Self {
            decoder: ImageDecoder::new(),
        }
    }

    pub fn inspect(&self, bytes: &[u8]) -> Result<ImageReport, DecodeError> {
        let format = ImageDecoder::guess_format(bytes).ok_or_else(|| DecodeError::UnsupportedFormat {
            reason: "unrecognized image signature".to_string(),
        })?;
        let image = self.decoder.decode_image(bytes)?;
        let (width, height) = image.dimensions();

        Ok(ImageReport {
            format: format!("{:?}", format).to_uppercase(),
            width,
            height,
            color_type: color_mode(image.color()),
            is_animated: is_animated(format, bytes),
            size_bytes: bytes.len(),
        })
    }
}

impl Default for InspectService {
    fn default() -> Self {
        Self::new()
    }
}

fn color_mode(color: ColorType) -> String {
    match color {
        ColorType::L8 => "L".to_string(),
        ColorType::L16 => "I;16".to_string(),
        ColorType::La8 | ColorType::La16 => "LA".to_string(),
        ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => "RGB".to_string(),
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA".to_string(),
        other => format!("{:?}", other),
    }
}

fn is_animated(format: ImageFormat, bytes: &[u8]) -> bool {
    match format {
        ImageFormat::Gif => GifDecoder::new(Cursor::new(bytes))
            .map(|decoder| decoder.into_frames().take(2).count() > 1)
            .unwrap_or(false),
        ImageFormat::Png => has_animation_control(bytes),
        _ => false,
    }
}

/// APNG files carry an `acTL` chunk ahead of the first `IDAT`.
fn has_animation_control(bytes: &[u8]) -> bool {
    const SIGNATURE_LEN: usize = 8;
    let mut offset = SIGNATURE_LEN;

    while offset + 8 <= bytes.len() {
        let length = u32::from_be_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]) as usize;
        let kind = &bytes[offset + 4..offset + 8];
        match kind {
            b"acTL" => return true,
            b"IDAT" | b"IEND" => return false,
            _ => {}
        }
        offset = offset.saturating_add(12).saturating_add(length);
    }
    false
}
