use image::ImageFormat;
use std::fs;
use std::io;
use std::path::Path;

pub const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// Binary content with its declared media type, as received at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    /// Read a file, declaring `media_type` or one derived from its extension.
    pub fn from_path(path: &Path, media_type: Option<&str>) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let media_type = media_type
            .map(str::to_string)
            .unwrap_or_else(|| media_type_for_path(path));

        Ok(Self {
            name: path.display().to_string(),
            media_type,
            bytes,
        })
    }

    pub fn is_image(&self) -> bool {
        self.media_type
            .trim()
            .to_ascii_lowercase()
            .starts_with("image/")
    }
}

pub fn media_type_for_path(path: &Path) -> String {
    ImageFormat::from_path(path)
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| FALLBACK_MEDIA_TYPE.to_string())
}
