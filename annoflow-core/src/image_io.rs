//! Decoding of embedded image payloads and PNG side-file output.

use std::path::Path;

use base64::{engine::general_purpose, Engine as _};
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::error::{AnnoflowError, Result};

/// Decodes a base64 string holding an encoded image (PNG, JPEG) into a pixel buffer.
///
/// `file_name` only labels errors.
pub fn decode_base64_image(encoded: &str, file_name: &str) -> Result<DynamicImage> {
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|err| AnnoflowError::image_decode(file_name, err.to_string()))?;
    image::load_from_memory(&bytes).map_err(|err| AnnoflowError::image_decode(file_name, err.to_string()))
}

/// Writes a pixel buffer as PNG, replacing any existing file.
pub fn write_png(image: &DynamicImage, path: &Path) -> Result<()> {
    debug!(path = %path.display(), width = image.width(), height = image.height(), "writing png");
    image.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

/// Encodes a pixel buffer as base64 PNG, the inverse of [`decode_base64_image`].
pub fn encode_base64_png(image: &DynamicImage) -> Result<String> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(general_purpose::STANDARD.encode(bytes.into_inner()))
}
