//! Image marshalling between raw bytes and in-memory rasters

use crate::error::ShellError;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

/// Decode a still image (PNG, JPEG, ...) into a raster
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, ShellError> {
    if bytes.is_empty() {
        return Err(ShellError::Decode("empty image buffer".to_string()));
    }

    let image = image::load_from_memory(bytes).map_err(|e| ShellError::Decode(e.to_string()))?;
    let (width, height) = image.dimensions();
    tracing::debug!(
        "Decoded {}x{} image with {} channel(s)",
        width,
        height,
        image.color().channel_count()
    );
    Ok(image)
}

/// Encode a raster as PNG for display clients
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ShellError> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| ShellError::Internal(format!("Failed to encode PNG: {}", e)))?;
    Ok(buf.into_inner())
}
