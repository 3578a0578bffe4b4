// image crate: flattened RGB -> JPEG / PNG bytes

use crate::error::PdfMergeError;
use image::RgbImage;
use std::io::Cursor;

/// Encode an RGB image to JPEG bytes with the given quality (1-100).
pub fn encode_rgb_to_jpeg(rgb: &RgbImage, quality: u8) -> crate::error::Result<Vec<u8>> {
    if !(1..=100).contains(&quality) {
        return Err(PdfMergeError::encode(format!(
            "JPEG quality must be 1-100, got {}",
            quality
        )));
    }

    let mut buf = Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| PdfMergeError::encode(format!("JPEG encode failed: {e}")))?;

    Ok(buf.into_inner())
}

/// Encode an RGB image to PNG bytes.
pub fn encode_rgb_to_png(rgb: &RgbImage) -> crate::error::Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    rgb.write_with_encoder(encoder)
        .map_err(|e| PdfMergeError::encode(format!("PNG encode failed: {e}")))?;

    Ok(buf.into_inner())
}
