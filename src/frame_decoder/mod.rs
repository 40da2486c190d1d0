//! FrameDecoder - Submitted frame payload to RGB pixel grid
//!
//! Payloads arrive as text, usually a data URI
//! (`data:image/jpeg;base64,<payload>`). Everything up to the first comma is
//! dropped, the rest is base64 decoded and handed to the `image` crate.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::RgbImage;

/// Drop the data-URI header, if any
///
/// Only the first comma counts; a payload without one is returned unchanged.
pub fn strip_data_uri(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((_, data)) => data,
        None => payload,
    }
}

/// Decode the base64 part of a payload to raw image bytes
pub fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    // Browsers and some clients wrap long base64 lines
    let data: String = strip_data_uri(payload)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    if data.is_empty() {
        return Err(Error::Decode("empty image payload".to_string()));
    }

    Ok(STANDARD.decode(data.as_bytes())?)
}

/// Decode a payload into an RGB pixel grid
pub fn decode_frame(payload: &str) -> Result<RgbImage> {
    let bytes = decode_payload(payload)?;
    let image = image::load_from_memory(&bytes)?;

    tracing::debug!(
        width = image.width(),
        height = image.height(),
        bytes = bytes.len(),
        "Frame decoded"
    );

    Ok(image.to_rgb8())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    /// A small PNG frame wrapped in a data URI
    pub fn png_data_uri(width: u32, height: u32) -> String {
        let frame = RgbImage::from_pixel(width, height, Rgb([200, 120, 40]));
        let mut bytes = Vec::new();
        frame
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(&bytes))
    }
}
