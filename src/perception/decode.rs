use image::{ImageFormat, RgbImage};

use crate::error::DecodeError;

/// A decoded RGB pixel matrix.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub format: Option<ImageFormat>,
    pub pixels: RgbImage,
}

impl DecodedFrame {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// All-black frame, for adapters that ignore pixel content.
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            format: None,
            pixels: RgbImage::new(width, height),
        }
    }
}

/// Decode one compressed image. Fails on empty, unrecognised, or truncated
/// input; never returns a partially decoded frame.
pub fn decode_frame(bytes: &[u8]) -> Result<DecodedFrame, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }

    let format = image::guess_format(bytes).map_err(|_| DecodeError::UnknownFormat)?;
    let img = image::load_from_memory_with_format(bytes, format)?;

    Ok(DecodedFrame {
        format: Some(format),
        pixels: img.to_rgb8(),
    })
}
