use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageResult, RgbImage};
use serde::Serialize;

/// JPEG quality used for every returned region
pub const JPEG_QUALITY: u8 = 100;

#[derive(Debug, Serialize)]
pub struct SegmentResponse {
    /// Base64-encoded JPEG per region, in detection order
    pub segmented_images: Vec<String>,
    pub count: usize,
}

impl SegmentResponse {
    pub fn new(segmented_images: Vec<String>) -> Self {
        let count = segmented_images.len();
        Self {
            segmented_images,
            count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
}

/// Encode a region as a base64 JPEG string
pub fn encode_region(region: &RgbImage) -> ImageResult<String> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(region)?;
    Ok(STANDARD.encode(jpeg))
}
