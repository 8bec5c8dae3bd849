//! Downsample → JPEG → data URI.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use thiserror::Error;

use crate::config::FrameConfig;

pub const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("frame has zero size")]
    Empty,

    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),
}

/// A compressed frame ready for the push channel.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
    /// Size of the JPEG before base64.
    pub jpeg_bytes: usize,
}

impl EncodedFrame {
    /// Outbound push message: `{"image_data": "data:image/jpeg;base64,..."}`.
    pub fn to_message(&self) -> String {
        serde_json::json!({ "image_data": self.data_uri }).to_string()
    }
}

#[derive(Debug, Clone)]
pub struct FrameEncoder {
    target_width: u32,
    quality: u8,
}

impl FrameEncoder {
    pub fn new(target_width: u32, quality: u8) -> Self {
        Self {
            target_width: target_width.max(1),
            quality: quality.clamp(1, 100),
        }
    }

    pub fn from_config(config: &FrameConfig) -> Self {
        Self::new(config.target_width, config.jpeg_quality)
    }

    /// Output size for a `width × height` input: frames wider than the
    /// target are scaled down with the aspect ratio kept; narrower frames
    /// pass through.
    pub fn output_size(&self, width: u32, height: u32) -> (u32, u32) {
        if width <= self.target_width {
            return (width, height);
        }
        let h = (height as u64 * self.target_width as u64 / width as u64).max(1) as u32;
        (self.target_width, h)
    }

    pub fn encode(&self, frame: &DynamicImage) -> Result<EncodedFrame, EncodeError> {
        let (w, h) = frame.dimensions();
        if w == 0 || h == 0 {
            return Err(EncodeError::Empty);
        }
        let (tw, th) = self.output_size(w, h);
        let rgb = if (tw, th) == (w, h) {
            frame.to_rgb8()
        } else {
            frame.resize_exact(tw, th, FilterType::Triangle).to_rgb8()
        };

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode_image(&rgb)?;

        let mut data_uri = String::with_capacity(DATA_URI_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
        data_uri.push_str(DATA_URI_PREFIX);
        STANDARD.encode_string(&jpeg, &mut data_uri);

        Ok(EncodedFrame {
            data_uri,
            width: tw,
            height: th,
            jpeg_bytes: jpeg.len(),
        })
    }
}
