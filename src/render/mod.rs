//! Raster preparation for the wallpaper pass: decode, downsample, blur.

use image::imageops::FilterType;
use image::RgbaImage;

use crate::error::Result;

pub mod blur;

pub use blur::{blur, radius_for_intensity, MAX_RADIUS};

/// Longest edge the blur pass operates on. Full downloads can be far larger
/// than any display; the triangle filter gets them to size quickly.
pub const MAX_RENDER_DIM: u32 = 2560;

/// Decode downloaded image bytes and downsample so neither edge exceeds
/// `max_dim`, preserving aspect ratio. Images already within bounds are only
/// converted to RGBA.
pub fn decode_downsampled(bytes: &[u8], max_dim: u32) -> Result<RgbaImage> {
    let decoded = image::load_from_memory(bytes)?;

    let scaled = if decoded.width() > max_dim || decoded.height() > max_dim {
        decoded.resize(max_dim, max_dim, FilterType::Triangle)
    } else {
        decoded
    };

    Ok(scaled.to_rgba8())
}
