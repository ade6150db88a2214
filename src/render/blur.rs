//! Approximate Gaussian blur over an RGBA raster.
//!
//! Two separable passes (horizontal, then vertical) of a sliding
//! triangular-weighted window: the window keeps a weighted total plus the
//! plain sums of its incoming and outgoing halves, so advancing one pixel is
//! a constant-time update. Cost is O(width × height) regardless of radius.
//! Out-of-bounds taps clamp to the edge pixel; alpha is copied through
//! untouched.

use image::RgbaImage;

/// Radius used at 100% intensity.
pub const MAX_RADIUS: u32 = 25;

/// Map a 0..=100 intensity to a window radius. Only meaningful for nonzero
/// intensity; `blur` short-circuits zero before calling this.
pub fn radius_for_intensity(intensity_percent: u32) -> u32 {
    let scaled = (intensity_percent.min(100) as f32 / 100.0 * MAX_RADIUS as f32).round() as u32;
    scaled.clamp(1, MAX_RADIUS)
}

/// Blur a copy of `source`. Zero intensity returns the input unchanged; the
/// input raster is never mutated.
pub fn blur(source: &RgbaImage, intensity_percent: u32) -> RgbaImage {
    if intensity_percent == 0 {
        return source.clone();
    }

    let (width, height) = source.dimensions();
    if width == 0 || height == 0 {
        return source.clone();
    }

    let radius = radius_for_intensity(intensity_percent);

    // Pass 1: rows of `source` into `horizontal`.
    let mut horizontal = source.clone();
    blur_lines(
        source.as_raw(),
        &mut horizontal,
        height,
        width,
        radius,
        |line, i| ((line * width + i) * 4) as usize,
    );

    // Pass 2: columns of `horizontal` into the output.
    let mut output = horizontal.clone();
    blur_lines(
        horizontal.as_raw(),
        &mut output,
        width,
        height,
        radius,
        |line, i| ((i * width + line) * 4) as usize,
    );

    output
}

/// One blur pass over `lines` independent lines of `length` pixels each.
/// `offset_of(line, i)` maps a line and a position within it to the byte
/// offset of that pixel's red channel.
fn blur_lines(
    src: &[u8],
    dst: &mut [u8],
    lines: u32,
    length: u32,
    radius: u32,
    offset_of: impl Fn(u32, u32) -> usize,
) {
    let r = radius as i64;
    let len = length as i64;
    let denom = (radius + 1) * (radius + 1);
    let clamp_index = |i: i64| i.clamp(0, len - 1) as u32;

    for line in 0..lines {
        let rgb_at = |i: i64| -> [u32; 3] {
            let offset = offset_of(line, clamp_index(i));
            [
                src[offset] as u32,
                src[offset + 1] as u32,
                src[offset + 2] as u32,
            ]
        };

        // Prime the window centered on position 0. Weights form a triangle
        // peaking at the center; their total is (radius + 1)^2.
        let mut sum = [0u32; 3];
        let mut sum_in = [0u32; 3];
        let mut sum_out = [0u32; 3];
        for i in -r..=r {
            let pixel = rgb_at(i);
            let weight = (r + 1 - i.abs()) as u32;
            for channel in 0..3 {
                sum[channel] += pixel[channel] * weight;
                if i > 0 {
                    sum_in[channel] += pixel[channel];
                } else {
                    sum_out[channel] += pixel[channel];
                }
            }
        }

        for i in 0..len {
            let offset = offset_of(line, i as u32);
            for channel in 0..3 {
                dst[offset + channel] = ((sum[channel] + denom / 2) / denom) as u8;
            }
            dst[offset + 3] = src[offset + 3];

            let entering = rgb_at(i + r + 1);
            let center = rgb_at(i + 1);
            let leaving = rgb_at(i - r);
            for channel in 0..3 {
                sum[channel] = sum[channel] + sum_in[channel] + entering[channel]
                    - sum_out[channel];
                sum_in[channel] = sum_in[channel] + entering[channel] - center[channel];
                sum_out[channel] = sum_out[channel] + center[channel] - leaving[channel];
            }
        }
    }
}
