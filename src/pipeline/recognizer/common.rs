use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::{Frame, NUM_LANDMARKS, Point2D};

pub const INPUT_SIZE: u32 = 224;
pub const PALM_INPUT_SIZE: u32 = 192;

/// Maps model-input pixels back onto the source frame.
#[derive(Clone, Debug, PartialEq)]
pub struct LetterboxInfo {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

/// Resizes `frame` to fit a `target_size` square, pads the rest black, and
/// returns it as an NHWC tensor in `[0, 1]`.
pub fn prepare_frame_with_size(
    frame: &Frame,
    target_size: u32,
) -> Result<(Array4<f32>, LetterboxInfo)> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.rgba.len() != expected_len || expected_len == 0 {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgba.len(),
            expected_len
        ));
    }

    let letterbox = letterbox_for(frame.width, frame.height, target_size);
    let new_w = (frame.width as f32 * letterbox.scale).round().max(1.0) as u32;
    let new_h = (frame.height as f32 * letterbox.scale).round().max(1.0) as u32;

    let src_image = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst_image = fir::images::Image::new(new_w, new_h, fir::PixelType::U8x4);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;
    let resized = dst_image.into_vec();

    let side = target_size as usize;
    let (pad_x, pad_y) = (letterbox.pad_x as usize, letterbox.pad_y as usize);
    let mut canvas = vec![0u8; side * side * 4];
    let dst_stride = side * 4;
    let src_stride = new_w as usize * 4;
    for row in 0..(new_h as usize).min(side - pad_y) {
        let dst_offset = (pad_y + row) * dst_stride + pad_x * 4;
        let src_offset = row * src_stride;
        let len = src_stride.min(dst_stride - pad_x * 4);
        canvas[dst_offset..dst_offset + len]
            .copy_from_slice(&resized[src_offset..src_offset + len]);
    }

    let normalized: Vec<f32> = canvas
        .par_chunks_exact(4)
        .flat_map_iter(|px| {
            [
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            ]
        })
        .collect();
    let input = Array4::<f32>::from_shape_vec((1, side, side, 3), normalized)
        .map_err(|err| anyhow!("failed to build input tensor: {err}"))?;

    Ok((input, letterbox))
}

impl LetterboxInfo {
    /// Model-input pixel to source-frame pixel.
    pub fn frame_point(&self, x: f32, y: f32) -> Point2D {
        Point2D::new((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

pub fn letterbox_for(width: u32, height: u32, target_size: u32) -> LetterboxInfo {
    let scale = target_size as f32 / (width.max(height).max(1) as f32);
    let new_w = (width as f32 * scale).round().max(1.0) as i64;
    let new_h = (height as f32 * scale).round().max(1.0) as i64;
    LetterboxInfo {
        scale,
        pad_x: ((target_size as i64 - new_w) / 2).max(0) as f32,
        pad_y: ((target_size as i64 - new_h) / 2).max(0) as f32,
        orig_w: width,
        orig_h: height,
    }
}

/// First 21 `(x, y, z)` triples of a flat model output.
pub fn decode_landmarks(flat: &[f32]) -> Result<Vec<[f32; 3]>> {
    if flat.len() < NUM_LANDMARKS * 3 {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            flat.len(),
            NUM_LANDMARKS * 3
        ));
    }

    Ok(flat
        .chunks_exact(3)
        .take(NUM_LANDMARKS)
        .map(|chunk| [chunk[0], chunk[1], chunk[2]])
        .collect())
}

/// Square window onto the frame, `side` pixels wide in frame space and
/// rotated by `angle` about `center`, resampled to `output_size` pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropTransform {
    pub center: Point2D,
    pub side: f32,
    pub angle: f32,
    pub output_size: u32,
    pub frame_w: u32,
    pub frame_h: u32,
}

impl CropTransform {
    /// Crop pixel to frame pixel.
    pub fn frame_point(&self, x: f32, y: f32) -> Point2D {
        let half = self.output_size as f32 / 2.0;
        let scale = self.side / self.output_size as f32;
        let (dx, dy) = ((x - half) * scale, (y - half) * scale);
        let (sin, cos) = self.angle.sin_cos();
        Point2D::new(
            self.center.x + dx * cos - dy * sin,
            self.center.y + dx * sin + dy * cos,
        )
    }

    /// Crop-space landmarks to `[0, 1]` of the frame, clamped to its edges.
    pub fn normalize(&self, landmarks: &[[f32; 3]]) -> Vec<Point2D> {
        let max_x = self.frame_w.saturating_sub(1) as f32;
        let max_y = self.frame_h.saturating_sub(1) as f32;
        let (w, h) = (self.frame_w.max(1) as f32, self.frame_h.max(1) as f32);

        landmarks
            .iter()
            .map(|[x, y, _z]| {
                let p = self.frame_point(*x, *y);
                Point2D::new(p.x.clamp(0.0, max_x) / w, p.y.clamp(0.0, max_y) / h)
            })
            .collect()
    }
}

/// Samples the crop described by `transform` as an NHWC tensor in `[0, 1]`.
/// Pixels outside the frame are black.
pub fn prepare_rotated_crop(frame: &Frame, transform: &CropTransform) -> Result<Array4<f32>> {
    let expected_len = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.rgba.len() != expected_len || expected_len == 0 {
        return Err(anyhow!(
            "frame buffer size mismatch: got {}, expected {}",
            frame.rgba.len(),
            expected_len
        ));
    }
    if !(transform.side.is_finite() && transform.side > 0.0) {
        return Err(anyhow!("invalid crop side {}", transform.side));
    }

    let size = transform.output_size as usize;
    let data: Vec<f32> = (0..size)
        .into_par_iter()
        .flat_map_iter(|y| {
            (0..size).flat_map(move |x| {
                let src = transform.frame_point(x as f32 + 0.5, y as f32 + 0.5);
                sample_bilinear(frame, src.x - 0.5, src.y - 0.5)
            })
        })
        .collect();

    Array4::<f32>::from_shape_vec((1, size, size, 3), data)
        .map_err(|err| anyhow!("failed to build crop tensor: {err}"))
}

fn sample_bilinear(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if !x.is_finite() || !y.is_finite() {
        return [0.0; 3];
    }
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);

    let mut out = [0.0f32; 3];
    for (oy, wy) in [(0, 1.0 - fy), (1, fy)] {
        for (ox, wx) in [(0, 1.0 - fx), (1, fx)] {
            let weight = wx * wy;
            if weight == 0.0 {
                continue;
            }
            if let Some(px) = pixel(frame, x0 as i64 + ox, y0 as i64 + oy) {
                for (acc, channel) in out.iter_mut().zip(px) {
                    *acc += weight * *channel as f32 / 255.0;
                }
            }
        }
    }
    out
}

fn pixel(frame: &Frame, x: i64, y: i64) -> Option<&[u8]> {
    if x < 0 || y < 0 || x >= frame.width as i64 || y >= frame.height as i64 {
        return None;
    }
    let idx = (y as usize * frame.width as usize + x as usize) * 4;
    frame.rgba.get(idx..idx + 3)
}
