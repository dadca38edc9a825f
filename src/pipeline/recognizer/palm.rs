use std::{
    cmp::Ordering,
    f32::consts::{FRAC_PI_2, PI, TAU},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::common::{
    CropTransform, INPUT_SIZE, LetterboxInfo, PALM_INPUT_SIZE, prepare_frame_with_size,
};
use crate::types::{Frame, Point2D};

const PALM_KEYPOINTS: usize = 7;
const WRIST_KEYPOINT: usize = 0;
const MIDDLE_KNUCKLE_KEYPOINT: usize = 2;
/// Box centre and size, then the keypoints, per anchor.
const BOX_FEATURES: usize = 4 + PALM_KEYPOINTS * 2;

/// Hand crop side in palm-box sizes, and how far its centre sits from the
/// palm towards the fingers in palm-box heights.
const CROP_SCALE: f32 = 2.6;
const CROP_SHIFT: f32 = 0.5;

#[derive(Clone, Debug)]
pub struct PalmDetectorConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub top_k: usize,
}

impl Default for PalmDetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            nms_threshold: 0.3,
            top_k: 8,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PalmRegion {
    /// `[x1, y1, x2, y2]` in frame pixels.
    pub bbox: [f32; 4],
    pub keypoints: Vec<Point2D>,
    pub score: f32,
}

impl PalmRegion {
    fn width(&self) -> f32 {
        self.bbox[2] - self.bbox[0]
    }

    fn height(&self) -> f32 {
        self.bbox[3] - self.bbox[1]
    }

    fn center(&self) -> Point2D {
        Point2D::new(
            (self.bbox[0] + self.bbox[2]) * 0.5,
            (self.bbox[1] + self.bbox[3]) * 0.5,
        )
    }

    /// Rotation that turns the wrist to middle-knuckle direction upright.
    pub fn rotation(&self) -> f32 {
        let (Some(wrist), Some(knuckle)) = (
            self.keypoints.get(WRIST_KEYPOINT),
            self.keypoints.get(MIDDLE_KNUCKLE_KEYPOINT),
        ) else {
            return 0.0;
        };
        let heading = (wrist.y - knuckle.y).atan2(knuckle.x - wrist.x);
        wrap_angle(FRAC_PI_2 - heading)
    }

    /// Upright square around the whole hand, sized for the handpose model.
    pub fn hand_crop(&self, frame_w: u32, frame_h: u32) -> CropTransform {
        let angle = self.rotation();
        let (sin, cos) = angle.sin_cos();
        let shift = -CROP_SHIFT * self.height();
        let palm = self.center();

        CropTransform {
            center: Point2D::new(palm.x - shift * sin, palm.y + shift * cos),
            side: self.width().max(self.height()) * CROP_SCALE,
            angle,
            output_size: INPUT_SIZE,
            frame_w,
            frame_h,
        }
    }
}

/// MediaPipe palm detector (192px, SSD anchors) through ONNX Runtime.
pub struct PalmDetector {
    session: Session,
    anchors: Vec<Point2D>,
    cfg: PalmDetectorConfig,
}

impl PalmDetector {
    pub fn new(model_path: &Path, cfg: PalmDetectorConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load palm detector from {}", model_path.display()))?;

        Ok(Self {
            session,
            anchors: palm_anchors(),
            cfg,
        })
    }

    /// Palms in `frame`, best score first.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<PalmRegion>> {
        let (input, letterbox) = prepare_frame_with_size(frame, PALM_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run palm detector session")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "palm detector returned {} outputs, expected boxes and scores",
                outputs.len()
            ));
        }

        let boxes: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        let scores: Vec<f32> = outputs[1].try_extract_array::<f32>()?.iter().copied().collect();

        let candidates = decode_regions(
            &boxes,
            &scores,
            &self.anchors,
            &letterbox,
            self.cfg.score_threshold,
        )?;
        Ok(non_max_suppression(
            candidates,
            self.cfg.nms_threshold,
            self.cfg.top_k,
        ))
    }
}

/// SSD anchor centres of the 192px model: a 24x24 grid with two anchors per
/// cell followed by a 12x12 grid with six.
fn palm_anchors() -> Vec<Point2D> {
    let input = PALM_INPUT_SIZE as usize;
    [(8usize, 2usize), (16, 6)]
        .into_iter()
        .flat_map(|(stride, per_cell)| {
            let grid = input.div_ceil(stride);
            (0..grid).flat_map(move |y| {
                (0..grid).flat_map(move |x| {
                    let centre = Point2D::new(
                        (x as f32 + 0.5) / grid as f32,
                        (y as f32 + 0.5) / grid as f32,
                    );
                    std::iter::repeat_n(centre, per_cell)
                })
            })
        })
        .collect()
}

/// Turns raw anchor offsets (model-input pixels) into frame-space palms.
fn decode_regions(
    boxes: &[f32],
    scores: &[f32],
    anchors: &[Point2D],
    letterbox: &LetterboxInfo,
    score_threshold: f32,
) -> Result<Vec<PalmRegion>> {
    if scores.len() != anchors.len() || boxes.len() != anchors.len() * BOX_FEATURES {
        return Err(anyhow!(
            "palm detector output does not match {} anchors: {} box values, {} scores",
            anchors.len(),
            boxes.len(),
            scores.len()
        ));
    }

    let input = PALM_INPUT_SIZE as f32;
    let max_x = letterbox.orig_w.saturating_sub(1) as f32;
    let max_y = letterbox.orig_h.saturating_sub(1) as f32;

    let regions = boxes
        .chunks_exact(BOX_FEATURES)
        .zip(scores)
        .zip(anchors)
        .filter_map(|((raw, &logit), anchor)| {
            let score = sigmoid(logit);
            if score < score_threshold {
                return None;
            }

            let origin = Point2D::new(anchor.x * input, anchor.y * input);
            let (cx, cy) = (origin.x + raw[0], origin.y + raw[1]);
            let (hw, hh) = (raw[2] * 0.5, raw[3] * 0.5);
            let top_left = letterbox.frame_point(cx - hw, cy - hh);
            let bottom_right = letterbox.frame_point(cx + hw, cy + hh);
            let bbox = [
                top_left.x.clamp(0.0, max_x),
                top_left.y.clamp(0.0, max_y),
                bottom_right.x.clamp(0.0, max_x),
                bottom_right.y.clamp(0.0, max_y),
            ];
            if bbox[2] <= bbox[0] || bbox[3] <= bbox[1] {
                return None;
            }

            let keypoints = raw[4..]
                .chunks_exact(2)
                .map(|kp| letterbox.frame_point(origin.x + kp[0], origin.y + kp[1]))
                .collect();

            Some(PalmRegion {
                bbox,
                keypoints,
                score,
            })
        })
        .collect();

    Ok(regions)
}

fn non_max_suppression(
    mut candidates: Vec<PalmRegion>,
    iou_threshold: f32,
    top_k: usize,
) -> Vec<PalmRegion> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut kept: Vec<PalmRegion> = Vec::new();
    for candidate in candidates {
        if kept.len() >= top_k {
            break;
        }
        if kept
            .iter()
            .all(|k| iou(&k.bbox, &candidate.bbox) < iou_threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter <= 0.0 {
        return 0.0;
    }

    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Into `[-PI, PI)`.
fn wrap_angle(angle: f32) -> f32 {
    angle - TAU * ((angle + PI) / TAU).floor()
}
