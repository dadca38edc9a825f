use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    DetectedHand, HandposeEngine, common,
    palm::{PalmDetector, PalmDetectorConfig, PalmRegion},
};
use crate::types::{Frame, HandLandmarks};

/// Palm detection followed by the MediaPipe handpose estimator on an upright
/// crop around each palm, both through ONNX Runtime.
pub struct OrtEngine {
    handpose: Session,
    palm_detector: PalmDetector,
    max_hands: usize,
}

impl OrtEngine {
    pub fn new(
        handpose_path: &Path,
        palm_path: &Path,
        palm_config: PalmDetectorConfig,
        max_hands: usize,
    ) -> Result<Self> {
        let handpose = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(handpose_path)
            .with_context(|| {
                format!("failed to load ORT session from {}", handpose_path.display())
            })?;

        let palm_detector = PalmDetector::new(palm_path, palm_config)?;

        Ok(Self {
            handpose,
            palm_detector,
            max_hands,
        })
    }

    fn estimate(&mut self, frame: &Frame, palm: &PalmRegion) -> Result<Option<DetectedHand>> {
        let crop = palm.hand_crop(frame.width, frame.height);
        let input = common::prepare_rotated_crop(frame, &crop)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .handpose
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("model returned no outputs"));
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let raw = common::decode_landmarks(&flattened)?;

        let confidence = if outputs.len() > 1 {
            outputs[1]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        } else {
            0.0
        };

        let points = crop.normalize(&raw);
        Ok(HandLandmarks::from_points(&points).map(|landmarks| DetectedHand {
            landmarks,
            confidence: (confidence * palm.score).clamp(0.0, 1.0),
        }))
    }
}

impl HandposeEngine for OrtEngine {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<DetectedHand>> {
        let palms = self.palm_detector.detect(frame)?;
        if palms.is_empty() {
            return Ok(Vec::new());
        }

        let mut hands = Vec::with_capacity(palms.len().min(self.max_hands));
        for palm in palms.iter().take(self.max_hands) {
            if let Some(hand) = self.estimate(frame, palm)? {
                hands.push(hand);
            }
        }
        log::debug!("{} palm(s), {} hand(s)", palms.len(), hands.len());
        Ok(hands)
    }
}
