use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    actions::{KeyChord, KeyName},
    geometry::DEFAULT_STRAIGHTNESS,
    model_download::ModelKind,
    types::GestureLabel,
};

pub const DEFAULT_CONFIG_PATH: &str = "touchpad.json";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("gesture `{0}` appears more than once in the classifier priority list")]
    DuplicatePriority(GestureLabel),
    #[error("ring fixed_size must be at least 1")]
    EmptyRing,
    #[error("model.max_hands must be at least 1")]
    NoHands,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub model: ModelConfig,
    pub classifier: ClassifierConfig,
    pub lifecycle: LifecycleConfig,
    pub swipe: SwipeConfig,
    pub ring: RingConfig,
    pub input: InputConfig,
    pub bindings: Bindings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    /// Flip frames horizontally so moving the hand right moves right on screen.
    pub mirror: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub handpose_path: PathBuf,
    pub palm_path: PathBuf,
    pub min_confidence: f32,
    /// Palm detections below this score never reach the handpose model.
    pub palm_score_threshold: f32,
    /// Palms run through the handpose model per frame, highest score first.
    pub max_hands: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub straightness_threshold: f32,
    /// Normalized thumb-tip to index-tip distance below which they touch.
    pub ok_tip_distance: f32,
    pub two_parallel_min: f32,
    pub two_antiparallel_max: f32,
    pub two_requires_bent_ring: bool,
    /// Evaluation order; gestures left out are never reported.
    pub priority: Vec<GestureLabel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub cancel_cooldown_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SwipeConfig {
    pub window_ms: u64,
    /// Horizontal speed in palm widths per second.
    pub speed_threshold: f32,
    pub horizontal_ratio: f32,
    pub trigger_cooldown_ms: u64,
    pub require_crossing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Ring travel is `frame_width / spread`, split evenly across the windows.
    pub spread: f32,
    pub min_unit_pixels: f32,
    /// Skip window enumeration and assume this many windows.
    pub fixed_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub key_spacing_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GestureRole {
    Swipe { left: KeyChord, right: KeyChord },
    Ring,
    Ignore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Bindings {
    pub two: GestureRole,
    pub ok: GestureRole,
    pub three: GestureRole,
    pub four: GestureRole,
}

impl Bindings {
    pub fn role(&self, label: GestureLabel) -> &GestureRole {
        match label {
            GestureLabel::Two => &self.two,
            GestureLabel::Ok => &self.ok,
            GestureLabel::Three => &self.three,
            GestureLabel::Four => &self.four,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            mirror: true,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            handpose_path: ModelKind::Handpose.default_path(),
            palm_path: ModelKind::PalmDetector.default_path(),
            min_confidence: 0.5,
            palm_score_threshold: 0.5,
            max_hands: 2,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            straightness_threshold: DEFAULT_STRAIGHTNESS,
            ok_tip_distance: 0.07,
            two_parallel_min: 0.5,
            two_antiparallel_max: -0.6,
            two_requires_bent_ring: true,
            priority: vec![
                GestureLabel::Two,
                GestureLabel::Ok,
                GestureLabel::Three,
                GestureLabel::Four,
            ],
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            cancel_cooldown_ms: 800,
        }
    }
}

impl Default for SwipeConfig {
    fn default() -> Self {
        Self {
            window_ms: 500,
            speed_threshold: 4.0,
            horizontal_ratio: 0.6,
            trigger_cooldown_ms: 1_000,
            require_crossing: true,
        }
    }
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            spread: 1.3,
            min_unit_pixels: 24.0,
            fixed_size: None,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { key_spacing_ms: 40 }
    }
}

impl Default for Bindings {
    fn default() -> Self {
        Self {
            two: GestureRole::Swipe {
                left: KeyChord::new(&[KeyName::Alt], KeyName::Left),
                right: KeyChord::new(&[KeyName::Alt], KeyName::Right),
            },
            ok: GestureRole::Ring,
            three: GestureRole::Swipe {
                left: KeyChord::new(&[KeyName::Control, KeyName::Meta], KeyName::Left),
                right: KeyChord::new(&[KeyName::Control, KeyName::Meta], KeyName::Right),
            },
            four: GestureRole::Ignore,
        }
    }
}

impl LifecycleConfig {
    pub fn cancel_cooldown(&self) -> Duration {
        Duration::from_millis(self.cancel_cooldown_ms)
    }
}

impl SwipeConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn trigger_cooldown(&self) -> Duration {
        Duration::from_millis(self.trigger_cooldown_ms)
    }
}

impl InputConfig {
    pub fn key_spacing(&self) -> Duration {
        Duration::from_millis(self.key_spacing_ms)
    }
}

fn check_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.classifier;
        check_range("classifier.straightness_threshold", c.straightness_threshold, -1.0, 1.0)?;
        check_range("classifier.ok_tip_distance", c.ok_tip_distance, 0.0, 1.0)?;
        check_range("classifier.two_parallel_min", c.two_parallel_min, -1.0, 1.0)?;
        check_range("classifier.two_antiparallel_max", c.two_antiparallel_max, -1.0, 1.0)?;
        for (i, label) in c.priority.iter().enumerate() {
            if c.priority[..i].contains(label) {
                return Err(ConfigError::DuplicatePriority(*label));
            }
        }

        if self.lifecycle.cancel_cooldown_ms == 0 {
            return Err(ConfigError::ZeroDuration("lifecycle.cancel_cooldown_ms"));
        }
        if self.swipe.window_ms == 0 {
            return Err(ConfigError::ZeroDuration("swipe.window_ms"));
        }
        check_range("swipe.speed_threshold", self.swipe.speed_threshold, 0.0, f32::MAX)?;
        check_range("swipe.horizontal_ratio", self.swipe.horizontal_ratio, 0.0, f32::MAX)?;

        check_range("ring.spread", self.ring.spread, f32::EPSILON, f32::MAX)?;
        check_range("ring.min_unit_pixels", self.ring.min_unit_pixels, 1.0, f32::MAX)?;
        if self.ring.fixed_size == Some(0) {
            return Err(ConfigError::EmptyRing);
        }

        check_range("model.min_confidence", self.model.min_confidence, 0.0, 1.0)?;
        check_range(
            "model.palm_score_threshold",
            self.model.palm_score_threshold,
            0.0,
            1.0,
        )?;
        if self.model.max_hands == 0 {
            return Err(ConfigError::NoHands);
        }
        Ok(())
    }

    /// Reads `path`, falling back to defaults when the file is missing or
    /// unreadable as JSON. Values are validated either way.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            match serde_json::from_str::<AppConfig>(&content) {
                Ok(config) => {
                    log::info!("loaded configuration from {}", path.display());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "failed to parse {}: {err}; using default configuration",
                        path.display()
                    );
                    Self::default()
                }
            }
        } else {
            log::info!(
                "no configuration at {}, using defaults",
                path.display()
            );
            Self::default()
        };

        config
            .validate()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("failed to write config {}", path.display()))?;
        Ok(())
    }
}
