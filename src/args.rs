use std::path::PathBuf;

use clap::Parser;

use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(author, version, about = "Webcam hand gestures as a virtual touchpad", long_about = None)]
pub struct Args {
    /// JSON configuration file; missing keys fall back to defaults
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Camera index, overrides the configuration
    #[arg(long)]
    pub camera: Option<u32>,

    /// List available cameras and exit
    #[arg(long)]
    pub list: bool,

    /// Use frames as captured instead of mirrored
    #[arg(long)]
    pub no_mirror: bool,

    /// Log key events instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Handpose ONNX model, overrides the configuration
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Palm detection ONNX model, overrides the configuration
    #[arg(long)]
    pub palm_model: Option<PathBuf>,

    /// Write the effective configuration to --config and exit
    #[arg(long)]
    pub write_default_config: bool,
}

impl Args {
    /// Command-line flags take precedence over the file.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(index) = self.camera {
            config.camera.index = index;
        }
        if self.no_mirror {
            config.camera.mirror = false;
        }
        if let Some(model) = &self.model {
            config.model.handpose_path = model.clone();
        }
        if let Some(palm) = &self.palm_model {
            config.model.palm_path = palm.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_leave_config_untouched() {
        let args = Args::parse_from(["virtual-touchpad"]);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_PATH));
        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert_eq!(config.camera.index, 0);
        assert!(config.camera.mirror);
    }

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "virtual-touchpad",
            "--camera",
            "2",
            "--no-mirror",
            "--model",
            "hands.onnx",
            "--palm-model",
            "palms.onnx",
            "--dry-run",
        ]);
        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert_eq!(config.camera.index, 2);
        assert!(!config.camera.mirror);
        assert_eq!(config.model.handpose_path, PathBuf::from("hands.onnx"));
        assert_eq!(config.model.palm_path, PathBuf::from("palms.onnx"));
        assert!(args.dry_run);
    }
}
