mod actions;
mod args;
mod config;
mod controller;
mod desktop;
#[cfg(test)]
mod fixtures;
mod geometry;
mod gesture;
mod lifecycle;
mod model_download;
mod pipeline;
mod ring;
mod trajectory;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;

use actions::{ActionSink, DryRunSink, EnigoSink, Paced};
use args::Args;
use config::AppConfig;
use controller::TouchpadController;
use model_download::{ModelKind, ensure_model_ready};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.list {
        return list_cameras();
    }

    let mut config = AppConfig::load(&args.config)?;
    args.apply(&mut config);

    if args.write_default_config {
        config.save(&args.config)?;
        log::info!("wrote configuration to {}", args.config.display());
        return Ok(());
    }

    for (kind, path) in [
        (ModelKind::PalmDetector, &config.model.palm_path),
        (ModelKind::Handpose, &config.model.handpose_path),
    ] {
        ensure_model_ready(kind, path, |_evt| {}).with_context(|| {
            format!("{} model unavailable at {}", kind.label(), path.display())
        })?;
    }

    let (frame_tx, frame_rx) = bounded(1);
    let (observation_tx, observation_rx) = pipeline::latest_channel();

    let camera = start_camera(&config, frame_tx)?;
    let recognizer = pipeline::start_recognizer(config.model.clone(), frame_rx, observation_tx);

    let sink: Box<dyn ActionSink> = if args.dry_run {
        log::info!("dry run: key events are logged, not sent");
        Box::new(DryRunSink)
    } else {
        let enigo = EnigoSink::new().context("failed to initialise keyboard injection")?;
        Box::new(Paced::new(enigo, config.input.key_spacing()))
    };
    let provider = desktop::default_provider(&config.ring);

    log::info!("virtual touchpad running, show a gesture to the camera");
    TouchpadController::new(&config, provider, sink).run(observation_rx);

    camera.stop();
    if recognizer.join().is_err() {
        log::error!("recognizer thread panicked");
    }
    Ok(())
}

#[cfg(feature = "camera-nokhwa")]
fn list_cameras() -> Result<()> {
    let cameras = pipeline::available_cameras()?;
    println!("{:<5} | {}", "Index", "Name");
    println!("{}", "-".repeat(40));
    for cam in cameras {
        println!("{:<5} | {}", cam.index, cam.label);
    }
    Ok(())
}

#[cfg(feature = "camera-nokhwa")]
fn start_camera(
    config: &AppConfig,
    frame_tx: crossbeam_channel::Sender<types::Frame>,
) -> Result<pipeline::CameraStream> {
    let index = nokhwa::utils::CameraIndex::Index(config.camera.index);
    pipeline::start_camera_stream(index, config.camera.mirror, frame_tx)
        .with_context(|| format!("failed to open camera {}", config.camera.index))
}

#[cfg(not(feature = "camera-nokhwa"))]
fn list_cameras() -> Result<()> {
    anyhow::bail!("built without camera support (enable the `camera-nokhwa` feature)")
}

#[cfg(not(feature = "camera-nokhwa"))]
fn start_camera(
    _config: &AppConfig,
    _frame_tx: crossbeam_channel::Sender<types::Frame>,
) -> Result<NoCamera> {
    anyhow::bail!("built without camera support (enable the `camera-nokhwa` feature)")
}

#[cfg(not(feature = "camera-nokhwa"))]
struct NoCamera;

#[cfg(not(feature = "camera-nokhwa"))]
impl NoCamera {
    fn stop(self) {}
}
