use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Sender, TrySendError};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
};
use rayon::prelude::*;

use crate::types::Frame;

// Uncompressed formats first; MJPEG decoding costs more per frame than the
// landmark model saves by getting a sharper image.
const CAPTURE_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

/// Running capture thread. Dropping it stops capture and joins the thread.
#[derive(Debug)]
pub struct CameraStream {
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl CameraStream {
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("camera thread panicked");
            }
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.halt();
    }
}

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let devices = query(ApiBackend::Auto).context("failed to enumerate cameras")?;
    Ok(devices
        .into_iter()
        .map(|info| {
            let description = info.description();
            let label = if description.is_empty() {
                info.human_name()
            } else {
                format!("{} ({description})", info.human_name())
            };
            CameraDevice {
                index: info.index().clone(),
                label,
            }
        })
        .collect())
}

fn open_camera(index: &CameraIndex) -> Result<Camera> {
    let attempts = [
        RequestedFormat::with_formats(RequestedFormatType::AbsoluteHighestFrameRate, CAPTURE_FORMATS),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ];

    let mut failure = None;
    for requested in attempts {
        let opened = Camera::new(index.clone(), requested)
            .and_then(|mut camera| camera.open_stream().map(|()| camera));
        match opened {
            Ok(camera) => return Ok(camera),
            Err(err) => {
                log::debug!("camera {index} rejected a requested format: {err}");
                failure = Some(err);
            }
        }
    }

    Err(failure.map_or_else(
        || anyhow!("camera {index} offers no usable format"),
        |err| anyhow!("camera {index} could not be opened: {err}"),
    ))
}

/// Starts capturing from `index`. The device is probed on the calling thread
/// so an unusable camera fails here rather than inside the worker.
pub fn start_camera_stream(
    index: CameraIndex,
    mirror: bool,
    frame_tx: Sender<Frame>,
) -> Result<CameraStream> {
    drop(open_camera(&index)?);

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    let worker = thread::Builder::new()
        .name("camera".into())
        .spawn(move || match open_camera(&index) {
            Ok(camera) => capture_loop(camera, mirror, &flag, &frame_tx),
            Err(err) => log::error!("failed to reopen camera: {err:?}"),
        })
        .context("failed to spawn camera thread")?;

    Ok(CameraStream {
        running,
        worker: Some(worker),
    })
}

fn capture_loop(mut camera: Camera, mirror: bool, running: &AtomicBool, frame_tx: &Sender<Frame>) {
    let format = camera.camera_format();
    log::info!(
        "capturing {}x{} {:?} at {}fps",
        format.width(),
        format.height(),
        format.format(),
        format.frame_rate()
    );

    while running.load(Ordering::Relaxed) {
        let frame = match grab_frame(&mut camera, mirror) {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(err) => {
                log::warn!("dropping camera frame: {err:?}");
                continue;
            }
        };

        // Full means the recognizer is still busy; only a disconnect ends capture.
        if let Err(TrySendError::Disconnected(_)) = frame_tx.try_send(frame) {
            log::info!("frame receiver gone, stopping capture");
            break;
        }
    }
}

fn grab_frame(camera: &mut Camera, mirror: bool) -> Result<Option<Frame>> {
    let buffer = camera.frame().context("camera read failed")?;
    let timestamp = Instant::now();
    let image = buffer
        .decode_image::<RgbFormat>()
        .context("camera frame decode failed")?;

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Ok(None);
    }

    Ok(Some(Frame {
        rgba: rgb_to_rgba(image.as_raw(), width, mirror),
        width,
        height,
        timestamp,
    }))
}

/// Expands packed RGB rows to RGBA, optionally flipping each row so the
/// frame behaves like a mirror.
pub fn rgb_to_rgba(rgb: &[u8], width: u32, mirror: bool) -> Vec<u8> {
    let width = width as usize;
    if width == 0 {
        return Vec::new();
    }
    let rows = rgb.len() / (width * 3);
    let mut rgba = vec![255u8; rows * width * 4];

    rgba.par_chunks_exact_mut(width * 4)
        .zip(rgb.par_chunks_exact(width * 3))
        .for_each(|(dst, src)| {
            for x in 0..width {
                let sx = if mirror { width - 1 - x } else { x };
                dst[x * 4..x * 4 + 3].copy_from_slice(&src[sx * 3..sx * 3 + 3]);
            }
        });

    rgba
}
