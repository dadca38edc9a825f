use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

const MODEL_BASE_URL: &str =
    "https://raw.githubusercontent.com/214zzl995/gesture-universe/refs/heads/main/models";

/// The two ONNX models the landmark stage chains: palms first, then 21
/// landmarks inside each palm crop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    Handpose,
    PalmDetector,
}

impl ModelKind {
    fn filename(self) -> &'static str {
        match self {
            ModelKind::Handpose => "handpose_estimation_mediapipe_2023feb.onnx",
            ModelKind::PalmDetector => "palm_detection_mediapipe_2023feb.onnx",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ModelKind::Handpose => "handpose",
            ModelKind::PalmDetector => "palm detector",
        }
    }

    pub fn default_path(self) -> PathBuf {
        PathBuf::from("models").join(self.filename())
    }

    fn url(self) -> String {
        format!("{MODEL_BASE_URL}/{}", self.filename())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelDownloadEvent {
    AlreadyPresent,
    Started { total: Option<u64> },
    Progress { downloaded: u64, total: Option<u64> },
    Finished,
}

/// Makes sure `kind` exists at `model_path`, downloading it with a terminal
/// progress bar when it does not.
pub fn ensure_model_ready<F>(kind: ModelKind, model_path: &Path, mut on_event: F) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    if model_path.exists() {
        on_event(ModelDownloadEvent::AlreadyPresent);
        on_event(ModelDownloadEvent::Finished);
        return Ok(());
    }

    if let Some(parent) = model_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create model directory {}", parent.display()))?;
    }

    let mut progress: Option<ProgressBar> = None;
    download_to_path(kind, &kind.url(), model_path, &mut |event| {
        match &event {
            ModelDownloadEvent::Started { total } => {
                progress = Some(create_progress_bar(*total));
            }
            ModelDownloadEvent::Progress { downloaded, .. } => {
                if let Some(pb) = progress.as_ref() {
                    pb.set_position(*downloaded);
                }
            }
            ModelDownloadEvent::Finished => {
                if let Some(pb) = progress.take() {
                    pb.finish_with_message(format!("{} model ready", kind.label()));
                }
            }
            ModelDownloadEvent::AlreadyPresent => {}
        }
        on_event(event);
    })
    .with_context(|| {
        format!(
            "failed to download {} model to {}",
            kind.label(),
            model_path.display()
        )
    })
}

fn download_to_path<F>(kind: ModelKind, url: &str, dest: &Path, on_event: &mut F) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    log::info!("downloading {} model from {url} to {}", kind.label(), dest.display());

    let mut response = Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .build()
        .context("failed to build HTTP client")?
        .get(url)
        .send()
        .context("failed to start model download")?
        .error_for_status()
        .context("model download returned error status")?;

    let total = response.content_length();
    on_event(ModelDownloadEvent::Started { total });

    // Write next to the destination and rename, so an interrupted download
    // never leaves a truncated model behind.
    let partial = dest.with_extension("download");
    let file = fs::File::create(&partial)
        .with_context(|| format!("failed to create {}", partial.display()))?;
    let mut writer = ProgressWriter {
        inner: file,
        written: 0,
        total,
        on_event,
    };
    io::copy(&mut response, &mut writer).context("model download interrupted")?;
    writer
        .inner
        .sync_all()
        .context("failed to flush downloaded model to disk")?;
    drop(writer);

    fs::rename(&partial, dest)
        .with_context(|| format!("failed to move {} to {}", partial.display(), dest.display()))?;

    on_event(ModelDownloadEvent::Finished);
    Ok(())
}

/// Forwards writes to `inner` and reports the running byte count.
struct ProgressWriter<'a, W, F> {
    inner: W,
    written: u64,
    total: Option<u64>,
    on_event: &'a mut F,
}

impl<W: Write, F: FnMut(ModelDownloadEvent)> Write for ProgressWriter<'_, W, F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        (self.on_event)(ModelDownloadEvent::Progress {
            downloaded: self.written,
            total: self.total,
        });
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn create_progress_bar(total_size: Option<u64>) -> ProgressBar {
    match total_size {
        Some(total) if total > 0 => {
            let pb = ProgressBar::new(total);
            let style = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )
            .map(|style| style.progress_chars("=>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            pb.set_style(style);
            pb
        }
        _ => {
            let pb = ProgressBar::new_spinner();
            let style = ProgressStyle::with_template("{spinner:.green} downloading model")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            pb.set_style(style);
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    }
}
