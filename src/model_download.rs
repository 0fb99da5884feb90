use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

const POSE_MODEL_FILENAME: &str = "pose_estimation_mediapipe_2023mar.onnx";
pub const DEFAULT_POSE_MODEL_URL: &str = "https://github.com/opencv/opencv_zoo/raw/main/models/pose_estimation_mediapipe/pose_estimation_mediapipe_2023mar.onnx";

pub fn default_pose_model_path() -> PathBuf {
    PathBuf::from("models").join(POSE_MODEL_FILENAME)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadEvent {
    AlreadyPresent,
    Started { total: Option<u64> },
    Progress { downloaded: u64, total: Option<u64> },
    Finished,
}

/// Makes sure the pose model exists at `model_path`, fetching it from `url`
/// when missing. Writes to a `.download` sibling first so a partial file is
/// never mistaken for a model.
pub fn ensure_pose_model_ready<F>(model_path: &Path, url: &str, mut on_event: F) -> anyhow::Result<()>
where
    F: FnMut(DownloadEvent),
{
    if model_path.exists() {
        on_event(DownloadEvent::AlreadyPresent);
        on_event(DownloadEvent::Finished);
        return Ok(());
    }

    if let Some(parent) = model_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create model directory {}", parent.display()))?;
    }

    let mut progress: Option<ProgressBar> = None;
    download_to_path(url, model_path, &mut |event| {
        match &event {
            DownloadEvent::Started { total } => {
                progress = Some(create_progress_bar(*total));
            }
            DownloadEvent::Progress { downloaded, .. } => {
                if let Some(pb) = progress.as_ref() {
                    pb.set_position(*downloaded);
                }
            }
            DownloadEvent::Finished => {
                if let Some(pb) = progress.take() {
                    pb.finish_with_message("pose model ready");
                }
            }
            DownloadEvent::AlreadyPresent => {}
        }
        on_event(event);
    })
    .with_context(|| format!("failed to download pose model to {}", model_path.display()))
}

fn download_to_path<F>(url: &str, dest: &Path, on_event: &mut F) -> anyhow::Result<()>
where
    F: FnMut(DownloadEvent),
{
    log::info!("downloading pose model from {url} to {}", dest.display());

    let client = Client::new();
    let mut response = client
        .get(url)
        .send()
        .context("failed to start model download")?
        .error_for_status()
        .context("model download returned error status")?;

    let total = response.content_length();
    on_event(DownloadEvent::Started { total });

    let tmp_path = dest.with_extension("download");
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 16 * 1024];
    loop {
        let bytes_read = response
            .read(&mut buffer)
            .context("failed while reading model bytes")?;
        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .context("failed while writing model to disk")?;
        downloaded += bytes_read as u64;
        on_event(DownloadEvent::Progress { downloaded, total });
    }

    file.sync_all()
        .context("failed to flush downloaded model to disk")?;
    fs::rename(&tmp_path, dest).with_context(|| {
        format!(
            "failed to move temp model {} into place at {}",
            tmp_path.display(),
            dest.display()
        )
    })?;

    on_event(DownloadEvent::Finished);
    Ok(())
}

fn create_progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
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
            let style = ProgressStyle::with_template("{spinner:.green} downloading pose model")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            pb.set_style(style);
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    }
}
