use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
};

use super::rgba_converter;
use crate::{
    error::SessionError,
    types::{FacingMode, Frame},
};

// Built-in macOS cameras often reject YUYV even though it is reported.
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

const USER_FACING_HINTS: &[&str] = &["front", "facetime", "user", "integrated"];
const ENVIRONMENT_FACING_HINTS: &[&str] = &["back", "rear", "environment", "world"];

fn requested_formats() -> [RequestedFormat<'static>; 3] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

/// Source of camera frames for a capture session.
pub trait VideoSource: Send + 'static {
    /// Most recent frame since the last call, if any arrived.
    fn latest_frame(&mut self) -> Option<Frame>;
    /// Releases the device. Calling it again is a no-op.
    fn stop(&mut self);
    fn active_tracks(&self) -> usize;
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: info.human_name(),
        })
        .collect())
}

/// Picks the device whose label matches the facing preference. Without a
/// match, user-facing falls back to the first device and environment-facing
/// to the last one, since laptops list the built-in camera first.
pub fn select_device_index(labels: &[&str], facing: Option<FacingMode>) -> Option<usize> {
    if labels.is_empty() {
        return None;
    }

    let Some(facing) = facing else {
        return Some(0);
    };

    let hints = match facing {
        FacingMode::User => USER_FACING_HINTS,
        FacingMode::Environment => ENVIRONMENT_FACING_HINTS,
    };
    let matched = labels.iter().position(|label| {
        let label = label.to_lowercase();
        hints.iter().any(|hint| label.contains(hint))
    });

    matched.or(match facing {
        FacingMode::User => Some(0),
        FacingMode::Environment => Some(labels.len() - 1),
    })
}

pub fn select_device(
    devices: &[CameraDevice],
    facing: Option<FacingMode>,
) -> Result<&CameraDevice, SessionError> {
    let labels: Vec<&str> = devices.iter().map(|d| d.label.as_str()).collect();
    select_device_index(&labels, facing)
        .and_then(|idx| devices.get(idx))
        .ok_or(SessionError::NoCamera)
}

fn build_camera(index: CameraIndex) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

/// An open camera streaming frames from its own capture thread. The frames
/// are never displayed; they only feed pose estimation.
#[derive(Debug)]
pub struct CameraSession {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    frame_rx: Receiver<Frame>,
    pending: Option<Frame>,
    label: String,
}

impl CameraSession {
    /// Opens the device and returns once the first frame (and with it the
    /// frame size) is available.
    pub fn acquire(device: &CameraDevice, ready_timeout: Duration) -> Result<Self, SessionError> {
        let (open_tx, open_rx) = bounded::<Result<()>>(1);
        let (frame_tx, frame_rx) = bounded(1);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let index = device.index.clone();

        let handle = thread::spawn(move || {
            let mut camera = match build_camera(index) {
                Ok(cam) => {
                    let _ = open_tx.send(Ok(()));
                    cam
                }
                Err(err) => {
                    let _ = open_tx.send(Err(err));
                    return;
                }
            };

            while !stop_flag.load(Ordering::Relaxed) {
                let frame_start = Instant::now();
                let buffer = match camera.frame() {
                    Ok(buffer) => buffer,
                    Err(err) => {
                        log::warn!(
                            "camera frame read failed (after {:?}): {err:?}",
                            frame_start.elapsed()
                        );
                        continue;
                    }
                };

                let frame = match rgba_converter::decode_frame(&buffer, Instant::now()) {
                    Ok(frame) => frame,
                    Err(err) => {
                        log::warn!("failed to decode camera frame: {err:?}");
                        continue;
                    }
                };

                // Drop the frame if the previous one was not consumed yet.
                let _ = frame_tx.try_send(frame);
            }

            if let Err(err) = camera.stop_stream() {
                log::warn!("failed to stop camera stream: {err:?}");
            }
        });

        let mut session = CameraSession {
            stop,
            handle: Some(handle),
            frame_rx,
            pending: None,
            label: device.label.clone(),
        };

        match open_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                session.stop();
                return Err(SessionError::camera_open(err));
            }
            Err(_) => {
                session.stop();
                return Err(SessionError::camera_open("camera thread exited before opening"));
            }
        }

        match session.frame_rx.recv_timeout(ready_timeout) {
            Ok(frame) => {
                log::info!(
                    "camera '{}' ready at {}x{}",
                    session.label,
                    frame.width,
                    frame.height
                );
                session.pending = Some(frame);
                Ok(session)
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => {
                session.stop();
                Err(SessionError::CameraNotReady(ready_timeout))
            }
        }
    }
}

impl VideoSource for CameraSession {
    fn latest_frame(&mut self) -> Option<Frame> {
        let mut latest = self.pending.take();
        while let Ok(newer) = self.frame_rx.try_recv() {
            latest = Some(newer);
        }
        latest
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            log::info!("camera '{}' released", self.label);
        }
    }

    fn active_tracks(&self) -> usize {
        usize::from(self.handle.is_some())
    }
}

impl Drop for CameraSession {
    fn drop(&mut self) {
        VideoSource::stop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_devices_selects_nothing() {
        assert_eq!(select_device_index(&[], Some(FacingMode::User)), None);
        assert_eq!(select_device_index(&[], None), None);
    }

    #[test]
    fn no_preference_takes_first_device() {
        let labels = ["USB Rear Cam", "FaceTime HD Camera"];
        assert_eq!(select_device_index(&labels, None), Some(0));
    }

    #[test]
    fn facing_matches_label_hints() {
        let labels = ["USB Rear Cam", "FaceTime HD Camera"];
        assert_eq!(select_device_index(&labels, Some(FacingMode::User)), Some(1));
        assert_eq!(
            select_device_index(&labels, Some(FacingMode::Environment)),
            Some(0)
        );
    }

    #[test]
    fn facing_without_hint_uses_list_order() {
        let labels = ["Camera A", "Camera B", "Camera C"];
        assert_eq!(select_device_index(&labels, Some(FacingMode::User)), Some(0));
        assert_eq!(
            select_device_index(&labels, Some(FacingMode::Environment)),
            Some(2)
        );
    }

    #[test]
    fn empty_device_list_is_no_camera() {
        let err = select_device(&[], Some(FacingMode::User)).unwrap_err();
        assert!(matches!(err, SessionError::NoCamera));
    }
}
