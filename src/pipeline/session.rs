use std::{
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use super::{
    camera::{self, CameraSession},
    capture::{CaptureLoop, LoopTiming, OverlayUpdate, SessionFactory},
    estimator::{OrtPoseEstimator, PoseSource},
    skeleton::RenderConfig,
};
use crate::{
    config::{CameraConfig, Config},
    error::SessionError,
    types::FacingMode,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureCommand {
    Start(Option<FacingMode>),
    Stop,
    Shutdown,
}

/// Opens the real camera and the ONNX pose model.
pub struct DeviceSessionFactory {
    camera: CameraConfig,
    pose_source: PoseSource,
}

impl DeviceSessionFactory {
    pub fn new(config: &Config) -> Self {
        Self {
            camera: config.camera.clone(),
            pose_source: PoseSource::new(config.model.clone()),
        }
    }
}

impl SessionFactory for DeviceSessionFactory {
    type Source = CameraSession;
    type Estimator = OrtPoseEstimator;

    fn open_camera(&mut self, facing: Option<FacingMode>) -> Result<CameraSession, SessionError> {
        let devices = camera::available_cameras().map_err(SessionError::camera_open)?;
        let device = camera::select_device(&devices, facing.or(self.camera.facing))?;
        log::info!("opening camera '{}'", device.label);
        CameraSession::acquire(device, self.camera.ready_timeout())
    }

    fn load_estimator(&mut self) -> Result<OrtPoseEstimator, SessionError> {
        self.pose_source.load()
    }
}

/// Runs a capture loop on its own thread, driven by commands.
pub struct CaptureWorker {
    command_tx: Sender<CaptureCommand>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CaptureWorker {
    pub fn spawn<F>(
        factory: F,
        timing: LoopTiming,
        render: RenderConfig,
        update_tx: Sender<OverlayUpdate>,
    ) -> Self
    where
        F: SessionFactory + Send + 'static,
    {
        let (command_tx, command_rx) = unbounded();
        let handle = thread::spawn(move || {
            let capture = CaptureLoop::new(factory, timing, render);
            run_worker_loop(capture, command_rx, update_tx);
        });

        Self {
            command_tx,
            handle: Some(handle),
        }
    }

    pub fn send(&self, command: CaptureCommand) {
        if self.command_tx.send(command).is_err() {
            log::warn!("capture worker is gone, dropping {command:?}");
        }
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        let _ = self.command_tx.send(CaptureCommand::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_worker_loop<F: SessionFactory>(
    mut capture: CaptureLoop<F>,
    command_rx: Receiver<CaptureCommand>,
    update_tx: Sender<OverlayUpdate>,
) {
    let mut emit = |update: OverlayUpdate| forward_update(&update_tx, update);

    loop {
        let command = match capture.next_deadline() {
            Some(deadline) => {
                let timeout = deadline.saturating_duration_since(Instant::now());
                match command_rx.recv_timeout(timeout) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match command_rx.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };

        match command {
            Some(CaptureCommand::Start(facing)) => {
                if let Err(err) = capture.start(facing, Instant::now(), &mut emit) {
                    log::warn!("session start rejected: {err}");
                }
            }
            Some(CaptureCommand::Stop) => capture.stop(Instant::now(), &mut emit),
            Some(CaptureCommand::Shutdown) => break,
            None => {}
        }

        capture.poll(Instant::now(), &mut emit);
    }

    let summary = capture.summary();
    log::info!(
        "capture worker exiting after {} tick(s), {} pose(s) detected",
        summary.ticks,
        summary.poses_detected
    );
}

/// Skeleton frames are dropped when the UI lags; state changes wait for room.
fn forward_update(update_tx: &Sender<OverlayUpdate>, update: OverlayUpdate) {
    match update {
        OverlayUpdate::Skeleton(_) => {
            let _ = update_tx.try_send(update);
        }
        other => {
            let _ = update_tx.send_timeout(other, Duration::from_secs(1));
        }
    }
}
