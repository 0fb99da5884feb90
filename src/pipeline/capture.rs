use std::{
    mem,
    time::{Duration, Instant},
};

use super::{
    camera::VideoSource,
    estimator::PoseEstimator,
    skeleton::{RenderConfig, RgbaCanvas, SkeletonRenderer},
};
use crate::{
    config::TimingConfig,
    error::SessionError,
    types::{FacingMode, OverlayImage},
};

const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

/// Opens the two resources a capture session needs.
pub trait SessionFactory {
    type Source: VideoSource;
    type Estimator: PoseEstimator;

    fn open_camera(&mut self, facing: Option<FacingMode>) -> Result<Self::Source, SessionError>;
    fn load_estimator(&mut self) -> Result<Self::Estimator, SessionError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Starting,
    CountingDown,
    Capturing,
    Stopping,
    Done,
    Failed,
}

impl Phase {
    pub fn can_start(&self) -> bool {
        matches!(self, Phase::Idle | Phase::Done | Phase::Failed)
    }

    pub fn can_stop(&self) -> bool {
        matches!(self, Phase::CountingDown | Phase::Capturing)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub ticks: u64,
    pub frames_analyzed: u64,
    pub poses_detected: u64,
    pub skipped_ticks: u64,
    pub failed_ticks: u64,
    pub duration: Duration,
}

#[derive(Clone, Debug)]
pub enum OverlayUpdate {
    Phase(Phase),
    Countdown(u32),
    Skeleton(OverlayImage),
    Analyzing,
    Cleared,
    Finished(SessionSummary),
    Failed(String),
}

#[derive(Clone, Copy, Debug)]
pub struct LoopTiming {
    pub countdown_from: u32,
    pub tick_interval: Duration,
    pub analyzing_delay: Duration,
}

impl From<&TimingConfig> for LoopTiming {
    fn from(config: &TimingConfig) -> Self {
        Self {
            countdown_from: config.countdown_from,
            tick_interval: config.tick_interval(),
            analyzing_delay: config.analyzing_delay(),
        }
    }
}

impl Default for LoopTiming {
    fn default() -> Self {
        LoopTiming::from(&TimingConfig::default())
    }
}

enum State<S, E> {
    Idle,
    CountingDown {
        source: S,
        estimator: E,
        /// Number shown at `next_at`; `None` clears the caption and starts capturing.
        remaining: Option<u32>,
        next_at: Instant,
    },
    Capturing {
        source: S,
        estimator: E,
        next_tick_at: Instant,
        started_at: Instant,
    },
    Stopping {
        done_at: Instant,
    },
    Done,
    Failed,
}

impl<S, E> State<S, E> {
    fn phase(&self) -> Phase {
        match self {
            State::Idle => Phase::Idle,
            State::CountingDown { .. } => Phase::CountingDown,
            State::Capturing { .. } => Phase::Capturing,
            State::Stopping { .. } => Phase::Stopping,
            State::Done => Phase::Done,
            State::Failed => Phase::Failed,
        }
    }
}

/// Capture session state machine. It owns its deadlines and the session
/// resources; callers drive it with `start`, `stop` and `poll`, passing the
/// current time explicitly.
pub struct CaptureLoop<F: SessionFactory> {
    factory: F,
    timing: LoopTiming,
    renderer: SkeletonRenderer,
    canvas: RgbaCanvas,
    state: State<F::Source, F::Estimator>,
    summary: SessionSummary,
}

impl<F: SessionFactory> CaptureLoop<F> {
    pub fn new(factory: F, timing: LoopTiming, render: RenderConfig) -> Self {
        Self {
            factory,
            timing,
            renderer: SkeletonRenderer::new(render),
            canvas: RgbaCanvas::new(0, 0),
            state: State::Idle,
            summary: SessionSummary::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    /// Earliest instant at which `poll` has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.state {
            State::CountingDown { next_at, .. } => Some(*next_at),
            State::Capturing { next_tick_at, .. } => Some(*next_tick_at),
            State::Stopping { done_at } => Some(*done_at),
            State::Idle | State::Done | State::Failed => None,
        }
    }

    /// Acquires the camera, then the model. If the model fails after the
    /// camera opened, the camera is released before reporting the failure.
    pub fn start(
        &mut self,
        facing: Option<FacingMode>,
        now: Instant,
        emit: &mut impl FnMut(OverlayUpdate),
    ) -> Result<(), SessionError> {
        if !self.phase().can_start() {
            log::debug!("start ignored while {:?}", self.phase());
            return Ok(());
        }

        emit(OverlayUpdate::Phase(Phase::Starting));
        self.summary = SessionSummary::default();
        log::info!("starting capture session");

        let mut source = match self.factory.open_camera(facing) {
            Ok(source) => source,
            Err(err) => return Err(self.fail(err, emit)),
        };

        let estimator = match self.factory.load_estimator() {
            Ok(estimator) => estimator,
            Err(err) => {
                source.stop();
                return Err(self.fail(err, emit));
            }
        };

        self.state = State::CountingDown {
            source,
            estimator,
            remaining: Some(self.timing.countdown_from),
            next_at: now + COUNTDOWN_STEP,
        };
        emit(OverlayUpdate::Phase(Phase::CountingDown));
        Ok(())
    }

    fn fail(&mut self, err: SessionError, emit: &mut impl FnMut(OverlayUpdate)) -> SessionError {
        log::error!("capture session failed to start: {}", err.chain_message());
        self.state = State::Failed;
        emit(OverlayUpdate::Failed(err.chain_message()));
        emit(OverlayUpdate::Phase(Phase::Failed));
        err
    }

    /// Cancels the countdown or the capture tick and releases the camera.
    pub fn stop(&mut self, now: Instant, emit: &mut impl FnMut(OverlayUpdate)) {
        let state = mem::replace(&mut self.state, State::Idle);
        let (mut source, started_at) = match state {
            State::CountingDown { source, .. } => (source, None),
            State::Capturing {
                source, started_at, ..
            } => (source, Some(started_at)),
            other => {
                log::debug!("stop ignored while {:?}", other.phase());
                self.state = other;
                return;
            }
        };

        source.stop();
        debug_assert_eq!(source.active_tracks(), 0);
        if let Some(started_at) = started_at {
            self.summary.duration = now.saturating_duration_since(started_at);
        }
        log::info!(
            "capture stopped after {} ticks ({} skipped)",
            self.summary.ticks,
            self.summary.skipped_ticks
        );

        self.state = State::Stopping {
            done_at: now + self.timing.analyzing_delay,
        };
        emit(OverlayUpdate::Phase(Phase::Stopping));
        emit(OverlayUpdate::Analyzing);
    }

    /// Fires every deadline that is due at `now`.
    pub fn poll(&mut self, now: Instant, emit: &mut impl FnMut(OverlayUpdate)) {
        loop {
            let Some(deadline) = self.next_deadline() else {
                return;
            };
            if now < deadline {
                return;
            }

            match self.phase() {
                Phase::CountingDown => self.countdown_step(deadline, emit),
                Phase::Capturing => {
                    self.capture_tick(now, emit);
                    // At most one inference per poll; late ticks are dropped.
                    return;
                }
                Phase::Stopping => {
                    self.state = State::Done;
                    emit(OverlayUpdate::Cleared);
                    emit(OverlayUpdate::Finished(self.summary.clone()));
                    emit(OverlayUpdate::Phase(Phase::Done));
                    log::info!("session finished: {:?}", self.summary);
                }
                _ => return,
            }
        }
    }

    fn countdown_step(&mut self, at: Instant, emit: &mut impl FnMut(OverlayUpdate)) {
        let (source, estimator, remaining) = match mem::replace(&mut self.state, State::Idle) {
            State::CountingDown {
                source,
                estimator,
                remaining,
                ..
            } => (source, estimator, remaining),
            other => {
                self.state = other;
                return;
            }
        };

        self.state = match remaining {
            Some(shown) => {
                emit(OverlayUpdate::Countdown(shown));
                State::CountingDown {
                    source,
                    estimator,
                    remaining: shown.checked_sub(1),
                    next_at: at + COUNTDOWN_STEP,
                }
            }
            None => {
                log::info!("countdown finished, capturing every {:?}", self.timing.tick_interval);
                emit(OverlayUpdate::Cleared);
                emit(OverlayUpdate::Phase(Phase::Capturing));
                State::Capturing {
                    source,
                    estimator,
                    next_tick_at: at + self.timing.tick_interval,
                    started_at: at,
                }
            }
        };
    }

    fn capture_tick(&mut self, now: Instant, emit: &mut impl FnMut(OverlayUpdate)) {
        let State::Capturing {
            source,
            estimator,
            next_tick_at,
            ..
        } = &mut self.state
        else {
            return;
        };

        let interval = self.timing.tick_interval;
        let late_by = now.saturating_duration_since(*next_tick_at);
        let missed = (late_by.as_nanos() / interval.as_nanos().max(1)) as u32;
        if missed > 0 {
            log::debug!("dropping {missed} capture tick(s), previous tick overran");
            self.summary.skipped_ticks += u64::from(missed);
        }
        *next_tick_at += interval * (missed + 1);
        self.summary.ticks += 1;

        let Some(frame) = source.latest_frame() else {
            log::debug!("no new camera frame for this tick");
            return;
        };
        log::trace!("analyzing frame captured {:?} ago", frame.timestamp.elapsed());

        let poses = match estimator.estimate(&frame) {
            Ok(poses) => poses,
            Err(err) => {
                log::warn!("pose estimation failed: {err:?}");
                self.summary.failed_ticks += 1;
                return;
            }
        };

        self.canvas.resize(frame.width, frame.height);
        let stats = self.renderer.render(&poses, &mut self.canvas);
        if stats.circles == 0 && !poses.is_empty() {
            let best = poses
                .iter()
                .map(|pose| pose.confident_keypoints(0.0))
                .max()
                .unwrap_or(0);
            log::debug!("pose found but no keypoint cleared the threshold ({best} scored above zero)");
        }
        log::trace!(
            "rendered {} pose(s): {} points, {} segments",
            poses.len(),
            stats.circles,
            stats.segments
        );
        self.summary.frames_analyzed += 1;
        self.summary.poses_detected += poses.len() as u64;
        emit(OverlayUpdate::Skeleton(self.canvas.snapshot()));
    }
}

impl<F: SessionFactory> Drop for CaptureLoop<F> {
    fn drop(&mut self) {
        match &mut self.state {
            State::CountingDown { source, .. } | State::Capturing { source, .. } => source.stop(),
            _ => {}
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use anyhow::anyhow;

    use super::*;
    use crate::types::{Frame, Keypoint, Pose};

    #[derive(Clone, Default)]
    pub(crate) struct Probe {
        pub open_tracks: Arc<AtomicUsize>,
        pub stop_calls: Arc<AtomicUsize>,
        pub estimates: Arc<AtomicUsize>,
        pub model_loads: Arc<AtomicUsize>,
    }

    pub(crate) struct FakeSource {
        probe: Probe,
        active: bool,
    }

    impl VideoSource for FakeSource {
        fn latest_frame(&mut self) -> Option<Frame> {
            self.active.then(|| Frame {
                rgba: vec![0; 64 * 48 * 4],
                width: 64,
                height: 48,
                timestamp: Instant::now(),
            })
        }

        fn stop(&mut self) {
            self.probe.stop_calls.fetch_add(1, Ordering::SeqCst);
            if self.active {
                self.active = false;
                self.probe.open_tracks.fetch_sub(1, Ordering::SeqCst);
            }
        }

        fn active_tracks(&self) -> usize {
            usize::from(self.active)
        }
    }

    pub(crate) struct FakeEstimator {
        probe: Probe,
        fail: bool,
    }

    impl PoseEstimator for FakeEstimator {
        fn estimate(&mut self, _frame: &Frame) -> anyhow::Result<Vec<Pose>> {
            self.probe.estimates.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("inference exploded"));
            }
            let mut pose = Pose::default();
            pose.keypoints[11] = Keypoint::new(10.0, 10.0, 0.9);
            pose.keypoints[12] = Keypoint::new(20.0, 20.0, 0.9);
            Ok(vec![pose])
        }
    }

    #[derive(Default)]
    pub(crate) struct FakeFactory {
        pub probe: Probe,
        pub camera_fails: bool,
        pub model_fails: bool,
        pub inference_fails: bool,
    }

    impl SessionFactory for FakeFactory {
        type Source = FakeSource;
        type Estimator = FakeEstimator;

        fn open_camera(&mut self, _facing: Option<FacingMode>) -> Result<FakeSource, SessionError> {
            if self.camera_fails {
                return Err(SessionError::camera_open("permission denied"));
            }
            self.probe.open_tracks.fetch_add(1, Ordering::SeqCst);
            Ok(FakeSource {
                probe: self.probe.clone(),
                active: true,
            })
        }

        fn load_estimator(&mut self) -> Result<FakeEstimator, SessionError> {
            self.probe.model_loads.fetch_add(1, Ordering::SeqCst);
            if self.model_fails {
                return Err(SessionError::model_load(anyhow!("corrupt model")));
            }
            Ok(FakeEstimator {
                probe: self.probe.clone(),
                fail: self.inference_fails,
            })
        }
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn new_loop(factory: FakeFactory) -> CaptureLoop<FakeFactory> {
        CaptureLoop::new(factory, LoopTiming::default(), RenderConfig::default())
    }

    /// Starts at `t0` and runs the countdown until capturing begins.
    const CAPTURE_BEGINS: Duration = Duration::from_secs(7);

    fn start_capturing(capture: &mut CaptureLoop<FakeFactory>, t0: Instant) -> Vec<OverlayUpdate> {
        let mut updates = Vec::new();
        capture.start(None, t0, &mut |u| updates.push(u)).unwrap();
        for second in 1..=7 {
            capture.poll(t0 + Duration::from_secs(second), &mut |u| updates.push(u));
        }
        updates
    }

    fn countdown_values(updates: &[OverlayUpdate]) -> Vec<u32> {
        updates
            .iter()
            .filter_map(|u| match u {
                OverlayUpdate::Countdown(n) => Some(*n),
                _ => None,
            })
            .collect()
    }

    fn skeleton_count(updates: &[OverlayUpdate]) -> usize {
        updates
            .iter()
            .filter(|u| matches!(u, OverlayUpdate::Skeleton(_)))
            .count()
    }

    #[test]
    fn countdown_runs_one_number_per_second() {
        let t0 = Instant::now();
        let mut capture = new_loop(FakeFactory::default());
        let mut updates = Vec::new();
        capture.start(None, t0, &mut |u| updates.push(u)).unwrap();
        assert_eq!(capture.phase(), Phase::CountingDown);

        // Nothing is shown before the first second elapses.
        capture.poll(t0 + ms(999), &mut |u| updates.push(u));
        assert!(countdown_values(&updates).is_empty());

        for second in 1..=5 {
            capture.poll(t0 + Duration::from_secs(second), &mut |u| updates.push(u));
            assert_eq!(capture.phase(), Phase::CountingDown);
        }
        assert_eq!(countdown_values(&updates), vec![5, 4, 3, 2, 1]);

        capture.poll(t0 + Duration::from_secs(6), &mut |u| updates.push(u));
        assert_eq!(countdown_values(&updates), vec![5, 4, 3, 2, 1, 0]);
        assert_eq!(capture.phase(), Phase::CountingDown);
        assert!(matches!(updates.last(), Some(OverlayUpdate::Countdown(0))));

        // "0" stays up for its full second, then the caption is cleared.
        capture.poll(t0 + Duration::from_secs(7), &mut |u| updates.push(u));
        assert_eq!(capture.phase(), Phase::Capturing);
        let tail = &updates[updates.len() - 3..];
        assert!(matches!(tail[0], OverlayUpdate::Countdown(0)));
        assert!(matches!(tail[1], OverlayUpdate::Cleared));
        assert!(matches!(tail[2], OverlayUpdate::Phase(Phase::Capturing)));
        assert_eq!(skeleton_count(&updates), 0);
    }

    #[test]
    fn countdown_caption_is_cleared_even_when_ticks_produce_nothing() {
        let t0 = Instant::now();
        let factory = FakeFactory {
            inference_fails: true,
            ..FakeFactory::default()
        };
        let mut capture = new_loop(factory);
        let mut updates = start_capturing(&mut capture, t0);
        for tick in 1..=5 {
            capture.poll(t0 + CAPTURE_BEGINS + ms(100 * tick), &mut |u| updates.push(u));
        }

        let last_zero = updates
            .iter()
            .rposition(|u| matches!(u, OverlayUpdate::Countdown(0)))
            .expect("countdown reached zero");
        assert!(
            updates[last_zero..]
                .iter()
                .any(|u| matches!(u, OverlayUpdate::Cleared))
        );
        assert_eq!(skeleton_count(&updates), 0);
    }

    #[test]
    fn capture_ticks_every_interval() {
        let t0 = Instant::now();
        let factory = FakeFactory::default();
        let probe = factory.probe.clone();
        let mut capture = new_loop(factory);
        start_capturing(&mut capture, t0);

        let capture_start = t0 + CAPTURE_BEGINS;
        assert_eq!(capture.next_deadline(), Some(capture_start + ms(100)));

        let mut updates = Vec::new();
        capture.poll(capture_start + ms(50), &mut |u| updates.push(u));
        assert!(updates.is_empty());

        for tick in 1..=3 {
            capture.poll(capture_start + ms(100 * tick), &mut |u| updates.push(u));
        }
        assert_eq!(skeleton_count(&updates), 3);
        assert_eq!(probe.estimates.load(Ordering::SeqCst), 3);
        assert_eq!(capture.summary().frames_analyzed, 3);
        assert_eq!(capture.summary().poses_detected, 3);
        assert_eq!(capture.summary().skipped_ticks, 0);

        let Some(OverlayUpdate::Skeleton(image)) = updates.last() else {
            panic!("expected a skeleton frame");
        };
        assert_eq!((image.width, image.height), (64, 48));
        assert!(image.rgba.iter().any(|&b| b != 0));
    }

    #[test]
    fn overrunning_tick_drops_missed_ticks() {
        let t0 = Instant::now();
        let factory = FakeFactory::default();
        let probe = factory.probe.clone();
        let mut capture = new_loop(factory);
        start_capturing(&mut capture, t0);
        let capture_start = t0 + CAPTURE_BEGINS;

        let mut updates = Vec::new();
        // First tick was due at +100ms but the worker only got here at +350ms.
        capture.poll(capture_start + ms(350), &mut |u| updates.push(u));
        assert_eq!(probe.estimates.load(Ordering::SeqCst), 1);
        assert_eq!(capture.summary().skipped_ticks, 2);
        assert_eq!(capture.next_deadline(), Some(capture_start + ms(400)));
    }

    #[test]
    fn stop_releases_camera_and_finishes_after_delay() {
        let t0 = Instant::now();
        let factory = FakeFactory::default();
        let probe = factory.probe.clone();
        let mut capture = new_loop(factory);
        start_capturing(&mut capture, t0);
        assert_eq!(probe.open_tracks.load(Ordering::SeqCst), 1);

        let capture_start = t0 + CAPTURE_BEGINS;
        capture.poll(capture_start + ms(100), &mut |_| {});

        let stop_at = capture_start + ms(150);
        let mut updates = Vec::new();
        capture.stop(stop_at, &mut |u| updates.push(u));
        assert_eq!(probe.open_tracks.load(Ordering::SeqCst), 0);
        assert_eq!(capture.phase(), Phase::Stopping);
        assert!(matches!(updates.last(), Some(OverlayUpdate::Analyzing)));

        capture.poll(stop_at + ms(4_999), &mut |u| updates.push(u));
        assert_eq!(capture.phase(), Phase::Stopping);

        capture.poll(stop_at + ms(5_000), &mut |u| updates.push(u));
        assert_eq!(capture.phase(), Phase::Done);
        let finished = updates.iter().find_map(|u| match u {
            OverlayUpdate::Finished(summary) => Some(summary.clone()),
            _ => None,
        });
        let summary = finished.expect("finished update");
        assert_eq!(summary.ticks, 1);
        assert_eq!(summary.duration, ms(150));
        assert!(updates.iter().any(|u| matches!(u, OverlayUpdate::Cleared)));
        assert_eq!(probe.estimates.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_during_countdown_releases_camera() {
        let t0 = Instant::now();
        let factory = FakeFactory::default();
        let probe = factory.probe.clone();
        let mut capture = new_loop(factory);
        capture.start(None, t0, &mut |_| {}).unwrap();
        capture.poll(t0 + Duration::from_secs(2), &mut |_| {});

        capture.stop(t0 + ms(2_500), &mut |_| {});
        assert_eq!(probe.open_tracks.load(Ordering::SeqCst), 0);
        assert_eq!(capture.phase(), Phase::Stopping);
        assert_eq!(probe.estimates.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn model_failure_releases_camera() {
        let factory = FakeFactory {
            model_fails: true,
            ..FakeFactory::default()
        };
        let probe = factory.probe.clone();
        let mut capture = new_loop(factory);

        let mut updates = Vec::new();
        let err = capture
            .start(None, Instant::now(), &mut |u| updates.push(u))
            .unwrap_err();
        assert!(matches!(err, SessionError::ModelLoad(_)));
        assert_eq!(capture.phase(), Phase::Failed);
        assert_eq!(probe.open_tracks.load(Ordering::SeqCst), 0);
        assert_eq!(probe.stop_calls.load(Ordering::SeqCst), 1);
        assert!(updates.iter().any(
            |u| matches!(u, OverlayUpdate::Failed(msg) if msg.contains("corrupt model"))
        ));
    }

    #[test]
    fn camera_failure_skips_model_load() {
        let factory = FakeFactory {
            camera_fails: true,
            ..FakeFactory::default()
        };
        let probe = factory.probe.clone();
        let mut capture = new_loop(factory);

        let err = capture.start(None, Instant::now(), &mut |_| {}).unwrap_err();
        assert!(matches!(err, SessionError::CameraOpen(_)));
        assert_eq!(probe.model_loads.load(Ordering::SeqCst), 0);
        assert_eq!(capture.next_deadline(), None);
    }

    #[test]
    fn inference_errors_keep_the_loop_running() {
        let t0 = Instant::now();
        let factory = FakeFactory {
            inference_fails: true,
            ..FakeFactory::default()
        };
        let probe = factory.probe.clone();
        let mut capture = new_loop(factory);
        start_capturing(&mut capture, t0);

        let capture_start = t0 + CAPTURE_BEGINS;
        let mut updates = Vec::new();
        capture.poll(capture_start + ms(100), &mut |u| updates.push(u));
        capture.poll(capture_start + ms(200), &mut |u| updates.push(u));

        assert_eq!(capture.phase(), Phase::Capturing);
        assert_eq!(probe.estimates.load(Ordering::SeqCst), 2);
        assert_eq!(capture.summary().failed_ticks, 2);
        assert_eq!(skeleton_count(&updates), 0);
    }

    #[test]
    fn stop_outside_session_is_ignored() {
        let mut capture = new_loop(FakeFactory::default());
        let mut updates = Vec::new();
        capture.stop(Instant::now(), &mut |u| updates.push(u));
        assert_eq!(capture.phase(), Phase::Idle);
        assert!(updates.is_empty());
    }

    #[test]
    fn start_while_running_is_ignored() {
        let factory = FakeFactory::default();
        let probe = factory.probe.clone();
        let mut capture = new_loop(factory);
        let t0 = Instant::now();
        capture.start(None, t0, &mut |_| {}).unwrap();
        capture.start(None, t0 + ms(10), &mut |_| {}).unwrap();
        assert_eq!(probe.open_tracks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn session_can_restart_after_done() {
        let t0 = Instant::now();
        let factory = FakeFactory::default();
        let probe = factory.probe.clone();
        let mut capture = new_loop(factory);
        start_capturing(&mut capture, t0);
        let stop_at = t0 + CAPTURE_BEGINS;
        capture.stop(stop_at, &mut |_| {});
        capture.poll(stop_at + Duration::from_secs(5), &mut |_| {});
        assert_eq!(capture.phase(), Phase::Done);

        capture.start(None, stop_at + Duration::from_secs(6), &mut |_| {}).unwrap();
        assert_eq!(capture.phase(), Phase::CountingDown);
        assert_eq!(probe.open_tracks.load(Ordering::SeqCst), 1);
        assert_eq!(capture.summary(), &SessionSummary::default());
    }

    #[test]
    fn dropping_a_running_loop_releases_camera() {
        let factory = FakeFactory::default();
        let probe = factory.probe.clone();
        let mut capture = new_loop(factory);
        start_capturing(&mut capture, Instant::now());
        drop(capture);
        assert_eq!(probe.open_tracks.load(Ordering::SeqCst), 0);
    }
}
