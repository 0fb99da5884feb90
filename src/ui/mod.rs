use std::{mem, sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use gpui::{
    AnyElement, App, AppContext, Context, IntoElement, ObjectFit, ParentElement, Render,
    RenderImage, SharedString, Styled, StyledImage, TitlebarOptions, Window, WindowOptions, div,
    img, px,
};
use gpui::prelude::FluentBuilder;
use gpui_component::{
    ActiveTheme, Root, StyledExt,
    button::{Button, ButtonVariants},
    h_flex,
    tag::Tag,
    v_flex,
};
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::{
    config::{Config, ModelConfig},
    model_download::{DownloadEvent, ensure_pose_model_ready},
    pipeline::{
        CaptureCommand, CaptureWorker, DeviceSessionFactory, OverlayUpdate, Phase, SessionSummary,
        capture::LoopTiming,
    },
    types::{FacingMode, OverlayImage},
};

mod capture_view;
mod download;
mod render_util;
mod result_view;

const OVERLAY_WIDTH: f32 = 640.0;
const DEFAULT_OVERLAY_RATIO: f32 = 4.0 / 3.0;
const CAPTION_COLOR: u32 = 0x39ff14;
// Skeleton snapshots beyond this are dropped by the worker.
const UPDATE_QUEUE_DEPTH: usize = 8;

pub fn launch_ui(app: &mut App, config: Config) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("Pose Overlay".into()),
            appears_transparent: false,
            traffic_light_position: None,
        }),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| AppView::new(config));
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct AppView {
    screen: Screen,
    config: Config,
    worker: CaptureWorker,
    update_rx: Receiver<OverlayUpdate>,
    download_rx: Receiver<DownloadMessage>,
    phase: Phase,
    caption: Option<Caption>,
    latest_image: Option<Arc<RenderImage>>,
    overlay_size: Option<(u32, u32)>,
    session_error: Option<String>,
    facing_prompt_open: bool,
}

enum Screen {
    Download(DownloadState),
    Capture,
    Result(SessionSummary),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Caption {
    Countdown(u32),
    Analyzing,
}

struct DownloadState {
    downloaded: u64,
    total: Option<u64>,
    message: String,
    error: Option<String>,
    finished: bool,
}

impl DownloadState {
    fn new() -> Self {
        Self {
            downloaded: 0,
            total: None,
            message: "Checking pose model...".to_string(),
            error: None,
            finished: false,
        }
    }
}

enum DownloadMessage {
    Event(DownloadEvent),
    Error(String),
}

impl AppView {
    fn new(config: Config) -> Self {
        let (update_tx, update_rx) = bounded(UPDATE_QUEUE_DEPTH);
        let worker = CaptureWorker::spawn(
            DeviceSessionFactory::new(&config),
            LoopTiming::from(&config.timing),
            config.render.clone(),
            update_tx,
        );

        let (download_tx, download_rx) = unbounded();
        download::spawn_model_download(config.model.clone(), download_tx);

        Self {
            screen: Screen::Download(DownloadState::new()),
            config,
            worker,
            update_rx,
            download_rx,
            phase: Phase::Idle,
            caption: None,
            latest_image: None,
            overlay_size: None,
            session_error: None,
            facing_prompt_open: false,
        }
    }

    fn request_start(&mut self, facing: Option<FacingMode>) {
        if !self.phase.can_start() {
            return;
        }
        self.facing_prompt_open = false;
        self.session_error = None;
        self.worker.send(CaptureCommand::Start(facing));
    }

    fn request_stop(&mut self) {
        if self.phase.can_stop() {
            self.worker.send(CaptureCommand::Stop);
        }
    }
}

impl Render for AppView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        let mut screen = mem::replace(&mut self.screen, Screen::Capture);
        if !matches!(screen, Screen::Download(_)) {
            if let Some(summary) = self.drain_updates(window, cx) {
                screen = Screen::Result(summary);
            }
        }

        let view = match screen {
            Screen::Download(mut state) => {
                self.poll_download_events(&mut state);
                let view = self.render_download_view(&state, cx);
                screen = if state.finished && state.error.is_none() {
                    Screen::Capture
                } else {
                    Screen::Download(state)
                };
                view
            }
            Screen::Capture => {
                screen = Screen::Capture;
                self.render_capture(cx)
            }
            Screen::Result(summary) => {
                let view = self.render_result(&summary, cx);
                screen = Screen::Result(summary);
                view
            }
        };

        self.screen = screen;
        view
    }
}
