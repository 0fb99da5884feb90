use super::render_util::overlay_to_image;
use super::{
    ActiveTheme, AnyElement, AppView, Arc, Button, ButtonVariants, CAPTION_COLOR, Caption, Context,
    DEFAULT_OVERLAY_RATIO, FacingMode, FluentBuilder, IntoElement, OVERLAY_WIDTH, ObjectFit,
    OverlayUpdate, ParentElement, Phase, RenderImage, SessionSummary, SharedString, Styled,
    StyledExt, StyledImage, Tag, Window, div, h_flex, img, px, v_flex,
};

impl Caption {
    fn text(&self) -> String {
        match self {
            Caption::Countdown(n) => n.to_string(),
            Caption::Analyzing => "analyzing...".to_string(),
        }
    }

    /// Font size and downward offset from the centre, both in pixels.
    fn placement(&self, overlay_height: f32) -> (f32, f32) {
        match self {
            Caption::Countdown(_) => (overlay_height / 3.0, 0.0),
            Caption::Analyzing => {
                let size = overlay_height / 12.0;
                (size, size * 2.0)
            }
        }
    }
}

fn phase_label(phase: Phase) -> &'static str {
    match phase {
        Phase::Idle => "Ready",
        Phase::Starting => "Opening camera and loading model...",
        Phase::CountingDown => "Get into position",
        Phase::Capturing => "Tracking pose",
        Phase::Stopping => "Stopping...",
        Phase::Done => "Session finished",
        Phase::Failed => "Session failed",
    }
}

impl AppView {
    /// Applies queued worker updates. Returns the summary once a session
    /// has fully finished.
    pub(super) fn drain_updates(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> Option<SessionSummary> {
        let mut finished = None;

        while let Ok(update) = self.update_rx.try_recv() {
            match update {
                OverlayUpdate::Phase(phase) => {
                    log::debug!("ui phase -> {phase:?}");
                    self.phase = phase;
                }
                OverlayUpdate::Countdown(remaining) => {
                    self.caption = Some(Caption::Countdown(remaining));
                    self.clear_image(window, cx);
                }
                OverlayUpdate::Skeleton(overlay) => {
                    self.caption = None;
                    self.overlay_size = Some((overlay.width, overlay.height));
                    if let Some(image) = overlay_to_image(&overlay) {
                        self.replace_latest_image(image, window, cx);
                    }
                }
                OverlayUpdate::Analyzing => {
                    self.caption = Some(Caption::Analyzing);
                    self.clear_image(window, cx);
                }
                OverlayUpdate::Cleared => {
                    self.caption = None;
                    self.clear_image(window, cx);
                }
                OverlayUpdate::Finished(summary) => finished = Some(summary),
                OverlayUpdate::Failed(message) => {
                    self.caption = None;
                    self.clear_image(window, cx);
                    self.session_error = Some(message);
                }
            }
        }

        finished
    }

    pub(super) fn render_capture(&mut self, cx: &mut Context<'_, Self>) -> AnyElement {
        let overlay_height = OVERLAY_WIDTH / self.overlay_ratio();

        let caption_layer = self.caption.map(|caption| {
            let (size, offset) = caption.placement(overlay_height);
            div()
                .absolute()
                .top_0()
                .left_0()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .child(
                    div()
                        .relative()
                        .top(px(offset))
                        .text_size(px(size))
                        .font_bold()
                        .text_color(gpui::rgb(CAPTION_COLOR))
                        .child(caption.text()),
                )
        });

        let overlay_shell = div()
            .relative()
            .w(px(OVERLAY_WIDTH))
            .h(px(overlay_height))
            .overflow_hidden()
            .rounded_lg()
            .bg(gpui::rgb(0x000000))
            .when_some(self.latest_image.clone(), |this, image| {
                this.child(img(image).size_full().object_fit(ObjectFit::Contain))
            })
            .when_some(caption_layer, |this, layer| this.child(layer));

        let controls = self.render_controls(cx);
        let theme = cx.theme();

        let status = h_flex()
            .gap_2()
            .items_center()
            .child(
                div()
                    .text_color(if self.phase.can_stop() {
                        theme.success
                    } else {
                        theme.muted_foreground
                    })
                    .child(if self.phase.can_stop() { "●" } else { "○" }),
            )
            .child(
                div()
                    .text_sm()
                    .text_color(theme.foreground)
                    .child(phase_label(self.phase)),
            );

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .gap_3()
            .p_4()
            .bg(theme.background)
            .child(status)
            .child(overlay_shell)
            .child(controls)
            .when_some(self.session_error.clone(), |this, err| {
                this.child(Tag::danger().rounded_full().child(format!("Error: {err}")))
            })
            .into_any_element()
    }

    fn render_controls(&mut self, cx: &mut Context<'_, Self>) -> AnyElement {
        let mut controls = h_flex().gap_2().items_center();

        if self.phase.can_start() {
            if self.facing_prompt_open {
                controls = controls
                    .child(facing_button(FacingMode::User, cx))
                    .child(facing_button(FacingMode::Environment, cx))
                    .child(
                        Button::new(SharedString::from("facing-cancel"))
                            .outline()
                            .label("Cancel")
                            .on_click(cx.listener(|this, _, _, cx| {
                                this.facing_prompt_open = false;
                                cx.notify();
                            })),
                    );
            } else {
                controls = controls.child(
                    Button::new(SharedString::from("session-start"))
                        .primary()
                        .label("Start")
                        .on_click(cx.listener(|this, _, _, cx| {
                            if this.config.camera.prompt_facing {
                                this.facing_prompt_open = true;
                            } else {
                                this.request_start(None);
                            }
                            cx.notify();
                        })),
                );
            }
        }

        if self.phase.can_stop() {
            controls = controls.child(
                Button::new(SharedString::from("session-stop"))
                    .outline()
                    .label("Stop")
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.request_stop();
                        cx.notify();
                    })),
            );
        }

        controls.into_any_element()
    }

    fn overlay_ratio(&self) -> f32 {
        match self.overlay_size {
            Some((width, height)) if height > 0 => width as f32 / height as f32,
            _ => DEFAULT_OVERLAY_RATIO,
        }
    }

    fn replace_latest_image(
        &mut self,
        new_image: Arc<RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.latest_image.replace(new_image) {
            // The sprite atlas keeps every texture until it is dropped explicitly.
            cx.drop_image(old_image, Some(window));
        }
    }

    fn clear_image(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        if let Some(old_image) = self.latest_image.take() {
            cx.drop_image(old_image, Some(window));
        }
    }
}

fn facing_button(facing: FacingMode, cx: &mut Context<'_, AppView>) -> Button {
    let id = match facing {
        FacingMode::User => "facing-user",
        FacingMode::Environment => "facing-environment",
    };
    Button::new(SharedString::from(id))
        .primary()
        .label(facing.label())
        .on_click(cx.listener(move |this, _, _, cx| {
            this.request_start(Some(facing));
            cx.notify();
        }))
}
