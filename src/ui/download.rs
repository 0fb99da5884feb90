use super::{
    ActiveTheme, AnyElement, AppView, Button, ButtonVariants, Context, DownloadEvent,
    DownloadMessage, DownloadState, IntoElement, ModelConfig, ParentElement, Screen, Sender,
    SharedString, Styled, StyledExt, Tag, div, ensure_pose_model_ready, h_flex, thread, unbounded,
    v_flex,
};

impl AppView {
    pub(super) fn poll_download_events(&mut self, state: &mut DownloadState) {
        while let Ok(msg) = self.download_rx.try_recv() {
            match msg {
                DownloadMessage::Event(DownloadEvent::AlreadyPresent) => {
                    state.message = "Pose model already present".to_string();
                }
                DownloadMessage::Event(DownloadEvent::Started { total }) => {
                    state.total = total;
                    state.message = "Downloading pose model...".to_string();
                }
                DownloadMessage::Event(DownloadEvent::Progress { downloaded, total }) => {
                    state.downloaded = downloaded;
                    state.total = total;
                }
                DownloadMessage::Event(DownloadEvent::Finished) => {
                    state.finished = true;
                    state.message = "Pose model ready".to_string();
                }
                DownloadMessage::Error(err) => {
                    state.error = Some(err);
                    state.finished = false;
                    state.message = "Pose model download failed".to_string();
                }
            }
        }
    }

    fn retry_download(&mut self) {
        let (download_tx, download_rx) = unbounded();
        self.download_rx = download_rx;
        spawn_model_download(self.config.model.clone(), download_tx);
        self.screen = Screen::Download(DownloadState::new());
    }

    pub(super) fn render_download_view(
        &self,
        state: &DownloadState,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        let bar = progress_bar_string(state.downloaded, state.total);

        let (status_icon, status_color) = if state.finished && state.error.is_none() {
            ("✓", theme.success)
        } else if state.error.is_some() {
            ("✗", theme.accent)
        } else {
            ("⟳", theme.foreground)
        };

        let mut container = v_flex()
            .gap_3()
            .p_6()
            .rounded_lg()
            .border_1()
            .border_color(theme.border)
            .bg(theme.group_box)
            .child(
                div()
                    .text_color(status_color)
                    .font_semibold()
                    .child(format!("{status_icon} {}", state.message)),
            )
            .child(
                div()
                    .px_3()
                    .py_2()
                    .rounded_md()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.muted)
                    .font_family(theme.mono_font_family.clone())
                    .text_color(theme.foreground)
                    .child(bar),
            )
            .child(
                div()
                    .text_sm()
                    .text_color(theme.muted_foreground)
                    .child(self.config.model.path.display().to_string()),
            );

        if let Some(err) = &state.error {
            container = container
                .child(Tag::danger().rounded_full().child(format!("Error: {err}")))
                .child(
                    h_flex()
                        .gap_2()
                        .child(
                            Button::new(SharedString::from("download-retry"))
                                .primary()
                                .label("Retry")
                                .on_click(cx.listener(|this, _, _, cx| {
                                    this.retry_download();
                                    cx.notify();
                                })),
                        )
                        // Starting a session retries the download and reports the failure inline.
                        .child(
                            Button::new(SharedString::from("download-skip"))
                                .outline()
                                .label("Continue")
                                .on_click(cx.listener(|this, _, _, cx| {
                                    this.screen = Screen::Capture;
                                    cx.notify();
                                })),
                        ),
                );
        }

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .bg(theme.background)
            .child(container)
            .into_any_element()
    }
}

pub(super) fn spawn_model_download(model: ModelConfig, tx: Sender<DownloadMessage>) {
    thread::spawn(move || {
        let result = ensure_pose_model_ready(&model.path, &model.url, |event| {
            let _ = tx.send(DownloadMessage::Event(event));
        });

        if let Err(err) = result {
            log::error!("failed to download pose model: {err:?}");
            let _ = tx.send(DownloadMessage::Error(format!("{err:#}")));
        }
    });
}

fn progress_bar_string(downloaded: u64, total: Option<u64>) -> String {
    const BAR_LEN: usize = 30;
    match total {
        Some(total) if total > 0 => {
            let pct = (downloaded as f64 / total as f64).clamp(0.0, 1.0);
            let filled = ((pct * BAR_LEN as f64).round() as usize).min(BAR_LEN);
            format!(
                "[{}{}] {:>5.1}%",
                "=".repeat(filled),
                " ".repeat(BAR_LEN - filled),
                pct * 100.0
            )
        }
        _ => format!("[{:<BAR_LEN$}] {} KB", ">", downloaded / 1024),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_bar_fills_with_known_total() {
        let bar = progress_bar_string(50, Some(100));
        assert!(bar.starts_with(&format!("[{}{}]", "=".repeat(15), " ".repeat(15))));
        assert!(bar.ends_with(" 50.0%"));
    }

    #[test]
    fn progress_bar_clamps_overshoot() {
        let bar = progress_bar_string(300, Some(100));
        assert!(bar.contains(&"=".repeat(30)));
        assert!(bar.ends_with("100.0%"));
    }

    #[test]
    fn progress_bar_without_total_reports_kilobytes() {
        assert!(progress_bar_string(4096, None).ends_with("] 4 KB"));
        assert!(progress_bar_string(10, Some(0)).ends_with("] 0 KB"));
    }
}
