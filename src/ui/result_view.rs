use super::{
    ActiveTheme, AnyElement, AppView, Button, ButtonVariants, Context, IntoElement, ParentElement,
    Screen, SessionSummary, SharedString, Styled, StyledExt, div, h_flex, px, v_flex,
};

fn summary_rows(summary: &SessionSummary) -> Vec<(&'static str, String)> {
    let detection_rate = if summary.frames_analyzed > 0 {
        summary.poses_detected as f64 / summary.frames_analyzed as f64 * 100.0
    } else {
        0.0
    };

    vec![
        ("Duration", format!("{:.1} s", summary.duration.as_secs_f64())),
        ("Ticks", summary.ticks.to_string()),
        ("Frames analyzed", summary.frames_analyzed.to_string()),
        (
            "Poses detected",
            format!("{} ({detection_rate:.0}%)", summary.poses_detected),
        ),
        ("Skipped ticks", summary.skipped_ticks.to_string()),
        ("Failed ticks", summary.failed_ticks.to_string()),
    ]
}

impl AppView {
    pub(super) fn render_result(
        &mut self,
        summary: &SessionSummary,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let new_session = Button::new(SharedString::from("session-new"))
            .primary()
            .label("New session")
            .on_click(cx.listener(|this, _, _, cx| {
                this.session_error = None;
                this.screen = Screen::Capture;
                cx.notify();
            }));

        let theme = cx.theme();
        let rows = summary_rows(summary).into_iter().map(|(label, value)| {
            h_flex()
                .justify_between()
                .gap_4()
                .child(
                    div()
                        .text_sm()
                        .text_color(theme.muted_foreground)
                        .child(label),
                )
                .child(div().text_color(theme.foreground).child(value))
        });

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .bg(theme.background)
            .child(
                v_flex()
                    .gap_3()
                    .p_6()
                    .min_w(px(280.0))
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.group_box)
                    .child(
                        div()
                            .text_color(theme.success)
                            .font_semibold()
                            .child("✓ Session complete"),
                    )
                    .children(rows)
                    .child(new_session),
            )
            .into_any_element()
    }
}
