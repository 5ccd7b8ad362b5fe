use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use reflx::session::TrialState;

use crate::{App, AppState};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        match self.state {
            AppState::Task => render_task(self, area, buf, bold_style, dim_style, italic_style),
            AppState::Results => render_results(self, area, buf, bold_style, dim_style),
        }
    }
}

fn render_task(
    app: &App,
    area: Rect,
    buf: &mut Buffer,
    bold_style: Style,
    dim_style: Style,
    italic_style: Style,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(7),
            Constraint::Length(2),
        ])
        .split(area);

    match app.trial.state() {
        TrialState::Idle => {
            let intro = Paragraph::new(vec![
                Line::from(Span::styled(
                    "Tap as fast as you can when the box turns GREEN.",
                    bold_style,
                )),
                Line::from(""),
                Line::from(Span::styled("press space to start", italic_style)),
            ])
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
            intro.render(chunks[1], buf);
        }
        TrialState::Waiting => {
            let stimulus = Paragraph::new(Line::from(Span::styled(
                "WAIT...",
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::BOLD),
            )))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::DarkGray)),
            );
            stimulus.render(chunks[1], buf);

            if app.premature_notice_visible() {
                let notice = Paragraph::new(Span::styled(
                    "Too early! Wait for green.",
                    Style::default()
                        .fg(Color::Red)
                        .add_modifier(Modifier::BOLD),
                ))
                .alignment(Alignment::Center);
                notice.render(chunks[0], buf);
            }
        }
        TrialState::Active => {
            let stimulus = Paragraph::new(Line::from(Span::styled(
                "TAP!",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .style(Style::default().fg(Color::Green)),
            );
            stimulus.render(chunks[1], buf);
        }
        TrialState::Finished => {}
    }

    if app.trial.state() != TrialState::Idle {
        let counter = Paragraph::new(Span::styled(
            format!(
                "Trial: {} / {}",
                app.trial.current_trial(),
                app.trial.config().total_trials
            ),
            dim_style,
        ))
        .alignment(Alignment::Center);
        counter.render(chunks[2], buf);
    }
}

fn render_results(app: &App, area: Rect, buf: &mut Buffer, bold_style: Style, dim_style: Style) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([Constraint::Min(12), Constraint::Length(2)])
        .split(area);

    let mut lines = vec![Line::from(Span::styled("Assessment Complete", bold_style))];
    lines.push(Line::from(""));

    if let Some(metrics) = &app.metrics {
        lines.push(Line::from(format!(
            "mean reaction time   {:>8.1} ms",
            metrics.mean_latency_ms
        )));
        lines.push(Line::from(format!(
            "std deviation        {:>8.1} ms",
            metrics.latency_std_dev_ms
        )));
        lines.push(Line::from(format!(
            "impulsive taps       {:>8}",
            app.trial.premature_count()
        )));
        lines.push(Line::from(format!(
            "impulsivity rate     {:>8.3}",
            metrics.impulsivity_error_rate
        )));
        lines.push(Line::from(format!(
            "focus consistency    {:>8.2}",
            metrics.focus_consistency_score
        )));

        if let Some((fastest, slowest)) = app.trial.latencies_ms().iter().minmax().into_option() {
            lines.push(Line::from(Span::styled(
                format!("fastest {fastest} ms / slowest {slowest} ms"),
                dim_style,
            )));
        }
    }

    lines.push(Line::from(""));
    match &app.submission {
        Some(Ok(report)) => {
            lines.push(Line::from(Span::styled(
                format!("Score: {:.1} / 100", report.objective_result.score),
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )));
        }
        Some(Err(err)) => {
            lines.push(Line::from(Span::styled(
                format!("Submission failed: {err}"),
                Style::default().fg(Color::Red),
            )));
            lines.push(Line::from(Span::styled(
                "results kept, press (s) to resubmit",
                dim_style,
            )));
        }
        None => {
            lines.push(Line::from(Span::styled(
                "no submit command configured, results kept locally",
                dim_style,
            )));
        }
    }

    let body = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    body.render(chunks[0], buf);

    let hints = Paragraph::new(Span::styled("(r)etry task  (esc)ape", dim_style))
        .alignment(Alignment::Center);
    hints.render(chunks[1], buf);
}
