use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Sparkline, Widget},
};

use super::{FpsTrend, MonitorSnapshot};
use crate::engine::StopReason;
use crate::strobe::MotionKind;

const ACCENT: Color = Color::Rgb(100, 200, 150);
const LABEL: Color = Color::Rgb(100, 100, 120);
const VALUE: Color = Color::Rgb(180, 180, 200);
const WARN: Color = Color::Rgb(255, 200, 100);
const ALERT: Color = Color::Rgb(230, 110, 90);

/// Write `text` from `x` on row `y`, stopping before `max_x`. Returns the
/// column after the last written cell.
fn put_str(buf: &mut Buffer, mut x: u16, y: u16, text: &str, style: Style, max_x: u16) -> u16 {
    for ch in text.chars() {
        if x >= max_x {
            break;
        }
        buf[(x, y)].set_char(ch).set_style(style);
        x += 1;
    }
    x
}

fn fps_color(fps: f64, target: f64) -> Color {
    if target <= 0.0 || fps >= target * 0.95 {
        ACCENT
    } else if fps >= target * 0.75 {
        WARN
    } else {
        ALERT
    }
}

/// Status bar at the bottom of the screen
pub struct StatusBar<'a> {
    snapshot: &'a MonitorSnapshot,
}

impl<'a> StatusBar<'a> {
    pub fn new(snapshot: &'a MonitorSnapshot) -> Self {
        Self { snapshot }
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < 4 || area.height == 0 {
            return;
        }
        let bg_style = Style::default().bg(Color::Rgb(25, 25, 35));
        for x in area.x..area.x + area.width {
            buf[(x, area.y)].set_style(bg_style);
        }

        let max_x = area.x + area.width - 1;
        let accent = Style::default().fg(ACCENT).add_modifier(Modifier::BOLD);
        let value = Style::default().fg(VALUE);
        let label = Style::default().fg(LABEL);

        let mut x = put_str(buf, area.x + 1, area.y, "◈ CADENCE", accent, max_x) + 2;
        x = put_str(buf, x, area.y, &format!("[{}]", self.snapshot.engine), value, max_x) + 2;

        let stats = &self.snapshot.stats;
        if stats.is_running {
            x = put_str(buf, x, area.y, "▶ RUNNING", accent, max_x) + 2;
        } else {
            let stopped = Style::default().fg(WARN).add_modifier(Modifier::BOLD);
            x = put_str(buf, x, area.y, "⏸ STOPPED", stopped, max_x) + 2;
        }

        if let Some(reason) = stats.last_stop_reason.filter(StopReason::is_safety) {
            let alert = Style::default().fg(ALERT);
            put_str(buf, x, area.y, &format!("safety stop: {}", reason), alert, max_x);
        }

        let help_text = "space:run r:reset +/-:rate ?:help";
        let help_len = help_text.chars().count() as u16;
        if area.width > help_len + 2 {
            put_str(buf, area.x + area.width - help_len - 1, area.y, help_text, label, max_x + 1);
        }
    }
}

/// Help overlay widget
pub struct HelpOverlay;

impl Widget for HelpOverlay {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let box_width = 44u16.min(area.width);
        let box_height = 11u16.min(area.height);
        if box_width < 10 || box_height < 4 {
            return;
        }
        let box_x = area.x + (area.width - box_width) / 2;
        let box_y = area.y + (area.height - box_height) / 2;
        let inner = Rect::new(box_x, box_y, box_width, box_height);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(ACCENT))
            .title(" Controls ")
            .style(Style::default().bg(Color::Rgb(35, 35, 45)));

        let key_style = Style::default()
            .fg(Color::Rgb(200, 200, 100))
            .add_modifier(Modifier::BOLD);
        let desc_style = Style::default().fg(VALUE);

        let controls = [
            ("q, Esc", "Quit"),
            ("Space", "Start / stop the loop"),
            ("r", "Reset state and quality"),
            ("+/-", "Raise / lower frame rate"),
            ("?", "Toggle this help"),
        ];
        let mut lines: Vec<Line> = controls
            .iter()
            .map(|(key, desc)| {
                Line::from(vec![
                    Span::styled(format!("  {:<10}", key), key_style),
                    Span::styled(*desc, desc_style),
                ])
            })
            .collect();
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "  Press any key to close",
            Style::default().fg(LABEL),
        )));

        for y in inner.y..inner.y + inner.height {
            for x in inner.x..inner.x + inner.width {
                buf[(x, y)].set_char(' ');
            }
        }
        Paragraph::new(lines).block(block).render(inner, buf);
    }
}

/// Full-screen dashboard: rates, trend, quality, phase timings and effect state.
pub struct Dashboard<'a> {
    snapshot: &'a MonitorSnapshot,
    trend: &'a FpsTrend,
    show_help: bool,
}

impl<'a> Dashboard<'a> {
    pub fn new(snapshot: &'a MonitorSnapshot, trend: &'a FpsTrend) -> Self {
        Self {
            snapshot,
            trend,
            show_help: false,
        }
    }

    pub fn show_help(mut self, show: bool) -> Self {
        self.show_help = show;
        self
    }

    fn rates(&self) -> Paragraph<'a> {
        let stats = &self.snapshot.stats;
        let target = self.snapshot.target_fps;
        let label = Style::default().fg(LABEL);
        let fps_style = Style::default()
            .fg(fps_color(stats.fps, target))
            .add_modifier(Modifier::BOLD);
        let value = Style::default().fg(VALUE);

        let lines = vec![
            Line::from(vec![
                Span::styled("fps      ", label),
                Span::styled(format!("{:>7.1}", stats.fps), fps_style),
                Span::styled("   avg ", label),
                Span::styled(format!("{:>7.1}", stats.average_fps), value),
                Span::styled("   target ", label),
                Span::styled(format!("{:.0}", target), value),
            ]),
            Line::from(vec![
                Span::styled("frames   ", label),
                Span::styled(format!("{:>7}", stats.frame_count), value),
                Span::styled("   faults ", label),
                Span::styled(format!("{}", stats.callback_faults), value),
            ]),
            Line::from(vec![
                Span::styled("timing   ", label),
                Span::styled(
                    format!(
                        "frame {:.2} ms  update {:.2} ms  render {:.2} ms",
                        stats.metrics.frame_time_ms,
                        stats.metrics.update_time_ms,
                        stats.metrics.render_time_ms
                    ),
                    value,
                ),
            ]),
            Line::from(vec![
                Span::styled("load     ", label),
                Span::styled(
                    format!(
                        "{} pts  {:.2} ms{}",
                        self.snapshot.drawn_points,
                        self.snapshot.render_cost_ms,
                        self.snapshot
                            .load_phase
                            .map(|p| format!("  ({})", p))
                            .unwrap_or_default()
                    ),
                    value,
                ),
            ]),
        ];

        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Frame rate ")
                .border_style(Style::default().fg(LABEL)),
        )
    }

    fn quality_gauge(&self) -> Gauge<'a> {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Quality ")
            .border_style(Style::default().fg(LABEL));
        match &self.snapshot.quality {
            Some(report) => Gauge::default()
                .block(block)
                .gauge_style(Style::default().fg(ACCENT).bg(Color::Rgb(30, 30, 40)))
                .ratio(report.multiplier.clamp(0.0, 1.0))
                .label(format!(
                    "{} (level {}/{})",
                    report.label,
                    report.level + 1,
                    report.level_count
                )),
            None => Gauge::default()
                .block(block)
                .gauge_style(Style::default().fg(LABEL))
                .ratio(1.0)
                .label("fixed"),
        }
    }

    fn strobe_line(&self) -> Paragraph<'a> {
        let label = Style::default().fg(LABEL);
        let line = match self.snapshot.strobe {
            Some(state) => {
                let motion_style = match state.motion {
                    MotionKind::Frozen => Style::default().fg(WARN).add_modifier(Modifier::BOLD),
                    MotionKind::Growing => Style::default().fg(ACCENT),
                    MotionKind::Shrinking => Style::default().fg(Color::Rgb(150, 150, 255)),
                };
                Line::from(vec![
                    Span::styled("phase ", label),
                    Span::styled(format!("{:.3}", state.phase), Style::default().fg(VALUE)),
                    Span::styled("  motion ", label),
                    Span::styled(state.motion.to_string(), motion_style),
                    Span::styled("  aliasing ", label),
                    Span::styled(format!("{:.2}", state.aliasing_strength), Style::default().fg(VALUE)),
                    Span::styled("  morph ", label),
                    Span::styled(format!("{:.2}", state.morph_factor), Style::default().fg(VALUE)),
                ])
            }
            None => Line::from(Span::styled("waiting for first update", label)),
        };
        Paragraph::new(line).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Stroboscopic ")
                .border_style(Style::default().fg(LABEL)),
        )
    }
}

impl Widget for Dashboard<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height < 3 {
            StatusBar::new(self.snapshot).render(area, buf);
            return;
        }

        let body = Rect::new(area.x, area.y, area.width, area.height - 1);
        let status_area = Rect::new(area.x, area.y + area.height - 1, area.width, 1);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(6),
                Constraint::Min(4),
                Constraint::Length(3),
                Constraint::Length(3),
            ])
            .split(body);

        self.rates().render(chunks[0], buf);

        let samples = self.trend.to_vec();
        let ceiling = self.trend.max().max(self.snapshot.target_fps.round() as u64).max(1);
        Sparkline::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" FPS trend ")
                    .border_style(Style::default().fg(LABEL)),
            )
            .data(&samples[..])
            .max(ceiling)
            .style(Style::default().fg(ACCENT))
            .render(chunks[1], buf);

        self.quality_gauge().render(chunks[2], buf);
        self.strobe_line().render(chunks[3], buf);

        StatusBar::new(self.snapshot).render(status_area, buf);

        if self.show_help {
            HelpOverlay.render(area, buf);
        }
    }
}
