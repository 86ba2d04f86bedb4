//! Dashboard drawing. Everything here is a pure function of one [`FrameData`];
//! nothing touches the network or blocks.

use crate::monitor::constants::{
    COMMON_PORTS, COMPACT_MIN_HEIGHT, COMPACT_MIN_WIDTH, WEB_CHECK_PORTS,
};
use crate::monitor::portcheck::{service_name, PortCheckReport};
use crate::monitor::session::{Session, TargetMonitor, ViewState};
use crate::monitor::statistics::{Quality, Statistics};
use crate::monitor::store::Snapshot;
use crate::tui::theme::Theme;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Line as CanvasLine};
use ratatui::widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph};
use ratatui::Frame;
use std::sync::Arc;

const TARGET_LIST_WIDTH: u16 = 30;
const STATS_HEIGHT: u16 = 8;
const PORT_CHECK_HEIGHT: u16 = 3;
/// Reports with more ports than this list only the open ones.
const PORT_CHECK_LIST_MAX: usize = 4;
/// Below this width the jitter panel does not fit beside the statistics.
const SIDE_BY_SIDE_MIN_WIDTH: u16 = 100;

/// Everything one frame shows.
pub struct FrameData<'a> {
    pub session: &'a Session,
    pub view: &'a ViewState,
    /// One snapshot per target, indexed like `session.targets()`.
    pub snapshots: &'a [Arc<Snapshot>],
    /// Statistics of each snapshot, computed once per change.
    pub stats: &'a [Option<Statistics>],
    pub theme: &'a Theme,
    pub notice: Option<&'a str>,
}

impl FrameData<'_> {
    fn active_monitor(&self) -> Option<&TargetMonitor> {
        self.session.target(self.view.active)
    }

    fn active_snapshot(&self) -> Option<&Snapshot> {
        self.snapshots.get(self.view.active.0).map(Arc::as_ref)
    }

    fn active_stats(&self) -> Option<&Statistics> {
        self.stats.get(self.view.active.0).and_then(Option::as_ref)
    }
}

/// True when the terminal is too small for anything but the graph.
pub fn is_compact(area: Rect) -> bool {
    area.width < COMPACT_MIN_WIDTH || area.height < COMPACT_MIN_HEIGHT
}

pub fn draw(f: &mut Frame, data: &FrameData) {
    let area = f.area();
    f.render_widget(Block::default().style(data.theme.text()), area);

    if is_compact(area) {
        draw_graph(f, data, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(area);
    draw_header(f, data, chunks[0]);

    let main = if data.session.targets().len() > 1 {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(TARGET_LIST_WIDTH), Constraint::Min(20)])
            .split(chunks[1]);
        draw_target_list(f, data, body[0]);
        body[1]
    } else {
        chunks[1]
    };
    draw_main(f, data, main);
    draw_footer(f, data, chunks[2]);

    if data.view.show_help {
        draw_help_overlay(f, data.theme, area);
    }
}

fn draw_main(f: &mut Frame, data: &FrameData, area: Rect) {
    let port_check = data.active_monitor().and_then(TargetMonitor::port_check);
    let mut constraints = vec![Constraint::Min(5), Constraint::Length(STATS_HEIGHT)];
    if port_check.is_some() {
        constraints.push(Constraint::Length(PORT_CHECK_HEIGHT));
    }
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    draw_graph(f, data, chunks[0]);

    let stats = data.active_stats();
    if data.view.show_jitter && area.width >= SIDE_BY_SIDE_MIN_WIDTH {
        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);
        draw_statistics(f, data, stats, bottom[0]);
        draw_jitter_panel(f, data, stats, bottom[1]);
    } else {
        draw_statistics(f, data, stats, chunks[1]);
    }

    if let (Some(report), Some(chunk)) = (port_check, chunks.get(2)) {
        draw_port_check(f, data.theme, &report, *chunk);
    }
}

fn port_label(port: u16) -> String {
    match service_name(port) {
        Some(name) => format!("{}/{}", port, name),
        None => format!("tcp/{}", port),
    }
}

fn draw_port_check(f: &mut Frame, theme: &Theme, report: &PortCheckReport, area: Rect) {
    let value = Style::new().fg(theme.highlight);
    let mut spans = vec![Span::styled(" ", theme.label())];
    if report.ports.len() <= PORT_CHECK_LIST_MAX {
        for (port, status) in &report.ports {
            spans.push(Span::styled(format!("{} ", port_label(*port)), theme.label()));
            spans.push(Span::styled(format!("{}   ", status), value));
        }
    } else {
        let progress = if report.is_complete() {
            format!("{} ports ", report.ports.len())
        } else {
            format!("{}/{} checked ", report.checked(), report.ports.len())
        };
        spans.push(Span::styled(progress, theme.label()));
        spans.push(Span::styled("│ open: ", theme.label()));
        let open: Vec<String> = report
            .open_ports()
            .map(|(port, rtt)| format!("{} {:.1}ms", port_label(port), rtt.as_secs_f64() * 1000.0))
            .collect();
        if open.is_empty() {
            spans.push(Span::styled("none", value));
        } else {
            spans.push(Span::styled(open.join("  "), value));
        }
    }
    let title = format!(" {} ", report.kind);
    f.render_widget(Paragraph::new(Line::from(spans)).block(panel_block(theme, &title)), area);
}

fn panel_block<'a>(theme: &Theme, title: &'a str) -> Block<'a> {
    Block::default()
        .title(title)
        .title_style(theme.heading())
        .borders(Borders::ALL)
        .border_style(theme.border_style())
}

fn status_word(data: &FrameData, monitor: &TargetMonitor) -> Option<(&'static str, Style)> {
    let theme = data.theme;
    if monitor.is_unreachable() {
        Some(("UNREACHABLE", Style::new().fg(theme.crit).add_modifier(Modifier::BOLD)))
    } else if monitor.is_complete() {
        Some(("COMPLETE", Style::new().fg(theme.good)))
    } else if data.view.paused {
        Some(("PAUSED", Style::new().fg(theme.warn).add_modifier(Modifier::BOLD)))
    } else {
        None
    }
}

fn draw_header(f: &mut Frame, data: &FrameData, area: Rect) {
    let theme = data.theme;
    let Some(monitor) = data.active_monitor() else {
        return;
    };
    let snapshot = data.active_snapshot();
    let quality = data.active_stats().map_or(Quality::Unknown, Statistics::quality);
    let quality_color = theme.quality_color(quality);
    let sep = Span::styled("│", theme.border_style());

    let mut spans = vec![
        Span::styled(" RustyPing ", theme.heading()),
        sep.clone(),
        Span::styled(format!(" {} ", monitor.target.label), Style::new().fg(theme.highlight)),
        sep.clone(),
        Span::styled(format!(" {} ", data.session.method()), theme.label()),
        sep.clone(),
        Span::styled(" ● ", Style::new().fg(quality_color)),
        Span::styled(
            format!("{} ", quality),
            Style::new().fg(quality_color).add_modifier(Modifier::BOLD),
        ),
        sep.clone(),
        Span::styled(
            format!(" probes: {} ", snapshot.map_or(0, |s| s.recorded())),
            theme.label(),
        ),
    ];
    if let Some(dns) = monitor.target.dns_time {
        spans.push(sep.clone());
        spans.push(Span::styled(
            format!(" dns: {:.1}ms ", dns.as_secs_f64() * 1000.0),
            theme.label(),
        ));
    }
    if let Some((word, style)) = status_word(data, monitor) {
        spans.push(sep);
        spans.push(Span::styled(format!(" {} ", word), style));
    }

    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme.border_style());
    if let Some(notice) = data.notice {
        block = block.title_bottom(Span::styled(format!(" {} ", notice), Style::new().fg(theme.warn)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn draw_target_list(f: &mut Frame, data: &FrameData, area: Rect) {
    let theme = data.theme;
    let items: Vec<ListItem> = data
        .session
        .targets()
        .iter()
        .enumerate()
        .map(|(i, monitor)| {
            let stats = data.stats.get(i).and_then(Option::as_ref);
            let quality = stats.map_or(Quality::Unknown, Statistics::quality);
            let latency = match stats.and_then(Statistics::current) {
                Some(rtt) => format!("{:>7.1}ms", rtt.as_secs_f64() * 1000.0),
                None if monitor.is_unreachable() => "  unreach".to_string(),
                None => "      ---".to_string(),
            };
            let mut style = Style::new().fg(theme.fg);
            if i == data.view.active.0 {
                style = style.bg(theme.selected_bg).add_modifier(Modifier::BOLD);
            }
            let width = usize::from(TARGET_LIST_WIDTH.saturating_sub(17));
            let line = Line::from(vec![
                Span::styled(format!("{} ", i + 1), theme.label()),
                Span::styled("● ", Style::new().fg(theme.quality_color(quality))),
                Span::styled(format!("{:<width$.width$}", monitor.target.address, width = width), style),
                Span::styled(latency, style),
            ]);
            ListItem::new(line)
        })
        .collect();

    f.render_widget(List::new(items).block(panel_block(theme, " Targets ")), area);
}

/// Vertical bounds for the graph: always includes 0..50ms, padded by 10%.
pub fn graph_bounds(latencies: &[Option<f64>]) -> (f64, f64) {
    let max = latencies
        .iter()
        .flatten()
        .fold(0.0_f64, |a, b| a.max(*b))
        .max(50.0);
    let padding = max.max(10.0) * 0.1;
    (0.0, max + padding)
}

fn draw_graph(f: &mut Frame, data: &FrameData, area: Rect) {
    let theme = *data.theme;
    let latencies = data
        .active_snapshot()
        .map(Snapshot::latencies_ms)
        .unwrap_or_default();

    let title = match data.active_monitor() {
        Some(m) => format!(" {} │ last {} samples ", m.target.ip, latencies.len()),
        None => String::new(),
    };
    let block = Block::default()
        .title(title)
        .title_style(theme.heading())
        .borders(Borders::ALL)
        .border_style(theme.border_style());

    if latencies.is_empty() {
        let waiting = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled("  Waiting for samples...", theme.label())),
        ])
        .block(block);
        f.render_widget(waiting, area);
        return;
    }

    let (y_min, y_max) = graph_bounds(&latencies);
    // two braille dot columns per cell; x is measured in dots
    let width_dots = f64::from(area.width.saturating_sub(2)) * 2.0;

    let canvas = Canvas::default()
        .block(block)
        .background_color(theme.bg)
        .marker(symbols::Marker::Braille)
        .x_bounds([0.0, width_dots])
        .y_bounds([y_min, y_max])
        .paint(move |ctx| {
            let right_edge = width_dots - 1.0;
            for (age, value) in latencies.iter().rev().enumerate() {
                let x = (right_edge - age as f64).floor();
                if x < 0.0 {
                    break;
                }
                let (y, color) = match value {
                    Some(ms) => (*ms, theme.graph_color(ms / y_max)),
                    None => (y_max, theme.missed),
                };
                ctx.draw(&CanvasLine {
                    x1: x,
                    y1: y_min,
                    x2: x,
                    y2: y,
                    color,
                });
            }
        });
    f.render_widget(canvas, area);
}

fn ms(value: f64) -> String {
    format!("{:.1}ms", value)
}

fn draw_statistics(f: &mut Frame, data: &FrameData, stats: Option<&Statistics>, area: Rect) {
    let theme = data.theme;
    let block = panel_block(theme, " Statistics ");
    let (Some(stats), Some(snapshot), Some(monitor)) =
        (stats, data.active_snapshot(), data.active_monitor())
    else {
        f.render_widget(Paragraph::new("").block(block), area);
        return;
    };

    let value = Style::new().fg(theme.highlight);
    let current = match stats.current() {
        Some(rtt) => {
            let v = rtt.as_secs_f64() * 1000.0;
            Span::styled(ms(v), Style::new().fg(theme.latency_color(v)).add_modifier(Modifier::BOLD))
        }
        None => Span::styled("lost", Style::new().fg(theme.crit)),
    };
    let loss_pct = stats.loss_rate() * 100.0;
    let loss_color = if loss_pct == 0.0 {
        theme.good
    } else if loss_pct < 5.0 {
        theme.warn
    } else {
        theme.crit
    };

    let lines = vec![
        Line::from(vec![
            Span::styled(" Current  ", theme.label()),
            current,
            Span::styled("   Avg  ", theme.label()),
            Span::styled(ms(stats.mean_ms()), value),
            Span::styled("   Recent  ", theme.label()),
            Span::styled(stats.recent_avg_ms().map_or_else(|| "-".to_string(), ms), value),
        ]),
        Line::from(vec![
            Span::styled(" Min      ", theme.label()),
            Span::styled(ms(stats.min().as_secs_f64() * 1000.0), value),
            Span::styled("   Max  ", theme.label()),
            Span::styled(ms(stats.max().as_secs_f64() * 1000.0), value),
        ]),
        Line::from(vec![
            Span::styled(" P50      ", theme.label()),
            Span::styled(ms(stats.percentile_ms(0.5)), value),
            Span::styled("   P95  ", theme.label()),
            Span::styled(ms(stats.percentile_ms(0.95)), value),
            Span::styled("   P99  ", theme.label()),
            Span::styled(ms(stats.percentile_ms(0.99)), value),
        ]),
        Line::from(vec![
            Span::styled(" Jitter   ", theme.label()),
            Span::styled(ms(stats.jitter_ms()), value),
            Span::styled("   Loss ", theme.label()),
            Span::styled(format!("{:.1}%", loss_pct), Style::new().fg(loss_color)),
            Span::styled("   Uptime  ", theme.label()),
            Span::styled(format!("{:.1}%", snapshot.uptime_pct()), value),
        ]),
        Line::from(vec![
            Span::styled(" Window   ", theme.label()),
            Span::styled(format!("{}/{}", snapshot.len(), snapshot.capacity()), value),
            Span::styled("   Interval  ", theme.label()),
            Span::styled(format!("{}ms", data.session.state().interval().as_millis()), value),
            Span::styled("   Skipped  ", theme.label()),
            Span::styled(monitor.skipped_ticks().to_string(), value),
        ]),
    ];

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_jitter_panel(f: &mut Frame, data: &FrameData, stats: Option<&Statistics>, area: Rect) {
    let theme = data.theme;
    let block = panel_block(theme, " Jitter ");
    let inner = block.inner(area);
    f.render_widget(block, area);
    let Some(stats) = stats else {
        return;
    };

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(1), Constraint::Min(0)])
        .split(inner);

    let jitter = stats.jitter_ms();
    let jitter_color = if jitter < 5.0 {
        theme.good
    } else if jitter < 20.0 {
        theme.warn
    } else {
        theme.crit
    };
    let text = vec![
        Line::from(vec![
            Span::styled(" Jitter     ", theme.label()),
            Span::styled(ms(jitter), Style::new().fg(jitter_color).add_modifier(Modifier::BOLD)),
        ]),
        Line::from(vec![
            Span::styled(" Spread     ", theme.label()),
            Span::styled(
                ms((stats.max() - stats.min()).as_secs_f64() * 1000.0),
                Style::new().fg(theme.highlight),
            ),
        ]),
        Line::from(Span::styled(" Stability", theme.label())),
    ];
    f.render_widget(Paragraph::new(text), rows[0]);

    let stability = stats.stability();
    let gauge = Gauge::default()
        .gauge_style(Style::new().fg(theme.graph_color(1.0 - stability / 100.0)).bg(theme.bg))
        .percent(stability.round().clamp(0.0, 100.0) as u16)
        .label(format!("{:.0}%", stability));
    f.render_widget(gauge, rows[1]);
}

fn draw_footer(f: &mut Frame, data: &FrameData, area: Rect) {
    let theme = data.theme;
    let mut spans = Vec::new();
    let hints: &[(&str, &str)] = &[
        ("q", "quit"),
        ("p", if data.view.paused { "resume" } else { "pause" }),
        ("tab", "target"),
        ("↑↓", "speed"),
        ("←→", "history"),
        ("j", "jitter"),
        ("r", "reset"),
        ("w", "web"),
        ("s", "scan"),
        ("?", "help"),
    ];
    for (key, label) in hints {
        spans.push(Span::styled(format!(" {}", key), theme.key_style()));
        spans.push(Span::styled(format!(" {} ", label), theme.label()));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_help_overlay(f: &mut Frame, theme: &Theme, area: Rect) {
    let keys: &[(&str, &str)] = &[
        ("q / Esc / Ctrl+C", "Quit"),
        ("p / Space", "Pause or resume probing"),
        ("Tab / Shift+Tab", "Next / previous target"),
        ("1-9", "Select target"),
        ("Up / Down", "Probe faster / slower"),
        ("Left / Right", "Shorter / longer history"),
        ("j", "Toggle jitter panel"),
        ("r", "Reset statistics of this target"),
        ("w", "Check web ports"),
        ("s", "Scan common service ports"),
        ("?", "Toggle this help"),
    ];

    let mut lines = vec![Line::from("")];
    for (key, text) in keys {
        lines.push(Line::from(vec![
            Span::styled(format!("  {:<18}", key), theme.key_style()),
            Span::styled(*text, Style::new().fg(theme.fg)),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("  Web check ports: {:?}, scan: {} ports", WEB_CHECK_PORTS, COMMON_PORTS.len()),
        theme.label(),
    )));

    let popup = centered_popup(area, 60, lines.len() as u16 + 2);
    let help = Paragraph::new(lines).block(
        panel_block(theme, " Help ").style(Style::new().bg(theme.bg).fg(theme.fg)),
    );
    f.render_widget(Clear, popup);
    f.render_widget(help, popup);
}

/// Create a centered popup area with given width percentage and height in lines
fn centered_popup(area: Rect, width_percent: u16, height_lines: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(height_lines),
            Constraint::Fill(1),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::error::Result;
    use crate::monitor::model::{ProbeOutcome, Sample, SequenceNumber, Target};
    use crate::monitor::portcheck::{PortCheck, PortStatus};
    use crate::monitor::session::{NoticeBoard, SessionSettings};
    use crate::probe::{MockProber, ProbeMethod};
    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;
    use ratatui::Terminal;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn session(targets: u8) -> Arc<Session> {
        session_with(
            (1..=targets)
                .map(|i| Target::new(format!("host{}.test", i), IpAddr::V4(Ipv4Addr::new(10, 0, 0, i))))
                .collect(),
        )
    }

    fn session_with(targets: Vec<Target>) -> Arc<Session> {
        let mut prober = MockProber::new();
        prober.expect_method().returning(|| ProbeMethod::Tcp { port: 80 });
        Session::new(
            targets,
            Arc::new(prober),
            Arc::new(NoticeBoard::new()),
            SessionSettings {
                interval: Duration::from_secs(1),
                timeout: Duration::from_secs(1),
                capacity: 100,
                count: None,
            },
        )
    }

    fn render(session: &Session, width: u16, height: u16, notice: Option<&str>) -> Result<Buffer> {
        let snapshots: Vec<_> = session.targets().iter().map(|t| t.store.snapshot()).collect();
        let stats: Vec<_> = snapshots.iter().map(|s| s.stats().ok()).collect();
        render_frame(session, &snapshots, &stats, width, height, notice)
    }

    fn render_frame(
        session: &Session,
        snapshots: &[Arc<Snapshot>],
        stats: &[Option<Statistics>],
        width: u16,
        height: u16,
        notice: Option<&str>,
    ) -> Result<Buffer> {
        let theme = Theme::blacksite();
        let view = session.state().view();
        let data = FrameData {
            session,
            view: &view,
            snapshots,
            stats,
            theme: &theme,
            notice,
        };
        let mut terminal = Terminal::new(TestBackend::new(width, height))?;
        terminal.draw(|f| draw(f, &data))?;
        Ok(terminal.backend().buffer().clone())
    }

    fn text(buffer: &Buffer) -> String {
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn record(session: &Session, outcomes: &[Option<u64>]) -> Result<()> {
        for (i, ms) in outcomes.iter().enumerate() {
            let outcome = match ms {
                Some(ms) => ProbeOutcome::Reply(Duration::from_millis(*ms)),
                None => ProbeOutcome::Timeout,
            };
            session.targets()[0]
                .store
                .record(Sample::new(SequenceNumber(i as u64 + 1), outcome))?;
        }
        Ok(())
    }

    #[test]
    fn test_graph_bounds() {
        assert_eq!(graph_bounds(&[]), (0.0, 55.0));
        assert_eq!(graph_bounds(&[Some(10.0), None]), (0.0, 55.0));
        let (_, max) = graph_bounds(&[Some(200.0), Some(20.0)]);
        assert!((max - 220.0).abs() < 1e-9);
    }

    #[test]
    fn test_compact_threshold() {
        assert!(is_compact(Rect::new(0, 0, 49, 40)));
        assert!(is_compact(Rect::new(0, 0, 120, 11)));
        assert!(!is_compact(Rect::new(0, 0, 50, 12)));
    }

    #[test]
    fn test_full_layout_shows_header_and_stats() -> Result<()> {
        let session = session(1);
        record(&session, &[Some(10), Some(20), None, Some(30)])?;

        let screen = text(&render(&session, 120, 30, None)?);
        assert!(screen.contains("RustyPing"));
        assert!(screen.contains("tcp/80"));
        assert!(screen.contains("Statistics"));
        assert!(screen.contains("Jitter"));
        assert!(screen.contains("25.0%"));
        Ok(())
    }

    #[test]
    fn test_frame_reads_precomputed_stats() -> Result<()> {
        let session = session(1);
        record(&session, &[Some(10), Some(20), None, Some(30)])?;
        let snapshots: Vec<_> = session.targets().iter().map(|t| t.store.snapshot()).collect();

        let screen = text(&render_frame(&session, &snapshots, &[None], 120, 30, None)?);
        assert!(screen.contains("UNKNOWN"));
        assert!(!screen.contains("25.0%"));
        Ok(())
    }

    #[test]
    fn test_header_shows_dns_time() -> Result<()> {
        let resolved = Target {
            dns_time: Some(Duration::from_micros(4_200)),
            ..Target::new("host.test", IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)))
        };
        let screen = text(&render(&session_with(vec![resolved]), 120, 30, None)?);
        assert!(screen.contains("dns: 4.2ms"));

        let literal = text(&render(&session(1), 120, 30, None)?);
        assert!(!literal.contains("dns:"));
        Ok(())
    }

    #[test]
    fn test_port_scan_panel_lists_open_services() -> Result<()> {
        let session = session(1);
        let monitor = &session.targets()[0];
        let mut report = monitor.begin_port_check(PortCheck::Scan);
        report.ports[1].1 = PortStatus::Open(Duration::from_millis(3));
        report.ports[2].1 = PortStatus::Refused;
        monitor.update_port_check(&report);

        let screen = text(&render(&session, 120, 30, None)?);
        assert!(screen.contains("Port scan"));
        assert!(screen.contains("2/27 checked"));
        assert!(screen.contains("22/ssh 3.0ms"));
        Ok(())
    }

    #[test]
    fn test_web_check_panel_lists_each_port() -> Result<()> {
        let session = session(1);
        let monitor = &session.targets()[0];
        let mut report = monitor.begin_port_check(PortCheck::Web);
        report.ports[0].1 = PortStatus::Refused;
        monitor.update_port_check(&report);

        let screen = text(&render(&session, 120, 30, None)?);
        assert!(screen.contains("Web check"));
        assert!(screen.contains("80/http closed"));
        assert!(screen.contains("443/https checking"));
        Ok(())
    }

    #[test]
    fn test_waiting_message_without_samples() -> Result<()> {
        let session = session(1);
        let screen = text(&render(&session, 80, 24, None)?);
        assert!(screen.contains("Waiting for samples"));
        Ok(())
    }

    #[test]
    fn test_compact_mode_shows_only_graph() -> Result<()> {
        let session = session(1);
        record(&session, &[Some(10)])?;
        let screen = text(&render(&session, 40, 10, None)?);
        assert!(!screen.contains("RustyPing"));
        assert!(!screen.contains("Statistics"));
        assert!(screen.contains("10.0.0.1"));
        Ok(())
    }

    #[test]
    fn test_target_list_for_multiple_targets() -> Result<()> {
        let session = session(3);
        let screen = text(&render(&session, 120, 30, None)?);
        assert!(screen.contains("Targets"));
        assert!(screen.contains("host3.test"));
        Ok(())
    }

    #[test]
    fn test_notice_and_paused_state() -> Result<()> {
        let session = session(1);
        session.toggle_pause();
        let screen = text(&render(&session, 120, 30, Some("probing with tcp/80"))?);
        assert!(screen.contains("PAUSED"));
        assert!(screen.contains("probing with tcp/80"));
        Ok(())
    }

    #[test]
    fn test_help_overlay() -> Result<()> {
        let session = session(1);
        session.toggle_help();
        let screen = text(&render(&session, 100, 30, None)?);
        assert!(screen.contains("Toggle jitter panel"));
        Ok(())
    }
}
