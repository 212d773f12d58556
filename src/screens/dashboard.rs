/// Main dashboard screen

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Clear, Gauge, Paragraph, Sparkline, Wrap},
    Frame,
};

use pulsemon::core::{CpuFrame, MemoryFrame, MonitorStatus, ProcessFrame, Usage};
use pulsemon::utils::{format_bytes, Rgb};

fn rgb(color: Rgb) -> Color {
    Color::Rgb(color.0, color.1, color.2)
}

/// Keep the newest points that fit inside `width` cells
fn tail_points(series: &[f64], width: u16) -> Vec<u64> {
    let start = series.len().saturating_sub(width as usize);
    series[start..]
        .iter()
        .map(|v| v.clamp(0.0, 100.0).round() as u64)
        .collect()
}

fn inner_width(area: Rect) -> u16 {
    area.width.saturating_sub(2)
}

/// Latest frames of every monitor, written by view-model subscribers
#[derive(Default)]
pub struct Dashboard {
    title: String,
    cpu: Option<CpuFrame>,
    memory: Option<MemoryFrame>,
    process: Option<ProcessFrame>,
    process_status: Option<MonitorStatus>,
}

/// Per-draw state owned by the app
pub struct ViewState<'a> {
    pub status_message: Option<&'a str>,
    pub show_help: bool,
    pub paused: bool,
    pub cpu_interval_ms: u128,
    pub dropped: u64,
}

impl Dashboard {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn update_cpu(&mut self, frame: &CpuFrame) {
        self.cpu = Some(frame.clone());
    }

    pub fn update_memory(&mut self, frame: &MemoryFrame) {
        self.memory = Some(frame.clone());
    }

    pub fn update_process(&mut self, frame: &ProcessFrame) {
        self.process = Some(frame.clone());
        self.process_status = None;
    }

    pub fn set_process_status(&mut self, status: &MonitorStatus) {
        self.process_status = Some(status.clone());
    }

    pub fn clear_process_status(&mut self) {
        self.process_status = None;
    }

    pub fn has_process(&self) -> bool {
        self.process.is_some() || self.process_status.is_some()
    }

    pub fn render(&self, frame: &mut Frame, view: &ViewState) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Title
                Constraint::Min(0),    // Content
                Constraint::Length(3), // Footer
            ])
            .split(frame.size());

        self.render_title(frame, chunks[0], view);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        self.render_cpu(frame, columns[0]);

        if self.has_process() {
            let right = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
                .split(columns[1]);
            self.render_memory(frame, right[0]);
            self.render_process(frame, right[1]);
        } else {
            self.render_memory(frame, columns[1]);
        }

        self.render_footer(frame, chunks[2], view);

        if view.show_help {
            self.render_help(frame);
        }
    }

    fn render_title(&self, frame: &mut Frame, area: Rect, view: &ViewState) {
        let mut spans = vec![
            Span::styled(
                self.title.as_str(),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
        ];

        if let Some(cpu) = &self.cpu {
            spans.push(Span::styled("CPU: ", Style::default().fg(Color::Gray)));
            spans.push(Span::styled(
                format!("{:.1}%", cpu.global),
                Style::default().fg(rgb(cpu.color)).add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::raw(" | "));
        }
        if let Some(mem) = &self.memory {
            spans.push(Span::styled("Mem: ", Style::default().fg(Color::Gray)));
            spans.push(Span::styled(
                format!("{:.1}%", mem.ram.percent),
                Style::default().fg(rgb(mem.ram_color)).add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::raw(" | "));
        }
        spans.push(Span::styled(
            format!("every {} ms", view.cpu_interval_ms),
            Style::default().fg(Color::DarkGray),
        ));
        if view.paused {
            spans.push(Span::styled(
                "  PAUSED",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ));
        }

        let title = Paragraph::new(Line::from(spans))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(title, area);
    }

    fn render_cpu(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title(" CPU ");
        let Some(cpu) = &self.cpu else {
            frame.render_widget(
                Paragraph::new("Waiting for first sample...").block(block),
                area,
            );
            return;
        };

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Percentage(40),
                Constraint::Min(5),
            ])
            .split(area);

        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(" Total "))
            .gauge_style(Style::default().fg(rgb(cpu.color)))
            .ratio((cpu.global / 100.0).clamp(0.0, 1.0))
            .label(format!("{:.1}%", cpu.global));
        frame.render_widget(gauge, rows[0]);

        let history = tail_points(&cpu.history, inner_width(rows[1]));
        let sparkline = Sparkline::default()
            .block(Block::default().borders(Borders::ALL).title(" History "))
            .data(&history)
            .max(100)
            .style(Style::default().fg(rgb(cpu.color)));
        frame.render_widget(sparkline, rows[1]);

        let cores = cpu.cores.len().max(1) as u16;
        let bar_width = (inner_width(rows[2]) / cores).saturating_sub(1).clamp(1, 6);
        let bars: Vec<Bar> = cpu
            .cores
            .iter()
            .enumerate()
            .map(|(i, usage)| {
                Bar::default()
                    .value(usage.clamp(0.0, 100.0).round() as u64)
                    .label(Line::from(i.to_string()))
                    .style(Style::default().fg(rgb(pulsemon::utils::percent_to_rgb(*usage))))
            })
            .collect();

        let chart = BarChart::default()
            .block(Block::default().borders(Borders::ALL).title(" Cores "))
            .bar_width(bar_width)
            .bar_gap(1)
            .max(100)
            .data(BarGroup::default().bars(&bars));
        frame.render_widget(chart, rows[2]);
    }

    fn usage_gauge<'a>(title: &'a str, usage: &Usage, color: Color) -> Gauge<'a> {
        Gauge::default()
            .block(Block::default().borders(Borders::ALL).title(title))
            .gauge_style(Style::default().fg(color))
            .ratio((usage.percent / 100.0).clamp(0.0, 1.0))
            .label(format!(
                "{:.1}% ({} / {})",
                usage.percent,
                format_bytes(usage.used),
                format_bytes(usage.total)
            ))
    }

    fn render_memory(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title(" Memory ");
        let Some(mem) = &self.memory else {
            frame.render_widget(
                Paragraph::new("Waiting for first sample...").block(block),
                area,
            );
            return;
        };

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(3),
            ])
            .split(area);

        frame.render_widget(Self::usage_gauge(" RAM ", &mem.ram, rgb(mem.ram_color)), rows[0]);

        match &mem.swap {
            Some(swap) => frame.render_widget(
                Self::usage_gauge(" Swap ", swap, rgb(pulsemon::utils::percent_to_rgb(swap.percent))),
                rows[1],
            ),
            None => frame.render_widget(
                Paragraph::new(Span::styled("No swap", Style::default().fg(Color::DarkGray)))
                    .block(Block::default().borders(Borders::ALL).title(" Swap ")),
                rows[1],
            ),
        }

        let history = tail_points(&mem.ram_history, inner_width(rows[2]));
        let sparkline = Sparkline::default()
            .block(Block::default().borders(Borders::ALL).title(" RAM history "))
            .data(&history)
            .max(100)
            .style(Style::default().fg(rgb(mem.ram_color)));
        frame.render_widget(sparkline, rows[2]);
    }

    fn render_process(&self, frame: &mut Frame, area: Rect) {
        let title = match &self.process {
            Some(p) => format!(" {} ({}) ", p.name, p.pid),
            None => " Process ".to_string(),
        };
        let block = Block::default().borders(Borders::ALL).title(title);

        if let Some(status) = &self.process_status {
            let style = if status.success {
                Style::default().fg(Color::Gray)
            } else {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            };
            frame.render_widget(
                Paragraph::new(Span::styled(status.message.as_str(), style))
                    .block(block)
                    .wrap(Wrap { trim: true }),
                area,
            );
            return;
        }

        let Some(process) = &self.process else {
            frame.render_widget(Paragraph::new("Waiting for first sample...").block(block), area);
            return;
        };

        let inner = block.inner(area);
        frame.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(1)])
            .split(inner);

        let gauge = Gauge::default()
            .gauge_style(Style::default().fg(rgb(process.color)))
            .ratio((process.cpu_percent / 100.0).clamp(0.0, 1.0))
            .label(format!("{:.1}%", process.cpu_percent));
        frame.render_widget(gauge, rows[0]);

        let history = tail_points(&process.history, rows[1].width);
        let sparkline = Sparkline::default()
            .data(&history)
            .max(100)
            .style(Style::default().fg(rgb(process.color)));
        frame.render_widget(sparkline, rows[1]);
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect, view: &ViewState) {
        let footer_text = match view.status_message {
            Some(status) => status.to_string(),
            None if view.dropped > 0 => format!(
                "[p]ause | [+/-] CPU interval | [?] Help | [q]uit  ({} samples dropped)",
                view.dropped
            ),
            None => "[p]ause | [+/-] CPU interval | [?] Help | [q]uit".to_string(),
        };

        let footer = Paragraph::new(footer_text)
            .alignment(Alignment::Center)
            .style(if view.status_message.is_some() {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            })
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, area);
    }

    fn render_help(&self, frame: &mut Frame) {
        let area = frame.size();
        let popup_width = area.width.min(60);
        let popup_height = area.height.min(12);
        let popup_area = Rect {
            x: area.width.saturating_sub(popup_width) / 2,
            y: area.height.saturating_sub(popup_height) / 2,
            width: popup_width,
            height: popup_height,
        };

        let heading = Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD);
        let help_text = vec![
            Line::from(Span::styled("Keyboard Shortcuts", heading)),
            Line::from(""),
            Line::from("  [p]            Pause / resume sampling"),
            Line::from("  [+] / [-]      Slower / faster CPU sampling"),
            Line::from("  [?] / [F1]     Toggle this help screen"),
            Line::from("  [q] / [Esc]    Quit"),
            Line::from(""),
            Line::from(Span::styled(
                "Press [?] or [Esc] to close this help",
                Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC),
            )),
        ];

        frame.render_widget(Clear, popup_area);
        let help_widget = Paragraph::new(help_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan))
                    .title(Span::styled(
                        " Help ",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(help_widget, popup_area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ratatui::{backend::TestBackend, Terminal};

    fn view() -> ViewState<'static> {
        ViewState {
            status_message: None,
            show_help: false,
            paused: false,
            cpu_interval_ms: 200,
            dropped: 0,
        }
    }

    fn screen_text(dashboard: &Dashboard, view: &ViewState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| dashboard.render(f, view)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_tail_points_keeps_newest() {
        assert_eq!(tail_points(&[1.0, 2.0, 3.0], 2), vec![2, 3]);
        assert_eq!(tail_points(&[150.0, -3.0], 10), vec![100, 0]);
    }

    #[test]
    fn test_empty_dashboard_waits_for_samples() {
        let text = screen_text(&Dashboard::new("pulsemon"), &view());
        assert!(text.contains("Waiting for first sample"));
        assert!(text.contains("[q]uit"));
    }

    #[test]
    fn test_dashboard_shows_frames() {
        let mut dashboard = Dashboard::new("pulsemon");
        dashboard.update_cpu(&CpuFrame {
            taken_at: Utc::now(),
            global: 42.0,
            cores: vec![40.0, 44.0],
            color: Rgb(0, 255, 0),
            history: vec![10.0, 42.0],
        });
        dashboard.update_memory(&MemoryFrame {
            taken_at: Utc::now(),
            ram: Usage::new(512, 1024),
            swap: None,
            ram_color: Rgb(0, 255, 0),
            ram_history: vec![50.0],
        });

        let text = screen_text(&dashboard, &view());
        assert!(text.contains("CPU: 42.0%"));
        assert!(text.contains("Mem: 50.0%"));
        assert!(text.contains("No swap"));
        assert!(!dashboard.has_process());
    }

    #[test]
    fn test_finished_process_shows_status() {
        let mut dashboard = Dashboard::new("pulsemon");
        dashboard.set_process_status(&MonitorStatus {
            success: true,
            message: "process 4242 exited".into(),
        });
        assert!(dashboard.has_process());
        assert!(screen_text(&dashboard, &view()).contains("process 4242 exited"));

        // A restart clears it before the first frame arrives
        dashboard.clear_process_status();
        assert!(!dashboard.has_process());
    }

    #[test]
    fn test_status_message_and_help() {
        let dashboard = Dashboard::new("pulsemon");
        let mut state = view();
        state.status_message = Some("Paused");
        state.show_help = true;
        let text = screen_text(&dashboard, &state);
        assert!(text.contains("Paused"));
        assert!(text.contains("Keyboard Shortcuts"));
    }
}
