use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph};

use crate::config::Theme;
use crate::graph::{GraphStyle, GraphWidget};
use crate::monitor::Monitor;
use crate::table::{TableStyle, TableWidget, truncate};

const BG: Color = Color::Rgb(9, 15, 25);
const WARN: Color = Color::Rgb(251, 191, 36);
const ERROR: Color = Color::Rgb(248, 113, 113);
const PL_A: Color = Color::Rgb(17, 94, 89);
const PL_B: Color = Color::Rgb(30, 64, 175);
const PL_C: Color = Color::Rgb(55, 48, 163);
const HINTS: &str = " ↑↓ select  ←→ view  s sort  q quit ";

pub fn render(frame: &mut Frame, monitor: &mut Monitor, theme: &Theme) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Percentage(40),
            Constraint::Percentage(35),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, root[0], monitor);
    render_table(frame, root[1], monitor, theme);
    render_graphs(frame, root[2], monitor, theme);
    render_logs(frame, root[3], monitor, theme);
    render_footer(frame, root[4], monitor);
}

fn render_header(frame: &mut Frame, area: Rect, monitor: &Monitor) {
    let info = monitor.info();
    let refreshed = monitor
        .refreshed_at()
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string());

    let mut spans = Vec::new();
    push_powerline_segment(&mut spans, " ⎈ ktop ", Color::White, PL_A, PL_B);
    push_powerline_segment(
        &mut spans,
        format!(" {} ", truncate(&info.context, 24)),
        Color::White,
        PL_B,
        PL_C,
    );
    push_powerline_segment(
        &mut spans,
        format!(" ns:{} ", truncate(&info.namespace, 24)),
        Color::White,
        PL_C,
        BG,
    );
    spans.push(Span::styled(
        format!(
            " {}  view:{}  rows:{}  sort:{}  updated:{refreshed}",
            truncate(&info.cluster, 40),
            monitor.mode().label(),
            monitor.table().data_row_count(),
            monitor.sort_key().label(),
        ),
        Style::default().fg(Color::White),
    ));

    let left = Line::from(spans);
    let hints_width = HINTS.chars().count() as u16;
    if area.width <= spans_width(&left.spans) as u16 + hints_width {
        frame.render_widget(Paragraph::new(left).style(Style::default().bg(BG)), area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(hints_width)])
        .split(area);
    frame.render_widget(Paragraph::new(left).style(Style::default().bg(BG)), chunks[0]);
    frame.render_widget(
        Paragraph::new(HINTS).style(Style::default().bg(BG).fg(Color::Gray)),
        chunks[1],
    );
}

fn render_table(frame: &mut Frame, area: Rect, monitor: &mut Monitor, theme: &Theme) {
    monitor.set_table_width(area.width.saturating_sub(2));
    let widget = TableWidget::new(TableStyle {
        border: theme.border,
        title: theme.title,
        header: theme.header,
        cursor: theme.cursor,
    });
    frame.render_stateful_widget(widget, area, monitor.table_mut());
}

fn render_graphs(frame: &mut Frame, area: Rect, monitor: &Monitor, theme: &Theme) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let style = GraphStyle {
        border: theme.border,
        title: theme.title,
        data: theme.graph_data,
        limit: theme.graph_limit,
        label: theme.graph_label,
    };

    frame.render_widget(GraphWidget::new("CPU", monitor.cpu_graph(), style), chunks[0]);
    frame.render_widget(
        GraphWidget::new("Memory", monitor.mem_graph(), style),
        chunks[1],
    );
}

fn render_logs(frame: &mut Frame, area: Rect, monitor: &Monitor, theme: &Theme) {
    let block = Block::bordered()
        .title(monitor.logs_title().to_string())
        .title_style(Style::default().fg(theme.title).add_modifier(Modifier::BOLD))
        .border_style(Style::default().fg(theme.border));

    // keep the newest lines in view
    let visible = usize::from(area.height.saturating_sub(2));
    let total = monitor.logs().lines().count();
    let scroll = u16::try_from(total.saturating_sub(visible)).unwrap_or(u16::MAX);

    frame.render_widget(
        Paragraph::new(monitor.logs())
            .style(Style::default().fg(theme.logs))
            .block(block)
            .scroll((scroll, 0)),
        area,
    );
}

fn render_footer(frame: &mut Frame, area: Rect, monitor: &Monitor) {
    let failing = monitor.failing();
    let (icon, bg, fg) = if failing {
        ("✗", ERROR, Color::Black)
    } else if monitor.refreshed_at().is_none() {
        ("…", WARN, Color::Black)
    } else {
        ("✓", PL_B, Color::White)
    };

    let mut spans = Vec::new();
    push_powerline_segment(
        &mut spans,
        format!(
            " {icon} {} ",
            truncate(monitor.status(), usize::from(area.width.saturating_sub(6)).max(8))
        ),
        fg,
        bg,
        BG,
    );
    frame.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(BG)),
        area,
    );
}

fn push_powerline_segment(
    spans: &mut Vec<Span<'static>>,
    content: impl Into<String>,
    fg: Color,
    bg: Color,
    next_bg: Color,
) {
    spans.push(Span::styled(
        content.into(),
        Style::default().fg(fg).bg(bg).add_modifier(Modifier::BOLD),
    ));
    spans.push(Span::styled("", Style::default().fg(bg).bg(next_bg)));
}

fn spans_width(spans: &[Span<'_>]) -> usize {
    spans.iter().map(|span| span.content.chars().count()).sum()
}
