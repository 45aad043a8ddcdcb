use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::widgets::canvas::{Canvas, Line};
use ratatui::widgets::{Block, Widget};
use std::collections::VecDeque;

// header plus two value labels, with a blank row above
const LABEL_ROWS: u16 = 4;
const MIN_LABELLED_HEIGHT: u16 = 7;
const MIN_HISTORY: usize = 16;

#[derive(Debug, Clone)]
pub struct GraphState {
    samples: VecDeque<f64>,
    capacity: usize,
    upper_limit: f64,
    draw_upper_limit: bool,
    label_header: String,
    label_data: String,
    label_upper_limit: String,
}

impl GraphState {
    pub fn new(capacity: usize, draw_upper_limit: bool) -> Self {
        let capacity = capacity.max(MIN_HISTORY);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            upper_limit: 0.0,
            draw_upper_limit,
            label_header: String::new(),
            label_data: String::new(),
            label_upper_limit: String::new(),
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.upper_limit = 0.0;
        self.label_header.clear();
        self.label_data.clear();
        self.label_upper_limit.clear();
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn upper_limit(&self) -> f64 {
        self.upper_limit
    }

    pub fn set_upper_limit(&mut self, upper_limit: f64, label: impl Into<String>) {
        self.upper_limit = upper_limit;
        self.label_upper_limit = label.into();
    }

    pub fn set_labels(&mut self, header: impl Into<String>, data: impl Into<String>) {
        self.label_header = header.into();
        self.label_data = data.into();
    }

    pub fn label_header(&self) -> &str {
        &self.label_header
    }

    pub fn label_data(&self) -> &str {
        &self.label_data
    }

    pub fn label_upper_limit(&self) -> &str {
        &self.label_upper_limit
    }

    pub fn window(&self, width: usize) -> Vec<f64> {
        let skip = self.len().saturating_sub(width);
        self.samples.iter().skip(skip).copied().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotArea {
    pub plot_height: u16,
    pub show_labels: bool,
}

impl PlotArea {
    pub fn for_inner_height(height: u16) -> Self {
        if height >= MIN_LABELLED_HEIGHT {
            Self {
                plot_height: height - LABEL_ROWS,
                show_labels: true,
            }
        } else {
            Self {
                plot_height: height,
                show_labels: false,
            }
        }
    }
}

pub fn scaled_height(value: f64, upper_limit: f64, plot_height: f64) -> f64 {
    if upper_limit <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    (value / upper_limit * plot_height).clamp(0.0, plot_height)
}

pub fn plot_segments(window: &[f64], upper_limit: f64, plot_height: f64) -> Vec<(f64, f64, f64, f64)> {
    let heights = window
        .iter()
        .map(|value| scaled_height(*value, upper_limit, plot_height))
        .collect::<Vec<_>>();

    match heights.as_slice() {
        [] => Vec::new(),
        [only] => vec![(0.0, *only, 0.0, *only)],
        _ => heights
            .windows(2)
            .enumerate()
            .map(|(index, pair)| (index as f64, pair[0], (index + 1) as f64, pair[1]))
            .collect(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GraphStyle {
    pub border: Color,
    pub title: Color,
    pub data: Color,
    pub limit: Color,
    pub label: Color,
}

pub struct GraphWidget<'a> {
    title: &'a str,
    state: &'a GraphState,
    style: GraphStyle,
}

impl<'a> GraphWidget<'a> {
    pub fn new(title: &'a str, state: &'a GraphState, style: GraphStyle) -> Self {
        Self {
            title,
            state,
            style,
        }
    }
}

impl Widget for GraphWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::bordered()
            .title(self.title)
            .title_style(
                Style::default()
                    .fg(self.style.title)
                    .add_modifier(Modifier::BOLD),
            )
            .border_style(Style::default().fg(self.style.border));
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.width == 0 || inner.height == 0 {
            return;
        }

        let plot = PlotArea::for_inner_height(inner.height);
        let plot_height = f64::from(plot.plot_height);
        if !self.state.is_empty() {
            let window = self.state.window(usize::from(inner.width));
            let segments = plot_segments(&window, self.state.upper_limit(), plot_height);
            let limit_height = scaled_height(
                self.state.upper_limit(),
                self.state.upper_limit(),
                plot_height,
            );
            let x_max = f64::from(inner.width.saturating_sub(1).max(1));
            let draw_limit = self.state.draw_upper_limit && self.state.upper_limit() > 0.0;
            let data_color = self.style.data;
            let limit_color = self.style.limit;

            Canvas::default()
                .marker(Marker::Braille)
                .x_bounds([0.0, x_max])
                .y_bounds([0.0, f64::from(inner.height)])
                .paint(|ctx| {
                    if draw_limit {
                        ctx.draw(&Line::new(0.0, limit_height, x_max, limit_height, limit_color));
                    }
                    for (x1, y1, x2, y2) in &segments {
                        ctx.draw(&Line::new(*x1, *y1, *x2, *y2, data_color));
                    }
                })
                .render(inner, buf);
        }

        if !plot.show_labels {
            return;
        }

        let header_style = Style::default()
            .fg(self.style.label)
            .add_modifier(Modifier::BOLD);
        let labels = [
            (self.state.label_header(), 1, header_style),
            (
                self.state.label_upper_limit(),
                2,
                Style::default().fg(self.style.limit),
            ),
            (self.state.label_data(), 2, Style::default().fg(self.style.data)),
        ];
        let mut row = inner.y + 1;
        for (text, indent, style) in labels {
            if text.is_empty() || indent >= inner.width {
                continue;
            }
            let x = inner.x + indent;
            buf.set_stringn(x, row, text, usize::from(inner.width.saturating_sub(indent)), style);
            row += 1;
        }
    }
}
