use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, StatefulWidget, Widget};

use crate::viewer::TableShape;

#[derive(Debug, Clone, Default)]
pub struct TableState {
    shape: TableShape,
    top_row: usize,
    selected_row: usize,
}

impl TableState {
    pub fn title(&self) -> &str {
        &self.shape.title
    }

    pub fn header(&self) -> &[String] {
        &self.shape.header
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.shape.rows
    }

    pub fn is_placeholder(&self) -> bool {
        self.shape.placeholder
    }

    pub fn data_row_count(&self) -> usize {
        if self.shape.placeholder {
            0
        } else {
            self.shape.rows.len()
        }
    }

    pub fn top_row(&self) -> usize {
        self.top_row
    }

    pub fn selected_row(&self) -> usize {
        self.selected_row
    }

    pub fn selected_key(&self) -> Option<&str> {
        self.shape.keys.get(self.selected_row).map(String::as_str)
    }

    pub fn reset(&mut self, shape: TableShape) {
        self.shape = shape;
        self.top_row = 0;
        self.selected_row = 0;
    }

    pub fn replace(&mut self, shape: TableShape, key: Option<&str>) -> usize {
        self.shape = shape;
        let found = key.and_then(|key| self.shape.keys.iter().position(|candidate| candidate == key));
        self.selected_row = found.unwrap_or(self.selected_row);
        self.clamp_selection();
        self.selected_row
    }

    pub fn scroll_up(&mut self) {
        self.scroll(-1);
    }

    pub fn scroll_down(&mut self) {
        self.scroll(1);
    }

    fn scroll(&mut self, delta: isize) {
        self.selected_row = self.selected_row.saturating_add_signed(delta);
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        let max_index = self.shape.rows.len().saturating_sub(1);
        self.selected_row = self.selected_row.min(max_index);
    }

    /// Moves `top_row` so the selected row is inside a window of
    /// `visible_height` lines, one of which is the header.
    pub fn follow(&mut self, visible_height: usize) {
        self.clamp_selection();
        if visible_height < 2 {
            self.top_row = self.selected_row;
            return;
        }

        if self.selected_row < self.top_row {
            self.top_row = self.selected_row;
        } else if self.selected_row > self.top_row + visible_height - 2 {
            self.top_row = self.selected_row + 2 - visible_height;
        }
    }

    fn column_offsets(&self) -> Vec<u16> {
        self.shape
            .widths
            .iter()
            .scan(0u16, |offset, width| {
                let start = *offset;
                *offset = offset.saturating_add(*width);
                Some(start)
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableStyle {
    pub border: Color,
    pub title: Color,
    pub header: Color,
    pub cursor: Color,
}

pub struct TableWidget {
    style: TableStyle,
}

impl TableWidget {
    pub fn new(style: TableStyle) -> Self {
        Self { style }
    }
}

impl StatefulWidget for TableWidget {
    type State = TableState;

    fn render(self, area: Rect, buf: &mut Buffer, state: &mut TableState) {
        let block = Block::bordered()
            .title(state.title().to_string())
            .title_style(
                Style::default()
                    .fg(self.style.title)
                    .add_modifier(Modifier::BOLD),
            )
            .border_style(Style::default().fg(self.style.border));
        let inner = block.inner(area);
        block.render(area, buf);

        if inner.height <= 2 || inner.width == 0 {
            return;
        }

        let offsets = state.column_offsets();
        let header_style = Style::default()
            .fg(self.style.header)
            .add_modifier(Modifier::BOLD);
        for (title, offset) in state.header().iter().zip(&offsets) {
            put_cell(buf, inner, *offset, inner.y, title, u16::MAX, header_style);
        }

        let visible_height = usize::from(inner.height);
        state.follow(visible_height);

        let cursor = !state.is_placeholder();
        let window = state
            .rows()
            .iter()
            .enumerate()
            .skip(state.top_row())
            .take(visible_height - 1);
        for (line, (index, row)) in window.enumerate() {
            let y = inner.y + 1 + line as u16;
            let mut style = Style::default();
            if cursor && index == state.selected_row() {
                style = style
                    .fg(self.style.cursor)
                    .add_modifier(Modifier::REVERSED);
                buf.set_string(inner.x, y, " ".repeat(usize::from(inner.width)), style);
            }
            for ((cell, offset), width) in row.iter().zip(&offsets).zip(&state.shape.widths) {
                put_cell(buf, inner, *offset, y, &truncate(cell, usize::from(*width)), *width, style);
            }
        }
    }
}

fn put_cell(buf: &mut Buffer, inner: Rect, offset: u16, y: u16, text: &str, width: u16, style: Style) {
    if offset >= inner.width {
        return;
    }
    let room = (inner.width - offset).min(width);
    buf.set_stringn(inner.x + offset, y, text, usize::from(room), style);
}

pub fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }

    let mut out = value
        .chars()
        .take(max.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn shape(count: usize) -> TableShape {
        TableShape {
            title: "t".to_string(),
            header: vec!["NAME".to_string(), "CPU".to_string()],
            widths: vec![8, 6],
            rows: (0..count)
                .map(|index| vec![format!("row-{index}"), format!("{index}m")])
                .collect(),
            keys: (0..count).map(|index| format!("row-{index}")).collect(),
            placeholder: false,
        }
    }

    fn style() -> TableStyle {
        TableStyle {
            border: Color::Blue,
            title: Color::White,
            header: Color::White,
            cursor: Color::Yellow,
        }
    }

    #[test]
    fn scrolling_is_clamped_to_row_bounds() {
        let mut state = TableState::default();
        state.reset(shape(3));
        state.scroll_up();
        assert_eq!(state.selected_row(), 0);
        for _ in 0..5 {
            state.scroll_down();
        }
        assert_eq!(state.selected_row(), 2);
    }

    #[test]
    fn follow_scrolls_window_when_selection_leaves_bottom() {
        let mut state = TableState::default();
        state.reset(shape(20));
        for _ in 0..6 {
            state.scroll_down();
        }
        state.follow(5);
        assert_eq!(state.top_row(), 3);

        for _ in 0..6 {
            state.scroll_up();
        }
        state.follow(5);
        assert_eq!(state.top_row(), 0);
    }

    #[test]
    fn replace_tracks_identity_and_falls_back_to_clamped_index() {
        let mut state = TableState::default();
        state.reset(shape(5));
        state.scroll_down();
        state.scroll_down();
        assert_eq!(state.selected_key(), Some("row-2"));

        let mut reordered = shape(5);
        reordered.keys.reverse();
        reordered.rows.reverse();
        assert_eq!(state.replace(reordered, Some("row-2")), 2);
        assert_eq!(state.replace(shape(5), Some("row-4")), 4);

        assert_eq!(state.replace(shape(2), Some("gone")), 1);
        assert_eq!(state.replace(TableShape::default(), None), 0);
    }

    #[test]
    fn render_highlights_selected_row_and_skips_scrolled_rows() {
        let mut state = TableState::default();
        state.reset(shape(10));
        for _ in 0..5 {
            state.scroll_down();
        }

        let area = Rect::new(0, 0, 20, 6);
        let mut buf = Buffer::empty(area);
        TableWidget::new(style()).render(area, &mut buf, &mut state);

        // inner height 4: header plus three rows, selection on the last one
        assert_eq!(state.top_row(), 3);
        let line = |y: u16| {
            (1..19)
                .map(|x| buf[(x, y)].symbol().to_string())
                .collect::<String>()
        };
        assert!(line(1).starts_with("NAME"));
        assert!(line(2).starts_with("row-3"));
        assert!(line(4).starts_with("row-5"));
        assert!(buf[(1, 4)].modifier.contains(Modifier::REVERSED));
        assert!(!buf[(1, 3)].modifier.contains(Modifier::REVERSED));
    }

    #[test]
    fn long_cells_are_truncated_with_ellipsis() {
        assert_eq!(truncate("abcdefgh", 4), "abc…");
        assert_eq!(truncate("abc", 4), "abc");
    }

    proptest! {
        #[test]
        fn selection_stays_visible_after_any_scroll_sequence(
            rows in 1usize..60,
            height in 2usize..30,
            moves in proptest::collection::vec(any::<bool>(), 0..120),
        ) {
            let mut state = TableState::default();
            state.reset(shape(rows));
            for down in moves {
                if down {
                    state.scroll_down();
                } else {
                    state.scroll_up();
                }
                state.follow(height);
                prop_assert!(state.selected_row() < rows);
                prop_assert!(state.top_row() <= state.selected_row());
                prop_assert!(state.selected_row() <= state.top_row() + height - 2);
            }
        }

        #[test]
        fn selection_is_clamped_when_rows_shrink(before in 0usize..40, after in 0usize..40, cursor in 0usize..40) {
            let mut state = TableState::default();
            state.reset(shape(before));
            for _ in 0..cursor {
                state.scroll_down();
            }
            let selected = state.replace(shape(after), None);
            prop_assert!(selected <= after.saturating_sub(1));
        }
    }
}
