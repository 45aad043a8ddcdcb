use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Up,
    Down,
    NextView,
    PrevView,
    CycleSort,
}

pub fn map_key(key: KeyEvent) -> Option<Action> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Some(Action::Quit),
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char('k') if key.modifiers.is_empty() => Some(Action::Up),
        KeyCode::Up => Some(Action::Up),
        KeyCode::Char('j') if key.modifiers.is_empty() => Some(Action::Down),
        KeyCode::Down => Some(Action::Down),
        KeyCode::Char('h') if key.modifiers.is_empty() => Some(Action::PrevView),
        KeyCode::Left => Some(Action::PrevView),
        KeyCode::Char('l') if key.modifiers.is_empty() => Some(Action::NextView),
        KeyCode::Right => Some(Action::NextView),
        KeyCode::Char('s') if key.modifiers.is_empty() => Some(Action::CycleSort),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_quit_keys() {
        for key in [
            KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE),
            KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE),
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        ] {
            assert_eq!(map_key(key), Some(Action::Quit));
        }
    }

    #[test]
    fn arrows_and_vim_keys_scroll() {
        let up = KeyEvent::new(KeyCode::Up, KeyModifiers::NONE);
        let k = KeyEvent::new(KeyCode::Char('k'), KeyModifiers::NONE);
        let down = KeyEvent::new(KeyCode::Down, KeyModifiers::NONE);
        let j = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE);
        assert_eq!(map_key(up), Some(Action::Up));
        assert_eq!(map_key(k), Some(Action::Up));
        assert_eq!(map_key(down), Some(Action::Down));
        assert_eq!(map_key(j), Some(Action::Down));
    }

    #[test]
    fn left_and_right_rotate_view() {
        let left = KeyEvent::new(KeyCode::Left, KeyModifiers::NONE);
        let l = KeyEvent::new(KeyCode::Char('l'), KeyModifiers::NONE);
        assert_eq!(map_key(left), Some(Action::PrevView));
        assert_eq!(map_key(l), Some(Action::NextView));
    }

    #[test]
    fn s_cycles_sort() {
        let key = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::NONE);
        assert_eq!(map_key(key), Some(Action::CycleSort));
    }

    #[test]
    fn ignores_release_and_modified_letters() {
        let mut release = KeyEvent::new(KeyCode::Down, KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(map_key(release), None);

        let ctrl_j = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::CONTROL);
        assert_eq!(map_key(ctrl_j), None);
    }
}
