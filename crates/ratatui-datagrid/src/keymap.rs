use crate::input::KeyCode;
use crate::input::KeyEvent;
use crate::input::KeyModifiers;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub keys: Vec<KeyEvent>,
    pub help_key: String,
    pub help_desc: String,
}

impl Binding {
    pub fn new(
        help_key: impl Into<String>,
        help_desc: impl Into<String>,
        keys: Vec<KeyEvent>,
    ) -> Self {
        Self {
            keys,
            help_key: help_key.into(),
            help_desc: help_desc.into(),
        }
    }

    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.keys.iter().any(|k| key_event_matches(k, event))
    }
}

pub fn key_event_matches(pattern: &KeyEvent, event: &KeyEvent) -> bool {
    pattern.code == event.code && pattern.modifiers == event.modifiers
}

pub fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code)
}

pub fn key_char(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c))
}

pub fn key_ctrl(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c)).with_modifiers(KeyModifiers::ctrl())
}

/// What a key does while no cell is being edited.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GridCommand {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    PageUp,
    PageDown,
    RowStart,
    RowEnd,
    First,
    Last,
    NextPage,
    PrevPage,
    ToggleSort,
    ToggleSelection,
    SelectAll,
    StartEdit,
    /// Expands or collapses a group row, or toggles the row's detail panel.
    ToggleExpansion,
    CycleDensity,
}

/// Key bindings of [`crate::view::DataGridView`], checked in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridKeymap {
    pub bindings: Vec<(GridCommand, Binding)>,
}

impl Default for GridKeymap {
    fn default() -> Self {
        use GridCommand::*;

        Self {
            bindings: vec![
                (MoveUp, Binding::new("↑/k", "up", vec![key(KeyCode::Up), key_char('k')])),
                (MoveDown, Binding::new("↓/j", "down", vec![key(KeyCode::Down), key_char('j')])),
                (MoveLeft, Binding::new("←/h", "left", vec![key(KeyCode::Left), key_char('h')])),
                (MoveRight, Binding::new("→/l", "right", vec![key(KeyCode::Right), key_char('l')])),
                (
                    PageUp,
                    Binding::new("PgUp", "page up", vec![key(KeyCode::PageUp), key_ctrl('u')]),
                ),
                (
                    PageDown,
                    Binding::new("PgDn", "page down", vec![key(KeyCode::PageDown), key_ctrl('d')]),
                ),
                (RowStart, Binding::new("Home", "first column", vec![key(KeyCode::Home)])),
                (RowEnd, Binding::new("End", "last column", vec![key(KeyCode::End)])),
                (First, Binding::new("g", "first row", vec![key_char('g')])),
                (Last, Binding::new("G", "last row", vec![key_char('G')])),
                (NextPage, Binding::new("]", "next page", vec![key_char(']')])),
                (PrevPage, Binding::new("[", "previous page", vec![key_char('[')])),
                (ToggleSort, Binding::new("s", "sort column", vec![key_char('s')])),
                (ToggleSelection, Binding::new("Space", "select row", vec![key_char(' ')])),
                (SelectAll, Binding::new("Ctrl+a", "select all", vec![key_ctrl('a')])),
                (
                    StartEdit,
                    Binding::new("Enter/F2", "edit cell", vec![key(KeyCode::Enter), key(KeyCode::F(2))]),
                ),
                (ToggleExpansion, Binding::new("o", "expand/collapse", vec![key_char('o')])),
                (CycleDensity, Binding::new("d", "density", vec![key_char('d')])),
            ],
        }
    }
}

impl GridKeymap {
    pub fn command_for(&self, event: &KeyEvent) -> Option<GridCommand> {
        self.bindings
            .iter()
            .find(|(_, b)| b.matches(event))
            .map(|(c, _)| *c)
    }

    /// Rebinds `command`, replacing its previous keys.
    pub fn bind(&mut self, command: GridCommand, binding: Binding) {
        match self.bindings.iter_mut().find(|(c, _)| *c == command) {
            Some(entry) => entry.1 = binding,
            None => self.bindings.push((command, binding)),
        }
    }

    pub fn help(&self) -> Vec<(&str, &str)> {
        self.bindings
            .iter()
            .map(|(_, b)| (b.help_key.as_str(), b.help_desc.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_matches_exact_modifiers() {
        let b = Binding::new("q", "quit", vec![key_char('q')]);
        assert!(b.matches(&key_char('q')));
        assert!(!b.matches(&key_ctrl('q')));
    }

    #[test]
    fn rebinding_replaces_the_old_keys() {
        let mut keymap = GridKeymap::default();
        assert_eq!(keymap.command_for(&key_char('s')), Some(GridCommand::ToggleSort));
        keymap.bind(GridCommand::ToggleSort, Binding::new("S", "sort", vec![key_char('S')]));
        assert_eq!(keymap.command_for(&key_char('s')), None);
        assert_eq!(keymap.command_for(&key_char('S')), Some(GridCommand::ToggleSort));
    }
}
