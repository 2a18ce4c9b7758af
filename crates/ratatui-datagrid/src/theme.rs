use ratatui::style::Color;
use ratatui::style::Modifier;
use ratatui::style::Style;

/// Styles shared by every part of [`crate::view::DataGridView`].
///
/// Widget options may override individual styles; anything left at `Style::default()` falls back
/// to the theme.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Theme {
    pub text_primary: Style,
    pub text_muted: Style,
    pub accent: Style,
    pub header: Style,
    pub selected_row: Style,
    pub focused_cell: Style,
    pub editing_cell: Style,
    pub group_row: Style,
    pub pinned: Style,
    pub overlay: Style,
    pub footer: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            text_primary: Style::default(),
            text_muted: Style::default().fg(Color::DarkGray),
            accent: Style::default().fg(Color::Cyan),
            header: Style::default().add_modifier(Modifier::BOLD),
            selected_row: Style::default().bg(Color::Rgb(30, 50, 80)),
            focused_cell: Style::default().add_modifier(Modifier::REVERSED),
            editing_cell: Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::UNDERLINED),
            group_row: Style::default().add_modifier(Modifier::BOLD),
            pinned: Style::default().bg(Color::Rgb(24, 24, 24)),
            overlay: Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            footer: Style::default().fg(Color::Gray),
        }
    }
}

impl Theme {
    /// A theme without colors, for monochrome terminals and buffer assertions.
    pub fn plain() -> Self {
        Self {
            text_primary: Style::default(),
            text_muted: Style::default(),
            accent: Style::default(),
            header: Style::default().add_modifier(Modifier::BOLD),
            selected_row: Style::default().add_modifier(Modifier::BOLD),
            focused_cell: Style::default().add_modifier(Modifier::REVERSED),
            editing_cell: Style::default().add_modifier(Modifier::UNDERLINED),
            group_row: Style::default().add_modifier(Modifier::BOLD),
            pinned: Style::default(),
            overlay: Style::default(),
            footer: Style::default(),
        }
    }
}
