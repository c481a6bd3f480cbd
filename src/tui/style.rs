//! Color scheme and styles.

use ratatui::style::{Color, Modifier, Style};

use crate::view::common::StyleClass;

/// Dashboard color palette.
pub struct Theme;

impl Theme {
    pub const HEADER_BG: Color = Color::Blue;
    pub const SELECTED_BG: Color = Color::DarkGray;

    pub const FG: Color = Color::White;
    pub const FG_DIM: Color = Color::DarkGray;
    pub const HEADER_FG: Color = Color::White;
    pub const LABEL: Color = Color::Cyan;

    pub const HIGHLIGHT_ACTIVE: Color = Color::Green;
    pub const HIGHLIGHT_WARNING: Color = Color::Yellow;
    pub const HIGHLIGHT_CRITICAL: Color = Color::Red;
    pub const ACCENT: Color = Color::Magenta;
}

/// Pre-defined styles.
pub struct Styles;

impl Styles {
    /// Default text style.
    pub fn default() -> Style {
        Style::default().fg(Theme::FG)
    }

    /// Focused row while navigating.
    pub fn selected() -> Style {
        Style::default()
            .bg(Theme::SELECTED_BG)
            .add_modifier(Modifier::BOLD)
    }

    /// Tagged row.
    pub fn tagged() -> Style {
        Style::default()
            .fg(Theme::HIGHLIGHT_WARNING)
            .add_modifier(Modifier::BOLD)
    }

    /// Table header and title bar.
    pub fn table_header() -> Style {
        Style::default()
            .fg(Theme::HEADER_FG)
            .bg(Theme::HEADER_BG)
            .add_modifier(Modifier::BOLD)
    }

    /// Header cell of the sort column.
    pub fn sort_header() -> Style {
        Style::default()
            .fg(Color::Black)
            .bg(Theme::LABEL)
            .add_modifier(Modifier::BOLD)
    }

    /// Header labels ("Size:", "TPS:").
    pub fn label() -> Style {
        Style::default().fg(Theme::LABEL)
    }

    pub fn value() -> Style {
        Style::default()
            .fg(Theme::FG)
            .add_modifier(Modifier::BOLD)
    }

    /// Dimmed text style.
    pub fn dim() -> Style {
        Style::default().fg(Theme::FG_DIM)
    }

    /// Key names in hints and help.
    pub fn key() -> Style {
        Style::default().fg(Theme::HIGHLIGHT_WARNING)
    }

    pub fn warning() -> Style {
        Style::default().fg(Theme::HIGHLIGHT_WARNING)
    }

    /// Critical value style (red).
    pub fn critical() -> Style {
        Style::default()
            .fg(Theme::HIGHLIGHT_CRITICAL)
            .add_modifier(Modifier::BOLD)
    }

    /// Style for a view-model style class.
    pub fn for_class(class: StyleClass) -> Style {
        match class {
            StyleClass::Normal => Self::default(),
            StyleClass::Warning => Self::warning(),
            StyleClass::Critical => Self::critical(),
            StyleClass::Active => Style::default().fg(Theme::HIGHLIGHT_ACTIVE),
            StyleClass::Dimmed => Self::dim(),
            StyleClass::Accent => Style::default().fg(Theme::ACCENT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_map_to_distinct_colors() {
        assert_eq!(
            Styles::for_class(StyleClass::Critical).fg,
            Some(Theme::HIGHLIGHT_CRITICAL)
        );
        assert_eq!(Styles::for_class(StyleClass::Dimmed).fg, Some(Theme::FG_DIM));
        assert_ne!(
            Styles::for_class(StyleClass::Warning),
            Styles::for_class(StyleClass::Normal)
        );
    }
}
