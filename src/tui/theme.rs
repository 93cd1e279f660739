use ratatui::style::Color;

use crate::config::ThemeMode;

/// Colors used by every widget, resolved once from the configured mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub border: Color,
    pub highlight_bg: Color,
    pub success: Color,
    pub error: Color,
    pub warning: Color,
}

impl Theme {
    pub fn resolve(mode: ThemeMode) -> Self {
        match mode {
            ThemeMode::Dark => Self {
                text: Color::White,
                muted: Color::DarkGray,
                accent: Color::Cyan,
                border: Color::Cyan,
                highlight_bg: Color::DarkGray,
                success: Color::Green,
                error: Color::Red,
                warning: Color::Yellow,
            },
            ThemeMode::Light => Self {
                text: Color::Black,
                muted: Color::Gray,
                accent: Color::Blue,
                border: Color::Blue,
                highlight_bg: Color::Gray,
                success: Color::Green,
                error: Color::Red,
                warning: Color::Magenta,
            },
        }
    }
}
