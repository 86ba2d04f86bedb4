//! Dashboard colour themes
//!
//! "Blacksite" is a dark, low-contrast palette; the monotone theme only uses
//! the terminal's default colours plus white and dark grey.

use crate::monitor::statistics::Quality;
use ratatui::style::{Color, Modifier, Style};

/// Colours used by every dashboard panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub name: &'static str,
    pub bg: Color,
    pub fg: Color,
    pub title: Color,
    pub highlight: Color,
    pub border: Color,
    pub dim: Color,
    pub missed: Color,
    pub good: Color,
    pub warn: Color,
    pub crit: Color,
    pub key: Color,
    pub selected_bg: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::blacksite()
    }
}

impl Theme {
    pub const fn blacksite() -> Self {
        Self {
            name: "blacksite",
            bg: Color::Rgb(14, 15, 17),
            fg: Color::Rgb(201, 201, 201),
            title: Color::Rgb(229, 229, 229),
            highlight: Color::Rgb(255, 255, 255),
            border: Color::Rgb(42, 44, 47),
            dim: Color::Rgb(143, 143, 143),
            missed: Color::Rgb(100, 100, 100),
            good: Color::Rgb(74, 122, 74),
            warn: Color::Rgb(199, 162, 74),
            crit: Color::Rgb(255, 59, 59),
            key: Color::Rgb(100, 200, 255),
            selected_bg: Color::Rgb(26, 28, 31),
        }
    }

    pub const fn monotone() -> Self {
        Self {
            name: "monotone",
            bg: Color::Reset,
            fg: Color::Reset,
            title: Color::Reset,
            highlight: Color::White,
            border: Color::DarkGray,
            dim: Color::DarkGray,
            missed: Color::DarkGray,
            good: Color::Reset,
            warn: Color::White,
            crit: Color::White,
            key: Color::White,
            selected_bg: Color::DarkGray,
        }
    }

    pub fn select(monotone: bool) -> Self {
        if monotone {
            Self::monotone()
        } else {
            Self::blacksite()
        }
    }

    /// Base style for panel bodies
    pub fn text(&self) -> Style {
        Style::new().fg(self.fg).bg(self.bg)
    }

    pub fn heading(&self) -> Style {
        Style::new().fg(self.title).add_modifier(Modifier::BOLD)
    }

    pub fn label(&self) -> Style {
        Style::new().fg(self.dim)
    }

    pub fn border_style(&self) -> Style {
        Style::new().fg(self.border)
    }

    pub fn key_style(&self) -> Style {
        Style::new().fg(self.key).add_modifier(Modifier::BOLD)
    }

    /// Colour for a single latency value in milliseconds
    pub fn latency_color(&self, ms: f64) -> Color {
        if ms < 50.0 {
            self.good
        } else if ms < 150.0 {
            self.warn
        } else {
            self.crit
        }
    }

    pub fn quality_color(&self, quality: Quality) -> Color {
        match quality {
            Quality::Excellent | Quality::Good => self.good,
            Quality::Fair | Quality::Poor => self.warn,
            Quality::Offline => self.crit,
            Quality::Unknown => self.dim,
        }
    }

    /// Graph column colour by height relative to the graph's top
    pub fn graph_color(&self, ratio: f64) -> Color {
        if ratio < 0.4 {
            self.good
        } else if ratio < 0.7 {
            self.warn
        } else {
            self.crit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select() {
        assert_eq!(Theme::select(false).name, "blacksite");
        assert_eq!(Theme::select(true).name, "monotone");
    }

    #[test]
    fn test_monotone_has_no_rgb() {
        let theme = Theme::monotone();
        for color in [theme.good, theme.warn, theme.crit, theme.key, theme.fg] {
            assert!(!matches!(color, Color::Rgb(..)));
        }
    }

    #[test]
    fn test_quality_colors() {
        let theme = Theme::blacksite();
        assert_eq!(theme.quality_color(Quality::Excellent), theme.good);
        assert_eq!(theme.quality_color(Quality::Fair), theme.warn);
        assert_eq!(theme.quality_color(Quality::Offline), theme.crit);
        assert_eq!(theme.quality_color(Quality::Unknown), theme.dim);
    }

    #[test]
    fn test_latency_and_graph_gradient() {
        let theme = Theme::blacksite();
        assert_eq!(theme.latency_color(10.0), theme.good);
        assert_eq!(theme.latency_color(100.0), theme.warn);
        assert_eq!(theme.latency_color(400.0), theme.crit);
        assert_eq!(theme.graph_color(0.1), theme.good);
        assert_eq!(theme.graph_color(0.9), theme.crit);
    }
}
