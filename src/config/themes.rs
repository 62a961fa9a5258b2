use std::collections::HashSet;

use ratatui::style::Color;
use strum::IntoEnumIterator;

use super::ThemeName;

#[derive(Debug, Clone)]
pub struct ThemeRegistry {
    names: HashSet<ThemeName>,
}

impl ThemeRegistry {
    pub fn contains(&self, theme: &ThemeName) -> bool {
        self.names.contains(theme)
    }
}

impl Default for ThemeRegistry {
    fn default() -> Self {
        Self {
            names: ThemeName::iter().collect(),
        }
    }
}

/// Colours the list and form draw with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub accent: Color,
    pub text: Color,
    pub muted: Color,
    pub upcoming: Color,
    pub expired: Color,
    pub permanent: Color,
    pub invalid: Color,
    pub selection_bg: Color,
    pub selection_fg: Color,
}

impl ThemeName {
    pub fn palette(self) -> Palette {
        match self {
            ThemeName::Dark => Palette {
                accent: Color::Cyan,
                text: Color::White,
                muted: Color::Gray,
                upcoming: Color::Green,
                expired: Color::Red,
                permanent: Color::Magenta,
                invalid: Color::Yellow,
                selection_bg: Color::Blue,
                selection_fg: Color::Black,
            },
            ThemeName::Light => Palette {
                accent: Color::Blue,
                text: Color::Black,
                muted: Color::DarkGray,
                upcoming: Color::Green,
                expired: Color::Red,
                permanent: Color::Magenta,
                invalid: Color::Yellow,
                selection_bg: Color::LightBlue,
                selection_fg: Color::Black,
            },
            ThemeName::HighContrast => Palette {
                accent: Color::Yellow,
                text: Color::White,
                muted: Color::White,
                upcoming: Color::LightGreen,
                expired: Color::LightRed,
                permanent: Color::LightCyan,
                invalid: Color::LightYellow,
                selection_bg: Color::White,
                selection_fg: Color::Black,
            },
            ThemeName::Solarized => Palette {
                accent: Color::Rgb(38, 139, 210),
                text: Color::Rgb(147, 161, 161),
                muted: Color::Rgb(88, 110, 117),
                upcoming: Color::Rgb(133, 153, 0),
                expired: Color::Rgb(220, 50, 47),
                permanent: Color::Rgb(108, 113, 196),
                invalid: Color::Rgb(181, 137, 0),
                selection_bg: Color::Rgb(7, 54, 66),
                selection_fg: Color::Rgb(238, 232, 213),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_knows_every_theme() {
        let registry = ThemeRegistry::default();
        assert!(ThemeName::iter().all(|theme| registry.contains(&theme)));
        assert!(registry.contains(&ThemeName::HighContrast));
    }

    #[test]
    fn expired_and_upcoming_never_share_a_colour() {
        for theme in ThemeName::iter() {
            let palette = theme.palette();
            assert_ne!(palette.expired, palette.upcoming, "{theme}");
            assert_ne!(palette.expired, palette.permanent, "{theme}");
        }
    }
}
