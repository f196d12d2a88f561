use ratatui::style::Color;

use crate::model::{Difficulty, UiConfig};

/// Dashboard palette. Every slot can be overridden from `[ui.colors]` by its
/// field name; difficulty colors come from `[ui.difficulty_colors]`.
#[derive(Debug, Clone)]
pub struct Theme {
    pub bg: Color,
    pub fg: Color,
    pub fg_strong: Color,
    pub accent: Color,
    pub muted: Color,
    pub error: Color,
    pub warning: Color,
    pub success: Color,
    pub info: Color,
    pub cursor_bg: Color,
    pub cursor_border: Color,
    /// Check mark of a tracked problem
    pub tracked: Color,
    pub easy: Color,
    pub medium: Color,
    pub hard: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            bg: Color::Rgb(0x11, 0x16, 0x1D),
            fg: Color::Rgb(0xC9, 0xD1, 0xD9),
            fg_strong: Color::Rgb(0xF0, 0xF6, 0xFC),
            accent: Color::Rgb(0xFF, 0xA1, 0x16),
            muted: Color::Rgb(0x6E, 0x76, 0x81),
            error: Color::Rgb(0xF8, 0x51, 0x49),
            warning: Color::Rgb(0xD2, 0x99, 0x22),
            success: Color::Rgb(0x3F, 0xB9, 0x50),
            info: Color::Rgb(0x58, 0xA6, 0xFF),
            cursor_bg: Color::Rgb(0x21, 0x26, 0x2D),
            cursor_border: Color::Rgb(0xFF, 0xA1, 0x16),
            tracked: Color::Rgb(0x3F, 0xB9, 0x50),
            easy: Color::Rgb(0x00, 0xB8, 0xA3),
            medium: Color::Rgb(0xFF, 0xC0, 0x1E),
            hard: Color::Rgb(0xFF, 0x37, 0x5F),
        }
    }
}

/// `#RRGGBB` or `#RGB`, case-insensitive.
fn parse_hex_color(value: &str) -> Option<Color> {
    let digits = value.trim().strip_prefix('#')?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match digits.len() {
        6 => Some(Color::Rgb(
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        )),
        3 => {
            let mut rgb = digits.chars().filter_map(|c| c.to_digit(16)).map(|d| (d * 17) as u8);
            Some(Color::Rgb(rgb.next()?, rgb.next()?, rgb.next()?))
        }
        _ => None,
    }
}

impl Theme {
    fn slot_mut(&mut self, name: &str) -> Option<&mut Color> {
        let slot = match name {
            "bg" => &mut self.bg,
            "fg" => &mut self.fg,
            "fg_strong" => &mut self.fg_strong,
            "accent" => &mut self.accent,
            "muted" => &mut self.muted,
            "error" => &mut self.error,
            "warning" => &mut self.warning,
            "success" => &mut self.success,
            "info" => &mut self.info,
            "cursor_bg" => &mut self.cursor_bg,
            "cursor_border" => &mut self.cursor_border,
            "tracked" => &mut self.tracked,
            _ => return None,
        };
        Some(slot)
    }

    fn difficulty_slot_mut(&mut self, difficulty: Difficulty) -> &mut Color {
        match difficulty {
            Difficulty::Easy => &mut self.easy,
            Difficulty::Medium => &mut self.medium,
            Difficulty::Hard => &mut self.hard,
        }
    }

    /// Default palette with the config's overrides applied. Unknown keys and
    /// malformed colors are ignored.
    pub fn from_config(ui: &UiConfig) -> Self {
        let mut theme = Theme::default();
        for (name, value) in &ui.colors {
            if let Some(color) = parse_hex_color(value)
                && let Some(slot) = theme.slot_mut(name.trim())
            {
                *slot = color;
            }
        }
        for (name, value) in &ui.difficulty_colors {
            if let Some(color) = parse_hex_color(value)
                && let Some(difficulty) = Difficulty::parse(name)
            {
                *theme.difficulty_slot_mut(difficulty) = color;
            }
        }
        theme
    }

    pub fn difficulty_color(&self, difficulty: Difficulty) -> Color {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn hex_colors_long_and_short() {
        assert_eq!(parse_hex_color("#3fb950"), Some(Color::Rgb(0x3F, 0xB9, 0x50)));
        assert_eq!(parse_hex_color("#fa0"), Some(Color::Rgb(0xFF, 0xAA, 0x00)));
        assert_eq!(parse_hex_color("3fb950"), None);
        assert_eq!(parse_hex_color("#3fb9"), None);
        assert_eq!(parse_hex_color("#gg0000"), None);
    }

    #[test]
    fn config_overrides_known_slots_only() {
        let mut ui = UiConfig::default();
        ui.colors.insert("bg".into(), "#000000".into());
        ui.colors.insert("sparkle".into(), "#ffffff".into());
        ui.colors.insert("accent".into(), "not a color".into());
        ui.difficulty_colors.insert("Hard".into(), "#112233".into());
        ui.difficulty_colors.insert("impossible".into(), "#445566".into());

        let theme = Theme::from_config(&ui);
        let defaults = Theme::default();
        assert_eq!(theme.bg, Color::Rgb(0, 0, 0));
        assert_eq!(theme.accent, defaults.accent);
        assert_eq!(theme.difficulty_color(Difficulty::Hard), Color::Rgb(0x11, 0x22, 0x33));
        assert_eq!(theme.difficulty_color(Difficulty::Easy), defaults.easy);
        assert_eq!(theme.fg, defaults.fg);
    }
}
