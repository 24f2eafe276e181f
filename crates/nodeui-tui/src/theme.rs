//! Colors, picked to suit the terminal background.

use ratatui::style::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    /// Detect from background luminance. Must run before raw mode is enabled.
    pub fn detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.6 => {
                tracing::debug!("Light terminal background (luma {:.2})", luma);
                Theme::Light
            }
            Ok(_) => Theme::Dark,
            Err(e) => {
                tracing::debug!("Terminal background unknown ({}), using dark theme", e);
                Theme::Dark
            }
        }
    }

    pub fn palette(&self) -> Palette {
        match self {
            Theme::Dark => Palette::dark(),
            Theme::Light => Palette::light(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub fg: Color,
    pub muted: Color,
    pub border: Color,
    pub border_active: Color,

    /// Labels in the status pane and account headings.
    pub label: Color,
    /// Round numbers, keys and addresses.
    pub key: Color,
    /// Cursor and selected row.
    pub selection: Color,

    pub success: Color,
    pub warning: Color,
    pub error: Color,

    pub gauge: Color,
    pub footer_brand: Color,
    pub footer_version: Color,
    pub footer_bg: Color,
}

impl Palette {
    pub fn dark() -> Self {
        Self {
            fg: Color::Rgb(0xC1, 0xC6, 0xB2),
            muted: Color::DarkGray,
            border: Color::Rgb(0xAB, 0xB8, 0xC3),
            border_active: Color::Indexed(62),
            label: Color::Rgb(0x06, 0x93, 0xE3),
            key: Color::Rgb(0xA3, 0xA3, 0x22),
            selection: Color::Rgb(0xB0, 0x83, 0xEA),
            success: Color::Rgb(0x4C, 0xAF, 0x50),
            warning: Color::Yellow,
            error: Color::Red,
            gauge: Color::Rgb(0x5A, 0x56, 0xE0),
            footer_brand: Color::Rgb(0x4C, 0xAF, 0x50),
            footer_version: Color::Rgb(0xA5, 0x50, 0xDF),
            footer_bg: Color::Rgb(0x35, 0x35, 0x33),
        }
    }

    pub fn light() -> Self {
        Self {
            fg: Color::Rgb(0x34, 0x34, 0x33),
            muted: Color::Gray,
            border: Color::Rgb(0x70, 0x7C, 0x88),
            border_active: Color::Indexed(62),
            label: Color::Rgb(0x00, 0x5F, 0x9E),
            key: Color::Rgb(0x7A, 0x7A, 0x00),
            selection: Color::Rgb(0x6A, 0x3D, 0xB0),
            success: Color::Rgb(0x2E, 0x7D, 0x32),
            warning: Color::Rgb(184, 134, 11),
            error: Color::Rgb(178, 34, 34),
            gauge: Color::Rgb(0x3F, 0x3A, 0xB8),
            footer_brand: Color::Rgb(0x2E, 0x7D, 0x32),
            footer_version: Color::Rgb(0x86, 0x3B, 0xB8),
            footer_bg: Color::Rgb(0xD9, 0xDC, 0xCF),
        }
    }
}
