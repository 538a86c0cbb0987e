use serde::{Deserialize, Serialize};

use crate::style::Color;

/// Number of slots in the indexed theme palette.
pub const THEME_COLOR_COUNT: usize = 10;

/// The workbook color theme: a fixed 10-entry base-color table.
///
/// Style records reference these colors by index 0-9 in the order
/// `lt1, dk1, lt2, dk2, accent1..accent6`, optionally adjusted by a tint.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemePalette {
    pub lt1: Color,
    pub dk1: Color,
    pub lt2: Color,
    pub dk2: Color,
    pub accent1: Color,
    pub accent2: Color,
    pub accent3: Color,
    pub accent4: Color,
    pub accent5: Color,
    pub accent6: Color,
}

impl Default for ThemePalette {
    fn default() -> Self {
        // The stock "Office" theme. Workbooks that omit theme1.xml rely on
        // these values.
        Self {
            lt1: Color::new_argb(0xFFFFFFFF),
            dk1: Color::new_argb(0xFF000000),
            lt2: Color::new_argb(0xFFE7E6E6),
            dk2: Color::new_argb(0xFF44546A),
            accent1: Color::new_argb(0xFF4472C4),
            accent2: Color::new_argb(0xFFED7D31),
            accent3: Color::new_argb(0xFFA5A5A5),
            accent4: Color::new_argb(0xFFFFC000),
            accent5: Color::new_argb(0xFF5B9BD5),
            accent6: Color::new_argb(0xFF70AD47),
        }
    }
}

impl ThemePalette {
    /// Base color for a 0-9 theme index; `None` for out-of-range indices.
    pub fn color_by_index(&self, index: u32) -> Option<Color> {
        let color = match index {
            0 => self.lt1,
            1 => self.dk1,
            2 => self.lt2,
            3 => self.dk2,
            4 => self.accent1,
            5 => self.accent2,
            6 => self.accent3,
            7 => self.accent4,
            8 => self.accent5,
            9 => self.accent6,
            _ => return None,
        };
        Some(color)
    }

    /// Resolve theme index + tint into a concrete color.
    ///
    /// Out-of-range indices resolve to black so a single bad style reference
    /// never aborts a read; callers that care surface a diagnostic.
    pub fn resolve(&self, index: u32, tint: f64) -> Color {
        let base = self.color_by_index(index).unwrap_or_else(Color::black);
        apply_tint(base, tint)
    }
}

/// Apply a tint to an ARGB color.
///
/// `tint` is a signed fraction in `[-1, 1]`:
/// - `tint >= 0` lightens toward white: `c' = c + (255 - c) * tint`
/// - `tint < 0` darkens toward black: `c' = c * (1 + tint)`
///
/// Each channel is rounded and clamped to `0..=255`. Midpoints round half
/// away from zero, so `#4472C4` at tint `0.5` is `#A2B9E2` (the truncating
/// rendition some tools produce would be `#A2B9E1`). Pure function:
/// identical inputs always produce the identical color.
pub fn apply_tint(color: Color, tint: f64) -> Color {
    if tint == 0.0 {
        return color;
    }

    let tint = tint.clamp(-1.0, 1.0);
    let argb = color.argb;

    let a = (argb >> 24) & 0xFF;
    let r = tint_channel(((argb >> 16) & 0xFF) as u8, tint);
    let g = tint_channel(((argb >> 8) & 0xFF) as u8, tint);
    let b = tint_channel((argb & 0xFF) as u8, tint);

    Color::new_argb((a << 24) | ((r as u32) << 16) | ((g as u32) << 8) | (b as u32))
}

fn tint_channel(channel: u8, tint: f64) -> u8 {
    let c = channel as f64;
    let adjusted = if tint < 0.0 {
        c * (1.0 + tint)
    } else {
        c + (255.0 - c) * tint
    };
    adjusted.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn index_4_is_accent1() {
        let palette = ThemePalette::default();
        assert_eq!(palette.color_by_index(4).unwrap().rgb_hex(), "#4472C4");
        assert_eq!(palette.color_by_index(10), None);
    }

    #[test]
    fn tint_zero_is_identity() {
        let palette = ThemePalette::default();
        assert_eq!(palette.resolve(4, 0.0).rgb_hex(), "#4472C4");
    }

    #[test]
    fn tint_lightens_accent1_midway_to_white() {
        let palette = ThemePalette::default();
        // 0x44 + (255-0x44)/2 = 0xA2, 0x72 -> 0xB9 (rounded), 0xC4 -> 0xE2.
        assert_eq!(palette.resolve(4, 0.5).rgb_hex(), "#A2B9E2");
    }

    #[test]
    fn tint_darkens_accent1_midway_to_black() {
        let palette = ThemePalette::default();
        assert_eq!(palette.resolve(4, -0.5).rgb_hex(), "#223962");
    }

    #[test]
    fn tint_extremes_saturate() {
        let c = Color::new_argb(0xFF0000FF);
        assert_eq!(apply_tint(c, 1.0), Color::white());
        assert_eq!(apply_tint(c, -1.0), Color::black());
    }

    #[test]
    fn out_of_range_index_resolves_to_black() {
        let palette = ThemePalette::default();
        assert_eq!(palette.resolve(42, 0.0), Color::black());
    }
}
