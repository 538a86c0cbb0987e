use core::fmt;
use std::collections::HashMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An ARGB color.
///
/// Serialized as a `#AARRGGBB` hex string for IPC friendliness.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub argb: u32,
}

impl Color {
    pub const fn new_argb(argb: u32) -> Self {
        Self { argb }
    }

    pub const fn black() -> Self {
        Self { argb: 0xFF000000 }
    }

    pub const fn white() -> Self {
        Self { argb: 0xFFFFFFFF }
    }

    /// The 1px hairline gray unspecified border sides resolve to.
    pub const fn hairline_gray() -> Self {
        Self { argb: 0xFFD9D9D9 }
    }

    fn to_hex(self) -> String {
        format!("#{:08X}", self.argb)
    }

    /// `#RRGGBB` form with the alpha byte dropped, as consumed by CSS-side
    /// renderers.
    pub fn rgb_hex(self) -> String {
        format!("#{:06X}", self.argb & 0x00FF_FFFF)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.trim();
        let hex = s.strip_prefix('#').ok_or_else(|| {
            D::Error::custom("color must be a #AARRGGBB hex string (missing '#')")
        })?;
        if hex.len() != 8 {
            return Err(D::Error::custom(
                "color must be a #AARRGGBB hex string (8 hex digits)",
            ));
        }
        let argb = u32::from_str_radix(hex, 16).map_err(|_| D::Error::custom("invalid hex"))?;
        Ok(Color { argb })
    }
}

/// Font formatting, fully resolved.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Font {
    pub name: String,
    /// Font size in 1/100 points (e.g. 1100 = 11pt).
    pub size_100pt: u16,
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub underline: bool,
    pub color: Color,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            name: "Calibri".to_string(),
            size_100pt: 1100,
            bold: false,
            italic: false,
            underline: false,
            color: Color::black(),
        }
    }
}

/// Background fill. Only solid-pattern fills carry a color; every other
/// pattern type resolves to white.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fill {
    pub background: Color,
}

impl Default for Fill {
    fn default() -> Self {
        Self {
            background: Color::white(),
        }
    }
}

/// One resolved border side: pixel weight plus color.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BorderEdge {
    /// 1 (thin/hair), 2 (medium) or 3 (thick) pixels.
    pub width_px: u8,
    pub color: Color,
}

impl Default for BorderEdge {
    fn default() -> Self {
        Self {
            width_px: 1,
            color: Color::hairline_gray(),
        }
    }
}

/// Per-side borders.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Border {
    pub top: BorderEdge,
    pub bottom: BorderEdge,
    pub left: BorderEdge,
    pub right: BorderEdge,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAlignment {
    #[default]
    Left,
    Center,
    Right,
    /// Justified text also justifies the last line.
    Justify,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerticalAlignment {
    Top,
    Middle,
    /// Spreadsheet convention: cells align to the bottom unless told otherwise.
    #[default]
    Bottom,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Alignment {
    pub horizontal: HorizontalAlignment,
    pub vertical: VerticalAlignment,
    #[serde(default, skip_serializing_if = "is_false")]
    pub wrap: bool,
}

/// A fully resolved cell style: the flat attribute set the rendering
/// collaborator consumes. No theme indices or tints survive to this point;
/// every color is a concrete ARGB value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Style {
    pub font: Font,
    pub fill: Fill,
    pub border: Border,
    pub alignment: Alignment,
}

/// Deduplicated style store. Cells reference styles by `style_id`;
/// id `0` is always the default style.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StyleTable {
    styles: Vec<Style>,
    #[serde(skip)]
    index: HashMap<Style, u32>,
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StyleTable {
    pub fn new() -> Self {
        let mut table = Self {
            styles: Vec::new(),
            index: HashMap::new(),
        };
        table.intern(Style::default());
        table
    }

    /// Return the id for `style`, inserting it if unseen.
    pub fn intern(&mut self, style: Style) -> u32 {
        if let Some(&id) = self.index.get(&style) {
            return id;
        }
        let id = self.styles.len() as u32;
        self.index.insert(style.clone(), id);
        self.styles.push(style);
        id
    }

    /// Look up a style by id; an unknown id falls back to the default style.
    pub fn get(&self, id: u32) -> Style {
        self.styles
            .get(id as usize)
            .or_else(|| self.styles.first())
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Style)> {
        self.styles.iter().enumerate().map(|(i, s)| (i as u32, s))
    }

    /// Rebuild the lookup index after deserialization.
    pub fn rebuild_index(&mut self) {
        self.index = self
            .styles
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32))
            .collect();
    }
}

fn is_false(v: &bool) -> bool {
    !*v
}
