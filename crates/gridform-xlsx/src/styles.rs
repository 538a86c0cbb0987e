//! `styles.xml` parsing and resolution.
//!
//! The container stores styles as integer indirections (`cellXfs` records
//! pointing into font/fill/border tables, with colors as direct ARGB, theme
//! index + tint, or legacy indexed values). GridForm resolves all of that at
//! read time into flat [`Style`] records; nothing downstream ever sees a
//! theme index or tint again.

use std::collections::HashMap;

use gridform_model::{
    Alignment, Border, BorderEdge, Color, Fill, Font, HorizontalAlignment, Style, ThemePalette,
    VerticalAlignment,
};
use roxmltree::{Document, Node};

use crate::number_format::{self, NumFmtKind};
use crate::FormatError;

/// A color as declared in `styles.xml`, before theme resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct RawColor {
    /// Direct ARGB value. Always wins over `theme` when both are present.
    rgb: Option<u32>,
    theme: Option<u32>,
    tint: f64,
}

impl RawColor {
    fn resolve(&self, palette: &ThemePalette, fallback: Color) -> Color {
        if let Some(rgb) = self.rgb {
            return Color::new_argb(rgb);
        }
        if let Some(theme) = self.theme {
            return palette.resolve(theme, self.tint);
        }
        fallback
    }
}

#[derive(Clone, Debug, Default)]
struct RawFont {
    name: Option<String>,
    size_pt: Option<f64>,
    bold: bool,
    italic: bool,
    underline: bool,
    color: Option<RawColor>,
}

#[derive(Clone, Debug, Default)]
struct RawFill {
    pattern: String,
    fg: Option<RawColor>,
}

#[derive(Clone, Copy, Debug, Default)]
struct RawBorderSide {
    style: Option<BorderWeight>,
    color: Option<RawColor>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BorderWeight {
    Thin,
    Medium,
    Thick,
}

impl BorderWeight {
    fn from_style_attr(value: &str) -> Option<Self> {
        // Thickness classes: everything hairline-ish is thin, the two
        // heavyweight styles map up.
        match value {
            "none" => None,
            "medium" | "mediumDashed" | "mediumDashDot" | "mediumDashDotDot" => Some(Self::Medium),
            "thick" | "double" => Some(Self::Thick),
            _ => Some(Self::Thin),
        }
    }

    fn width_px(self) -> u8 {
        match self {
            Self::Thin => 1,
            Self::Medium => 2,
            Self::Thick => 3,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct RawBorder {
    top: RawBorderSide,
    bottom: RawBorderSide,
    left: RawBorderSide,
    right: RawBorderSide,
}

#[derive(Clone, Debug, Default)]
struct RawXf {
    font_id: usize,
    fill_id: usize,
    border_id: usize,
    num_fmt_id: u16,
    horizontal: Option<String>,
    vertical: Option<String>,
    wrap: bool,
}

/// Parsed `xl/styles.xml`: the raw indirection tables plus custom number
/// formats.
#[derive(Clone, Debug, Default)]
pub struct StylesPart {
    fonts: Vec<RawFont>,
    fills: Vec<RawFill>,
    borders: Vec<RawBorder>,
    xfs: Vec<RawXf>,
    num_fmts: HashMap<u16, String>,
}

impl StylesPart {
    /// Parse `styles.xml`. A workbook without a styles part behaves like an
    /// empty one (every cell resolves to the default style).
    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        let xml = std::str::from_utf8(bytes)?;
        let doc = Document::parse(xml)?;
        let root = doc.root_element();
        if root.tag_name().name() != "styleSheet" {
            return Err(FormatError::Invalid(
                "styles.xml root is not <styleSheet>".to_string(),
            ));
        }

        let mut part = StylesPart::default();

        if let Some(num_fmts) = child(root, "numFmts") {
            for fmt in elements(num_fmts, "numFmt") {
                if let (Some(id), Some(code)) = (fmt.attribute("numFmtId"), fmt.attribute("formatCode")) {
                    if let Ok(id) = id.parse::<u16>() {
                        part.num_fmts.insert(id, code.to_string());
                    }
                }
            }
        }

        if let Some(fonts) = child(root, "fonts") {
            for font in elements(fonts, "font") {
                part.fonts.push(parse_font(font));
            }
        }

        if let Some(fills) = child(root, "fills") {
            for fill in elements(fills, "fill") {
                part.fills.push(parse_fill(fill));
            }
        }

        if let Some(borders) = child(root, "borders") {
            for border in elements(borders, "border") {
                part.borders.push(parse_border(border));
            }
        }

        if let Some(cell_xfs) = child(root, "cellXfs") {
            for xf in elements(cell_xfs, "xf") {
                part.xfs.push(parse_xf(xf));
            }
        }

        Ok(part)
    }

    pub fn cell_xfs_count(&self) -> usize {
        self.xfs.len()
    }

    /// Number-format classification for a cell's xf index, used by value
    /// decoding. Out-of-range indices are plain numeric.
    pub(crate) fn num_fmt_kind(&self, xf_index: u32) -> NumFmtKind {
        let Some(xf) = self.xfs.get(xf_index as usize) else {
            return NumFmtKind::General;
        };
        number_format::classify(xf.num_fmt_id, self.num_fmts.get(&xf.num_fmt_id).map(String::as_str))
    }

    /// Resolve an xf index into a flat style record.
    ///
    /// `Err` carries a human-readable reason when the index (or one of the
    /// table ids it references) is out of range; the caller decides whether
    /// that is a warning or a hard failure.
    pub fn resolve(&self, xf_index: u32, palette: &ThemePalette) -> Result<Style, String> {
        let xf = self
            .xfs
            .get(xf_index as usize)
            .ok_or_else(|| format!("style index {xf_index} out of range"))?;

        let font = self
            .fonts
            .get(xf.font_id)
            .ok_or_else(|| format!("font id {} out of range", xf.font_id))?;
        let fill = self
            .fills
            .get(xf.fill_id)
            .ok_or_else(|| format!("fill id {} out of range", xf.fill_id))?;
        let border = self
            .borders
            .get(xf.border_id)
            .ok_or_else(|| format!("border id {} out of range", xf.border_id))?;

        Ok(Style {
            font: resolve_font(font, palette),
            fill: resolve_fill(fill, palette),
            border: resolve_border(border, palette),
            alignment: resolve_alignment(xf),
        })
    }
}

fn resolve_font(raw: &RawFont, palette: &ThemePalette) -> Font {
    let defaults = Font::default();
    Font {
        name: raw.name.clone().unwrap_or(defaults.name),
        size_100pt: raw
            .size_pt
            .map(|pt| (pt * 100.0).round().clamp(0.0, u16::MAX as f64) as u16)
            .unwrap_or(defaults.size_100pt),
        bold: raw.bold,
        italic: raw.italic,
        underline: raw.underline,
        color: raw
            .color
            .map(|c| c.resolve(palette, Color::black()))
            .unwrap_or_else(Color::black),
    }
}

fn resolve_fill(raw: &RawFill, palette: &ThemePalette) -> Fill {
    // Only solid pattern fills carry a background; every other pattern type
    // (none, gray125, stripes, ...) renders white.
    if raw.pattern == "solid" {
        Fill {
            background: raw
                .fg
                .map(|c| c.resolve(palette, Color::white()))
                .unwrap_or_else(Color::white),
        }
    } else {
        Fill::default()
    }
}

fn resolve_border(raw: &RawBorder, palette: &ThemePalette) -> Border {
    Border {
        top: resolve_border_side(raw.top, palette),
        bottom: resolve_border_side(raw.bottom, palette),
        left: resolve_border_side(raw.left, palette),
        right: resolve_border_side(raw.right, palette),
    }
}

fn resolve_border_side(raw: RawBorderSide, palette: &ThemePalette) -> BorderEdge {
    match raw.style {
        // Unspecified sides keep the 1px hairline gray default.
        None => BorderEdge::default(),
        Some(weight) => BorderEdge {
            width_px: weight.width_px(),
            color: raw
                .color
                .map(|c| c.resolve(palette, Color::black()))
                .unwrap_or_else(Color::black),
        },
    }
}

fn resolve_alignment(xf: &RawXf) -> Alignment {
    let horizontal = match xf.horizontal.as_deref() {
        Some("center") | Some("centerContinuous") => HorizontalAlignment::Center,
        Some("right") => HorizontalAlignment::Right,
        Some("justify") | Some("distributed") => HorizontalAlignment::Justify,
        _ => HorizontalAlignment::Left,
    };
    let vertical = match xf.vertical.as_deref() {
        Some("top") => VerticalAlignment::Top,
        Some("center") | Some("justify") | Some("distributed") => VerticalAlignment::Middle,
        // Spreadsheet convention: bottom unless told otherwise.
        _ => VerticalAlignment::Bottom,
    };
    Alignment {
        horizontal,
        vertical,
        wrap: xf.wrap,
    }
}

fn parse_font(el: Node<'_, '_>) -> RawFont {
    let mut font = RawFont::default();
    for c in el.children().filter(|n| n.is_element()) {
        match c.tag_name().name() {
            "name" => font.name = c.attribute("val").map(str::to_string),
            "sz" => font.size_pt = c.attribute("val").and_then(|v| v.parse().ok()),
            "b" => font.bold = parse_flag(c),
            "i" => font.italic = parse_flag(c),
            "u" => font.underline = c.attribute("val") != Some("none"),
            "color" => font.color = Some(parse_color(c)),
            _ => {}
        }
    }
    font
}

fn parse_fill(el: Node<'_, '_>) -> RawFill {
    let mut fill = RawFill::default();
    if let Some(pattern) = child(el, "patternFill") {
        fill.pattern = pattern
            .attribute("patternType")
            .unwrap_or("none")
            .to_string();
        if let Some(fg) = child(pattern, "fgColor") {
            fill.fg = Some(parse_color(fg));
        }
    }
    fill
}

fn parse_border(el: Node<'_, '_>) -> RawBorder {
    RawBorder {
        top: parse_border_side(child(el, "top")),
        bottom: parse_border_side(child(el, "bottom")),
        left: parse_border_side(child(el, "left")),
        right: parse_border_side(child(el, "right")),
    }
}

fn parse_border_side(el: Option<Node<'_, '_>>) -> RawBorderSide {
    let Some(el) = el else {
        return RawBorderSide::default();
    };
    RawBorderSide {
        style: el.attribute("style").and_then(BorderWeight::from_style_attr),
        color: child(el, "color").map(parse_color),
    }
}

fn parse_xf(el: Node<'_, '_>) -> RawXf {
    let attr_usize =
        |name: &str| el.attribute(name).and_then(|v| v.parse().ok()).unwrap_or(0usize);

    let mut xf = RawXf {
        font_id: attr_usize("fontId"),
        fill_id: attr_usize("fillId"),
        border_id: attr_usize("borderId"),
        num_fmt_id: el
            .attribute("numFmtId")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0),
        ..RawXf::default()
    };

    if let Some(alignment) = child(el, "alignment") {
        xf.horizontal = alignment.attribute("horizontal").map(str::to_string);
        xf.vertical = alignment.attribute("vertical").map(str::to_string);
        xf.wrap = alignment
            .attribute("wrapText")
            .map(parse_bool_attr)
            .unwrap_or(false);
    }

    xf
}

fn parse_color(el: Node<'_, '_>) -> RawColor {
    let mut color = RawColor::default();
    if let Some(rgb) = el.attribute("rgb") {
        color.rgb = parse_argb(rgb);
    }
    if let Some(theme) = el.attribute("theme") {
        color.theme = theme.parse().ok();
    }
    if let Some(tint) = el.attribute("tint") {
        color.tint = tint.parse().unwrap_or(0.0);
    }
    color
}

fn parse_argb(value: &str) -> Option<u32> {
    let hex = value.trim().trim_start_matches('#');
    match hex.len() {
        6 => u32::from_str_radix(hex, 16).ok().map(|rgb| 0xFF00_0000 | rgb),
        8 => u32::from_str_radix(hex, 16).ok(),
        _ => None,
    }
}

fn parse_flag(el: Node<'_, '_>) -> bool {
    el.attribute("val").map(parse_bool_attr).unwrap_or(true)
}

fn parse_bool_attr(value: &str) -> bool {
    matches!(value, "1" | "true")
}

/// Serialize a resolved [`StyleTable`] back into `styles.xml`.
///
/// The layout is chosen so a round trip through [`StylesPart::resolve`]
/// reproduces the table exactly: cellXfs index == style id, white fills map
/// to pattern `none`, and default border edges serialize as unstyled sides.
pub fn write_styles_xml(styles: &gridform_model::StyleTable) -> String {
    let mut fonts = String::new();
    let mut fills = String::from(
        r#"<fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill>"#,
    );
    let mut fill_count = 2usize;
    let mut borders = String::from("<border><left/><right/><top/><bottom/></border>");
    let mut border_count = 1usize;
    let mut xfs = String::new();

    // One font per style, so the font id is the style id.
    for (font_id, style) in styles.iter() {
        fonts.push_str(&write_font(&style.font));

        let fill_id = if style.fill.background == Color::white() {
            0
        } else {
            fills.push_str(&format!(
                r#"<fill><patternFill patternType="solid"><fgColor rgb="{:08X}"/></patternFill></fill>"#,
                style.fill.background.argb
            ));
            fill_count += 1;
            fill_count - 1
        };

        let border_id = if style.border == Border::default() {
            0
        } else {
            borders.push_str(&write_border(&style.border));
            border_count += 1;
            border_count - 1
        };

        xfs.push_str(&format!(
            r#"<xf numFmtId="0" fontId="{font_id}" fillId="{fill_id}" borderId="{border_id}" xfId="0""#
        ));
        if style.alignment == Alignment::default() {
            xfs.push_str("/>");
        } else {
            xfs.push_str(r#" applyAlignment="1"><alignment"#);
            match style.alignment.horizontal {
                HorizontalAlignment::Left => {}
                HorizontalAlignment::Center => xfs.push_str(r#" horizontal="center""#),
                HorizontalAlignment::Right => xfs.push_str(r#" horizontal="right""#),
                HorizontalAlignment::Justify => xfs.push_str(r#" horizontal="justify""#),
            }
            match style.alignment.vertical {
                VerticalAlignment::Top => xfs.push_str(r#" vertical="top""#),
                VerticalAlignment::Middle => xfs.push_str(r#" vertical="center""#),
                VerticalAlignment::Bottom => {}
            }
            if style.alignment.wrap {
                xfs.push_str(r#" wrapText="1""#);
            }
            xfs.push_str("/></xf>");
        }
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">"#,
            r#"<fonts count="{}">{}</fonts>"#,
            r#"<fills count="{}">{}</fills>"#,
            r#"<borders count="{}">{}</borders>"#,
            r#"<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>"#,
            r#"<cellXfs count="{}">{}</cellXfs>"#,
            r#"<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>"#,
            r#"</styleSheet>"#
        ),
        styles.len(),
        fonts,
        fill_count,
        fills,
        border_count,
        borders,
        styles.len(),
        xfs,
    )
}

fn write_font(font: &Font) -> String {
    let mut xml = String::from("<font>");
    xml.push_str(&format!(r#"<sz val="{}"/>"#, fmt_size(font.size_100pt)));
    xml.push_str(&format!(r#"<color rgb="{:08X}"/>"#, font.color.argb));
    xml.push_str(&format!(r#"<name val="{}"/>"#, xml_escape_attr(&font.name)));
    if font.bold {
        xml.push_str("<b/>");
    }
    if font.italic {
        xml.push_str("<i/>");
    }
    if font.underline {
        xml.push_str("<u/>");
    }
    xml.push_str("</font>");
    xml
}

fn write_border(border: &Border) -> String {
    let mut xml = String::from("<border>");
    for (name, edge) in [
        ("left", border.left),
        ("right", border.right),
        ("top", border.top),
        ("bottom", border.bottom),
    ] {
        if edge == BorderEdge::default() {
            xml.push_str(&format!("<{name}/>"));
        } else {
            let style = match edge.width_px {
                0 | 1 => "thin",
                2 => "medium",
                _ => "thick",
            };
            xml.push_str(&format!(
                r#"<{name} style="{style}"><color rgb="{:08X}"/></{name}>"#,
                edge.color.argb
            ));
        }
    }
    xml.push_str("</border>");
    xml
}

/// Font size in points, with at most two decimals and no trailing zeros.
fn fmt_size(size_100pt: u16) -> String {
    let whole = size_100pt / 100;
    let frac = size_100pt % 100;
    if frac == 0 {
        format!("{whole}")
    } else if frac % 10 == 0 {
        format!("{whole}.{}", frac / 10)
    } else {
        format!("{whole}.{frac:02}")
    }
}

fn xml_escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn child<'a, 'input>(el: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    el.children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
}

fn elements<'a, 'input: 'a>(
    el: Node<'a, 'input>,
    name: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    el.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STYLES: &str = r##"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <numFmts count="1">
    <numFmt numFmtId="164" formatCode="#,##0.0"/>
  </numFmts>
  <fonts count="3">
    <font><sz val="11"/><name val="Calibri"/></font>
    <font><sz val="14"/><b/><name val="Arial"/><color rgb="FFFF0000"/></font>
    <font><sz val="11"/><name val="Calibri"/><color theme="4" tint="0.5"/></font>
  </fonts>
  <fills count="4">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
    <fill><patternFill patternType="solid"><fgColor theme="4"/></patternFill></fill>
    <fill><patternFill patternType="darkGrid"><fgColor rgb="FF00FF00"/></patternFill></fill>
  </fills>
  <borders count="2">
    <border><left/><right/><top/><bottom/></border>
    <border>
      <left style="thin"><color rgb="FF000000"/></left>
      <right style="medium"/>
      <top style="thick"/>
      <bottom/>
    </border>
  </borders>
  <cellXfs count="4">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
    <xf numFmtId="164" fontId="1" fillId="2" borderId="1">
      <alignment horizontal="center" vertical="top" wrapText="1"/>
    </xf>
    <xf numFmtId="14" fontId="2" fillId="3" borderId="0">
      <alignment horizontal="justify"/>
    </xf>
    <xf numFmtId="0" fontId="99" fillId="0" borderId="0"/>
  </cellXfs>
</styleSheet>"##;

    fn part() -> StylesPart {
        StylesPart::parse(STYLES.as_bytes()).unwrap()
    }

    #[test]
    fn default_xf_resolves_to_default_style() {
        let style = part().resolve(0, &ThemePalette::default()).unwrap();
        assert_eq!(style, Style::default());
    }

    #[test]
    fn resolves_fonts_fills_borders_and_alignment() {
        let style = part().resolve(1, &ThemePalette::default()).unwrap();

        assert_eq!(style.font.name, "Arial");
        assert_eq!(style.font.size_100pt, 1400);
        assert!(style.font.bold);
        assert_eq!(style.font.color, Color::new_argb(0xFFFF0000));

        // fillId 2 is solid over theme accent1.
        assert_eq!(style.fill.background.rgb_hex(), "#4472C4");

        assert_eq!(style.border.left.width_px, 1);
        assert_eq!(style.border.left.color, Color::black());
        assert_eq!(style.border.right.width_px, 2);
        assert_eq!(style.border.right.color, Color::black());
        assert_eq!(style.border.top.width_px, 3);
        // Unspecified bottom keeps the hairline default.
        assert_eq!(style.border.bottom, BorderEdge::default());

        assert_eq!(style.alignment.horizontal, HorizontalAlignment::Center);
        assert_eq!(style.alignment.vertical, VerticalAlignment::Top);
        assert!(style.alignment.wrap);
    }

    #[test]
    fn non_solid_fill_is_white_and_theme_font_tints() {
        let style = part().resolve(2, &ThemePalette::default()).unwrap();
        // darkGrid pattern: not solid, so white.
        assert_eq!(style.fill.background, Color::white());
        // theme 4 tint 0.5 lightens accent1 midway to white.
        assert_eq!(style.font.color.rgb_hex(), "#A2B9E2");
        assert_eq!(style.alignment.horizontal, HorizontalAlignment::Justify);
        assert_eq!(style.alignment.vertical, VerticalAlignment::Bottom);
    }

    #[test]
    fn out_of_range_references_error_with_reason() {
        let part = part();
        assert!(part.resolve(99, &ThemePalette::default()).is_err());
        // xf 3 references fontId 99 which does not exist.
        let err = part.resolve(3, &ThemePalette::default()).unwrap_err();
        assert!(err.contains("font id 99"));
    }

    #[test]
    fn classifies_num_fmts_per_xf() {
        let part = part();
        assert_eq!(part.num_fmt_kind(0), NumFmtKind::General);
        assert_eq!(part.num_fmt_kind(1), NumFmtKind::Grouped);
        assert_eq!(part.num_fmt_kind(2), NumFmtKind::Date { with_time: false });
        assert_eq!(part.num_fmt_kind(999), NumFmtKind::General);
    }

    #[test]
    fn rejects_non_stylesheet_root() {
        assert!(StylesPart::parse(b"<workbook/>").is_err());
    }

    #[test]
    fn written_styles_resolve_back_to_the_same_table() {
        let mut table = gridform_model::StyleTable::new();

        let mut header = Style::default();
        header.font.name = "Arial".to_string();
        header.font.size_100pt = 1400;
        header.font.bold = true;
        header.fill.background = Color::new_argb(0xFF4472C4);
        header.border.bottom = BorderEdge {
            width_px: 2,
            color: Color::black(),
        };
        header.alignment.horizontal = HorizontalAlignment::Center;
        header.alignment.vertical = VerticalAlignment::Middle;
        header.alignment.wrap = true;
        table.intern(header);

        let mut small = Style::default();
        small.font.size_100pt = 1050;
        small.font.underline = true;
        table.intern(small);

        let xml = write_styles_xml(&table);
        let part = StylesPart::parse(xml.as_bytes()).unwrap();
        let palette = ThemePalette::default();

        assert_eq!(part.cell_xfs_count(), table.len());
        for (id, style) in table.iter() {
            assert_eq!(part.resolve(id, &palette).unwrap(), *style, "style {id}");
        }
    }

    #[test]
    fn size_formatting_has_no_trailing_zeros() {
        assert_eq!(fmt_size(1100), "11");
        assert_eq!(fmt_size(1050), "10.5");
        assert_eq!(fmt_size(1025), "10.25");
    }
}
