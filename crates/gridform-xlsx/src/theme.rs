//! Theme palette extraction from `xl/theme/theme1.xml`.

use gridform_model::{Color, ThemePalette};
use roxmltree::Document;

use crate::FormatError;

/// Parse a workbook theme and extract the 10-entry color palette.
///
/// Missing entries (or a theme with no `clrScheme` at all) keep the stock
/// Office defaults. Many producers omit the full theme definition and rely
/// on those defaults.
pub fn parse_theme_palette(theme_xml: &[u8]) -> Result<ThemePalette, FormatError> {
    let xml = std::str::from_utf8(theme_xml)?;
    let doc = Document::parse(xml)?;

    let mut palette = ThemePalette::default();

    let Some(clr_scheme) = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name() == "clrScheme")
    else {
        return Ok(palette);
    };

    let slots: [(&str, &mut Color); 10] = [
        ("lt1", &mut palette.lt1),
        ("dk1", &mut palette.dk1),
        ("lt2", &mut palette.lt2),
        ("dk2", &mut palette.dk2),
        ("accent1", &mut palette.accent1),
        ("accent2", &mut palette.accent2),
        ("accent3", &mut palette.accent3),
        ("accent4", &mut palette.accent4),
        ("accent5", &mut palette.accent5),
        ("accent6", &mut palette.accent6),
    ];
    for (name, slot) in slots {
        if let Some(color) = parse_clr_scheme_entry(clr_scheme, name) {
            *slot = color;
        }
    }

    Ok(palette)
}

/// Serialize a palette as a minimal theme part. Only the color scheme is
/// carried; [`parse_theme_palette`] reads it back unchanged.
pub fn write_theme_xml(palette: &ThemePalette) -> String {
    let entry = |name: &str, color: Color| {
        format!(
            r#"<a:{name}><a:srgbClr val="{:06X}"/></a:{name}>"#,
            color.argb & 0x00FF_FFFF
        )
    };

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme">"#,
            r#"<a:themeElements><a:clrScheme name="Office">"#,
            "{}{}{}{}{}{}{}{}{}{}",
            r#"<a:hlink><a:srgbClr val="0563C1"/></a:hlink>"#,
            r#"<a:folHlink><a:srgbClr val="954F72"/></a:folHlink>"#,
            r#"</a:clrScheme></a:themeElements></a:theme>"#
        ),
        entry("dk1", palette.dk1),
        entry("lt1", palette.lt1),
        entry("dk2", palette.dk2),
        entry("lt2", palette.lt2),
        entry("accent1", palette.accent1),
        entry("accent2", palette.accent2),
        entry("accent3", palette.accent3),
        entry("accent4", palette.accent4),
        entry("accent5", palette.accent5),
        entry("accent6", palette.accent6),
    )
}

fn parse_clr_scheme_entry(clr_scheme: roxmltree::Node<'_, '_>, name: &str) -> Option<Color> {
    let entry = clr_scheme
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == name)?;
    let clr = entry.children().find(|n| n.is_element())?;

    match clr.tag_name().name() {
        "srgbClr" => clr.attribute("val").and_then(parse_rgb_hex),
        "sysClr" => clr
            .attribute("lastClr")
            .and_then(parse_rgb_hex)
            .or_else(|| clr.attribute("val").and_then(sys_clr_fallback)),
        _ => None,
    }
}

fn sys_clr_fallback(val: &str) -> Option<Color> {
    // If `lastClr` is present we always prefer it, since it reflects what the
    // authoring system last resolved. These are the common fallbacks.
    match val {
        "windowText" | "WindowText" => Some(Color::black()),
        "window" | "Window" => Some(Color::white()),
        _ => None,
    }
}

fn parse_rgb_hex(value: &str) -> Option<Color> {
    let hex = value.trim().trim_start_matches('#');
    match hex.len() {
        6 => u32::from_str_radix(hex, 16)
            .ok()
            .map(|rgb| Color::new_argb(0xFF00_0000 | rgb)),
        8 => u32::from_str_radix(hex, 16).ok().map(Color::new_argb),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_palette_from_theme_xml() {
        let theme = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme">
  <a:themeElements>
    <a:clrScheme name="Office">
      <a:dk1><a:sysClr val="windowText" lastClr="111111"/></a:dk1>
      <a:lt1><a:sysClr val="window" lastClr="EEEEEE"/></a:lt1>
      <a:dk2><a:srgbClr val="222222"/></a:dk2>
      <a:lt2><a:srgbClr val="DDDDDD"/></a:lt2>
      <a:accent1><a:srgbClr val="010203"/></a:accent1>
      <a:accent2><a:srgbClr val="040506"/></a:accent2>
      <a:accent3><a:srgbClr val="070809"/></a:accent3>
      <a:accent4><a:srgbClr val="0A0B0C"/></a:accent4>
      <a:accent5><a:srgbClr val="0D0E0F"/></a:accent5>
      <a:accent6><a:srgbClr val="101112"/></a:accent6>
    </a:clrScheme>
  </a:themeElements>
</a:theme>"#;

        let palette = parse_theme_palette(theme.as_bytes()).expect("parse theme");
        assert_eq!(palette.dk1, Color::new_argb(0xFF111111));
        assert_eq!(palette.lt1, Color::new_argb(0xFFEEEEEE));
        assert_eq!(palette.dk2, Color::new_argb(0xFF222222));
        assert_eq!(palette.lt2, Color::new_argb(0xFFDDDDDD));
        assert_eq!(palette.accent1, Color::new_argb(0xFF010203));
        assert_eq!(palette.accent6, Color::new_argb(0xFF101112));
    }

    #[test]
    fn missing_clr_scheme_keeps_defaults() {
        let theme = r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Empty"><a:themeElements/></a:theme>"#;
        let palette = parse_theme_palette(theme.as_bytes()).unwrap();
        assert_eq!(palette, ThemePalette::default());
    }

    #[test]
    fn sys_clr_without_last_clr_uses_known_fallbacks() {
        let theme = r#"<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main">
  <a:themeElements>
    <a:clrScheme name="Office">
      <a:dk1><a:sysClr val="windowText"/></a:dk1>
      <a:lt1><a:sysClr val="window"/></a:lt1>
    </a:clrScheme>
  </a:themeElements>
</a:theme>"#;
        let palette = parse_theme_palette(theme.as_bytes()).unwrap();
        assert_eq!(palette.dk1, Color::black());
        assert_eq!(palette.lt1, Color::white());
    }

    #[test]
    fn written_theme_parses_back_to_the_same_palette() {
        let mut palette = ThemePalette::default();
        palette.accent3 = Color::new_argb(0xFF123456);
        let xml = write_theme_xml(&palette);
        assert_eq!(parse_theme_palette(xml.as_bytes()).unwrap(), palette);
    }
}
