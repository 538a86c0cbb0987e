//! Workbook serialization: [`gridform_model::Workbook`] → `.xlsx` bytes.
//!
//! Parts are generated into a `BTreeMap` first so the archive layout is
//! deterministic, then deflated into the container. Strings are written
//! through a shared-strings table; styles and the theme are written in a
//! shape their own parsers read back unchanged.

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Write};

use gridform_model::{column_label, CellRef, Range, Sheet, SheetVisibility, Workbook};
use zip::write::FileOptions;
use zip::ZipWriter;

use crate::styles::write_styles_xml;
use crate::theme::write_theme_xml;
use crate::FormatError;

/// Serialize a workbook into an in-memory `.xlsx` container.
pub fn write_workbook(workbook: &Workbook) -> Result<Vec<u8>, FormatError> {
    let parts = build_parts(workbook);

    let cursor = Cursor::new(Vec::new());
    let mut zip = ZipWriter::new(cursor);
    let options =
        FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, bytes) in &parts {
        zip.start_file(name, options)?;
        zip.write_all(bytes)?;
    }

    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

fn build_parts(workbook: &Workbook) -> BTreeMap<String, Vec<u8>> {
    let mut parts: BTreeMap<String, Vec<u8>> = BTreeMap::new();

    let (shared_xml, lookup) = build_shared_strings(workbook);
    parts.insert("xl/sharedStrings.xml".to_string(), shared_xml.into_bytes());
    parts.insert(
        "xl/styles.xml".to_string(),
        write_styles_xml(&workbook.styles).into_bytes(),
    );
    parts.insert(
        "xl/theme/theme1.xml".to_string(),
        write_theme_xml(&workbook.theme).into_bytes(),
    );

    parts.insert(
        "_rels/.rels".to_string(),
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
            r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>"#,
            r#"</Relationships>"#
        )
        .as_bytes()
        .to_vec(),
    );

    let mut image_counter = 0usize;
    for (index, sheet) in workbook.sheets.iter().enumerate() {
        let sheet_no = index + 1;
        let has_drawing = !sheet.photos.is_empty();
        parts.insert(
            format!("xl/worksheets/sheet{sheet_no}.xml"),
            write_worksheet_xml(sheet, &lookup, has_drawing).into_bytes(),
        );

        if has_drawing {
            parts.insert(
                format!("xl/worksheets/_rels/sheet{sheet_no}.xml.rels"),
                format!(
                    concat!(
                        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
                        r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/drawing" Target="../drawings/drawing{sheet_no}.xml"/>"#,
                        r#"</Relationships>"#
                    ),
                    sheet_no = sheet_no
                )
                .into_bytes(),
            );

            let mut drawing_rels = String::from(concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#
            ));
            for (photo_no, photo) in sheet.photos.iter().enumerate() {
                image_counter += 1;
                let media_name = format!("image{image_counter}.{}", photo.format.extension());
                parts.insert(
                    format!("xl/media/{media_name}"),
                    photo.bytes.clone(),
                );
                drawing_rels.push_str(&format!(
                    r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/{media_name}"/>"#,
                    photo_no + 1
                ));
            }
            drawing_rels.push_str("</Relationships>");
            parts.insert(
                format!("xl/drawings/_rels/drawing{sheet_no}.xml.rels"),
                drawing_rels.into_bytes(),
            );
            parts.insert(
                format!("xl/drawings/drawing{sheet_no}.xml"),
                write_drawing_xml(sheet).into_bytes(),
            );
        }
    }

    parts.insert(
        "xl/workbook.xml".to_string(),
        write_workbook_xml(workbook).into_bytes(),
    );
    parts.insert(
        "xl/_rels/workbook.xml.rels".to_string(),
        write_workbook_rels(workbook).into_bytes(),
    );
    parts.insert(
        "[Content_Types].xml".to_string(),
        write_content_types(workbook).into_bytes(),
    );

    parts
}

/// Unique non-empty cell values, in first-appearance order across sheets.
fn build_shared_strings(workbook: &Workbook) -> (String, HashMap<String, u32>) {
    let mut table: Vec<&str> = Vec::new();
    let mut lookup: HashMap<String, u32> = HashMap::new();
    let mut ref_count = 0u32;

    for sheet in &workbook.sheets {
        for (_, cell) in sheet.iter_cells() {
            if cell.value.is_empty() {
                continue;
            }
            ref_count += 1;
            if !lookup.contains_key(&cell.value) {
                lookup.insert(cell.value.clone(), table.len() as u32);
                table.push(&cell.value);
            }
        }
    }

    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main""#);
    xml.push_str(&format!(
        r#" count="{ref_count}" uniqueCount="{}">"#,
        table.len()
    ));
    for s in &table {
        xml.push_str("<si><t");
        if needs_space_preserve(s) {
            xml.push_str(r#" xml:space="preserve""#);
        }
        xml.push('>');
        xml.push_str(&escape_text(s));
        xml.push_str("</t></si>");
    }
    xml.push_str("</sst>");

    (xml, lookup)
}

fn write_worksheet_xml(sheet: &Sheet, lookup: &HashMap<String, u32>, has_drawing: bool) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(concat!(
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main""#,
        r#" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#
    ));

    if !sheet.col_widths.is_empty() {
        xml.push_str("<cols>");
        for (&col, &width) in &sheet.col_widths {
            xml.push_str(&format!(
                r#"<col min="{c}" max="{c}" width="{width}" customWidth="1"/>"#,
                c = col + 1
            ));
        }
        xml.push_str("</cols>");
    }

    // Rows needing an element: any with cells, plus any with a declared
    // height. BTreeMap keeps them ascending.
    let mut rows: BTreeMap<u32, Vec<(CellRef, &gridform_model::Cell)>> = BTreeMap::new();
    for (cell_ref, cell) in sheet.iter_cells() {
        rows.entry(cell_ref.row).or_default().push((cell_ref, cell));
    }
    for &row in sheet.row_heights.keys() {
        rows.entry(row).or_default();
    }

    xml.push_str("<sheetData>");
    for (row, cells) in &rows {
        xml.push_str(&format!(r#"<row r="{}""#, row + 1));
        if let Some(height) = sheet.row_heights.get(row) {
            xml.push_str(&format!(r#" ht="{height}" customHeight="1""#));
        }
        xml.push('>');
        for (cell_ref, cell) in cells {
            xml.push_str(&format!(r#"<c r="{}""#, cell_ref.to_a1()));
            if cell.style_id != 0 {
                xml.push_str(&format!(r#" s="{}""#, cell.style_id));
            }
            if cell.value.is_empty() {
                xml.push_str("/>");
            } else {
                let index = lookup.get(&cell.value).copied().unwrap_or_default();
                xml.push_str(&format!(r#" t="s"><v>{index}</v></c>"#));
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData>");

    if !sheet.merges().is_empty() {
        xml.push_str(&format!(r#"<mergeCells count="{}">"#, sheet.merges().len()));
        for merge in sheet.merges() {
            xml.push_str(&format!(r#"<mergeCell ref="{merge}"/>"#));
        }
        xml.push_str("</mergeCells>");
    }

    if has_drawing {
        xml.push_str(r#"<drawing r:id="rId1"/>"#);
    }

    xml.push_str("</worksheet>");
    xml
}

/// One `twoCellAnchor` per photo, stretched to fill its cell range.
fn write_drawing_xml(sheet: &Sheet) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(concat!(
        r#"<xdr:wsDr xmlns:xdr="http://schemas.openxmlformats.org/drawingml/2006/spreadsheetDrawing""#,
        r#" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main""#,
        r#" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#
    ));

    for (photo_no, photo) in sheet.photos.iter().enumerate() {
        let id = photo_no + 1;
        let from = photo.range.start;
        let to = photo.range.end;
        xml.push_str(r#"<xdr:twoCellAnchor editAs="oneCell">"#);
        xml.push_str(&format!(
            "<xdr:from><xdr:col>{}</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>{}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:from>",
            from.col, from.row
        ));
        xml.push_str(&format!(
            "<xdr:to><xdr:col>{}</xdr:col><xdr:colOff>0</xdr:colOff><xdr:row>{}</xdr:row><xdr:rowOff>0</xdr:rowOff></xdr:to>",
            to.col + 1,
            to.row + 1
        ));
        xml.push_str("<xdr:pic>");
        xml.push_str(&format!(
            r#"<xdr:nvPicPr><xdr:cNvPr id="{id}" name="Photo {id}"/><xdr:cNvPicPr/></xdr:nvPicPr>"#
        ));
        xml.push_str(&format!(
            r#"<xdr:blipFill><a:blip r:embed="rId{id}"/><a:stretch><a:fillRect/></a:stretch></xdr:blipFill>"#
        ));
        xml.push_str(r#"<xdr:spPr><a:prstGeom prst="rect"><a:avLst/></a:prstGeom></xdr:spPr>"#);
        xml.push_str("</xdr:pic><xdr:clientData/></xdr:twoCellAnchor>");
    }

    xml.push_str("</xdr:wsDr>");
    xml
}

fn write_workbook_xml(workbook: &Workbook) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(concat!(
        r#"<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main""#,
        r#" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">"#
    ));

    xml.push_str("<sheets>");
    for (index, sheet) in workbook.sheets.iter().enumerate() {
        xml.push_str("<sheet");
        xml.push_str(&format!(r#" name="{}""#, escape_attr(&sheet.name)));
        xml.push_str(&format!(r#" sheetId="{}""#, index + 1));
        match sheet.visibility {
            SheetVisibility::Visible => {}
            SheetVisibility::Hidden => xml.push_str(r#" state="hidden""#),
            SheetVisibility::VeryHidden => xml.push_str(r#" state="veryHidden""#),
        }
        xml.push_str(&format!(r#" r:id="rId{}"/>"#, index + 1));
    }
    xml.push_str("</sheets>");

    let print_areas: Vec<(usize, &Sheet, Range)> = workbook
        .sheets
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.print_area.map(|area| (i, s, area)))
        .collect();
    if !print_areas.is_empty() {
        xml.push_str("<definedNames>");
        for (index, sheet, area) in print_areas {
            xml.push_str(&format!(
                r#"<definedName name="_xlnm.Print_Area" localSheetId="{index}">{}</definedName>"#,
                escape_text(&print_area_formula(&sheet.name, area))
            ));
        }
        xml.push_str("</definedNames>");
    }

    xml.push_str("</workbook>");
    xml
}

/// `'Sheet 1'!$B$2:$F$8` with the sheet name quoted only when necessary.
fn print_area_formula(sheet_name: &str, area: Range) -> String {
    let needs_quoting = sheet_name.is_empty()
        || sheet_name
            .chars()
            .any(|c| !c.is_alphanumeric() && c != '_')
        || sheet_name.starts_with(|c: char| c.is_ascii_digit());
    let name = if needs_quoting {
        format!("'{}'", sheet_name.replace('\'', "''"))
    } else {
        sheet_name.to_string()
    };
    format!(
        "{name}!${}${}:${}${}",
        column_label(area.start.col),
        area.start.row + 1,
        column_label(area.end.col),
        area.end.row + 1
    )
}

fn write_workbook_rels(workbook: &Workbook) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(
        r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for index in 0..workbook.sheets.len() {
        xml.push_str(&format!(
            r#"<Relationship Id="rId{id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{no}.xml"/>"#,
            id = index + 1,
            no = index + 1
        ));
    }
    let next = workbook.sheets.len() + 1;
    xml.push_str(&format!(
        r#"<Relationship Id="rId{next}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#
    ));
    xml.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>"#,
        next + 1
    ));
    xml.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme" Target="theme/theme1.xml"/>"#,
        next + 2
    ));
    xml.push_str("</Relationships>");
    xml
}

fn write_content_types(workbook: &Workbook) -> String {
    let mut xml = String::new();
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    xml.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);

    let formats: Vec<gridform_model::ImageFormat> = {
        let mut seen = Vec::new();
        for sheet in &workbook.sheets {
            for photo in &sheet.photos {
                if !seen.contains(&photo.format) {
                    seen.push(photo.format);
                }
            }
        }
        seen
    };
    for format in formats {
        xml.push_str(&format!(
            r#"<Default Extension="{}" ContentType="{}"/>"#,
            format.extension(),
            format.content_type()
        ));
    }

    xml.push_str(r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#);
    for (index, sheet) in workbook.sheets.iter().enumerate() {
        xml.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            index + 1
        ));
        if !sheet.photos.is_empty() {
            xml.push_str(&format!(
                r#"<Override PartName="/xl/drawings/drawing{}.xml" ContentType="application/vnd.openxmlformats-officedocument.drawing+xml"/>"#,
                index + 1
            ));
        }
    }
    xml.push_str(r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#);
    xml.push_str(r#"<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>"#);
    xml.push_str(r#"<Override PartName="/xl/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>"#);
    xml.push_str("</Types>");
    xml
}

fn needs_space_preserve(s: &str) -> bool {
    s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace)
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(s: &str) -> String {
    escape_text(s)
        .replace('\"', "&quot;")
        .replace('\'', "&apos;")
}
