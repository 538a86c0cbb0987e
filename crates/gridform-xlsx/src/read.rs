//! Workbook reading: container → [`gridform_model::Workbook`].
//!
//! The workbook-level parts (`workbook.xml`, rels) are small and parsed as
//! documents; worksheet parts can be large and are parsed as a streaming
//! event loop. Styles are resolved while reading, so the produced model
//! carries only flat [`gridform_model::Style`] records.

use std::collections::HashMap;
use std::io::Cursor;

use gridform_model::{Cell, CellRef, Range, Sheet, SheetVisibility, Workbook};
use quick_xml::events::Event;
use quick_xml::Reader;
use roxmltree::Document;
use zip::ZipArchive;

use crate::number_format::{
    format_date_serial, format_number_grouped, format_number_plain, NumFmtKind,
};
use crate::print_area::parse_print_area;
use crate::shared_strings::parse_shared_strings_xml;
use crate::styles::StylesPart;
use crate::theme::parse_theme_palette;
use crate::zip_util::{read_zip_part_optional, read_zip_part_required};
use crate::{FormatError, Warning};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const THEME_PART: &str = "xl/theme/theme1.xml";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const STYLES_PART: &str = "xl/styles.xml";

/// A fully read workbook plus the diagnostics accumulated along the way.
#[derive(Clone, Debug, Default)]
pub struct ReadOutput {
    pub workbook: Workbook,
    pub warnings: Vec<Warning>,
}

/// Read one complete workbook from an in-memory buffer.
///
/// Only a corrupt/unreadable container fails; individually undecodable
/// cells, styles, or print areas degrade into [`Warning`]s.
pub fn read_workbook(bytes: &[u8]) -> Result<ReadOutput, FormatError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let workbook_xml = read_zip_part_required(&mut archive, WORKBOOK_PART)?;
    let rels_xml = read_zip_part_optional(&mut archive, WORKBOOK_RELS_PART)?;
    let rel_targets = match rels_xml {
        Some(xml) => parse_relationships(&xml)?,
        None => HashMap::new(),
    };

    let meta = parse_workbook_metadata(&workbook_xml)?;

    let mut workbook = Workbook::new();
    if let Some(theme_xml) = read_zip_part_optional(&mut archive, THEME_PART)? {
        // Best-effort: a broken theme part falls back to the stock palette.
        if let Ok(palette) = parse_theme_palette(&theme_xml) {
            workbook.theme = palette;
        }
    }

    let shared_strings = match read_zip_part_optional(&mut archive, SHARED_STRINGS_PART)? {
        Some(xml) => parse_shared_strings_xml(std::str::from_utf8(&xml)?)?,
        None => Vec::new(),
    };

    let styles_part = match read_zip_part_optional(&mut archive, STYLES_PART)? {
        Some(xml) => StylesPart::parse(&xml)?,
        None => StylesPart::default(),
    };

    let mut warnings = Vec::new();
    // xf index -> style_id, resolved lazily per distinct index.
    let mut style_ids: HashMap<u32, Option<u32>> = HashMap::new();

    for (sheet_index, entry) in meta.sheets.iter().enumerate() {
        let part_name = rel_targets
            .get(&entry.rel_id)
            .map(|target| resolve_workbook_target(target))
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", sheet_index + 1));

        let sheet_xml = read_zip_part_optional(&mut archive, &part_name)?
            .ok_or(FormatError::MissingPart("worksheet part"))?;

        let mut sheet = Sheet::new(entry.name.clone());
        sheet.visibility = entry.visibility;

        let palette = workbook.theme;
        parse_worksheet(
            &sheet_xml,
            &mut sheet,
            &shared_strings,
            &styles_part,
            &palette,
            &mut workbook.styles,
            &mut style_ids,
            &mut warnings,
        )?;

        if let Some(raw) = meta.print_areas.get(&(sheet_index as u32)) {
            match parse_print_area(raw) {
                Ok(range) => sheet.print_area = Some(range),
                Err(_) => Warning::PrintAreaParse {
                    sheet: entry.name.clone(),
                    raw: raw.clone(),
                }
                .emit(&mut warnings),
            }
        }

        workbook
            .add_sheet(sheet)
            .map_err(|e| FormatError::Invalid(e.to_string()))?;
    }

    Ok(ReadOutput { workbook, warnings })
}

struct SheetEntry {
    name: String,
    rel_id: String,
    visibility: SheetVisibility,
}

struct WorkbookMetadata {
    sheets: Vec<SheetEntry>,
    /// sheet index -> raw `_xlnm.Print_Area` formula.
    print_areas: HashMap<u32, String>,
}

fn parse_workbook_metadata(xml: &[u8]) -> Result<WorkbookMetadata, FormatError> {
    let text = std::str::from_utf8(xml)?;
    let doc = Document::parse(text)?;

    let mut sheets = Vec::new();
    for sheet in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "sheet")
    {
        let Some(name) = sheet.attribute("name") else {
            continue;
        };
        let rel_id = sheet
            .attribute(("http://schemas.openxmlformats.org/officeDocument/2006/relationships", "id"))
            .or_else(|| sheet.attribute("id"))
            .unwrap_or_default();
        let visibility = match sheet.attribute("state") {
            Some("hidden") => SheetVisibility::Hidden,
            Some("veryHidden") => SheetVisibility::VeryHidden,
            _ => SheetVisibility::Visible,
        };
        sheets.push(SheetEntry {
            name: name.to_string(),
            rel_id: rel_id.to_string(),
            visibility,
        });
    }

    if sheets.is_empty() {
        return Err(FormatError::Invalid(
            "workbook.xml declares no sheets".to_string(),
        ));
    }

    let mut print_areas = HashMap::new();
    for defined in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "definedName")
    {
        if defined.attribute("name") != Some("_xlnm.Print_Area") {
            continue;
        }
        let Some(local_sheet) = defined
            .attribute("localSheetId")
            .and_then(|v| v.parse::<u32>().ok())
        else {
            continue;
        };
        if let Some(formula) = defined.text() {
            print_areas.insert(local_sheet, formula.trim().to_string());
        }
    }

    Ok(WorkbookMetadata {
        sheets,
        print_areas,
    })
}

/// rId -> target from the workbook rels part.
fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>, FormatError> {
    let text = std::str::from_utf8(xml)?;
    let doc = Document::parse(text)?;

    let mut targets = HashMap::new();
    for rel in doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "Relationship")
    {
        // External targets can't be worksheet parts.
        if rel
            .attribute("TargetMode")
            .is_some_and(|m| m.eq_ignore_ascii_case("External"))
        {
            continue;
        }
        if let (Some(id), Some(target)) = (rel.attribute("Id"), rel.attribute("Target")) {
            targets.insert(id.to_string(), target.to_string());
        }
    }
    Ok(targets)
}

/// Resolve a workbook-rels target (relative to `xl/`) to a part name.
fn resolve_workbook_target(target: &str) -> String {
    let target = target.trim();
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    if let Some(rest) = target.strip_prefix("../") {
        return rest.to_string();
    }
    format!("xl/{target}")
}

/// State for the cell currently being parsed in the worksheet event loop.
#[derive(Default)]
struct PendingCell {
    cell_ref: Option<CellRef>,
    t: Option<String>,
    xf_index: u32,
    value_text: Option<String>,
    inline_text: Option<String>,
    has_formula: bool,
}

#[allow(clippy::too_many_arguments)]
fn parse_worksheet(
    xml: &[u8],
    sheet: &mut Sheet,
    shared_strings: &[String],
    styles_part: &StylesPart,
    palette: &gridform_model::ThemePalette,
    style_table: &mut gridform_model::StyleTable,
    style_ids: &mut HashMap<u32, Option<u32>>,
    warnings: &mut Vec<Warning>,
) -> Result<(), FormatError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    let mut buf = Vec::new();

    let mut in_sheet_data = false;
    let mut in_cols = false;
    let mut in_v = false;
    let mut in_f = false;
    let mut in_is_t = false;
    let mut pending: Option<PendingCell> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"cols" => in_cols = true,
            Event::End(e) if e.local_name().as_ref() == b"cols" => in_cols = false,

            Event::Start(e) | Event::Empty(e) if in_cols && e.local_name().as_ref() == b"col" => {
                let mut min: Option<u32> = None;
                let mut max: Option<u32> = None;
                let mut width: Option<f64> = None;
                for attr in e.attributes() {
                    let attr = attr?;
                    let value = attr.unescape_value()?;
                    match attr.key.as_ref() {
                        b"min" => min = value.parse().ok(),
                        b"max" => max = value.parse().ok(),
                        b"width" => width = value.parse().ok(),
                        _ => {}
                    }
                }
                if let (Some(min), Some(width)) = (min, width) {
                    let max = max.unwrap_or(min).min(gridform_model::MAX_COLS);
                    if min >= 1 {
                        for col_1_based in min..=max {
                            sheet.col_widths.insert(col_1_based - 1, width);
                        }
                    }
                }
            }

            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => in_sheet_data = true,
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => in_sheet_data = false,

            Event::Start(e) | Event::Empty(e)
                if in_sheet_data && e.local_name().as_ref() == b"row" =>
            {
                let mut row_1_based: Option<u32> = None;
                let mut height: Option<f64> = None;
                for attr in e.attributes() {
                    let attr = attr?;
                    let value = attr.unescape_value()?;
                    match attr.key.as_ref() {
                        b"r" => row_1_based = value.parse().ok(),
                        b"ht" => height = value.parse().ok(),
                        _ => {}
                    }
                }
                if let (Some(row), Some(height)) = (row_1_based, height) {
                    if row >= 1 {
                        sheet.row_heights.insert(row - 1, height);
                    }
                }
            }

            Event::Start(e) if in_sheet_data && e.local_name().as_ref() == b"c" => {
                pending = Some(parse_cell_open(&e, sheet, warnings)?);
            }
            Event::Empty(e) if in_sheet_data && e.local_name().as_ref() == b"c" => {
                let cell = parse_cell_open(&e, sheet, warnings)?;
                finish_cell(
                    cell,
                    sheet,
                    shared_strings,
                    styles_part,
                    palette,
                    style_table,
                    style_ids,
                    warnings,
                );
            }
            Event::End(e) if in_sheet_data && e.local_name().as_ref() == b"c" => {
                if let Some(cell) = pending.take() {
                    finish_cell(
                        cell,
                        sheet,
                        shared_strings,
                        styles_part,
                        palette,
                        style_table,
                        style_ids,
                        warnings,
                    );
                }
                in_v = false;
                in_f = false;
                in_is_t = false;
            }

            Event::Start(e) if pending.is_some() && e.local_name().as_ref() == b"v" => in_v = true,
            Event::End(e) if e.local_name().as_ref() == b"v" => in_v = false,
            Event::Start(e) if pending.is_some() && e.local_name().as_ref() == b"f" => {
                in_f = true;
                if let Some(cell) = pending.as_mut() {
                    cell.has_formula = true;
                }
            }
            Event::Empty(e) if pending.is_some() && e.local_name().as_ref() == b"f" => {
                if let Some(cell) = pending.as_mut() {
                    cell.has_formula = true;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"f" => in_f = false,
            Event::Start(e) if pending.is_some() && e.local_name().as_ref() == b"t" => {
                in_is_t = true;
            }
            Event::End(e) if e.local_name().as_ref() == b"t" => in_is_t = false,

            Event::Text(t) => {
                if let Some(cell) = pending.as_mut() {
                    if in_v {
                        cell.value_text
                            .get_or_insert_with(String::new)
                            .push_str(&t.unescape()?);
                    } else if in_is_t {
                        cell.inline_text
                            .get_or_insert_with(String::new)
                            .push_str(&t.unescape()?);
                    } else if in_f {
                        // Formula source is not carried; only the cached result.
                    }
                }
            }

            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"mergeCell" => {
                for attr in e.attributes() {
                    let attr = attr?;
                    if attr.key.as_ref() == b"ref" {
                        let raw = attr.unescape_value()?;
                        match Range::from_a1(&raw) {
                            Ok(range) => {
                                // Invariant: one merge per cell. Later overlapping
                                // declarations lose.
                                if sheet.add_merge(range).is_err() {
                                    Warning::MergeConflict {
                                        sheet: sheet.name.clone(),
                                        range,
                                    }
                                    .emit(warnings);
                                }
                            }
                            Err(_) => Warning::CellDecode {
                                sheet: sheet.name.clone(),
                                cell: raw.to_string(),
                                reason: "invalid merge reference".to_string(),
                            }
                            .emit(warnings),
                        }
                    }
                }
            }

            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    // Covered merge cells are never independently addressable. The merge
    // list arrives after sheetData, so only now can the anchors be told
    // apart from the cells they cover.
    let mut covered = Vec::new();
    for merge in sheet.merges() {
        for cell_ref in merge.cells() {
            if cell_ref != merge.start && sheet.cell(cell_ref).is_some() {
                covered.push(cell_ref);
            }
        }
    }
    for cell_ref in covered {
        sheet.set_cell(cell_ref, Cell::default());
    }

    Ok(())
}

fn parse_cell_open(
    e: &quick_xml::events::BytesStart<'_>,
    sheet: &Sheet,
    warnings: &mut Vec<Warning>,
) -> Result<PendingCell, FormatError> {
    let mut cell = PendingCell::default();
    for attr in e.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        match attr.key.as_ref() {
            b"r" => match CellRef::from_a1(&value) {
                Ok(cell_ref) => cell.cell_ref = Some(cell_ref),
                Err(err) => Warning::CellDecode {
                    sheet: sheet.name.clone(),
                    cell: value.to_string(),
                    reason: format!("invalid cell reference: {err}"),
                }
                .emit(warnings),
            },
            b"t" => cell.t = Some(value.into_owned()),
            b"s" => cell.xf_index = value.parse().unwrap_or(0),
            _ => {}
        }
    }
    Ok(cell)
}

#[allow(clippy::too_many_arguments)]
fn finish_cell(
    cell: PendingCell,
    sheet: &mut Sheet,
    shared_strings: &[String],
    styles_part: &StylesPart,
    palette: &gridform_model::ThemePalette,
    style_table: &mut gridform_model::StyleTable,
    style_ids: &mut HashMap<u32, Option<u32>>,
    warnings: &mut Vec<Warning>,
) {
    let Some(cell_ref) = cell.cell_ref else {
        return;
    };

    let style_id = resolve_style_id(
        cell.xf_index,
        cell_ref,
        sheet,
        styles_part,
        palette,
        style_table,
        style_ids,
        warnings,
    );

    let value = decode_cell_value(&cell, cell_ref, sheet, shared_strings, styles_part, warnings);

    sheet.set_cell(cell_ref, Cell { value, style_id });
}

/// Resolve (and cache) the style id for an xf index. An unresolvable style
/// decodes as the default style with a warning, once per distinct index.
#[allow(clippy::too_many_arguments)]
fn resolve_style_id(
    xf_index: u32,
    cell_ref: CellRef,
    sheet: &Sheet,
    styles_part: &StylesPart,
    palette: &gridform_model::ThemePalette,
    style_table: &mut gridform_model::StyleTable,
    style_ids: &mut HashMap<u32, Option<u32>>,
    warnings: &mut Vec<Warning>,
) -> u32 {
    if xf_index == 0 && styles_part.cell_xfs_count() == 0 {
        return 0;
    }

    if let Some(cached) = style_ids.get(&xf_index) {
        return cached.unwrap_or(0);
    }

    match styles_part.resolve(xf_index, palette) {
        Ok(style) => {
            let id = style_table.intern(style);
            style_ids.insert(xf_index, Some(id));
            id
        }
        Err(reason) => {
            Warning::CellDecode {
                sheet: sheet.name.clone(),
                cell: cell_ref.to_a1(),
                reason,
            }
            .emit(warnings);
            style_ids.insert(xf_index, None);
            0
        }
    }
}

fn decode_cell_value(
    cell: &PendingCell,
    cell_ref: CellRef,
    sheet: &Sheet,
    shared_strings: &[String],
    styles_part: &StylesPart,
    warnings: &mut Vec<Warning>,
) -> String {
    match cell.t.as_deref() {
        Some("s") => {
            let raw = cell.value_text.as_deref().unwrap_or_default();
            let Ok(idx) = raw.parse::<usize>() else {
                Warning::CellDecode {
                    sheet: sheet.name.clone(),
                    cell: cell_ref.to_a1(),
                    reason: format!("invalid shared string index {raw:?}"),
                }
                .emit(warnings);
                return String::new();
            };
            match shared_strings.get(idx) {
                Some(text) => text.clone(),
                None => {
                    Warning::CellDecode {
                        sheet: sheet.name.clone(),
                        cell: cell_ref.to_a1(),
                        reason: format!("shared string index {idx} out of range"),
                    }
                    .emit(warnings);
                    String::new()
                }
            }
        }
        Some("str") => cell.value_text.clone().unwrap_or_default(),
        Some("inlineStr") => cell.inline_text.clone().unwrap_or_default(),
        Some("b") => match cell.value_text.as_deref() {
            Some("1") => "TRUE".to_string(),
            _ => "FALSE".to_string(),
        },
        // Error cells render empty.
        Some("e") => String::new(),
        Some("n") | None => {
            let Some(raw) = cell.value_text.as_deref() else {
                return String::new();
            };
            let Ok(n) = raw.parse::<f64>() else {
                // Invalid SpreadsheetML; keep the payload as text.
                return raw.to_string();
            };
            match styles_part.num_fmt_kind(cell.xf_index) {
                NumFmtKind::Date { with_time } => format_date_serial(n, with_time)
                    .unwrap_or_else(|| format_number_plain(n)),
                NumFmtKind::Grouped => format_number_grouped(n),
                NumFmtKind::General => format_number_plain(n),
            }
        }
        // Uncommon t= values (e.g. "d" ISO dates) pass the payload through.
        Some(_) => cell
            .value_text
            .clone()
            .or_else(|| cell.inline_text.clone())
            .unwrap_or_default(),
    }
}
