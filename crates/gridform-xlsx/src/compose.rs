//! Workbook composition: one filled-in sheet per data record, cloned from a
//! category's master sheet.
//!
//! Masters stay in the output workbook as `VeryHidden` sheets so the result
//! can itself serve as a template again. A record whose category has no
//! master is skipped with a warning; nothing here is fatal except final
//! serialization.

use std::collections::{BTreeMap, HashMap};

use gridform_model::{
    Cell, CellRef, ImageFormat, LayoutGroup, PhotoAnchor, Range, SheetVisibility, Workbook,
};

use crate::layout_group::sync_sheet_group;
use crate::write::write_workbook;
use crate::{FormatError, Warning};

/// One data record to materialize as a sheet.
#[derive(Clone, Debug, Default)]
pub struct Record {
    /// Unique record identifier, used as the cloned sheet's name.
    pub id: String,
    pub category: String,
    /// Field name -> display value.
    pub values: BTreeMap<String, String>,
}

/// Where a category's fields and photos land on its master sheet.
#[derive(Clone, Debug, Default)]
pub struct CategoryLayout {
    pub category: String,
    /// Name of the master sheet to clone for this category.
    pub master_sheet: String,
    /// Field name -> target cell on the master.
    pub fields: BTreeMap<String, CellRef>,
    /// Photo slot name -> anchor range on the master.
    pub photo_slots: BTreeMap<String, Range>,
}

/// An image payload not yet anchored to a cell range.
#[derive(Clone, Debug)]
pub struct Photo {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

/// A composed workbook plus the diagnostics accumulated while building it.
#[derive(Clone, Debug, Default)]
pub struct ComposeOutput {
    pub bytes: Vec<u8>,
    pub warnings: Vec<Warning>,
}

/// Compose a new workbook from a template: one cloned, filled sheet per
/// record, with photos keyed by `(record id, slot name)`.
///
/// `groups` index into the composed sheet list (template sheets first, then
/// clones in record order); followers adopt the reference sheet's column
/// widths before serialization.
pub fn compose(
    template: &Workbook,
    records: &[Record],
    layouts: &[CategoryLayout],
    photos: &HashMap<(String, String), Photo>,
    groups: &[LayoutGroup],
) -> Result<ComposeOutput, FormatError> {
    let (workbook, warnings) = compose_workbook(template, records, layouts, photos, groups);
    let bytes = write_workbook(&workbook)?;
    Ok(ComposeOutput { bytes, warnings })
}

/// The in-memory half of [`compose`], separated so the sheet-level effects
/// can be inspected without going through serialization.
pub(crate) fn compose_workbook(
    template: &Workbook,
    records: &[Record],
    layouts: &[CategoryLayout],
    photos: &HashMap<(String, String), Photo>,
    groups: &[LayoutGroup],
) -> (Workbook, Vec<Warning>) {
    let mut out = template.clone();
    let mut warnings = Vec::new();

    let layout_by_category: HashMap<&str, &CategoryLayout> = layouts
        .iter()
        .map(|l| (l.category.as_str(), l))
        .collect();

    for record in records {
        let layout = layout_by_category.get(record.category.as_str()).copied();
        let master = layout.and_then(|l| template.sheet_by_name(&l.master_sheet));
        let (Some(layout), Some(master)) = (layout, master) else {
            Warning::MissingTemplate {
                record_id: record.id.clone(),
                category: record.category.clone(),
            }
            .emit(&mut warnings);
            continue;
        };

        let name = unique_sheet_name(&out, &record.id);
        let mut sheet = master.clone_skeleton(&name);

        // Merges are re-applied rather than copied so any conflict among the
        // master's own declarations surfaces here.
        for &merge in master.merges() {
            if sheet.add_merge(merge).is_err() {
                Warning::MergeConflict {
                    sheet: name.clone(),
                    range: merge,
                }
                .emit(&mut warnings);
            }
        }
        sheet.print_area = master.print_area;

        for (field, value) in &record.values {
            let Some(&cell_ref) = layout.fields.get(field) else {
                continue;
            };
            // The master's style at the target cell is kept; only the value
            // changes.
            let style_id = sheet.cell(cell_ref).map(|c| c.style_id).unwrap_or(0);
            sheet.set_cell(cell_ref, Cell::new(value.clone(), style_id));
        }

        for (slot, &range) in &layout.photo_slots {
            if let Some(photo) = photos.get(&(record.id.clone(), slot.clone())) {
                sheet.photos.push(PhotoAnchor {
                    range,
                    bytes: photo.bytes.clone(),
                    format: photo.format,
                });
            }
        }

        // Names are made unique above, so this cannot collide.
        let _ = out.add_sheet(sheet);
    }

    // Spent masters are parked, not deleted.
    for layout in layouts {
        if let Some(master) = out.sheet_by_name_mut(&layout.master_sheet) {
            master.visibility = SheetVisibility::VeryHidden;
        }
    }

    for group in groups {
        sync_sheet_group(&mut out.sheets, group);
    }

    (out, warnings)
}

fn unique_sheet_name(workbook: &Workbook, base: &str) -> String {
    if !workbook.contains_sheet(base) {
        return base.to_string();
    }
    let mut n = 2u32;
    loop {
        let candidate = format!("{base} ({n})");
        if !workbook.contains_sheet(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridform_model::Sheet;
    use pretty_assertions::assert_eq;

    fn template() -> Workbook {
        let mut wb = Workbook::new();

        let mut master = Sheet::new("Tpl Item");
        master.visibility = SheetVisibility::Hidden;
        master.set_cell(CellRef::from_a1("B2").unwrap(), Cell::new("Name:", 0));
        master.set_cell(CellRef::from_a1("C2").unwrap(), Cell::new("", 3));
        master.add_merge(Range::from_a1("B1:D1").unwrap()).unwrap();
        master.print_area = Some(Range::from_a1("A1:E10").unwrap());
        master.col_widths.insert(1, 18.0);
        wb.add_sheet(master).unwrap();
        wb.add_sheet(Sheet::new("Cover")).unwrap();
        wb
    }

    fn item_layout() -> CategoryLayout {
        CategoryLayout {
            category: "item".to_string(),
            master_sheet: "Tpl Item".to_string(),
            fields: BTreeMap::from([("name".to_string(), CellRef::from_a1("C2").unwrap())]),
            photo_slots: BTreeMap::from([(
                "front".to_string(),
                Range::from_a1("B4:D8").unwrap(),
            )]),
        }
    }

    fn record(id: &str) -> Record {
        Record {
            id: id.to_string(),
            category: "item".to_string(),
            values: BTreeMap::from([("name".to_string(), "Widget".to_string())]),
        }
    }

    #[test]
    fn clones_one_sheet_per_record_and_hides_the_master() {
        let photos = HashMap::new();
        let (out, warnings) = compose_workbook(
            &template(),
            &[record("R-001"), record("R-002")],
            &[item_layout()],
            &photos,
            &[],
        );

        assert!(warnings.is_empty());
        assert_eq!(out.sheets.len(), 4);
        assert_eq!(
            out.sheet_by_name("Tpl Item").unwrap().visibility,
            SheetVisibility::VeryHidden
        );

        let clone = out.sheet_by_name("R-001").unwrap();
        assert_eq!(clone.visibility, SheetVisibility::Visible);
        assert_eq!(
            clone.cell(CellRef::from_a1("C2").unwrap()).unwrap().value,
            "Widget"
        );
        // The master's style at the target cell is preserved.
        assert_eq!(
            clone.cell(CellRef::from_a1("C2").unwrap()).unwrap().style_id,
            3
        );
        assert_eq!(clone.merges(), &[Range::from_a1("B1:D1").unwrap()]);
        assert_eq!(clone.print_area, Some(Range::from_a1("A1:E10").unwrap()));
        assert_eq!(clone.col_widths.get(&1), Some(&18.0));
    }

    #[test]
    fn missing_master_skips_the_record_with_a_warning() {
        let mut stray = record("R-404");
        stray.category = "unknown".to_string();
        let photos = HashMap::new();

        let (out, warnings) = compose_workbook(
            &template(),
            &[stray, record("R-001")],
            &[item_layout()],
            &photos,
            &[],
        );

        assert_eq!(out.sheets.len(), 3);
        assert!(out.sheet_by_name("R-001").is_some());
        assert_eq!(
            warnings,
            vec![Warning::MissingTemplate {
                record_id: "R-404".to_string(),
                category: "unknown".to_string(),
            }]
        );
    }

    #[test]
    fn colliding_record_ids_get_numeric_suffixes() {
        let photos = HashMap::new();
        let (out, _) = compose_workbook(
            &template(),
            &[record("Dup"), record("Dup"), record("Dup")],
            &[item_layout()],
            &photos,
            &[],
        );
        assert!(out.sheet_by_name("Dup").is_some());
        assert!(out.sheet_by_name("Dup (2)").is_some());
        assert!(out.sheet_by_name("Dup (3)").is_some());
    }

    #[test]
    fn photos_attach_only_to_their_record_and_slot() {
        let photos = HashMap::from([(
            ("R-001".to_string(), "front".to_string()),
            Photo {
                bytes: vec![1, 2, 3],
                format: ImageFormat::Png,
            },
        )]);

        let (out, _) = compose_workbook(
            &template(),
            &[record("R-001"), record("R-002")],
            &[item_layout()],
            &photos,
            &[],
        );

        let with = out.sheet_by_name("R-001").unwrap();
        assert_eq!(with.photos.len(), 1);
        assert_eq!(with.photos[0].range, Range::from_a1("B4:D8").unwrap());
        assert_eq!(with.photos[0].format, ImageFormat::Png);
        assert!(out.sheet_by_name("R-002").unwrap().photos.is_empty());
    }

    #[test]
    fn fields_without_a_layout_target_are_ignored() {
        let mut rec = record("R-001");
        rec.values
            .insert("nonexistent".to_string(), "x".to_string());
        let photos = HashMap::new();

        let (out, warnings) =
            compose_workbook(&template(), &[rec], &[item_layout()], &photos, &[]);
        assert!(warnings.is_empty());
        let clone = out.sheet_by_name("R-001").unwrap();
        assert_eq!(clone.iter_cells().count(), 2);
    }

    #[test]
    fn layout_groups_sync_clone_columns_before_serialization() {
        let mut template = template();
        template
            .sheet_by_name_mut("Cover")
            .unwrap()
            .col_widths
            .insert(0, 30.0);

        let photos = HashMap::new();
        // Composed order: Tpl Item (0), Cover (1), R-001 (2), R-002 (3).
        let group = LayoutGroup::new(vec![1, 2, 3]);
        let (out, _) = compose_workbook(
            &template,
            &[record("R-001"), record("R-002")],
            &[item_layout()],
            &photos,
            &[group],
        );

        let cover_widths = out.sheet_by_name("Cover").unwrap().col_widths.clone();
        assert_eq!(cover_widths.get(&0), Some(&30.0));
        assert_eq!(out.sheet_by_name("R-001").unwrap().col_widths, cover_widths);
        assert_eq!(out.sheet_by_name("R-002").unwrap().col_widths, cover_widths);
        // The ungrouped master keeps its own geometry.
        assert_eq!(
            out.sheet_by_name("Tpl Item").unwrap().col_widths.get(&1),
            Some(&18.0)
        );
    }
}
