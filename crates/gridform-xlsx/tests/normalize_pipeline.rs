use gridform_model::{Cell, CellRef, LayoutGroup, Range, Sheet, Workbook};
use gridform_xlsx::{crop_grid, normalize_workbook, read_workbook, write_workbook};

fn pipeline_workbook() -> Workbook {
    let mut wb = Workbook::new();

    // Reference sheet: 6 columns wide with explicit widths.
    let mut summary = Sheet::new("Summary");
    for col in 0..6u32 {
        summary.col_widths.insert(col, 10.0 + col as f64);
        summary.set_cell(CellRef::new(0, col), Cell::new(format!("H{col}"), 0));
    }
    summary.add_merge(Range::from_a1("A2:C2").unwrap()).unwrap();
    summary.set_cell(CellRef::from_a1("A2").unwrap(), Cell::new("merged", 0));
    wb.add_sheet(summary).unwrap();

    // Follower: 8 columns of content that must be squeezed to 6.
    let mut detail = Sheet::new("Detail");
    for col in 0..8u32 {
        detail.set_cell(CellRef::new(0, col), Cell::new(format!("D{col}"), 0));
    }
    wb.add_sheet(detail).unwrap();

    // Independent sheet with trailing empty rows and a print area.
    let mut notes = Sheet::new("Notes");
    notes.set_cell(CellRef::from_a1("B2").unwrap(), Cell::new("note", 0));
    notes.row_heights.insert(9, 15.0);
    notes.print_area = Some(Range::from_a1("B2:F8").unwrap());
    wb.add_sheet(notes).unwrap();

    wb
}

#[test]
fn grids_sync_within_the_layout_group() -> Result<(), Box<dyn std::error::Error>> {
    let wb = read_workbook(&write_workbook(&pipeline_workbook())?)?.workbook;
    let grids = normalize_workbook(&wb, &[LayoutGroup::new(vec![0, 1])]);

    assert_eq!(grids[0].col_count(), 6);
    assert_eq!(grids[1].col_count(), 6);
    assert_eq!(grids[1].col_widths_px, grids[0].col_widths_px);
    // 10 chars * 7.5 px rounds to 75.
    assert_eq!(grids[0].col_widths_px[0], 75);
    // Truncated follower rows keep their surviving cells.
    assert_eq!(grids[1].rows[0][5].value, "D5");
    for row in &grids[1].rows {
        assert_eq!(row.len(), 6);
    }

    // The merge flattens to spans on the anchor.
    let anchor = &grids[0].rows[1][0];
    assert_eq!(anchor.value, "merged");
    assert_eq!(anchor.col_span, 3);
    assert!(grids[0].rows[1][1].skip);
    assert!(grids[0].rows[1][2].skip);
    Ok(())
}

#[test]
fn print_area_crop_remembers_offsets() -> Result<(), Box<dyn std::error::Error>> {
    let wb = read_workbook(&write_workbook(&pipeline_workbook())?)?.workbook;
    let grids = normalize_workbook(&wb, &[]);

    let notes = &wb.sheets[2];
    let cropped = crop_grid(&grids[2], notes.print_area);

    // B2:F8 is 7 rows by 5 columns, clamped to the 10-row grid.
    assert_eq!(cropped.row_count(), 7);
    assert_eq!(cropped.col_count(), 1);
    assert_eq!(cropped.rows[0][0].value, "note");
    assert_eq!(cropped.crop.original_ref(0, 0), "B2");
    Ok(())
}

#[test]
fn normalizing_the_same_buffer_twice_is_identical() -> Result<(), Box<dyn std::error::Error>> {
    let bytes = write_workbook(&pipeline_workbook())?;
    let groups = [LayoutGroup::new(vec![0, 1])];

    let first = read_workbook(&bytes)?;
    let second = read_workbook(&bytes)?;
    assert_eq!(first.warnings, second.warnings);

    let grids_a = normalize_workbook(&first.workbook, &groups);
    let grids_b = normalize_workbook(&second.workbook, &groups);
    assert_eq!(grids_a, grids_b);
    // Byte-for-byte, not just structurally equal.
    assert_eq!(
        serde_json::to_vec(&grids_a)?,
        serde_json::to_vec(&grids_b)?
    );
    Ok(())
}

#[test]
fn sheet_without_print_area_trims_trailing_empties(
) -> Result<(), Box<dyn std::error::Error>> {
    let wb = read_workbook(&write_workbook(&pipeline_workbook())?)?.workbook;
    let grids = normalize_workbook(&wb, &[]);

    // Notes spans 10 rows because of the declared height on row 10, but only
    // B2 holds content.
    assert_eq!(grids[2].row_count(), 10);
    let trimmed = crop_grid(&grids[2], None);
    assert_eq!(trimmed.row_count(), 2);
    assert_eq!(trimmed.col_count(), 2);
    assert_eq!(trimmed.rows[1][1].value, "note");
    Ok(())
}
