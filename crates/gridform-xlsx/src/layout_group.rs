//! Layout groups: sheets that must render with identical column geometry.
//!
//! The first sheet of a group is the reference; every follower adopts its
//! column widths. Row geometry and row order are never touched.

use gridform_model::{GridCell, LayoutGroup, NormalizedGrid, Sheet};

/// Synchronize normalized grids within one layout group.
///
/// Followers take the reference grid's pixel column widths verbatim. Each
/// follower row is truncated or padded with default cells so every row has
/// exactly the reference column count.
pub fn sync_grid_group(grids: &mut [NormalizedGrid], group: &LayoutGroup) {
    let Some(reference) = group.reference() else {
        return;
    };
    let Some(ref_grid) = grids.get(reference) else {
        return;
    };
    let widths = ref_grid.col_widths_px.clone();
    let n_cols = widths.len();

    for &follower in group.followers() {
        let Some(grid) = grids.get_mut(follower) else {
            continue;
        };
        grid.col_widths_px = widths.clone();
        for row in &mut grid.rows {
            row.resize(n_cols, GridCell::default());
            // A span crossing the new right edge is clamped to it.
            for (c, cell) in row.iter_mut().enumerate() {
                cell.col_span = cell.col_span.min((n_cols - c) as u32).max(1);
            }
        }
    }
}

/// Synchronize model sheets within one layout group, for use before a
/// workbook is serialized. Followers adopt the reference sheet's declared
/// column widths; their cells and rows are left alone.
pub fn sync_sheet_group(sheets: &mut [Sheet], group: &LayoutGroup) {
    let Some(reference) = group.reference() else {
        return;
    };
    let Some(ref_sheet) = sheets.get(reference) else {
        return;
    };
    let widths = ref_sheet.col_widths.clone();

    for &follower in group.followers() {
        if follower == reference {
            continue;
        }
        if let Some(sheet) = sheets.get_mut(follower) {
            sheet.col_widths = widths.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridform_model::CropOffsets;
    use pretty_assertions::assert_eq;

    fn grid(n_rows: usize, n_cols: usize, width: u32) -> NormalizedGrid {
        NormalizedGrid {
            sheet_name: format!("G{n_cols}"),
            rows: vec![vec![GridCell::default(); n_cols]; n_rows],
            col_widths_px: vec![width; n_cols],
            row_heights_px: vec![20; n_rows],
            crop: CropOffsets::default(),
        }
    }

    #[test]
    fn followers_adopt_reference_widths_and_column_count() {
        let mut grids = vec![grid(2, 6, 90), grid(3, 8, 40), grid(1, 4, 55)];
        let group = LayoutGroup::new(vec![0, 1, 2]);

        sync_grid_group(&mut grids, &group);

        assert_eq!(grids[0].col_widths_px, vec![90; 6]);
        // The 8-column follower is truncated, the 4-column one padded.
        assert_eq!(grids[1].col_widths_px, vec![90; 6]);
        for row in &grids[1].rows {
            assert_eq!(row.len(), 6);
        }
        assert_eq!(grids[2].col_widths_px, vec![90; 6]);
        for row in &grids[2].rows {
            assert_eq!(row.len(), 6);
        }
        // Row counts never change.
        assert_eq!(grids[1].row_count(), 3);
        assert_eq!(grids[2].row_count(), 1);
    }

    #[test]
    fn truncation_clamps_spans_at_the_new_edge() {
        let mut grids = vec![grid(1, 3, 50), grid(1, 8, 40)];
        grids[1].rows[0][2].col_span = 5;
        let group = LayoutGroup::new(vec![0, 1]);

        sync_grid_group(&mut grids, &group);
        assert_eq!(grids[1].rows[0][2].col_span, 1);
    }

    #[test]
    fn missing_indices_are_ignored() {
        let mut grids = vec![grid(1, 2, 50)];
        sync_grid_group(&mut grids, &LayoutGroup::new(vec![0, 7]));
        sync_grid_group(&mut grids, &LayoutGroup::new(vec![9, 0]));
        sync_grid_group(&mut grids, &LayoutGroup::new(Vec::new()));
        assert_eq!(grids[0].col_widths_px, vec![50, 50]);
    }

    #[test]
    fn sheet_sync_copies_declared_widths() {
        let mut reference = Sheet::new("Ref");
        reference.col_widths.insert(0, 20.0);
        reference.col_widths.insert(3, 12.5);
        let mut follower = Sheet::new("Follow");
        follower.col_widths.insert(0, 99.0);

        let mut sheets = vec![reference, follower];
        sync_sheet_group(&mut sheets, &LayoutGroup::new(vec![0, 1]));

        assert_eq!(sheets[1].col_widths.get(&0), Some(&20.0));
        assert_eq!(sheets[1].col_widths.get(&3), Some(&12.5));
        assert_eq!(sheets[1].col_widths.len(), 2);
    }
}
