//! Grid normalization: a sparse [`Sheet`] becomes a rectangular
//! [`NormalizedGrid`] a renderer can walk row by row.
//!
//! Merges are flattened into span metadata on the anchor cell; covered cells
//! become skip markers. Column widths (character units) and row heights
//! (points) are converted to pixels here and nowhere else.

use gridform_model::{GridCell, LayoutGroup, NormalizedGrid, Sheet, Workbook};

use crate::layout_group::sync_grid_group;

/// Width of one character unit, in pixels.
const PX_PER_CHAR: f64 = 7.5;
/// Height of one point, in pixels.
const PX_PER_POINT: f64 = 1.333;

/// Column width applied when a sheet declares none, in character units.
const DEFAULT_COL_WIDTH_CHARS: f64 = 8.5;
/// Row height applied when a sheet declares none, in points.
const DEFAULT_ROW_HEIGHT_POINTS: f64 = 15.0;

/// Convert a declared column width to pixels.
pub fn col_width_px(chars: f64) -> u32 {
    (chars * PX_PER_CHAR).round().max(0.0) as u32
}

/// Convert a declared row height to pixels.
pub fn row_height_px(points: f64) -> u32 {
    (points * PX_PER_POINT).round().max(0.0) as u32
}

/// Normalize one sheet into a rectangular grid covering its used range.
///
/// A sheet with no content at all yields an empty grid. Every row of the
/// result has exactly `col_count()` cells.
pub fn normalize_sheet(sheet: &Sheet) -> NormalizedGrid {
    let Some(used) = sheet.used_range() else {
        return NormalizedGrid {
            sheet_name: sheet.name.clone(),
            ..NormalizedGrid::default()
        };
    };

    let n_rows = used.height() as usize;
    let n_cols = used.width() as usize;

    let mut rows = vec![vec![GridCell::default(); n_cols]; n_rows];

    for (cell_ref, cell) in sheet.iter_cells() {
        let (r, c) = (cell_ref.row as usize, cell_ref.col as usize);
        if r < n_rows && c < n_cols {
            rows[r][c].value = cell.value.clone();
            rows[r][c].style_id = cell.style_id;
        }
    }

    // Merge topology: the anchor spans the whole range, covered cells are
    // skip markers and carry nothing.
    for merge in sheet.merges() {
        let anchor = merge.start;
        if anchor.row as usize >= n_rows || anchor.col as usize >= n_cols {
            continue;
        }
        for cell_ref in merge.cells() {
            let (r, c) = (cell_ref.row as usize, cell_ref.col as usize);
            if r >= n_rows || c >= n_cols {
                continue;
            }
            if cell_ref == anchor {
                rows[r][c].row_span = merge.height();
                rows[r][c].col_span = merge.width();
            } else {
                rows[r][c] = GridCell::skipped();
            }
        }
    }

    let col_widths_px = (0..used.width())
        .map(|col| {
            let chars = sheet
                .col_widths
                .get(&col)
                .copied()
                .unwrap_or(DEFAULT_COL_WIDTH_CHARS);
            col_width_px(chars)
        })
        .collect();

    let row_heights_px = (0..used.height())
        .map(|row| {
            let points = sheet
                .row_heights
                .get(&row)
                .copied()
                .unwrap_or(DEFAULT_ROW_HEIGHT_POINTS);
            row_height_px(points)
        })
        .collect();

    NormalizedGrid {
        sheet_name: sheet.name.clone(),
        rows,
        col_widths_px,
        row_heights_px,
        crop: Default::default(),
    }
}

/// Normalize every sheet of a workbook, then synchronize column geometry
/// within each layout group (first sheet of a group is the reference).
pub fn normalize_workbook(workbook: &Workbook, groups: &[LayoutGroup]) -> Vec<NormalizedGrid> {
    let mut grids: Vec<NormalizedGrid> = workbook
        .sheets
        .iter()
        .map(normalize_sheet)
        .collect();

    for group in groups {
        sync_grid_group(&mut grids, group);
    }

    grids
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridform_model::{Cell, CellRef, Range};
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_sheet_normalizes_to_empty_grid() {
        let sheet = Sheet::new("Empty");
        let grid = normalize_sheet(&sheet);
        assert_eq!(grid.sheet_name, "Empty");
        assert_eq!(grid.row_count(), 0);
        assert_eq!(grid.col_count(), 0);
    }

    #[test]
    fn grid_is_rectangular_over_used_range() {
        let mut sheet = Sheet::new("S");
        sheet.set_cell(CellRef::new(0, 0), Cell::new("a", 0));
        sheet.set_cell(CellRef::new(2, 3), Cell::new("b", 0));

        let grid = normalize_sheet(&sheet);
        assert_eq!(grid.row_count(), 3);
        assert_eq!(grid.col_count(), 4);
        for row in &grid.rows {
            assert_eq!(row.len(), 4);
        }
        assert_eq!(grid.rows[0][0].value, "a");
        assert_eq!(grid.rows[2][3].value, "b");
        assert_eq!(grid.rows[1][1], GridCell::default());
    }

    #[test]
    fn merges_become_spans_and_skips() {
        let mut sheet = Sheet::new("S");
        sheet.set_cell(CellRef::new(0, 0), Cell::new("title", 2));
        sheet.set_cell(CellRef::new(2, 2), Cell::new("tail", 0));
        sheet.add_merge(Range::from_a1("A1:C2").unwrap()).unwrap();

        let grid = normalize_sheet(&sheet);
        let anchor = &grid.rows[0][0];
        assert_eq!(anchor.value, "title");
        assert_eq!(anchor.style_id, 2);
        assert_eq!(anchor.row_span, 2);
        assert_eq!(anchor.col_span, 3);
        assert!(!anchor.skip);

        // Every non-anchor cell of the range is a skip marker.
        let mut skipped = 0;
        for r in 0..2 {
            for c in 0..3 {
                if (r, c) == (0, 0) {
                    continue;
                }
                assert!(grid.rows[r][c].skip, "({r},{c}) should be skipped");
                assert_eq!(grid.rows[r][c].value, "");
                skipped += 1;
            }
        }
        assert_eq!(skipped, 5);
        assert_eq!(grid.rows[2][2].value, "tail");
    }

    #[test]
    fn geometry_converts_to_pixels_with_defaults() {
        let mut sheet = Sheet::new("S");
        sheet.set_cell(CellRef::new(1, 1), Cell::new("x", 0));
        sheet.col_widths.insert(0, 12.0);
        sheet.row_heights.insert(1, 30.0);

        let grid = normalize_sheet(&sheet);
        // 12 chars * 7.5 = 90 px; default 8.5 chars -> 64 px.
        assert_eq!(grid.col_widths_px, vec![90, 64]);
        // Default 15 pt -> 20 px; 30 pt * 1.333 = 39.99 -> 40 px.
        assert_eq!(grid.row_heights_px, vec![20, 40]);
    }

    #[test]
    fn declared_geometry_extends_the_grid() {
        let mut sheet = Sheet::new("S");
        sheet.set_cell(CellRef::new(0, 0), Cell::new("x", 0));
        sheet.col_widths.insert(4, 10.0);

        let grid = normalize_sheet(&sheet);
        assert_eq!(grid.col_count(), 5);
        assert_eq!(grid.col_widths_px[4], 75);
        assert!(grid.rows[0][4].value.is_empty());
    }
}
