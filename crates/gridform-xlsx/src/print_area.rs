//! Print-area parsing and grid cropping.
//!
//! Workbooks declare print areas as `_xlnm.Print_Area` defined names with
//! formulas like `'Sheet 1'!$B$2:$F$8`. Cropping remembers its offsets so a
//! cropped `(row, col)` can still be traced to the original A1 reference.

use gridform_model::{CropOffsets, GridCell, NormalizedGrid, Range};

/// A `_xlnm.Print_Area` formula that could not be understood.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unparsable print area {0:?}")]
pub struct PrintAreaParseError(pub String);

/// Parse a print-area formula into a cell range.
///
/// Multi-area formulas (comma-separated) keep only the first area. The sheet
/// qualifier (quoted or bare) and `$` anchors are ignored.
pub fn parse_print_area(raw: &str) -> Result<Range, PrintAreaParseError> {
    let first = split_first_area(raw.trim()).ok_or_else(|| PrintAreaParseError(raw.to_string()))?;

    let reference = match rsplit_sheet_qualifier(first) {
        Some(rest) => rest,
        None => first,
    };

    Range::from_a1(reference.trim()).map_err(|_| PrintAreaParseError(raw.to_string()))
}

/// First comma-separated area, honoring quoted sheet names that may contain
/// commas.
fn split_first_area(raw: &str) -> Option<&str> {
    let mut in_quotes = false;
    for (i, c) in raw.char_indices() {
        match c {
            '\'' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                let first = raw[..i].trim();
                return (!first.is_empty()).then_some(first);
            }
            _ => {}
        }
    }
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Strip a leading `Sheet!` / `'My Sheet'!` qualifier, if present.
fn rsplit_sheet_qualifier(area: &str) -> Option<&str> {
    area.rfind('!').map(|i| &area[i + 1..])
}

/// Crop a grid to its print area, or trim trailing empty rows and columns
/// when no (usable) print area is given.
///
/// Cropping records [`CropOffsets`]; trimming never shifts the origin, so its
/// offsets stay zero.
pub fn crop_grid(grid: &NormalizedGrid, print_area: Option<Range>) -> NormalizedGrid {
    if let Some(area) = print_area {
        if (area.start.row as usize) < grid.row_count()
            && (area.start.col as usize) < grid.col_count()
        {
            return crop_to_range(grid, area);
        }
        // A print area entirely outside the content degrades to trimming.
    }
    trim_trailing_empty(grid)
}

fn crop_to_range(grid: &NormalizedGrid, area: Range) -> NormalizedGrid {
    let row_start = area.start.row as usize;
    let col_start = area.start.col as usize;
    let row_end = (area.end.row as usize + 1).min(grid.row_count());
    let col_end = (area.end.col as usize + 1).min(grid.col_count());

    let n_rows = row_end - row_start;
    let n_cols = col_end - col_start;

    let mut rows: Vec<Vec<GridCell>> = grid.rows[row_start..row_end]
        .iter()
        .map(|row| row[col_start..col_end].to_vec())
        .collect();

    // Spans reaching past the crop edge are clamped to it.
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            cell.row_span = cell.row_span.min((n_rows - r) as u32);
            cell.col_span = cell.col_span.min((n_cols - c) as u32);
        }
    }

    NormalizedGrid {
        sheet_name: grid.sheet_name.clone(),
        rows,
        col_widths_px: grid.col_widths_px[col_start..col_end].to_vec(),
        row_heights_px: grid.row_heights_px[row_start..row_end].to_vec(),
        crop: CropOffsets {
            row_offset: area.start.row,
            col_offset: area.start.col,
        },
    }
}

/// Drop trailing rows whose cells are all empty, then trailing columns the
/// same way. Skip markers count as empty.
fn trim_trailing_empty(grid: &NormalizedGrid) -> NormalizedGrid {
    let is_empty = |cell: &GridCell| cell.skip || cell.value.is_empty();

    let mut n_rows = grid.row_count();
    while n_rows > 0 && grid.rows[n_rows - 1].iter().all(is_empty) {
        n_rows -= 1;
    }

    let mut n_cols = if n_rows == 0 { 0 } else { grid.col_count() };
    while n_cols > 0
        && grid.rows[..n_rows]
            .iter()
            .all(|row| is_empty(&row[n_cols - 1]))
    {
        n_cols -= 1;
    }

    let mut rows: Vec<Vec<GridCell>> = grid.rows[..n_rows]
        .iter()
        .map(|row| row[..n_cols].to_vec())
        .collect();

    for (r, row) in rows.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            cell.row_span = cell.row_span.min((n_rows - r) as u32);
            cell.col_span = cell.col_span.min((n_cols - c) as u32);
        }
    }

    NormalizedGrid {
        sheet_name: grid.sheet_name.clone(),
        rows,
        col_widths_px: grid.col_widths_px[..n_cols].to_vec(),
        row_heights_px: grid.row_heights_px[..n_rows].to_vec(),
        crop: CropOffsets::default(),
    }
}
