use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::address::{CellRef, Range};
use crate::style::StyleTable;
use crate::theme::ThemePalette;

/// Sheet visibility, three-state as stored in the container.
///
/// `VeryHidden` sheets cannot be unhidden from a viewer's UI; the composer
/// uses it to park spent master sheets without deleting them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SheetVisibility {
    #[default]
    Visible,
    Hidden,
    VeryHidden,
}

/// Image payload format for photo anchors.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }
}

/// A photograph pinned over a cell range, scaled to fill it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoAnchor {
    pub range: Range,
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

/// One cell: a display value plus a reference into the workbook's
/// [`StyleTable`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Cell {
    pub value: String,
    pub style_id: u32,
}

impl Cell {
    pub fn new(value: impl Into<String>, style_id: u32) -> Self {
        Self {
            value: value.into(),
            style_id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.style_id == 0
    }
}

/// Raised when a merge range would overlap one already on the sheet.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("merge range {attempted} overlaps existing merge {existing}")]
pub struct MergeConflict {
    pub attempted: Range,
    pub existing: Range,
}

/// One named 2-D grid of cells plus layout metadata.
///
/// Column widths are in character units and row heights in points, exactly
/// as the container declares them; pixel conversion happens during grid
/// normalization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub visibility: SheetVisibility,
    cells: BTreeMap<CellRef, Cell>,
    /// Declared column widths, keyed by 0-based column, in character units.
    pub col_widths: BTreeMap<u32, f64>,
    /// Declared row heights, keyed by 0-based row, in points.
    pub row_heights: BTreeMap<u32, f64>,
    merges: Vec<Range>,
    pub print_area: Option<Range>,
    pub photos: Vec<PhotoAnchor>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: SheetVisibility::Visible,
            cells: BTreeMap::new(),
            col_widths: BTreeMap::new(),
            row_heights: BTreeMap::new(),
            merges: Vec::new(),
            print_area: None,
            photos: Vec::new(),
        }
    }

    pub fn cell(&self, cell_ref: CellRef) -> Option<&Cell> {
        self.cells.get(&cell_ref)
    }

    pub fn set_cell(&mut self, cell_ref: CellRef, cell: Cell) {
        if cell.is_empty() {
            self.cells.remove(&cell_ref);
        } else {
            self.cells.insert(cell_ref, cell);
        }
    }

    /// Iterate stored cells in row-major order.
    pub fn iter_cells(&self) -> impl Iterator<Item = (CellRef, &Cell)> {
        self.cells.iter().map(|(r, c)| (*r, c))
    }

    pub fn merges(&self) -> &[Range] {
        &self.merges
    }

    /// Add a merge range. Every cell belongs to at most one merge, so a
    /// range overlapping an existing one is rejected.
    pub fn add_merge(&mut self, range: Range) -> Result<(), MergeConflict> {
        if let Some(existing) = self.merges.iter().find(|m| m.intersects(&range)) {
            return Err(MergeConflict {
                attempted: range,
                existing: *existing,
            });
        }
        self.merges.push(range);
        Ok(())
    }

    /// Smallest rectangle covering every stored cell, merge range, and
    /// declared width/height. `None` for a sheet with no content at all.
    pub fn used_range(&self) -> Option<Range> {
        let mut max_row: Option<u32> = None;
        let mut max_col: Option<u32> = None;

        let mut grow = |row: u32, col: u32| {
            max_row = Some(max_row.map_or(row, |r| r.max(row)));
            max_col = Some(max_col.map_or(col, |c| c.max(col)));
        };

        for cell_ref in self.cells.keys() {
            grow(cell_ref.row, cell_ref.col);
        }
        for merge in &self.merges {
            grow(merge.end.row, merge.end.col);
        }
        for &col in self.col_widths.keys() {
            grow(0, col);
        }
        for &row in self.row_heights.keys() {
            grow(row, 0);
        }

        match (max_row, max_col) {
            (Some(row), Some(col)) => Some(Range::new(
                CellRef::new(0, 0),
                CellRef::new(row, col),
            )),
            _ => None,
        }
    }

    /// Copy this sheet's skeleton into a brand-new sheet: column widths,
    /// row heights, and every cell's value + style id.
    ///
    /// The clone owns its own storage and never aliases this sheet. Merges,
    /// print area and photos are deliberately *not* carried over; the
    /// composer re-applies merges itself so conflicts surface as warnings.
    pub fn clone_skeleton(&self, name: impl Into<String>) -> Sheet {
        Sheet {
            name: name.into(),
            visibility: SheetVisibility::Visible,
            cells: self.cells.clone(),
            col_widths: self.col_widths.clone(),
            row_heights: self.row_heights.clone(),
            merges: Vec::new(),
            print_area: None,
            photos: Vec::new(),
        }
    }
}

/// Raised when adding a sheet whose name is already taken.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("a sheet named {0:?} already exists")]
pub struct DuplicateSheetName(pub String);

/// A complete workbook: ordered sheets plus the shared style table and
/// color theme.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
    pub styles: StyleTable,
    pub theme: ThemePalette,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_by_name_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn contains_sheet(&self, name: &str) -> bool {
        self.sheet_by_name(name).is_some()
    }

    /// Append a sheet, enforcing name uniqueness.
    pub fn add_sheet(&mut self, sheet: Sheet) -> Result<(), DuplicateSheetName> {
        if self.contains_sheet(&sheet.name) {
            return Err(DuplicateSheetName(sheet.name.clone()));
        }
        self.sheets.push(sheet);
        Ok(())
    }
}
