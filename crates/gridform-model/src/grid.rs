use serde::{Deserialize, Serialize};

use crate::address::column_label;

/// One cell of a normalized grid, ready for rendering.
///
/// Merge anchors carry `row_span`/`col_span` > 1; every other cell of a
/// merge range is `skip = true` with empty value and the default style.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridCell {
    pub value: String,
    pub style_id: u32,
    pub row_span: u32,
    pub col_span: u32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip: bool,
}

impl Default for GridCell {
    fn default() -> Self {
        Self {
            value: String::new(),
            style_id: 0,
            row_span: 1,
            col_span: 1,
            skip: false,
        }
    }
}

impl GridCell {
    pub fn skipped() -> Self {
        Self {
            skip: true,
            ..Self::default()
        }
    }
}

/// Offsets remembered when a grid is cropped, so a cropped `(row, col)` can
/// be traced back to its original sheet reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CropOffsets {
    pub row_offset: u32,
    pub col_offset: u32,
}

impl CropOffsets {
    /// Original A1 reference of a cropped 0-based `(row, col)` pair.
    pub fn original_ref(&self, row: u32, col: u32) -> String {
        format!(
            "{}{}",
            column_label(col + self.col_offset),
            row + self.row_offset + 1
        )
    }
}

/// A sheet after normalization: rectangular cell rows plus pixel geometry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct NormalizedGrid {
    pub sheet_name: String,
    pub rows: Vec<Vec<GridCell>>,
    /// Pixel widths, one entry per column.
    pub col_widths_px: Vec<u32>,
    /// Pixel heights, one entry per row.
    pub row_heights_px: Vec<u32>,
    pub crop: CropOffsets,
}

impl NormalizedGrid {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.col_widths_px.len()
    }
}

/// An ordered set of sheet indices that must share column geometry.
/// The first index is the reference; the rest are followers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutGroup {
    pub sheets: Vec<usize>,
}

impl LayoutGroup {
    pub fn new(sheets: Vec<usize>) -> Self {
        Self { sheets }
    }

    pub fn reference(&self) -> Option<usize> {
        self.sheets.first().copied()
    }

    pub fn followers(&self) -> &[usize] {
        self.sheets.get(1..).unwrap_or_default()
    }
}
