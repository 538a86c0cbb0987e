//! `gridform-model` defines the core in-memory spreadsheet data structures.
//!
//! The crate is intentionally self-contained so it can be reused by:
//! - the `.xlsx` codec (reader, normalizer, composer)
//! - the web/rendering boundary via `serde` (JSON-safe schema)

mod address;
mod grid;
mod style;
mod theme;
mod workbook;

pub use address::{
    column_index, column_label, A1ParseError, CellRef, Range, RangeParseError, MAX_COLS, MAX_ROWS,
};
pub use grid::{CropOffsets, GridCell, LayoutGroup, NormalizedGrid};
pub use style::{
    Alignment, Border, BorderEdge, Color, Fill, Font, HorizontalAlignment, Style, StyleTable,
    VerticalAlignment,
};
pub use theme::{apply_tint, ThemePalette, THEME_COLOR_COUNT};
pub use workbook::{
    Cell, DuplicateSheetName, ImageFormat, MergeConflict, PhotoAnchor, Sheet, SheetVisibility,
    Workbook,
};
