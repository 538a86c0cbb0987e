//! XLSX codec for GridForm.
//!
//! Two independent pipelines share the low-level container plumbing:
//!
//! - **Read**: [`read::read_workbook`] opens an in-memory `.xlsx` buffer and
//!   produces a [`gridform_model::Workbook`] with fully resolved styles;
//!   [`grid::normalize_workbook`] turns each sheet into a rectangular,
//!   merge-aware [`gridform_model::NormalizedGrid`]; and
//!   [`print_area::crop_grid`] crops to the declared print area (or trims
//!   trailing empties), remembering offsets so any cropped cell can be traced
//!   back to its original reference.
//! - **Compose**: [`compose::compose`] clones a hidden master sheet per data
//!   record, injects field values and anchored photos, hides the masters, and
//!   serializes a brand-new workbook via [`write::write_workbook`].
//!
//! Only a corrupt container is fatal. Everything else (an undecodable cell,
//! a malformed print area, a merge conflict while cloning, a record without a
//! master) degrades into an ordered [`Warning`] list returned beside the
//! successful result.

pub mod compose;
pub mod grid;
pub mod layout_group;
pub mod print_area;
pub mod read;
pub mod shared_strings;
pub mod styles;
pub mod theme;
pub mod write;

mod number_format;
mod zip_util;

pub use compose::{compose, CategoryLayout, ComposeOutput, Photo, Record};
pub use grid::{normalize_sheet, normalize_workbook};
pub use layout_group::{sync_grid_group, sync_sheet_group};
pub use print_area::{crop_grid, parse_print_area, PrintAreaParseError};
pub use read::{read_workbook, ReadOutput};
pub use write::write_workbook;

use gridform_model::Range;
use serde::{Deserialize, Serialize};

/// Fatal container-level failure: the buffer is not a readable workbook.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    XmlAttr(#[from] quick_xml::events::attributes::AttrError),
    #[error("xml document error: {0}")]
    XmlDoc(#[from] roxmltree::Error),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("missing required part: {0}")]
    MissingPart(&'static str),
    #[error("part '{part}' too large ({size} bytes, max {max})")]
    PartTooLarge { part: String, size: u64, max: u64 },
    #[error("invalid workbook structure: {0}")]
    Invalid(String),
}

/// A recovered, non-fatal condition accumulated during a read or compose
/// call. Warnings are ordered as encountered and serialize for the caller's
/// diagnostics channel; each is also mirrored to `log::warn!`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A single cell's value or style could not be decoded; it was read with
    /// a safe default instead.
    CellDecode {
        sheet: String,
        cell: String,
        reason: String,
    },
    /// A merge range overlapped one already applied; the later declaration
    /// was ignored.
    MergeConflict { sheet: String, range: Range },
    /// A record's category had no master sheet; the record was skipped.
    MissingTemplate { record_id: String, category: String },
    /// A declared print-area string could not be parsed; the sheet fell back
    /// to trailing-empty trimming.
    PrintAreaParse { sheet: String, raw: String },
}

impl Warning {
    pub(crate) fn emit(self, sink: &mut Vec<Warning>) {
        match &self {
            Warning::CellDecode {
                sheet,
                cell,
                reason,
            } => log::warn!("sheet {sheet:?} cell {cell}: {reason}; using default"),
            Warning::MergeConflict { sheet, range } => {
                log::warn!("sheet {sheet:?}: ignoring conflicting merge {range}")
            }
            Warning::MissingTemplate {
                record_id,
                category,
            } => log::warn!("record {record_id:?}: no master sheet for category {category:?}"),
            Warning::PrintAreaParse { sheet, raw } => {
                log::warn!("sheet {sheet:?}: unparsable print area {raw:?}; trimming instead")
            }
        }
        sink.push(self);
    }
}
