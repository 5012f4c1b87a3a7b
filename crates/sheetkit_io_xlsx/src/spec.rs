//! Shared XLSX specification models.

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conf::{
    C_FONT_NAME_DEFAULT, C_SHEET_NAME_DEFAULT, EnumStyleTag, N_NROWS_PARALLEL_THRESHOLD,
    N_WIDTH_CHAR_FACTOR, N_WIDTH_COL_MAX, N_WIDTH_COL_MIN,
};

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification resolved into a `rust_xlsxwriter::Format` by the sink.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Number format code.
    pub num_format: Option<String>,
    /// Font color.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            font_name: other.font_name.clone().or_else(|| self.font_name.clone()),
            bold: other.bold.or(self.bold),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

/// Fixed set of formats addressed by [`EnumStyleTag`].
///
/// Resolved once per conversion and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecStyleRegistry {
    /// Header row format.
    pub header: SpecCellFormat,
    /// STRING column format.
    pub text: SpecCellFormat,
    /// INTEGER column format.
    pub integer: SpecCellFormat,
    /// FLOAT column format.
    pub float: SpecCellFormat,
    /// DATETIME column format.
    pub datetime: SpecCellFormat,
    /// PERCENTAGE column format.
    pub percentage: SpecCellFormat,
    /// Hidden-column mask format.
    pub mask: SpecCellFormat,
}

impl SpecStyleRegistry {
    /// Format registered for `tag`.
    pub fn get(&self, tag: EnumStyleTag) -> &SpecCellFormat {
        match tag {
            EnumStyleTag::Header => &self.header,
            EnumStyleTag::Text => &self.text,
            EnumStyleTag::Integer => &self.integer,
            EnumStyleTag::Float => &self.float,
            EnumStyleTag::DateTime => &self.datetime,
            EnumStyleTag::Percentage => &self.percentage,
            EnumStyleTag::Mask => &self.mask,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnSchema

/// Declared semantic type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnumColumnType {
    /// Text, passed through.
    String,
    /// Base-10 integer.
    Integer,
    /// 64-bit float.
    Float,
    /// `YYYY-MM-DD HH:MM` timestamp.
    #[serde(rename = "DATETIME")]
    DateTime,
    /// Pre-normalized fraction, never parsed.
    Percentage,
    /// Any unrecognized type string; cells of such columns are not written.
    #[default]
    #[serde(other)]
    Unknown,
}

impl EnumColumnType {
    /// Wire name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::DateTime => "DATETIME",
            Self::Percentage => "PERCENTAGE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for EnumColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column visibility state.
///
/// `Hidden` and `AlwaysHidden` produce identical output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumColumnVisibility {
    /// Hidden and masked.
    Hidden,
    /// Hidden and masked.
    AlwaysHidden,
    /// Shown. Unknown and empty values fall back here.
    #[default]
    #[serde(other)]
    Visible,
}

impl EnumColumnVisibility {
    /// Whether the column must be hidden and masked.
    pub fn is_hidden(&self) -> bool {
        matches!(self, Self::Hidden | Self::AlwaysHidden)
    }
}

/// One column descriptor of the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecColumn {
    /// Field name and header text.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type", default)]
    pub col_type: EnumColumnType,
    /// Visibility state.
    #[serde(rename = "default_visibility", default)]
    pub visibility: EnumColumnVisibility,
}

impl SpecColumn {
    /// Visible column of `col_type`.
    pub fn new(name: impl Into<String>, col_type: EnumColumnType) -> Self {
        Self {
            name: name.into(),
            col_type,
            visibility: EnumColumnVisibility::Visible,
        }
    }

    /// Return the column with `visibility` replaced.
    pub fn with_visibility(mut self, visibility: EnumColumnVisibility) -> Self {
        self.visibility = visibility;
        self
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Records

/// Loosely-typed field value of an input record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumRawValue {
    /// Explicit null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integral number.
    Integer(i64),
    /// Floating-point number.
    Float(f64),
    /// Text.
    String(String),
}

impl fmt::Display for EnumRawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str(crate::conf::C_RENDER_NULL),
            Self::Bool(val) => write!(f, "{val}"),
            Self::Integer(val) => write!(f, "{val}"),
            Self::Float(val) if derive_if_float_exponent(*val) => write!(f, "{val:e}"),
            Self::Float(val) => write!(f, "{val}"),
            Self::String(val) => f.write_str(val),
        }
    }
}

/// Very large or very small magnitudes print in exponent form.
fn derive_if_float_exponent(value: f64) -> bool {
    let n_abs = value.abs();
    n_abs.is_finite() && n_abs != 0.0 && !(1e-4..1e21).contains(&n_abs)
}

impl From<&str> for EnumRawValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for EnumRawValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for EnumRawValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for EnumRawValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for EnumRawValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Input record: field name to raw value, insertion-ordered.
pub type SpecRecord = IndexMap<String, EnumRawValue>;

/// Record produced by the reverse reader.
pub type SpecStringRecord = IndexMap<String, String>;

/// Records re-laid as a row-major table ordered by schema.
///
/// `None` marks a field absent from the record. Built once per conversion so
/// workers address values by `(row, col)` only.
#[derive(Debug, Clone)]
pub struct SpecRowTable<'a> {
    n_cols: usize,
    cells: Vec<Option<&'a EnumRawValue>>,
}

impl<'a> SpecRowTable<'a> {
    /// Resolve `records` against `columns` through a name-to-index lookup.
    pub fn new(records: &'a [SpecRecord], columns: &[SpecColumn]) -> Self {
        let n_cols = columns.len();
        let dict_col_idx: HashMap<&str, usize> = columns
            .iter()
            .enumerate()
            .map(|(n_idx, col)| (col.name.as_str(), n_idx))
            .collect();

        let mut cells = vec![None; records.len() * n_cols];
        for (n_idx_row, record) in records.iter().enumerate() {
            let n_offset = n_idx_row * n_cols;
            for (c_key, value) in record {
                if let Some(n_idx_col) = dict_col_idx.get(c_key.as_str()) {
                    cells[n_offset + n_idx_col] = Some(value);
                }
            }
        }

        Self { n_cols, cells }
    }

    /// Number of data rows.
    pub fn n_rows(&self) -> usize {
        if self.n_cols == 0 {
            0
        } else {
            self.cells.len() / self.n_cols
        }
    }

    /// Number of schema columns.
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Values of row `n_idx_row` in schema order.
    pub fn row(&self, n_idx_row: usize) -> &[Option<&'a EnumRawValue>] {
        let n_start = n_idx_row * self.n_cols;
        &self.cells[n_start..n_start + self.n_cols]
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Cells

/// Typed cell value handed to the sheet sink.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCellValue {
    /// Blank cell (style only).
    None,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Boolean(bool),
    /// Date-time value.
    DateTime(NaiveDateTime),
}

/// One coerced cell with absolute data-row/column indices.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecCell {
    /// Zero-based data row (sheet row is `row_idx + 1`).
    pub row_idx: usize,
    /// Zero-based column in schema order.
    pub col_idx: usize,
    /// Typed value.
    pub value: EnumCellValue,
    /// Style reference.
    pub style: EnumStyleTag,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ConvertOptions

/// Column width estimation policy.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecWidthPolicy {
    /// Width units per rendered byte.
    pub char_factor: f64,
    /// Minimum final width.
    pub width_min: f64,
    /// Maximum final width.
    pub width_max: f64,
}

impl Default for SpecWidthPolicy {
    fn default() -> Self {
        Self {
            char_factor: N_WIDTH_CHAR_FACTOR,
            width_min: N_WIDTH_COL_MIN,
            width_max: N_WIDTH_COL_MAX,
        }
    }
}

/// Conversion-wide options.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecXlsxConvertOptions {
    /// Name of the single output worksheet.
    pub sheet_name: String,
    /// Default font family of the sheet.
    pub font_name: String,
    /// Record counts above this run coercion in parallel.
    pub threshold_rows_parallel: usize,
    /// Worker count; defaults to available parallelism.
    pub num_workers_max: Option<usize>,
    /// Column width estimation policy.
    pub policy_width: SpecWidthPolicy,
}

impl Default for SpecXlsxConvertOptions {
    fn default() -> Self {
        Self {
            sheet_name: C_SHEET_NAME_DEFAULT.to_string(),
            font_name: C_FONT_NAME_DEFAULT.to_string(),
            threshold_rows_parallel: N_NROWS_PARALLEL_THRESHOLD,
            num_workers_max: None,
            policy_width: SpecWidthPolicy::default(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Coercion strategy actually executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumPartitionStrategy {
    /// Single pass in input order.
    #[default]
    Sequential,
    /// Contiguous batches on the worker pool.
    Parallel,
}

/// Per-conversion report.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecXlsxReport {
    /// Worksheet name.
    pub sheet_name: String,
    /// Coercion strategy.
    pub strategy: EnumPartitionStrategy,
    /// Number of coercion batches (1 when sequential).
    pub n_batches: usize,
    /// Data rows written (header excluded).
    pub n_rows_data: usize,
    /// Columns written.
    pub n_cols: usize,
    /// Final width by column.
    pub widths: Vec<f64>,
    /// Names of hidden columns.
    pub cols_hidden: Vec<String>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecXlsxReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Boundary class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumErrorClass {
    /// Caller sent malformed or empty input.
    Client,
    /// Per-request failure inside conversion.
    Server,
}

impl EnumErrorClass {
    /// HTTP status code for the class.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Client => 400,
            Self::Server => 500,
        }
    }
}

/// Conversion failure. Any variant aborts the whole conversion.
#[derive(Debug, Error)]
pub enum XlsxConvertError {
    /// Malformed input envelope.
    #[error("Cannot decode request: {0}")]
    Decode(String),

    /// Input rejected before conversion started.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// A field could not be parsed into its declared type.
    #[error("Failed to convert {raw_value:?} to {target} (column {column:?}, record {row_idx})")]
    Coercion {
        /// Column name.
        column: String,
        /// Offending raw value.
        raw_value: String,
        /// Declared column type.
        target: EnumColumnType,
        /// Zero-based record index.
        row_idx: usize,
    },

    /// A workbook mutation or serialization step failed.
    #[error("xlsx write error: {0}")]
    Assembly(String),

    /// Workbook could not be read back.
    #[error("xlsx read error: {0}")]
    Read(String),
}

impl XlsxConvertError {
    /// Boundary class of this error.
    pub fn class(&self) -> EnumErrorClass {
        match self {
            Self::Decode(_) | Self::Validation(_) => EnumErrorClass::Client,
            Self::Coercion { .. } | Self::Assembly(_) | Self::Read(_) => EnumErrorClass::Server,
        }
    }
}

/// Result alias for conversion operations.
pub type Result<T> = std::result::Result<T, XlsxConvertError>;

// #endregion
////////////////////////////////////////////////////////////////////////////////
