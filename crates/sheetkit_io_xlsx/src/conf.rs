//! XLSX constants and default preset factories.

use crate::spec::{SpecCellFormat, SpecStyleRegistry, SpecXlsxConvertOptions};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;

/// Record count above which coercion runs on the worker pool.
pub const N_NROWS_PARALLEL_THRESHOLD: usize = 10_000;

/// Width units per rendered byte.
pub const N_WIDTH_CHAR_FACTOR: f64 = 1.15;
/// Minimum column width.
pub const N_WIDTH_COL_MIN: f64 = 10.0;
/// Maximum column width (Excel hard limit).
pub const N_WIDTH_COL_MAX: f64 = 255.0;

/// Sheet name of the single output worksheet.
pub const C_SHEET_NAME_DEFAULT: &str = "Sheet1";
/// Default font family applied to every style preset.
pub const C_FONT_NAME_DEFAULT: &str = "Aptos Narrow";
/// Font color used to mask hidden-column cells.
pub const C_FONT_COLOR_MASK: &str = "#FF00FF";
/// `chrono` layout accepted for DATETIME strings (`YYYY-MM-DD HH:MM`).
pub const C_DATETIME_LAYOUT: &str = "%Y-%m-%d %H:%M";
/// Text rendering of an explicit null used by width estimation.
pub const C_RENDER_NULL: &str = "<nil>";
/// MIME type of the serialized workbook.
pub const C_MIME_XLSX: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet; charset=utf-8";

/// Canonical style tags referenced by produced cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EnumStyleTag {
    /// Header row cells.
    Header,
    /// STRING columns.
    Text,
    /// INTEGER columns.
    Integer,
    /// FLOAT columns.
    Float,
    /// DATETIME columns.
    DateTime,
    /// PERCENTAGE columns.
    Percentage,
    /// Cells of hidden columns.
    Mask,
}

impl EnumStyleTag {
    /// All tags in registry order.
    pub const ALL: [EnumStyleTag; 7] = [
        EnumStyleTag::Header,
        EnumStyleTag::Text,
        EnumStyleTag::Integer,
        EnumStyleTag::Float,
        EnumStyleTag::DateTime,
        EnumStyleTag::Percentage,
        EnumStyleTag::Mask,
    ];
}

/// Build the default style registry used by [`crate::writer::XlsxRecordWriter`].
pub fn derive_default_style_registry() -> SpecStyleRegistry {
    derive_style_registry(C_FONT_NAME_DEFAULT)
}

/// Build the style registry with `font_name` as the base font of every preset.
pub fn derive_style_registry(font_name: &str) -> SpecStyleRegistry {
    let cfg_base_fmt_spec = SpecCellFormat {
        font_name: Some(font_name.to_string()),
        ..Default::default()
    };

    SpecStyleRegistry {
        header: cfg_base_fmt_spec.with_(SpecCellFormat {
            bold: Some(true),
            ..Default::default()
        }),
        text: cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("@".to_string()),
            ..Default::default()
        }),
        integer: cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0".to_string()),
            ..Default::default()
        }),
        float: cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0.00".to_string()),
            ..Default::default()
        }),
        datetime: cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("yyyy-mm-dd".to_string()),
            ..Default::default()
        }),
        percentage: cfg_base_fmt_spec.with_(SpecCellFormat {
            num_format: Some("0.00%".to_string()),
            ..Default::default()
        }),
        mask: cfg_base_fmt_spec.with_(SpecCellFormat {
            font_color: Some(C_FONT_COLOR_MASK.to_string()),
            ..Default::default()
        }),
    }
}

/// Build default conversion options.
pub fn derive_default_convert_options() -> SpecXlsxConvertOptions {
    SpecXlsxConvertOptions::default()
}
