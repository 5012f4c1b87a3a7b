//! `sheetkit_io_xlsx` v1:
//! Schema-driven record ⇄ XLSX conversion kernel.
//!
//! Modules:
//! - `conf`       : constants, style tags and default presets
//! - `spec`       : schema/record/cell models, options, report and errors
//! - `util`       : pure helper functions
//! - `coerce`     : per-value type coercion
//! - `partition`  : sequential/parallel coercion dispatch
//! - `width`      : column width estimation
//! - `visibility` : hidden-column planning
//! - `sink`       : sheet sink contract and implementations
//! - `writer`     : workbook assembler
//! - `reader`     : reverse reader
//! - `service`    : request/response boundary
pub mod coerce;
pub mod conf;
pub mod partition;
pub mod reader;
pub mod service;
pub mod sink;
pub mod spec;
pub mod util;
pub mod visibility;
pub mod width;
pub mod writer;

pub use conf::{
    C_FONT_NAME_DEFAULT, C_MIME_XLSX, C_SHEET_NAME_DEFAULT, EnumStyleTag, N_NCOLS_EXCEL_MAX,
    N_NROWS_EXCEL_MAX, N_NROWS_PARALLEL_THRESHOLD, derive_default_convert_options,
    derive_default_style_registry, derive_style_registry,
};
pub use reader::{read_records_from_xlsx_bytes, read_records_from_xlsx_path};
pub use service::{
    SpecConversionMeta, SpecConversionRequest, SpecXlsxAttachment, XlsxConversionService,
    decode_conversion_request, encode_records_json,
};
pub use sink::{MemorySheetSink, SheetSink, XlsxSheetSink};
pub use spec::{
    EnumCellValue, EnumColumnType, EnumColumnVisibility, EnumErrorClass, EnumPartitionStrategy,
    EnumRawValue, Result, SpecCell, SpecCellFormat, SpecColumn, SpecRecord, SpecStringRecord,
    SpecStyleRegistry, SpecWidthPolicy, SpecXlsxConvertOptions, SpecXlsxReport, XlsxConvertError,
};
pub use writer::{XlsxRecordWriter, convert_records_to_xlsx, save_records_to_xlsx};
