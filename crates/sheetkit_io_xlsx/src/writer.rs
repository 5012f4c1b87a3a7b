//! XLSX writer kernel that converts schema-described records into a workbook.

use std::path::Path;

use crate::conf::{EnumStyleTag, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, derive_style_registry};
use crate::partition::coerce_rows;
use crate::sink::{SheetSink, XlsxSheetSink};
use crate::spec::{
    EnumCellValue, Result, SpecColumn, SpecRecord, SpecRowTable, SpecStyleRegistry,
    SpecWidthPolicy, SpecXlsxConvertOptions, SpecXlsxReport, XlsxConvertError,
};
use crate::util::{
    calculate_worker_limit, cast_col_num, cast_row_num, create_worker_pool, validate_unique_columns,
};
use crate::visibility::plan_hidden_columns;
use crate::width::estimate_column_widths;

/// Record-to-workbook writer.
///
/// Holds resolved options and the style registry; every call converts one
/// record set into one single-sheet workbook.
#[derive(Debug, Clone)]
pub struct XlsxRecordWriter {
    options: SpecXlsxConvertOptions,
    registry: SpecStyleRegistry,
}

impl XlsxRecordWriter {
    /// Create a writer after validating `options`.
    pub fn new(options: SpecXlsxConvertOptions) -> Result<Self> {
        validate_convert_options(&options)?;
        let registry = derive_style_registry(&options.font_name);
        Ok(Self { options, registry })
    }

    /// Replace the style registry.
    pub fn with_registry(mut self, registry: SpecStyleRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Resolved conversion options.
    pub fn options(&self) -> &SpecXlsxConvertOptions {
        &self.options
    }

    /// Resolved style registry.
    pub fn registry(&self) -> &SpecStyleRegistry {
        &self.registry
    }

    /// Convert `records` into serialized workbook bytes.
    pub fn convert(
        &self,
        records: &[SpecRecord],
        columns: &[SpecColumn],
    ) -> Result<(Vec<u8>, SpecXlsxReport)> {
        let mut sink = XlsxSheetSink::new(&self.options.sheet_name)?;
        let report = self.write_records(&mut sink, records, columns)?;
        let v_bytes = sink.finish()?;
        tracing::info!(
            n_rows = report.n_rows_data,
            n_cols = report.n_cols,
            n_bytes = v_bytes.len(),
            "workbook serialized"
        );
        Ok((v_bytes, report))
    }

    /// Convert `records` and write the workbook to `path`.
    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
        records: &[SpecRecord],
        columns: &[SpecColumn],
    ) -> Result<SpecXlsxReport> {
        let path = path.as_ref();
        let (v_bytes, report) = self.convert(records, columns)?;
        std::fs::write(path, v_bytes).map_err(|err| {
            XlsxConvertError::Assembly(format!("Failed to write {}: {err}", path.display()))
        })?;
        Ok(report)
    }

    /// Assemble the sheet into `sink`, leaving serialization to the caller.
    pub fn write_records<S: SheetSink>(
        &self,
        sink: &mut S,
        records: &[SpecRecord],
        columns: &[SpecColumn],
    ) -> Result<SpecXlsxReport> {
        validate_records_and_columns(records, columns)?;

        let n_rows_data = records.len();
        let n_cols = columns.len();
        let _span = tracing::info_span!("write_records", n_rows = n_rows_data, n_cols).entered();

        let mut report = SpecXlsxReport {
            sheet_name: self.options.sheet_name.clone(),
            n_rows_data,
            n_cols,
            ..Default::default()
        };

        let n_workers = calculate_worker_limit(self.options.num_workers_max);
        let thread_pool = match create_worker_pool(n_workers) {
            Ok(thread_pool) => Some(thread_pool),
            Err(err) => {
                tracing::warn!(n_workers, %err, "worker pool unavailable, running serially");
                report.warn(format!(
                    "Failed to initialize thread pool (workers={n_workers}); fallback to serial conversion: {err}"
                ));
                None
            }
        };

        sink.freeze_header()?;
        sink.register_styles(&self.registry)?;

        for (col_idx, column) in columns.iter().enumerate() {
            sink.write_cell(
                0,
                cast_col_num(col_idx)?,
                EnumCellValue::String(column.name.clone()),
                EnumStyleTag::Header,
            )?;
        }
        tracing::debug!("header written");

        let table = SpecRowTable::new(records, columns);
        let outcome = coerce_rows(
            &table,
            columns,
            self.options.threshold_rows_parallel,
            thread_pool.as_ref(),
        )?;
        report.strategy = outcome.strategy;
        report.n_batches = outcome.n_batches;
        for cell in outcome.cells {
            sink.write_cell(
                cast_row_num(cell.row_idx + 1)?,
                cast_col_num(cell.col_idx)?,
                cell.value,
                cell.style,
            )?;
        }
        tracing::debug!(strategy = ?report.strategy, n_batches = report.n_batches, "cells written");

        let l_widths =
            estimate_column_widths(&table, &self.options.policy_width, thread_pool.as_ref());
        for (col_idx, n_width) in l_widths.iter().enumerate() {
            sink.set_column_width(cast_col_num(col_idx)?, *n_width)?;
        }
        report.widths = l_widths;

        let n_col_last = cast_col_num(n_cols - 1)?;
        sink.set_autofilter(0, 0, 0, n_col_last)?;

        for plan in plan_hidden_columns(columns, n_rows_data, thread_pool.as_ref()) {
            let col = cast_col_num(plan.col_idx)?;
            sink.set_column_hidden(col)?;
            for row_idx in plan.rows {
                sink.set_cell_style(cast_row_num(row_idx)?, col, EnumStyleTag::Mask)?;
            }
            report.cols_hidden.push(plan.name);
        }
        tracing::debug!(n_hidden = report.cols_hidden.len(), "visibility applied");

        sink.set_default_font(cast_col_num(n_cols)?, &self.options.font_name)?;

        Ok(report)
    }
}

/// Convert records with `options` into serialized workbook bytes.
pub fn convert_records_to_xlsx(
    records: &[SpecRecord],
    columns: &[SpecColumn],
    options: SpecXlsxConvertOptions,
) -> Result<(Vec<u8>, SpecXlsxReport)> {
    XlsxRecordWriter::new(options)?.convert(records, columns)
}

/// Convert records with `options` and write the workbook to `path`.
pub fn save_records_to_xlsx<P: AsRef<Path>>(
    path: P,
    records: &[SpecRecord],
    columns: &[SpecColumn],
    options: SpecXlsxConvertOptions,
) -> Result<SpecXlsxReport> {
    XlsxRecordWriter::new(options)?.save(path, records, columns)
}

fn validate_convert_options(options: &SpecXlsxConvertOptions) -> Result<()> {
    if options.sheet_name.trim().is_empty() {
        return Err(XlsxConvertError::Validation(
            "sheet_name must not be empty.".to_string(),
        ));
    }
    if options.font_name.trim().is_empty() {
        return Err(XlsxConvertError::Validation(
            "font_name must not be empty.".to_string(),
        ));
    }
    validate_policy_width(&options.policy_width)
}

fn validate_policy_width(policy_width: &SpecWidthPolicy) -> Result<()> {
    if !(policy_width.char_factor.is_finite() && policy_width.char_factor > 0.0) {
        return Err(XlsxConvertError::Validation(
            "policy_width.char_factor must be a positive finite number.".to_string(),
        ));
    }
    if !(policy_width.width_min.is_finite() && policy_width.width_min > 0.0) {
        return Err(XlsxConvertError::Validation(
            "policy_width.width_min must be a positive finite number.".to_string(),
        ));
    }
    if !(policy_width.width_max <= 255.0 && policy_width.width_min <= policy_width.width_max) {
        return Err(XlsxConvertError::Validation(
            "policy_width requires width_min <= width_max <= 255.".to_string(),
        ));
    }
    Ok(())
}

fn validate_records_and_columns(records: &[SpecRecord], columns: &[SpecColumn]) -> Result<()> {
    if records.is_empty() {
        return Err(XlsxConvertError::Validation("Data is empty.".to_string()));
    }
    if columns.is_empty() {
        return Err(XlsxConvertError::Validation(
            "Column schema is empty.".to_string(),
        ));
    }
    if columns.len() > N_NCOLS_EXCEL_MAX {
        return Err(XlsxConvertError::Validation(format!(
            "Column count {} exceeds Excel limit {N_NCOLS_EXCEL_MAX}.",
            columns.len()
        )));
    }
    if records.len() + 1 > N_NROWS_EXCEL_MAX {
        return Err(XlsxConvertError::Validation(format!(
            "Record count {} exceeds Excel limit {} (header included).",
            records.len(),
            N_NROWS_EXCEL_MAX - 1
        )));
    }

    let l_names: Vec<&str> = columns.iter().map(|col| col.name.as_str()).collect();
    validate_unique_columns(&l_names).map_err(XlsxConvertError::Validation)
}
