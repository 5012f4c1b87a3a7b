//! Stateless helper utilities used by the XLSX conversion kernel.

use std::collections::{BTreeMap, BTreeSet};

use rayon::{ThreadPool, ThreadPoolBuilder};
use rust_xlsxwriter::XlsxError;

use crate::spec::{Result, XlsxConvertError};

////////////////////////////////////////////////////////////////////////////////
// #region WorkerPool

/// Resolve the worker count; `None` means available parallelism.
pub fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    match num_workers_max {
        Some(n) => n.max(1),
        None => std::thread::available_parallelism()
            .map(|v| v.get())
            .unwrap_or(1),
    }
}

/// Build a scoped rayon pool with `n_workers` threads.
pub fn create_worker_pool(n_workers: usize) -> std::result::Result<ThreadPool, String> {
    ThreadPoolBuilder::new()
        .num_threads(n_workers)
        .thread_name(|n_idx| format!("sheetkit-xlsx-{n_idx}"))
        .build()
        .map_err(|err| err.to_string())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RowChunking

/// Rows per batch so that `n_workers` batches cover `n_rows_total`.
pub fn calculate_batch_size(n_rows_total: usize, n_workers: usize) -> usize {
    n_rows_total.div_ceil(n_workers.max(1)).max(1)
}

/// Generate `(row_start, row_len)` chunks for `n_rows_total`.
pub fn generate_row_chunks(n_rows_total: usize, size_rows_chunk: usize) -> Vec<(usize, usize)> {
    let mut l_chunks = Vec::new();
    let mut n_row_cursor = 0;
    while n_row_cursor < n_rows_total {
        let n_rows_per_chunk = usize::min(size_rows_chunk, n_rows_total - n_row_cursor);
        l_chunks.push((n_row_cursor, n_rows_per_chunk));
        n_row_cursor += n_rows_per_chunk;
    }
    l_chunks
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SchemaUtils

/// Validate that `columns` has no duplicated names.
pub fn validate_unique_columns(columns: &[&str]) -> std::result::Result<(), String> {
    if columns.len() == columns.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in columns.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter_map(|(c_name, l_pos)| {
            if l_pos.len() > 1 {
                Some(format!(
                    "{c_name:?} x{} at indices {:?}",
                    l_pos.len(),
                    l_pos
                ))
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join("; ");

    Err(format!("Duplicate column names detected: {c_msg}"))
}

/// Spreadsheet column letters for a zero-based index (`0 -> A`, `26 -> AA`).
pub fn derive_col_letters(col_idx: usize) -> String {
    let mut l_chars = Vec::new();
    let mut n_rest = col_idx + 1;
    while n_rest > 0 {
        let n_rem = (n_rest - 1) % 26;
        l_chars.push((b'A' + n_rem as u8) as char);
        n_rest = (n_rest - 1) / 26;
    }
    l_chars.iter().rev().collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ValueConversion

/// Render a float the way a spreadsheet cell reads: integral values lose `.0`.
pub fn render_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetIndexCasts

/// Cast a sheet row index to the writer's row type.
pub fn cast_row_num(value: usize) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| XlsxConvertError::Assembly(format!("row index overflow: {value}")))
}

/// Cast a sheet column index to the writer's column type.
pub fn cast_col_num(value: usize) -> Result<u16> {
    u16::try_from(value)
        .map_err(|_| XlsxConvertError::Assembly(format!("column index overflow: {value}")))
}

/// Map a `rust_xlsxwriter` failure onto [`XlsxConvertError::Assembly`].
pub fn derive_xlsx_error(err: XlsxError) -> XlsxConvertError {
    XlsxConvertError::Assembly(err.to_string())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
