//! Reverse reader: first worksheet back into string records.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, ExcelDateTime, Range, Reader, Xlsx, open_workbook_from_rs};
use chrono::NaiveTime;

use crate::conf::C_DATETIME_LAYOUT;
use crate::spec::{Result, SpecStringRecord, XlsxConvertError};
use crate::util::{derive_col_letters, render_float};

/// Read the first worksheet of an in-memory workbook.
///
/// The first row is the header; every later row becomes one record keyed by
/// header text, in row order.
pub fn read_records_from_xlsx_bytes(bytes: &[u8]) -> Result<Vec<SpecStringRecord>> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))
        .map_err(|err| derive_read_error("Cannot open workbook", err))?;

    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        return Err(XlsxConvertError::Read(
            "Workbook has no worksheet.".to_string(),
        ));
    };
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|err| derive_read_error(&format!("Cannot read worksheet {sheet_name:?}"), err))?;

    let records = derive_records_from_range(&range)?;
    tracing::debug!(sheet = sheet_name.as_str(), n_records = records.len(), "workbook read");
    Ok(records)
}

/// Read the first worksheet of the workbook at `path`.
pub fn read_records_from_xlsx_path<P: AsRef<Path>>(path: P) -> Result<Vec<SpecStringRecord>> {
    let path = path.as_ref();
    let v_bytes = std::fs::read(path)
        .map_err(|err| XlsxConvertError::Read(format!("Cannot read {}: {err}", path.display())))?;
    read_records_from_xlsx_bytes(&v_bytes)
}

fn derive_read_error(c_context: &str, err: impl std::fmt::Display) -> XlsxConvertError {
    XlsxConvertError::Read(format!("{c_context}: {err}"))
}

/// Render one cell as the text a spreadsheet shows.
pub fn render_cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => render_float(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::DateTime(dt) => render_datetime(dt),
        other => other.to_string(),
    }
}

fn render_datetime(dt: &ExcelDateTime) -> String {
    if dt.is_duration() {
        return render_float(dt.as_f64());
    }
    match dt.as_datetime() {
        Some(datetime) if datetime.time() == NaiveTime::MIN => {
            datetime.date().format("%Y-%m-%d").to_string()
        }
        Some(datetime) => datetime.format(C_DATETIME_LAYOUT).to_string(),
        None => render_float(dt.as_f64()),
    }
}

fn derive_records_from_range(range: &Range<Data>) -> Result<Vec<SpecStringRecord>> {
    let mut iter_rows = range.rows();
    let Some(row_header) = iter_rows.next() else {
        return Err(XlsxConvertError::Read("Worksheet has no rows.".to_string()));
    };

    let n_col_start = range.start().map(|(_, col)| col as usize).unwrap_or(0);
    let n_width_header = row_header
        .iter()
        .rposition(|cell| !render_cell_text(cell).is_empty())
        .map_or(0, |n_idx| n_idx + 1);
    let l_keys: Vec<String> = row_header[..n_width_header]
        .iter()
        .enumerate()
        .map(|(n_idx, cell)| {
            let c_key = render_cell_text(cell);
            if c_key.is_empty() {
                derive_col_letters(n_col_start + n_idx)
            } else {
                c_key
            }
        })
        .collect();

    Ok(iter_rows
        .map(|row| {
            l_keys
                .iter()
                .enumerate()
                .map(|(n_idx, c_key)| {
                    let c_text = row.get(n_idx).map(render_cell_text).unwrap_or_default();
                    (c_key.clone(), c_text)
                })
                .collect()
        })
        .collect())
}
