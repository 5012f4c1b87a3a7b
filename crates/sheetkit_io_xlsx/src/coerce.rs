//! Schema-driven coercion of raw field values into typed cells.

use chrono::NaiveDateTime;

use crate::conf::{C_DATETIME_LAYOUT, EnumStyleTag};
use crate::spec::{
    EnumCellValue, EnumColumnType, EnumRawValue, Result, SpecCell, SpecColumn, XlsxConvertError,
};

/// Coerce one raw value according to `column`'s declared type.
///
/// A missing field is treated like an explicit null. Returns `Ok(None)` for
/// columns of unknown type, whose cells are never written.
pub fn coerce_value(
    raw: Option<&EnumRawValue>,
    column: &SpecColumn,
    row_idx: usize,
) -> Result<Option<(EnumCellValue, EnumStyleTag)>> {
    let raw = raw.unwrap_or(&EnumRawValue::Null);

    let (value, style) = match column.col_type {
        EnumColumnType::String => {
            let value = match raw {
                EnumRawValue::Null => EnumCellValue::String(String::new()),
                other => convert_passthrough(other),
            };
            (value, EnumStyleTag::Text)
        }
        EnumColumnType::Integer => {
            let value = match raw {
                EnumRawValue::String(s) if s.is_empty() => EnumCellValue::None,
                EnumRawValue::String(s) => s
                    .parse::<i64>()
                    .map(|v| EnumCellValue::Number(v as f64))
                    .map_err(|_| derive_coercion_error(column, s, row_idx))?,
                other => convert_passthrough(other),
            };
            (value, EnumStyleTag::Integer)
        }
        EnumColumnType::Float => {
            let value = match raw {
                EnumRawValue::String(s) if s.is_empty() => EnumCellValue::None,
                EnumRawValue::String(s) => s
                    .parse::<f64>()
                    .map(EnumCellValue::Number)
                    .map_err(|_| derive_coercion_error(column, s, row_idx))?,
                other => convert_passthrough(other),
            };
            (value, EnumStyleTag::Float)
        }
        EnumColumnType::DateTime => {
            let value = match raw {
                EnumRawValue::String(s) if s.is_empty() => EnumCellValue::None,
                EnumRawValue::String(s) => NaiveDateTime::parse_from_str(s, C_DATETIME_LAYOUT)
                    .map(EnumCellValue::DateTime)
                    .map_err(|_| derive_coercion_error(column, s, row_idx))?,
                other => convert_passthrough(other),
            };
            (value, EnumStyleTag::DateTime)
        }
        EnumColumnType::Percentage => (convert_passthrough(raw), EnumStyleTag::Percentage),
        EnumColumnType::Unknown => return Ok(None),
    };

    Ok(Some((value, style)))
}

/// Coerce one schema-ordered row, appending produced cells to `l_cells`.
pub fn coerce_row_into(
    l_cells: &mut Vec<SpecCell>,
    row: &[Option<&EnumRawValue>],
    columns: &[SpecColumn],
    row_idx: usize,
) -> Result<()> {
    for (col_idx, (raw, column)) in row.iter().zip(columns).enumerate() {
        if let Some((value, style)) = coerce_value(*raw, column, row_idx)? {
            l_cells.push(SpecCell {
                row_idx,
                col_idx,
                value,
                style,
            });
        }
    }
    Ok(())
}

fn convert_passthrough(raw: &EnumRawValue) -> EnumCellValue {
    match raw {
        EnumRawValue::Null => EnumCellValue::None,
        EnumRawValue::Bool(val) => EnumCellValue::Boolean(*val),
        EnumRawValue::Integer(val) => EnumCellValue::Number(*val as f64),
        EnumRawValue::Float(val) => EnumCellValue::Number(*val),
        EnumRawValue::String(val) => EnumCellValue::String(val.clone()),
    }
}

fn derive_coercion_error(column: &SpecColumn, raw_value: &str, row_idx: usize) -> XlsxConvertError {
    XlsxConvertError::Coercion {
        column: column.name.clone(),
        raw_value: raw_value.to_string(),
        target: column.col_type,
        row_idx,
    }
}
