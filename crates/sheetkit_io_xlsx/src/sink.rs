//! Sheet sink contract and its implementations.
//!
//! The assembler is the only caller of a sink and holds it by `&mut`, so all
//! workbook mutations happen on one thread.

use std::collections::{BTreeMap, BTreeSet};

use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::conf::EnumStyleTag;
use crate::spec::{EnumCellValue, Result, SpecCellFormat, SpecStyleRegistry, XlsxConvertError};
use crate::util::derive_xlsx_error;

/// Single-sheet workbook writing facility.
pub trait SheetSink {
    /// Value produced by [`SheetSink::finish`].
    type Output;

    /// Register the formats every later style tag resolves to.
    fn register_styles(&mut self, registry: &SpecStyleRegistry) -> Result<()>;

    /// Freeze the first row.
    fn freeze_header(&mut self) -> Result<()>;

    /// Write a cell value with a style.
    fn write_cell(
        &mut self,
        row: u32,
        col: u16,
        value: EnumCellValue,
        style: EnumStyleTag,
    ) -> Result<()>;

    /// Replace the style of a cell, keeping its value.
    fn set_cell_style(&mut self, row: u32, col: u16, style: EnumStyleTag) -> Result<()>;

    /// Set a column width in character units.
    fn set_column_width(&mut self, col: u16, width: f64) -> Result<()>;

    /// Hide a column.
    fn set_column_hidden(&mut self, col: u16) -> Result<()>;

    /// Set the autofilter range.
    fn set_autofilter(
        &mut self,
        first_row: u32,
        first_col: u16,
        last_row: u32,
        last_col: u16,
    ) -> Result<()>;

    /// Apply `font_name` as the default font of the first `n_cols` columns.
    fn set_default_font(&mut self, n_cols: u16, font_name: &str) -> Result<()>;

    /// Consume the sink and produce its output.
    fn finish(self) -> Result<Self::Output>;
}

////////////////////////////////////////////////////////////////////////////////
// #region CellGrid

/// Sparse cell grid keyed by `(row, col)` in sheet order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecCellGrid {
    cells: BTreeMap<(u32, u16), (EnumCellValue, EnumStyleTag)>,
}

impl SpecCellGrid {
    /// Insert or overwrite a cell.
    pub fn put(&mut self, row: u32, col: u16, value: EnumCellValue, style: EnumStyleTag) {
        self.cells.insert((row, col), (value, style));
    }

    /// Restyle a cell; an unwritten cell becomes a styled blank.
    pub fn restyle(&mut self, row: u32, col: u16, style: EnumStyleTag) {
        self.cells
            .entry((row, col))
            .and_modify(|cell| cell.1 = style)
            .or_insert((EnumCellValue::None, style));
    }

    /// Cell at `(row, col)`.
    pub fn get(&self, row: u32, col: u16) -> Option<&(EnumCellValue, EnumStyleTag)> {
        self.cells.get(&(row, col))
    }

    /// Number of stored cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the grid holds no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (&(u32, u16), &(EnumCellValue, EnumStyleTag))> {
        self.cells.iter()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region XlsxSheetSink

/// Sink backed by `rust_xlsxwriter`.
///
/// Column-level settings go straight to the worksheet. Cells are queued and
/// written in [`SheetSink::finish`] so that restyling never needs to read a
/// written cell back.
pub struct XlsxSheetSink {
    worksheet: Worksheet,
    grid: SpecCellGrid,
    dict_formats: BTreeMap<EnumStyleTag, Format>,
}

impl XlsxSheetSink {
    /// Create a sink for one worksheet named `sheet_name`.
    pub fn new(sheet_name: &str) -> Result<Self> {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(sheet_name).map_err(derive_xlsx_error)?;
        Ok(Self {
            worksheet,
            grid: SpecCellGrid::default(),
            dict_formats: BTreeMap::new(),
        })
    }
}

impl SheetSink for XlsxSheetSink {
    type Output = Vec<u8>;

    fn register_styles(&mut self, registry: &SpecStyleRegistry) -> Result<()> {
        self.dict_formats = EnumStyleTag::ALL
            .iter()
            .map(|tag| (*tag, derive_rust_xlsx_format(registry.get(*tag))))
            .collect();
        Ok(())
    }

    fn freeze_header(&mut self) -> Result<()> {
        self.worksheet
            .set_freeze_panes(1, 0)
            .map_err(derive_xlsx_error)?;
        Ok(())
    }

    fn write_cell(
        &mut self,
        row: u32,
        col: u16,
        value: EnumCellValue,
        style: EnumStyleTag,
    ) -> Result<()> {
        self.grid.put(row, col, value, style);
        Ok(())
    }

    fn set_cell_style(&mut self, row: u32, col: u16, style: EnumStyleTag) -> Result<()> {
        self.grid.restyle(row, col, style);
        Ok(())
    }

    fn set_column_width(&mut self, col: u16, width: f64) -> Result<()> {
        self.worksheet
            .set_column_width(col, width)
            .map_err(derive_xlsx_error)?;
        Ok(())
    }

    fn set_column_hidden(&mut self, col: u16) -> Result<()> {
        self.worksheet
            .set_column_hidden(col)
            .map_err(derive_xlsx_error)?;
        Ok(())
    }

    fn set_autofilter(
        &mut self,
        first_row: u32,
        first_col: u16,
        last_row: u32,
        last_col: u16,
    ) -> Result<()> {
        self.worksheet
            .autofilter(first_row, first_col, last_row, last_col)
            .map_err(derive_xlsx_error)?;
        Ok(())
    }

    fn set_default_font(&mut self, n_cols: u16, font_name: &str) -> Result<()> {
        let fmt_default = Format::new().set_font_name(font_name);
        for col in 0..n_cols {
            self.worksheet
                .set_column_format(col, &fmt_default)
                .map_err(derive_xlsx_error)?;
        }
        Ok(())
    }

    fn finish(self) -> Result<Vec<u8>> {
        let XlsxSheetSink {
            mut worksheet,
            grid,
            dict_formats,
        } = self;

        for ((row, col), (value, style)) in grid.iter() {
            let format = dict_formats.get(style).ok_or_else(|| {
                XlsxConvertError::Assembly(format!("style {style:?} was not registered"))
            })?;
            write_cell_with_format(&mut worksheet, *row, *col, value, format)?;
        }

        let mut workbook = Workbook::new();
        workbook.push_worksheet(worksheet);
        workbook.save_to_buffer().map_err(derive_xlsx_error)
    }
}

fn write_cell_with_format(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &EnumCellValue,
    format: &Format,
) -> Result<()> {
    match value {
        EnumCellValue::None => {
            worksheet
                .write_blank(row, col, format)
                .map_err(derive_xlsx_error)?;
        }
        EnumCellValue::String(val) if val.is_empty() => {
            worksheet
                .write_blank(row, col, format)
                .map_err(derive_xlsx_error)?;
        }
        EnumCellValue::String(val) => {
            worksheet
                .write_string_with_format(row, col, val, format)
                .map_err(derive_xlsx_error)?;
        }
        EnumCellValue::Number(val) => {
            worksheet
                .write_number_with_format(row, col, *val, format)
                .map_err(derive_xlsx_error)?;
        }
        EnumCellValue::Boolean(val) => {
            worksheet
                .write_boolean_with_format(row, col, *val, format)
                .map_err(derive_xlsx_error)?;
        }
        EnumCellValue::DateTime(val) => {
            worksheet
                .write_datetime_with_format(row, col, val, format)
                .map_err(derive_xlsx_error)?;
        }
    }
    Ok(())
}

/// Resolve a format specification into a `rust_xlsxwriter` format.
pub fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.clone());
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    format
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region MemorySheetSink

/// Sink that records every call for inspection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySheetSink {
    /// Registered style registry.
    pub registry: Option<SpecStyleRegistry>,
    /// Whether the header pane was frozen.
    pub if_header_frozen: bool,
    /// Written cells with their current styles.
    pub grid: SpecCellGrid,
    /// Width by column.
    pub widths: BTreeMap<u16, f64>,
    /// Hidden columns.
    pub cols_hidden: BTreeSet<u16>,
    /// Autofilter range `(first_row, first_col, last_row, last_col)`.
    pub autofilter: Option<(u32, u16, u32, u16)>,
    /// Default font and the number of columns it covers.
    pub default_font: Option<(u16, String)>,
}

impl SheetSink for MemorySheetSink {
    type Output = MemorySheetSink;

    fn register_styles(&mut self, registry: &SpecStyleRegistry) -> Result<()> {
        self.registry = Some(registry.clone());
        Ok(())
    }

    fn freeze_header(&mut self) -> Result<()> {
        self.if_header_frozen = true;
        Ok(())
    }

    fn write_cell(
        &mut self,
        row: u32,
        col: u16,
        value: EnumCellValue,
        style: EnumStyleTag,
    ) -> Result<()> {
        self.grid.put(row, col, value, style);
        Ok(())
    }

    fn set_cell_style(&mut self, row: u32, col: u16, style: EnumStyleTag) -> Result<()> {
        self.grid.restyle(row, col, style);
        Ok(())
    }

    fn set_column_width(&mut self, col: u16, width: f64) -> Result<()> {
        self.widths.insert(col, width);
        Ok(())
    }

    fn set_column_hidden(&mut self, col: u16) -> Result<()> {
        self.cols_hidden.insert(col);
        Ok(())
    }

    fn set_autofilter(
        &mut self,
        first_row: u32,
        first_col: u16,
        last_row: u32,
        last_col: u16,
    ) -> Result<()> {
        self.autofilter = Some((first_row, first_col, last_row, last_col));
        Ok(())
    }

    fn set_default_font(&mut self, n_cols: u16, font_name: &str) -> Result<()> {
        self.default_font = Some((n_cols, font_name.to_string()));
        Ok(())
    }

    fn finish(self) -> Result<MemorySheetSink> {
        Ok(self)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::derive_default_style_registry;

    #[test]
    fn test_restyle_keeps_value_and_fills_unwritten_cells() {
        let mut grid = SpecCellGrid::default();
        grid.put(1, 0, EnumCellValue::Number(3.0), EnumStyleTag::Integer);
        grid.restyle(1, 0, EnumStyleTag::Mask);
        grid.restyle(2, 0, EnumStyleTag::Mask);

        assert_eq!(
            grid.get(1, 0),
            Some(&(EnumCellValue::Number(3.0), EnumStyleTag::Mask))
        );
        assert_eq!(
            grid.get(2, 0),
            Some(&(EnumCellValue::None, EnumStyleTag::Mask))
        );
        assert_eq!(grid.len(), 2);
    }

    #[test]
    fn test_xlsx_sink_rejects_unregistered_styles() {
        let mut sink = XlsxSheetSink::new("Sheet1").unwrap();
        let value = EnumCellValue::String("a".to_string());
        sink.write_cell(0, 0, value, EnumStyleTag::Header).unwrap();
        let err = sink.finish().unwrap_err();
        assert!(matches!(err, XlsxConvertError::Assembly(_)));
    }

    #[test]
    fn test_xlsx_sink_serializes_zip_container() {
        let mut sink = XlsxSheetSink::new("Sheet1").unwrap();
        sink.register_styles(&derive_default_style_registry()).unwrap();
        sink.freeze_header().unwrap();
        let value_header = EnumCellValue::String("name".to_string());
        sink.write_cell(0, 0, value_header, EnumStyleTag::Header).unwrap();
        sink.write_cell(1, 0, EnumCellValue::Boolean(true), EnumStyleTag::Text).unwrap();
        sink.set_column_width(0, 12.5).unwrap();
        sink.set_autofilter(0, 0, 0, 0).unwrap();
        sink.set_default_font(1, "Aptos Narrow").unwrap();

        let v_bytes = sink.finish().unwrap();
        assert_eq!(&v_bytes[..2], b"PK");
    }

    #[test]
    fn test_xlsx_sink_rejects_invalid_sheet_name() {
        assert!(XlsxSheetSink::new("bad[name]").is_err());
    }
}
