use std::io::{Cursor, Read};

use sheetkit_io_xlsx::{
    EnumCellValue, EnumColumnType, EnumColumnVisibility, EnumPartitionStrategy, EnumRawValue,
    EnumStyleTag, MemorySheetSink, SpecColumn, SpecRecord, SpecXlsxConvertOptions,
    XlsxConvertError, XlsxRecordWriter, convert_records_to_xlsx, read_records_from_xlsx_bytes,
    read_records_from_xlsx_path, save_records_to_xlsx,
};

fn read_zip_entry(v_bytes: &[u8], c_name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(v_bytes)).expect("zip open");
    let mut entry = archive.by_name(c_name).expect("zip entry");
    let mut c_xml = String::new();
    entry.read_to_string(&mut c_xml).expect("read entry");
    c_xml
}

fn build_people(n_rows: usize) -> Vec<SpecRecord> {
    (0..n_rows)
        .map(|n_idx| {
            let mut record = SpecRecord::new();
            let c_score = format!("{}.5", n_idx % 97);
            record.insert("score".to_string(), EnumRawValue::from(c_score));
            let c_name = format!("person-{n_idx}");
            record.insert("name".to_string(), EnumRawValue::from(c_name));
            if n_idx % 7 != 0 {
                let c_age = (n_idx % 90).to_string();
                record.insert("age".to_string(), EnumRawValue::from(c_age));
            }
            record.insert("joined".to_string(), EnumRawValue::from("2024-01-15 09:30"));
            record
        })
        .collect()
}

fn build_people_columns() -> Vec<SpecColumn> {
    vec![
        SpecColumn::new("name", EnumColumnType::String),
        SpecColumn::new("age", EnumColumnType::Integer),
        SpecColumn::new("score", EnumColumnType::Float),
        SpecColumn::new("joined", EnumColumnType::DateTime),
        SpecColumn::new("note", EnumColumnType::String)
            .with_visibility(EnumColumnVisibility::Hidden),
    ]
}

fn write_into_memory(
    records: &[SpecRecord],
    columns: &[SpecColumn],
    options: SpecXlsxConvertOptions,
) -> (MemorySheetSink, sheetkit_io_xlsx::SpecXlsxReport) {
    let writer = XlsxRecordWriter::new(options).unwrap();
    let mut sink = MemorySheetSink::default();
    let report = writer.write_records(&mut sink, records, columns).unwrap();
    (sink, report)
}

fn sequential_options() -> SpecXlsxConvertOptions {
    SpecXlsxConvertOptions {
        threshold_rows_parallel: usize::MAX,
        ..Default::default()
    }
}

fn parallel_options(threshold_rows_parallel: usize) -> SpecXlsxConvertOptions {
    SpecXlsxConvertOptions {
        threshold_rows_parallel,
        num_workers_max: Some(4),
        ..Default::default()
    }
}

#[test]
fn test_sequential_and_parallel_paths_produce_identical_sheets() {
    let columns = build_people_columns();
    for n_rows in [99, 100, 101, 257] {
        let records = build_people(n_rows);

        let (sink_seq, report_seq) = write_into_memory(&records, &columns, sequential_options());
        let (sink_par, report_par) = write_into_memory(&records, &columns, parallel_options(100));

        assert_eq!(report_seq.strategy, EnumPartitionStrategy::Sequential);
        let strategy_expected = if n_rows > 100 {
            EnumPartitionStrategy::Parallel
        } else {
            EnumPartitionStrategy::Sequential
        };
        assert_eq!(report_par.strategy, strategy_expected, "n_rows={n_rows}");
        assert_eq!(sink_seq, sink_par, "n_rows={n_rows}");
    }
}

#[test]
fn test_default_threshold_boundary() {
    let columns = vec![SpecColumn::new("name", EnumColumnType::String)];
    let records_at = build_people(10_000);
    let records_above = build_people(10_001);

    let (_, report_at) = write_into_memory(&records_at, &columns, Default::default());
    let (sink_above, report_above) =
        write_into_memory(&records_above, &columns, Default::default());
    let (sink_above_seq, _) = write_into_memory(&records_above, &columns, sequential_options());

    assert_eq!(report_at.strategy, EnumPartitionStrategy::Sequential);
    assert_eq!(report_above.strategy, EnumPartitionStrategy::Parallel);
    assert_eq!(sink_above, sink_above_seq);
}

#[test]
fn test_fifteen_thousand_records_take_parallel_path() {
    let columns = build_people_columns();
    let records = build_people(15_000);
    let options = SpecXlsxConvertOptions {
        num_workers_max: Some(8),
        ..Default::default()
    };

    let (sink, report) = write_into_memory(&records, &columns, options.clone());

    assert_eq!(report.strategy, EnumPartitionStrategy::Parallel);
    assert_eq!(report.n_batches, 8);
    assert_eq!(
        sink.grid.get(10_000, 0),
        Some(&(
            EnumCellValue::String("person-9999".to_string()),
            EnumStyleTag::Text
        ))
    );
    assert_eq!(sink.grid.get(15_001, 0), None);

    let (v_bytes, _) = convert_records_to_xlsx(&records, &columns, options).unwrap();
    let l_read = read_records_from_xlsx_bytes(&v_bytes).unwrap();
    assert_eq!(l_read.len(), 15_000);
    assert_eq!(l_read[9_999]["name"], "person-9999");
}

#[test]
fn test_unparsable_integer_fails_the_conversion() {
    let columns = vec![
        SpecColumn::new("name", EnumColumnType::String),
        SpecColumn::new("age", EnumColumnType::Integer),
    ];
    let mut record = SpecRecord::new();
    record.insert("name".to_string(), EnumRawValue::from("Ann"));
    record.insert("age".to_string(), EnumRawValue::from("x"));

    let err = convert_records_to_xlsx(&[record], &columns, Default::default()).unwrap_err();

    match err {
        XlsxConvertError::Coercion {
            column,
            raw_value,
            target,
            ..
        } => {
            assert_eq!(column, "age");
            assert_eq!(raw_value, "x");
            assert_eq!(target, EnumColumnType::Integer);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_single_bad_value_fails_both_paths() {
    let columns = build_people_columns();
    for (c_key, c_bad) in [("age", "4O"), ("score", "1,5"), ("joined", "2024-13-01 00:00")] {
        let mut records = build_people(300);
        records[211].insert(c_key.to_string(), EnumRawValue::from(c_bad));

        for options in [sequential_options(), parallel_options(10)] {
            let writer = XlsxRecordWriter::new(options).unwrap();
            let mut sink = MemorySheetSink::default();
            let err = writer
                .write_records(&mut sink, &records, &columns)
                .unwrap_err();
            match err {
                XlsxConvertError::Coercion {
                    column,
                    raw_value,
                    row_idx,
                    ..
                } => {
                    assert_eq!(column, c_key);
                    assert_eq!(raw_value, c_bad);
                    assert_eq!(row_idx, 211);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }
}

#[test]
fn test_rows_follow_input_and_columns_follow_schema() {
    let columns = build_people_columns();
    let records = build_people(20);

    let (sink, report) = write_into_memory(&records, &columns, Default::default());

    assert_eq!(report.n_rows_data, 20);
    assert_eq!(report.n_cols, 5);
    for (col_idx, column) in columns.iter().enumerate() {
        let (value, _) = sink.grid.get(0, col_idx as u16).unwrap();
        assert_eq!(value, &EnumCellValue::String(column.name.clone()));
    }
    assert_eq!(
        sink.grid.get(8, 1),
        Some(&(EnumCellValue::None, EnumStyleTag::Integer))
    );
    assert_eq!(
        sink.grid.get(9, 1),
        Some(&(EnumCellValue::Number(8.0), EnumStyleTag::Integer))
    );
    assert_eq!(
        sink.grid.get(9, 2),
        Some(&(EnumCellValue::Number(8.5), EnumStyleTag::Float))
    );
}

#[test]
fn test_hidden_columns_are_hidden_and_masked() {
    let columns = build_people_columns();
    let records = build_people(12);

    let (sink, report) = write_into_memory(&records, &columns, Default::default());

    assert_eq!(report.cols_hidden, vec!["note".to_string()]);
    assert_eq!(sink.cols_hidden.iter().copied().collect::<Vec<_>>(), vec![4]);
    for row in 0..=12u32 {
        let (_, style) = sink.grid.get(row, 4).unwrap();
        assert_eq!(*style, EnumStyleTag::Mask);
    }
    let (_, style_visible) = sink.grid.get(3, 0).unwrap();
    assert_eq!(*style_visible, EnumStyleTag::Text);
}

#[test]
fn test_percentage_value_is_stored_unchanged() {
    let columns = vec![SpecColumn::new("rate", EnumColumnType::Percentage)];
    let mut record = SpecRecord::new();
    record.insert("rate".to_string(), EnumRawValue::from(0.5));
    let records = vec![record];

    let (sink, _) = write_into_memory(&records, &columns, Default::default());
    assert_eq!(
        sink.grid.get(1, 0),
        Some(&(EnumCellValue::Number(0.5), EnumStyleTag::Percentage))
    );

    let (v_bytes, _) = convert_records_to_xlsx(&records, &columns, Default::default()).unwrap();
    let l_read = read_records_from_xlsx_bytes(&v_bytes).unwrap();
    assert_eq!(l_read[0]["rate"], "0.5");
}

#[test]
fn test_string_records_round_trip() {
    let columns = vec![
        SpecColumn::new("city", EnumColumnType::String),
        SpecColumn::new("code", EnumColumnType::String),
    ];
    let records: Vec<SpecRecord> = [("Oslo", "0150"), ("Lima", ""), ("Pune", "411001")]
        .iter()
        .map(|(c_city, c_code)| {
            let mut record = SpecRecord::new();
            record.insert("code".to_string(), EnumRawValue::from(*c_code));
            record.insert("city".to_string(), EnumRawValue::from(*c_city));
            record
        })
        .collect();

    let (v_bytes, _) = convert_records_to_xlsx(&records, &columns, Default::default()).unwrap();
    let l_read = read_records_from_xlsx_bytes(&v_bytes).unwrap();

    assert_eq!(l_read.len(), 3);
    for (record_in, record_out) in records.iter().zip(&l_read) {
        for column in &columns {
            assert_eq!(
                EnumRawValue::from(record_out[&column.name].as_str()),
                record_in[&column.name]
            );
        }
        assert_eq!(
            record_out.keys().collect::<Vec<_>>(),
            vec!["city", "code"]
        );
    }
}

#[test]
fn test_typed_values_read_back_as_text() {
    let columns = build_people_columns();
    let mut records = build_people(2);
    records[1].insert("joined".to_string(), EnumRawValue::from("2023-06-30 00:00"));

    let (v_bytes, _) = convert_records_to_xlsx(&records, &columns, Default::default()).unwrap();
    let l_read = read_records_from_xlsx_bytes(&v_bytes).unwrap();

    assert_eq!(l_read[0]["age"], "");
    assert_eq!(l_read[1]["age"], "1");
    assert_eq!(l_read[1]["score"], "1.5");
    assert_eq!(l_read[0]["joined"], "2024-01-15 09:30");
    assert_eq!(l_read[1]["joined"], "2023-06-30");
    assert_eq!(l_read[0]["note"], "");
}

#[test]
fn test_save_and_read_through_file_path() {
    let dir = tempfile::tempdir().unwrap();
    let path_xlsx = dir.path().join("people.xlsx");
    let columns = build_people_columns();
    let records = build_people(5);

    let report = save_records_to_xlsx(&path_xlsx, &records, &columns, Default::default()).unwrap();
    let l_read = read_records_from_xlsx_path(&path_xlsx).unwrap();

    assert_eq!(report.n_rows_data, 5);
    assert_eq!(l_read.len(), 5);
    assert_eq!(l_read[4]["name"], "person-4");
}

#[test]
fn test_empty_records_are_rejected() {
    let columns = build_people_columns();
    let err = convert_records_to_xlsx(&[], &columns, Default::default()).unwrap_err();
    assert!(matches!(err, XlsxConvertError::Validation(_)));
}

#[test]
fn test_early_1900_datetimes_read_back_unchanged() {
    let columns = vec![SpecColumn::new("joined", EnumColumnType::DateTime)];
    let l_cases = [
        ("1900-01-01 00:00", "1900-01-01"),
        ("1900-02-15 12:00", "1900-02-15 12:00"),
        ("1900-03-01 00:00", "1900-03-01"),
        ("2024-01-15 09:30", "2024-01-15 09:30"),
    ];
    let records: Vec<SpecRecord> = l_cases
        .iter()
        .map(|(c_in, _)| {
            let mut record = SpecRecord::new();
            record.insert("joined".to_string(), EnumRawValue::from(*c_in));
            record
        })
        .collect();

    let (v_bytes, _) = convert_records_to_xlsx(&records, &columns, Default::default()).unwrap();
    let l_read = read_records_from_xlsx_bytes(&v_bytes).unwrap();

    assert_eq!(l_read.len(), l_cases.len());
    for (record_out, (c_in, c_expected)) in l_read.iter().zip(l_cases) {
        assert_eq!(record_out["joined"], c_expected, "input={c_in}");
    }
}

#[test]
fn test_serialized_sheet_carries_layout() {
    let columns = vec![
        SpecColumn::new("name", EnumColumnType::String),
        SpecColumn::new("secret", EnumColumnType::String)
            .with_visibility(EnumColumnVisibility::AlwaysHidden),
    ];
    let mut record = SpecRecord::new();
    record.insert("name".to_string(), EnumRawValue::from("Ann"));
    record.insert("secret".to_string(), EnumRawValue::from("s3"));

    let (v_bytes, _) = convert_records_to_xlsx(&[record], &columns, Default::default()).unwrap();
    let c_sheet = read_zip_entry(&v_bytes, "xl/worksheets/sheet1.xml");
    let c_styles = read_zip_entry(&v_bytes, "xl/styles.xml");

    assert!(c_sheet.contains(r#"hidden="1""#));
    assert!(c_sheet.contains(r#"<autoFilter ref="A1:B1"/>"#));
    assert!(c_sheet.contains(r#"ySplit="1""#));
    assert!(c_styles.contains("FFFF00FF"));
}
