//! Workbook ingestion.
//!
//! Turns the raw bytes of a historian export into a [`Dataset`]: the first
//! worksheet, a six-row banner, a header row, then data rows. Only the fixed
//! column window D..N is kept; column D is the timestamp column.
//!
//! This module has no side effects: it neither logs nor touches caller state.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, DataType, Range, Reader};
use thickener_core::models::{CellValue, Column, Dataset, Timestamp};
use thickener_core::schema::{ColumnSchema, FieldResolution};
use thickener_core::time_utils::{excel_serial_to_datetime, parse_timestamp};
use thickener_core::{Result, ThickenerError};

/// Banner rows above the header row.
pub const HEADER_ROWS_SKIPPED: u32 = 6;

/// Absolute index of the first retained column (column D).
pub const FIRST_COLUMN: u32 = 3;

/// Absolute index one past the last retained column (column N is kept).
pub const END_COLUMN: u32 = 14;

static EMPTY_CELL: Data = Data::Empty;

// ── Upload ────────────────────────────────────────────────────────────────────

/// A parsed workbook together with the schema fields it provides.
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub dataset: Dataset,
    pub fields: FieldResolution,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Parse workbook bytes (xlsx, xls, xlsb or ods) into a [`Dataset`].
pub fn parse_upload(bytes: &[u8]) -> Result<Dataset> {
    let range = first_sheet(bytes)?;
    build_dataset(&range)
}

/// Read a workbook from disk and parse it.
pub fn parse_upload_file(path: &Path) -> Result<Dataset> {
    let bytes = std::fs::read(path).map_err(|source| ThickenerError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_upload(&bytes)
}

/// Parse workbook bytes and report which schema fields the headers provide.
pub fn parse_upload_with_schema(bytes: &[u8], schema: &ColumnSchema) -> Result<Upload> {
    let dataset = parse_upload(bytes)?;
    let fields = schema.resolve(&dataset);
    Ok(Upload { dataset, fields })
}

// ── Workbook access ───────────────────────────────────────────────────────────

fn first_sheet(bytes: &[u8]) -> Result<Range<Data>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ThickenerError::Parse(e.to_string()))?;

    let name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ThickenerError::Parse("workbook has no worksheets".to_string()))?;

    workbook
        .worksheet_range(&name)
        .map_err(|e| ThickenerError::Parse(format!("cannot read sheet '{name}': {e}")))
}

fn build_dataset(range: &Range<Data>) -> Result<Dataset> {
    let (Some((_, first_col)), Some((last_row, last_col))) = (range.start(), range.end()) else {
        return Err(ThickenerError::Parse("first worksheet is empty".to_string()));
    };

    let header_row = HEADER_ROWS_SKIPPED;
    if last_row < header_row {
        return Err(ThickenerError::Parse(format!(
            "expected a header row after {HEADER_ROWS_SKIPPED} banner rows, found {} rows",
            last_row + 1
        )));
    }
    if last_col < FIRST_COLUMN {
        return Err(ThickenerError::Parse(format!(
            "expected at least {} columns, found {}",
            FIRST_COLUMN + 1,
            last_col + 1
        )));
    }

    let end_col = END_COLUMN.min(last_col + 1);
    let cell = |row: u32, col: u32| range.get_value((row, col)).unwrap_or(&EMPTY_CELL);

    let headers = unique_headers(
        (FIRST_COLUMN..end_col).map(|col| header_name(cell(header_row, col), col)),
    );

    let rows: Vec<u32> = ((header_row + 1)..=last_row)
        .filter(|&row| (first_col..=last_col).any(|col| !is_blank(cell(row, col))))
        .collect();

    let timestamps: Vec<Option<Timestamp>> = rows
        .iter()
        .map(|&row| to_timestamp(cell(row, FIRST_COLUMN)))
        .collect();

    let mut names = headers.into_iter();
    let timestamp_name = names.next().unwrap_or_else(|| header_fallback(FIRST_COLUMN));
    let mut dataset = Dataset::new(timestamp_name, timestamps);

    for (col, name) in ((FIRST_COLUMN + 1)..end_col).zip(names) {
        let values = rows.iter().map(|&row| to_cell_value(cell(row, col))).collect();
        dataset
            .push_column(Column::new(name, values))
            .map_err(|e| ThickenerError::Parse(e.to_string()))?;
    }

    Ok(dataset)
}

// ── Headers ───────────────────────────────────────────────────────────────────

fn header_fallback(col: u32) -> String {
    format!("Unnamed: {col}")
}

fn header_name(value: &Data, col: u32) -> String {
    let text = match value {
        Data::Empty | Data::Error(_) => String::new(),
        other => other.to_string(),
    };
    if text.trim().is_empty() {
        header_fallback(col)
    } else {
        text
    }
}

/// Suffix repeated names with `.1`, `.2`, ... in order of appearance. A
/// suffixed name that is itself taken is suffixed again (`A.1.1`).
fn unique_headers(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<String> = Vec::new();
    for mut name in names {
        let mut count = counts.get(&name).copied().unwrap_or(0);
        while count > 0 {
            counts.insert(name.clone(), count + 1);
            name = format!("{name}.{count}");
            count = counts.get(&name).copied().unwrap_or(0);
        }
        counts.insert(name.clone(), 1);
        out.push(name);
    }
    out
}

// ── Cell coercion ─────────────────────────────────────────────────────────────

fn is_blank(value: &Data) -> bool {
    match value {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn to_timestamp(value: &Data) -> Option<Timestamp> {
    match value {
        Data::DateTime(_) | Data::DateTimeIso(_) => value.as_datetime(),
        Data::String(s) => parse_timestamp(s),
        Data::Float(f) => excel_serial_to_datetime(*f),
        Data::Int(i) => excel_serial_to_datetime(*i as f64),
        _ => None,
    }
}

fn to_cell_value(value: &Data) -> CellValue {
    match value {
        Data::Float(f) => CellValue::from_number(Some(*f)),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                CellValue::Missing
            } else {
                match trimmed.parse::<f64>() {
                    Ok(v) => CellValue::from_number(Some(v)),
                    Err(_) => CellValue::Text(s.clone()),
                }
            }
        }
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(_) | Data::DateTimeIso(_) => match value.as_datetime() {
            Some(dt) => CellValue::Text(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => CellValue::Text(value.to_string()),
        },
        Data::Error(_) | Data::Empty => CellValue::Missing,
        other => CellValue::Text(other.to_string()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_xlsxwriter::{Format, Workbook};
    use tempfile::TempDir;

    const HEADERS: [&str; 11] = [
        "Date",
        "Underflow, kg/m3",
        "Tonnage, tph",
        "Flocculant, L/min",
        "Flocculant, m3/h",
        "Bed level, m",
        "Torque, %",
        "Overflow NTU",
        "Feed, m3/h",
        "pH",
        "Spare",
    ];

    // ── Fixtures ──────────────────────────────────────────────────────────────

    /// Historian-style sheet: banner, header at row 7, headers from column D,
    /// three junk columns before it and one extra column after N.
    fn historian_workbook(data_rows: &[(&str, [f64; 10])]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Plant historian export").unwrap();
        sheet.write_string(1, 0, "Thickener TK-01").unwrap();
        for (i, name) in ["Tag", "Area", "Unit"].iter().enumerate() {
            sheet.write_string(6, i as u16, *name).unwrap();
        }
        for (i, name) in HEADERS.iter().enumerate() {
            sheet.write_string(6, 3 + i as u16, *name).unwrap();
        }
        sheet.write_string(6, 14, "Outside").unwrap();

        for (r, (ts, values)) in data_rows.iter().enumerate() {
            let row = 7 + r as u32;
            sheet.write_string(row, 0, "TK-01").unwrap();
            sheet.write_string(row, 3, *ts).unwrap();
            for (i, v) in values.iter().enumerate() {
                sheet.write_number(row, 4 + i as u16, *v).unwrap();
            }
            sheet.write_number(row, 14, 999.0).unwrap();
        }
        workbook.save_to_buffer().unwrap()
    }

    fn sample_rows() -> Vec<(&'static str, [f64; 10])> {
        vec![
            ("2024-03-01 00:00:00", [1500.0, 500.0, 20.0, 1.2, 2.1, 40.0, 15.0, 300.0, 7.8, 0.0]),
            ("2024-03-01 01:00:00", [1520.0, 510.0, 21.0, 1.3, 2.2, 42.0, 14.0, 310.0, 7.9, 0.0]),
            ("2024-03-01 02:00:00", [1480.0, 490.0, 19.0, 1.1, 2.0, 41.0, 16.0, 290.0, 7.7, 0.0]),
        ]
    }

    fn ts(h: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    // ── Column window ─────────────────────────────────────────────────────────

    #[test]
    fn test_keeps_exactly_eleven_columns() {
        let dataset = parse_upload(&historian_workbook(&sample_rows())).expect("parse");

        assert_eq!(dataset.width(), 11);
        assert_eq!(dataset.column_names(), HEADERS.to_vec());
        assert_eq!(dataset.timestamp_column(), "Date");
        assert!(!dataset.has_column("Outside"));
        assert!(!dataset.has_column("Tag"));
    }

    #[test]
    fn test_reads_rows_and_values() {
        let dataset = parse_upload(&historian_workbook(&sample_rows())).expect("parse");

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.timestamps(), &[Some(ts(0)), Some(ts(1)), Some(ts(2))]);
        let tonnage = dataset.column("Tonnage, tph").unwrap();
        assert_eq!(tonnage.numbers(), vec![Some(500.0), Some(510.0), Some(490.0)]);
    }

    #[test]
    fn test_narrow_sheet_keeps_available_columns() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "banner").unwrap();
        sheet.write_string(6, 3, "Date").unwrap();
        sheet.write_string(6, 4, "Tonnage, tph").unwrap();
        sheet.write_string(7, 3, "2024-03-01 00:00").unwrap();
        sheet.write_number(7, 4, 480.0).unwrap();
        let dataset = parse_upload(&workbook.save_to_buffer().unwrap()).expect("parse");

        assert_eq!(dataset.column_names(), vec!["Date", "Tonnage, tph"]);
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn test_header_only_sheet_is_empty_dataset() {
        let dataset = parse_upload(&historian_workbook(&[])).expect("parse");
        assert!(dataset.is_empty());
        assert_eq!(dataset.width(), 11);
    }

    // ── Headers ───────────────────────────────────────────────────────────────

    #[test]
    fn test_blank_and_duplicate_headers() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "banner").unwrap();
        sheet.write_string(6, 3, "Date").unwrap();
        sheet.write_string(6, 4, "Torque, %").unwrap();
        sheet.write_string(6, 6, "Torque, %").unwrap();
        sheet.write_string(6, 7, "Torque, %").unwrap();
        sheet.write_string(7, 3, "2024-03-01").unwrap();
        sheet.write_number(7, 5, 1.0).unwrap();
        let dataset = parse_upload(&workbook.save_to_buffer().unwrap()).expect("parse");

        assert_eq!(
            dataset.column_names(),
            vec!["Date", "Torque, %", "Unnamed: 5", "Torque, %.1", "Torque, %.2"]
        );
    }

    #[test]
    fn test_unique_headers_avoids_existing_suffix() {
        let names = ["A", "A.1", "A"].iter().map(|s| s.to_string());
        assert_eq!(unique_headers(names), vec!["A", "A.1", "A.1.1"]);
    }

    #[test]
    fn test_unique_headers_suffix_collides_with_later_header() {
        let names = ["Date", "A", "A", "A.1"].iter().map(|s| s.to_string());
        assert_eq!(unique_headers(names), vec!["Date", "A", "A.1", "A.1.1"]);
    }

    #[test]
    fn test_suffixed_header_matching_later_header_is_accepted() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "banner").unwrap();
        for (i, name) in ["Date", "A", "A", "A.1"].iter().enumerate() {
            sheet.write_string(6, 3 + i as u16, *name).unwrap();
        }
        sheet.write_string(7, 3, "2024-03-01").unwrap();
        for col in 4..7 {
            sheet.write_number(7, col, f64::from(col)).unwrap();
        }
        let dataset = parse_upload(&workbook.save_to_buffer().unwrap()).expect("parse");

        assert_eq!(dataset.column_names(), vec!["Date", "A", "A.1", "A.1.1"]);
        assert_eq!(dataset.column("A.1.1").unwrap().numbers(), vec![Some(6.0)]);
    }

    // ── Cell coercion ─────────────────────────────────────────────────────────

    #[test]
    fn test_unparsable_timestamps_become_missing() {
        let mut rows = sample_rows();
        rows[1].0 = "shift change";
        let dataset = parse_upload(&historian_workbook(&rows)).expect("parse");

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.timestamps()[1], None);
        assert_eq!(dataset.valid_row_count(), 2);
    }

    #[test]
    fn test_date_formatted_cells_and_serials() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        let date_format = Format::new().set_num_format("yyyy-mm-dd hh:mm");
        sheet.write_string(0, 0, "banner").unwrap();
        sheet.write_string(6, 3, "Date").unwrap();
        sheet.write_string(6, 4, "Bed level, m").unwrap();
        // 45352 is 2024-03-01.
        sheet
            .write_number_with_format(7, 3, 45352.25, &date_format)
            .unwrap();
        sheet.write_number(7, 4, 2.0).unwrap();
        sheet.write_number(8, 3, 45352.5).unwrap();
        sheet.write_number(8, 4, 2.5).unwrap();
        let dataset = parse_upload(&workbook.save_to_buffer().unwrap()).expect("parse");

        assert_eq!(dataset.timestamps(), &[Some(ts(6)), Some(ts(12))]);
    }

    #[test]
    fn test_measurement_coercion() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "banner").unwrap();
        sheet.write_string(6, 3, "Date").unwrap();
        sheet.write_string(6, 4, "Tonnage, tph").unwrap();
        sheet.write_string(6, 5, "Status").unwrap();
        for h in 0..4u32 {
            sheet
                .write_string(7 + h, 3, &format!("2024-03-01 0{h}:00"))
                .unwrap();
        }
        sheet.write_number(7, 4, 500.0).unwrap();
        sheet.write_string(8, 4, " 510.5 ").unwrap();
        // Row 9 leaves the tonnage cell empty.
        sheet.write_string(10, 4, "").unwrap();
        sheet.write_string(7, 5, "RUN").unwrap();
        sheet.write_boolean(8, 5, true).unwrap();
        sheet.write_number(9, 5, 3.0).unwrap();
        let dataset = parse_upload(&workbook.save_to_buffer().unwrap()).expect("parse");

        let tonnage = dataset.column("Tonnage, tph").unwrap();
        assert_eq!(
            tonnage.values,
            vec![
                CellValue::Number(500.0),
                CellValue::Number(510.5),
                CellValue::Missing,
                CellValue::Missing,
            ]
        );
        assert!(tonnage.is_numeric());

        let status = dataset.column("Status").unwrap();
        assert_eq!(status.values[0], CellValue::Text("RUN".to_string()));
        assert_eq!(status.values[1], CellValue::Text("true".to_string()));
        assert_eq!(status.values[2], CellValue::Number(3.0));
        assert!(!status.is_numeric());
    }

    #[test]
    fn test_blank_rows_are_skipped() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "banner").unwrap();
        sheet.write_string(6, 3, "Date").unwrap();
        sheet.write_string(6, 4, "Tonnage, tph").unwrap();
        sheet.write_string(7, 3, "2024-03-01 00:00").unwrap();
        sheet.write_number(7, 4, 500.0).unwrap();
        sheet.write_string(9, 3, "2024-03-01 02:00").unwrap();
        sheet.write_number(9, 4, 490.0).unwrap();
        let dataset = parse_upload(&workbook.save_to_buffer().unwrap()).expect("parse");

        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.timestamps(), &[Some(ts(0)), Some(ts(2))]);
    }

    // ── Errors ────────────────────────────────────────────────────────────────

    #[test]
    fn test_garbage_bytes_are_parse_error() {
        let err = parse_upload(b"definitely not a workbook").unwrap_err();
        assert!(matches!(err, ThickenerError::Parse(_)));
    }

    #[test]
    fn test_sheet_without_header_row_is_parse_error() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "banner only").unwrap();
        sheet.write_string(3, 5, "still banner").unwrap();
        let err = parse_upload(&workbook.save_to_buffer().unwrap()).unwrap_err();
        assert!(matches!(err, ThickenerError::Parse(_)));
    }

    #[test]
    fn test_sheet_without_timestamp_column_is_parse_error() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for row in 0..10 {
            sheet.write_number(row, 0, row as f64).unwrap();
            sheet.write_number(row, 2, row as f64).unwrap();
        }
        let err = parse_upload(&workbook.save_to_buffer().unwrap()).unwrap_err();
        assert!(matches!(err, ThickenerError::Parse(_)));
    }

    #[test]
    fn test_parse_upload_file_missing_path() {
        let tmp = TempDir::new().expect("tempdir");
        let err = parse_upload_file(&tmp.path().join("absent.xlsx")).unwrap_err();
        assert!(matches!(err, ThickenerError::FileRead { .. }));
    }

    #[test]
    fn test_parse_upload_file_reads_from_disk() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("export.xlsx");
        std::fs::write(&path, historian_workbook(&sample_rows())).unwrap();

        let dataset = parse_upload_file(&path).expect("parse");
        assert_eq!(dataset.len(), 3);
    }

    // ── Schema ────────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_upload_with_schema_resolves_fields() {
        let upload = parse_upload_with_schema(
            &historian_workbook(&sample_rows()),
            &ColumnSchema::default(),
        )
        .expect("parse");

        assert_eq!(upload.fields.missing, vec![]);
        assert_eq!(upload.fields.found.len(), 4);
        assert_eq!(upload.dataset.len(), 3);
    }
}
