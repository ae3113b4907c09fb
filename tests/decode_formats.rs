#[path = "../src/decode.rs"]
mod decode;

use decode::{decode, DecodeError, SourceFormat};
use rust_xlsxwriter::{Format, Workbook};
use std::io::Cursor;

fn roster_xlsx() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let date = Format::new().set_num_format("yyyy-mm-dd");
    let sheet = workbook.add_worksheet();
    for (col, header) in ["Student ID", "First Name", "Last Name", "Year Level", "Date of Birth"]
        .iter()
        .enumerate()
    {
        sheet
            .write_string(1, col as u16, *header)
            .expect("header cell");
    }
    sheet.write_number(2, 0, 20240001.0).expect("id");
    sheet.write_string(2, 1, " Ann ").expect("first");
    sheet.write_string(2, 2, "Lee").expect("last");
    sheet.write_number(2, 3, 2.0).expect("level");
    sheet
        .write_number_with_format(2, 4, 45000.0, &date)
        .expect("dob");
    sheet.write_string(4, 0, "S-2").expect("id");
    sheet.write_string(4, 1, "Bo").expect("first");
    sheet.write_string(4, 2, "Kim").expect("last");
    sheet.write_boolean(4, 3, true).expect("flag");
    workbook.save_to_buffer().expect("xlsx buffer")
}

#[test]
fn csv_rows_match_data_rows_in_order() {
    let mut text = String::from("Student ID,First Name,Last Name\n");
    for i in 1..=25 {
        text.push_str(&format!("S-{i},First{i},Last{i}\n"));
    }
    let decoded = decode(Cursor::new(text), "Roster.CSV").expect("decode");
    assert_eq!(decoded.format, SourceFormat::Csv);
    assert_eq!(decoded.rows.len(), 25);
    for (i, row) in decoded.rows.iter().enumerate() {
        assert_eq!(row.get("Student ID"), Some(format!("S-{}", i + 1).as_str()));
        assert_eq!(row.line(), i + 2);
    }
    assert!(decoded.failures.is_empty());
}

#[test]
fn decoding_identical_bytes_twice_is_identical() {
    let bytes = b"id,first,last,email\nS-1,Ann,Lee,a@b.co\nS-2,Bo,Kim\n".to_vec();
    let a = decode(Cursor::new(bytes.clone()), "r.csv").expect("first");
    let b = decode(Cursor::new(bytes), "r.csv").expect("second");
    assert_eq!(a, b);

    let xlsx = roster_xlsx();
    let a = decode(Cursor::new(xlsx.clone()), "r.xlsx").expect("first xlsx");
    let b = decode(Cursor::new(xlsx), "r.xlsx").expect("second xlsx");
    assert_eq!(a.rows, b.rows);
}

#[test]
fn spreadsheet_cells_are_coerced_to_text() {
    let decoded = decode(Cursor::new(roster_xlsx()), "roster.XLSX").expect("decode");
    assert_eq!(decoded.format, SourceFormat::Spreadsheet);
    assert_eq!(
        &*decoded.headers,
        &["Student ID", "First Name", "Last Name", "Year Level", "Date of Birth"]
    );
    assert_eq!(decoded.rows.len(), 2);

    let first = &decoded.rows[0];
    assert_eq!(first.line(), 3);
    assert_eq!(first.get("student id"), Some("20240001"));
    assert_eq!(first.get("First Name"), Some("Ann"));
    assert_eq!(first.get("Year Level"), Some("2"));
    assert_eq!(first.get("Date of Birth"), Some("2023-03-15"));

    let second = &decoded.rows[1];
    assert_eq!(second.line(), 5);
    assert_eq!(second.get("Year Level"), Some("true"));
    assert_eq!(second.non_blank("Date of Birth"), None);
}

#[test]
fn empty_workbook_reports_missing_header() {
    let mut workbook = Workbook::new();
    workbook.add_worksheet();
    let bytes = workbook.save_to_buffer().expect("xlsx buffer");
    let err = decode(Cursor::new(bytes), "empty.xlsx").expect_err("empty");
    assert!(matches!(err, DecodeError::MissingHeader(_)));
    assert_eq!(err.to_string(), "Excel file is empty or contains no data.");
}

#[test]
fn corrupt_workbook_is_malformed() {
    let err = decode(Cursor::new(b"not a zip".to_vec()), "broken.xlsx").expect_err("corrupt");
    assert!(matches!(
        err,
        DecodeError::Malformed {
            format: SourceFormat::Spreadsheet,
            ..
        }
    ));
    assert!(err.to_string().starts_with("Error parsing Excel file: "));
}

#[test]
fn header_only_csv_has_no_rows() {
    let decoded = decode(Cursor::new("id,first,last\n"), "r.csv").expect("decode");
    assert!(decoded.rows.is_empty());
    assert_eq!(decoded.headers.len(), 3);
}
