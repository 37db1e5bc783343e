// src/tabular.rs
use std::fs::File;
use std::path::Path;

use calamine::{open_workbook, Data, DataType, Reader, Xlsx};
use csv::ReaderBuilder;

use crate::data_types::TableData;
use crate::error::ParseError;
use crate::spss;

/// Read a delimited text file. The first record is the header row; fully
/// blank records are dropped; cells equal to `na_marker` are blanked.
pub fn parse_delimited(
    path: &Path,
    separator: u8,
    na_marker: Option<&str>,
) -> Result<TableData, ParseError> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(separator)
        .flexible(true)
        .from_reader(file);

    let mut data = TableData::empty();
    data.headers = reader.headers()?.iter().map(String::from).collect();

    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        data.rows
            .push(record.iter().map(|field| apply_na(field, na_marker)).collect());
    }

    Ok(data)
}

/// Enumerate the sheet names of an `.xlsx` workbook, in workbook order.
pub fn sheet_names(path: &Path) -> Result<Vec<String>, ParseError> {
    let workbook: Xlsx<_> = open_workbook(path)?;
    Ok(workbook.sheet_names().to_vec())
}

/// Read one sheet of an `.xlsx` workbook. The first `skip_rows` rows are
/// discarded, the next row becomes the header.
pub fn parse_spreadsheet(
    path: &Path,
    sheet_name: &str,
    skip_rows: usize,
    na_marker: Option<&str>,
) -> Result<TableData, ParseError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let index = workbook
        .sheet_names()
        .iter()
        .position(|name| name == sheet_name)
        .ok_or_else(|| ParseError::SheetNotFound(sheet_name.to_string()))?;
    let range = workbook
        .worksheet_range_at(index)
        .ok_or_else(|| ParseError::SheetNotFound(sheet_name.to_string()))??;

    let mut data = TableData::empty();
    let mut rows = range.rows().skip(skip_rows);
    let Some(header_row) = rows.next() else {
        return Ok(data);
    };
    data.headers = header_row.iter().map(cell_to_string).collect();

    for row in rows {
        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        data.rows
            .push(row.iter().map(|cell| apply_na(&cell_to_string(cell), na_marker)).collect());
    }

    Ok(data)
}

/// Read an SPSS `.sav` system file. No configurable options.
pub fn parse_stat_package(path: &Path) -> Result<TableData, ParseError> {
    Ok(spss::read_sav(path)?)
}

fn cell_to_string(cell: &Data) -> String {
    cell.as_string()
        .map(|s| s.to_string())
        .unwrap_or_else(|| format!("{}", cell))
}

fn apply_na(field: &str, na_marker: Option<&str>) -> String {
    match na_marker {
        Some(marker) if field == marker => String::new(),
        _ => field.to_string(),
    }
}
