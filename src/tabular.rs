//! Tabular file reading and writing for uploaded statements, historical
//! backfills and downloadable reports.
//!
//! Everything is read into a [`Table`] of text cells. Typing happens later, in
//! [`crate::ingestion`], so that a bad cell becomes a coercion warning rather
//! than a parse failure.

use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Reader, Sheets};
use chrono::NaiveDateTime;
use log::{debug, info};
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::schema::SaleRecord;
use crate::utils::{excel_serial_to_date, normalize_header};

/// Column order used for every sale export.
pub const SALE_COLUMNS: [&str; 10] = [
    "id",
    "customer_name",
    "policy_number",
    "premium",
    "carrier",
    "effective_date",
    "date_of_sale",
    "agent_name",
    "notes",
    "status",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the column whose header matches `name`, ignoring case, spaces
    /// and underscores.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let wanted = normalize_header(name);
        self.headers
            .iter()
            .position(|h| normalize_header(h) == wanted)
    }

    pub fn policy_column(&self, config: &TrackerConfig) -> Option<usize> {
        self.headers.iter().position(|h| config.is_policy_header(h))
    }

    /// Like [`Table::policy_column`] but a missing column is a malformed upload.
    pub fn require_policy_column(&self, config: &TrackerConfig) -> Result<usize> {
        self.policy_column(config).ok_or_else(|| {
            TrackerError::malformed(format!(
                "no policy number column among headers [{}]",
                self.headers.join(", ")
            ))
        })
    }

    /// Cell text, or `""` for short rows.
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn from_records(records: &[SaleRecord]) -> Self {
        let headers = SALE_COLUMNS.iter().map(|c| c.to_string()).collect();
        let rows = records
            .iter()
            .map(|r| {
                let d = &r.details;
                vec![
                    r.id.to_string(),
                    d.customer_name.clone(),
                    d.policy_number.clone(),
                    format!("{:.2}", d.premium_amount()),
                    d.carrier.clone(),
                    format_date(d.effective_date),
                    format_date(d.date_of_sale),
                    d.agent_name.clone(),
                    d.notes.clone(),
                    d.status.to_string(),
                ]
            })
            .collect();
        Self { headers, rows }
    }
}

fn format_date(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Readers
// ---------------------------------------------------------------------------

pub fn read_csv<R: Read>(reader: R) -> Result<Table> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|e| TrackerError::malformed(format!("unreadable CSV header: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(TrackerError::malformed("CSV file has no header row"));
    }

    let mut rows = Vec::new();
    for (idx, record) in csv_reader.records().enumerate() {
        let record = record
            .map_err(|e| TrackerError::malformed(format!("CSV row {}: {e}", idx + 1)))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    debug!("Read CSV table with {} columns and {} rows", headers.len(), rows.len());
    Ok(Table { headers, rows })
}

pub fn read_csv_path(path: &Path) -> Result<Table> {
    let file = std::fs::File::open(path)?;
    read_csv(file)
}

/// Reads the first worksheet of an Excel workbook; the first row is the header.
pub fn read_xlsx_path(path: &Path) -> Result<Table> {
    let workbook = open_workbook_auto(path)
        .map_err(|e| TrackerError::malformed(format!("failed to open workbook: {e}")))?;
    table_from_workbook(workbook)
}

pub fn read_xlsx_bytes(bytes: &[u8]) -> Result<Table> {
    let workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| TrackerError::malformed(format!("failed to open workbook: {e}")))?;
    table_from_workbook(workbook)
}

/// Dispatches on the file extension.
pub fn read_path(path: &Path) -> Result<Table> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "csv" | "txt" => read_csv_path(path),
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_xlsx_path(path),
        other => Err(TrackerError::malformed(format!(
            "unsupported file type '{other}'"
        ))),
    }
}

fn table_from_workbook<RS: Read + Seek>(mut workbook: Sheets<RS>) -> Result<Table> {
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| TrackerError::malformed("workbook contains no sheets"))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| TrackerError::malformed(format!("failed to read sheet '{sheet_name}': {e}")))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(cell_text).collect(),
        None => return Err(TrackerError::malformed(format!("sheet '{sheet_name}' is empty"))),
    };

    let rows: Vec<Vec<String>> = rows
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect();

    debug!(
        "Read sheet '{}' with {} columns and {} rows",
        sheet_name,
        headers.len(),
        rows.len()
    );
    Ok(Table { headers, rows })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        // Integral floats are usually ids or policy numbers typed as numbers
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) => s.clone(),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

pub fn write_csv(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| TrackerError::IoError(e.into_error()))
}

/// Renders the table as a single-sheet workbook. The `premium` column is
/// written as numbers, everything else as text.
pub fn write_xlsx(table: &Table) -> Result<Vec<u8>> {
    let premium_col = table.column_index("premium");
    let mut workbook = Workbook::new();

    {
        let worksheet = workbook.add_worksheet();
        for (col, header) in table.headers.iter().enumerate() {
            worksheet
                .write_string(0, col as u16, header)
                .map_err(|e| TrackerError::Spreadsheet(e.to_string()))?;
        }

        for (row_idx, row) in table.rows.iter().enumerate() {
            let xl_row = row_idx as u32 + 1;
            for (col, value) in row.iter().enumerate() {
                let number = if Some(col) == premium_col {
                    value.parse::<f64>().ok()
                } else {
                    None
                };
                let written = match number {
                    Some(n) => worksheet.write_number(xl_row, col as u16, n),
                    None => worksheet.write_string(xl_row, col as u16, value),
                };
                written.map_err(|e| TrackerError::Spreadsheet(e.to_string()))?;
            }
        }
    }

    workbook
        .save_to_buffer()
        .map_err(|e| TrackerError::Spreadsheet(e.to_string()))
}

/// Writes an uploaded historical table next to other archives as
/// `backup_historical_YYYYMMDD_HHMMSS.csv` and returns the path.
pub fn archive_table(table: &Table, dir: &Path, at: NaiveDateTime) -> Result<PathBuf> {
    let path = dir.join(format!(
        "backup_historical_{}.csv",
        at.format("%Y%m%d_%H%M%S")
    ));
    std::fs::write(&path, write_csv(table)?)?;
    info!("Archived {} historical rows to {}", table.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SaleDetails, SaleId};
    use chrono::NaiveDate;

    #[test]
    fn test_read_csv_keeps_raw_text() {
        let data = "Policy Number,premium,date_of_sale\n P100 ,1200,2024-03-01\nP200,abc,\n";
        let table = read_csv(data.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["Policy Number", "premium", "date_of_sale"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 0), " P100 ");
        assert_eq!(table.cell(1, 1), "abc");
        assert_eq!(table.cell(1, 2), "");
        assert_eq!(table.cell(5, 5), "");
    }

    #[test]
    fn test_read_csv_short_rows_are_tolerated() {
        let data = "policy_number,premium,notes\nP1\nP2,10,ok\n";
        let table = read_csv(data.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(0, 2), "");
        assert_eq!(table.cell(1, 2), "ok");
    }

    #[test]
    fn test_require_policy_column() {
        let config = TrackerConfig::default();
        let table = read_csv("carrier,premium\nAcme,10\n".as_bytes()).unwrap();
        assert!(matches!(
            table.require_policy_column(&config),
            Err(TrackerError::MalformedInput { .. })
        ));

        let table = read_csv("Carrier,POLICY_NUMBER\nAcme,P1\n".as_bytes()).unwrap();
        assert_eq!(table.require_policy_column(&config).unwrap(), 1);
    }

    #[test]
    fn test_read_path_rejects_unknown_extension() {
        let result = read_path(Path::new("statement.pdf"));
        assert!(matches!(result, Err(TrackerError::MalformedInput { .. })));
    }

    #[test]
    fn test_csv_export_uses_sale_columns() {
        let records = vec![SaleRecord::new(
            SaleId(3),
            SaleDetails {
                customer_name: "Ann, Lee".to_string(),
                policy_number: "P3".to_string(),
                premium: 99.5,
                date_of_sale: NaiveDate::from_ymd_opt(2024, 4, 2),
                agent_name: "Kim".to_string(),
                ..Default::default()
            },
        )];
        let bytes = write_csv(&Table::from_records(&records)).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), SALE_COLUMNS.join(","));
        assert_eq!(
            lines.next().unwrap(),
            "3,\"Ann, Lee\",P3,99.50,,,2024-04-02,Kim,,Active"
        );
    }

    #[test]
    fn test_xlsx_round_trip_through_reader() {
        let table = Table::new(
            vec!["policy_number".to_string(), "premium".to_string()],
            vec![
                vec!["12345".to_string(), "250.5".to_string()],
                vec!["P-9".to_string(), "n/a".to_string()],
            ],
        );
        let bytes = write_xlsx(&table).unwrap();
        let back = read_xlsx_bytes(&bytes).unwrap();
        assert_eq!(back.headers, table.headers);
        assert_eq!(back.cell(0, 0), "12345");
        assert_eq!(back.cell(0, 1), "250.5");
        assert_eq!(back.cell(1, 1), "n/a");
    }

    #[test]
    fn test_archive_table_names_file_by_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let at = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(13, 4, 5)
            .unwrap();
        let table = Table::new(vec!["policy_number".to_string()], vec![vec!["P1".to_string()]]);
        let path = archive_table(&table, dir.path(), at).unwrap();
        assert!(path.ends_with("backup_historical_20240506_130405.csv"));
        let back = read_csv_path(&path).unwrap();
        assert_eq!(back, table);
    }
}
