//! Spreadsheet-as-database access.
//!
//! The spreadsheet service is reached through two seams: a [`SheetService`]
//! that opens the configured spreadsheet and hands back its first
//! [`Worksheet`], and the worksheet itself which speaks in raw rows. The
//! [`Gateway`] pairs a worksheet with the header row read when it was opened
//! and is rebuilt on every request.

mod auth;
mod google;
#[cfg(test)]
pub mod memory;

pub use auth::CredentialSource;
pub use google::GoogleSheets;

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

/// Row 1 holds headers; data starts here.
pub const FIRST_DATA_ROW: u32 = 2;

static SHEET_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)").expect("static regex is valid")
});

#[derive(thiserror::Error, Debug)]
pub enum SheetError {
    #[error("Spreadsheet not configured: {0}")]
    NotConfigured(String),
    #[error("Cannot obtain spreadsheet credentials: {0}")]
    Credentials(String),
    #[error("Spreadsheet request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Spreadsheet service returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Unexpected spreadsheet response: {0}")]
    Decode(String),
    #[error("Row {0} is not a data row")]
    InvalidRow(u32),
}

impl SheetError {
    /// Short description safe to show to an admin. The full error is logged.
    pub fn summary(&self) -> String {
        match self {
            SheetError::NotConfigured(_) => "the spreadsheet is not configured".to_string(),
            SheetError::Credentials(_) => "could not authenticate with the spreadsheet service".to_string(),
            SheetError::Http(e) if e.is_timeout() => "the spreadsheet service timed out".to_string(),
            SheetError::Http(_) => "could not reach the spreadsheet service".to_string(),
            SheetError::Api { status: 401 | 403, .. } => {
                "permission denied by the spreadsheet service".to_string()
            }
            SheetError::Api { status: 404, .. } => "spreadsheet or row not found".to_string(),
            SheetError::Api { status: 429, .. } => {
                "rate limited by the spreadsheet service, try again shortly".to_string()
            }
            SheetError::Api { status, .. } => format!("spreadsheet service error ({status})"),
            SheetError::Decode(_) => "unexpected response from the spreadsheet service".to_string(),
            SheetError::InvalidRow(row) => format!("row {row} cannot be changed"),
        }
    }
}

/// Opens the configured spreadsheet.
#[async_trait]
pub trait SheetService: Send + Sync {
    /// Resolve credentials, open the spreadsheet and select its first worksheet.
    async fn open(&self) -> Result<Box<dyn Worksheet>, SheetError>;
}

/// A single worksheet addressed by 1-based row numbers.
#[async_trait]
pub trait Worksheet: Send + Sync {
    /// Cell values of row 1.
    async fn header_row(&self) -> Result<Vec<String>, SheetError>;
    /// Every row from row 2 down to the last non-empty row. Rows may be
    /// shorter than the header row.
    async fn data_rows(&self) -> Result<Vec<Vec<String>>, SheetError>;
    /// Append after the last row, letting the service parse the values.
    async fn append_row(&self, values: Vec<String>) -> Result<(), SheetError>;
    /// Overwrite `values.len()` cells of `row` starting at column 1.
    async fn write_row(&self, row: u32, values: Vec<String>) -> Result<(), SheetError>;
    /// Remove `row`, shifting later rows up.
    async fn delete_row(&self, row: u32) -> Result<(), SheetError>;
}

/// One data row: header → value pairs in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub sheet_row: u32,
    pub values: Vec<(String, String)>,
}

impl Record {
    pub fn get(&self, header: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }
}

/// A worksheet handle plus its header row, valid for one request.
pub struct Gateway {
    worksheet: Box<dyn Worksheet>,
    headers: Vec<String>,
}

impl Gateway {
    /// Open the spreadsheet and read its headers.
    ///
    /// Any configuration or connectivity failure is logged and reported as
    /// `None`; callers treat that as "not configured".
    pub async fn open(service: &dyn SheetService) -> Option<Gateway> {
        let worksheet = match service.open().await {
            Ok(ws) => ws,
            Err(e) => {
                tracing::warn!("Cannot open spreadsheet: {}", e);
                return None;
            }
        };
        let headers = match worksheet.header_row().await {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!("Cannot read spreadsheet header row: {}", e);
                return None;
            }
        };
        Some(Gateway { worksheet, headers })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// The first `limit` data rows, each tagged with its sheet row number.
    pub async fn list_records(&self, limit: usize) -> Result<Vec<Record>, SheetError> {
        let rows = self.worksheet.data_rows().await?;
        Ok(rows
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(idx, cells)| Record {
                sheet_row: FIRST_DATA_ROW + idx as u32,
                values: zip_headers(&self.headers, cells),
            })
            .collect())
    }

    pub async fn append(&self, values: Vec<String>) -> Result<(), SheetError> {
        self.worksheet.append_row(self.fit(values)).await
    }

    /// Overwrite the full width of `row` in a single write.
    pub async fn update(&self, row: u32, values: Vec<String>) -> Result<(), SheetError> {
        if row < FIRST_DATA_ROW {
            return Err(SheetError::InvalidRow(row));
        }
        self.worksheet.write_row(row, self.fit(values)).await
    }

    /// Remove `row`. Row numbers computed before this call are stale after it.
    pub async fn delete(&self, row: u32) -> Result<(), SheetError> {
        if row < FIRST_DATA_ROW {
            return Err(SheetError::InvalidRow(row));
        }
        self.worksheet.delete_row(row).await
    }

    /// Pad or truncate to exactly one value per header.
    fn fit(&self, mut values: Vec<String>) -> Vec<String> {
        values.resize(self.headers.len(), String::new());
        values
    }
}

fn zip_headers(headers: &[String], cells: Vec<String>) -> Vec<(String, String)> {
    let mut cells = cells.into_iter();
    headers
        .iter()
        .map(|h| (h.clone(), cells.next().unwrap_or_default()))
        .collect()
}

/// Extract the spreadsheet id from a `.../spreadsheets/d/<id>/...` URL.
pub fn parse_sheet_id(url: &str) -> Option<&str> {
    SHEET_ID_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Column letters for a 1-based column number (1 → A, 27 → AA).
pub fn column_letters(mut col: u32) -> String {
    let mut out = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        out.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// A1 range covering columns 1..=width of a single row, e.g. `A3:C3`.
pub fn row_range_a1(row: u32, width: u32) -> String {
    format!("A{row}:{}{row}", column_letters(width.max(1)))
}

#[cfg(test)]
mod tests {
    use super::memory::{Call, MemorySheets};
    use super::*;

    fn ten_row_sheet() -> MemorySheets {
        let rows = (1..=10)
            .map(|i| vec![format!("T{i}"), format!("http://{i}")])
            .collect();
        MemorySheets::new(&["Title", "URL"], rows)
    }

    #[test]
    fn sheet_id_is_extracted_from_url() {
        assert_eq!(
            parse_sheet_id("https://docs.google.com/spreadsheets/d/1AbC-_xyz/edit#gid=0"),
            Some("1AbC-_xyz")
        );
        assert_eq!(parse_sheet_id("https://docs.google.com/document/d/abc"), None);
        assert_eq!(parse_sheet_id(""), None);
    }

    #[test]
    fn column_letters_roll_over() {
        assert_eq!(column_letters(1), "A");
        assert_eq!(column_letters(3), "C");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(27), "AA");
        assert_eq!(column_letters(52), "AZ");
        assert_eq!(column_letters(703), "AAA");
        assert_eq!(row_range_a1(3, 3), "A3:C3");
        assert_eq!(row_range_a1(12, 14), "A12:N12");
    }

    #[tokio::test]
    async fn open_failure_degrades_to_none() {
        let sheets = MemorySheets::unavailable();
        assert!(Gateway::open(&sheets).await.is_none());
    }

    #[tokio::test]
    async fn records_are_tagged_with_sheet_rows_and_padded() {
        let sheets = MemorySheets::new(
            &["Title", "URL", "Status"],
            vec![vec!["A".into(), "http://a".into()], vec!["B".into()]],
        );
        let gw = Gateway::open(&sheets).await.unwrap();
        let records = gw.list_records(50).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sheet_row, 2);
        assert_eq!(records[1].sheet_row, 3);
        assert_eq!(records[0].get("Status"), Some(""));
        assert_eq!(records[1].get("URL"), Some(""));
        assert_eq!(records[1].get("Missing"), None);
    }

    #[tokio::test]
    async fn list_respects_limit_and_is_repeatable() {
        let sheets = ten_row_sheet();
        let gw = Gateway::open(&sheets).await.unwrap();

        let first = gw.list_records(5).await.unwrap();
        let second = gw.list_records(5).await.unwrap();
        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn delete_shifts_following_rows_up() {
        let sheets = ten_row_sheet();
        let gw = Gateway::open(&sheets).await.unwrap();

        gw.delete(5).await.unwrap();

        let records = gw.list_records(50).await.unwrap();
        assert_eq!(records.len(), 9);
        let rows: Vec<u32> = records.iter().map(|r| r.sheet_row).collect();
        assert_eq!(rows, (2..=10).collect::<Vec<_>>());
        // Sheet row 5 held T4; T5 (formerly row 6) moved into its place.
        assert_eq!(records[3].get("Title"), Some("T5"));
    }

    #[tokio::test]
    async fn update_writes_full_header_width() {
        let sheets = MemorySheets::new(&["Title", "URL", "Status"], vec![vec!["A".into()]]);
        let gw = Gateway::open(&sheets).await.unwrap();

        gw.update(2, vec!["B".into()]).await.unwrap();

        assert!(
            sheets
                .calls()
                .contains(&Call::Write(2, vec!["B".into(), "".into(), "".into()]))
        );
    }

    #[tokio::test]
    async fn header_row_cannot_be_overwritten_or_deleted() {
        let sheets = ten_row_sheet();
        let gw = Gateway::open(&sheets).await.unwrap();

        assert!(gw.update(1, vec!["x".into()]).await.is_err());
        assert!(gw.delete(1).await.is_err());
        assert!(
            !sheets
                .calls()
                .iter()
                .any(|c| matches!(c, Call::Write(..) | Call::Delete(_)))
        );
    }

    #[test]
    fn summaries_hide_service_detail() {
        let err = SheetError::Api {
            status: 403,
            message: "The caller does not have permission on sheet 1AbC".into(),
        };
        assert_eq!(err.summary(), "permission denied by the spreadsheet service");
        assert!(!err.summary().contains("1AbC"));

        let err = SheetError::Api {
            status: 429,
            message: "Quota exceeded".into(),
        };
        assert!(err.summary().contains("rate limited"));
    }
}
