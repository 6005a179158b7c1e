use async_trait::async_trait;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    SheetError, SheetService, Worksheet,
    auth::{self, CredentialSource},
    parse_sheet_id, row_range_a1,
};

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Google Sheets REST v4 backend.
///
/// Holds configuration only; a token and worksheet handle are acquired on
/// every `open`.
pub struct GoogleSheets {
    client: reqwest::Client,
    sheet_url: Option<String>,
    credentials: CredentialSource,
}

impl GoogleSheets {
    pub fn new(sheet_url: Option<String>, credentials: CredentialSource) -> Self {
        Self {
            client: reqwest::Client::new(),
            sheet_url,
            credentials,
        }
    }
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

#[async_trait]
impl SheetService for GoogleSheets {
    async fn open(&self) -> Result<Box<dyn Worksheet>, SheetError> {
        let url = self
            .sheet_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| SheetError::NotConfigured("SHEET_URL is not set".into()))?;
        let spreadsheet_id = parse_sheet_id(url)
            .ok_or_else(|| {
                SheetError::NotConfigured("SHEET_URL has no /spreadsheets/d/<id> segment".into())
            })?
            .to_string();

        let token = auth::access_token(&self.client, &self.credentials).await?;

        let resp = self
            .client
            .get(format!("{API_BASE}/{spreadsheet_id}"))
            .bearer_auth(&token)
            .query(&[("fields", "sheets.properties(sheetId,title)")])
            .send()
            .await?;
        let meta: SpreadsheetMeta = decode(resp).await?;
        let first = meta
            .sheets
            .into_iter()
            .next()
            .ok_or_else(|| SheetError::Decode("spreadsheet has no worksheets".into()))?;

        tracing::debug!(
            spreadsheet = %spreadsheet_id,
            worksheet = %first.properties.title,
            "opened worksheet"
        );

        Ok(Box::new(GoogleWorksheet {
            client: self.client.clone(),
            token,
            spreadsheet_id,
            sheet_id: first.properties.sheet_id,
            title: first.properties.title,
        }))
    }
}

struct GoogleWorksheet {
    client: reqwest::Client,
    token: String,
    spreadsheet_id: String,
    sheet_id: i64,
    title: String,
}

impl GoogleWorksheet {
    /// URL of the values endpoint for `range` (relative to this worksheet).
    fn values_url(&self, range: Option<&str>) -> String {
        let a1 = match range {
            Some(r) => format!("{}!{}", quote_title(&self.title), r),
            None => quote_title(&self.title),
        };
        format!(
            "{API_BASE}/{}/values/{}",
            self.spreadsheet_id,
            utf8_percent_encode(&a1, NON_ALPHANUMERIC)
        )
    }

    async fn get_values(&self, range: Option<&str>) -> Result<Vec<Vec<String>>, SheetError> {
        let resp = self
            .client
            .get(self.values_url(range))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let range: ValueRange = decode(resp).await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }
}

#[async_trait]
impl Worksheet for GoogleWorksheet {
    async fn header_row(&self) -> Result<Vec<String>, SheetError> {
        let mut rows = self.get_values(Some("1:1")).await?;
        Ok(if rows.is_empty() { Vec::new() } else { rows.swap_remove(0) })
    }

    async fn data_rows(&self) -> Result<Vec<Vec<String>>, SheetError> {
        let rows = self.get_values(None).await?;
        Ok(rows.into_iter().skip(1).collect())
    }

    async fn append_row(&self, values: Vec<String>) -> Result<(), SheetError> {
        let resp = self
            .client
            .post(format!("{}:append", self.values_url(None)))
            .bearer_auth(&self.token)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&json!({ "values": [values] }))
            .send()
            .await?;
        check(resp).await
    }

    async fn write_row(&self, row: u32, values: Vec<String>) -> Result<(), SheetError> {
        let range = row_range_a1(row, values.len() as u32);
        let resp = self
            .client
            .put(self.values_url(Some(&range)))
            .bearer_auth(&self.token)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "values": [values] }))
            .send()
            .await?;
        check(resp).await
    }

    async fn delete_row(&self, row: u32) -> Result<(), SheetError> {
        let body = json!({
            "requests": [{
                "deleteDimension": {
                    "range": {
                        "sheetId": self.sheet_id,
                        "dimension": "ROWS",
                        "startIndex": row - 1,
                        "endIndex": row,
                    }
                }
            }]
        });
        let resp = self
            .client
            .post(format!("{API_BASE}/{}:batchUpdate", self.spreadsheet_id))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        check(resp).await
    }
}

/// Quote a worksheet title for use in A1 notation.
fn quote_title(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

/// Formatted values arrive as strings; anything else is stringified.
fn cell_text(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

async fn check(resp: reqwest::Response) -> Result<(), SheetError> {
    if resp.status().is_success() {
        Ok(())
    } else {
        Err(api_error(resp).await)
    }
}

async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, SheetError> {
    if !resp.status().is_success() {
        return Err(api_error(resp).await);
    }
    resp.json::<T>()
        .await
        .map_err(|e| SheetError::Decode(e.to_string()))
}

async fn api_error(resp: reqwest::Response) -> SheetError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    SheetError::Api {
        status,
        message: error_message(&body),
    }
}

/// Pull `error.message` out of a Google API error body, falling back to the
/// raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) if !parsed.error.message.is_empty() => parsed.error.message,
        _ => body.trim().to_string(),
    }
}
