use anyhow::{Context, Result, anyhow};
use benchsheet_core::SheetsConfig;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use std::error::Error as StdError;
use std::time::Duration;

pub mod auth;
#[cfg(test)]
mod test_support;

pub use auth::{
    ClientSecret, CredentialProvider, OAuthTokenProvider, StaticTokenProvider, StoredCredentials,
    authorization_url, exchange_code, resolve_provider,
};

/// What the API reports back after a write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummary {
    #[serde(default)]
    pub updated_range: Option<String>,
    #[serde(default)]
    pub updated_rows: Option<u64>,
    #[serde(default)]
    pub updated_cells: Option<u64>,
}

/// Remote tabular store keyed by a spreadsheet id and an A1 range.
///
/// Every call blocks until the remote answers. Failures are returned as-is;
/// retrying is left to the caller.
pub trait SheetClient {
    /// Rows in `range`; empty when the range holds no values.
    fn get_row(&self, sheet_id: &str, range: &str) -> Result<Vec<Vec<String>>>;

    /// Overwrites `range` with a single row.
    fn update_row(&self, sheet_id: &str, range: &str, values: &[String]) -> Result<UpdateSummary>;

    /// Inserts a new row after the last row of `range`, leaving existing rows untouched.
    fn append_row(&self, sheet_id: &str, range: &str, values: &[String]) -> Result<UpdateSummary>;

    fn create_spreadsheet(&self, title: &str) -> Result<String>;
}

impl<T: SheetClient + ?Sized> SheetClient for &T {
    fn get_row(&self, sheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        (**self).get_row(sheet_id, range)
    }

    fn update_row(&self, sheet_id: &str, range: &str, values: &[String]) -> Result<UpdateSummary> {
        (**self).update_row(sheet_id, range, values)
    }

    fn append_row(&self, sheet_id: &str, range: &str, values: &[String]) -> Result<UpdateSummary> {
        (**self).append_row(sheet_id, range, values)
    }

    fn create_spreadsheet(&self, title: &str) -> Result<String> {
        (**self).create_spreadsheet(title)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SheetsError {
    #[error("Sheets API rejected the access token (HTTP {status}): {detail}")]
    Unauthorized { status: u16, detail: String },
    #[error("Sheets API error (HTTP 404): spreadsheet or range not found: {detail}")]
    NotFound { detail: String },
    #[error("Sheets API rate limit exceeded (HTTP 429): {detail}")]
    RateLimited { detail: String },
    #[error("Sheets API server error (HTTP {status}): {detail}")]
    Server { status: u16, detail: String },
    #[error("Sheets API error (HTTP {status}): {detail}")]
    Api { status: u16, detail: String },
    #[error("malformed Sheets API response: {0}")]
    MalformedResponse(String),
}

impl SheetsError {
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let detail = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .and_then(|e| e.get("message").or(Some(e)))
                    .and_then(|m| m.as_str().map(ToString::to_string))
            })
            .unwrap_or_else(|| body.chars().take(200).collect());
        let code = status.as_u16();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Unauthorized {
                status: code,
                detail,
            },
            StatusCode::NOT_FOUND => Self::NotFound { detail },
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited { detail },
            s if s.is_server_error() => Self::Server {
                status: code,
                detail,
            },
            _ => Self::Api {
                status: code,
                detail,
            },
        }
    }
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Option<Vec<Vec<Value>>>,
}

#[derive(Deserialize)]
struct AppendResponse {
    #[serde(default)]
    updates: UpdateSummary,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateResponse {
    spreadsheet_id: String,
}

/// Google Sheets v4 REST client.
pub struct GoogleSheetsClient {
    cfg: SheetsConfig,
    client: Client,
    credentials: Box<dyn CredentialProvider>,
}

impl GoogleSheetsClient {
    pub fn new(cfg: SheetsConfig, credentials: Box<dyn CredentialProvider>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()?;
        Ok(Self {
            cfg,
            client,
            credentials,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.cfg.api_base_url)
            .with_context(|| format!("invalid sheets.api_base_url {}", self.cfg.api_base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("sheets.api_base_url cannot be a base URL"))?
            .pop_if_empty()
            .push("v4")
            .push("spreadsheets")
            .extend(segments);
        Ok(url)
    }

    fn send(&self, request: RequestBuilder) -> Result<String> {
        let token = self.credentials.access_token()?;
        let resp = request
            .bearer_auth(token)
            .send()
            .map_err(|err| format_transport_error(&err))?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(SheetsError::from_response(status, &body).into());
        }
        Ok(body)
    }
}

impl SheetClient for GoogleSheetsClient {
    fn get_row(&self, sheet_id: &str, range: &str) -> Result<Vec<Vec<String>>> {
        let mut url = self.endpoint(&[sheet_id, "values", range])?;
        url.query_pairs_mut()
            .append_pair("valueRenderOption", "FORMATTED_VALUE")
            .append_pair("dateTimeRenderOption", "FORMATTED_STRING");
        let body = self.send(self.client.get(url))?;
        parse_value_range(&body)
    }

    fn update_row(&self, sheet_id: &str, range: &str, values: &[String]) -> Result<UpdateSummary> {
        let mut url = self.endpoint(&[sheet_id, "values", range])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", &self.cfg.value_input_option);
        let body = self.send(self.client.put(url).json(&json!({ "values": [values] })))?;
        serde_json::from_str(&body)
            .map_err(|err| SheetsError::MalformedResponse(err.to_string()).into())
    }

    fn append_row(&self, sheet_id: &str, range: &str, values: &[String]) -> Result<UpdateSummary> {
        let mut url = self.endpoint(&[sheet_id, "values", &format!("{range}:append")])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", &self.cfg.value_input_option)
            .append_pair("insertDataOption", "INSERT_ROWS");
        let body = self.send(self.client.post(url).json(&json!({ "values": [values] })))?;
        let parsed: AppendResponse = serde_json::from_str(&body)
            .map_err(|err| SheetsError::MalformedResponse(err.to_string()))?;
        Ok(parsed.updates)
    }

    fn create_spreadsheet(&self, title: &str) -> Result<String> {
        let url = self.endpoint(&[])?;
        let body = self.send(
            self.client
                .post(url)
                .json(&json!({ "properties": { "title": title } })),
        )?;
        let parsed: CreateResponse = serde_json::from_str(&body)
            .map_err(|err| SheetsError::MalformedResponse(err.to_string()))?;
        Ok(parsed.spreadsheet_id)
    }
}

fn parse_value_range(body: &str) -> Result<Vec<Vec<String>>> {
    let parsed: ValueRange = serde_json::from_str(body)
        .map_err(|err| SheetsError::MalformedResponse(err.to_string()))?;
    Ok(parsed
        .values
        .unwrap_or_default()
        .into_iter()
        .map(|row| row.into_iter().map(cell_text).collect())
        .collect())
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Produce a user-friendly error from a transport/network failure.
pub(crate) fn format_transport_error(err: &reqwest::Error) -> anyhow::Error {
    let inner_msg = err
        .source()
        .map(|e| e.to_string())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let is_dns = inner_msg.contains("dns")
        || inner_msg.contains("resolve")
        || inner_msg.contains("name or service not known")
        || inner_msg.contains("no such host")
        || inner_msg.contains("getaddrinfo");

    if err.is_timeout() {
        anyhow!(
            "Request timed out. The Sheets API did not respond in time; \
             consider increasing sheets.timeout_seconds."
        )
    } else if is_dns {
        anyhow!(
            "DNS resolution failed. Could not resolve the Sheets API hostname. \
             Check your network connection and DNS settings."
        )
    } else if err.is_connect() {
        anyhow!(
            "Connection refused. Could not reach the Sheets API at the configured endpoint. \
             Check your network connection and sheets.api_base_url."
        )
    } else {
        anyhow!("Network error: {err}")
    }
}
