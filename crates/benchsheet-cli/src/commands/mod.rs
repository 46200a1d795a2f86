pub(crate) mod auth;
pub(crate) mod config;
pub(crate) mod report;
pub(crate) mod sheet;

use anyhow::Result;
use benchsheet_core::AppConfig;
use benchsheet_sheets::{GoogleSheetsClient, resolve_provider};

/// Sheets client authorized the way the settings ask for.
pub(crate) fn sheets_client(cfg: &AppConfig) -> Result<GoogleSheetsClient> {
    let credentials = resolve_provider(&cfg.auth, cfg.sheets.timeout_seconds)?;
    GoogleSheetsClient::new(cfg.sheets.clone(), credentials)
}
