use crate::commands::sheets_client;
use crate::output::print_json;
use anyhow::Result;
use benchsheet_core::AppConfig;
use benchsheet_errors::errors;
use benchsheet_sheets::SheetClient;
use serde_json::json;
use std::path::Path;

pub(crate) fn enable_hint(sheet_id: &str) -> String {
    format!("enable reporting with --reporting --reporting-sheet-id={sheet_id}")
}

pub(crate) fn run_create_sheet(workspace: &Path, title: Option<String>, json_mode: bool) -> Result<()> {
    let cfg = AppConfig::load(workspace)?;
    let title = title.unwrap_or_else(|| cfg.reporting.sheet_title.clone());
    let client = sheets_client(&cfg)?;
    let sheet_id = client.create_spreadsheet(&title)?;
    if json_mode {
        print_json(&json!({
            "sheet_id": sheet_id,
            "title": title,
            "hint": enable_hint(&sheet_id),
        }))?;
    } else {
        println!("created spreadsheet {sheet_id} ({title})");
        println!("{}", enable_hint(&sheet_id));
    }
    Ok(())
}

pub(crate) fn run_header(workspace: &Path, sheet_id: Option<String>, json_mode: bool) -> Result<()> {
    let cfg = AppConfig::load(workspace)?;
    let sheet_id = sheet_id
        .or_else(|| cfg.reporting.sheet_id.clone())
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| errors::missing_sheet_id().into_error())?;
    let client = sheets_client(&cfg)?;
    let columns = client
        .get_row(&sheet_id, &cfg.reporting.header_range())?
        .into_iter()
        .next()
        .unwrap_or_default();
    if json_mode {
        print_json(&json!({
            "sheet_id": sheet_id,
            "range": cfg.reporting.header_range(),
            "columns": columns,
        }))?;
    } else if columns.is_empty() {
        println!("{} has no header yet", cfg.reporting.header_range());
    } else {
        println!("{}", columns.join("\t"));
    }
    Ok(())
}
