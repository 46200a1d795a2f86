use crate::output::{print_json, redact_config_for_display};
use anyhow::Result;
use benchsheet_core::AppConfig;
use std::path::Path;

pub(crate) fn run_config(workspace: &Path, json_mode: bool) -> Result<()> {
    let cfg = AppConfig::load(workspace)?;
    let display_cfg = redact_config_for_display(&cfg)?;
    if json_mode {
        print_json(&display_cfg)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&display_cfg)?);
    }
    Ok(())
}
