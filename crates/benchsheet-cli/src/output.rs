use anyhow::Result;
use benchsheet_core::AppConfig;
use serde::Serialize;
use serde_json::json;

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

pub(crate) fn redact_config_for_display(cfg: &AppConfig) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(cfg)?;
    if let Some(auth) = value.get_mut("auth").and_then(|entry| entry.as_object_mut())
        && auth
            .get("access_token")
            .is_some_and(|token| !token.is_null())
    {
        auth.insert("access_token".to_string(), json!("***REDACTED***"));
    }
    Ok(value)
}
