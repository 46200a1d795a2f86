use crate::output::print_json;
use anyhow::{Context, Result};
use benchsheet_core::AppConfig;
use benchsheet_sheets::{ClientSecret, authorization_url, exchange_code};
use serde_json::json;
use std::path::{Path, PathBuf};

pub(crate) enum AuthAction {
    Url,
    Exchange { code: String },
}

fn client_secret_path(workspace: &Path, cfg: &AppConfig) -> PathBuf {
    let configured = PathBuf::from(&cfg.auth.client_secret_file);
    if configured.is_absolute() {
        configured
    } else {
        workspace.join(configured)
    }
}

pub(crate) fn run_auth(workspace: &Path, action: AuthAction, json_mode: bool) -> Result<()> {
    let cfg = AppConfig::load(workspace)?;
    let secret_path = client_secret_path(workspace, &cfg);
    let secret = ClientSecret::load(&secret_path)
        .with_context(|| format!("cannot read client secret {}", secret_path.display()))?;

    match action {
        AuthAction::Url => {
            let url = authorization_url(&cfg.auth, &secret)?;
            if json_mode {
                print_json(&json!({ "url": url }))?;
            } else {
                println!("Open this URL, grant access, then run `benchsheet auth exchange --code <code>`:");
                println!("{url}");
            }
        }
        AuthAction::Exchange { code } => {
            let creds = exchange_code(&cfg.auth, &secret, &code, cfg.sheets.timeout_seconds)?;
            let stored_at = cfg
                .auth
                .resolved_credentials_path()
                .map(|path| path.display().to_string())
                .unwrap_or_default();
            if json_mode {
                print_json(&json!({
                    "credentials_path": stored_at,
                    "expires_at": creds.expires_at,
                    "refreshable": creds.refresh_token.is_some(),
                }))?;
            } else {
                println!("Storing credentials to {stored_at}");
            }
        }
    }
    Ok(())
}
