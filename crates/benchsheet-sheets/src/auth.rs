//! Access-token sources for the Sheets client.
//!
//! Tokens come either from the environment/settings (CI, service accounts that
//! mint tokens out of band) or from an installed-app OAuth grant cached on disk
//! and refreshed on demand.

use anyhow::{Context, Result, anyhow};
use benchsheet_core::AuthConfig;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Url;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Tokens expiring within this window are refreshed before use.
const EXPIRY_SKEW_SECONDS: i64 = 60;

pub trait CredentialProvider {
    fn access_token(&self) -> Result<String>;
}

/// Reads a ready-made access token from an environment variable, falling back
/// to `auth.access_token` in settings.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    env_var: String,
    configured: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(cfg: &AuthConfig) -> Self {
        Self {
            env_var: cfg.access_token_env.clone(),
            configured: cfg.access_token.clone(),
        }
    }

    fn resolve(&self) -> Option<String> {
        std::env::var(&self.env_var)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .or_else(|| {
                self.configured
                    .as_ref()
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            })
    }
}

impl CredentialProvider for StaticTokenProvider {
    fn access_token(&self) -> Result<String> {
        self.resolve()
            .ok_or_else(|| anyhow!("{} not set and auth.access_token is empty", self.env_var))
    }
}

/// OAuth client registration as downloaded from the Google API console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

impl ClientSecret {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("cannot read client secret file {}", path.display()))?;
        let file: ClientSecretFile = serde_json::from_str(&raw)
            .with_context(|| format!("invalid client secret file {}", path.display()))?;
        file.installed.or(file.web).ok_or_else(|| {
            anyhow!(
                "client secret file {} has neither an 'installed' nor a 'web' section",
                path.display()
            )
        })
    }
}

/// Credentials cached between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredCredentials {
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path)?;
        let creds = serde_json::from_str(&raw)
            .with_context(|| format!("invalid stored credentials in {}", path.display()))?;
        Ok(Some(creds))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > now + ChronoDuration::seconds(EXPIRY_SKEW_SECONDS),
            None => true,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Installed-app OAuth grant, cached at `auth.credentials_path`.
pub struct OAuthTokenProvider {
    cfg: AuthConfig,
    credentials_path: PathBuf,
    client: Client,
    cached: RefCell<Option<StoredCredentials>>,
}

impl OAuthTokenProvider {
    pub fn new(cfg: &AuthConfig, timeout_seconds: u64) -> Result<Self> {
        let credentials_path = cfg
            .resolved_credentials_path()
            .ok_or_else(|| anyhow!("cannot determine where to cache credentials; set auth.credentials_path"))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self {
            cfg: cfg.clone(),
            credentials_path,
            client,
            cached: RefCell::new(None),
        })
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    fn refresh(&self, refresh_token: &str) -> Result<StoredCredentials> {
        let secret = ClientSecret::load(Path::new(&self.cfg.client_secret_file))?;
        let token_uri = secret.token_uri.as_deref().unwrap_or(&self.cfg.token_uri);
        let form = [
            ("client_id", secret.client_id.as_str()),
            ("client_secret", secret.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let token = post_token_request(&self.client, token_uri, &form)?;
        Ok(StoredCredentials {
            access_token: token.access_token,
            // Google omits the refresh token on refresh; keep the one we have.
            refresh_token: token
                .refresh_token
                .or_else(|| Some(refresh_token.to_string())),
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
        })
    }
}

impl CredentialProvider for OAuthTokenProvider {
    fn access_token(&self) -> Result<String> {
        let current = match self.cached.borrow().clone() {
            Some(creds) => Some(creds),
            None => StoredCredentials::load(&self.credentials_path)?,
        };
        let Some(current) = current else {
            return Err(anyhow!(
                "no cached credentials at {}; run `benchsheet auth url` to authorize",
                self.credentials_path.display()
            ));
        };
        if current.is_fresh(Utc::now()) {
            let token = current.access_token.clone();
            *self.cached.borrow_mut() = Some(current);
            return Ok(token);
        }
        let refresh_token = current.refresh_token.as_deref().ok_or_else(|| {
            anyhow!(
                "cached credentials at {} expired and carry no refresh token",
                self.credentials_path.display()
            )
        })?;
        let renewed = self.refresh(refresh_token)?;
        renewed.save(&self.credentials_path)?;
        let token = renewed.access_token.clone();
        *self.cached.borrow_mut() = Some(renewed);
        Ok(token)
    }
}

/// Consent URL the user opens once to grant spreadsheet access.
pub fn authorization_url(cfg: &AuthConfig, secret: &ClientSecret) -> Result<String> {
    let auth_uri = secret.auth_uri.as_deref().unwrap_or(&cfg.auth_uri);
    let mut url = Url::parse(auth_uri).with_context(|| format!("invalid auth_uri {auth_uri}"))?;
    url.query_pairs_mut()
        .append_pair("client_id", &secret.client_id)
        .append_pair("redirect_uri", &cfg.redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("scope", &cfg.scope)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent");
    Ok(url.to_string())
}

/// Trades an authorization code for tokens and caches them.
pub fn exchange_code(
    cfg: &AuthConfig,
    secret: &ClientSecret,
    code: &str,
    timeout_seconds: u64,
) -> Result<StoredCredentials> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()?;
    let token_uri = secret.token_uri.as_deref().unwrap_or(&cfg.token_uri);
    let form = [
        ("code", code.trim()),
        ("client_id", secret.client_id.as_str()),
        ("client_secret", secret.client_secret.as_str()),
        ("redirect_uri", cfg.redirect_uri.as_str()),
        ("grant_type", "authorization_code"),
    ];
    let token = post_token_request(&client, token_uri, &form)?;
    let creds = StoredCredentials {
        access_token: token.access_token,
        refresh_token: token.refresh_token,
        expires_at: token
            .expires_in
            .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
    };
    let path = cfg
        .resolved_credentials_path()
        .ok_or_else(|| anyhow!("cannot determine where to cache credentials; set auth.credentials_path"))?;
    creds.save(&path)?;
    Ok(creds)
}

/// Token endpoint requests are form-encoded (RFC 6749 section 4.1.3 and 6).
fn post_token_request(
    client: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse> {
    let resp = client
        .post(token_uri)
        .form(form)
        .send()
        .map_err(|err| crate::format_transport_error(&err))?;
    let status = resp.status();
    let text = resp.text()?;
    if !status.is_success() {
        return Err(anyhow!(
            "token endpoint rejected the credentials (HTTP {}): {}",
            status.as_u16(),
            text.chars().take(200).collect::<String>()
        ));
    }
    serde_json::from_str(&text).context("malformed token endpoint response")
}

/// Prefers an explicitly supplied token; otherwise uses the cached OAuth grant.
pub fn resolve_provider(
    cfg: &AuthConfig,
    timeout_seconds: u64,
) -> Result<Box<dyn CredentialProvider>> {
    let static_provider = StaticTokenProvider::new(cfg);
    if static_provider.resolve().is_some() {
        return Ok(Box::new(static_provider));
    }
    Ok(Box::new(OAuthTokenProvider::new(cfg, timeout_seconds)?))
}
