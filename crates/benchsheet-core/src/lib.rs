use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub type Result<T> = anyhow::Result<T>;

/// Column every fresh sheet starts with; holds the snapshot creation time.
pub const DATETIME_COLUMN: &str = "datetime";
/// Written under the workload column when no workload identifier is left.
pub const WORKLOAD_SENTINEL: &str = "error getting workload";

pub const DEFAULT_SHEET_TITLE: &str = "Cloud Spanner YCSB Benchmark";
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";
pub const DEFAULT_RESERVED_PREFIX: &str = "reporting";
pub const DEFAULT_WORKLOAD_FLAG: &str = "ycsb_workload_files";
pub const DEFAULT_SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

pub fn runtime_dir(workspace: &Path) -> PathBuf {
    workspace.join(".benchsheet")
}

/// Returns true when `name` belongs to the reporting-control namespace and must
/// never become an output column.
pub fn is_reserved_name(name: &str, prefix: &str) -> bool {
    !prefix.is_empty() && name.starts_with(prefix)
}

/// Formats a snapshot time the way result sheets have always recorded it.
pub fn format_snapshot_time(at: DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

pub fn snapshot_timestamp() -> String {
    format_snapshot_time(Local::now())
}

/// A flag or result value as handed to the reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl CellValue {
    /// Infers a typed value from a raw command-line string.
    ///
    /// A typed value is only kept when it renders back to exactly `raw`, so
    /// commit hashes, version strings and zero-padded ids reach the sheet
    /// unchanged as text.
    pub fn parse(raw: &str) -> Self {
        let candidate = Self::infer(raw);
        if candidate.to_string() == raw {
            candidate
        } else {
            Self::Text(raw.to_string())
        }
    }

    fn infer(raw: &str) -> Self {
        match raw {
            "True" => return Self::Bool(true),
            "False" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(value) = raw.parse::<i64>() {
            return Self::Int(value);
        }
        if let Ok(value) = raw.parse::<f64>()
            && value.is_finite()
        {
            return Self::Float(value);
        }
        Self::Text(raw.to_string())
    }

    /// Expands the value into an ordered list of items. Text values are split on
    /// commas, matching how list flags are passed on the command line.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Self::List(items) => items.clone(),
            Self::Text(text) => text
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(ToString::to_string)
                .collect(),
            other => vec![other.to_string()],
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(value) => write!(f, "{value}"),
            // Whole floats keep a trailing ".0" so the sheet can tell them from counters.
            Self::Float(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 => {
                write!(f, "{value:.1}")
            }
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(text) => f.write_str(text),
            Self::List(items) => f.write_str(&items.join(",")),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Vec<String>> for CellValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<serde_json::Value> for CellValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Text(String::new()),
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            Value::Object(_) => Self::Text(value.to_string()),
        }
    }
}

/// One entry of the benchmark's flag table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flag {
    pub name: String,
    pub value: CellValue,
    /// Set only when the flag was given explicitly rather than left at its default.
    pub present: bool,
}

impl Flag {
    pub fn present(name: impl Into<String>, value: impl Into<CellValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            present: true,
        }
    }

    pub fn defaulted(name: impl Into<String>, value: impl Into<CellValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            present: false,
        }
    }
}

/// Something the reporter did against the remote sheet, as written to the observe log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportEvent {
    HeaderFetched {
        columns: usize,
        remote_empty: bool,
    },
    HeaderPersisted {
        columns: usize,
        updated_range: Option<String>,
    },
    RowAppended {
        workload: String,
        cells: usize,
        updated_range: Option<String>,
    },
    FlushSkipped {
        reason: String,
    },
    FlushFailed {
        stage: String,
        error: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub reporting: ReportingConfig,
    pub sheets: SheetsConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    pub enabled: bool,
    pub sheet_id: Option<String>,
    pub sheet_title: String,
    /// Tab inside the spreadsheet that receives the header and rows.
    pub sheet_name: String,
    pub reserved_prefix: String,
    pub workload_flag: String,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sheet_id: None,
            sheet_title: DEFAULT_SHEET_TITLE.to_string(),
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            reserved_prefix: DEFAULT_RESERVED_PREFIX.to_string(),
            workload_flag: DEFAULT_WORKLOAD_FLAG.to_string(),
        }
    }
}

impl ReportingConfig {
    pub fn header_range(&self) -> String {
        format!("{}!1:1", self.sheet_name)
    }

    pub fn append_range(&self) -> String {
        self.sheet_name.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub api_base_url: String,
    pub timeout_seconds: u64,
    pub value_input_option: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://sheets.googleapis.com".to_string(),
            timeout_seconds: 60,
            value_input_option: "USER_ENTERED".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub access_token_env: String,
    pub access_token: Option<String>,
    pub client_secret_file: String,
    /// Cached OAuth credentials; defaults to `~/.credentials/benchsheet_reporter.json`.
    pub credentials_path: Option<String>,
    pub token_uri: String,
    pub auth_uri: String,
    pub scope: String,
    pub redirect_uri: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            access_token_env: "BENCHSHEET_ACCESS_TOKEN".to_string(),
            access_token: None,
            client_secret_file: "client_secret.json".to_string(),
            credentials_path: None,
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            scope: DEFAULT_SHEETS_SCOPE.to_string(),
            redirect_uri: "http://localhost".to_string(),
        }
    }
}

impl AuthConfig {
    pub fn resolved_credentials_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.credentials_path {
            return Some(PathBuf::from(path));
        }
        home_dir().map(|home| home.join(".credentials/benchsheet_reporter.json"))
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .or_else(|| std::env::var("USERPROFILE").ok())
        .map(PathBuf::from)
}

impl AppConfig {
    pub fn user_settings_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".benchsheet/settings.json"))
    }

    pub fn project_settings_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("settings.json")
    }

    pub fn project_local_settings_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("settings.local.json")
    }

    pub fn legacy_toml_path(workspace: &Path) -> PathBuf {
        runtime_dir(workspace).join("config.toml")
    }

    pub fn load(workspace: &Path) -> Result<Self> {
        let mut merged = serde_json::to_value(Self::default())?;

        let legacy = Self::legacy_toml_path(workspace);
        if legacy.exists() {
            let raw = fs::read_to_string(legacy)?;
            let legacy_cfg: AppConfig = toml::from_str(&raw)?;
            merge_json_value(&mut merged, &serde_json::to_value(legacy_cfg)?);
        }

        let mut paths = Vec::new();
        if let Some(user) = Self::user_settings_path() {
            paths.push(user);
        }
        paths.push(Self::project_settings_path(workspace));
        paths.push(Self::project_local_settings_path(workspace));

        for path in paths {
            if !path.exists() {
                continue;
            }
            let raw = fs::read_to_string(&path)?;
            let value: serde_json::Value = serde_json::from_str(&raw).map_err(|err| {
                anyhow::anyhow!("invalid configuration in {}: {err}", path.display())
            })?;
            merge_json_value(&mut merged, &value);
        }

        Ok(serde_json::from_value(merged)?)
    }

    pub fn save(&self, workspace: &Path) -> Result<()> {
        let path = Self::project_settings_path(workspace);
        fs::create_dir_all(
            path.parent()
                .ok_or_else(|| anyhow::anyhow!("invalid config path"))?,
        )?;
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Rejects settings that would make an enabled reporter fail on first use.
    pub fn validate(&self) -> Result<()> {
        if self.reporting.enabled
            && self
                .reporting
                .sheet_id
                .as_deref()
                .is_none_or(|id| id.trim().is_empty())
        {
            anyhow::bail!(
                "configuration error: reporting is enabled but reporting.sheet_id is not set"
            );
        }
        if self.reporting.sheet_name.trim().is_empty() {
            anyhow::bail!("configuration error: reporting.sheet_name must not be empty");
        }
        Ok(())
    }
}

fn merge_json_value(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_obj), serde_json::Value::Object(overlay_obj)) => {
            for (key, overlay_value) in overlay_obj {
                if let Some(base_value) = base_obj.get_mut(key) {
                    merge_json_value(base_value, overlay_value);
                } else {
                    base_obj.insert(key.clone(), overlay_value.clone());
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}
