//! User-facing error classification for benchsheet.
//!
//! Reporting failures are surfaced unchanged by the library crates; this crate
//! turns them into a short diagnosis with recovery suggestions for the CLI.

use anyhow::Error;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;

/// Error with a user-friendly message and recovery suggestions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancedError {
    pub title: String,
    pub message: String,
    pub suggestions: Vec<String>,
    pub error_type: ErrorType,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Malformed settings or command-line arguments
    Configuration,
    /// Missing, expired or rejected credentials
    Authentication,
    /// Transport failures (timeout, DNS, refused connection)
    Network,
    /// The spreadsheet API answered with an error
    RemoteApi,
    /// Bad input data (unparseable result files, malformed pairs)
    Validation,
    Unknown,
}

impl EnhancedError {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        error_type: ErrorType,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            suggestions: Vec::new(),
            error_type,
            context: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions.extend(suggestions);
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn into_error(self) -> Error {
        Error::new(self)
    }

    /// Format error for terminal display
    pub fn format(&self, verbose: bool) -> String {
        let mut output = String::new();

        output.push_str(&format!("[{}] {}\n", self.error_type.tag(), self.title));
        output.push_str(&format!("  {}\n", self.message));

        if verbose && let Some(context) = &self.context {
            output.push_str(&format!("\n  Context: {}\n", context));
        }

        if !self.suggestions.is_empty() {
            output.push_str("\n  Suggestions:\n");
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                output.push_str(&format!("    {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "error": self.title,
            "type": self.error_type,
            "message": self.message,
            "suggestions": self.suggestions,
        })
    }
}

impl ErrorType {
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorType::Configuration => "config",
            ErrorType::Authentication => "auth",
            ErrorType::Network => "network",
            ErrorType::RemoteApi => "sheets",
            ErrorType::Validation => "input",
            ErrorType::Unknown => "error",
        }
    }

    /// Process exit status for the CLI; usage problems are kept apart from runtime failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorType::Configuration | ErrorType::Validation => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for EnhancedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

impl std::error::Error for EnhancedError {}

pub struct ErrorHandler {
    verbose: bool,
    show_suggestions: bool,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self {
            verbose: false,
            show_suggestions: true,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn show_suggestions(mut self, show: bool) -> Self {
        self.show_suggestions = show;
        self
    }

    /// Classifies `error`, reusing an attached [`EnhancedError`] when there is one.
    pub fn classify(&self, error: &Error) -> EnhancedError {
        if let Some(enhanced) = error.downcast_ref::<EnhancedError>() {
            return enhanced.clone();
        }
        let mut enhanced = classify_message(&format!("{error:#}"));
        if !self.show_suggestions {
            enhanced.suggestions.clear();
        }
        enhanced
    }

    pub fn handle(&self, error: &Error) -> String {
        self.classify(error).format(self.verbose)
    }
}

fn classify_message(error_message: &str) -> EnhancedError {
    let lower = error_message.to_lowercase();

    if lower.contains("configuration") || lower.contains("sheet_id") || lower.contains("settings")
    {
        return EnhancedError::new("Configuration Error", error_message, ErrorType::Configuration)
            .with_suggestions(vec![
                "Check .benchsheet/settings.json".to_string(),
                "Pass --reporting-sheet-id or run `benchsheet create-sheet`".to_string(),
            ]);
    }

    if lower.contains("http 401")
        || lower.contains("http 403")
        || lower.contains("access token")
        || lower.contains("credentials")
        || lower.contains("client secret")
    {
        return EnhancedError::new("Authentication Error", error_message, ErrorType::Authentication)
            .with_suggestions(vec![
                "Set BENCHSHEET_ACCESS_TOKEN to a valid OAuth access token".to_string(),
                "Run `benchsheet auth url` and `benchsheet auth exchange --code <code>`"
                    .to_string(),
            ]);
    }

    if lower.contains("timed out")
        || lower.contains("network")
        || lower.contains("connection")
        || lower.contains("dns")
    {
        return EnhancedError::new("Network Error", error_message, ErrorType::Network)
            .with_suggestions(vec![
                "Check your internet connection".to_string(),
                "Increase sheets.timeout_seconds if the API is slow".to_string(),
            ]);
    }

    if lower.contains("sheets api") || lower.contains("http ") {
        return EnhancedError::new("Spreadsheet API Error", error_message, ErrorType::RemoteApi)
            .with_suggestion("Verify the spreadsheet id and that the tab exists");
    }

    if lower.contains("invalid result")
        || lower.contains("expected name=value")
        || lower.contains("results file")
    {
        return EnhancedError::new("Invalid Input", error_message, ErrorType::Validation)
            .with_suggestion("Results are given as key=value pairs or JSON Lines objects");
    }

    EnhancedError::new("Error", error_message, ErrorType::Unknown)
}

/// Constructors for errors the CLI raises directly
pub mod errors {
    use super::*;

    pub fn missing_sheet_id() -> EnhancedError {
        EnhancedError::new(
            "Missing Spreadsheet",
            "Reporting is enabled but no spreadsheet id was given.",
            ErrorType::Configuration,
        )
        .with_suggestions(vec![
            "Pass --reporting-sheet-id <id>".to_string(),
            "Set reporting.sheet_id in .benchsheet/settings.json".to_string(),
            "Create one with `benchsheet create-sheet`".to_string(),
        ])
    }

    pub fn invalid_pair(raw: &str) -> EnhancedError {
        EnhancedError::new(
            "Invalid Argument",
            format!("'{raw}' is not a name=value pair."),
            ErrorType::Validation,
        )
        .with_suggestion("Use --flag name=value or --result key=value")
    }

    pub fn unreadable_results_file(path: &str, cause: &str) -> EnhancedError {
        EnhancedError::new(
            "Invalid Argument",
            format!("cannot read results file {path}: {cause}"),
            ErrorType::Validation,
        )
        .with_suggestion("Pass --results-file a readable JSON Lines file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn formatting_lists_suggestions() {
        let error = EnhancedError::new("Test Error", "Something went wrong", ErrorType::Network)
            .with_suggestion("Try again")
            .with_suggestion("Check connectivity");

        let formatted = error.format(false);
        assert!(formatted.contains("[network] Test Error"));
        assert!(formatted.contains("Something went wrong"));
        assert!(formatted.contains("2. Check connectivity"));
    }

    #[test]
    fn context_only_shown_when_verbose() {
        let error = EnhancedError::new("E", "m", ErrorType::Unknown).with_context("range=Sheet1");
        assert!(!error.format(false).contains("range=Sheet1"));
        assert!(error.format(true).contains("range=Sheet1"));
    }

    #[test]
    fn unauthorized_is_an_auth_error() {
        let handler = ErrorHandler::new();
        let out = handler.classify(&anyhow!("Sheets API rejected the access token (HTTP 401)"));
        assert_eq!(out.error_type, ErrorType::Authentication);
    }

    #[test]
    fn missing_sheet_is_configuration() {
        let handler = ErrorHandler::new();
        let out = handler.classify(&anyhow!(
            "configuration error: reporting is enabled but reporting.sheet_id is not set"
        ));
        assert_eq!(out.error_type, ErrorType::Configuration);
        assert_eq!(out.error_type.exit_code(), 2);
    }

    #[test]
    fn api_errors_are_remote() {
        let handler = ErrorHandler::new();
        let out = handler.classify(&anyhow!("Sheets API error (HTTP 400): Unable to parse range"));
        assert_eq!(out.error_type, ErrorType::RemoteApi);
        assert_eq!(out.error_type.exit_code(), 1);
    }

    #[test]
    fn into_error_preserves_enhanced_type() {
        let handler = ErrorHandler::new();
        let error = errors::missing_sheet_id().into_error();
        let out = handler.classify(&error);
        assert_eq!(out.title, "Missing Spreadsheet");
        assert_eq!(out.suggestions.len(), 3);
    }

    #[test]
    fn suggestions_can_be_suppressed() {
        let handler = ErrorHandler::new().show_suggestions(false);
        let out = handler.classify(&anyhow!("request timed out"));
        assert_eq!(out.error_type, ErrorType::Network);
        assert!(out.suggestions.is_empty());
    }

    #[test]
    fn unreadable_results_file_is_an_input_error() {
        let handler = ErrorHandler::new();
        let out = handler.classify(&anyhow!(
            "cannot read results file /tmp/missing.jsonl: No such file or directory (os error 2)"
        ));
        assert_eq!(out.error_type, ErrorType::Validation);
        assert_eq!(out.error_type.exit_code(), 2);

        let explicit = handler.classify(
            &errors::unreadable_results_file("/srv/settings/out.jsonl", "permission denied")
                .into_error(),
        );
        assert_eq!(explicit.error_type, ErrorType::Validation);
    }

    #[test]
    fn json_shape_carries_type() {
        let value = errors::invalid_pair("oops").to_json();
        assert_eq!(value["type"], "validation");
        assert!(value["message"].as_str().unwrap_or_default().contains("oops"));
    }
}
