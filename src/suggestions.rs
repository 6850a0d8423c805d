/*!
 * Error guidance for the designer UI
 *
 * Maps the closed set of error codes the designer knows about to remediation
 * text shown in error panels. Codes arriving from the host are parsed into
 * `ErrorCode` at the boundary; anything outside the known set becomes
 * `ErrorCode::Unknown` instead of travelling around as a raw string.
 */

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Error codes the designer has guidance for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    BridgeUnavailable,
    BridgeTimeout,
    CircuitOpen,
    TemplateNotFound,
    InvalidTemplate,
    MissingField,
    SaveFailed,
    ExportFailed,
    ImportFailed,
    PermissionDenied,
    InvalidPayload,
    /// Any code outside the known set, kept verbatim
    Unknown(String),
}

impl ErrorCode {
    /// Every known code, in display order
    pub const KNOWN: [ErrorCode; 11] = [
        ErrorCode::BridgeUnavailable,
        ErrorCode::BridgeTimeout,
        ErrorCode::CircuitOpen,
        ErrorCode::TemplateNotFound,
        ErrorCode::InvalidTemplate,
        ErrorCode::MissingField,
        ErrorCode::SaveFailed,
        ErrorCode::ExportFailed,
        ErrorCode::ImportFailed,
        ErrorCode::PermissionDenied,
        ErrorCode::InvalidPayload,
    ];

    /// Parse a raw code from an untyped source. Never fails.
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "BRIDGE_UNAVAILABLE" => ErrorCode::BridgeUnavailable,
            "BRIDGE_TIMEOUT" => ErrorCode::BridgeTimeout,
            "CIRCUIT_OPEN" => ErrorCode::CircuitOpen,
            "TEMPLATE_NOT_FOUND" => ErrorCode::TemplateNotFound,
            "INVALID_TEMPLATE" => ErrorCode::InvalidTemplate,
            "MISSING_FIELD" => ErrorCode::MissingField,
            "SAVE_FAILED" => ErrorCode::SaveFailed,
            "EXPORT_FAILED" => ErrorCode::ExportFailed,
            "IMPORT_FAILED" => ErrorCode::ImportFailed,
            "PERMISSION_DENIED" => ErrorCode::PermissionDenied,
            "INVALID_PAYLOAD" => ErrorCode::InvalidPayload,
            other => ErrorCode::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::BridgeUnavailable => "BRIDGE_UNAVAILABLE",
            ErrorCode::BridgeTimeout => "BRIDGE_TIMEOUT",
            ErrorCode::CircuitOpen => "CIRCUIT_OPEN",
            ErrorCode::TemplateNotFound => "TEMPLATE_NOT_FOUND",
            ErrorCode::InvalidTemplate => "INVALID_TEMPLATE",
            ErrorCode::MissingField => "MISSING_FIELD",
            ErrorCode::SaveFailed => "SAVE_FAILED",
            ErrorCode::ExportFailed => "EXPORT_FAILED",
            ErrorCode::ImportFailed => "IMPORT_FAILED",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::InvalidPayload => "INVALID_PAYLOAD",
            ErrorCode::Unknown(raw) => raw,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, ErrorCode::Unknown(_))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remediation guidance for one error code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSuggestion {
    pub code: String,
    pub message: String,
    pub suggestions: Vec<String>,
    pub examples: Vec<String>,
}

impl ErrorSuggestion {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        suggestions: &[&str],
        examples: &[&str],
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
            examples: examples.iter().map(|s| s.to_string()).collect(),
        }
    }
}

type BuiltinEntry = (ErrorCode, &'static str, &'static [&'static str], &'static [&'static str]);

const BUILTIN: [BuiltinEntry; 11] = [
    (
        ErrorCode::BridgeUnavailable,
        "The designer cannot reach Anki",
        &[
            "Make sure Anki is still running",
            "Close and reopen the Template Designer window",
            "Restart Anki if the problem persists",
        ],
        &[],
    ),
    (
        ErrorCode::BridgeTimeout,
        "Anki took too long to respond",
        &[
            "Wait a moment and try again",
            "Check whether Anki is busy syncing or running a long operation",
        ],
        &[],
    ),
    (
        ErrorCode::CircuitOpen,
        "Anki is temporarily unavailable",
        &[
            "Several requests failed in a row, so the designer is pausing requests",
            "Retry shortly; the designer will try again automatically after a cooldown",
        ],
        &[],
    ),
    (
        ErrorCode::TemplateNotFound,
        "The template could not be found",
        &[
            "Check that the note type still exists in Anki",
            "Reload the note type list and select the template again",
        ],
        &[],
    ),
    (
        ErrorCode::InvalidTemplate,
        "The template contains invalid markup",
        &[
            "Check that every opening tag has a matching closing tag",
            "Make sure field references use double curly braces",
        ],
        &["{{Front}}", "<div class=\"card\">{{Back}}</div>"],
    ),
    (
        ErrorCode::MissingField,
        "The template references a field that does not exist",
        &[
            "Check the field name for typos; field names are case sensitive",
            "Add the field to the note type or remove the reference",
        ],
        &["{{Front}} instead of {{front}}", "{{cloze:Text}}"],
    ),
    (
        ErrorCode::SaveFailed,
        "The template could not be saved",
        &[
            "Try saving again",
            "Copy your template somewhere safe before closing the designer",
        ],
        &[],
    ),
    (
        ErrorCode::ExportFailed,
        "The template could not be exported",
        &[
            "Check that the destination folder exists and is writable",
            "Try exporting to a different location",
        ],
        &[],
    ),
    (
        ErrorCode::ImportFailed,
        "The template file could not be imported",
        &[
            "Make sure the file was exported by the Template Designer",
            "Check that the file is not truncated or edited by hand",
        ],
        &[],
    ),
    (
        ErrorCode::PermissionDenied,
        "Anki refused the operation",
        &[
            "Check that the collection is not open in another profile",
            "Make sure the add-on has permission to modify note types",
        ],
        &[],
    ),
    (
        ErrorCode::InvalidPayload,
        "The designer sent data Anki could not understand",
        &[
            "Update the add-on to the latest version",
            "Report the problem with the steps that led to it",
        ],
        &[],
    ),
];

/// Message shown when no guidance exists for a code
pub const GENERIC_MESSAGE: &str = "Something went wrong";

/// Catalog of error guidance
///
/// Built-in entries cover every known `ErrorCode`. Extra codes can be
/// registered at runtime for custom error domains; a later registration for
/// the same code replaces the earlier one.
#[derive(Debug, Clone)]
pub struct SuggestionCatalog {
    entries: HashMap<String, ErrorSuggestion>,
}

impl SuggestionCatalog {
    /// Catalog containing only the built-in entries
    ///
    /// Returns an owned copy of [`shared`](Self::shared), so runtime
    /// registrations on it never leak into other catalogs.
    pub fn builtin() -> Self {
        Self::shared().clone()
    }

    /// Process-wide built-in catalog, built on first use
    pub fn shared() -> &'static SuggestionCatalog {
        static BUILTIN_CATALOG: OnceLock<SuggestionCatalog> = OnceLock::new();
        BUILTIN_CATALOG.get_or_init(Self::from_table)
    }

    fn from_table() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|(code, message, suggestions, examples)| {
                (
                    code.as_str().to_string(),
                    ErrorSuggestion::new(code.as_str(), *message, suggestions, examples),
                )
            })
            .collect();
        Self { entries }
    }

    /// Look up guidance for a typed code.
    ///
    /// Known codes always resolve. `Unknown` codes resolve only if they were
    /// registered with [`add_suggestion`](Self::add_suggestion).
    pub fn get_suggestion(&self, code: &ErrorCode) -> Option<&ErrorSuggestion> {
        self.entries.get(code.as_str())
    }

    /// Look up guidance for a raw code from an untyped source
    ///
    /// Returns `None` for anything the catalog does not contain.
    pub fn lookup_raw(&self, raw: &str) -> Option<&ErrorSuggestion> {
        self.get_suggestion(&ErrorCode::parse(raw))
    }

    /// Register guidance for a code, replacing any previous entry
    pub fn add_suggestion(&mut self, code: impl Into<String>, suggestion: ErrorSuggestion) {
        self.entries.insert(code.into(), suggestion);
    }

    /// Guidance for a code, or a generic entry when there is none
    pub fn suggestion_or_default(&self, code: &ErrorCode) -> ErrorSuggestion {
        self.get_suggestion(code).cloned().unwrap_or_else(|| {
            ErrorSuggestion::new(
                code.as_str(),
                GENERIC_MESSAGE,
                &["Try again", "Restart Anki if the problem persists"],
                &[],
            )
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SuggestionCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Render guidance as plain text for an error panel or terminal
pub fn format_suggestion(suggestion: &ErrorSuggestion) -> String {
    let mut out = format!("{} ({})", suggestion.message, suggestion.code);

    if !suggestion.suggestions.is_empty() {
        out.push_str("\n\nSuggestions:");
        for item in &suggestion.suggestions {
            out.push_str("\n  • ");
            out.push_str(item);
        }
    }

    if !suggestion.examples.is_empty() {
        out.push_str("\n\nExamples:");
        for item in &suggestion.examples {
            out.push_str("\n  ");
            out.push_str(item);
        }
    }

    out
}
