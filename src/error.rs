//! Error types for inbox-rules.

use std::fmt;

use serde::Serialize;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Mail service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Rule set rejected: {0}")]
    RuleSet(#[from] RuleSetError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Schema setup failed: {0}")]
    Schema(String),

    #[error("Row decode failed: {0}")]
    Decode(String),
}

/// Errors reported by the remote mail service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// Network failure or a retryable status from the provider.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The message no longer exists remotely.
    #[error("message not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Any other non-success answer from the provider.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// A single problem found while validating a rule document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Location inside the document, e.g. `[1].properties[0].predicate`.
    pub path: String,
    #[serde(flatten)]
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.path, self.kind)
        }
    }
}

/// What went wrong at a [`ValidationError`] location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationErrorKind {
    /// The document shape is wrong (missing key, wrong JSON type).
    #[error("schema error: {message}")]
    Schema { message: String },

    #[error("unknown value '{value}', expected one of: {expected}")]
    UnknownVariant { value: String, expected: String },

    #[error("'{what}' must not be empty")]
    Empty { what: String },

    #[error("predicate ({predicate}) not supported for field ({field})")]
    IncompatiblePredicate { field: String, predicate: String },

    #[error("value not in valid pattern ({value}), use days or months, e.g. 1days, 1months")]
    InvalidDateValue { value: String },

    #[error("operation 'move' requires a destination")]
    MissingDestination,
}

/// Every validation problem found in a rule document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSetError {
    pub errors: Vec<ValidationError>,
}

impl fmt::Display for RuleSetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.errors.len())?;
        for error in &self.errors {
            write!(f, "; {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RuleSetError {}

/// Failure turning a validated property into a predicate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("relative date '{value}' is out of range")]
    DateOutOfRange { value: String },

    #[error("relative date '{value}' could not be parsed")]
    MalformedDate { value: String },

    #[error("predicate {predicate} cannot be applied to field {field}")]
    UnsupportedCombination { field: String, predicate: String },
}

/// Mailbox ingestion errors.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("store already holds {count} record(s); set INBOX_RULES_REPLACE_EXISTING=true to replace them")]
    StoreNotEmpty { count: usize },

    #[error("listing messages failed: {0}")]
    Listing(#[from] ServiceError),

    #[error("store write failed: {0}")]
    Store(#[from] DatabaseError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
