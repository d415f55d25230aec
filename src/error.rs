//! Error types for xsdbind
//!
//! The taxonomy follows the stages of the engine: resolving schema
//! components, decoding structure, validating documents, converting
//! primitive text and encoding instances.

use std::fmt;
use thiserror::Error;

/// Result type alias using xsdbind Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xsdbind operations
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown type, element, group, namespace or namespace prefix
    #[error("schema resolution error: {0}")]
    SchemaResolution(String),

    /// Cardinality violation while decoding or constructing an instance
    #[error("structural error: {0}")]
    Structural(String),

    /// Structural validator rejected a document
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Malformed primitive text
    #[error("conversion error: {0}")]
    Conversion(String),

    /// A value cannot be reconciled with its field's declared type
    #[error("unknown type target: {0}")]
    UnknownTypeTarget(String),

    /// The schema uses a construct in a way the compiler cannot accept
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// A schema or document could not be read
    #[error("resource error: {0}")]
    Resource(String),

    /// Malformed XML name
    #[error("name error: {0}")]
    Name(String),

    /// A resource limit was exceeded
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// XML parsing or writing error
    #[error("XML error: {0}")]
    Xml(String),

    /// Malformed schema location URL
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Build a structural error for a named field
    pub fn structural(field: &str, message: impl Into<String>) -> Self {
        Error::Structural(format!("{} ({})", message.into(), field))
    }

    /// Check whether lax mode may recover from this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Structural(_) | Error::UnknownTypeTarget(_))
    }
}

/// One problem reported by the structural validator
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// What is wrong
    pub message: String,
    /// Slash-separated element path of the offending node
    pub path: Option<String>,
    /// Further detail, such as the expected occurrence range
    pub reason: Option<String>,
}

impl ValidationError {
    /// Error with a message only
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            reason: None,
        }
    }

    /// Attach the element path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach further detail
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{}: ", path)?;
        }
        f.write_str(&self.message)?;
        match &self.reason {
            Some(reason) => write!(f, " ({})", reason),
            None => Ok(()),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Ordered collection of validation errors produced by one validator run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationLog {
    errors: Vec<ValidationError>,
}

impl ValidationLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error
    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Check if the log has no entries
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Iterate over the entries in the order they were found
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Collapse the log into a single error, first entry first
    pub fn into_error(self) -> ValidationError {
        let mut iter = self.errors.into_iter();
        let Some(mut first) = iter.next() else {
            return ValidationError::new("document is not valid");
        };
        let rest: Vec<String> = iter.map(|e| e.message).collect();
        if !rest.is_empty() {
            let reason = match first.reason.take() {
                Some(r) => format!("{}; {}", r, rest.join("; ")),
                None => rest.join("; "),
            };
            first.reason = Some(reason);
        }
        first
    }
}

impl fmt::Display for ValidationLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        f.write_str(&lines.join("\n"))
    }
}
