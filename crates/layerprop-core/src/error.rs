//! Error types for layerprop
//!
//! Errors are structured: a kind, the property key involved (when there is
//! one), the source location, and an actionable help message.

use std::fmt;

/// Result type alias for layerprop operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for layerprop operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Property key the error relates to (e.g., "database.port")
    pub key: Option<String>,
    /// Source location (file, line) if available
    pub source_location: Option<SourceLocation>,
    /// Actionable help message
    pub help: Option<String>,
    /// Underlying cause (as string for Clone compatibility)
    pub cause: Option<String>,
}

/// Location in a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Syntax error in a properties, YAML or JSON source
    Parse,
    /// A required source could not be read
    SourceUnavailable { source: String },
    /// One or more placeholders could not be expanded
    UnresolvablePlaceholders {
        unresolved: Vec<UnresolvedPlaceholder>,
    },
    /// A stored value could not be converted to the requested type
    ValueParse { expected: String, value: String },
    /// Build options are not usable (e.g. empty delimiters)
    InvalidOptions,
    /// I/O error other than a missing source
    Io,
}

/// A placeholder that could not be expanded, with the property it appears in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedPlaceholder {
    /// Key of the property whose value holds the placeholder
    pub key: String,
    /// The placeholder text as it remains in the value
    pub placeholder: String,
    /// Why the expansion failed
    pub reason: UnresolvedReason,
}

/// Why a placeholder could not be expanded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The referenced key is not defined and no default was given
    Missing { key: String },
    /// Expanding the referenced key re-enters a key already being expanded
    Circular { chain: Vec<String> },
    /// Rescanning kept producing new placeholder text
    TooManyPasses { passes: usize },
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnresolvedReason::Missing { key } => write!(f, "'{}' is not defined", key),
            UnresolvedReason::Circular { chain } => {
                write!(f, "circular reference: {}", chain.join(" → "))
            }
            UnresolvedReason::TooManyPasses { passes } => {
                write!(f, "still expanding after {} passes", passes)
            }
        }
    }
}

impl Error {
    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Parse,
            key: None,
            source_location: None,
            help: None,
            cause: Some(message.into()),
        }
    }

    /// Create a source unavailable error (e.g. a required file is missing)
    pub fn source_unavailable(source: impl Into<String>, cause: impl Into<String>) -> Self {
        let source = source.into();
        Self {
            kind: ErrorKind::SourceUnavailable {
                source: source.clone(),
            },
            key: None,
            source_location: None,
            help: Some(format!(
                "Check that '{}' exists, or register it as optional",
                source
            )),
            cause: Some(cause.into()),
        }
    }

    /// Create an unresolvable placeholders error listing every failure
    pub fn unresolvable(unresolved: Vec<UnresolvedPlaceholder>) -> Self {
        Self {
            kind: ErrorKind::UnresolvablePlaceholders { unresolved },
            key: None,
            source_location: None,
            help: Some(
                "Define the missing keys, add defaults (${key:default}) or enable \
                 ignore_unresolvable_placeholders"
                    .into(),
            ),
            cause: None,
        }
    }

    /// Create a value parse error for a typed accessor
    pub fn value_parse(
        key: impl Into<String>,
        expected: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let expected = expected.into();
        Self {
            kind: ErrorKind::ValueParse {
                expected: expected.clone(),
                value: value.into(),
            },
            key: Some(key.into()),
            source_location: None,
            help: Some(format!("Ensure the value can be converted to {}", expected)),
            cause: None,
        }
    }

    /// Create an invalid options error
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidOptions,
            key: None,
            source_location: None,
            help: None,
            cause: Some(message.into()),
        }
    }

    /// Create an I/O error for a source
    pub fn io(source: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Io,
            key: None,
            source_location: Some(SourceLocation {
                file: source.into(),
                line: None,
                column: None,
            }),
            help: None,
            cause: Some(cause.into()),
        }
    }

    /// Add key context to the error
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Add source location to the error
    pub fn with_source_location(mut self, loc: SourceLocation) -> Self {
        self.source_location = Some(loc);
        self
    }

    /// Add help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// The unresolved placeholders carried by this error, if any
    pub fn unresolved(&self) -> &[UnresolvedPlaceholder] {
        match &self.kind {
            ErrorKind::UnresolvablePlaceholders { unresolved } => unresolved,
            _ => &[],
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Parse => write!(f, "Parse error")?,
            ErrorKind::SourceUnavailable { source } => {
                write!(f, "Source unavailable: {}", source)?
            }
            ErrorKind::UnresolvablePlaceholders { unresolved } => {
                write!(f, "Unresolvable placeholders:")?;
                for entry in unresolved {
                    write!(
                        f,
                        "\n  key: [{}] placeholder: [{}] ({})",
                        entry.key, entry.placeholder, entry.reason
                    )?;
                }
            }
            ErrorKind::ValueParse { expected, value } => {
                write!(f, "Cannot parse value [{}] as {}", value, expected)?
            }
            ErrorKind::InvalidOptions => write!(f, "Invalid build options")?,
            ErrorKind::Io => write!(f, "I/O error")?,
        }

        if let Some(key) = &self.key {
            write!(f, "\n  Key: {}", key)?;
        }

        if let Some(loc) = &self.source_location {
            write!(f, "\n  File: {}", loc.file)?;
            if let Some(line) = loc.line {
                write!(f, ":{}", line)?;
            }
        }

        if let Some(cause) = &self.cause {
            write!(f, "\n  {}", cause)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}
