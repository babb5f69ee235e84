//! Error types for semantic analysis.

use thiserror::Error;

/// Result type alias using [`SqlsemError`].
pub type Result<T> = std::result::Result<T, SqlsemError>;

/// Error types produced while parsing and analyzing statements.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlsemError {
    /// Parse error with location information.
    #[error("Parse error at line {line}, column {col}: {message}")]
    ParseError {
        line: usize,
        col: usize,
        message: String,
    },

    /// The statement uses a construct this planner does not handle.
    #[error("{0}")]
    Unsupported(String),

    /// A construct the current planner generation has not implemented yet.
    ///
    /// `site` names the check that raised the error so it can be found
    /// without relying on stack traces.
    #[error("planner does not yet support: {message}")]
    NotYetSupported { message: String, site: &'static str },

    /// Structurally malformed usage (misplaced INTO, duplicate column names, ...).
    #[error("{0}")]
    InvalidArgument(String),

    /// A table or column name that does not resolve in any visible scope.
    #[error("{0}")]
    UnresolvedReference(String),

    /// A column name that resolves to more than one visible table.
    #[error("{0}")]
    AmbiguousReference(String),

    /// Failure reported by the schema collaborator.
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Broken analyzer invariant, never caused by the statement itself.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Classification of a [`SqlsemError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Syntax error in the statement text.
    Parse,
    /// Unsupported or not yet supported SQL feature.
    UnsupportedConstruct,
    /// Structurally malformed usage.
    InvalidArgument,
    /// Unknown table or column.
    UnresolvedReference,
    /// Column reference matching more than one table.
    AmbiguousReference,
    /// Schema lookup failure.
    Schema,
    /// Analyzer bug.
    Internal,
}

impl SqlsemError {
    /// Creates a "not yet supported" error tagged with the raising site.
    #[must_use]
    pub fn not_yet_supported(site: &'static str, message: impl Into<String>) -> Self {
        SqlsemError::NotYetSupported {
            message: message.into(),
            site,
        }
    }

    /// Returns the classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            SqlsemError::ParseError { .. } => ErrorKind::Parse,
            SqlsemError::Unsupported(_) | SqlsemError::NotYetSupported { .. } => {
                ErrorKind::UnsupportedConstruct
            }
            SqlsemError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SqlsemError::UnresolvedReference(_) => ErrorKind::UnresolvedReference,
            SqlsemError::AmbiguousReference(_) => ErrorKind::AmbiguousReference,
            SqlsemError::SchemaError(_) => ErrorKind::Schema,
            SqlsemError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Returns the diagnostic site for "not yet supported" errors.
    #[must_use]
    pub fn diagnostic_site(&self) -> Option<&'static str> {
        match self {
            SqlsemError::NotYetSupported { site, .. } => Some(site),
            _ => None,
        }
    }
}
