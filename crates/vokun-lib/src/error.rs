use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Convenient result alias for the vokun library.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of library failures.
///
/// Callers that only need to pick a response status should match on this
/// instead of the full [`Error`] enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The fixture file for a subpath/verb pair does not exist or is unreadable.
    NotFound,
    /// The fixture file exists but has no sentinel or unparseable metadata.
    MalformedFixture,
    /// Any datastore read, write or (de)serialization failure.
    Internal,
}

impl ErrorKind {
    /// Stable lowercase label, used in logs and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not-found",
            ErrorKind::MalformedFixture => "malformed-fixture",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level library error type.
#[derive(Debug, Error)]
pub enum Error {
    /// No fixture file could be read at the resolved path.
    #[error("cannot generate response: cannot read fixture file {path}")]
    FixtureNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The subpath would resolve outside of the fixture root.
    #[error("cannot generate response: subpath {subpath:?} escapes the fixture root")]
    FixtureOutsideRoot { subpath: String },

    /// The fixture has no line consisting solely of `---`.
    #[error("cannot generate response: fixture {path} has no `---` separator line")]
    MissingSentinel { path: PathBuf, content: String },

    /// The block before the separator is not valid fixture metadata.
    #[error("cannot parse fixture metadata in {path}: {source}")]
    InvalidMetadata {
        path: PathBuf,
        metadata: String,
        #[source]
        source: serde_json::Error,
    },

    /// A stored row did not have the expected shape.
    #[error("unexpected value in column {column}: {message}")]
    InvalidRow { column: String, message: String },

    /// Raised by non-SQLite datastore implementations.
    #[error("datastore failure: {message}")]
    Datastore { message: String },

    /// Wrapper for SQLite errors.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    /// No pooled connection could be checked out.
    #[error("connection pool: {0}")]
    Pool(#[from] r2d2::Error),

    /// Wrapper for JSON (de)serialization errors on stored blobs.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::FixtureNotFound { .. } | Error::FixtureOutsideRoot { .. } => {
                ErrorKind::NotFound
            }
            Error::MissingSentinel { .. } | Error::InvalidMetadata { .. } => {
                ErrorKind::MalformedFixture
            }
            Error::InvalidRow { .. }
            | Error::Datastore { .. }
            | Error::Sqlite(_)
            | Error::Pool(_)
            | Error::Json(_) => ErrorKind::Internal,
        }
    }

    /// Build a [`Error::Datastore`] from any displayable cause.
    pub fn datastore(message: impl fmt::Display) -> Self {
        Error::Datastore {
            message: message.to_string(),
        }
    }

    /// Raw fixture text attached to this error, for diagnostics.
    pub fn fixture_content(&self) -> Option<&str> {
        match self {
            Error::MissingSentinel { content, .. } => Some(content),
            Error::InvalidMetadata { metadata, .. } => Some(metadata),
            _ => None,
        }
    }
}
