//! Error types for the registry core

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Referenced entity id does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation, or a delete/deactivate blocked by dependents.
    #[error("{0}")]
    Conflict(String),

    /// Invalid state transition, inactive parent, or empty-after-normalization input.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),

    /// Constraint violation reported by the storage engine, not yet mapped to a domain error.
    #[error("Constraint violation: {0}")]
    Constraint(ConstraintViolation),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// The four outcome kinds surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    BadRequest,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::BadRequest(_) => ErrorKind::BadRequest,
            Error::Internal(_)
            | Error::Constraint(_)
            | Error::Database(_)
            | Error::Config(_) => ErrorKind::Internal,
        }
    }

    /// True for errors that pass through governed operations unchanged.
    pub fn is_domain(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Internal)
    }

    /// Wrap anything that is not a domain error as `Internal`, keeping the original message.
    pub(crate) fn wrap_internal(self, context: &str) -> Self {
        if self.is_domain() {
            return self;
        }
        Error::Internal(format!("{}: {}", context, self))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
}

/// A storage-level constraint failure with a hint naming the violated column or constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintViolation {
    pub kind: ConstraintKind,
    pub hint: Option<String>,
}

impl ConstraintViolation {
    pub fn unique(hint: impl Into<String>) -> Self {
        Self {
            kind: ConstraintKind::Unique,
            hint: Some(hint.into()),
        }
    }

    pub fn foreign_key(hint: impl Into<String>) -> Self {
        Self {
            kind: ConstraintKind::ForeignKey,
            hint: Some(hint.into()),
        }
    }

    /// Case-insensitive substring match against the hint.
    pub fn mentions(&self, needle: &str) -> bool {
        self.hint
            .as_deref()
            .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
            .unwrap_or(false)
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ConstraintKind::Unique => "unique",
            ConstraintKind::ForeignKey => "foreign key",
        };
        match &self.hint {
            Some(hint) => write!(f, "{} ({})", kind, hint),
            None => write!(f, "{}", kind),
        }
    }
}
