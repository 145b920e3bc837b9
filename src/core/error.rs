use std::collections::BTreeMap;
use std::fmt;

use crate::core::types::ResourceKind;

/// Error classes surfaced by the data-access core.
///
/// `NotFound` deliberately covers both "no such row" and "caller has no
/// visibility", and `EditConflict` covers both "stale version" and
/// "insufficient write permission". Callers cannot tell these apart.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    NotFound,
    EditConflict,
    QuotaExceeded { limit: u32 },
    Validation(BTreeMap<String, String>),
    Transient,
    InvalidArgument,
    Internal,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn not_found() -> Self {
        Error {
            kind: ErrorKind::NotFound,
            context: "record not found".to_string(),
        }
    }

    pub fn edit_conflict() -> Self {
        Error {
            kind: ErrorKind::EditConflict,
            context: "edit conflict".to_string(),
        }
    }

    pub fn quota_exceeded(kind: ResourceKind, limit: u32) -> Self {
        Error {
            kind: ErrorKind::QuotaExceeded { limit },
            context: format!(
                "{} creation quota reached ({} per day, renews at midnight UTC)",
                kind.as_str(),
                limit
            ),
        }
    }

    pub fn validation(errors: BTreeMap<String, String>) -> Self {
        Error {
            kind: ErrorKind::Validation(errors),
            context: "validation failed".to_string(),
        }
    }

    pub fn transient(context: String) -> Self {
        Error {
            kind: ErrorKind::Transient,
            context,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Transient
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ErrorKind::NotFound => write!(f, "not found: {}", self.context),
            ErrorKind::EditConflict => write!(f, "edit conflict: {}", self.context),
            ErrorKind::QuotaExceeded { limit } => {
                write!(f, "quota exceeded (limit {}): {}", limit, self.context)
            }
            ErrorKind::Validation(errors) => {
                write!(f, "validation failed:")?;
                for (field, message) in errors {
                    write!(f, " {}: {};", field, message)?;
                }
                Ok(())
            }
            ErrorKind::Transient => write!(f, "transient store failure: {}", self.context),
            ErrorKind::InvalidArgument => write!(f, "invalid argument: {}", self.context),
            ErrorKind::Internal => write!(f, "internal error: {}", self.context),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
