//! Error types for the crate.
//!
//! Internally everything is an `anyhow::Error` (see `Res`). At the public boundary errors are
//! wrapped in `Error`, which carries an `ErrorType` so callers can tell a bad form field from a
//! failed write without parsing messages.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub(crate) type Res<T> = std::result::Result<T, anyhow::Error>;
pub type Result<T> = std::result::Result<T, Error>;

/// The category of a public error.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// Bad or missing user input. Nothing was changed.
    Validation,
    /// A write to, or subscription on, the shared document failed. Local state is kept.
    Persistence,
    /// Sign-in failed or no admin is signed in.
    Auth,
    /// The foundation home directory or its configuration is unusable.
    Config,
    /// Anything else.
    Internal,
}

serde_plain::derive_display_from_serialize!(ErrorType);
serde_plain::derive_fromstr_from_deserialize!(ErrorType);

/// The public error type.
#[derive(Debug)]
pub struct Error {
    error_type: ErrorType,
    source: anyhow::Error,
}

impl Error {
    pub(crate) fn new(error_type: ErrorType, source: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            source: source.into(),
        }
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {:#}", self.error_type, self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Converts an internal result into a public `Result` tagged with an `ErrorType`.
pub(crate) trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Error::new(error_type, e))
    }
}

/// Shorthand for a `Validation` error with a message.
pub(crate) fn validation(message: impl Display) -> Error {
    Error::new(ErrorType::Validation, anyhow::anyhow!("{message}"))
}
