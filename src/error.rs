//! Application-level error carrying the process exit code.
//!
//! Pipeline stages return their own typed errors; they are folded into
//! `AppError` at the app boundary so `main` only has to print and exit.
//!
//! Exit codes:
//! - `2` configuration or filesystem problems
//! - `3` data integrity (unmapped period codes)
//! - `4` fetch/payload failures and terminal errors

use crate::config::ConfigError;
use crate::data::cadprev::FetchError;
use crate::io::ingest::NormalizeError;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::new(2, err.to_string())
    }
}

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        AppError::new(4, err.to_string())
    }
}

impl From<NormalizeError> for AppError {
    fn from(err: NormalizeError) -> Self {
        let code = match err {
            NormalizeError::Mapping { .. } => 3,
            NormalizeError::Malformed(_) => 4,
        };
        AppError::new(code, err.to_string())
    }
}
