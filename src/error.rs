use std::io::Error as IoError;

use regex::Error as RegexError;
use thiserror::Error;

/// Failures of the I/O and configuration surface. Sanitizing itself never fails.
#[derive(Error, Debug)]
pub enum SanitizeError {
    #[error("I/O failure: {0}")]
    Io(#[from] IoError),
    #[error("invalid attribute pattern: {0}")]
    InvalidPattern(#[from] RegexError),
    #[error("invalid rule `{0}`")]
    InvalidRule(String),
}

pub type Result<T> = std::result::Result<T, SanitizeError>;
