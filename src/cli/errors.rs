//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero status. Definition errors
//! keep their own `META_DEFINITION_*` code in the message.

use std::fmt;
use std::io;

use serde_json::Value;

use crate::schema::{DefinitionError, ValidationErrors};

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdin/stdout)
    IoError,
    /// Definitions could not be loaded or compiled
    CompileFailed,
    /// Class not present in the registry
    UnknownClass,
    /// Record rejected by validation
    ValidationFailed,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "META_CLI_CONFIG_ERROR",
            Self::IoError => "META_CLI_IO_ERROR",
            Self::CompileFailed => "META_CLI_COMPILE_FAILED",
            Self::UnknownClass => "META_CLI_UNKNOWN_CLASS",
            Self::ValidationFailed => "META_CLI_VALIDATION_FAILED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
    details: Option<Value>,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn unknown_class(class: &str) -> Self {
        Self::new(CliErrorCode::UnknownClass, format!("Unknown class '{}'", class))
    }

    /// Rejection carrying every failure as `details`
    pub fn validation_failed(errors: &ValidationErrors) -> Self {
        let failures: Vec<Value> = errors.failures().iter().map(|f| f.describe()).collect();
        Self {
            code: CliErrorCode::ValidationFailed,
            message: format!(
                "{} problem(s) with record of class '{}'",
                errors.len(),
                errors.class()
            ),
            details: Some(Value::Array(failures)),
        }
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured detail attached to the error response, if any
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<DefinitionError> for CliError {
    fn from(e: DefinitionError) -> Self {
        Self::new(
            CliErrorCode::CompileFailed,
            format!("[{}] {}: {}", e.severity(), e.code(), e),
        )
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
