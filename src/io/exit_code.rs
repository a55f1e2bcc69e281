//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success
//! - `1`: General error - unspecified failure
//! - `2`: Blocking error - resources exhausted, retrying will not help
//! - `3-125`: Specific recoverable errors
//! - `126-255`: Reserved by shell

use crate::error::IndexError;
use crate::vector::VectorError;

/// Standard exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Run completed (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Allocation or worker pool failure (code 2)
    BlockingError = 2,

    /// Dataset file could not be read or decoded (code 5)
    IoError = 5,

    /// Invalid parameters or settings (code 6)
    ConfigError = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl ExitCode {
    /// Convert an `IndexError` to the appropriate exit code.
    pub fn from_error(error: &IndexError) -> Self {
        match error {
            _ if error.is_config_error() => ExitCode::ConfigError,

            IndexError::Vecs(_) => ExitCode::IoError,

            IndexError::Vector(VectorError::Allocation { .. }) | IndexError::ThreadPool { .. } => {
                ExitCode::BlockingError
            }

            _ => ExitCode::GeneralError,
        }
    }

    /// Human-readable label printed ahead of a failure message.
    pub fn description(&self) -> &'static str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::BlockingError => "Blocking error - resources exhausted",
            ExitCode::IoError => "Dataset I/O error",
            ExitCode::ConfigError => "Configuration error",
        }
    }
}
