//! Input/Output handling for datasets and the CLI.
//!
//! This module provides:
//! - Readers and writers for `.fvecs` / `.ivecs` files
//! - Exit codes that map errors onto stable process statuses

pub mod exit_code;
pub mod vecs;

pub use exit_code::ExitCode;
pub use vecs::{GroundTruth, VecsError, read_fvecs, read_ivecs, write_fvecs, write_ivecs};
