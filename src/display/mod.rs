//! Terminal display utilities for benchmark output.
//!
//! Provides the run report and the tables that render it.

pub mod report;
pub mod tables;

pub use report::{BenchmarkReport, SearchMode};
pub use tables::{TableBuilder, create_cluster_table, create_report_table};
