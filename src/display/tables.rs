//! Table formatting utilities for structured output.

use comfy_table::{
    Attribute, Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL,
};

use crate::display::report::BenchmarkReport;

/// Recall at or above this is shown as healthy.
const RECALL_TARGET: f64 = 0.9;

/// Builder for creating formatted tables.
pub struct TableBuilder {
    table: Table,
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TableBuilder {
    /// Create a new table builder.
    pub fn new() -> Self {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.apply_modifier(UTF8_ROUND_CORNERS);
        Self { table }
    }

    /// Set the table headers.
    pub fn set_headers(mut self, headers: Vec<&str>) -> Self {
        let header_cells: Vec<Cell> = headers
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
            .collect();
        self.table.set_header(header_cells);
        self
    }

    /// Add a row to the table.
    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.table.add_row(row);
        self
    }

    /// Add a row of prepared cells.
    pub fn add_cells(mut self, row: Vec<Cell>) -> Self {
        self.table.add_row(row);
        self
    }

    /// Build and return the formatted table.
    pub fn build(self) -> String {
        self.table.to_string()
    }
}

fn metric(name: &str, value: String) -> Vec<String> {
    vec![name.to_string(), value]
}

/// Create the results table for one benchmark run.
pub fn create_report_table(report: &BenchmarkReport) -> String {
    let mut table = TableBuilder::new()
        .set_headers(vec!["Metric", "Value"])
        .add_row(metric(
            "Search",
            format!("{} ({} threads)", report.mode, report.threads),
        ))
        .add_row(metric(
            "Dataset",
            format!(
                "{} base x {} queries, dim {}",
                report.base_vectors, report.queries, report.dimension
            ),
        ))
        .add_row(metric("k", report.k.to_string()));

    if let Some(build) = &report.build {
        let probes = report.candidate_clusters.unwrap_or_default();
        let clusters = report.cluster_sizes.as_ref().map_or(0, Vec::len);
        table = table
            .add_row(metric(
                "Index",
                format!("{} clusters ({}), probe {probes}", clusters, build.strategy),
            ))
            .add_row(metric(
                "Build time",
                format!("{:.1} ms", build.elapsed.as_secs_f64() * 1000.0),
            ))
            .add_row(metric(
                "Build iterations",
                format!(
                    "{}{}",
                    build.iterations,
                    if build.converged { " (converged)" } else { "" }
                ),
            ));
        if build.reinitialized_clusters > 0 {
            table = table.add_row(metric(
                "Reseeded clusters",
                build.reinitialized_clusters.to_string(),
            ));
        }
    }

    table = table
        .add_row(metric("Search time", format!("{:.1} ms", report.search_ms)))
        .add_row(metric(
            "Throughput",
            format!("{:.0} queries/s", report.throughput_qps),
        ))
        .add_row(metric("Latency", format!("{:.4} ms/query", report.latency_ms)));

    if let Some(recall) = report.recall {
        let color = if recall >= RECALL_TARGET {
            Color::Green
        } else {
            Color::Yellow
        };
        table = table.add_cells(vec![
            Cell::new("Recall"),
            Cell::new(format!("{recall:.4}"))
                .fg(color)
                .add_attribute(Attribute::Bold),
        ]);
    }

    table.build()
}

/// Create a cluster size summary: smallest, median, largest, empty count.
pub fn create_cluster_table(sizes: &[usize]) -> String {
    let mut sorted = sizes.to_vec();
    sorted.sort_unstable();
    let empty = sorted.iter().take_while(|&&s| s == 0).count();
    let (min, median, max) = match sorted.as_slice() {
        [] => (0, 0, 0),
        all => (all[0], all[all.len() / 2], all[all.len() - 1]),
    };

    TableBuilder::new()
        .set_headers(vec!["Clusters", "Min", "Median", "Max", "Empty"])
        .add_row(vec![
            sizes.len().to_string(),
            min.to_string(),
            median.to_string(),
            max.to_string(),
            empty.to_string(),
        ])
        .build()
}
