//! Terminal output formatting for the CLI binaries.

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets};
use owo_colors::OwoColorize;
use xenon_carver::Manifest;

/// Style configuration for terminal output.
pub struct OutputStyle {
    /// Whether to use colors in output.
    pub use_color: bool,
}

impl Default for OutputStyle {
    fn default() -> Self {
        Self {
            use_color: std::env::var("NO_COLOR").is_err(),
        }
    }
}

impl OutputStyle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Format a section header.
pub fn format_header(text: &str, style: &OutputStyle) -> String {
    if style.use_color {
        text.bold().bright_blue().to_string()
    } else {
        text.to_string()
    }
}

/// Format a success message.
pub fn format_success(text: &str, style: &OutputStyle) -> String {
    if style.use_color {
        text.green().to_string()
    } else {
        text.to_string()
    }
}

/// Format an error message.
pub fn format_error(text: &str, style: &OutputStyle) -> String {
    if style.use_color {
        text.red().bold().to_string()
    } else {
        text.to_string()
    }
}

/// Per-type summary table for one or more carve manifests.
pub fn summary_table(manifests: &[Manifest]) -> Table {
    let mut totals: std::collections::BTreeMap<String, (u64, u64, u64)> = std::collections::BTreeMap::new();
    for manifest in manifests {
        for (file_type, stats) in &manifest.summary.by_type {
            let entry = totals.entry(file_type.clone()).or_default();
            entry.0 += stats.files;
            entry.1 += stats.bytes_in_dump;
            entry.2 += stats.bytes_output;
        }
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Type", "Files", "Bytes in dump", "Bytes output"]);
    for (file_type, (files, bytes_in_dump, bytes_output)) in totals {
        table.add_row(vec![
            Cell::new(file_type),
            Cell::new(files).set_alignment(CellAlignment::Right),
            Cell::new(bytes_in_dump).set_alignment(CellAlignment::Right),
            Cell::new(bytes_output).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
