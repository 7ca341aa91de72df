//! Output formatter for human-readable and JSON output
//!
//! Ensures consistent output formatting across all commands.

use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::{ContentArrangement, Table};
use r2up_core::{BatchResult, UploadResult};
use serde::Serialize;

use super::OutputConfig;

/// Formatter for CLI output
///
/// When JSON mode is enabled, all output is strict JSON without colors or progress.
#[derive(Debug, Clone)]
pub struct Formatter {
    config: OutputConfig,
}

impl Formatter {
    /// Create a new formatter with the given configuration
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Check if JSON output mode is enabled
    pub fn is_json(&self) -> bool {
        self.config.json
    }

    /// Check if quiet mode is enabled
    pub fn is_quiet(&self) -> bool {
        self.config.quiet
    }

    /// Check if colors are enabled
    pub fn colors_enabled(&self) -> bool {
        !self.config.no_color && !self.config.json
    }

    fn paint(&self, code: &str, symbol: &str) -> String {
        if self.colors_enabled() {
            format!("\x1b[{code}m{symbol}\x1b[0m")
        } else {
            symbol.to_string()
        }
    }

    /// Output a success message
    pub fn success(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        println!("{} {message}", self.paint("32", "✓"));
    }

    /// Output an error message
    ///
    /// Errors are always printed, even in quiet mode.
    pub fn error(&self, message: &str) {
        if self.config.json {
            let error = serde_json::json!({ "error": message });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&error).unwrap_or_else(|_| message.to_string())
            );
        } else {
            eprintln!("{} {message}", self.paint("31", "✗"));
        }
    }

    /// Output a warning message
    pub fn warning(&self, message: &str) {
        if self.config.quiet || self.config.json {
            return;
        }
        eprintln!("{} {message}", self.paint("33", "⚠"));
    }

    /// Output JSON directly
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error serializing output: {e}"),
        }
    }

    /// Print a line of text (respects quiet mode)
    pub fn println(&self, message: &str) {
        if self.config.quiet {
            return;
        }
        println!("{message}");
    }

    /// Print a table (respects quiet mode)
    pub fn table(&self, table: &Table) {
        if self.config.quiet {
            return;
        }
        println!("{table}");
    }

    /// Empty table with this formatter's styling
    pub fn new_table(&self, header: &[&str]) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_BORDERS_ONLY)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(header.iter().copied());
        if !self.colors_enabled() {
            table.force_no_tty();
        }
        table
    }

    /// Report one file upload
    pub fn upload_result(&self, result: &UploadResult) {
        if self.config.json {
            self.json(result);
            return;
        }
        self.upload_line(result);
    }

    fn upload_line(&self, result: &UploadResult) {
        if result.success {
            let size = result
                .file_size
                .map(|s| humansize::format_size(s, humansize::BINARY))
                .unwrap_or_default();
            let parts = match result.parts_count {
                Some(n) if n > 1 => format!(", {n} parts"),
                _ => String::new(),
            };
            self.success(&format!(
                "{} -> {} ({size}{parts})",
                result.local_path.display(),
                result.remote_key
            ));
            if let Some(url) = &result.url {
                self.println(&format!("  {url}"));
            }
        } else {
            self.error(&format!(
                "{}: {}",
                result.local_path.display(),
                result.error.as_deref().unwrap_or("upload failed")
            ));
        }
    }

    /// Report a directory upload
    pub fn batch_result(&self, batch: &BatchResult) {
        if self.config.json {
            self.json(batch);
            return;
        }
        for result in &batch.files {
            self.upload_line(result);
        }
        let summary = format!(
            "{} of {} file(s) uploaded, {} failed.",
            batch.succeeded, batch.total, batch.failed
        );
        if batch.all_succeeded() {
            self.success(&summary);
        } else {
            self.warning(&summary);
        }
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatter_default() {
        let formatter = Formatter::default();
        assert!(!formatter.is_json());
        assert!(!formatter.is_quiet());
        assert!(formatter.colors_enabled());
    }

    #[test]
    fn test_formatter_json_mode_disables_colors() {
        let formatter = Formatter::new(OutputConfig {
            json: true,
            ..Default::default()
        });
        assert!(formatter.is_json());
        assert!(!formatter.colors_enabled());
        assert_eq!(formatter.paint("32", "✓"), "✓");
    }

    #[test]
    fn test_paint_wraps_in_ansi_codes() {
        let formatter = Formatter::default();
        assert_eq!(formatter.paint("31", "✗"), "\x1b[31m✗\x1b[0m");
    }

    #[test]
    fn test_table_has_header_and_rows() {
        let formatter = Formatter::new(OutputConfig {
            no_color: true,
            ..Default::default()
        });
        let mut table = formatter.new_table(&["Key", "Size"]);
        table.add_row(vec!["a.txt", "3 B"]);
        let rendered = table.to_string();
        assert!(rendered.contains("Key"));
        assert!(rendered.contains("a.txt"));
    }
}
