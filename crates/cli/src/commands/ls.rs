//! ls command - List objects
//!
//! Lists objects in the configured bucket under an optional prefix.

use clap::Args;
use r2up_core::{CatalogEntry, DEFAULT_MAX_KEYS};
use serde::Serialize;

use super::Context;
use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// List objects
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Key prefix
    #[arg(default_value = "")]
    pub prefix: String,

    /// Maximum number of objects to return (1-1000)
    #[arg(long, default_value_t = DEFAULT_MAX_KEYS)]
    pub max_keys: i32,

    /// Summarize output (show totals only)
    #[arg(long)]
    pub summarize: bool,
}

/// Output structure for ls command (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput {
    items: Vec<CatalogEntry>,
    summary: Summary,
}

#[derive(Debug, Serialize)]
struct Summary {
    total_objects: usize,
    total_size_bytes: i64,
    total_size_human: String,
}

fn summarize(items: &[CatalogEntry]) -> Summary {
    let total_size: i64 = items.iter().map(|e| e.size_bytes).sum();
    Summary {
        total_objects: items.len(),
        total_size_bytes: total_size,
        total_size_human: humansize::format_size(total_size.max(0) as u64, humansize::BINARY),
    }
}

fn format_date(entry: &CatalogEntry) -> String {
    entry
        .last_modified
        .map(|ts| ts.strftime("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Execute the ls command
pub async fn execute(args: LsArgs, ctx: &Context) -> ExitCode {
    let formatter = ctx.formatter();
    let uploader = match ctx.connect(&formatter).await {
        Ok(uploader) => uploader,
        Err(code) => return code,
    };

    match uploader.list_files(&args.prefix, args.max_keys).await {
        Ok(items) => {
            print_listing(&formatter, items, args.summarize);
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&format!("Failed to list objects: {e}"));
            ExitCode::from_error(&e)
        }
    }
}

fn print_listing(formatter: &Formatter, items: Vec<CatalogEntry>, summary_only: bool) {
    let summary = summarize(&items);
    if formatter.is_json() {
        formatter.json(&LsOutput { items, summary });
        return;
    }

    if !summary_only {
        let mut table = formatter.new_table(&["Last modified", "Size", "Key"]);
        for entry in &items {
            table.add_row(vec![
                format_date(entry),
                entry.size_human.clone(),
                entry.key.clone(),
            ]);
        }
        formatter.table(&table);
    }
    formatter.println(&format!(
        "Total: {} object(s), {}",
        summary.total_objects, summary.total_size_human
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, size: i64) -> CatalogEntry {
        CatalogEntry {
            key: key.to_string(),
            size_bytes: size,
            size_human: humansize::format_size(size as u64, humansize::BINARY),
            last_modified: Some("2024-05-01T12:30:00Z".parse().unwrap()),
            etag: None,
            url: format!("https://b.a.r2.cloudflarestorage.com/{key}"),
        }
    }

    #[test]
    fn test_summarize_totals() {
        let summary = summarize(&[entry("a", 1024), entry("b", 1024)]);
        assert_eq!(summary.total_objects, 2);
        assert_eq!(summary.total_size_bytes, 2048);
        assert_eq!(summary.total_size_human, "2 KiB");
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date(&entry("a", 1)), "2024-05-01 12:30:00");
    }
}
