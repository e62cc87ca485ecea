//! Terminal output helpers for Quill CLI

use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use quill_core::batch::BatchProgress;
use serde_json::Value;
use std::time::Duration;

/// Batch progress reported through an indicatif bar on stderr
pub struct RowProgress {
    bar: ProgressBar,
}

impl RowProgress {
    pub fn new(message: &str, hidden: bool) -> Self {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        if let Ok(bar_style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} rows ({eta}) {msg}")
        {
            bar.set_style(bar_style.progress_chars("#>-"));
        }
        bar.set_message(message.to_string());
        Self { bar }
    }
}

impl BatchProgress for RowProgress {
    fn start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn advance(&self) {
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_with_message("done");
    }
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else if seconds > 0 {
        format!("{}.{:03}s", seconds, duration.subsec_millis())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Print a flat JSON object as JSON or as `key: value` lines
pub fn print_output(data: &Value, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(data)?);
        return Ok(());
    }

    match data {
        Value::Object(map) => {
            for (key, value) in map {
                println!("{}: {}", style(key).bold(), format_value(value));
            }
        }
        _ => println!("{}", format_value(data)),
    }
    Ok(())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.is_empty() => "-".to_string(),
        Value::Array(items) => items.iter().map(format_value).collect::<Vec<_>>().join(", "),
        Value::Null => "-".to_string(),
        _ => value.to_string(),
    }
}

/// Print success message with styling
pub fn print_success(message: &str) {
    eprintln!("{} {}", style("Success:").green().bold(), message);
}
