//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use detector_lib::Verdict;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a pretty JSON document
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format an optional band value
pub fn format_value(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "-".to_string())
}

/// Color a verdict or outcome label
pub fn color_label(label: &str) -> String {
    match label {
        "normal" => label.green().to_string(),
        "alert" | "alerted" => label.red().bold().to_string(),
        "not_evaluable" => label.yellow().to_string(),
        "invalid_input" | "delivery_failed" => label.red().to_string(),
        _ => label.to_string(),
    }
}

/// Print the verdict line for a detection
pub fn print_verdict(verdict: Verdict) {
    println!("Verdict: {}", color_label(&verdict.to_string()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(Some(14.0)), "14.00");
        assert_eq!(format_value(Some(-0.126)), "-0.13");
        assert_eq!(format_value(None), "-");
    }

    #[test]
    fn test_color_label_keeps_text() {
        colored::control::set_override(false);
        assert_eq!(color_label("alerted"), "alerted");
        assert_eq!(color_label("normal"), "normal");
    }
}
