//! Output formatting: table, JSON, YAML.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use fidlink_core::{ChannelState, StatusReport};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

fn paint_state(state: ChannelState, color: bool) -> String {
    let text = state.to_string();
    if !color {
        return text;
    }
    match state {
        ChannelState::On => text.green().to_string(),
        ChannelState::Off => text.dimmed().to_string(),
        ChannelState::Unknown => text.yellow().to_string(),
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(format: OutputFormat, data: &[T], to_row: impl Fn(&T) -> R) -> String
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since single-item views don't use
/// `Tabled` derive.
pub fn render_single<T>(format: OutputFormat, data: &T, detail_fn: impl Fn(&T) -> String) -> String
where
    T: serde::Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
    }
}

/// Print the rendered output to stdout.
pub fn print_output(output: &str) {
    if output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// One-line confirmation on stderr, kept out of structured stdout.
pub fn print_done(message: &str, color: bool) {
    if color {
        eprintln!("{} {message}", "✓".green());
    } else {
        eprintln!("ok: {message}");
    }
}

// ── Status ───────────────────────────────────────────────────────────

#[derive(Tabled)]
struct ChannelRow {
    #[tabled(rename = "Channel")]
    channel: u32,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Level")]
    level: String,
    #[tabled(rename = "Default")]
    default: String,
}

/// Render a status report: one row per channel for tables, the
/// column-oriented report for structured formats.
pub fn render_status(format: OutputFormat, report: &StatusReport, color: bool) -> String {
    render_single(format, report, |r| {
        let rows: Vec<ChannelRow> = r
            .rows()
            .into_iter()
            .map(|c| ChannelRow {
                channel: c.channel_id,
                state: paint_state(c.state, color),
                level: format!("{:.1}", c.level),
                default: format!("{:.1}", c.default),
            })
            .collect();
        render_table(&rows)
    })
}

// ── Format-specific renderers ────────────────────────────────────────

pub(crate) fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| format!("<serialization failed: {e}>"))
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| format!("<serialization failed: {e}>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> StatusReport {
        StatusReport {
            devices: vec![10, 11],
            state: vec![ChannelState::On, ChannelState::Unknown],
            level: vec![50.0, 0.0],
            default: vec![100.0, 100.0],
        }
    }

    #[test]
    fn status_table_has_one_row_per_channel() {
        let out = render_status(OutputFormat::Table, &report(), false);
        assert!(out.contains("Channel"));
        assert!(out.contains("unknown"));
        assert!(out.contains("50.0"));
        assert_eq!(out.matches("100.0").count(), 2);
    }

    #[test]
    fn status_json_keeps_column_layout() {
        let out = render_status(OutputFormat::JsonCompact, &report(), false);
        assert_eq!(
            out,
            r#"{"devices":[10,11],"state":["on","unknown"],"level":[50.0,0.0],"default":[100.0,100.0]}"#
        );
    }
}
