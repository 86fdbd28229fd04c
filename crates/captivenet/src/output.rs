//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one identifier per line.

use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, TimeDelta, Utc};
use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use captivenet_core::{Quota, SessionStatus, VoucherStatus};

use crate::cli::{ColorMode, OutputFormat};

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

pub fn paint_session_status(status: SessionStatus, color: bool) -> String {
    let label = status.to_string();
    if !color {
        return label;
    }
    match status {
        SessionStatus::Active => label.green().to_string(),
        SessionStatus::Warning => label.yellow().to_string(),
        SessionStatus::Critical => label.red().bold().to_string(),
        SessionStatus::Expired | SessionStatus::Terminated => label.dimmed().to_string(),
    }
}

pub fn paint_voucher_status(status: VoucherStatus, color: bool) -> String {
    let label = status.to_string();
    if !color {
        return label;
    }
    match status {
        VoucherStatus::Active => label.green().to_string(),
        VoucherStatus::Used | VoucherStatus::Expired => label.dimmed().to_string(),
        VoucherStatus::Revoked => label.red().to_string(),
    }
}

// ── Value formatting ─────────────────────────────────────────────────

pub fn fmt_bytes(bytes: u64) -> String {
    bytesize::ByteSize::b(bytes).to_string_as(true)
}

pub fn fmt_secs(secs: u64) -> String {
    if secs == 0 {
        return "0s".into();
    }
    humantime::format_duration(std::time::Duration::from_secs(secs)).to_string()
}

/// Whole-second countdown; negative deltas show as zero.
pub fn fmt_delta(delta: TimeDelta) -> String {
    fmt_secs(u64::try_from(delta.num_seconds()).unwrap_or(0))
}

pub fn fmt_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// "used / total (pct%)" for bytes.
pub fn fmt_data_quota(q: &Quota) -> String {
    format!(
        "{} / {} ({:.0}%)",
        fmt_bytes(q.used()),
        fmt_bytes(q.total()),
        q.percent()
    )
}

/// "used / total (pct%)" for seconds.
pub fn fmt_time_quota(q: &Quota) -> String {
    format!(
        "{} / {} ({:.0}%)",
        fmt_secs(q.used()),
        fmt_secs(q.total()),
        q.percent()
    )
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
///
/// - `table`: uses the `Tabled` derive to build a pretty table
/// - `json` / `json-compact`: serializes the underlying data via serde
/// - `yaml`: serializes via serde_yaml
/// - `plain`: calls `id_fn` on each item to emit one identifier per line
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    id_fn: impl Fn(&T) -> String,
) -> String
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
        OutputFormat::Plain => data.iter().map(&id_fn).collect::<Vec<_>>().join("\n"),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses a custom `detail_fn` that returns a pre-formatted string,
/// since single-item detail views don't use `Tabled` derive.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
    id_fn: impl Fn(&T) -> String,
) -> String
where
    T: serde::Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => detail_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
        OutputFormat::Plain => id_fn(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// Status line on stderr, respecting quiet mode.
pub fn notice(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> String {
    let rendered = if compact {
        serde_json::to_string(data)
    } else {
        serde_json::to_string_pretty(data)
    };
    rendered.unwrap_or_else(|e| {
        tracing::error!(error = %e, "JSON serialization failed");
        String::new()
    })
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> String {
    serde_yaml::to_string(data).unwrap_or_else(|e| {
        tracing::error!(error = %e, "YAML serialization failed");
        String::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_and_second_formatting() {
        assert_eq!(fmt_bytes(0), "0 B");
        assert_eq!(fmt_secs(0), "0s");
        assert_eq!(fmt_secs(5400), "1h 30m");
        assert_eq!(fmt_delta(TimeDelta::seconds(-5)), "0s");
    }

    #[test]
    fn colorless_status_is_the_wire_name() {
        assert_eq!(paint_session_status(SessionStatus::Critical, false), "CRITICAL");
        assert_eq!(paint_voucher_status(VoucherStatus::Revoked, false), "REVOKED");
    }

    #[test]
    fn plain_output_lists_ids() {
        #[derive(serde::Serialize)]
        struct Item {
            id: u32,
        }
        #[derive(Tabled)]
        struct Row {
            id: u32,
        }
        let items = [Item { id: 1 }, Item { id: 2 }];
        let out = render_list(
            &OutputFormat::Plain,
            &items,
            |i| Row { id: i.id },
            |i| i.id.to_string(),
        );
        assert_eq!(out, "1\n2");
        let json = render_list(&OutputFormat::JsonCompact, &items, |i| Row { id: i.id }, |i| {
            i.id.to_string()
        });
        assert_eq!(json, r#"[{"id":1},{"id":2}]"#);
    }
}
