//! Replay a file of gateway usage ticks against the seeded portal.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;
use tokio::sync::broadcast::error::TryRecvError;

use captivenet_core::{
    Command as CoreCommand, CommandResult, Console, SessionEvent, SessionId, SessionStatus,
    UsageEvent,
};

use crate::cli::{GlobalOpts, OutputFormat, SimulateArgs};
use crate::config::is_yaml;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct TickOutcome {
    session_id: SessionId,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<SessionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct Report {
    ticks: Vec<TickOutcome>,
    expired: Vec<SessionId>,
    events: Vec<SessionEvent>,
}

#[derive(Tabled)]
struct TickRow {
    #[tabled(rename = "Session")]
    session: u64,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Result")]
    result: String,
}

#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

fn tick_row(t: &TickOutcome, color: bool) -> TickRow {
    TickRow {
        session: t.session_id.get(),
        timestamp: output::fmt_time(t.timestamp),
        result: match (&t.status, &t.error) {
            (_, Some(err)) => format!("error: {err}"),
            (Some(status), None) => output::paint_session_status(*status, color),
            (None, None) => String::new(),
        },
    }
}

fn event_row(ev: &SessionEvent) -> EventRow {
    let (event, detail) = match ev {
        SessionEvent::Opened { id, kind, owner } => ("opened", format!("session {id} ({kind}, {owner})")),
        SessionEvent::StatusChanged { id, from, to } => {
            ("status", format!("session {id}: {from} -> {to}"))
        }
        SessionEvent::Expired { id, reason } => ("expired", format!("session {id}: {reason}")),
        SessionEvent::Terminated { id, reason } => {
            ("terminated", format!("session {id}: {reason}"))
        }
        SessionEvent::QuotaExtended {
            id,
            dimension,
            amount,
        } => ("extended", format!("session {id}: {dimension} +{amount}")),
        SessionEvent::ExpiryShortened { id, expires_at } => (
            "shortened",
            format!("session {id}: expires {}", output::fmt_time(*expires_at)),
        ),
        SessionEvent::VoucherExhausted { code } => ("exhausted", format!("voucher {code}")),
    };
    EventRow {
        event: event.into(),
        detail,
    }
}

fn read_events(path: &std::path::Path) -> Result<Vec<UsageEvent>, CliError> {
    let text = std::fs::read_to_string(path)?;
    let parsed = if is_yaml(path) {
        serde_yaml::from_str(&text).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&text).map_err(|e| e.to_string())
    };
    parsed.map_err(|reason| CliError::Validation {
        field: "events".into(),
        reason,
    })
}

fn render_report(report: &Report, color: bool) -> String {
    let ticks = output::render_list(
        &OutputFormat::Table,
        &report.ticks,
        |t| tick_row(t, color),
        |t| t.session_id.to_string(),
    );
    let mut sections = vec![ticks];
    if !report.expired.is_empty() {
        let ids: Vec<String> = report.expired.iter().map(ToString::to_string).collect();
        sections.push(format!("Expired by sweep: {}", ids.join(", ")));
    }
    if !report.events.is_empty() {
        sections.push(output::render_list(
            &OutputFormat::Table,
            &report.events,
            event_row,
            |_| String::new(),
        ));
    }
    sections.join("\n\n")
}

pub async fn handle(
    console: &Console,
    args: SimulateArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let usage = read_events(&args.events)?;
    let mut rx = console.events();

    let mut ticks = Vec::with_capacity(usage.len());
    for event in usage {
        let (session_id, timestamp) = (event.session_id, event.timestamp);
        let outcome = match console.execute(CoreCommand::ApplyUsage(event)).await {
            Ok(CommandResult::Status(status)) => TickOutcome {
                session_id,
                timestamp,
                status: Some(status),
                error: None,
            },
            Ok(_) => TickOutcome {
                session_id,
                timestamp,
                status: None,
                error: None,
            },
            Err(e) => {
                tracing::debug!(session = %session_id, error = %e, "tick rejected");
                TickOutcome {
                    session_id,
                    timestamp,
                    status: None,
                    error: Some(e.to_string()),
                }
            }
        };
        ticks.push(outcome);
    }

    let expired = if args.refresh {
        console.refresh()
    } else {
        Vec::new()
    };

    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(ev) => events.push(ev),
            Err(TryRecvError::Lagged(missed)) => {
                tracing::warn!(missed, "event receiver lagged");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }

    let report = Report {
        ticks,
        expired,
        events,
    };
    let out = output::render_single(
        &global.output,
        &report,
        |r| render_report(r, color),
        |r| {
            r.ticks
                .iter()
                .map(|t| t.error.as_ref().map_or("ok", |_| "error"))
                .collect::<Vec<_>>()
                .join("\n")
        },
    );
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_yaml_and_json_events() {
        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            json,
            r#"[{{"sessionId":1,"dataDeltaBytes":10,"timeDeltaSeconds":5,"timestamp":"2024-01-15T14:01:00Z"}}]"#
        )
        .unwrap();
        let events = read_events(json.path()).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data_delta_bytes, 10);

        let mut yaml = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            yaml,
            "- session_id: 2\n  data_delta_bytes: 0\n  time_delta_seconds: 60\n  timestamp: 2024-01-15T14:02:00Z\n"
        )
        .unwrap();
        let events = read_events(yaml.path()).unwrap();
        assert_eq!(events[0].session_id, SessionId(2));
    }

    #[test]
    fn malformed_events_are_a_usage_error() {
        let mut bad = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(bad, "{{not json").unwrap();
        assert!(matches!(
            read_events(bad.path()),
            Err(CliError::Validation { ref field, .. }) if field == "events"
        ));
    }

    #[test]
    fn error_rows_show_the_reason() {
        let tick = TickOutcome {
            session_id: SessionId(1),
            timestamp: Utc::now(),
            status: None,
            error: Some("Session 1 is closed (EXPIRED)".into()),
        };
        assert_eq!(tick_row(&tick, false).result, "error: Session 1 is closed (EXPIRED)");
    }
}
