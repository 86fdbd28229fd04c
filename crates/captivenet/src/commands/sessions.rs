//! Session command handlers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tabled::Tabled;

use captivenet_core::{
    Action, Command as CoreCommand, CommandResult, Console, Dimension, DirectorySummary,
    RequestId, Role, Session, SessionFilter, SessionId, StartSessionRequest, TerminateOutcome,
};

use crate::cli::{GlobalOpts, SessionsArgs, SessionsCommand};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Owner")]
    owner: String,
    #[tabled(rename = "Device")]
    device: String,
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Data")]
    data: String,
    #[tabled(rename = "Time Left")]
    time_left: String,
}

impl SessionRow {
    fn new(s: &Session, now: DateTime<Utc>, color: bool) -> Self {
        Self {
            id: s.id.get(),
            owner: s.owner.label(),
            device: s.device.name.clone(),
            mac: s.device.mac.to_string(),
            status: output::paint_session_status(s.status_at(now), color),
            data: output::fmt_data_quota(s.data()),
            time_left: output::fmt_delta(s.remaining_time(now)),
        }
    }
}

pub(super) fn detail(s: &Arc<Session>, now: DateTime<Utc>, color: bool) -> String {
    let mut lines = vec![
        format!("ID:         {}", s.id),
        format!("Owner:      {} ({})", s.owner.label(), s.kind()),
        format!(
            "Device:     {}  {}  {}",
            s.device.name,
            s.device.mac,
            s.device.ip.map_or_else(|| "-".into(), |ip| ip.to_string())
        ),
        format!(
            "Plan:       {}",
            s.plan_id.map_or_else(|| "-".into(), |p| p.to_string())
        ),
        format!("Status:     {}", output::paint_session_status(s.status_at(now), color)),
        format!("Data:       {}", output::fmt_data_quota(s.data())),
        format!("Time:       {}", output::fmt_time_quota(s.time())),
        format!("Started:    {}", output::fmt_time(s.start_time())),
        format!("Last seen:  {}", output::fmt_time(s.last_activity())),
        format!(
            "Expires:    {} (in {})",
            output::fmt_time(s.expires_at()),
            output::fmt_delta(s.remaining_time(now))
        ),
    ];
    if let Some(closure) = s.closure() {
        lines.push(format!(
            "Closed:     {} at {} ({})",
            closure.status,
            output::fmt_time(closure.at),
            closure.reason
        ));
    }
    if s.voucher_exhausted() {
        lines.push("Voucher:    last use consumed".into());
    }
    lines.join("\n")
}

fn summary_detail(s: &DirectorySummary) -> String {
    let mut lines = vec![
        format!("Sessions:   {} ({} alive)", s.total, s.alive),
        format!("Data used:  {}", output::fmt_bytes(s.data_used_bytes)),
        format!("Time used:  {}", output::fmt_secs(s.time_used_secs)),
    ];
    for (status, count) in &s.by_status {
        lines.push(format!("{:<11} {count}", format!("{status}:")));
    }
    lines.join("\n")
}

#[derive(Serialize)]
struct Countdown {
    id: SessionId,
    remaining_secs: i64,
    expires_at: DateTime<Utc>,
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub async fn handle(
    console: &Console,
    args: SessionsArgs,
    role: &Role,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let now = console.now();
    let show = |session: &Arc<Session>| {
        let out = output::render_single(
            &global.output,
            session,
            |s| detail(s, now, color),
            |s| s.id.to_string(),
        );
        output::print_output(&out, global.quiet);
    };

    match args.command {
        SessionsCommand::List {
            status,
            kind,
            search,
        } => {
            util::require(console, role, Action::ViewAllSessions)?;
            let filter = SessionFilter {
                text: search,
                status,
                kind,
            };
            let sessions = console.sessions(&filter);
            let out = output::render_list(
                &global.output,
                &sessions,
                |s| SessionRow::new(s, now, color),
                |s| s.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SessionsCommand::Get { id } => {
            util::require(console, role, Action::ViewAllSessions)?;
            show(&console.session(id)?);
            Ok(())
        }

        SessionsCommand::Summary => {
            util::require(console, role, Action::ViewAllSessions)?;
            let summary = console.summary();
            let out = output::render_single(&global.output, &summary, summary_detail, |s| {
                s.alive.to_string()
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SessionsCommand::Start {
            account,
            plan,
            mac,
            device_name,
        } => {
            let req = StartSessionRequest {
                account_id: account,
                device: util::device(&mac, device_name, None)?,
                plan_id: plan,
            };
            if let CommandResult::Session(session) = console
                .execute(CoreCommand::StartSubscriberSession(req))
                .await?
            {
                show(&session);
            }
            Ok(())
        }

        SessionsCommand::Terminate { id, reason } => {
            if !util::confirm(&format!("Terminate session {id}?"), global.yes)? {
                return Ok(());
            }
            let result = console
                .execute_as(role, CoreCommand::TerminateSession { id, reason })
                .await?;
            if let CommandResult::Terminated(outcome) = result {
                let message = match outcome {
                    TerminateOutcome::Terminated => format!("Session {id} terminated"),
                    TerminateOutcome::AlreadyClosed(status) => {
                        format!("Session {id} was already {status}")
                    }
                };
                output::notice(&message, global.quiet);
            }
            show(&console.session(id)?);
            Ok(())
        }

        SessionsCommand::Extend {
            id,
            data,
            time,
            request_id,
        } => {
            let (dimension, amount) = match (data, time) {
                (Some(bytes), _) => (Dimension::Data, bytes.as_u64()),
                (None, Some(duration)) => (Dimension::Time, Duration::from(duration).as_secs()),
                (None, None) => {
                    return Err(CliError::Validation {
                        field: "amount".into(),
                        reason: "give --data or --time".into(),
                    });
                }
            };
            let amount = i64::try_from(amount).map_err(|_| CliError::Validation {
                field: "amount".into(),
                reason: format!("{amount} is too large"),
            })?;
            let request_id = request_id.map_or_else(RequestId::random, RequestId::new);
            let result = console
                .execute_as(
                    role,
                    CoreCommand::ExtendQuota {
                        id,
                        dimension,
                        amount,
                        request_id,
                    },
                )
                .await?;
            if let CommandResult::Status(status) = result {
                output::notice(&format!("Session {id} extended, now {status}"), global.quiet);
            }
            show(&console.session(id)?);
            Ok(())
        }

        SessionsCommand::Shorten { id, within } => {
            let offset = TimeDelta::from_std(within.into()).map_err(|_| CliError::Validation {
                field: "in".into(),
                reason: "duration out of range".into(),
            })?;
            console
                .execute_as(
                    role,
                    CoreCommand::ShortenExpiry {
                        id,
                        until: now + offset,
                    },
                )
                .await?;
            show(&console.session(id)?);
            Ok(())
        }

        SessionsCommand::Remaining { id, watch } => {
            util::require(console, role, Action::ViewSessionStatus)?;
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            let mut previous = None;
            loop {
                ticker.tick().await;
                let session = console.session(id)?;
                let left = session.remaining_time(console.now());
                // A pinned --now clock never moves; one reading is all there is.
                if previous == Some(left) {
                    break;
                }
                previous = Some(left);
                let countdown = Countdown {
                    id,
                    remaining_secs: left.num_seconds(),
                    expires_at: session.expires_at(),
                };
                let out = output::render_single(
                    &global.output,
                    &countdown,
                    |c| {
                        format!(
                            "{} left (expires {})",
                            output::fmt_delta(left),
                            output::fmt_time(c.expires_at)
                        )
                    },
                    |c| c.remaining_secs.to_string(),
                );
                output::print_output(&out, global.quiet);
                if !watch || left <= TimeDelta::zero() || !session.is_alive() {
                    break;
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use captivenet_core::Fixture;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    fn demo_session(id: u64) -> Arc<Session> {
        let cfg = captivenet_core::ConsoleConfig::default();
        let fixture = Fixture::demo(now());
        let seed = fixture
            .sessions
            .iter()
            .find(|s| s.id == SessionId(id))
            .unwrap();
        Arc::new(seed.build(&cfg).unwrap())
    }

    #[test]
    fn row_shows_owner_and_countdown() {
        let row = SessionRow::new(&demo_session(2), now(), false);
        assert_eq!(row.owner, "guest:GUEST001");
        assert_eq!(row.status, "CRITICAL");
        assert_eq!(row.time_left, "4h");
    }

    #[test]
    fn detail_mentions_exhausted_voucher() {
        let text = detail(&demo_session(2), now(), false);
        assert!(text.contains("Galaxy-S23"));
        assert!(text.contains("last use consumed"));
        let text = detail(&demo_session(1), now(), false);
        assert!(text.contains("192.168.1.45"));
        assert!(!text.contains("Voucher:"));
    }
}
