//! Audit trail listing.

use std::sync::Arc;

use tabled::Tabled;

use captivenet_core::{Action, AuditEntry, AuditFilter, Console, Role};

use crate::cli::{AuditArgs, AuditCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct AuditRow {
    #[tabled(rename = "#")]
    seq: u64,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Actor")]
    actor: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Request")]
    request: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

impl From<&Arc<AuditEntry>> for AuditRow {
    fn from(e: &Arc<AuditEntry>) -> Self {
        Self {
            seq: e.seq,
            time: output::fmt_time(e.timestamp),
            actor: e
                .actor_role
                .as_ref()
                .map_or_else(|| "system".into(), ToString::to_string),
            action: e.action.to_string(),
            target: format!("{} {}", e.target_type, e.target_id),
            request: e.request_id.to_string(),
            detail: e.detail.clone().unwrap_or_default(),
        }
    }
}

pub fn handle(
    console: &Console,
    args: AuditArgs,
    role: &Role,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        AuditCommand::List {
            action,
            target_type,
            target,
        } => {
            util::require(console, role, Action::ViewAuditLog)?;
            let entries = console.audit_log(&AuditFilter {
                action,
                target_type,
                target_id: target,
            });
            let out = output::render_list(
                &global.output,
                &entries,
                |e| AuditRow::from(e),
                |e| e.seq.to_string(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
