//! Account review handlers.

use std::sync::Arc;

use tabled::Tabled;

use captivenet_core::{Account, Action, Command as CoreCommand, CommandResult, Console, Role};

use crate::cli::{AccountsArgs, AccountsCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct AccountRow {
    #[tabled(rename = "ID")]
    id: u64,
    #[tabled(rename = "Username")]
    username: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&Arc<Account>> for AccountRow {
    fn from(a: &Arc<Account>) -> Self {
        Self {
            id: a.id.get(),
            username: a.username.clone(),
            name: a.display_name(),
            email: a.email.clone(),
            role: a.role.to_string(),
            status: a.status.to_string(),
        }
    }
}

fn detail(a: &Arc<Account>) -> String {
    let mut lines = vec![
        format!("ID:         {}", a.id),
        format!("Username:   {}", a.username),
        format!("Name:       {}", a.display_name()),
        format!("Email:      {}", a.email),
        format!("Role:       {}", a.role),
        format!("Status:     {}", a.status),
    ];
    if let Some(notes) = &a.validation_notes {
        lines.push(format!("Notes:      {notes}"));
    }
    if let Some(reason) = &a.rejection_reason {
        lines.push(format!("Rejected:   {reason}"));
    }
    if let Some(by) = a.validated_by {
        lines.push(format!("Reviewed by: {by}"));
    }
    if let Some(at) = a.validated_at {
        lines.push(format!("Reviewed:   {}", output::fmt_time(at)));
    }
    lines.join("\n")
}

pub async fn handle(
    console: &Console,
    args: AccountsArgs,
    role: &Role,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let command = match args.command {
        AccountsCommand::List { status } => {
            util::require(console, role, Action::ViewUsers)?;
            let accounts = console.accounts_snapshot(status);
            let out = output::render_list(
                &global.output,
                &accounts,
                |a| AccountRow::from(a),
                |a| a.id.to_string(),
            );
            output::print_output(&out, global.quiet);
            return Ok(());
        }
        AccountsCommand::Validate { id, notes, by } => {
            CoreCommand::ValidateAccount { id, notes, by }
        }
        AccountsCommand::Reject { id, reason } => CoreCommand::RejectAccount { id, reason },
    };

    if let CommandResult::Account(account) = console.execute_as(role, command).await? {
        output::notice(
            &format!("Account {} is {}", account.username, account.status),
            global.quiet,
        );
        let out = output::render_single(&global.output, &account, detail, |a| a.id.to_string());
        output::print_output(&out, global.quiet);
    }
    Ok(())
}
