//! Command dispatch: bridges CLI args -> core Commands -> output formatting.

pub mod accounts;
pub mod audit;
pub mod config_cmd;
pub mod plans;
pub mod policy;
pub mod sessions;
pub mod simulate;
pub mod util;
pub mod vouchers;

use captivenet_core::{Console, Role};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a console-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    console: &Console,
    role: &Role,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Policy(args) => policy::handle(console, args, role, global),
        Command::Plans(args) => plans::handle(console, args, global),
        Command::Sessions(args) => sessions::handle(console, args, role, global).await,
        Command::Vouchers(args) => vouchers::handle(console, args, role, global).await,
        Command::Accounts(args) => accounts::handle(console, args, role, global).await,
        Command::Simulate(args) => simulate::handle(console, args, global).await,
        Command::Audit(args) => audit::handle(console, args, role, global),
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "config and completions run without a console".into(),
        )),
    }
}
