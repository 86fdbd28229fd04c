mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use captivenet_core::Console;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a console
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "captivenet", &mut std::io::stdout());
            Ok(())
        }

        // Everything else runs against a seeded one-shot console
        cmd => {
            let cfg = config::load_config()?;
            let role = config::active_role(&cli.global, &cfg);
            let clock = config::clock(&cli.global);
            let fixture = config::load_fixture(&cli.global, &cfg, clock.as_ref())?;
            let console_config = config::console_config(&cfg, &fixture)?;

            tracing::debug!(command = ?cmd, %role, "dispatching command");
            let global = &cli.global;
            Console::oneshot(console_config, clock, &fixture, |console| async move {
                // Fixture sessions may have lapsed before this run's clock
                let expired = console.refresh();
                if !expired.is_empty() {
                    tracing::debug!(count = expired.len(), "expired on load");
                }
                commands::dispatch(cmd, &console, &role, global).await
            })
            .await
        }
    }
}
