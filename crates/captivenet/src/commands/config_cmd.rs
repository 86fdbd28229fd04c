//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::util;

fn to_toml(cfg: &Config) -> Result<String, CliError> {
    toml::to_string_pretty(cfg)
        .map_err(|e| CliError::Internal(format!("could not render config: {e}")))
}

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => {
            let path = config::config_path();
            if path.exists() && !util::confirm(&format!("Overwrite {}?", path.display()), global.yes)? {
                return Ok(());
            }
            let written = config::save_config(&Config::default())?;
            output::notice(&format!("Wrote {}", written.display()), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            // Surface range errors here rather than on the next portal command
            cfg.to_console_config()?;
            let out = match global.output {
                OutputFormat::Table => to_toml(&cfg)?,
                _ => output::render_single(&global.output, &cfg, |_| String::new(), |c| {
                    c.defaults.role.clone()
                }),
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_renders_portal_section() {
        let text = to_toml(&Config::default()).unwrap();
        assert!(text.contains("[portal]"));
        assert!(text.contains("lockout_attempts = 5"));
    }
}
