//! CLI configuration: thin wrapper around `captivenet_config` shared types.
//!
//! Adds the resolution that respects `GlobalOpts` overrides (--role,
//! --fixture, --now) and builds the console the commands run against.

use std::path::Path;
use std::sync::Arc;

use captivenet_core::{Clock, ConsoleConfig, Fixture, ManualClock, Role, SystemClock};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use captivenet_config::{Config, config_path, load_config, save_config};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Acting role: flag/env, then the config default.
pub fn active_role(global: &GlobalOpts, config: &Config) -> Role {
    global
        .role
        .as_deref()
        .unwrap_or(&config.defaults.role)
        .parse()
        .unwrap_or_else(|never| match never {})
}

/// `--now` pins a manual clock; otherwise the system clock.
pub fn clock(global: &GlobalOpts) -> Arc<dyn Clock> {
    match global.now {
        Some(at) => Arc::new(ManualClock::new(at)),
        None => Arc::new(SystemClock),
    }
}

/// Fixture from `--fixture`, the config default, or the demo portal.
pub fn load_fixture(
    global: &GlobalOpts,
    config: &Config,
    clock: &dyn Clock,
) -> Result<Fixture, CliError> {
    match global.fixture.as_deref().or(config.defaults.fixture.as_deref()) {
        Some(path) => read_fixture(path),
        None => Ok(Fixture::demo(clock.now())),
    }
}

fn read_fixture(path: &Path) -> Result<Fixture, CliError> {
    let fixture_err = |reason: String| CliError::Fixture {
        path: path.display().to_string(),
        reason,
    };
    let text = std::fs::read_to_string(path).map_err(|e| fixture_err(e.to_string()))?;
    let parsed = if is_yaml(path) {
        Fixture::from_yaml(&text)
    } else {
        Fixture::from_json(&text)
    };
    parsed.map_err(|e| fixture_err(e.to_string()))
}

pub fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

/// Console settings for a one-shot run: the config file's portal section,
/// with the fixture's plan catalog when it brings one.
pub fn console_config(config: &Config, fixture: &Fixture) -> Result<ConsoleConfig, CliError> {
    let mut console = config.to_console_config()?;
    fixture.configure(&mut console);
    Ok(console)
}
