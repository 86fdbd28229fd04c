//! Shared configuration for the CaptiveNet console.
//!
//! A TOML file (platform config dir, or `CAPTIVENET_CONFIG`) layered over
//! built-in defaults and `CAPTIVENET_` environment variables, translated to
//! `captivenet_core::ConsoleConfig`. Nested keys use a double underscore:
//! `CAPTIVENET_PORTAL__REFRESH_INTERVAL_SECS=10`.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use captivenet_core::{ConsoleConfig, LockoutPolicy, Plan, Thresholds, VoucherDefaults};

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "CAPTIVENET_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// CLI presentation defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Portal behaviour.
    #[serde(default)]
    pub portal: Portal,

    /// Plan catalog. Empty means the built-in catalog.
    #[serde(default)]
    pub plans: Vec<Plan>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Acting role when `--role` is not given.
    #[serde(default = "default_role")]
    pub role: String,

    /// Fixture loaded when `--fixture` is not given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixture: Option<PathBuf>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            role: default_role(),
            fixture: None,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_role() -> String {
    "ADMIN".into()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Portal {
    pub refresh_interval_secs: u64,
    pub lockout_attempts: u32,
    pub lockout_cooldown_secs: u64,
    pub voucher_max_uses: u32,
    pub voucher_validity_days: u32,
    pub thresholds: Thresholds,
}

impl Default for Portal {
    fn default() -> Self {
        let console = ConsoleConfig::default();
        Self {
            refresh_interval_secs: console.refresh_interval_secs,
            lockout_attempts: console.lockout.max_attempts,
            lockout_cooldown_secs: console.lockout.cooldown_secs,
            voucher_max_uses: console.vouchers.max_uses,
            voucher_validity_days: console.vouchers.validity_days,
            thresholds: console.thresholds,
        }
    }
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Build the core console config, validating as the console would.
    pub fn to_console_config(&self) -> Result<ConsoleConfig, ConfigError> {
        let portal = &self.portal;
        portal
            .thresholds
            .validate()
            .map_err(|e| ConfigError::Validation {
                field: "portal.thresholds".into(),
                reason: e.to_string(),
            })?;

        let plans = if self.plans.is_empty() {
            Plan::default_catalog()
        } else {
            self.plans.clone()
        };

        let console = ConsoleConfig {
            thresholds: portal.thresholds,
            lockout: LockoutPolicy {
                max_attempts: portal.lockout_attempts,
                cooldown_secs: portal.lockout_cooldown_secs,
            },
            refresh_interval_secs: portal.refresh_interval_secs,
            vouchers: VoucherDefaults {
                max_uses: portal.voucher_max_uses,
                validity_days: portal.voucher_validity_days,
            },
            plans,
        };
        console.validate().map_err(|e| ConfigError::Validation {
            field: "portal".into(),
            reason: e.to_string(),
        })?;
        Ok(console)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `CAPTIVENET_CONFIG`, then the platform
/// config directory.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("net", "captivenet", "captivenet").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("captivenet");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CAPTIVENET_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
