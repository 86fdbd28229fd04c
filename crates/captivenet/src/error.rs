//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use captivenet_config::ConfigError;
use captivenet_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONFLICT: i32 = 6;
    pub const LOCKED: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(captivenet::not_found),
        help("Run: captivenet {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Session {id} is already closed ({status})")]
    #[diagnostic(code(captivenet::session_closed))]
    SessionClosed { id: String, status: String },

    #[error("Cannot move {entity} from {from} to {to}")]
    #[diagnostic(code(captivenet::invalid_transition))]
    InvalidTransition {
        entity: String,
        from: String,
        to: String,
    },

    // ── Vouchers ─────────────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(
        code(captivenet::voucher_rejected),
        help("Codes are 8 letters or digits. Run: captivenet vouchers list")
    )]
    VoucherRejected { message: String },

    #[error("Too many failed attempts from this device")]
    #[diagnostic(
        code(captivenet::redemption_locked),
        help("Try again in {remaining_secs}s.")
    )]
    RedemptionLocked { remaining_secs: i64 },

    // ── Authorization ────────────────────────────────────────────────

    #[error("Role {role} may not {action}")]
    #[diagnostic(
        code(captivenet::permission_denied),
        help(
            "Act as a role that holds this permission with --role.\n\
             Run: captivenet policy show"
        )
    )]
    PermissionDenied { role: String, action: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(captivenet::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(captivenet::config),
        help("Inspect the effective settings with: captivenet config show")
    )]
    Config(#[from] ConfigError),

    #[error("Could not load fixture {path}: {reason}")]
    #[diagnostic(
        code(captivenet::fixture),
        help("Fixtures are JSON or YAML with plans, vouchers, accounts and sessions.")
    )]
    Fixture { path: String, reason: String },

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(captivenet::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Internal ─────────────────────────────────────────────────────

    #[error("{0}")]
    #[diagnostic(code(captivenet::internal))]
    Internal(String),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::PermissionDenied { .. } => exit_code::PERMISSION,
            Self::SessionClosed { .. }
            | Self::InvalidTransition { .. }
            | Self::VoucherRejected { .. } => exit_code::CONFLICT,
            Self::RedemptionLocked { .. } => exit_code::LOCKED,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::Config(_) | Self::Fixture { .. } | Self::Internal(_) | Self::Io(_) => {
                exit_code::GENERAL
            }
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound {
                entity_type,
                identifier,
            } => CliError::NotFound {
                list_command: format!("{entity_type}s list"),
                resource_type: entity_type,
                identifier,
            },

            CoreError::SessionClosed { id, status } => CliError::SessionClosed {
                id: id.to_string(),
                status: status.to_string(),
            },

            CoreError::InvalidTransition { entity, from, to } => {
                CliError::InvalidTransition { entity, from, to }
            }

            e @ (CoreError::InvalidCode { .. }
            | CoreError::CodeExpired { .. }
            | CoreError::CodeAlreadyUsed { .. }) => CliError::VoucherRejected {
                message: e.to_string(),
            },

            CoreError::RedemptionLocked { remaining_secs } => {
                CliError::RedemptionLocked { remaining_secs }
            }

            CoreError::PermissionDenied { role, action } => {
                CliError::PermissionDenied { role, action }
            }

            CoreError::InvalidAmount { amount, reason } => CliError::Validation {
                field: "amount".into(),
                reason: format!("{amount}: {reason}"),
            },

            e @ CoreError::OutOfOrderTick { .. } => CliError::Validation {
                field: "timestamp".into(),
                reason: e.to_string(),
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Config(ConfigError::Validation {
                field: "portal".into(),
                reason: message,
            }),

            e @ CoreError::ConsoleStopped => CliError::Internal(e.to_string()),

            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
