//! Clap derive structures for the `captivenet` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};

use captivenet_core::{
    AccountId, AccountStatus, AuditAction, AuditTarget, PlanId, SessionId, SessionKind, SessionStatus, VoucherCode,
    VoucherStatus,
};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// captivenet -- operator console for a captive-portal hotspot
#[derive(Debug, Parser)]
#[command(
    name = "captivenet",
    version,
    about = "Operate a captive-portal hotspot from the command line",
    long_about = "Inspect and manage guest and subscriber sessions, vouchers and accounts.\n\n\
        State is loaded from a fixture (JSON or YAML) or the built-in demo portal;\n\
        commands act on that snapshot and never write it back.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Portal state to load (JSON or YAML). Defaults to the demo portal
    #[arg(long, short = 'f', env = "CAPTIVENET_FIXTURE", global = true)]
    pub fixture: Option<PathBuf>,

    /// Role to act as (SUPERADMIN, ADMIN, SUBSCRIBER, GUEST)
    #[arg(long, short = 'r', env = "CAPTIVENET_ROLE", global = true)]
    pub role: Option<String>,

    /// Evaluate as of this instant (RFC 3339) instead of the system clock
    #[arg(long, global = true)]
    pub now: Option<DateTime<Utc>>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CAPTIVENET_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect the role permission table and route guards
    Policy(PolicyArgs),

    /// List billing plans
    Plans(PlansArgs),

    /// Inspect and manage sessions
    #[command(alias = "s")]
    Sessions(SessionsArgs),

    /// Manage voucher codes
    #[command(alias = "v")]
    Vouchers(VouchersArgs),

    /// Review subscriber accounts
    Accounts(AccountsArgs),

    /// Replay gateway usage events against the portal
    Simulate(SimulateArgs),

    /// Read the audit trail (super admins only)
    Audit(AuditArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Policy ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub command: PolicyCommand,
}

#[derive(Debug, Subcommand)]
pub enum PolicyCommand {
    /// Show resolved permissions (every known role, or the acting one with --role)
    Show {
        /// Resolve for a session of this kind
        #[arg(long)]
        kind: Option<SessionKind>,
    },

    /// Check a route (or an action) for the acting role
    Check {
        /// Route id, e.g. "vouchers" or "guest-dashboard"
        #[arg(required_unless_present = "action")]
        route: Option<String>,

        /// Check an action id instead, e.g. "terminate-session"
        #[arg(long, conflicts_with = "route")]
        action: Option<String>,

        /// Session kind the role holds
        #[arg(long)]
        kind: Option<SessionKind>,
    },
}

// ── Audit ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AuditArgs {
    #[command(subcommand)]
    pub command: AuditCommand,
}

#[derive(Debug, Subcommand)]
pub enum AuditCommand {
    /// List audit entries, oldest first
    #[command(alias = "ls")]
    List {
        /// Only this action, e.g. SESSION_TIMEOUT
        #[arg(long)]
        action: Option<AuditAction>,

        /// Only this kind of target: session, voucher or account
        #[arg(long)]
        target_type: Option<AuditTarget>,

        /// Only this target id
        #[arg(long)]
        target: Option<String>,
    },
}

// ── Plans ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PlansArgs {
    #[command(subcommand)]
    pub command: PlansCommand,
}

#[derive(Debug, Subcommand)]
pub enum PlansCommand {
    /// List the plan catalog
    #[command(alias = "ls")]
    List,
}

// ── Sessions ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SessionsArgs {
    #[command(subcommand)]
    pub command: SessionsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SessionsCommand {
    /// List sessions, most recently active first
    #[command(alias = "ls")]
    List {
        /// Only sessions in this status
        #[arg(long)]
        status: Option<SessionStatus>,

        /// Only voucher or credentialed sessions
        #[arg(long)]
        kind: Option<SessionKind>,

        /// Match owner, device name, MAC or IP
        #[arg(long, short = 's')]
        search: Option<String>,
    },

    /// Show one session
    Get {
        id: SessionId,
    },

    /// Dashboard figures across all sessions
    Summary,

    /// Start a subscriber session for an active account
    Start {
        /// Account id
        #[arg(long)]
        account: AccountId,

        /// Plan id
        #[arg(long)]
        plan: PlanId,

        /// Device MAC address
        #[arg(long)]
        mac: String,

        /// Device name
        #[arg(long, default_value = "device")]
        device_name: String,
    },

    /// Terminate a session
    Terminate {
        id: SessionId,

        /// Reason recorded on the session
        #[arg(long, default_value = "terminated by operator")]
        reason: String,
    },

    /// Raise a session's data or time quota
    Extend {
        id: SessionId,

        /// Extra data, e.g. "500 MiB" or "2GiB"
        #[arg(long, required_unless_present = "time", conflicts_with = "time")]
        data: Option<bytesize::ByteSize>,

        /// Extra time, e.g. "30m" or "2h"
        #[arg(long)]
        time: Option<humantime::Duration>,

        /// Idempotency key; retries with the same id extend once
        #[arg(long)]
        request_id: Option<String>,
    },

    /// Move a session's expiry earlier
    Shorten {
        id: SessionId,

        /// New expiry, as a duration from now (e.g. "10m")
        #[arg(long = "in")]
        within: humantime::Duration,
    },

    /// Show the countdown until a session expires
    #[command(alias = "watch-countdown")]
    Remaining {
        id: SessionId,

        /// Keep printing once a second until the session expires
        #[arg(long, short = 'w')]
        watch: bool,
    },
}

// ── Vouchers ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct VouchersArgs {
    #[command(subcommand)]
    pub command: VouchersCommand,
}

#[derive(Debug, Subcommand)]
pub enum VouchersCommand {
    /// List vouchers
    #[command(alias = "ls")]
    List {
        /// Only vouchers in this status
        #[arg(long)]
        status: Option<VoucherStatus>,
    },

    /// Generate a batch of voucher codes
    Generate {
        /// Plan id the codes grant
        #[arg(long)]
        plan: PlanId,

        /// Number of codes (1-100)
        #[arg(long, short = 'n', default_value = "1")]
        quantity: u32,

        /// Sessions each code may open
        #[arg(long)]
        max_uses: Option<u32>,

        /// Validity window from now, e.g. "7days"
        #[arg(long)]
        valid_for: Option<humantime::Duration>,

        /// Free-form note
        #[arg(long)]
        notes: Option<String>,
    },

    /// Redeem a code as a guest device
    Redeem {
        /// Voucher code (case-insensitive)
        code: String,

        /// Device MAC address
        #[arg(long)]
        mac: String,

        /// Device name
        #[arg(long, default_value = "guest-device")]
        device_name: String,

        /// Device IP address
        #[arg(long)]
        ip: Option<std::net::IpAddr>,
    },

    /// Revoke an unused code
    Revoke {
        code: VoucherCode,
    },
}

// ── Accounts ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct AccountsArgs {
    #[command(subcommand)]
    pub command: AccountsCommand,
}

#[derive(Debug, Subcommand)]
pub enum AccountsCommand {
    /// List accounts
    #[command(alias = "ls")]
    List {
        /// Only accounts in this status
        #[arg(long)]
        status: Option<AccountStatus>,
    },

    /// Approve a pending account
    Validate {
        id: AccountId,

        /// Notes recorded with the approval
        #[arg(long)]
        notes: Option<String>,

        /// Operator account recorded as approver
        #[arg(long)]
        by: Option<AccountId>,
    },

    /// Reject a pending account
    Reject {
        id: AccountId,

        /// Reason shown to the applicant
        #[arg(long)]
        reason: String,
    },
}

// ── Simulate ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Usage events file (JSON array or YAML list)
    #[arg(long, short = 'e')]
    pub events: PathBuf,

    /// Sweep for expired sessions after replaying
    #[arg(long)]
    pub refresh: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a config file with the default settings
    Init,

    /// Show the effective configuration
    Show,

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
