// ── Access policy ──
//
// The single table of what each role may reach. Route guards, the CLI
// and the console's command gate all resolve through here.
//
// Layering: SUBSCRIBER = common + self-service, ADMIN = SUBSCRIBER +
// operator items, SUPERADMIN = ADMIN + system items. GUEST is its own
// small set and only shares the session-status/profile entries.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::CoreError;
use crate::model::SessionKind;

// ── Role ────────────────────────────────────────────────────────────

/// Account role. Unknown wire values are kept as `Unrecognized` and
/// resolve to no permissions at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    SuperAdmin,
    Admin,
    Subscriber,
    Guest,
    Unrecognized(String),
}

impl Role {
    /// The four roles the table knows about, highest rank first.
    pub const KNOWN: [Role; 4] = [Role::SuperAdmin, Role::Admin, Role::Subscriber, Role::Guest];

    pub fn as_str(&self) -> &str {
        match self {
            Self::SuperAdmin => "SUPERADMIN",
            Self::Admin => "ADMIN",
            Self::Subscriber => "SUBSCRIBER",
            Self::Guest => "GUEST",
            Self::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "SUPERADMIN" => Self::SuperAdmin,
            "ADMIN" => Self::Admin,
            "SUBSCRIBER" => Self::Subscriber,
            "GUEST" => Self::Guest,
            _ => Self::Unrecognized(s.trim().to_owned()),
        })
    }
}

impl From<String> for Role {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(role) => role,
            Err(never) => match never {},
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_owned()
    }
}

// ── Routes & actions ────────────────────────────────────────────────

/// Navigable console views.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Route {
    Dashboard,
    Profile,
    Timeline,
    Notifications,
    SessionStatus,
    Devices,
    Usage,
    Sessions,
    Calendar,
    Notes,
    Users,
    Validation,
    Vouchers,
    VoucherGenerator,
    SessionMonitor,
    QuotaManager,
    Tasks,
    Files,
    Contacts,
    SystemMetrics,
    Configuration,
    Audit,
    GuestDashboard,
    GuestProfile,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Self::Dashboard => "/dashboard",
            Self::Profile => "/profile",
            Self::Timeline => "/timeline",
            Self::Notifications => "/notifications",
            Self::SessionStatus => "/session",
            Self::Devices => "/devices",
            Self::Usage => "/usage",
            Self::Sessions => "/sessions",
            Self::Calendar => "/calendar",
            Self::Notes => "/notes",
            Self::Users => "/users",
            Self::Validation => "/validation",
            Self::Vouchers => "/vouchers",
            Self::VoucherGenerator => "/voucher-generator",
            Self::SessionMonitor => "/session-monitor",
            Self::QuotaManager => "/quota-manager",
            Self::Tasks => "/tasks",
            Self::Files => "/files",
            Self::Contacts => "/contacts",
            Self::SystemMetrics => "/system-metrics",
            Self::Configuration => "/config",
            Self::Audit => "/audit",
            Self::GuestDashboard => "/guest/dashboard",
            Self::GuestProfile => "/guest/profile",
        }
    }
}

/// Operations a view or command may perform.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Action {
    ViewSessionStatus,
    EditProfile,
    ManageNotifications,
    ViewTimeline,
    ManageOwnDevices,
    ViewOwnUsage,
    ViewOwnSessions,
    ViewUsers,
    ValidateAccount,
    RejectAccount,
    GenerateVoucher,
    RevokeVoucher,
    ViewAllSessions,
    TerminateSession,
    ExtendQuota,
    ShortenExpiry,
    ViewSystemMetrics,
    EditConfiguration,
    ViewAuditLog,
}

// ── Permission table ────────────────────────────────────────────────

const COMMON_ROUTES: &[Route] = &[
    Route::Dashboard,
    Route::Profile,
    Route::Timeline,
    Route::Notifications,
    Route::SessionStatus,
];
const COMMON_ACTIONS: &[Action] = &[
    Action::ViewSessionStatus,
    Action::EditProfile,
    Action::ManageNotifications,
    Action::ViewTimeline,
];

const SUBSCRIBER_ROUTES: &[Route] = &[
    Route::Devices,
    Route::Usage,
    Route::Sessions,
    Route::Calendar,
    Route::Notes,
];
const SUBSCRIBER_ACTIONS: &[Action] = &[
    Action::ManageOwnDevices,
    Action::ViewOwnUsage,
    Action::ViewOwnSessions,
];

const ADMIN_ROUTES: &[Route] = &[
    Route::Users,
    Route::Validation,
    Route::Vouchers,
    Route::VoucherGenerator,
    Route::SessionMonitor,
    Route::QuotaManager,
    Route::Tasks,
    Route::Files,
    Route::Contacts,
];
const ADMIN_ACTIONS: &[Action] = &[
    Action::ViewUsers,
    Action::ValidateAccount,
    Action::RejectAccount,
    Action::GenerateVoucher,
    Action::RevokeVoucher,
    Action::ViewAllSessions,
    Action::TerminateSession,
    Action::ExtendQuota,
    Action::ShortenExpiry,
];

const SUPERADMIN_ROUTES: &[Route] = &[Route::SystemMetrics, Route::Configuration, Route::Audit];
const SUPERADMIN_ACTIONS: &[Action] = &[
    Action::ViewSystemMetrics,
    Action::EditConfiguration,
    Action::ViewAuditLog,
];

const GUEST_ROUTES: &[Route] = &[
    Route::GuestDashboard,
    Route::GuestProfile,
    Route::SessionStatus,
];
const GUEST_ACTIONS: &[Action] = &[
    Action::ViewSessionStatus,
    Action::EditProfile,
    Action::ManageNotifications,
];

/// Resolved permission set for one role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub routes: BTreeSet<Route>,
    pub actions: BTreeSet<Action>,
}

impl Permissions {
    fn with(mut self, routes: &[Route], actions: &[Action]) -> Self {
        self.routes.extend(routes.iter().copied());
        self.actions.extend(actions.iter().copied());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty() && self.actions.is_empty()
    }

    pub fn allows_route(&self, route: Route) -> bool {
        self.routes.contains(&route)
    }

    pub fn allows_action(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }

    /// String-keyed lookup for identifiers from the outside world.
    /// Unknown ids are simply not permitted.
    pub fn allows_route_id(&self, id: &str) -> bool {
        id.parse::<Route>().is_ok_and(|r| self.allows_route(r))
    }

    pub fn allows_action_id(&self, id: &str) -> bool {
        id.parse::<Action>().is_ok_and(|a| self.allows_action(a))
    }

    pub fn is_superset_of(&self, other: &Self) -> bool {
        self.routes.is_superset(&other.routes) && self.actions.is_superset(&other.actions)
    }

    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            routes: self.routes.intersection(&other.routes).copied().collect(),
            actions: self.actions.intersection(&other.actions).copied().collect(),
        }
    }
}

/// Outcome of a route guard check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "to", rename_all = "lowercase")]
pub enum Guard {
    Allow,
    /// Send the user to their landing view; `None` means the public welcome page.
    Redirect(Option<Route>),
}

/// Role → permission resolver.
///
/// Passed explicitly to whatever needs it rather than held globally.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy;

impl AccessPolicy {
    pub fn new() -> Self {
        Self
    }

    /// The authenticated baseline every credentialed role starts from.
    pub fn common() -> Permissions {
        Permissions::default().with(COMMON_ROUTES, COMMON_ACTIONS)
    }

    fn role_base(role: &Role) -> Permissions {
        match role {
            Role::Guest => Permissions::default().with(GUEST_ROUTES, GUEST_ACTIONS),
            Role::Subscriber => Self::common().with(SUBSCRIBER_ROUTES, SUBSCRIBER_ACTIONS),
            Role::Admin => Self::role_base(&Role::Subscriber).with(ADMIN_ROUTES, ADMIN_ACTIONS),
            Role::SuperAdmin => {
                Self::role_base(&Role::Admin).with(SUPERADMIN_ROUTES, SUPERADMIN_ACTIONS)
            }
            Role::Unrecognized(_) => Permissions::default(),
        }
    }

    /// Resolve a role (and optionally the kind of session it holds).
    ///
    /// Voucher sessions are guest-scoped whatever the role. Unrecognized
    /// roles always get the empty set.
    pub fn resolve(&self, role: &Role, kind: Option<SessionKind>) -> Permissions {
        if !role.is_recognized() {
            return Permissions::default();
        }
        match kind {
            Some(SessionKind::Voucher) => Self::role_base(&Role::Guest),
            Some(SessionKind::Credentialed) | None => Self::role_base(role),
        }
    }

    /// Where to send a user after login or a denied navigation.
    pub fn landing_route(&self, role: &Role, kind: Option<SessionKind>) -> Option<Route> {
        if !role.is_recognized() {
            return None;
        }
        if *role == Role::Guest || kind == Some(SessionKind::Voucher) {
            Some(Route::GuestDashboard)
        } else {
            Some(Route::Dashboard)
        }
    }

    /// Route guard: allow, or redirect to the landing view. Never an error.
    pub fn guard(&self, role: &Role, kind: Option<SessionKind>, route: &str) -> Guard {
        if self.resolve(role, kind).allows_route_id(route) {
            Guard::Allow
        } else {
            Guard::Redirect(self.landing_route(role, kind))
        }
    }

    /// Internal check for command execution.
    pub fn require(
        &self,
        role: &Role,
        kind: Option<SessionKind>,
        action: Action,
    ) -> Result<(), CoreError> {
        if self.resolve(role, kind).allows_action(action) {
            Ok(())
        } else {
            Err(CoreError::PermissionDenied {
                role: role.to_string(),
                action: action.to_string(),
            })
        }
    }

    /// Full table for the known roles, highest rank first.
    pub fn table(&self) -> Vec<(Role, Permissions)> {
        Role::KNOWN
            .into_iter()
            .map(|role| {
                let perms = self.resolve(&role, None);
                (role, perms)
            })
            .collect()
    }

    pub fn all_actions() -> impl Iterator<Item = Action> {
        Action::iter()
    }
}
