//! Access policy inspection.

use serde::Serialize;
use tabled::Tabled;

use captivenet_core::{AccessPolicy, Action, Console, Guard, Permissions, Role, Route};

use crate::cli::{GlobalOpts, PolicyArgs, PolicyCommand};
use crate::error::CliError;
use crate::output;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct RoleEntry {
    role: Role,
    landing: Option<Route>,
    permissions: Permissions,
}

#[derive(Tabled)]
struct RoleRow {
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Landing")]
    landing: String,
    #[tabled(rename = "Routes")]
    routes: usize,
    #[tabled(rename = "Actions")]
    actions: usize,
}

impl From<&RoleEntry> for RoleRow {
    fn from(e: &RoleEntry) -> Self {
        Self {
            role: e.role.to_string(),
            landing: landing_label(e.landing),
            routes: e.permissions.routes.len(),
            actions: e.permissions.actions.len(),
        }
    }
}

#[derive(Serialize)]
struct Grant {
    kind: &'static str,
    id: String,
    path: Option<&'static str>,
}

#[derive(Tabled)]
struct GrantRow {
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Path")]
    path: String,
}

impl From<&Grant> for GrantRow {
    fn from(g: &Grant) -> Self {
        Self {
            kind: g.kind,
            id: g.id.clone(),
            path: g.path.unwrap_or("-").into(),
        }
    }
}

#[derive(Serialize)]
struct Decision<'a> {
    role: &'a Role,
    route: &'a str,
    guard: Guard,
}

fn landing_label(route: Option<Route>) -> String {
    route.map_or_else(|| "welcome".into(), |r| r.to_string())
}

fn grants(perms: &Permissions) -> Vec<Grant> {
    let routes = perms.routes.iter().map(|r| Grant {
        kind: "route",
        id: r.to_string(),
        path: Some(r.path()),
    });
    let actions = perms.actions.iter().map(|a| Grant {
        kind: "action",
        id: a.to_string(),
        path: None,
    });
    routes.chain(actions).collect()
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(
    console: &Console,
    args: PolicyArgs,
    role: &Role,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let policy = console.policy();
    match args.command {
        PolicyCommand::Show { kind } => {
            let out = if global.role.is_some() {
                let perms = console.permissions(role, kind);
                output::render_list(
                    &global.output,
                    &grants(&perms),
                    |g| GrantRow::from(g),
                    |g| g.id.clone(),
                )
            } else {
                let entries: Vec<RoleEntry> = Role::KNOWN
                    .into_iter()
                    .map(|r| RoleEntry {
                        landing: policy.landing_route(&r, kind),
                        permissions: policy.resolve(&r, kind),
                        role: r,
                    })
                    .collect();
                output::render_list(
                    &global.output,
                    &entries,
                    |e| RoleRow::from(e),
                    |e| e.role.to_string(),
                )
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PolicyCommand::Check {
            route: Some(route),
            kind,
            ..
        } => {
            let decision = Decision {
                role,
                route: &route,
                guard: console.guard_route(role, kind, &route),
            };
            let out = output::render_single(&global.output, &decision, describe, describe);
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PolicyCommand::Check {
            action: Some(action),
            kind,
            ..
        } => {
            let action: Action = action.parse().map_err(|_| CliError::Validation {
                field: "action".into(),
                reason: format!(
                    "unknown action '{action}', expected one of: {}",
                    AccessPolicy::all_actions()
                        .map(|a| a.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            })?;
            policy.require(role, kind, action)?;
            output::print_output("allow", global.quiet);
            Ok(())
        }

        PolicyCommand::Check { .. } => Err(CliError::Validation {
            field: "route".into(),
            reason: "give a route id or --action".into(),
        }),
    }
}

fn describe(d: &Decision<'_>) -> String {
    match d.guard {
        Guard::Allow => "allow".into(),
        Guard::Redirect(to) => format!("redirect -> {}", landing_label(to)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use captivenet_core::SessionKind;

    #[test]
    fn grants_list_routes_before_actions() {
        let perms = AccessPolicy::new().resolve(&Role::Guest, None);
        let g = grants(&perms);
        assert_eq!(g.len(), 6);
        assert!(g[..3].iter().all(|g| g.kind == "route"));
        assert_eq!(g[0].path, Some("/session"));
    }

    #[test]
    fn redirect_names_landing_or_welcome() {
        let role = Role::Unrecognized("AUDITOR".into());
        let d = Decision {
            role: &role,
            route: "vouchers",
            guard: Guard::Redirect(None),
        };
        assert_eq!(describe(&d), "redirect -> welcome");
        let d = Decision {
            role: &Role::Guest,
            route: "vouchers",
            guard: Guard::Redirect(Some(Route::GuestDashboard)),
        };
        assert_eq!(describe(&d), "redirect -> guest-dashboard");
    }

    #[test]
    fn voucher_sessions_show_guest_counts() {
        let policy = AccessPolicy::new();
        let entry = RoleEntry {
            role: Role::Admin,
            landing: policy.landing_route(&Role::Admin, Some(SessionKind::Voucher)),
            permissions: policy.resolve(&Role::Admin, Some(SessionKind::Voucher)),
        };
        let row = RoleRow::from(&entry);
        assert_eq!(row.landing, "guest-dashboard");
        assert_eq!((row.routes, row.actions), (3, 3));
    }
}
