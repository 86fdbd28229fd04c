// ── Seed data ──
//
// Plans, vouchers, accounts and live sessions loaded into a console at
// start-up. Parsed from JSON or YAML text; the console never writes a
// fixture back.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ConsoleConfig;
use crate::error::CoreError;
use crate::model::{
    Account, AccountId, AccountStatus, DeviceRef, GIB, HOUR_SECS, MacAddress, Plan, PlanId,
    Session, SessionId, SessionOwner, Voucher, VoucherCode, VoucherStatus,
};
use crate::policy::Role;

/// A session as recorded by the gateway, before it is rebuilt.
///
/// Totals default to the plan's when left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSeed {
    pub id: SessionId,
    pub owner: SessionOwner,
    pub device: DeviceRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<PlanId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_total_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_total_secs: Option<u64>,
    #[serde(default)]
    pub data_used_bytes: u64,
    #[serde(default)]
    pub time_used_secs: u64,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<DateTime<Utc>>,
    #[serde(default)]
    pub voucher_exhausted: bool,
}

impl SessionSeed {
    pub fn build(&self, config: &ConsoleConfig) -> Result<Session, CoreError> {
        let plan = self.plan_id.map(|id| config.plan(id)).transpose()?;
        let data_total = self
            .data_total_bytes
            .or(plan.map(|p| p.data_quota_bytes))
            .ok_or_else(|| missing_total(self.id, "data"))?;
        let time_total = self
            .time_total_secs
            .or(plan.map(|p| p.time_quota_secs))
            .ok_or_else(|| missing_total(self.id, "time"))?;

        let mut session = Session::open(
            self.id,
            self.owner.clone(),
            self.device.clone(),
            data_total,
            time_total,
            self.start_time,
            config.thresholds,
        )
        .with_voucher_exhausted(self.voucher_exhausted)
        .with_usage(
            self.data_used_bytes,
            self.time_used_secs,
            self.last_activity.unwrap_or(self.start_time),
        );
        if let Some(id) = self.plan_id {
            session = session.with_plan(id);
        }
        Ok(session)
    }
}

fn missing_total(id: SessionId, dimension: &str) -> CoreError {
    CoreError::ValidationFailed {
        message: format!("session {id} needs a plan or an explicit {dimension} total"),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    /// Replaces the configured catalog when non-empty.
    pub plans: Vec<Plan>,
    pub vouchers: Vec<Voucher>,
    pub accounts: Vec<Account>,
    pub sessions: Vec<SessionSeed>,
}

impl Fixture {
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        serde_json::from_str(text).map_err(|e| CoreError::ValidationFailed {
            message: format!("invalid fixture JSON: {e}"),
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, CoreError> {
        serde_yaml::from_str(text).map_err(|e| CoreError::ValidationFailed {
            message: format!("invalid fixture YAML: {e}"),
        })
    }

    /// Install the fixture's plan catalog into `config`, if it has one.
    pub fn configure(&self, config: &mut ConsoleConfig) {
        if !self.plans.is_empty() {
            config.plans.clone_from(&self.plans);
        }
    }

    /// The demo portal, anchored at `now` so its sessions are live.
    pub fn demo(now: DateTime<Utc>) -> Self {
        let days = TimeDelta::days;
        let hours = TimeDelta::hours;
        let minutes = TimeDelta::minutes;

        let voucher = |code: &str, plan: u64, max_uses: u32| -> Option<Voucher> {
            Some(Voucher {
                code: VoucherCode::parse(code).ok()?,
                plan_id: PlanId(plan),
                max_uses,
                used_count: 0,
                valid_from: now - days(1),
                valid_until: now + days(7),
                status: VoucherStatus::Active,
                notes: None,
                created_by: Some(AccountId(2)),
            })
        };

        let mut vouchers: Vec<Voucher> = [
            voucher("DEMO1234", 1, 1),
            voucher("LOBBY001", 2, 3).map(|v| Voucher {
                notes: Some("Lobby desk".into()),
                ..v
            }),
            voucher("REVOKED1", 1, 1).map(|v| Voucher {
                status: VoucherStatus::Revoked,
                ..v
            }),
            voucher("OLDCODE1", 1, 1).map(|v| Voucher {
                valid_from: now - days(30),
                valid_until: now - days(23),
                ..v
            }),
            voucher("GUEST001", 2, 1).map(|v| Voucher {
                used_count: 1,
                status: VoucherStatus::Used,
                ..v
            }),
        ]
        .into_iter()
        .flatten()
        .collect();
        vouchers.sort_by(|a, b| a.code.cmp(&b.code));

        let account = |id: u64, name: [&str; 3], role: Role, status: AccountStatus| Account {
            id: AccountId(id),
            email: format!("{}@captivenet.local", name[0]),
            username: name[0].into(),
            first_name: name[1].into(),
            last_name: name[2].into(),
            role,
            status,
            validation_notes: None,
            rejection_reason: None,
            validated_by: None,
            validated_at: None,
        };
        let accounts = vec![
            account(1, ["root", "System", "Owner"], Role::SuperAdmin, AccountStatus::Active),
            account(2, ["admin", "Network", "Operator"], Role::Admin, AccountStatus::Active),
            account(3, ["jdoe", "John", "Doe"], Role::Subscriber, AccountStatus::Active),
            account(4, ["msmith", "Maria", "Smith"], Role::Subscriber, AccountStatus::Pending),
            account(5, ["alee", "Alex", "Lee"], Role::Subscriber, AccountStatus::Pending),
        ];

        let mut sessions = vec![SessionSeed {
            id: SessionId(1),
            owner: SessionOwner::Account {
                id: AccountId(3),
                username: "jdoe".into(),
            },
            device: DeviceRef {
                name: "Laptop-Work".into(),
                mac: MacAddress::new("00:1A:2B:3C:4D:5E"),
                ip: Some(std::net::IpAddr::from([192, 168, 1, 45])),
            },
            plan_id: Some(PlanId(3)),
            data_total_bytes: None,
            time_total_secs: None,
            data_used_bytes: 5 * GIB / 2,
            time_used_secs: 2 * HOUR_SECS,
            start_time: now - hours(2),
            last_activity: Some(now - minutes(1)),
            voucher_exhausted: false,
        }];
        if let Ok(code) = VoucherCode::parse("GUEST001") {
            sessions.push(SessionSeed {
                id: SessionId(2),
                owner: SessionOwner::Voucher { code },
                device: DeviceRef {
                    name: "Galaxy-S23".into(),
                    mac: MacAddress::new("A4-C3-F0-85-AC-2D"),
                    ip: Some(std::net::IpAddr::from([192, 168, 1, 112])),
                },
                plan_id: Some(PlanId(2)),
                data_total_bytes: None,
                time_total_secs: None,
                // 4.6 GiB of 5 GiB: past the critical threshold.
                data_used_bytes: 46 * GIB / 10,
                time_used_secs: 20 * HOUR_SECS,
                start_time: now - hours(20),
                last_activity: Some(now - minutes(5)),
                voucher_exhausted: true,
            });
        }

        Self {
            plans: Plan::default_catalog(),
            vouchers,
            accounts,
            sessions,
        }
    }
}
