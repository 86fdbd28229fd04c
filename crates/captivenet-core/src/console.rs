// ── Operator console ──
//
// Owns the portal state (sessions, vouchers, accounts, lockouts) and is
// the only path through which it changes. Mutations are queued on a
// command channel and applied by one processor task; a background task
// sweeps the directory for expired sessions.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audit::{AuditAction, AuditEntry, AuditFilter, AuditLog, AuditRecord, AuditTarget};
use crate::clock::{Clock, SystemClock};
use crate::command::{
    Command, CommandEnvelope, CommandResult, GenerateVouchersRequest, RedeemVoucherRequest,
    StartSessionRequest,
};
use crate::config::ConsoleConfig;
use crate::error::CoreError;
use crate::event::SessionEvent;
use crate::fixture::Fixture;
use crate::model::{
    Account, AccountStatus, MacAddress, Session, SessionId, SessionKind, SessionOwner,
    TerminateOutcome, Voucher,
};
use crate::policy::{AccessPolicy, Guard, Permissions, Role, Route};
use crate::redemption::RedemptionGuard;
use crate::store::{
    AccountRegistry, DirectorySummary, SessionDirectory, VoucherBatch, VoucherBook,
};
use crate::stream::{EntityStream, SessionFilter};

const COMMAND_CHANNEL_SIZE: usize = 64;

// ── Console ──────────────────────────────────────────────────────

/// Entry point for every consumer.
///
/// Cheaply cloneable via `Arc<ConsoleInner>`. Reads go straight to the
/// store snapshots; writes go through [`execute`](Self::execute).
#[derive(Clone)]
pub struct Console {
    inner: Arc<ConsoleInner>,
}

struct ConsoleInner {
    config: ConsoleConfig,
    policy: AccessPolicy,
    clock: Arc<dyn Clock>,
    directory: SessionDirectory,
    vouchers: VoucherBook,
    accounts: AccountRegistry,
    guard: RedemptionGuard,
    audit: Arc<AuditLog>,
    running: watch::Sender<bool>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Console {
    /// Build a console on the system clock. Does not start it: call
    /// [`start()`](Self::start) before executing commands.
    pub fn new(config: ConsoleConfig) -> Result<Self, CoreError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ConsoleConfig, clock: Arc<dyn Clock>) -> Result<Self, CoreError> {
        config.validate()?;
        let (running, _) = watch::channel(false);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let guard = RedemptionGuard::new(config.lockout);
        let audit = Arc::new(AuditLog::new());

        Ok(Self {
            inner: Arc::new(ConsoleInner {
                config,
                policy: AccessPolicy::new(),
                clock,
                directory: SessionDirectory::with_audit_log(Arc::clone(&audit)),
                vouchers: VoucherBook::new(),
                accounts: AccountRegistry::new(),
                guard,
                audit,
                running,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Load seed data. Plans referenced by vouchers and sessions must
    /// exist in the configured catalog.
    pub fn seed(&self, fixture: &Fixture) -> Result<(), CoreError> {
        let inner = &self.inner;
        for voucher in &fixture.vouchers {
            inner.config.plan(voucher.plan_id)?;
            inner.vouchers.insert(voucher.clone());
        }
        for account in &fixture.accounts {
            inner.accounts.insert(account.clone());
        }
        for seed in &fixture.sessions {
            inner.directory.insert(seed.build(&inner.config)?);
        }
        debug!(
            vouchers = fixture.vouchers.len(),
            accounts = fixture.accounts.len(),
            sessions = fixture.sessions.len(),
            "console seeded"
        );
        Ok(())
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.inner.config
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.inner.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the command processor and, if configured, the refresh task.
    pub async fn start(&self) {
        let mut handles = self.inner.task_handles.lock().await;

        if let Some(rx) = self.inner.command_rx.lock().await.take() {
            let console = self.clone();
            handles.push(tokio::spawn(command_processor_task(console, rx)));
        }

        let interval_secs = self.inner.config.refresh_interval_secs;
        if interval_secs > 0 {
            let console = self.clone();
            let cancel = self.inner.cancel.clone();
            handles.push(tokio::spawn(refresh_task(console, interval_secs, cancel)));
        }

        let _ = self.inner.running.send(true);
        info!(refresh_interval_secs = interval_secs, "console started");
    }

    /// Cancel background tasks and wait for them. A stopped console
    /// rejects further commands.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }

        let _ = self.inner.running.send(false);
        debug!("console stopped");
    }

    pub fn is_running(&self) -> bool {
        *self.inner.running.borrow()
    }

    /// One-shot: build, seed, start, run closure, stop. The periodic
    /// refresh is disabled since the closure drives everything.
    pub async fn oneshot<F, Fut, T, E>(
        config: ConsoleConfig,
        clock: Arc<dyn Clock>,
        fixture: &Fixture,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce(Console) -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: From<CoreError>,
    {
        let mut cfg = config;
        cfg.refresh_interval_secs = 0;

        let console = Console::with_clock(cfg, clock)?;
        console.seed(fixture)?;
        console.start().await;
        let result = f(console.clone()).await;
        console.stop().await;
        result
    }

    // ── Command execution ────────────────────────────────────────

    /// Queue a command and await its result. No role check: use
    /// [`execute_as`](Self::execute_as) for operator actions.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        self.submit(None, cmd).await
    }

    /// Execute on behalf of `role`. Fails with `PermissionDenied` before
    /// anything is queued when the role lacks the command's action; the
    /// refusal is audited.
    pub async fn execute_as(
        &self,
        role: &Role,
        cmd: Command,
    ) -> Result<CommandResult, CoreError> {
        if let Some(action) = cmd.required_action() {
            if let Err(e) = self.inner.policy.require(role, None, action) {
                debug!(%role, %action, "command refused by access policy");
                let (target_type, target_id) = command_target(&cmd);
                self.inner.audit.append(
                    AuditRecord::new(AuditAction::AccessDenied, target_type, target_id)
                        .by(Some(role.clone()))
                        .detail(action.to_string()),
                    self.now(),
                );
                return Err(e);
            }
        }
        self.submit(Some(role.clone()), cmd).await
    }

    async fn submit(&self, actor: Option<Role>, cmd: Command) -> Result<CommandResult, CoreError> {
        if !self.is_running() {
            return Err(CoreError::ConsoleStopped);
        }

        let (tx, rx) = tokio::sync::oneshot::channel();

        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                actor,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::ConsoleStopped)?;

        rx.await.map_err(|_| CoreError::ConsoleStopped)?
    }

    // ── Policy ───────────────────────────────────────────────────

    pub fn permissions(&self, role: &Role, kind: Option<SessionKind>) -> Permissions {
        self.inner.policy.resolve(role, kind)
    }

    pub fn guard_route(&self, role: &Role, kind: Option<SessionKind>, route: &str) -> Guard {
        self.inner.policy.guard(role, kind, route)
    }

    pub fn landing_route(&self, role: &Role, kind: Option<SessionKind>) -> Option<Route> {
        self.inner.policy.landing_route(role, kind)
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn sessions(&self, filter: &SessionFilter) -> Vec<Arc<Session>> {
        self.inner.directory.list(filter, self.now())
    }

    pub fn session(&self, id: SessionId) -> Result<Arc<Session>, CoreError> {
        self.inner.directory.require(id)
    }

    pub fn sessions_for(&self, owner: &SessionOwner) -> Vec<Arc<Session>> {
        self.inner.directory.sessions_for(owner)
    }

    /// Countdown for one session, from its absolute expiry.
    pub fn remaining_time(&self, id: SessionId) -> Result<TimeDelta, CoreError> {
        Ok(self.session(id)?.remaining_time(self.now()))
    }

    pub fn summary(&self) -> DirectorySummary {
        self.inner.directory.summary(self.now())
    }

    pub fn vouchers_snapshot(&self) -> Vec<Arc<Voucher>> {
        self.inner.vouchers.list()
    }

    pub fn accounts_snapshot(&self, status: Option<AccountStatus>) -> Vec<Arc<Account>> {
        self.inner.accounts.list(status)
    }

    pub fn attempts_remaining(&self, client: &MacAddress) -> u32 {
        self.inner.guard.attempts_remaining(client, self.now())
    }

    pub fn remaining_block(&self, client: &MacAddress) -> Option<TimeDelta> {
        self.inner.guard.remaining_block(client, self.now())
    }

    /// Audit trail, oldest first.
    pub fn audit_log(&self, filter: &AuditFilter) -> Vec<Arc<AuditEntry>> {
        self.inner.audit.entries(filter)
    }

    // ── Subscriptions ────────────────────────────────────────────

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.directory.events()
    }

    pub fn sessions_stream(&self) -> EntityStream<Session> {
        self.inner.directory.subscribe()
    }

    pub fn vouchers_stream(&self) -> EntityStream<Voucher> {
        self.inner.vouchers.subscribe()
    }

    pub fn accounts_stream(&self) -> EntityStream<Account> {
        self.inner.accounts.subscribe()
    }

    /// Sweep for expired sessions now. The refresh task calls this.
    pub fn refresh(&self) -> Vec<SessionId> {
        self.inner.directory.refresh(self.now())
    }

    // ── Command handlers ─────────────────────────────────────────

    fn redeem(&self, req: RedeemVoucherRequest) -> Result<CommandResult, CoreError> {
        let inner = &self.inner;
        let now = self.now();
        let client = req.device.mac.clone();

        inner.guard.check(&client, now)?;
        let consumed = match inner.vouchers.redeem(&req.code, now) {
            Ok(consumed) => consumed,
            Err(e) => {
                if e.is_redemption_failure() {
                    let left = inner.guard.record_failure(&client, now);
                    warn!(client = %client, error = %e, attempts_left = left, "voucher redemption failed");
                }
                return Err(e);
            }
        };
        inner.guard.record_success(&client);

        let voucher = consumed.voucher;
        let plan = inner.config.plan(voucher.plan_id)?;
        let code = voucher.code.clone();
        let session = inner.directory.open(|id| {
            Session::open(
                id,
                SessionOwner::Voucher { code: code.clone() },
                req.device,
                plan.data_quota_bytes,
                plan.time_quota_secs,
                now,
                inner.config.thresholds,
            )
            .with_plan(plan.id)
            .with_voucher_exhausted(consumed.exhausted)
        });
        if consumed.exhausted {
            inner.directory.notify(SessionEvent::VoucherExhausted { code });
        }
        Ok(CommandResult::Redeemed { session, voucher })
    }

    fn start_subscriber_session(
        &self,
        req: StartSessionRequest,
    ) -> Result<CommandResult, CoreError> {
        let inner = &self.inner;
        let now = self.now();
        let account = inner.accounts.require(req.account_id)?;
        if account.status != AccountStatus::Active {
            return Err(CoreError::PermissionDenied {
                role: account.role.to_string(),
                action: format!("start a session while {}", account.status),
            });
        }
        let plan = inner.config.plan(req.plan_id)?;
        let owner = SessionOwner::Account {
            id: account.id,
            username: account.username.clone(),
        };

        let devices_in_use = inner
            .directory
            .sessions_for(&owner)
            .iter()
            .filter(|s| s.status_at(now).is_alive())
            .count();
        if devices_in_use >= usize::try_from(plan.max_devices).unwrap_or(usize::MAX) {
            return Err(CoreError::ValidationFailed {
                message: format!(
                    "plan {} allows {} concurrent device(s)",
                    plan.code, plan.max_devices
                ),
            });
        }

        let session = inner.directory.open(|id| {
            Session::open(
                id,
                owner,
                req.device,
                plan.data_quota_bytes,
                plan.time_quota_secs,
                now,
                inner.config.thresholds,
            )
            .with_plan(plan.id)
        });
        Ok(CommandResult::Session(session))
    }

    fn generate_vouchers(&self, req: GenerateVouchersRequest) -> Result<CommandResult, CoreError> {
        let inner = &self.inner;
        let defaults = inner.config.vouchers;
        let valid_from = req.valid_from.unwrap_or_else(|| self.now());
        let batch = VoucherBatch {
            plan: inner.config.plan(req.plan_id)?,
            quantity: req.quantity,
            max_uses: req.max_uses.unwrap_or(defaults.max_uses),
            valid_from,
            valid_until: req
                .valid_until
                .unwrap_or_else(|| valid_from + defaults.validity()),
            notes: req.notes,
            created_by: req.created_by,
        };
        let issued = inner.vouchers.generate(batch, &mut rand::thread_rng())?;
        Ok(CommandResult::Vouchers(issued))
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodically latch expiry across the directory.
async fn refresh_task(console: Console, interval_secs: u64, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let expired = console.refresh();
                if !expired.is_empty() {
                    info!(count = expired.len(), "sessions expired");
                }
            }
        }
    }
}

/// Apply queued commands one at a time.
async fn command_processor_task(console: Console, mut rx: mpsc::Receiver<CommandEnvelope>) {
    let cancel = console.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let result = route_command(&console, envelope.command, envelope.actor.as_ref());
                if let Err(ref e) = result {
                    debug!(error = %e, "command failed");
                }
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────

fn route_command(
    console: &Console,
    cmd: Command,
    actor: Option<&Role>,
) -> Result<CommandResult, CoreError> {
    let inner = &console.inner;
    let now = console.now();
    let audit = |record: AuditRecord| {
        inner.audit.append(record.by(actor.cloned()), now);
    };

    match cmd {
        Command::TerminateSession { id, reason } => {
            let outcome = inner.directory.terminate(id, &reason, now)?;
            if outcome == TerminateOutcome::Terminated {
                audit(
                    AuditRecord::new(AuditAction::SessionRevoke, AuditTarget::Session, id)
                        .detail(reason),
                );
            }
            Ok(CommandResult::Terminated(outcome))
        }
        Command::ExtendQuota {
            id,
            dimension,
            amount,
            request_id,
        } => {
            let status =
                inner
                    .directory
                    .extend_quota(id, dimension, amount, request_id.clone(), now)?;
            audit(
                AuditRecord::new(AuditAction::QuotaExtend, AuditTarget::Session, id)
                    .request(request_id)
                    .detail(format!("{dimension} +{amount}")),
            );
            Ok(CommandResult::Status(status))
        }
        Command::ShortenExpiry { id, until } => {
            let status = inner.directory.shorten_expiry(id, until, now)?;
            audit(
                AuditRecord::new(AuditAction::ExpiryShorten, AuditTarget::Session, id)
                    .detail(format!("until {until}")),
            );
            Ok(CommandResult::Status(status))
        }
        Command::ApplyUsage(event) => inner
            .directory
            .apply_usage(&event)
            .map(CommandResult::Status),
        Command::StartSubscriberSession(req) => {
            let result = console.start_subscriber_session(req)?;
            if let CommandResult::Session(ref session) = result {
                audit(
                    AuditRecord::new(AuditAction::SessionStart, AuditTarget::Session, session.id)
                        .detail(session.owner.label()),
                );
            }
            Ok(result)
        }
        Command::RedeemVoucher(req) => {
            let result = console.redeem(req)?;
            if let CommandResult::Redeemed {
                ref session,
                ref voucher,
            } = result
            {
                audit(
                    AuditRecord::new(AuditAction::VoucherUse, AuditTarget::Voucher, &voucher.code)
                        .detail(format!("session {}", session.id)),
                );
            }
            Ok(result)
        }
        Command::GenerateVouchers(req) => {
            let result = console.generate_vouchers(req)?;
            if let CommandResult::Vouchers(ref issued) = result {
                for v in issued {
                    audit(
                        AuditRecord::new(AuditAction::VoucherCreate, AuditTarget::Voucher, &v.code)
                            .detail(format!("plan {}", v.plan_id)),
                    );
                }
            }
            Ok(result)
        }
        Command::RevokeVoucher { code } => {
            let voucher = inner.vouchers.revoke(&code)?;
            audit(AuditRecord::new(AuditAction::VoucherRevoke, AuditTarget::Voucher, code));
            Ok(CommandResult::Voucher(voucher))
        }
        Command::ValidateAccount { id, notes, by } => {
            let account = inner.accounts.validate(id, notes, by, now)?;
            audit(AuditRecord::new(AuditAction::Validate, AuditTarget::Account, id));
            Ok(CommandResult::Account(account))
        }
        Command::RejectAccount { id, reason } => {
            let account = inner.accounts.reject(id, &reason, now)?;
            audit(AuditRecord::new(AuditAction::Reject, AuditTarget::Account, id).detail(reason));
            Ok(CommandResult::Account(account))
        }
    }
}

/// What a command acts on, for audit entries written before it runs.
fn command_target(cmd: &Command) -> (AuditTarget, String) {
    match cmd {
        Command::TerminateSession { id, .. }
        | Command::ExtendQuota { id, .. }
        | Command::ShortenExpiry { id, .. } => (AuditTarget::Session, id.to_string()),
        Command::ApplyUsage(event) => (AuditTarget::Session, event.session_id.to_string()),
        Command::StartSubscriberSession(req) => (AuditTarget::Account, req.account_id.to_string()),
        Command::RedeemVoucher(req) => (AuditTarget::Voucher, req.code.trim().to_ascii_uppercase()),
        Command::GenerateVouchers(req) => (AuditTarget::Voucher, format!("plan {}", req.plan_id)),
        Command::RevokeVoucher { code } => (AuditTarget::Voucher, code.to_string()),
        Command::ValidateAccount { id, .. } | Command::RejectAccount { id, .. } => {
            (AuditTarget::Account, id.to_string())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::{
        AccountId, DeviceRef, Dimension, GIB, PlanId, RequestId, SessionStatus, TerminateOutcome,
        VoucherCode,
    };
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    async fn demo_console(refresh_interval_secs: u64) -> (Console, ManualClock) {
        let clock = ManualClock::new(t0());
        let config = ConsoleConfig {
            refresh_interval_secs,
            ..ConsoleConfig::default()
        };
        let console = Console::with_clock(config, Arc::new(clock.clone())).unwrap();
        console.seed(&Fixture::demo(t0())).unwrap();
        console.start().await;
        (console, clock)
    }

    fn phone(mac: &str) -> DeviceRef {
        DeviceRef {
            name: "Phone".into(),
            mac: MacAddress::new(mac),
            ip: None,
        }
    }

    fn redeem(code: &str, mac: &str) -> Command {
        Command::RedeemVoucher(RedeemVoucherRequest {
            code: code.into(),
            device: phone(mac),
        })
    }

    #[tokio::test]
    async fn redeemed_session_matches_plan_and_code_is_single_use() {
        let (console, _clock) = demo_console(0).await;
        let mut events = console.events();

        let CommandResult::Redeemed { session, voucher } = console
            .execute(redeem("demo1234", "aa:aa:aa:aa:aa:01"))
            .await
            .unwrap()
        else {
            panic!("expected a redemption");
        };
        let plan = console.config().plan(PlanId(1)).unwrap();
        assert_eq!(session.data().total(), plan.data_quota_bytes);
        assert_eq!(session.time().total(), plan.time_quota_secs);
        assert_eq!(session.expires_at(), t0() + TimeDelta::hours(1));
        assert_eq!(session.kind(), SessionKind::Voucher);
        assert!(session.voucher_exhausted());
        assert_eq!(voucher.used_count, 1);

        assert!(matches!(events.recv().await.unwrap(), SessionEvent::Opened { .. }));
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::VoucherExhausted { .. }
        ));

        let err = console
            .execute(redeem("DEMO1234", "aa:aa:aa:aa:aa:02"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CodeAlreadyUsed { .. }));
        console.stop().await;
    }

    #[tokio::test]
    async fn five_failures_lock_the_client_until_cooldown() {
        let (console, clock) = demo_console(0).await;
        let mac = "aa:aa:aa:aa:aa:03";
        for _ in 0..5 {
            let err = console.execute(redeem("NOPE0000", mac)).await.unwrap_err();
            assert!(matches!(err, CoreError::InvalidCode { .. }));
        }
        let client = MacAddress::new(mac);
        assert_eq!(console.attempts_remaining(&client), 0);

        let err = console.execute(redeem("DEMO1234", mac)).await.unwrap_err();
        assert_eq!(err, CoreError::RedemptionLocked { remaining_secs: 300 });
        // The locked attempt did not consume the voucher.
        clock.advance(TimeDelta::seconds(300));
        assert_eq!(console.remaining_block(&client), None);
        console.execute(redeem("DEMO1234", mac)).await.unwrap();
        assert_eq!(console.attempts_remaining(&client), 5);
        console.stop().await;
    }

    #[tokio::test]
    async fn expired_and_revoked_codes_count_as_failures() {
        let (console, _clock) = demo_console(0).await;
        let mac = "aa:aa:aa:aa:aa:04";
        assert!(matches!(
            console.execute(redeem("OLDCODE1", mac)).await,
            Err(CoreError::CodeExpired { .. })
        ));
        assert!(matches!(
            console.execute(redeem("REVOKED1", mac)).await,
            Err(CoreError::InvalidCode { .. })
        ));
        assert_eq!(console.attempts_remaining(&MacAddress::new(mac)), 3);
        console.stop().await;
    }

    #[tokio::test]
    async fn operator_commands_are_gated_by_role() {
        let (console, _clock) = demo_console(0).await;
        let terminate = Command::TerminateSession {
            id: SessionId(1),
            reason: "abuse".into(),
        };

        let err = console
            .execute_as(&Role::Subscriber, terminate.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::PermissionDenied { .. }));
        assert!(console.session(SessionId(1)).unwrap().is_alive());

        let first = console.execute_as(&Role::Admin, terminate.clone()).await.unwrap();
        assert!(matches!(
            first,
            CommandResult::Terminated(TerminateOutcome::Terminated)
        ));
        let second = console.execute_as(&Role::SuperAdmin, terminate).await.unwrap();
        assert!(matches!(
            second,
            CommandResult::Terminated(TerminateOutcome::AlreadyClosed(SessionStatus::Terminated))
        ));

        let unknown = Role::Unrecognized("AUDITOR".into());
        assert!(matches!(
            console
                .execute_as(
                    &unknown,
                    Command::RevokeVoucher {
                        code: VoucherCode::parse("DEMO1234").unwrap()
                    }
                )
                .await,
            Err(CoreError::PermissionDenied { .. })
        ));
        console.stop().await;
    }

    #[tokio::test]
    async fn retried_extension_applies_once() {
        let (console, _clock) = demo_console(0).await;
        let extend = Command::ExtendQuota {
            id: SessionId(2),
            dimension: Dimension::Data,
            amount: i64::try_from(GIB).unwrap(),
            request_id: RequestId::new("ext-1"),
        };
        let first = console.execute_as(&Role::Admin, extend.clone()).await.unwrap();
        let second = console.execute_as(&Role::Admin, extend).await.unwrap();
        assert!(matches!(first, CommandResult::Status(SessionStatus::Warning)));
        assert!(matches!(second, CommandResult::Status(SessionStatus::Warning)));
        assert_eq!(console.session(SessionId(2)).unwrap().data().total(), 6 * GIB);
        console.stop().await;
    }

    #[tokio::test]
    async fn subscriber_sessions_need_an_active_account() {
        let (console, _clock) = demo_console(0).await;
        let start = |mac: &str| {
            Command::StartSubscriberSession(StartSessionRequest {
                account_id: AccountId(4),
                device: phone(mac),
                plan_id: PlanId(1),
            })
        };

        assert!(matches!(
            console.execute(start("bb:00:00:00:00:01")).await,
            Err(CoreError::PermissionDenied { .. })
        ));

        console
            .execute_as(
                &Role::Admin,
                Command::ValidateAccount {
                    id: AccountId(4),
                    notes: None,
                    by: Some(AccountId(2)),
                },
            )
            .await
            .unwrap();
        let CommandResult::Session(session) =
            console.execute(start("bb:00:00:00:00:01")).await.unwrap()
        else {
            panic!("expected a session");
        };
        assert_eq!(session.kind(), SessionKind::Credentialed);
        assert_eq!(session.id, SessionId(3));

        // GUEST_1H allows a single device.
        assert!(matches!(
            console.execute(start("bb:00:00:00:00:02")).await,
            Err(CoreError::ValidationFailed { .. })
        ));
        console.stop().await;
    }

    #[tokio::test]
    async fn generated_vouchers_use_configured_defaults() {
        let (console, _clock) = demo_console(0).await;
        let result = console
            .execute_as(
                &Role::Admin,
                Command::GenerateVouchers(GenerateVouchersRequest {
                    plan_id: PlanId(2),
                    quantity: 3,
                    max_uses: None,
                    valid_from: None,
                    valid_until: None,
                    notes: None,
                    created_by: Some(AccountId(2)),
                }),
            )
            .await
            .unwrap();
        let CommandResult::Vouchers(issued) = result else {
            panic!("expected vouchers");
        };
        assert_eq!(issued.len(), 3);
        for v in &issued {
            assert_eq!(v.max_uses, 1);
            assert_eq!(v.valid_from, t0());
            assert_eq!(v.valid_until, t0() + TimeDelta::days(7));
        }
        console.stop().await;
    }

    #[tokio::test]
    async fn stopped_console_rejects_commands() {
        let (console, _clock) = demo_console(0).await;
        console.stop().await;
        assert!(!console.is_running());
        assert_eq!(
            console.execute(redeem("DEMO1234", "aa:aa:aa:aa:aa:05")).await.unwrap_err(),
            CoreError::ConsoleStopped
        );
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_task_latches_expiry() {
        let (console, clock) = demo_console(30).await;
        let mut events = console.events();

        // The guest session runs out four hours in; the subscriber's does not.
        clock.advance(TimeDelta::hours(5));
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(console.session(SessionId(2)).unwrap().status(), SessionStatus::Expired);
        assert!(console.session(SessionId(1)).unwrap().is_alive());
        assert!(matches!(
            events.recv().await.unwrap(),
            SessionEvent::Expired { id: SessionId(2), .. }
        ));
        console.stop().await;
    }

    #[tokio::test]
    async fn oneshot_runs_against_seeded_state_and_stops() {
        let clock = Arc::new(ManualClock::new(t0()));
        let (count, console) = Console::oneshot(
            ConsoleConfig::default(),
            clock,
            &Fixture::demo(t0()),
            |console| async move {
                let count = console.sessions(&SessionFilter::all()).len();
                Ok::<_, CoreError>((count, console))
            },
        )
        .await
        .unwrap();
        assert_eq!(count, 2);
        assert_eq!(console.config().refresh_interval_secs, 0);
        assert!(!console.is_running());
    }

    #[tokio::test]
    async fn countdown_follows_the_clock() {
        let (console, clock) = demo_console(0).await;
        let before = console.remaining_time(SessionId(2)).unwrap();
        assert_eq!(before, TimeDelta::hours(4));
        clock.advance(TimeDelta::minutes(90));
        assert_eq!(
            console.remaining_time(SessionId(2)).unwrap(),
            TimeDelta::minutes(150)
        );
        console.stop().await;
    }

    #[tokio::test]
    async fn operator_actions_and_redemptions_are_audited() {
        let (console, _clock) = demo_console(0).await;
        let terminate = Command::TerminateSession {
            id: SessionId(1),
            reason: "abuse".into(),
        };
        console.execute_as(&Role::Admin, terminate.clone()).await.unwrap();
        // Already closed: nothing new to record.
        console.execute_as(&Role::Admin, terminate).await.unwrap();
        console
            .execute(redeem("demo1234", "aa:aa:aa:aa:aa:05"))
            .await
            .unwrap();

        let revokes = console.audit_log(&AuditFilter {
            action: Some(AuditAction::SessionRevoke),
            ..AuditFilter::default()
        });
        assert_eq!(revokes.len(), 1);
        assert_eq!(revokes[0].actor_role, Some(Role::Admin));
        assert_eq!(revokes[0].target_type, AuditTarget::Session);
        assert_eq!(revokes[0].target_id, "1");
        assert_eq!(revokes[0].detail.as_deref(), Some("abuse"));
        assert_eq!(revokes[0].timestamp, t0());

        let uses = console.audit_log(&AuditFilter {
            action: Some(AuditAction::VoucherUse),
            ..AuditFilter::default()
        });
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].actor_role, None);
        assert_eq!(uses[0].target_id, "DEMO1234");
        console.stop().await;
    }

    #[tokio::test]
    async fn refused_commands_are_audited_and_not_applied() {
        let (console, _clock) = demo_console(0).await;
        let err = console
            .execute_as(
                &Role::Subscriber,
                Command::TerminateSession {
                    id: SessionId(1),
                    reason: "abuse".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::PermissionDenied { .. }));

        let all = console.audit_log(&AuditFilter::default());
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].action, AuditAction::AccessDenied);
        assert_eq!(all[0].actor_role, Some(Role::Subscriber));
        assert_eq!(all[0].target_id, "1");
        console.stop().await;
    }

    #[tokio::test]
    async fn quota_extension_audit_keeps_the_request_id() {
        let (console, _clock) = demo_console(0).await;
        console
            .execute_as(
                &Role::Admin,
                Command::ExtendQuota {
                    id: SessionId(1),
                    dimension: Dimension::Data,
                    amount: i64::try_from(GIB).unwrap(),
                    request_id: RequestId::new("ext-7"),
                },
            )
            .await
            .unwrap();
        let entries = console.audit_log(&AuditFilter {
            action: Some(AuditAction::QuotaExtend),
            target_type: Some(AuditTarget::Session),
            target_id: Some("1".into()),
        });
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].request_id.as_str(), "ext-7");
        assert_eq!(entries[0].actor_role, Some(Role::Admin));
        console.stop().await;
    }
}
