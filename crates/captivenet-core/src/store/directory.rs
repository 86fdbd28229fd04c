// ── Session directory ──
//
// The single writer of truth for many sessions. Views read snapshots;
// every mutation goes through here and is published to subscribers
// together with a lifecycle event.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::collection::EntityCollection;
use crate::audit::{AuditAction, AuditLog, AuditRecord, AuditTarget};
use crate::command::UsageEvent;
use crate::error::CoreError;
use crate::event::SessionEvent;
use crate::model::{
    Dimension, RequestId, Session, SessionId, SessionOwner, SessionStatus, TerminateOutcome,
};
use crate::stream::{EntityStream, SessionFilter};

const EVENT_CHANNEL_SIZE: usize = 256;

/// Operator dashboard figures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DirectorySummary {
    pub total: usize,
    /// Sessions not yet closed.
    pub alive: usize,
    pub by_status: BTreeMap<SessionStatus, usize>,
    /// Bytes transferred across every session, open or closed.
    pub data_used_bytes: u64,
    pub time_used_secs: u64,
}

pub struct SessionDirectory {
    sessions: EntityCollection<SessionId, Session>,
    next_id: AtomicU64,
    /// Outcomes of quota extensions, keyed by the caller's request id.
    extensions: DashMap<RequestId, Result<SessionStatus, CoreError>>,
    events: broadcast::Sender<SessionEvent>,
    /// Expiries are written here as they latch.
    audit: Arc<AuditLog>,
}

impl Default for SessionDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::with_audit_log(Arc::new(AuditLog::new()))
    }

    /// Share an audit trail with the rest of the console.
    pub fn with_audit_log(audit: Arc<AuditLog>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            sessions: EntityCollection::new(),
            next_id: AtomicU64::new(1),
            extensions: DashMap::new(),
            events,
            audit,
        }
    }

    // ── Intake ───────────────────────────────────────────────────────

    /// Issue a fresh id and store the session `build` creates for it.
    pub fn open(&self, build: impl FnOnce(SessionId) -> Session) -> Arc<Session> {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let session = self.sessions.insert_new(id, build(id));
        info!(session = %id, owner = %session.owner.label(), "session opened");
        self.emit(SessionEvent::Opened {
            id,
            kind: session.kind(),
            owner: session.owner.label(),
        });
        session
    }

    /// Load a session that already has an id (fixtures, resync).
    /// Fresh ids continue after the highest one seen.
    pub fn insert(&self, session: Session) {
        let next = session.id.get().saturating_add(1);
        self.next_id.fetch_max(next, Ordering::Relaxed);
        self.sessions.upsert(session.id, session);
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.get(&id)
    }

    pub fn require(&self, id: SessionId) -> Result<Arc<Session>, CoreError> {
        self.get(id).ok_or_else(|| CoreError::not_found("session", id))
    }

    /// Matching sessions at `now`, most recent activity first; ties by id.
    pub fn list(&self, filter: &SessionFilter, now: DateTime<Utc>) -> Vec<Arc<Session>> {
        let mut matched: Vec<_> = self
            .sessions
            .snapshot()
            .iter()
            .filter(|s| filter.matches(s, now))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            b.last_activity()
                .cmp(&a.last_activity())
                .then_with(|| a.id.cmp(&b.id))
        });
        matched
    }

    pub fn sessions_for(&self, owner: &SessionOwner) -> Vec<Arc<Session>> {
        let mut owned: Vec<_> = self
            .sessions
            .snapshot()
            .iter()
            .filter(|s| s.owner == *owner)
            .cloned()
            .collect();
        owned.sort_by_key(|s| s.id);
        owned
    }

    pub fn summary(&self, now: DateTime<Utc>) -> DirectorySummary {
        let snapshot = self.sessions.snapshot();
        let mut summary = DirectorySummary {
            total: snapshot.len(),
            ..DirectorySummary::default()
        };
        for s in snapshot.iter() {
            let status = s.status_at(now);
            *summary.by_status.entry(status).or_default() += 1;
            if status.is_alive() {
                summary.alive += 1;
            }
            summary.data_used_bytes = summary.data_used_bytes.saturating_add(s.data().used());
            summary.time_used_secs = summary.time_used_secs.saturating_add(s.time().used());
        }
        summary
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> EntityStream<Session> {
        EntityStream::new(self.sessions.subscribe())
    }

    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Apply one gateway tick to its session.
    pub fn apply_usage(&self, event: &UsageEvent) -> Result<SessionStatus, CoreError> {
        self.mutate(event.session_id, |s| {
            s.tick(
                event.data_delta_bytes,
                event.time_delta_seconds,
                event.timestamp,
            )
        })
    }

    /// Terminate by id. Unknown ids fail with `NotFound`; a session that
    /// is already closed reports `AlreadyClosed` and stays as it was.
    pub fn terminate(
        &self,
        id: SessionId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<TerminateOutcome, CoreError> {
        self.mutate(id, |s| Ok(s.terminate(reason, now)))
    }

    /// Extend one quota. A repeated `request_id` returns the first
    /// outcome without extending again.
    pub fn extend_quota(
        &self,
        id: SessionId,
        dimension: Dimension,
        amount: i64,
        request_id: RequestId,
        now: DateTime<Utc>,
    ) -> Result<SessionStatus, CoreError> {
        match self.extensions.entry(request_id) {
            Entry::Occupied(done) => {
                debug!(request = %done.key(), "duplicate extension request");
                done.get().clone()
            }
            Entry::Vacant(slot) => {
                let outcome = self.mutate(id, |s| s.extend_quota(dimension, amount, now));
                if outcome.is_ok() {
                    self.emit(SessionEvent::QuotaExtended {
                        id,
                        dimension,
                        amount,
                    });
                }
                slot.insert(outcome.clone());
                outcome
            }
        }
    }

    pub fn shorten_expiry(
        &self,
        id: SessionId,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<SessionStatus, CoreError> {
        let status = self.mutate(id, |s| s.shorten_expiry(until, now))?;
        if let Some(s) = self.get(id) {
            self.emit(SessionEvent::ExpiryShortened {
                id,
                expires_at: s.expires_at(),
            });
        }
        Ok(status)
    }

    /// Latch expiry on every alive session at `now`. Returns the ids that
    /// expired in this sweep.
    pub fn refresh(&self, now: DateTime<Utc>) -> Vec<SessionId> {
        let due: Vec<SessionId> = self
            .sessions
            .snapshot()
            .iter()
            .filter(|s| s.is_alive() && s.status_at(now) != s.status())
            .map(|s| s.id)
            .collect();

        let mut expired = Vec::new();
        for id in due {
            if let Ok(SessionStatus::Expired) = self.mutate(id, |s| Ok(s.observe(now))) {
                expired.push(id);
            }
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "refresh expired sessions");
        }
        expired.sort();
        expired
    }

    // ── Internals ────────────────────────────────────────────────────

    /// Run a lifecycle operation on a copy of the session and publish the
    /// result, emitting an event when the status moved.
    fn mutate<R>(
        &self,
        id: SessionId,
        op: impl FnOnce(&mut Session) -> Result<R, CoreError>,
    ) -> Result<R, CoreError> {
        let mut before = None;
        let (out, after) = self
            .sessions
            .try_update(&id, |s| {
                before = Some(s.status());
                op(s)
            })
            .ok_or_else(|| CoreError::not_found("session", id))??;

        if let Some(from) = before.filter(|from| *from != after.status()) {
            self.emit_transition(&after, from);
        }
        Ok(out)
    }

    fn emit_transition(&self, session: &Session, from: SessionStatus) {
        let id = session.id;
        let reason = session
            .closure()
            .map(|c| c.reason.clone())
            .unwrap_or_default();
        if let Some(closure) = session.closure().filter(|c| c.status == SessionStatus::Expired) {
            let action = if closure.at >= session.expires_at() {
                AuditAction::SessionTimeout
            } else {
                AuditAction::QuotaExceeded
            };
            self.audit.append(
                AuditRecord::new(action, AuditTarget::Session, id)
                    .detail(format!("{} ({})", closure.reason, session.owner.label())),
                closure.at,
            );
        }
        let event = match session.status() {
            SessionStatus::Expired => SessionEvent::Expired { id, reason },
            SessionStatus::Terminated => SessionEvent::Terminated { id, reason },
            to => SessionEvent::StatusChanged { id, from, to },
        };
        self.emit(event);
    }

    /// Publish an event raised outside the directory (voucher book).
    pub(crate) fn notify(&self, event: SessionEvent) {
        self.emit(event);
    }

    fn emit(&self, event: SessionEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{AccountId, DeviceRef, MacAddress, Thresholds, VoucherCode};
    use chrono::{TimeDelta, TimeZone};
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    fn secs(n: i64) -> TimeDelta {
        TimeDelta::seconds(n)
    }

    fn device(name: &str, mac: &str) -> DeviceRef {
        DeviceRef {
            name: name.into(),
            mac: MacAddress::new(mac),
            ip: None,
        }
    }

    fn subscriber(id: u64, name: &str) -> SessionOwner {
        SessionOwner::Account {
            id: AccountId(id),
            username: name.into(),
        }
    }

    fn open(dir: &SessionDirectory, owner: SessionOwner, time_total: u64) -> Arc<Session> {
        dir.open(|id| {
            Session::open(
                id,
                owner,
                device("laptop", "aa:aa:aa:aa:aa:aa"),
                1_000,
                time_total,
                t0(),
                Thresholds::default(),
            )
        })
    }

    fn tick(id: SessionId, data: i64, at: i64) -> UsageEvent {
        UsageEvent {
            session_id: id,
            data_delta_bytes: data,
            time_delta_seconds: 1,
            timestamp: t0() + secs(at),
        }
    }

    #[test]
    fn ids_are_sequential_and_continue_after_loaded_sessions() {
        let dir = SessionDirectory::new();
        assert_eq!(open(&dir, subscriber(1, "a"), 60).id, SessionId(1));
        let loaded = Session::open(
            SessionId(41),
            subscriber(2, "b"),
            device("phone", "bb:bb:bb:bb:bb:bb"),
            1_000,
            60,
            t0(),
            Thresholds::default(),
        );
        dir.insert(loaded);
        assert_eq!(open(&dir, subscriber(3, "c"), 60).id, SessionId(42));
        assert_eq!(dir.len(), 3);
    }

    #[test]
    fn list_orders_by_recent_activity_then_id() {
        let dir = SessionDirectory::new();
        let a = open(&dir, subscriber(1, "alice"), 3600);
        let b = open(&dir, subscriber(2, "bob"), 3600);
        let c = open(&dir, subscriber(3, "carol"), 3600);
        dir.apply_usage(&tick(b.id, 10, 30)).unwrap();

        let ids: Vec<_> = dir.list(&SessionFilter::all(), t0()).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![b.id, a.id, c.id]);

        let only_bob: Vec<_> = dir
            .list(&SessionFilter::all().text("BOB"), t0())
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(only_bob, vec![b.id]);
    }

    #[test]
    fn terminate_unknown_id_is_not_found() {
        let dir = SessionDirectory::new();
        assert!(matches!(
            dir.terminate(SessionId(42), "abuse", t0()),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn terminating_expired_session_keeps_it_expired() {
        let dir = SessionDirectory::new();
        let s = open(&dir, subscriber(1, "alice"), 60);
        assert_eq!(dir.refresh(t0() + secs(60)), vec![s.id]);
        let outcome = dir.terminate(s.id, "cleanup", t0() + secs(120)).unwrap();
        assert_eq!(outcome, TerminateOutcome::AlreadyClosed(SessionStatus::Expired));
        assert_eq!(dir.get(s.id).unwrap().status(), SessionStatus::Expired);
    }

    #[test]
    fn repeated_request_id_extends_once() {
        let dir = SessionDirectory::new();
        let s = open(&dir, subscriber(1, "alice"), 3600);
        let req = RequestId::new("req-1");
        dir.extend_quota(s.id, Dimension::Data, 500, req.clone(), t0() + secs(1))
            .unwrap();
        dir.extend_quota(s.id, Dimension::Data, 500, req, t0() + secs(2))
            .unwrap();
        assert_eq!(dir.get(s.id).unwrap().data().total(), 1_500);

        dir.extend_quota(s.id, Dimension::Data, 500, RequestId::new("req-2"), t0() + secs(3))
            .unwrap();
        assert_eq!(dir.get(s.id).unwrap().data().total(), 2_000);
    }

    #[test]
    fn repeated_failed_extension_returns_same_error() {
        let dir = SessionDirectory::new();
        let s = open(&dir, subscriber(1, "alice"), 3600);
        let req = RequestId::new("bad");
        let first = dir.extend_quota(s.id, Dimension::Time, -5, req.clone(), t0());
        let second = dir.extend_quota(s.id, Dimension::Time, 600, req, t0());
        assert!(matches!(first, Err(CoreError::InvalidAmount { .. })));
        assert_eq!(first, second);
        assert_eq!(dir.get(s.id).unwrap().time().total(), 3600);
    }

    #[test]
    fn usage_events_drive_status_and_events() {
        let dir = SessionDirectory::new();
        let mut events = dir.events();
        let s = open(&dir, subscriber(1, "alice"), 3600);
        assert!(matches!(events.try_recv().unwrap(), SessionEvent::Opened { .. }));

        assert_eq!(dir.apply_usage(&tick(s.id, 850, 10)).unwrap(), SessionStatus::Warning);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::StatusChanged {
                id: s.id,
                from: SessionStatus::Active,
                to: SessionStatus::Warning,
            }
        );
        assert_eq!(dir.apply_usage(&tick(s.id, 150, 20)).unwrap(), SessionStatus::Expired);
        assert!(matches!(events.try_recv().unwrap(), SessionEvent::Expired { .. }));
        assert!(matches!(
            dir.apply_usage(&tick(s.id, 1, 30)),
            Err(CoreError::SessionClosed { .. })
        ));
    }

    #[test]
    fn stale_tick_is_rejected() {
        let dir = SessionDirectory::new();
        let s = open(&dir, subscriber(1, "alice"), 3600);
        dir.apply_usage(&tick(s.id, 10, 20)).unwrap();
        assert!(matches!(
            dir.apply_usage(&tick(s.id, 10, 10)),
            Err(CoreError::OutOfOrderTick { .. })
        ));
        assert_eq!(dir.get(s.id).unwrap().data().used(), 10);
    }

    #[test]
    fn refresh_only_touches_due_sessions() {
        let dir = SessionDirectory::new();
        let short = open(&dir, subscriber(1, "alice"), 60);
        let long = open(&dir, subscriber(2, "bob"), 3600);
        assert!(dir.refresh(t0() + secs(59)).is_empty());
        assert_eq!(dir.refresh(t0() + secs(60)), vec![short.id]);
        assert!(dir.refresh(t0() + secs(61)).is_empty());
        assert!(dir.get(long.id).unwrap().is_alive());
    }

    #[test]
    fn expiries_are_audited_by_cause() {
        let audit = Arc::new(AuditLog::new());
        let dir = SessionDirectory::with_audit_log(Arc::clone(&audit));
        let drained = open(&dir, subscriber(1, "alice"), 3600);
        let lapsed = open(&dir, subscriber(2, "bob"), 60);
        let kept = open(&dir, subscriber(3, "carol"), 3600);
        dir.apply_usage(&tick(drained.id, 1_000, 10)).unwrap();
        dir.refresh(t0() + secs(60));
        dir.terminate(kept.id, "abuse", t0() + secs(61)).unwrap();

        let entries = audit.entries(&crate::audit::AuditFilter::default());
        let got: Vec<_> = entries
            .iter()
            .map(|e| (e.action, e.target_id.clone(), e.timestamp))
            .collect();
        assert_eq!(
            got,
            vec![
                (AuditAction::QuotaExceeded, drained.id.to_string(), t0() + secs(10)),
                (AuditAction::SessionTimeout, lapsed.id.to_string(), t0() + secs(60)),
            ]
        );
        assert!(entries.iter().all(|e| e.actor_role.is_none()));
    }

    #[test]
    fn shorten_expiry_publishes_new_deadline() {
        let dir = SessionDirectory::new();
        let s = open(&dir, subscriber(1, "alice"), 3600);
        let mut events = dir.events();
        dir.shorten_expiry(s.id, t0() + secs(600), t0() + secs(1))
            .unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::ExpiryShortened {
                id: s.id,
                expires_at: t0() + secs(600),
            }
        );
    }

    #[test]
    fn summary_counts_statuses_at_now() {
        let dir = SessionDirectory::new();
        let a = open(&dir, subscriber(1, "alice"), 60);
        let b = open(&dir, subscriber(2, "bob"), 3600);
        dir.apply_usage(&tick(b.id, 900, 5)).unwrap();
        let c = open(
            &dir,
            SessionOwner::Voucher {
                code: VoucherCode::parse("DEMO1234").unwrap(),
            },
            3600,
        );
        dir.terminate(c.id, "abuse", t0() + secs(10)).unwrap();

        let summary = dir.summary(t0() + secs(60));
        assert_eq!(summary.total, 3);
        assert_eq!(summary.alive, 1);
        assert_eq!(summary.by_status.get(&SessionStatus::Expired), Some(&1));
        assert_eq!(summary.by_status.get(&SessionStatus::Critical), Some(&1));
        assert_eq!(summary.by_status.get(&SessionStatus::Terminated), Some(&1));
        assert_eq!(summary.data_used_bytes, 900);
        // Summaries never latch state.
        assert!(dir.get(a.id).unwrap().is_alive());
    }

    #[test]
    fn sessions_for_owner() {
        let dir = SessionDirectory::new();
        open(&dir, subscriber(1, "alice"), 60);
        open(&dir, subscriber(2, "bob"), 60);
        open(&dir, subscriber(1, "alice"), 60);
        let mine = dir.sessions_for(&subscriber(1, "alice"));
        assert_eq!(mine.len(), 2);
    }
}
