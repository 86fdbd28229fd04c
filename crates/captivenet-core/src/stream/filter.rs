// ── Filter predicates for session listings ──

use chrono::{DateTime, Utc};

use crate::model::{Session, SessionKind, SessionStatus};

/// Operator search over the session directory.
///
/// `text` matches case-insensitively against the owner label, device
/// name, MAC and IP. `status` compares against the status at the time of
/// the query, so a session past its deadline lists as expired before the
/// next sweep latches it. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub text: Option<String>,
    pub status: Option<SessionStatus>,
    pub kind: Option<SessionKind>,
}

impl SessionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn status(mut self, status: SessionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn kind(mut self, kind: SessionKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn matches(&self, session: &Session, now: DateTime<Utc>) -> bool {
        if self.status.is_some_and(|s| s != session.status_at(now)) {
            return false;
        }
        if self.kind.is_some_and(|k| k != session.kind()) {
            return false;
        }
        match self.text.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                let label = session.owner.label();
                let ip = session.device.ip.map(|ip| ip.to_string()).unwrap_or_default();
                [
                    label.as_str(),
                    session.device.name.as_str(),
                    session.device.mac.as_str(),
                    ip.as_str(),
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{
        AccountId, DeviceRef, MacAddress, SessionId, SessionOwner, Thresholds, VoucherCode,
    };
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    fn session(owner: SessionOwner, device: &str, ip: &str) -> Session {
        Session::open(
            SessionId(7),
            owner,
            DeviceRef {
                name: device.into(),
                mac: MacAddress::new("AA:BB:CC:00:11:22"),
                ip: Some(ip.parse().unwrap()),
            },
            1_000,
            3_600,
            t0(),
            Thresholds::default(),
        )
    }

    #[test]
    fn text_matches_each_field_case_insensitively() {
        let s = session(
            SessionOwner::Account {
                id: AccountId(3),
                username: "JDoe".into(),
            },
            "Laptop-Work",
            "192.168.1.45",
        );
        assert!(SessionFilter::all().text("jdoe").matches(&s, t0()));
        assert!(SessionFilter::all().text("laptop").matches(&s, t0()));
        assert!(SessionFilter::all().text("aa:bb:cc").matches(&s, t0()));
        assert!(SessionFilter::all().text("1.45").matches(&s, t0()));
        assert!(!SessionFilter::all().text("android").matches(&s, t0()));
        assert!(SessionFilter::all().text("   ").matches(&s, t0()));
    }

    #[test]
    fn status_and_kind_narrow_results() {
        let s = session(
            SessionOwner::Voucher {
                code: VoucherCode::parse("DEMO1234").unwrap(),
            },
            "Phone",
            "10.0.0.2",
        );
        assert!(SessionFilter::all().status(SessionStatus::Active).matches(&s, t0()));
        assert!(!SessionFilter::all().status(SessionStatus::Expired).matches(&s, t0()));
        assert!(SessionFilter::all().kind(SessionKind::Voucher).matches(&s, t0()));
        assert!(SessionFilter::all().text("guest:demo").matches(&s, t0()));
    }

    #[test]
    fn status_is_judged_at_query_time() {
        let s = session(
            SessionOwner::Voucher {
                code: VoucherCode::parse("DEMO1234").unwrap(),
            },
            "Phone",
            "10.0.0.2",
        );
        let late = t0() + TimeDelta::hours(2);
        assert_eq!(s.status(), SessionStatus::Active);
        assert!(!SessionFilter::all().status(SessionStatus::Active).matches(&s, late));
        assert!(SessionFilter::all().status(SessionStatus::Expired).matches(&s, late));
    }
}
