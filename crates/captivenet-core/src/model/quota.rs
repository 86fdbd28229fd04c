// ── Quota ledger ──
//
// Used-vs-total accounting for one dimension (bytes for data, seconds
// for time) and the threshold classification shared by every view.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::CoreError;

/// Which allowance a quota tracks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Dimension {
    /// Transferred bytes.
    Data,
    /// Connected seconds.
    Time,
}

/// Severity of a single quota, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotaStatus {
    Normal,
    Warning,
    Critical,
    Exceeded,
}

/// Percentage thresholds for [`QuotaStatus`] classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub warning: f64,
    pub critical: f64,
    pub exceeded: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: 80.0,
            critical: 90.0,
            exceeded: 100.0,
        }
    }
}

impl Thresholds {
    /// Thresholds must be positive and non-decreasing, and `exceeded` must
    /// sit at 100 where a quota is exhausted.
    pub fn validate(&self) -> Result<(), CoreError> {
        let ordered = self.warning > 0.0
            && self.warning <= self.critical
            && self.critical <= self.exceeded
            && (self.exceeded - 100.0).abs() < f64::EPSILON;
        if ordered {
            Ok(())
        } else {
            Err(CoreError::Config {
                message: format!(
                    "thresholds must satisfy 0 < warning <= critical <= exceeded = 100, got {}/{}/{}",
                    self.warning, self.critical, self.exceeded
                ),
            })
        }
    }

    /// Classify a percentage. Boundaries resolve to the higher severity.
    pub fn classify(&self, percent: f64) -> QuotaStatus {
        if percent >= self.exceeded {
            QuotaStatus::Exceeded
        } else if percent >= self.critical {
            QuotaStatus::Critical
        } else if percent >= self.warning {
            QuotaStatus::Warning
        } else {
            QuotaStatus::Normal
        }
    }
}

/// One dimension of a session's allowance.
///
/// `used` only grows through [`record`](Self::record); `total` only grows
/// through [`extend`](Self::extend).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
    used: u64,
    total: u64,
}

impl Quota {
    pub fn new(total: u64) -> Self {
        Self { used: 0, total }
    }

    /// Rebuild a ledger from stored figures (fixtures, gateway snapshots).
    pub fn with_usage(used: u64, total: u64) -> Self {
        Self { used, total }
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.used)
    }

    /// Add consumption. Negative amounts are rejected and leave the ledger untouched.
    pub fn record(&mut self, amount: i64) -> Result<(), CoreError> {
        let amount = u64::try_from(amount).map_err(|_| CoreError::InvalidAmount {
            amount,
            reason: "usage must not be negative",
        })?;
        self.used = self.used.saturating_add(amount);
        Ok(())
    }

    /// Raise the cap. `used` is never touched.
    pub fn extend(&mut self, amount: i64) -> Result<(), CoreError> {
        let amount = u64::try_from(amount)
            .ok()
            .filter(|a| *a > 0)
            .ok_or(CoreError::InvalidAmount {
                amount,
                reason: "extension must be positive",
            })?;
        self.total = self.total.saturating_add(amount);
        Ok(())
    }

    /// `used / total * 100`. A zero-total quota counts as exhausted (100).
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        // Multiply first so exact ratios (e.g. 90%) stay exact.
        (self.used as f64 * 100.0) / self.total as f64
    }

    pub fn status(&self, thresholds: &Thresholds) -> QuotaStatus {
        thresholds.classify(self.percent())
    }

    /// Fully consumed: `percent() >= 100`, whatever the display thresholds say.
    pub fn is_exhausted(&self) -> bool {
        self.percent() >= 100.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const FIVE_GB: u64 = 5_368_709_120;

    #[test]
    fn ninety_percent_of_five_gigabytes_is_critical() {
        let mut q = Quota::new(FIVE_GB);
        q.record(4_831_838_208).unwrap();
        assert!((q.percent() - 90.0).abs() < f64::EPSILON);
        assert_eq!(q.status(&Thresholds::default()), QuotaStatus::Critical);
    }

    #[test]
    fn zero_total_is_exhausted() {
        let q = Quota::new(0);
        assert!((q.percent() - 100.0).abs() < f64::EPSILON);
        assert!(q.is_exhausted());
    }

    #[test]
    fn negative_record_is_rejected_without_change() {
        let mut q = Quota::with_usage(10, 100);
        let err = q.record(-1).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAmount { amount: -1, .. }));
        assert_eq!(q.used(), 10);
    }

    #[test]
    fn zero_record_is_accepted() {
        let mut q = Quota::new(100);
        q.record(0).unwrap();
        assert_eq!(q.used(), 0);
    }

    #[test]
    fn extend_requires_positive_amount() {
        let mut q = Quota::new(100);
        assert!(q.extend(0).is_err());
        assert!(q.extend(-5).is_err());
        q.extend(50).unwrap();
        assert_eq!(q.total(), 150);
    }

    #[test]
    fn extend_keeps_used_and_can_lower_percent() {
        let mut q = Quota::with_usage(90, 100);
        q.extend(100).unwrap();
        assert_eq!(q.used(), 90);
        assert!((q.percent() - 45.0).abs() < f64::EPSILON);
    }

    #[test]
    fn boundaries_resolve_upward() {
        let t = Thresholds::default();
        assert_eq!(Quota::with_usage(79, 100).status(&t), QuotaStatus::Normal);
        assert_eq!(Quota::with_usage(80, 100).status(&t), QuotaStatus::Warning);
        assert_eq!(Quota::with_usage(90, 100).status(&t), QuotaStatus::Critical);
        assert_eq!(Quota::with_usage(100, 100).status(&t), QuotaStatus::Exceeded);
        assert_eq!(Quota::with_usage(150, 100).status(&t), QuotaStatus::Exceeded);
    }

    #[test]
    fn percent_and_status_never_decrease_under_record() {
        let t = Thresholds::default();
        let mut q = Quota::new(1_000);
        let mut last_percent = q.percent();
        let mut last_status = q.status(&t);
        for step in [0, 1, 7, 150, 300, 333, 9, 200, 500] {
            q.record(step).unwrap();
            assert!(q.percent() >= last_percent);
            assert!(q.status(&t) >= last_status);
            last_percent = q.percent();
            last_status = q.status(&t);
        }
        assert_eq!(last_status, QuotaStatus::Exceeded);
    }

    #[test]
    fn thresholds_validate_ordering() {
        assert!(Thresholds::default().validate().is_ok());
        let bad = Thresholds {
            warning: 95.0,
            critical: 90.0,
            exceeded: 100.0,
        };
        assert!(bad.validate().is_err());
        for exceeded in [95.0, 120.0] {
            let off = Thresholds {
                exceeded,
                ..Thresholds::default()
            };
            assert!(off.validate().is_err(), "exceeded = {exceeded} accepted");
        }
    }

    #[test]
    fn exhaustion_is_full_consumption() {
        assert!(!Quota::with_usage(999, 1_000).is_exhausted());
        assert!(Quota::with_usage(1_000, 1_000).is_exhausted());
        assert!(Quota::with_usage(1_200, 1_000).is_exhausted());
    }

    #[test]
    fn dimension_parses_case_insensitively() {
        assert_eq!("DATA".parse::<Dimension>().unwrap(), Dimension::Data);
        assert_eq!(Dimension::Time.to_string(), "time");
    }
}
