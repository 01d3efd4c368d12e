//! Remaining-validity classification for certificate records.

use chrono::{DateTime, Utc};
use parse_display::Display;

use crate::views::{CertificateRecord, CertificateStatus};

/// Records expiring within this many days count as "expiring soon".
pub const EXPIRING_SOON_DAYS: i64 = 30;

/// Records expiring within this many days are urgent.
pub const CRITICAL_DAYS: i64 = 7;

const SECS_PER_DAY: i64 = 86_400;

/// Urgency of a certificate's remaining validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "lowercase")]
pub enum ExpiryTier {
    Valid,
    Expiring,
    Critical,
    Expired,
    Unknown,
}

/// Derived remaining validity. `remaining_days` is `None` exactly when the
/// record has no expiry to count down from (`valid_until` absent or status
/// not `valid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    pub remaining_days: Option<i64>,
    pub tier: ExpiryTier,
}

/// Classify a record's remaining validity against a reference instant.
///
/// Remaining days are whole days, ceiling-rounded, so a certificate expiring
/// in one hour still reads as 1 day. A negative count with `status = valid`
/// means the service has not yet reclassified an expired record; it is
/// surfaced as `Critical` rather than hidden.
pub fn classify(record: &CertificateRecord, reference: DateTime<Utc>) -> Expiry {
    if record.status != CertificateStatus::Valid {
        let tier = if record.status == CertificateStatus::Expired {
            ExpiryTier::Expired
        } else {
            ExpiryTier::Unknown
        };
        return Expiry { remaining_days: None, tier };
    }

    let Some(valid_until) = record.valid_until else {
        return Expiry { remaining_days: None, tier: ExpiryTier::Unknown };
    };

    let secs = (valid_until - reference).num_seconds();
    let mut days = secs.div_euclid(SECS_PER_DAY);
    if secs.rem_euclid(SECS_PER_DAY) > 0 {
        days += 1;
    }

    let tier = if days <= CRITICAL_DAYS {
        ExpiryTier::Critical
    } else if days <= EXPIRING_SOON_DAYS {
        ExpiryTier::Expiring
    } else {
        ExpiryTier::Valid
    };

    Expiry { remaining_days: Some(days), tier }
}

/// [`classify`] against the current time.
pub fn classify_now(record: &CertificateRecord) -> Expiry {
    classify(record, Utc::now())
}
