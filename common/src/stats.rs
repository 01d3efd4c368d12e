//! Aggregate counts over the certificate collection.

use chrono::{DateTime, Utc};

use crate::expiry::{EXPIRING_SOON_DAYS, classify};
use crate::views::{CertificateRecord, CertificateStatus};

/// Counts shown in the dashboard header. `expiring` counts valid records
/// with 30 days or fewer remaining, so it overlaps `valid` rather than
/// partitioning the total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CertificateStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
    pub expiring: usize,
}

impl CertificateStats {
    pub fn compute(records: &[CertificateRecord], reference: DateTime<Utc>) -> Self {
        let mut stats = CertificateStats::default();
        for record in records {
            stats.total += 1;
            match record.status {
                CertificateStatus::Valid => stats.valid += 1,
                CertificateStatus::Expired => stats.expired += 1,
                CertificateStatus::Error | CertificateStatus::Pending => {}
            }
            if record.status == CertificateStatus::Valid
                && classify(record, reference)
                    .remaining_days
                    .is_some_and(|days| days <= EXPIRING_SOON_DAYS)
            {
                stats.expiring += 1;
            }
        }
        stats
    }
}
