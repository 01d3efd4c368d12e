//! Multi-field filtering of the certificate collection.

use chrono::{DateTime, Utc};
use parse_display::{Display, FromStr};

use crate::expiry::{ExpiryTier, classify};
use crate::views::{CertificateRecord, CertificateStatus};

/// The operator's current filter selection. All predicates AND-compose; an
/// absent or empty text predicate always passes. Session-scoped, never
/// persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    /// Case-insensitive substring match on the endpoint URL.
    pub url: Option<String>,

    /// Case-insensitive substring match on the subject common name.
    pub common_name: Option<String>,

    pub issuer: Option<String>,

    pub serial_number: Option<String>,

    pub status: StatusFilter,

    pub expiry: ExpiryFilter,
}

/// Exact-match selector on the service-reported status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, FromStr)]
#[display(style = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Valid,
    Expired,
    Error,
    Pending,
}

impl StatusFilter {
    fn matches(self, status: CertificateStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Valid => status == CertificateStatus::Valid,
            StatusFilter::Expired => status == CertificateStatus::Expired,
            StatusFilter::Error => status == CertificateStatus::Error,
            StatusFilter::Pending => status == CertificateStatus::Pending,
        }
    }
}

/// Selector on derived remaining validity. `Expiring30` keeps records whose
/// tier is expiring or critical, i.e. valid certificates inside the 30-day
/// window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, FromStr)]
#[display(style = "lowercase")]
pub enum ExpiryFilter {
    #[default]
    All,
    Valid,
    Expiring30,
    Expired,
}

impl FilterState {
    /// Whether a single record passes every predicate. A null field never
    /// matches a non-empty text predicate.
    pub fn matches(&self, record: &CertificateRecord, reference: DateTime<Utc>) -> bool {
        if !text_matches(&self.url, Some(&record.url)) {
            return false;
        }
        if !text_matches(&self.common_name, record.subject.as_deref()) {
            return false;
        }
        if !text_matches(&self.issuer, record.issuer.as_deref()) {
            return false;
        }
        if !text_matches(&self.serial_number, record.serial_number.as_deref()) {
            return false;
        }
        if !self.status.matches(record.status) {
            return false;
        }
        match self.expiry {
            ExpiryFilter::All => true,
            ExpiryFilter::Valid => record.status == CertificateStatus::Valid,
            ExpiryFilter::Expired => record.status == CertificateStatus::Expired,
            ExpiryFilter::Expiring30 => matches!(
                classify(record, reference).tier,
                ExpiryTier::Expiring | ExpiryTier::Critical
            ),
        }
    }

    /// Filter a collection, preserving the input order.
    pub fn apply(
        &self,
        records: &[CertificateRecord],
        reference: DateTime<Utc>,
    ) -> Vec<CertificateRecord> {
        records
            .iter()
            .filter(|record| self.matches(record, reference))
            .cloned()
            .collect()
    }
}

fn text_matches(predicate: &Option<String>, value: Option<&str>) -> bool {
    match predicate.as_deref() {
        None | Some("") => true,
        Some(needle) => {
            value.is_some_and(|v| v.to_lowercase().contains(&needle.to_lowercase()))
        }
    }
}
