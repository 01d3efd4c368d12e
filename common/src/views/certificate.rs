use chrono::{DateTime, Utc};
use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};

/// A monitored endpoint together with its most recent check result, as
/// returned by the certificate service. The service is the source of truth;
/// the console holds a read-mostly cached copy replaced wholesale on every
/// fetch.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CertificateRecord {
    /// Service-assigned identifier, stable across re-checks.
    pub id: u64,

    /// The monitored endpoint: scheme and host, with a port only when it is
    /// not the scheme default.
    pub url: String,

    /// Subject common name of the presented certificate. Absent when the
    /// last check failed.
    pub subject: Option<String>,

    /// Issuer common name. Absent when the last check failed.
    pub issuer: Option<String>,

    pub serial_number: Option<String>,

    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub last_checked: Option<DateTime<Utc>>,

    /// Remaining validity as computed by the service at check time. The
    /// console derives its own remaining-days from `valid_until` and keeps
    /// this field for display passthrough only.
    pub days_remaining: Option<i64>,

    pub status: CertificateStatus,
}

/// Check status as reported by the service. The console never recomputes
/// this, only the remaining-days/urgency derived from `valid_until`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display, FromStr,
)]
#[serde(rename_all = "lowercase")]
#[display(style = "lowercase")]
pub enum CertificateStatus {
    /// The endpoint presented a certificate that verified and has not
    /// expired.
    Valid,

    Expired,

    /// The last check failed: unreachable host, handshake failure, and so
    /// on.
    Error,

    /// Created but not yet checked.
    Pending,
}
