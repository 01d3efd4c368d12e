//! Output views returned by the certificate service.

use std::fmt;

use serde::{Deserialize, Serialize};

mod certificate;
pub use certificate::*;

/// An error response from the certificate service. Every endpoint uses the
/// same envelope; the message is shown to the operator verbatim.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiErrorResponse {
    /// A human-readable message describing the error that occurred.
    pub error: String,
}

/// Outcome of a bulk import. The service commits rows independently, so a
/// single request can add some rows, skip duplicates and reject others. The
/// per-row error strings are service-authored and passed through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ImportSummary {
    pub added: u64,
    pub skipped: u64,

    #[serde(default)]
    pub errors: Vec<String>,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} added, {} skipped", self.added, self.skipped)?;
        if !self.errors.is_empty() {
            write!(f, ", {} failed: {}", self.errors.len(), self.errors.join("; "))?;
        }
        Ok(())
    }
}
