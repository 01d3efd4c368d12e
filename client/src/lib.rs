//! HTTP gateway to the remote certificate-checking service.
//!
//! This crate is the only place network calls to the service happen. The
//! [`CertificateApi`] trait is the seam the console's controller is written
//! against; [`ApiClient`] is the reqwest implementation.

use async_trait::async_trait;
use thiserror::Error;

use certwatch_common::params::ImportRow;
use certwatch_common::views::{CertificateRecord, ImportSummary};

mod http;
pub use http::ApiClient;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Input rejected before any request was sent, or a service 400.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The service rejected a duplicate resource (409).
    #[error("already monitored: {0}")]
    Conflict(String),

    /// The id is unknown to the service (404), typically a stale view.
    #[error("not found: {0}")]
    NotFound(String),

    /// Network failures, timeouts, undecodable bodies and 5xx responses.
    /// Never retried at this layer; the caller decides what to do.
    #[error("service unavailable: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

/// The five operations the console needs from the certificate service.
#[async_trait]
pub trait CertificateApi: Send + Sync + 'static {
    /// Fetch the full collection of monitored certificates.
    async fn fetch_all(&self) -> Result<Vec<CertificateRecord>, GatewayError>;

    /// Start monitoring an endpoint. The service creates the record in
    /// `pending` status and schedules the first check itself.
    async fn add(
        &self,
        protocol: &str,
        domain: &str,
        port: Option<u16>,
    ) -> Result<CertificateRecord, GatewayError>;

    /// Stop monitoring an endpoint.
    async fn delete(&self, id: u64) -> Result<(), GatewayError>;

    /// Ask the service to re-check a certificate. The check runs
    /// asynchronously on the service side with no completion callback, so
    /// callers re-fetch after a delay to see the result.
    async fn refresh(&self, id: u64) -> Result<(), GatewayError>;

    /// Submit a batch of endpoints. Partial success is normal; the returned
    /// summary is the service's own accounting, surfaced verbatim.
    async fn import_bulk(&self, rows: &[ImportRow]) -> Result<ImportSummary, GatewayError>;
}

/// Compose the canonical URL for an endpoint. The port is appended only when
/// it is neither 443 nor 80, matching what the service stores.
pub fn canonical_url(
    protocol: &str,
    domain: &str,
    port: Option<u16>,
) -> Result<String, GatewayError> {
    let domain = domain.trim();
    if domain.is_empty() {
        return Err(GatewayError::Validation("domain must not be empty".into()));
    }
    Ok(match port {
        Some(port) if port != 443 && port != 80 => format!("{protocol}://{domain}:{port}"),
        _ => format!("{protocol}://{domain}"),
    })
}
