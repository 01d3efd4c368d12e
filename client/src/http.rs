use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, multipart};
use tracing::debug;

use certwatch_common::params::{CreateCertificateParams, ImportRow};
use certwatch_common::views::{ApiErrorResponse, CertificateRecord, ImportSummary};

use crate::{CertificateApi, GatewayError, canonical_url};

/// Reqwest client for the certificate service's REST API.
pub struct ApiClient {
    api_url: String,
    client: Client,
}

impl ApiClient {
    pub fn new(api_url: impl Into<String>) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent(format!("certwatch-console/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(ApiClient { api_url: api_url.into(), client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Map a non-success response onto the error taxonomy, carrying the
    /// service's error envelope message through verbatim.
    async fn check(response: Response) -> Result<Response, GatewayError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ApiErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unexpected response")
                .to_string(),
        };

        Err(match status {
            StatusCode::BAD_REQUEST => GatewayError::Validation(message),
            StatusCode::NOT_FOUND => GatewayError::NotFound(message),
            StatusCode::CONFLICT => GatewayError::Conflict(message),
            _ => GatewayError::Transport(format!("{status}: {message}")),
        })
    }
}

#[async_trait]
impl CertificateApi for ApiClient {
    async fn fetch_all(&self) -> Result<Vec<CertificateRecord>, GatewayError> {
        let url = self.endpoint("/certificates");
        debug!(%url, "fetching certificate collection");

        let response = self.client.get(&url).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn add(
        &self,
        protocol: &str,
        domain: &str,
        port: Option<u16>,
    ) -> Result<CertificateRecord, GatewayError> {
        let target = canonical_url(protocol, domain, port)?;
        debug!(%target, "adding endpoint");

        let response = self
            .client
            .post(self.endpoint("/certificates"))
            .json(&CreateCertificateParams { url: target })
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, id: u64) -> Result<(), GatewayError> {
        debug!(id, "deleting certificate");

        let response = self
            .client
            .delete(self.endpoint(&format!("/certificates/{id}")))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn refresh(&self, id: u64) -> Result<(), GatewayError> {
        debug!(id, "requesting re-check");

        // 202: the check is queued, not performed; there is nothing useful
        // in the body.
        let response = self
            .client
            .post(self.endpoint(&format!("/certificates/{id}/refresh")))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn import_bulk(&self, rows: &[ImportRow]) -> Result<ImportSummary, GatewayError> {
        if rows.is_empty() {
            return Err(GatewayError::Validation("no rows to import".into()));
        }
        if let Some(row) = rows.iter().find(|row| row.domain.trim().is_empty()) {
            return Err(GatewayError::Validation(format!(
                "import row with empty domain (protocol {:?})",
                row.protocol
            )));
        }

        debug!(rows = rows.len(), "importing endpoints");

        let part = multipart::Part::text(rows_to_csv(rows))
            .file_name("import.csv")
            .mime_str("text/csv")?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.endpoint("/certificates/import"))
            .multipart(form)
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }
}

/// Render import rows as the `protocol,domain,port` CSV the service expects.
fn rows_to_csv(rows: &[ImportRow]) -> String {
    let mut out = String::from("protocol,domain,port\n");
    for row in rows {
        out.push_str(row.protocol.as_deref().unwrap_or("https"));
        out.push(',');
        out.push_str(&row.domain);
        out.push(',');
        if let Some(port) = row.port {
            out.push_str(&port.to_string());
        }
        out.push('\n');
    }
    out
}
