//! One-shot certificate operations against the service.

use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;

use certwatch_client::{ApiClient, CertificateApi};
use certwatch_common::filter::FilterState;
use certwatch_common::params::ImportRow;
use certwatch_common::stats::CertificateStats;

use crate::config::ConsoleConfig;
use crate::output;

#[derive(clap::Args)]
pub struct ListArgs {
    /// Substring match on the endpoint URL (case-insensitive)
    #[arg(long)]
    pub url: Option<String>,

    /// Substring match on the subject common name
    #[arg(long)]
    pub common_name: Option<String>,

    #[arg(long)]
    pub issuer: Option<String>,

    #[arg(long)]
    pub serial_number: Option<String>,

    /// all, valid, expired, error or pending
    #[arg(long, default_value = "all")]
    pub status: String,

    /// all, valid, expiring30 or expired
    #[arg(long, default_value = "all")]
    pub expiry: String,
}

impl ListArgs {
    fn filter(&self) -> Result<FilterState> {
        Ok(FilterState {
            url: self.url.clone(),
            common_name: self.common_name.clone(),
            issuer: self.issuer.clone(),
            serial_number: self.serial_number.clone(),
            status: self
                .status
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid status filter: {}", self.status))?,
            expiry: self
                .expiry
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid expiry filter: {}", self.expiry))?,
        })
    }
}

pub async fn list(config: &ConsoleConfig, args: ListArgs) -> Result<()> {
    let filter = args.filter()?;
    let api = ApiClient::new(&config.api_url)?;
    let records = api.fetch_all().await.context("Failed to fetch certificates")?;

    let now = Utc::now();
    output::render_stats(&CertificateStats::compute(&records, now));
    output::render_table(&filter.apply(&records, now));
    Ok(())
}

pub async fn add(
    config: &ConsoleConfig,
    protocol: &str,
    domain: &str,
    port: Option<u16>,
) -> Result<()> {
    let api = ApiClient::new(&config.api_url)?;
    let record = api
        .add(protocol, domain, port)
        .await
        .context("Failed to add endpoint")?;
    println!("{} added for monitoring (id {})", record.url, record.id);
    Ok(())
}

pub async fn import(config: &ConsoleConfig, file: &Path) -> Result<()> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let rows = parse_rows(&content)?;

    let api = ApiClient::new(&config.api_url)?;
    let summary = api.import_bulk(&rows).await.context("Import failed")?;
    println!("{summary}");
    Ok(())
}

pub async fn delete(config: &ConsoleConfig, id: u64) -> Result<()> {
    let api = ApiClient::new(&config.api_url)?;
    api.delete(id).await.context("Failed to delete certificate")?;
    println!("certificate {id} deleted");
    Ok(())
}

pub async fn refresh(config: &ConsoleConfig, id: u64) -> Result<()> {
    let api = ApiClient::new(&config.api_url)?;
    api.refresh(id).await.context("Failed to trigger re-check")?;
    println!("re-check of certificate {id} scheduled; fetch again shortly for the result");
    Ok(())
}

/// Split a `protocol,domain,port` file into import rows. An optional header
/// line is tolerated; protocol and port columns may be empty.
fn parse_rows(content: &str) -> Result<Vec<ImportRow>> {
    let mut rows = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if index == 0 && line.eq_ignore_ascii_case("protocol,domain,port") {
            continue;
        }

        let mut fields = line.split(',').map(str::trim);
        let protocol = fields.next().filter(|f| !f.is_empty()).map(str::to_string);
        let Some(domain) = fields.next().filter(|f| !f.is_empty()) else {
            bail!("line {}: missing domain", index + 1);
        };
        let port = match fields.next().filter(|f| !f.is_empty()) {
            Some(port) => Some(
                port.parse()
                    .with_context(|| format!("line {}: invalid port {port:?}", index + 1))?,
            ),
            None => None,
        };

        rows.push(ImportRow { protocol, domain: domain.to_string(), port });
    }
    Ok(rows)
}
