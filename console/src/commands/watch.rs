//! The live dashboard session.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use certwatch_client::ApiClient;

use crate::config::ConsoleConfig;
use crate::dashboard::{Dashboard, DashboardOptions};
use crate::output;

pub async fn watch(config: ConsoleConfig) -> Result<()> {
    let api = Arc::new(ApiClient::new(&config.api_url)?);
    let options = DashboardOptions {
        poll_interval: Duration::from_secs(config.poll_interval_secs),
        refresh_refetch_delay: Duration::from_secs(config.refresh_refetch_delay_secs),
    };

    let cancel = CancellationToken::new();
    let handle = Dashboard::spawn(api, options, cancel.clone());
    let mut views = handle.views();

    info!(api_url = %config.api_url, "dashboard session started");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                break;
            }
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                output::render(&view);
            }
        }
    }

    info!("dashboard session ended");
    Ok(())
}
