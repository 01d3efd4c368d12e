//! Plain-text rendering of the dashboard view.

use chrono::{DateTime, Utc};

use certwatch_common::expiry::classify_now;
use certwatch_common::stats::CertificateStats;
use certwatch_common::views::CertificateRecord;

use crate::dashboard::DashboardView;

pub fn render(view: &DashboardView) {
    if view.loading {
        println!("loading certificates...");
        return;
    }

    render_stats(&view.stats);
    render_table(&view.records);

    if view.mutating {
        println!("(operation in progress)");
    }
    if let Some(error) = &view.last_error {
        println!("error: {error}");
    }
    println!();
}

pub fn render_stats(stats: &CertificateStats) {
    println!(
        "total {}  valid {}  expiring {}  expired {}",
        stats.total, stats.valid, stats.expiring, stats.expired
    );
}

pub fn render_table(records: &[CertificateRecord]) {
    if records.is_empty() {
        println!("no certificates match the current filters");
        return;
    }

    println!(
        "{:>5}  {:<40} {:<26} {:<26} {:<22} {:>5}  {:<9} {}",
        "id", "url", "subject", "issuer", "valid until", "days", "tier", "status"
    );
    for record in records {
        let expiry = classify_now(record);
        println!(
            "{:>5}  {:<40} {:<26} {:<26} {:<22} {:>5}  {:<9} {}",
            record.id,
            record.url,
            field(record.subject.as_deref()),
            field(record.issuer.as_deref()),
            timestamp(record.valid_until),
            expiry
                .remaining_days
                .map_or_else(|| "N/A".to_string(), |days| days.to_string()),
            expiry.tier,
            record.status,
        );
    }
}

fn field(value: Option<&str>) -> &str {
    value.unwrap_or("N/A")
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(
        || "N/A".to_string(),
        |t| t.format("%Y-%m-%d %H:%M UTC").to_string(),
    )
}
