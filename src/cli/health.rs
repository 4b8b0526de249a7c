use anyhow::Result;
use tracing::warn;

use crate::database_ops::connector::{HealthReport, StoreConnector};
use crate::database_ops::safety::describe_target;
use crate::util::env as env_util;

#[derive(Debug, Clone, Default)]
pub struct HealthConfig {
    pub json: bool,
}

/// Connects to both stores and reports their status. Connection failures are
/// part of the report, not errors.
pub async fn run(cfg: HealthConfig) -> Result<HealthReport> {
    env_util::preflight_check("store-health", &[], super::STORE_ENV_KEYS)?;

    let mut connector = StoreConnector::from_env();
    if let Some(url) = connector.config().relational_url.as_deref() {
        println!(
            "relational target: {}",
            describe_target(url, connector.config().branch.as_deref())
        );
    }
    if let Err(err) = connector.connect_document_store().await {
        warn!(error = %err, "document store unavailable");
    }
    if let Err(err) = connector.connect_relational_store().await {
        warn!(error = %err, "relational store unavailable");
    }
    let report = connector.health_check().await;
    connector.disconnect().await;

    if cfg.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let mark = |ok: bool| if ok { "ok  " } else { "FAIL" };
        println!("[{}] document   {}", mark(report.document.ok), report.document.detail);
        println!("[{}] relational {}", mark(report.relational.ok), report.relational.detail);
    }
    Ok(report)
}
