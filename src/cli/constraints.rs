use anyhow::{Context, Result};

use crate::database_ops::connector::StoreConnector;
use crate::database_ops::schema::{ensure_unique_constraints, ConstraintOutcome, ConstraintStatus};
use crate::util::env as env_util;

#[derive(Debug, Clone, Default)]
pub struct ConstraintsConfig {
    pub json: bool,
}

pub async fn run(cfg: ConstraintsConfig) -> Result<Vec<ConstraintOutcome>> {
    env_util::preflight_check("ensure-constraints", &[], super::STORE_ENV_KEYS)?;

    let mut connector = StoreConnector::from_env();
    if let Err(err) = connector.connect_relational_store().await {
        connector.disconnect().await;
        return Err(err).context("connecting to relational store");
    }
    let outcomes = ensure_unique_constraints(&connector).await;
    connector.disconnect().await;

    if cfg.json {
        println!("{}", serde_json::to_string_pretty(&outcomes)?);
    } else {
        for outcome in &outcomes {
            let status = match &outcome.status {
                ConstraintStatus::AlreadyPresent => "present".to_string(),
                ConstraintStatus::Installed => "installed".to_string(),
                ConstraintStatus::Failed(detail) => format!("FAILED: {detail}"),
            };
            println!("{:<30} {:<24} {status}", outcome.name, outcome.table);
        }
    }
    Ok(outcomes)
}
