use anyhow::{Context, Result};

use crate::database_ops::connector::StoreConnector;
use crate::database_ops::pg_catalog::PgCatalog;
use crate::util::env as env_util;
use crate::variations::canonical_colors::{BackfillReport, CanonicalColorBackfill};
use crate::variations::materializer::DEFAULT_COLOR_OPTION;

#[derive(Debug, Clone, Default)]
pub struct CanonicalColorsConfig {
    pub dry_run: bool,
    pub json: bool,
}

pub async fn run(cfg: CanonicalColorsConfig) -> Result<BackfillReport> {
    env_util::preflight_check("canonical-colors", &[], super::STORE_ENV_KEYS)?;

    let mut connector = StoreConnector::from_env();
    let outcome = backfill(&mut connector, cfg.dry_run).await;
    connector.disconnect().await;
    let report = outcome?;

    if cfg.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(report)
}

async fn backfill(connector: &mut StoreConnector, dry_run: bool) -> Result<BackfillReport> {
    connector
        .connect_relational_store()
        .await
        .context("connecting to relational store")?;
    let catalog = PgCatalog::new(connector);
    let option_name =
        env_util::env_opt("COLOR_OPTION_NAME").unwrap_or_else(|| DEFAULT_COLOR_OPTION.to_string());
    CanonicalColorBackfill::new(&catalog, option_name)
        .dry_run(dry_run)
        .run()
        .await
}
