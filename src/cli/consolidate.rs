use anyhow::{Context, Result};
use tracing::info;

use crate::database_ops::connector::StoreConnector;
use crate::database_ops::mongo_source::MongoCatalogSource;
use crate::database_ops::pg_catalog::PgCatalog;
use crate::util::env as env_util;
use crate::variations::materializer::DEFAULT_COLOR_OPTION;
use crate::variations::runner::{ConsolidationRunner, RunOptions, RunStats};

#[derive(Debug, Clone, Default)]
pub struct ConsolidateConfig {
    /// Stop after this many variation groups.
    pub limit: Option<usize>,
    /// Skip groups with more members than this.
    pub max_group_size: Option<usize>,
    pub dry_run: bool,
    /// Groups per progress batch (defaults to 10).
    pub batch_size: Option<usize>,
    /// Overrides MONGODB_COLLECTION.
    pub collection: Option<String>,
    /// Print the statistics as JSON instead of the text report.
    pub json: bool,
}

impl ConsolidateConfig {
    fn run_options(&self) -> RunOptions {
        let defaults = RunOptions::default();
        RunOptions {
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            limit: self.limit,
            max_group_size: self.max_group_size,
            dry_run: self.dry_run,
            option_name: env_util::env_opt("COLOR_OPTION_NAME")
                .unwrap_or_else(|| DEFAULT_COLOR_OPTION.to_string()),
        }
    }
}

pub async fn run(cfg: ConsolidateConfig) -> Result<RunStats> {
    env_util::preflight_check("consolidate-variations", &["MONGODB_URI"], super::STORE_ENV_KEYS)?;

    let mut connector = StoreConnector::from_env();
    let outcome = consolidate(&mut connector, &cfg).await;
    connector.disconnect().await;
    let stats = outcome?;

    if cfg.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{stats}");
    }
    Ok(stats)
}

async fn consolidate(connector: &mut StoreConnector, cfg: &ConsolidateConfig) -> Result<RunStats> {
    connector
        .connect_document_store()
        .await
        .context("connecting to document store")?;
    connector
        .connect_relational_store()
        .await
        .context("connecting to relational store")?;
    let connector = &*connector;

    let documents = match &cfg.collection {
        Some(collection) => MongoCatalogSource::new(connector, collection.clone()),
        None => MongoCatalogSource::from_env(connector),
    };
    let catalog = PgCatalog::new(connector);
    let options = cfg.run_options();
    info!(
        limit = ?options.limit,
        max_group_size = ?options.max_group_size,
        dry_run = options.dry_run,
        option = %options.option_name,
        "consolidating variations"
    );
    ConsolidationRunner::new(&documents, &catalog, options).run().await
}
