//! Shortcut for `catalog-variants consolidate`, configured from the environment.
//!
//! CONSOLIDATE_LIMIT, CONSOLIDATE_MAX_GROUP_SIZE and CONSOLIDATE_DRY_RUN mirror
//! the subcommand's flags.

use anyhow::Result;

use catalog_variants::cli::consolidate::{run, ConsolidateConfig};
use catalog_variants::logging::init_tracing;
use catalog_variants::util::env::{bootstrap_cli, env_flag, env_opt};

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap_cli("consolidate_variations");
    init_tracing("info")?;

    let cfg = ConsolidateConfig {
        limit: env_opt("CONSOLIDATE_LIMIT").and_then(|v| v.trim().parse().ok()),
        max_group_size: env_opt("CONSOLIDATE_MAX_GROUP_SIZE").and_then(|v| v.trim().parse().ok()),
        dry_run: env_flag("CONSOLIDATE_DRY_RUN", false),
        ..ConsolidateConfig::default()
    };
    run(cfg).await?;
    Ok(())
}
