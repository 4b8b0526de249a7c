use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use catalog_variants::cli;
use catalog_variants::logging::init_tracing;
use catalog_variants::util::env;

#[derive(Parser, Debug)]
#[command(name = "catalog-variants", version, about = "Catalog variation consolidation admin CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct Output {
    /// Print the result as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Group legacy products by parent id and write them as variants of one canonical product
    Consolidate {
        /// Process at most this many variation groups
        #[arg(long)]
        limit: Option<usize>,
        /// Skip groups with more members than this
        #[arg(long)]
        max_group_size: Option<usize>,
        /// Groups per progress batch
        #[arg(long)]
        batch_size: Option<usize>,
        /// Source collection (defaults to MONGODB_COLLECTION)
        #[arg(long)]
        collection: Option<String>,
        /// Resolve groups and log the plan without writing
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[command(flatten)]
        output: Output,
    },
    /// Connect to both stores and report their status
    Health {
        #[command(flatten)]
        output: Output,
    },
    /// Install the unique constraints the idempotent writes depend on
    EnsureConstraints {
        #[command(flatten)]
        output: Output,
    },
    /// Link a name-derived color to canonical products that have none
    CanonicalColors {
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        #[command(flatten)]
        output: Output,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env::bootstrap_cli("catalog-variants");
    init_tracing("info")?;

    match Cli::parse().command {
        Commands::Consolidate {
            limit,
            max_group_size,
            batch_size,
            collection,
            dry_run,
            output,
        } => {
            use cli::consolidate::{run, ConsolidateConfig};
            let stats = run(ConsolidateConfig {
                limit,
                max_group_size,
                dry_run,
                batch_size,
                collection,
                json: output.json,
            })
            .await?;
            info!(errors = stats.errors, "consolidate: completed");
        }
        Commands::Health { output } => {
            use cli::health::{run, HealthConfig};
            let report = run(HealthConfig { json: output.json }).await?;
            if !report.all_ok() {
                bail!("one or more stores are unhealthy");
            }
        }
        Commands::EnsureConstraints { output } => {
            use cli::constraints::{run, ConstraintsConfig};
            let outcomes = run(ConstraintsConfig { json: output.json }).await?;
            info!(constraints = outcomes.len(), "ensure-constraints: completed");
        }
        Commands::CanonicalColors { dry_run, output } => {
            use cli::canonical_colors::{run, CanonicalColorsConfig};
            let report = run(CanonicalColorsConfig {
                dry_run,
                json: output.json,
            })
            .await?;
            info!(
                colored = report.colored,
                undetected = report.undetected.len(),
                "canonical-colors: completed"
            );
        }
    }
    Ok(())
}
