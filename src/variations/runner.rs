use std::fmt;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::database_ops::repository::{DocumentRepository, GroupQuery, RelationalRepository};
use crate::normalization::color::ColorEncoding;
use crate::variations::grouper::{resolve_group, retain_variation_groups};
use crate::variations::materializer::{MaterializeOutcome, VariantMaterializer, DEFAULT_COLOR_OPTION};
use crate::variations::model::{GroupResolution, ResolvedGroup, SourceGroup};

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Groups per progress batch.
    pub batch_size: usize,
    pub limit: Option<usize>,
    pub max_group_size: Option<usize>,
    pub dry_run: bool,
    pub option_name: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            limit: None,
            max_group_size: None,
            dry_run: false,
            option_name: DEFAULT_COLOR_OPTION.to_string(),
        }
    }
}

impl RunOptions {
    pub fn group_query(&self) -> GroupQuery {
        GroupQuery {
            min_members: 2,
            max_members: self.max_group_size,
            limit: self.limit,
        }
    }
}

/// Counters for one consolidation run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub groups_analyzed: usize,
    pub groups_skipped: usize,
    pub canonical_products: usize,
    pub variants_created: usize,
    pub variants_updated: usize,
    pub variants_planned: usize,
    pub colors_planned: usize,
    pub options_created: usize,
    pub option_values_created: usize,
    pub color_links: usize,
    pub errors: usize,
}

impl RunStats {
    fn start(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            groups_analyzed: 0,
            groups_skipped: 0,
            canonical_products: 0,
            variants_created: 0,
            variants_updated: 0,
            variants_planned: 0,
            colors_planned: 0,
            options_created: 0,
            option_values_created: 0,
            color_links: 0,
            errors: 0,
        }
    }

    pub fn record_outcome(&mut self, outcome: &MaterializeOutcome) {
        if outcome.variant_created {
            self.variants_created += 1;
        } else {
            self.variants_updated += 1;
        }
        self.options_created += usize::from(outcome.color_link.option_created);
        self.option_values_created += usize::from(outcome.color_link.option_value_created);
        self.color_links += usize::from(outcome.color_link.linked);
    }

    /// Variants touched (or planned, in a dry run) per analyzed group.
    pub fn average_variants_per_group(&self) -> f64 {
        if self.groups_analyzed == 0 {
            return 0.0;
        }
        let touched = self.variants_created + self.variants_updated + self.variants_planned;
        touched as f64 / self.groups_analyzed as f64
    }

    pub fn elapsed_secs(&self) -> f64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = if self.dry_run {
            "Variation consolidation (dry run)"
        } else {
            "Variation consolidation"
        };
        writeln!(f, "{title}")?;
        writeln!(f, "  groups analyzed        {:>8}", self.groups_analyzed)?;
        writeln!(f, "  groups skipped         {:>8}", self.groups_skipped)?;
        writeln!(f, "  canonical products     {:>8}", self.canonical_products)?;
        if self.dry_run {
            writeln!(f, "  variants planned       {:>8}", self.variants_planned)?;
            writeln!(f, "  colors planned         {:>8}", self.colors_planned)?;
        } else {
            writeln!(f, "  variants created       {:>8}", self.variants_created)?;
            writeln!(f, "  variants updated       {:>8}", self.variants_updated)?;
            writeln!(f, "  options created        {:>8}", self.options_created)?;
            writeln!(f, "  option values created  {:>8}", self.option_values_created)?;
            writeln!(f, "  color links created    {:>8}", self.color_links)?;
        }
        writeln!(f, "  errors                 {:>8}", self.errors)?;
        writeln!(
            f,
            "  avg variants / group   {:>8.2}",
            self.average_variants_per_group()
        )?;
        write!(f, "  elapsed                {:>7.1}s", self.elapsed_secs())
    }
}

/// Drives grouping and materialization over every variation group, one
/// group and one variant at a time.
pub struct ConsolidationRunner<'a> {
    documents: &'a dyn DocumentRepository,
    relational: &'a dyn RelationalRepository,
    options: RunOptions,
}

impl<'a> ConsolidationRunner<'a> {
    pub fn new(
        documents: &'a dyn DocumentRepository,
        relational: &'a dyn RelationalRepository,
        options: RunOptions,
    ) -> Self {
        Self {
            documents,
            relational,
            options,
        }
    }

    /// Only a failure to fetch the groups aborts the run; group and variant
    /// failures are counted in `errors`.
    pub async fn run(&self) -> Result<RunStats> {
        let query = self.options.group_query();
        let fetched = self
            .documents
            .variation_groups(&query)
            .await
            .context("fetching variation groups")?;
        let groups = retain_variation_groups(fetched, &query);

        let batch_size = self.options.batch_size.max(1);
        let total_batches = groups.len().div_ceil(batch_size);
        info!(
            groups = groups.len(),
            batches = total_batches,
            dry_run = self.options.dry_run,
            "starting consolidation"
        );

        let mut stats = RunStats::start(self.options.dry_run);
        let mut materializer = VariantMaterializer::new(self.relational, self.options.option_name.clone());
        for (index, batch) in groups.chunks(batch_size).enumerate() {
            info!(
                batch = index + 1,
                total = total_batches,
                groups = batch.len(),
                "processing batch"
            );
            for group in batch {
                self.process_group(group, &mut materializer, &mut stats).await;
            }
        }

        stats.finished_at = Some(Utc::now());
        info!(
            groups_analyzed = stats.groups_analyzed,
            groups_skipped = stats.groups_skipped,
            variants_created = stats.variants_created,
            variants_updated = stats.variants_updated,
            errors = stats.errors,
            "consolidation finished"
        );
        Ok(stats)
    }

    async fn process_group(
        &self,
        group: &SourceGroup,
        materializer: &mut VariantMaterializer<'_>,
        stats: &mut RunStats,
    ) {
        stats.groups_analyzed += 1;
        let resolved = match resolve_group(group, self.relational).await {
            Ok(GroupResolution::Resolved(resolved)) => resolved,
            Ok(GroupResolution::Skipped(_)) => {
                stats.groups_skipped += 1;
                return;
            }
            Err(err) => {
                stats.errors += 1;
                error!(group_key = %group.key, error = %format!("{err:#}"), "group lookup failed");
                return;
            }
        };
        stats.canonical_products += 1;

        if self.options.dry_run {
            plan_group(&resolved, stats);
            return;
        }

        for (row, source) in &resolved.variants {
            match materializer.materialize(&resolved.canonical, row, source).await {
                Ok(outcome) => stats.record_outcome(&outcome),
                Err(err) => {
                    stats.errors += 1;
                    error!(
                        group_key = %resolved.key,
                        sku = %row.sku,
                        error = %format!("{err:#}"),
                        "variant failed"
                    );
                }
            }
        }
    }
}

fn plan_group(resolved: &ResolvedGroup, stats: &mut RunStats) {
    for (row, source) in &resolved.variants {
        let color = ColorEncoding::parse(source.color_encoding.as_deref());
        info!(
            group_key = %resolved.key,
            canonical = %resolved.canonical.sku,
            sku = %row.sku,
            price = source.price.unwrap_or(0.0),
            cost_price = ?source.cost_price,
            promotional_price = ?source.promotional_price,
            color = color.label().unwrap_or("-"),
            hexcode = color.hexcode().unwrap_or("-"),
            "planned variant"
        );
        stats.variants_planned += 1;
        stats.colors_planned += usize::from(color.is_valid());
    }
}
