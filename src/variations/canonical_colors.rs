//! Color backfill for canonical products.
//!
//! Consolidation only links colors to the variants it creates; the canonical
//! product of each group keeps whatever color its name implies. This pass
//! gives every canonical product a self-variant carrying that color.

use std::fmt;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::database_ops::repository::RelationalRepository;
use crate::normalization::color::detect_color_from_name;
use crate::variations::materializer::VariantMaterializer;
use crate::variations::model::ProductRow;

#[derive(Debug, Clone, Default, Serialize)]
pub struct BackfillReport {
    pub dry_run: bool,
    pub candidates: usize,
    pub colored: usize,
    pub planned: usize,
    pub option_values_created: usize,
    pub errors: usize,
    /// `(sku, name)` of products whose color could not be detected.
    pub undetected: Vec<(String, String)>,
}

impl fmt::Display for BackfillReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Canonical color backfill{}", if self.dry_run { " (dry run)" } else { "" })?;
        writeln!(f, "  candidates             {:>8}", self.candidates)?;
        if self.dry_run {
            writeln!(f, "  colors planned         {:>8}", self.planned)?;
        } else {
            writeln!(f, "  colors linked          {:>8}", self.colored)?;
            writeln!(f, "  option values created  {:>8}", self.option_values_created)?;
        }
        writeln!(f, "  errors                 {:>8}", self.errors)?;
        write!(f, "  needs manual review    {:>8}", self.undetected.len())?;
        for (sku, name) in &self.undetected {
            write!(f, "\n    {sku}  {name}")?;
        }
        Ok(())
    }
}

pub struct CanonicalColorBackfill<'a> {
    relational: &'a dyn RelationalRepository,
    option_name: String,
    dry_run: bool,
}

impl<'a> CanonicalColorBackfill<'a> {
    pub fn new(relational: &'a dyn RelationalRepository, option_name: impl Into<String>) -> Self {
        Self {
            relational,
            option_name: option_name.into(),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self) -> Result<BackfillReport> {
        let candidates = self
            .relational
            .canonicals_missing_option(&self.option_name)
            .await
            .context("listing canonical products without a color")?;
        info!(candidates = candidates.len(), dry_run = self.dry_run, "canonical color backfill");

        let mut report = BackfillReport {
            dry_run: self.dry_run,
            candidates: candidates.len(),
            ..BackfillReport::default()
        };
        let mut materializer = VariantMaterializer::new(self.relational, self.option_name.clone());

        for product in &candidates {
            let Some(color) = detect_color_from_name(&product.name) else {
                warn!(sku = %product.sku, name = %product.name, "no color detected from name");
                report.undetected.push((product.sku.clone(), product.name.clone()));
                continue;
            };
            if self.dry_run {
                info!(sku = %product.sku, color, "planned color");
                report.planned += 1;
                continue;
            }
            match self.color_product(&mut materializer, product, color).await {
                Ok(value_created) => {
                    report.colored += 1;
                    report.option_values_created += usize::from(value_created);
                }
                Err(err) => {
                    report.errors += 1;
                    error!(sku = %product.sku, error = %format!("{err:#}"), "color backfill failed");
                }
            }
        }
        Ok(report)
    }

    async fn color_product(
        &self,
        materializer: &mut VariantMaterializer<'_>,
        product: &ProductRow,
        color: &str,
    ) -> Result<bool> {
        let price = product.price.unwrap_or(0.0);
        let self_variant = self.relational.upsert_variant(product, product, price).await?;
        let link = materializer.attach_color(self_variant.id, color).await?;
        info!(sku = %product.sku, color, linked = link.linked, "canonical color linked");
        Ok(link.option_value_created)
    }
}
