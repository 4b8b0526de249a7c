use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::database_ops::connector::{SqlParam, StoreConnector};

/// Unique constraint the idempotent upserts rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub name: &'static str,
    pub table: &'static str,
    pub columns: &'static [&'static str],
}

impl UniqueConstraint {
    pub fn add_statement(&self) -> String {
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
            self.table,
            self.name,
            self.columns.join(", ")
        )
    }
}

pub const UNIQUE_CONSTRAINTS: &[UniqueConstraint] = &[
    UniqueConstraint {
        name: "unique_product_sku",
        table: "products",
        columns: &["sku"],
    },
    UniqueConstraint {
        name: "unique_variant_sku",
        table: "product_variants",
        columns: &["sku"],
    },
    UniqueConstraint {
        name: "unique_option_value",
        table: "product_option_values",
        columns: &["option_id", "value"],
    },
    UniqueConstraint {
        name: "unique_variant_option_value",
        table: "variant_option_values",
        columns: &["variant_id", "option_value_id"],
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ConstraintStatus {
    AlreadyPresent,
    Installed,
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ConstraintOutcome {
    pub name: &'static str,
    pub table: &'static str,
    #[serde(flatten)]
    pub status: ConstraintStatus,
}

async fn constraint_exists(connector: &StoreConnector, name: &str) -> Result<bool> {
    let rows = connector
        .query_relational(
            "SELECT 1 FROM pg_constraint WHERE conname = $1",
            &[SqlParam::Text(name.to_string())],
        )
        .await?;
    Ok(!rows.is_empty())
}

async fn install(connector: &StoreConnector, constraint: &UniqueConstraint) -> Result<ConstraintStatus> {
    if constraint_exists(connector, constraint.name).await? {
        return Ok(ConstraintStatus::AlreadyPresent);
    }
    connector
        .execute_relational(&constraint.add_statement(), &[])
        .await?;
    Ok(ConstraintStatus::Installed)
}

/// Installs each missing constraint on its own; one failure (for example
/// existing duplicates) does not prevent the others.
pub async fn ensure_unique_constraints(connector: &StoreConnector) -> Vec<ConstraintOutcome> {
    let mut outcomes = Vec::with_capacity(UNIQUE_CONSTRAINTS.len());
    for constraint in UNIQUE_CONSTRAINTS {
        let status = match install(connector, constraint).await {
            Ok(status) => {
                info!(constraint = constraint.name, table = constraint.table, ?status, "unique constraint checked");
                status
            }
            Err(err) => {
                let detail = format!("{err:#}");
                warn!(constraint = constraint.name, table = constraint.table, error = %detail, "unique constraint not installed");
                ConstraintStatus::Failed(detail)
            }
        };
        outcomes.push(ConstraintOutcome {
            name: constraint.name,
            table: constraint.table,
            status,
        });
    }
    outcomes
}
