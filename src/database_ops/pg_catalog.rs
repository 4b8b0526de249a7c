use anyhow::{anyhow, Context, Result};
use sqlx::postgres::PgRow;
use sqlx::Row;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::database_ops::connector::{SqlParam, StoreConnector};
use crate::database_ops::repository::RelationalRepository;
use crate::variations::model::{ProductRow, Upserted};

/// Postgres-backed catalog writes. Every statement is idempotent on its own:
/// unique constraints plus `ON CONFLICT` make repeated runs converge.
pub struct PgCatalog<'a> {
    connector: &'a StoreConnector,
}

impl<'a> PgCatalog<'a> {
    pub fn new(connector: &'a StoreConnector) -> Self {
        Self { connector }
    }
}

fn product_from_row(row: &PgRow) -> Result<ProductRow> {
    Ok(ProductRow {
        id: row.try_get("id")?,
        sku: row.try_get("sku")?,
        name: row.try_get::<Option<String>, _>("name")?.unwrap_or_default(),
        price: row.try_get("price")?,
    })
}

fn upserted_from_rows(rows: Vec<PgRow>, what: &str) -> Result<Upserted> {
    let row = rows
        .first()
        .ok_or_else(|| anyhow!("{what}: statement returned no row"))?;
    Ok(Upserted {
        id: row.try_get("id")?,
        created: row.try_get("created")?,
    })
}

#[async_trait::async_trait]
impl RelationalRepository for PgCatalog<'_> {
    #[instrument(skip(self, skus), fields(count = skus.len()))]
    async fn find_products_by_skus(&self, skus: &[String]) -> Result<Vec<ProductRow>> {
        if skus.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .connector
            .query_relational(
                "SELECT id, sku, name, price::float8 AS price FROM products WHERE sku = ANY($1)",
                &[SqlParam::TextArray(skus.to_vec())],
            )
            .await
            .context("looking up products by sku")?;
        rows.iter().map(product_from_row).collect()
    }

    async fn ensure_option(&self, name: &str) -> Result<Upserted> {
        // No unique constraint on the name is assumed, so select-or-insert in one statement.
        let rows = self
            .connector
            .query_relational(
                "WITH existing AS (
                    SELECT id FROM product_options WHERE name = $1 LIMIT 1
                 ), inserted AS (
                    INSERT INTO product_options (name, display_name, type)
                    SELECT $1, $1, 'select'
                    WHERE NOT EXISTS (SELECT 1 FROM existing)
                    RETURNING id
                 )
                 SELECT id, false AS created FROM existing
                 UNION ALL
                 SELECT id, true AS created FROM inserted",
                &[SqlParam::Text(name.to_string())],
            )
            .await
            .with_context(|| format!("ensuring option '{name}'"))?;
        let out = upserted_from_rows(rows, "ensure_option")?;
        debug!(option = name, option_id = %out.id, created = out.created, "option resolved");
        Ok(out)
    }

    async fn ensure_option_value(&self, option_id: Uuid, value: &str) -> Result<Upserted> {
        let rows = self
            .connector
            .query_relational(
                "INSERT INTO product_option_values (option_id, value, display_value)
                 VALUES ($1, $2, $2)
                 ON CONFLICT (option_id, value) DO UPDATE SET value = EXCLUDED.value
                 RETURNING id, (xmax = 0) AS created",
                &[SqlParam::Uuid(option_id), SqlParam::Text(value.to_string())],
            )
            .await
            .with_context(|| format!("ensuring option value '{value}'"))?;
        upserted_from_rows(rows, "ensure_option_value")
    }

    async fn upsert_variant(
        &self,
        owner: &ProductRow,
        variant: &ProductRow,
        price: f64,
    ) -> Result<Upserted> {
        let rows = self
            .connector
            .query_relational(
                "INSERT INTO product_variants (product_id, sku, price, quantity, created_at, updated_at)
                 VALUES ($1, $2, $3, COALESCE((SELECT quantity FROM products WHERE id = $4), 0), NOW(), NOW())
                 ON CONFLICT (sku) DO UPDATE SET
                    product_id = EXCLUDED.product_id,
                    price = EXCLUDED.price,
                    updated_at = NOW()
                 RETURNING id, (xmax = 0) AS created",
                &[
                    SqlParam::Uuid(owner.id),
                    SqlParam::Text(variant.sku.clone()),
                    SqlParam::Float(price),
                    SqlParam::Uuid(variant.id),
                ],
            )
            .await
            .with_context(|| format!("upserting variant {}", variant.sku))?;
        upserted_from_rows(rows, "upsert_variant")
    }

    async fn link_option_value(
        &self,
        variant_id: Uuid,
        option_id: Uuid,
        option_value_id: Uuid,
    ) -> Result<bool> {
        let affected = self
            .connector
            .execute_relational(
                "INSERT INTO variant_option_values (variant_id, option_id, option_value_id)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (variant_id, option_value_id) DO NOTHING",
                &[
                    SqlParam::Uuid(variant_id),
                    SqlParam::Uuid(option_id),
                    SqlParam::Uuid(option_value_id),
                ],
            )
            .await
            .context("linking variant to option value")?;
        Ok(affected > 0)
    }

    async fn mark_as_variant(&self, product_id: Uuid) -> Result<()> {
        self.connector
            .execute_relational(
                "UPDATE products SET is_variant = true
                 WHERE id = $1 AND is_variant IS DISTINCT FROM true",
                &[SqlParam::Uuid(product_id)],
            )
            .await
            .context("flagging product as variant")?;
        Ok(())
    }

    async fn canonicals_missing_option(&self, option_name: &str) -> Result<Vec<ProductRow>> {
        let rows = self
            .connector
            .query_relational(
                "SELECT p.id, p.sku, p.name, p.price::float8 AS price
                 FROM products p
                 WHERE COALESCE(p.is_variant, false) = false
                   AND EXISTS (
                       SELECT 1 FROM product_variants pv
                       WHERE pv.product_id = p.id AND pv.sku <> p.sku
                   )
                   AND NOT EXISTS (
                       SELECT 1 FROM product_variants pv
                       JOIN variant_option_values vov ON vov.variant_id = pv.id
                       JOIN product_option_values pov ON pov.id = vov.option_value_id
                       JOIN product_options po ON po.id = pov.option_id
                       WHERE pv.product_id = p.id AND pv.sku = p.sku AND po.name = $1
                   )
                 ORDER BY p.sku",
                &[SqlParam::Text(option_name.to_string())],
            )
            .await
            .context("listing canonical products without a color")?;
        rows.iter().map(product_from_row).collect()
    }
}
