//! In-memory repositories that honour the same uniqueness rules as the
//! Postgres schema, for exercising the consolidation logic without stores.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use uuid::Uuid;

use crate::database_ops::repository::{DocumentRepository, GroupQuery, RelationalRepository};
use crate::variations::grouper::bucket_records;
use crate::variations::model::{ProductRow, SourceGroup, SourceRecord, Upserted};

pub struct MemoryDocuments {
    pub records: Vec<SourceRecord>,
}

#[async_trait::async_trait]
impl DocumentRepository for MemoryDocuments {
    async fn variation_groups(&self, _query: &GroupQuery) -> Result<Vec<SourceGroup>> {
        Ok(bucket_records(self.records.clone()))
    }
}

#[derive(Debug, Clone)]
pub struct StoredProduct {
    pub row: ProductRow,
    pub quantity: i64,
    pub is_variant: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub price: f64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCounts {
    pub variants: usize,
    pub options: usize,
    pub option_values: usize,
    pub links: usize,
    pub flagged: usize,
}

#[derive(Default)]
struct CatalogState {
    products: Vec<StoredProduct>,
    variants: IndexMap<String, StoredVariant>,
    options: Vec<(Uuid, String)>,
    option_values: HashMap<(Uuid, String), Uuid>,
    links: HashMap<(Uuid, Uuid), Uuid>,
}

#[derive(Default)]
pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
    failing_variant_skus: HashSet<String>,
    failing_lookups: bool,
}

impl MemoryCatalog {
    pub fn with_products(products: &[(&str, &str, i64)]) -> Self {
        let catalog = Self::default();
        {
            let mut state = catalog.state.lock().unwrap();
            for (sku, name, quantity) in products {
                state.products.push(StoredProduct {
                    row: ProductRow {
                        id: Uuid::new_v4(),
                        sku: sku.to_string(),
                        name: name.to_string(),
                        price: Some(100.0),
                    },
                    quantity: *quantity,
                    is_variant: false,
                });
            }
        }
        catalog
    }

    /// Upserting a variant with this sku fails, as a broken row would.
    pub fn failing_variant(mut self, sku: &str) -> Self {
        self.failing_variant_skus.insert(sku.to_string());
        self
    }

    pub fn failing_lookups(mut self) -> Self {
        self.failing_lookups = true;
        self
    }

    pub fn counts(&self) -> RowCounts {
        let state = self.state.lock().unwrap();
        RowCounts {
            variants: state.variants.len(),
            options: state.options.len(),
            option_values: state.option_values.len(),
            links: state.links.len(),
            flagged: state.products.iter().filter(|p| p.is_variant).count(),
        }
    }

    pub fn product(&self, sku: &str) -> Option<StoredProduct> {
        let state = self.state.lock().unwrap();
        state.products.iter().find(|p| p.row.sku == sku).cloned()
    }

    pub fn variant(&self, sku: &str) -> Option<StoredVariant> {
        self.state.lock().unwrap().variants.get(sku).cloned()
    }

    /// Color labels linked to the variant with `sku`.
    pub fn colors_of(&self, sku: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let Some(variant) = state.variants.get(sku) else {
            return Vec::new();
        };
        let mut out: Vec<String> = state
            .links
            .keys()
            .filter(|(variant_id, _)| *variant_id == variant.id)
            .filter_map(|(_, value_id)| {
                state
                    .option_values
                    .iter()
                    .find(|(_, id)| *id == value_id)
                    .map(|((_, value), _)| value.clone())
            })
            .collect();
        out.sort();
        out
    }
}

#[async_trait::async_trait]
impl RelationalRepository for MemoryCatalog {
    async fn find_products_by_skus(&self, skus: &[String]) -> Result<Vec<ProductRow>> {
        if self.failing_lookups {
            return Err(anyhow!("connection reset by peer"));
        }
        let state = self.state.lock().unwrap();
        Ok(state
            .products
            .iter()
            .filter(|p| skus.contains(&p.row.sku))
            .map(|p| p.row.clone())
            .collect())
    }

    async fn ensure_option(&self, name: &str) -> Result<Upserted> {
        let mut state = self.state.lock().unwrap();
        if let Some((id, _)) = state.options.iter().find(|(_, n)| n == name) {
            return Ok(Upserted {
                id: *id,
                created: false,
            });
        }
        let id = Uuid::new_v4();
        state.options.push((id, name.to_string()));
        Ok(Upserted { id, created: true })
    }

    async fn ensure_option_value(&self, option_id: Uuid, value: &str) -> Result<Upserted> {
        let mut state = self.state.lock().unwrap();
        let key = (option_id, value.to_string());
        if let Some(id) = state.option_values.get(&key) {
            return Ok(Upserted {
                id: *id,
                created: false,
            });
        }
        let id = Uuid::new_v4();
        state.option_values.insert(key, id);
        Ok(Upserted { id, created: true })
    }

    async fn upsert_variant(
        &self,
        owner: &ProductRow,
        variant: &ProductRow,
        price: f64,
    ) -> Result<Upserted> {
        if self.failing_variant_skus.contains(&variant.sku) {
            return Err(anyhow!("value too long for type character varying(100)"));
        }
        let mut state = self.state.lock().unwrap();
        let quantity = state
            .products
            .iter()
            .find(|p| p.row.id == variant.id)
            .map(|p| p.quantity)
            .unwrap_or(0);
        if let Some(existing) = state.variants.get_mut(&variant.sku) {
            existing.product_id = owner.id;
            existing.price = price;
            return Ok(Upserted {
                id: existing.id,
                created: false,
            });
        }
        let id = Uuid::new_v4();
        state.variants.insert(
            variant.sku.clone(),
            StoredVariant {
                id,
                product_id: owner.id,
                price,
                quantity,
            },
        );
        Ok(Upserted { id, created: true })
    }

    async fn link_option_value(
        &self,
        variant_id: Uuid,
        option_id: Uuid,
        option_value_id: Uuid,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let key = (variant_id, option_value_id);
        if state.links.contains_key(&key) {
            return Ok(false);
        }
        state.links.insert(key, option_id);
        Ok(true)
    }

    async fn mark_as_variant(&self, product_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let product = state
            .products
            .iter_mut()
            .find(|p| p.row.id == product_id)
            .ok_or_else(|| anyhow!("product {product_id} not found"))?;
        product.is_variant = true;
        Ok(())
    }

    async fn canonicals_missing_option(&self, option_name: &str) -> Result<Vec<ProductRow>> {
        let state = self.state.lock().unwrap();
        let option_id = state
            .options
            .iter()
            .find(|(_, n)| n == option_name)
            .map(|(id, _)| *id);
        let mut out = Vec::new();
        for product in state.products.iter().filter(|p| !p.is_variant) {
            let owns_variants = state
                .variants
                .iter()
                .any(|(sku, v)| v.product_id == product.row.id && *sku != product.row.sku);
            if !owns_variants {
                continue;
            }
            let has_color = state.variants.get(&product.row.sku).is_some_and(|self_variant| {
                state.links.iter().any(|((variant_id, _), link_option)| {
                    *variant_id == self_variant.id && Some(*link_option) == option_id
                })
            });
            if !has_color {
                out.push(product.row.clone());
            }
        }
        out.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(out)
    }
}
