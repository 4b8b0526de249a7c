//! Store-agnostic seams used by the consolidation code.
//!
//! Production implementations route through [`StoreConnector`]; tests use the
//! in-memory fakes in `crate::variations::memory`.
//!
//! [`StoreConnector`]: crate::database_ops::connector::StoreConnector

use anyhow::Result;
use uuid::Uuid;

use crate::variations::model::{ProductRow, SourceGroup, Upserted};

/// Which groups to fetch from the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupQuery {
    pub min_members: usize,
    pub max_members: Option<usize>,
    pub limit: Option<usize>,
}

impl Default for GroupQuery {
    fn default() -> Self {
        Self {
            min_members: 2,
            max_members: None,
            limit: None,
        }
    }
}

#[async_trait::async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Active records grouped by their parent key, null/sentinel keys excluded.
    async fn variation_groups(&self, query: &GroupQuery) -> Result<Vec<SourceGroup>>;
}

#[async_trait::async_trait]
pub trait RelationalRepository: Send + Sync {
    async fn find_products_by_skus(&self, skus: &[String]) -> Result<Vec<ProductRow>>;

    /// Get-or-create a global option by name.
    async fn ensure_option(&self, name: &str) -> Result<Upserted>;

    /// Get-or-create the `(option, value)` pair.
    async fn ensure_option_value(&self, option_id: Uuid, value: &str) -> Result<Upserted>;

    /// Insert a variant of `owner` keyed by `variant.sku`; on conflict update
    /// owner and price in place. Quantity is copied from `variant`'s own row
    /// only when the variant is first created.
    async fn upsert_variant(
        &self,
        owner: &ProductRow,
        variant: &ProductRow,
        price: f64,
    ) -> Result<Upserted>;

    /// Returns true when a new join row was written.
    async fn link_option_value(
        &self,
        variant_id: Uuid,
        option_id: Uuid,
        option_value_id: Uuid,
    ) -> Result<bool>;

    async fn mark_as_variant(&self, product_id: Uuid) -> Result<()>;

    /// Canonical products that own variants but have no value of `option_name`
    /// on their own self-variant.
    async fn canonicals_missing_option(&self, option_name: &str) -> Result<Vec<ProductRow>>;
}
