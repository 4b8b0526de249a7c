use std::cmp::Ordering;
use std::fmt;

use uuid::Uuid;

/// Shared parent key of a variation group. `None`-like inputs (empty, `0`)
/// never become a `GroupKey`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(String);

impl GroupKey {
    /// Normalizes a raw key; blank and sentinel values mean "not grouped".
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
            return None;
        }
        // "0", "00" and "0.0" are all the empty marker.
        if trimmed.parse::<f64>().map(|v| v == 0.0).unwrap_or(false) {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One sellable unit as read from the document store.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub external_id: String,
    pub group_key: Option<GroupKey>,
    pub display_name: String,
    pub price: Option<f64>,
    pub cost_price: Option<f64>,
    pub promotional_price: Option<f64>,
    pub color_encoding: Option<String>,
}

impl SourceRecord {
    pub fn new(external_id: impl Into<String>, group_key: Option<&str>) -> Self {
        Self {
            external_id: external_id.into(),
            group_key: group_key.and_then(GroupKey::parse),
            display_name: String::new(),
            price: None,
            cost_price: None,
            promotional_price: None,
            color_encoding: None,
        }
    }
}

/// Members sharing one group key.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceGroup {
    pub key: GroupKey,
    pub members: Vec<SourceRecord>,
}

impl SourceGroup {
    pub fn find_member(&self, external_id: &str) -> Option<&SourceRecord> {
        self.members.iter().find(|m| m.external_id == external_id)
    }
}

/// A row of the relational `products` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRow {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub price: Option<f64>,
}

/// Result of an idempotent get-or-create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub id: Uuid,
    pub created: bool,
}

/// A group after canonical selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGroup {
    pub key: GroupKey,
    pub canonical: ProductRow,
    /// Each variant row paired with its document-store payload.
    pub variants: Vec<(ProductRow, SourceRecord)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GroupResolution {
    Resolved(ResolvedGroup),
    /// No member of the group exists in the relational store.
    Skipped(GroupKey),
}

/// Orders external ids numerically when both are integers, lexicographically otherwise.
/// Numeric ids sort before non-numeric ones.
pub fn compare_external_ids(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<i128>(), b.trim().parse::<i128>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
