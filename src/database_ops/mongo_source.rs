use anyhow::{Context, Result};
use mongodb::bson::{self, doc, Bson, Document};
use serde::Deserialize;
use tracing::{info, warn};

use crate::database_ops::connector::StoreConnector;
use crate::database_ops::repository::{DocumentRepository, GroupQuery};
use crate::util::env::env_opt;
use crate::variations::model::{GroupKey, SourceGroup, SourceRecord};

pub const DEFAULT_COLLECTION: &str = "m_product_typesense";

/// Reads variation groups from the legacy product collection.
pub struct MongoCatalogSource<'a> {
    connector: &'a StoreConnector,
    collection: String,
}

impl<'a> MongoCatalogSource<'a> {
    pub fn new(connector: &'a StoreConnector, collection: impl Into<String>) -> Self {
        Self {
            connector,
            collection: collection.into(),
        }
    }

    /// Collection from `MONGODB_COLLECTION`, falling back to the default.
    pub fn from_env(connector: &'a StoreConnector) -> Self {
        let collection = env_opt("MONGODB_COLLECTION").unwrap_or_else(|| DEFAULT_COLLECTION.into());
        Self::new(connector, collection)
    }
}

#[derive(Debug, Deserialize)]
struct GroupDoc {
    #[serde(rename = "_id")]
    key: Bson,
    #[serde(default)]
    members: Vec<MemberDoc>,
}

#[derive(Debug, Deserialize)]
struct MemberDoc {
    #[serde(default)]
    productid: Option<Bson>,
    #[serde(default)]
    productname: Option<Bson>,
    #[serde(default)]
    price: Option<Bson>,
    #[serde(default)]
    costprice: Option<Bson>,
    #[serde(default)]
    promotionalprice: Option<Bson>,
    #[serde(rename = "corHexadecimal", default)]
    color: Option<Bson>,
}

pub fn variation_pipeline(query: &GroupQuery) -> Vec<Document> {
    let mut count = doc! { "$gte": query.min_members as i64 };
    if let Some(max) = query.max_members {
        count.insert("$lte", max as i64);
    }
    let mut pipeline = vec![
        doc! { "$match": {
            "isactive": true,
            "parentID": { "$exists": true, "$nin": [null, 0, "0", ""] },
        } },
        doc! { "$group": {
            "_id": "$parentID",
            "members": { "$push": {
                "productid": "$productid",
                "productname": "$productname",
                "price": "$price",
                "costprice": "$costprice",
                "promotionalprice": "$promotionalprice",
                "corHexadecimal": "$corHexadecimal",
            } },
            "count": { "$sum": 1 },
        } },
        doc! { "$match": { "count": count, "_id": { "$ne": null } } },
        doc! { "$sort": { "count": -1 } },
    ];
    if let Some(limit) = query.limit {
        pipeline.push(doc! { "$limit": limit as i64 });
    }
    pipeline
}

pub(crate) fn bson_to_string(value: &Bson) -> Option<String> {
    match value {
        Bson::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Bson::Int32(n) => Some(n.to_string()),
        Bson::Int64(n) => Some(n.to_string()),
        Bson::Double(f) if f.is_finite() && f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        Bson::Double(f) if f.is_finite() => Some(f.to_string()),
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        _ => None,
    }
}

pub(crate) fn bson_to_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(f) => Some(*f),
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

fn group_from_document(raw: Document) -> Result<Option<SourceGroup>> {
    let parsed: GroupDoc = bson::from_document(raw).context("decoding variation group")?;
    let Some(key) = bson_to_string(&parsed.key).and_then(|k| GroupKey::parse(&k)) else {
        return Ok(None);
    };

    let mut members = Vec::with_capacity(parsed.members.len());
    for member in parsed.members {
        let Some(external_id) = member.productid.as_ref().and_then(bson_to_string) else {
            warn!(group_key = %key, "member without productid; ignored");
            continue;
        };
        members.push(SourceRecord {
            external_id,
            group_key: Some(key.clone()),
            display_name: member
                .productname
                .as_ref()
                .and_then(bson_to_string)
                .unwrap_or_default(),
            price: member.price.as_ref().and_then(bson_to_f64),
            cost_price: member.costprice.as_ref().and_then(bson_to_f64),
            promotional_price: member.promotionalprice.as_ref().and_then(bson_to_f64),
            color_encoding: member.color.as_ref().and_then(bson_to_string),
        });
    }
    Ok(Some(SourceGroup { key, members }))
}

#[async_trait::async_trait]
impl DocumentRepository for MongoCatalogSource<'_> {
    async fn variation_groups(&self, query: &GroupQuery) -> Result<Vec<SourceGroup>> {
        let docs = self
            .connector
            .query_document(
                &self.collection,
                &variation_pipeline(query),
            )
            .await
            .with_context(|| format!("aggregating variation groups from {}", self.collection))?;
        info!(collection = %self.collection, groups = docs.len(), "variation groups fetched");

        let mut groups = Vec::with_capacity(docs.len());
        for raw in docs {
            if let Some(group) = group_from_document(raw)? {
                groups.push(group);
            }
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_applies_size_bounds_and_limit() {
        let pipeline = variation_pipeline(&GroupQuery {
            min_members: 2,
            max_members: Some(5),
            limit: Some(5),
        });
        assert_eq!(pipeline.len(), 5);
        let count = pipeline[2]
            .get_document("$match")
            .and_then(|m| m.get_document("count"))
            .unwrap();
        assert_eq!(count.get_i64("$gte").unwrap(), 2);
        assert_eq!(count.get_i64("$lte").unwrap(), 5);
        assert_eq!(pipeline[4].get_i64("$limit").unwrap(), 5);
    }

    #[test]
    fn numeric_ids_are_stringified_without_fraction() {
        assert_eq!(bson_to_string(&Bson::Double(1234.0)).as_deref(), Some("1234"));
        assert_eq!(bson_to_string(&Bson::Int64(77)).as_deref(), Some("77"));
        assert_eq!(bson_to_string(&Bson::String("  ".into())), None);
        assert_eq!(bson_to_string(&Bson::Null), None);
    }

    #[test]
    fn decodes_group_document_into_source_records() {
        let raw = doc! {
            "_id": 4411,
            "members": [
                { "productid": 200, "productname": "Manta Rosa", "price": 89.9, "corHexadecimal": "Rosa|#df8aa7" },
                { "productid": "050", "price": "79,90", "corHexadecimal": null },
                { "productname": "orphan without id" },
            ],
            "count": 3,
        };
        let group = group_from_document(raw).unwrap().unwrap();
        assert_eq!(group.key.as_str(), "4411");
        assert_eq!(group.members.len(), 2);
        assert_eq!(group.members[0].external_id, "200");
        assert_eq!(group.members[0].color_encoding.as_deref(), Some("Rosa|#df8aa7"));
        assert_eq!(group.members[1].price, Some(79.9));
        assert_eq!(group.members[1].color_encoding, None);
    }

    #[test]
    fn sentinel_group_key_is_dropped() {
        let raw = doc! { "_id": 0, "members": [ { "productid": 1 }, { "productid": 2 } ] };
        assert!(group_from_document(raw).unwrap().is_none());
    }
}
