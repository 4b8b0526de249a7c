use std::collections::HashSet;

use anyhow::Result;
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::database_ops::repository::{GroupQuery, RelationalRepository};
use crate::variations::model::{
    compare_external_ids, GroupKey, GroupResolution, ProductRow, ResolvedGroup, SourceGroup,
    SourceRecord,
};

/// Buckets flat records by group key, keeping discovery order. Records with
/// no usable key are dropped.
pub fn bucket_records<I>(records: I) -> Vec<SourceGroup>
where
    I: IntoIterator<Item = SourceRecord>,
{
    let mut buckets: IndexMap<GroupKey, Vec<SourceRecord>> = IndexMap::new();
    for record in records {
        if let Some(key) = record.group_key.clone() {
            buckets.entry(key).or_default().push(record);
        }
    }
    buckets
        .into_iter()
        .map(|(key, members)| SourceGroup { key, members })
        .collect()
}

/// Keeps real variation groups: duplicate members collapsed, then the size
/// bounds and limit of `query` applied.
pub fn retain_variation_groups(groups: Vec<SourceGroup>, query: &GroupQuery) -> Vec<SourceGroup> {
    let min = query.min_members.max(2);
    let mut kept = Vec::new();
    for mut group in groups {
        let mut seen = HashSet::new();
        group.members.retain(|m| seen.insert(m.external_id.clone()));

        let size = group.members.len();
        if size < min {
            debug!(group_key = %group.key, size, "not a variation group; dropped");
            continue;
        }
        if query.max_members.is_some_and(|max| size > max) {
            debug!(group_key = %group.key, size, "group above max size; dropped");
            continue;
        }
        kept.push(group);
        if query.limit.is_some_and(|limit| kept.len() >= limit) {
            break;
        }
    }
    kept
}

/// Picks the canonical product among the group members that exist in the
/// relational store: the one with the smallest external id.
pub fn select_canonical(group: &SourceGroup, matched: Vec<ProductRow>) -> GroupResolution {
    let mut rows: Vec<ProductRow> = matched
        .into_iter()
        .filter(|row| group.find_member(&row.sku).is_some())
        .collect();
    rows.sort_by(|a, b| compare_external_ids(&a.sku, &b.sku));

    let mut rows = rows.into_iter();
    let Some(canonical) = rows.next() else {
        return GroupResolution::Skipped(group.key.clone());
    };
    let variants = rows
        .filter_map(|row| {
            let payload = group.find_member(&row.sku)?.clone();
            Some((row, payload))
        })
        .collect();

    GroupResolution::Resolved(ResolvedGroup {
        key: group.key.clone(),
        canonical,
        variants,
    })
}

pub async fn resolve_group(
    group: &SourceGroup,
    relational: &dyn RelationalRepository,
) -> Result<GroupResolution> {
    let skus: Vec<String> = group.members.iter().map(|m| m.external_id.clone()).collect();
    let matched = relational.find_products_by_skus(&skus).await?;
    let resolution = select_canonical(group, matched);
    match &resolution {
        GroupResolution::Skipped(key) => {
            info!(group_key = %key, members = skus.len(), "no member found in relational store; skipping group");
        }
        GroupResolution::Resolved(resolved) => {
            info!(
                group_key = %resolved.key,
                canonical = %resolved.canonical.sku,
                variants = resolved.variants.len(),
                "group resolved"
            );
        }
    }
    Ok(resolution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record(id: &str, key: Option<&str>) -> SourceRecord {
        SourceRecord::new(id, key)
    }

    fn row(sku: &str) -> ProductRow {
        ProductRow {
            id: Uuid::new_v4(),
            sku: sku.to_string(),
            name: format!("Produto {sku}"),
            price: Some(10.0),
        }
    }

    #[test]
    fn buckets_by_key_and_drops_ungrouped_records() {
        let groups = bucket_records(vec![
            record("1", Some("10")),
            record("2", None),
            record("3", Some("0")),
            record("4", Some("20")),
            record("5", Some("10")),
        ]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key.as_str(), "10");
        assert_eq!(groups[0].members.len(), 2);
        assert_eq!(groups[1].key.as_str(), "20");
    }

    #[test]
    fn singleton_groups_are_not_variation_groups() {
        let groups = bucket_records(vec![
            record("1", Some("10")),
            record("2", Some("20")),
            record("3", Some("20")),
            // duplicate member collapses, leaving a singleton
            record("4", Some("30")),
            record("4", Some("30")),
        ]);
        let kept = retain_variation_groups(groups, &GroupQuery::default());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].key.as_str(), "20");
    }

    #[test]
    fn max_size_and_limit_bound_the_selection() {
        let groups = bucket_records(vec![
            record("1", Some("a")),
            record("2", Some("a")),
            record("3", Some("a")),
            record("4", Some("b")),
            record("5", Some("b")),
            record("6", Some("c")),
            record("7", Some("c")),
        ]);
        let query = GroupQuery {
            min_members: 2,
            max_members: Some(2),
            limit: Some(1),
        };
        let kept = retain_variation_groups(groups, &query);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].key.as_str(), "b");
    }

    #[test]
    fn smallest_external_id_becomes_canonical() {
        let group = SourceGroup {
            key: GroupKey::parse("7").unwrap(),
            members: vec![
                record("200", Some("7")),
                record("050", Some("7")),
                record("150", Some("7")),
            ],
        };
        let resolution = select_canonical(&group, vec![row("200"), row("050"), row("150")]);
        let GroupResolution::Resolved(resolved) = resolution else {
            panic!("group should resolve");
        };
        assert_eq!(resolved.canonical.sku, "050");
        let variant_skus: Vec<&str> = resolved
            .variants
            .iter()
            .map(|(r, payload)| {
                assert_eq!(r.sku, payload.external_id);
                r.sku.as_str()
            })
            .collect();
        assert_eq!(variant_skus, vec!["150", "200"]);
    }

    #[test]
    fn only_matched_members_participate() {
        let group = SourceGroup {
            key: GroupKey::parse("7").unwrap(),
            members: vec![record("1", Some("7")), record("2", Some("7")), record("3", Some("7"))],
        };
        let GroupResolution::Resolved(resolved) = select_canonical(&group, vec![row("3"), row("2")])
        else {
            panic!("group should resolve");
        };
        assert_eq!(resolved.canonical.sku, "2");
        assert_eq!(resolved.variants.len(), 1);
    }

    #[test]
    fn group_without_relational_match_is_skipped() {
        let group = SourceGroup {
            key: GroupKey::parse("7").unwrap(),
            members: vec![record("1", Some("7")), record("2", Some("7"))],
        };
        assert_eq!(
            select_canonical(&group, Vec::new()),
            GroupResolution::Skipped(GroupKey::parse("7").unwrap())
        );
    }
}
