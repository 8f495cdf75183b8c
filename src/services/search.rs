//! Item lookup across every location.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::InventoryMirror;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub category: String,
    pub subcategory: String,
    pub subcategory2: Option<String>,
    pub name: String,
    pub total: u64,
    pub per_location: BTreeMap<String, u64>,
}

/// Case-insensitive substring match on item name, subcategory or
/// subcategory2, grouped by category path and name.
pub fn search(mirror: &InventoryMirror, query: &str) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut hits: BTreeMap<(String, String, Option<String>, String), SearchHit> = BTreeMap::new();
    for (leaf, items) in mirror.leaves() {
        let path_matches = leaf.subcategory.to_lowercase().contains(&needle)
            || leaf
                .subcategory2()
                .is_some_and(|sub2| sub2.to_lowercase().contains(&needle));
        for item in items {
            if !path_matches && !item.name.to_lowercase().contains(&needle) {
                continue;
            }
            let key = (
                leaf.category.clone(),
                leaf.subcategory.clone(),
                leaf.subcategory2.clone(),
                item.name.clone(),
            );
            let hit = hits.entry(key).or_insert_with(|| SearchHit {
                category: leaf.category.clone(),
                subcategory: leaf.subcategory.clone(),
                subcategory2: leaf.subcategory2.clone(),
                name: item.name.clone(),
                total: 0,
                per_location: BTreeMap::new(),
            });
            hit.total = hit.total.saturating_add(item.count);
            let at_location = hit.per_location.entry(leaf.location.clone()).or_default();
            *at_location = at_location.saturating_add(item.count);
        }
    }
    hits.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemRecord, LeafAddress};

    #[test]
    fn matches_name_or_path_and_aggregates() {
        let mut mirror = InventoryMirror::from_schema();
        let used = LeafAddress::new("Club Room", "Consumables", "Propellers").with_subcategory2("Used");
        mirror.ensure_items(&used).push(ItemRecord::new("5inch", 4));
        mirror
            .ensure_items(&used.at_location("Airfield"))
            .push(ItemRecord::new("5inch", 6));
        mirror
            .ensure_items(&LeafAddress::new("Club Room", "Tools", "Repair"))
            .push(ItemRecord::new("Hex key", 1));

        let by_path = search(&mirror, "USED");
        assert_eq!(by_path.len(), 1);
        assert_eq!(by_path[0].total, 10);
        assert_eq!(by_path[0].per_location.len(), 2);

        let by_name = search(&mirror, "hex");
        assert_eq!(by_name[0].name, "Hex key");
        assert!(search(&mirror, "   ").is_empty());
    }

    #[test]
    fn location_sums_saturate() {
        let mut mirror = InventoryMirror::from_schema();
        let used = LeafAddress::new("Club Room", "Consumables", "Propellers").with_subcategory2("Used");
        let items = mirror.ensure_items(&used);
        items.push(ItemRecord::new("5inch", u64::MAX));
        items.push(ItemRecord::new("5inch", 3));

        let hits = search(&mirror, "5inch");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].total, u64::MAX);
        assert_eq!(hits[0].per_location["Club Room"], u64::MAX);
    }
}
