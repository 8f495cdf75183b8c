//! Tabular snapshots of the mirror and the log book.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::models::InventoryMirror;
use crate::schema::SCHEMA;
use crate::services::import::ImportRow;
use crate::services::log_book::LogBook;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExportRow {
    pub location: String,
    pub category: String,
    /// `sub` or `sub/sub2`.
    pub subcategory: String,
    pub item: String,
    pub count: u64,
}

/// Cross-location total for one item name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTotal {
    pub item: String,
    pub total: u64,
    pub per_location: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub rows: Vec<ExportRow>,
    pub totals: Vec<ItemTotal>,
}

/// One row per item in every schema leaf, then the per-item summary block.
pub fn inventory_rows(mirror: &InventoryMirror) -> InventorySnapshot {
    let mut rows = Vec::new();
    for leaf in SCHEMA.all_leaves() {
        for item in mirror.items(&leaf) {
            rows.push(ExportRow {
                location: leaf.location.clone(),
                category: leaf.category.clone(),
                subcategory: leaf.flat_subcategory(),
                item: item.name.clone(),
                count: item.count,
            });
        }
    }
    rows.sort();

    let mut by_item: BTreeMap<String, ItemTotal> = BTreeMap::new();
    for row in &rows {
        let total = by_item.entry(row.item.clone()).or_insert_with(|| ItemTotal {
            item: row.item.clone(),
            total: 0,
            per_location: BTreeMap::new(),
        });
        total.total = total.total.saturating_add(row.count);
        let at_location = total.per_location.entry(row.location.clone()).or_default();
        *at_location = at_location.saturating_add(row.count);
    }

    InventorySnapshot {
        rows,
        totals: by_item.into_values().collect(),
    }
}

/// Export rows in the shape the importer reads back. Empty stock is skipped.
pub fn to_import_rows(rows: &[ExportRow]) -> Vec<ImportRow> {
    rows.iter()
        .filter(|row| row.count > 0)
        .map(|row| {
            let (sub, sub2) = match row.subcategory.split_once('/') {
                Some((sub, sub2)) => (sub, sub2),
                None => (row.subcategory.as_str(), ""),
            };
            let mut record = ImportRow::new();
            record.insert("location".into(), json!(row.location));
            record.insert("category".into(), json!(row.category));
            record.insert("subcategory".into(), json!(sub));
            if !sub2.is_empty() {
                record.insert("subsubcategory".into(), json!(sub2));
            }
            record.insert("item".into(), json!(row.item));
            record.insert("quantity".into(), Value::from(row.count));
            record
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRow {
    pub time: String,
    pub operator_id: String,
    pub operator_name: String,
    pub location: String,
    pub category: String,
    pub subcategory: String,
    pub item: String,
    pub change: i64,
    pub reason: String,
}

/// Audit rows in log book order (newest first).
pub fn log_rows(logs: &LogBook) -> Vec<LogRow> {
    logs.entries()
        .iter()
        .map(|entry| LogRow {
            time: entry.time.clone(),
            operator_id: entry.operator_id.clone().unwrap_or_default(),
            operator_name: entry.operator_name.clone().unwrap_or_default(),
            location: entry.location.clone(),
            category: entry.category.clone(),
            subcategory: entry.subcategory.clone(),
            item: entry.item.clone(),
            change: entry.change,
            reason: entry.reason.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemRecord, LeafAddress, Operator, STOCK_REASON};
    use chrono::{Duration, TimeZone, Utc};

    fn stocked() -> InventoryMirror {
        let mut mirror = InventoryMirror::from_schema();
        mirror
            .ensure_items(&LeafAddress::new("Club Room", "Tools", "Repair"))
            .push(ItemRecord::new("Pliers", 3));
        mirror
            .ensure_items(&LeafAddress::new("Airfield", "Tools", "Repair"))
            .push(ItemRecord::new("Pliers", 2));
        mirror
            .ensure_items(&LeafAddress::new("Airfield", "Consumables", "Propellers").with_subcategory2("New"))
            .push(ItemRecord::new("5inch", 0));
        mirror
    }

    #[test]
    fn rows_are_sorted_and_summarized() {
        let snapshot = inventory_rows(&stocked());
        assert_eq!(snapshot.rows.len(), 3);
        assert_eq!(snapshot.rows[0].location, "Airfield");
        assert_eq!(snapshot.rows[0].subcategory, "Propellers/New");

        let pliers = snapshot.totals.iter().find(|t| t.item == "Pliers").unwrap();
        assert_eq!(pliers.total, 5);
        assert_eq!(pliers.per_location["Club Room"], 3);
        assert_eq!(pliers.per_location["Airfield"], 2);
    }

    #[test]
    fn import_rows_skip_empty_stock_and_split_subcategory() {
        let mut snapshot = inventory_rows(&stocked());
        snapshot.rows[0].count = 4;
        let rows = to_import_rows(&snapshot.rows);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["subcategory"], "Propellers");
        assert_eq!(rows[0]["subsubcategory"], "New");
        assert_eq!(rows[0]["quantity"], 4);
    }

    #[test]
    fn log_rows_follow_book_order() {
        let mut logs = LogBook::default();
        let op = Operator::new("u1", "Kim");
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let addr = LeafAddress::new("Club Room", "Tools", "Repair");
        logs.append(&addr, "Pliers", 1, &op, now, Duration::hours(1));
        logs.append(&addr, "Pliers", -1, &op, now + Duration::minutes(1), Duration::hours(1));

        let rows = log_rows(&logs);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].change, -1);
        assert_eq!(rows[1].operator_name, "Kim");
        assert!(rows.iter().all(|row| row.reason == STOCK_REASON));
    }

    #[test]
    fn location_sums_saturate() {
        let mut mirror = InventoryMirror::from_schema();
        let repair = LeafAddress::new("Club Room", "Tools", "Repair");
        mirror.ensure_items(&repair).push(ItemRecord::new("Pliers", u64::MAX));
        mirror
            .ensure_items(&LeafAddress::new("Club Room", "Tools", "Screwdrivers"))
            .push(ItemRecord::new("Pliers", 5));

        let snapshot = inventory_rows(&mirror);
        let pliers = snapshot.totals.iter().find(|t| t.item == "Pliers").unwrap();
        assert_eq!(pliers.total, u64::MAX);
        assert_eq!(pliers.per_location["Club Room"], u64::MAX);
    }
}
