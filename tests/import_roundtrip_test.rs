mod common;

use common::TestClient;
use inventory_sync::models::InventoryMirror;
use inventory_sync::prelude::*;
use inventory_sync::remote::InMemoryRemoteTree;
use inventory_sync::services::canonicalizer::Canonicalizer;
use inventory_sync::services::export::{inventory_rows, to_import_rows};
use inventory_sync::services::import::{reconcile, ImportRow};
use serde_json::{json, Value};

fn rows(values: Vec<Value>) -> Vec<ImportRow> {
    values
        .into_iter()
        .filter_map(|v| v.as_object().cloned())
        .collect()
}

fn spreadsheet() -> Vec<ImportRow> {
    rows(vec![
        json!({"Location": "club room", "Category": "consumables", "Sub Category": "propellors/new", "Item Name": "5inch", "Qty": "12"}),
        json!({"Location": "Airfield", "Category": "Consumables", "Sub Category": "Batteries", "Sub2": "Airframe", "Item Name": "4S 1500", "Qty": 6, "Notes": "n/a"}),
        json!({"Location": "Faculty Room", "Category": "Drone Controls", "Sub Category": "FC", "Item Name": "F7", "Qty": 2}),
        json!({"Location": "Club Room", "Category": "Tools", "Sub Category": "Soldering Supplies", "Item Name": "Flux", "Qty": 1, "Notes": "leaded"}),
        json!({"Location": "Club Room", "Category": "Tools", "Sub Category": "Soldering Supplies", "Item Name": "Flux", "Qty": 2}),
        json!({"Location": "Attic", "Category": "Tools", "Sub Category": "Repair", "Item Name": "Hammer", "Qty": 1}),
        json!({"Location": "Club Room", "Category": "Tools", "Sub Category": "Repair", "Item Name": "Hammer", "Qty": -1}),
    ])
}

#[tokio::test]
async fn import_applies_valid_rows_without_logging() {
    let remote = InMemoryRemoteTree::new();
    let mut client = TestClient::new(&remote).await;

    let summary = client
        .run(ImportRowsCommand { rows: spreadsheet(), mode: ImportMode::Merge })
        .await;
    assert_eq!(summary.applied, 5);
    assert_eq!(summary.added, 4);
    assert_eq!(summary.increased, 1);
    assert_eq!(summary.rejected, 2);
    assert!(client.service.logs().is_empty());

    let flux = &client.items(&LeafAddress::new("Club Room", "Tools", "Soldering Supplies"))[0];
    assert_eq!(flux.count, 3);
    assert_eq!(flux.note.as_deref(), Some("leaded"));
    let fc = LeafAddress::new("Faculty Office", "Drone Control", "FC");
    assert_eq!(client.items(&fc)[0].name, "F7");
    assert!(remote.snapshot("inventory").is_some());
}

#[tokio::test]
async fn exported_snapshot_reimports_to_the_same_counts() {
    let (original, summary) = reconcile(
        &InventoryMirror::from_schema(),
        &spreadsheet(),
        ImportMode::Merge,
        &Canonicalizer::default(),
    );
    assert!(summary.applied > 0);

    let exported = inventory_rows(&original);
    let (restored, summary) = reconcile(
        &InventoryMirror::from_schema(),
        &to_import_rows(&exported.rows),
        ImportMode::Merge,
        &Canonicalizer::default(),
    );

    assert_eq!(summary.rejected, 0);
    assert_eq!(summary.applied, exported.rows.len());
    assert_eq!(inventory_rows(&restored), exported);
}

#[tokio::test]
async fn reset_import_replaces_everything() {
    let remote = InMemoryRemoteTree::new();
    let mut client = TestClient::new(&remote).await;
    client
        .run(ImportRowsCommand { rows: spreadsheet(), mode: ImportMode::Merge })
        .await;

    let summary = client
        .run(ImportRowsCommand {
            rows: rows(vec![json!({"location": "Airfield", "category": "Tools", "subcategory": "Repair", "item": "Wrench", "quantity": 1})]),
            mode: ImportMode::Reset,
        })
        .await;
    assert_eq!(summary.applied, 1);
    assert_eq!(client.service.mirror().item_count(), 1);
}
