mod common;

use assert_matches::assert_matches;
use common::{new_propellers, repair, start_time, TestClient};
use inventory_sync::prelude::*;
use inventory_sync::remote::InMemoryRemoteTree;
use inventory_sync::schema::SCHEMA;

fn add(location: &str, name: &str, count: u64) -> AddItemCommand {
    AddItemCommand {
        location: location.into(),
        category: "Consumables".into(),
        subcategory: "Propellers".into(),
        subcategory2: Some("New".into()),
        name: name.into(),
        initial_count: count,
    }
}

#[tokio::test]
async fn added_item_appears_everywhere_with_count_only_at_target() {
    let remote = InMemoryRemoteTree::new();
    let mut client = TestClient::new(&remote).await;
    client.run(add("Airfield", "5inch", 12)).await;

    for location in SCHEMA.locations {
        let items = client.items(&new_propellers(location));
        assert_eq!(items.len(), 1, "{location}");
        assert_eq!(items[0].count, if *location == "Airfield" { 12 } else { 0 });
    }
    let pushed = remote.snapshot("inventory").expect("inventory written");
    assert_eq!(pushed["Airfield"]["Consumables"]["Propellers"]["New"][0]["count"], 12);
}

#[tokio::test]
async fn duplicate_add_is_rejected_without_mutation_or_write() {
    let remote = InMemoryRemoteTree::new();
    let mut client = TestClient::new(&remote).await;
    client.run(add("Airfield", "5inch", 1)).await;
    let writes = remote.write_count();
    let before = client.service.mirror().clone();

    let result = client.service.execute(&mut client.session, &add("Faculty Office", "5inch", 3)).await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));
    assert_eq!(client.service.mirror(), &before);
    assert_eq!(remote.write_count(), writes);
}

#[tokio::test]
async fn rename_propagates_across_locations_on_the_same_path_only() {
    let remote = InMemoryRemoteTree::new();
    let mut client = TestClient::new(&remote).await;
    client.run(add("Club Room", "5inch", 2)).await;
    client
        .run(AddItemCommand {
            location: "Club Room".into(),
            category: "Consumables".into(),
            subcategory: "Propellers".into(),
            subcategory2: Some("Used".into()),
            name: "5inch".into(),
            initial_count: 1,
        })
        .await;

    let renamed = client
        .run(RenameItemCommand {
            address: new_propellers("Airfield"),
            index: 0,
            new_name: "5inch tri-blade".into(),
        })
        .await
        .expect("renamed");
    assert_eq!(renamed.renamed, SCHEMA.locations.len());

    for location in SCHEMA.locations {
        assert_eq!(client.items(&new_propellers(location))[0].name, "5inch tri-blade");
        let used = LeafAddress::new(*location, "Consumables", "Propellers").with_subcategory2("Used");
        assert_eq!(client.items(&used)[0].name, "5inch");
    }
}

#[tokio::test]
async fn delete_by_name_sums_every_location_into_one_entry() {
    let remote = InMemoryRemoteTree::new();
    let mut client = TestClient::new(&remote).await;
    client.run(add("Club Room", "5inch", 2)).await;
    client
        .run(AdjustQuantityCommand {
            address: new_propellers("Airfield"),
            index: 0,
            delta: 3,
        })
        .await;

    let deleted = client
        .run(DeleteItemCommand { name: "5inch".into() })
        .await;
    assert_eq!(deleted.removed_total, 5);
    assert_eq!(deleted.leaves, SCHEMA.locations.len());
    assert_eq!(client.service.mirror().item_count(), 0);

    let entry = &client.service.logs().entries()[0];
    assert_eq!(entry.location, "All Locations");
    assert_eq!(entry.change, -5);

    let missing = client
        .service
        .execute(&mut client.session, &DeleteItemCommand { name: "5inch".into() })
        .await;
    assert_matches!(missing, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn viewers_cannot_mutate() {
    let remote = InMemoryRemoteTree::new();
    let mut client = TestClient::new(&remote).await;
    let mut viewer = Session::login("u-9", "Guest", Role::Viewer, start_time());

    let result = client.service.execute(&mut viewer, &add("Airfield", "5inch", 1)).await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));
    assert_eq!(client.service.mirror().item_count(), 0);
    assert_eq!(remote.write_count(), 0);
}

#[tokio::test]
async fn idle_session_is_refused() {
    let remote = InMemoryRemoteTree::new();
    let mut client = TestClient::new(&remote).await;
    client.service.set_idle_timeout(chrono::Duration::minutes(10));
    client.run(add("Airfield", "5inch", 1)).await;
    let writes = remote.write_count();

    client.advance(10);
    let result = client.service.execute(&mut client.session, &add("Airfield", "4inch", 1)).await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));
    assert!(client.items(&new_propellers("Airfield")).iter().all(|i| i.name != "4inch"));
    assert_eq!(remote.write_count(), writes);
}

#[tokio::test]
async fn note_edit_and_quantity_floor() {
    let remote = InMemoryRemoteTree::new();
    let mut client = TestClient::new(&remote).await;
    client
        .run(AddItemCommand {
            location: "Club Room".into(),
            category: "Tools".into(),
            subcategory: "Repair".into(),
            subcategory2: None,
            name: "Pliers".into(),
            initial_count: 1,
        })
        .await;

    assert!(
        client
            .run(EditNoteCommand {
                address: repair("Club Room"),
                index: 0,
                note: "drawer 2".into(),
            })
            .await
    );
    let change = client
        .run(AdjustQuantityCommand {
            address: repair("Club Room"),
            index: 0,
            delta: -10,
        })
        .await
        .expect("item exists");
    assert_eq!(change.current, 0);

    let item = &client.items(&repair("Club Room"))[0];
    assert_eq!(item.note.as_deref(), Some("drawer 2"));
    assert_eq!(client.items(&repair("Airfield"))[0].note, None);
}
