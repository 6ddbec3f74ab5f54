//! Store behavior against a live database.
//!
//! Runs only when `TEST_DATABASE_URL` points at a scratch Postgres database;
//! every test returns early otherwise. Rows are keyed by a fresh uuid so the
//! tests can share one database and run in parallel.

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use uuid::Uuid;

use stockflow_core::{DomainError, LifecycleItemId};
use stockflow_infra::store::{
    InventoryRepository, LifecycleRepository, OrderRepository, ToolRepository,
};
use stockflow_infra::{PostgresStore, StoreError};
use stockflow_inventory::{NewInventoryItem, OrderUpsert, ToolInput, UpsertAction};
use stockflow_lifecycle::{
    Installation, LifecycleDetails, LifecycleStatus, NewLifecycleItem, PhotoSet,
};

async fn store() -> Option<PostgresStore> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let store = PostgresStore::connect(&url).await.unwrap();
    store.migrate().await.unwrap();
    Some(store)
}

fn now() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 14, 9, 0, 0).unwrap()
}

fn tag() -> String {
    Uuid::now_v7().simple().to_string()
}

fn batch(client: &str) -> NewLifecycleItem {
    NewLifecycleItem {
        details: LifecycleDetails {
            product: "Volet roulant".to_string(),
            supplier: "Bubendorff".to_string(),
            client: client.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        },
        photos: PhotoSet::new(Some("uploads/p.jpg".into()), vec!["uploads/a.jpg".into()]),
    }
}

fn is_conflict(err: &StoreError) -> bool {
    matches!(err, StoreError::Domain(DomainError::Conflict(_)))
}

fn is_not_found(err: &StoreError) -> bool {
    matches!(err, StoreError::Domain(DomainError::NotFound { .. }))
}

#[tokio::test]
async fn intake_is_deduplicated_by_the_received_index() {
    let Some(store) = store().await else { return };
    let client = tag();

    let first = store.intake(batch(&client), now()).await.unwrap();
    let again = store.intake(batch(&client), now()).await.unwrap();
    assert!(!first.is_duplicate());
    assert!(again.is_duplicate());
    assert_eq!(again.item().id, first.item().id);

    // Editing another received record onto the same fields hits the index.
    let other = store.intake(batch(&tag()), now()).await.unwrap();
    let err = store
        .edit_details(other.item().id, batch(&client).details)
        .await
        .unwrap_err();
    assert!(is_conflict(&err), "unexpected error: {err:?}");
}

#[tokio::test]
async fn install_is_guarded_on_the_received_status() {
    let Some(store) = store().await else { return };
    let id = store.intake(batch(&tag()), now()).await.unwrap().item().id;

    let moved = store
        .install(id, &Installation::default(), now())
        .await
        .unwrap();
    assert_eq!(moved.after.status, LifecycleStatus::Installed);
    assert_eq!(moved.after.received_id, Some(id));

    let err = store
        .install(id, &Installation::default(), now())
        .await
        .unwrap_err();
    assert!(is_not_found(&err));

    let err = store.mark_defective(id, now()).await.unwrap_err();
    assert!(is_not_found(&err));
}

#[tokio::test]
async fn concurrent_installs_commit_once() {
    let Some(store) = store().await else { return };
    let store = Arc::new(store);
    let id: LifecycleItemId = store.intake(batch(&tag()), now()).await.unwrap().item().id;

    let a = {
        let store = store.clone();
        tokio::spawn(async move { store.install(id, &Installation::default(), now()).await })
    };
    let b = {
        let store = store.clone();
        tokio::spawn(async move { store.install(id, &Installation::default(), now()).await })
    };
    let (a, b) = tokio::join!(a, b);
    let results = [a.unwrap(), b.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(is_not_found)
    );
}

#[tokio::test]
async fn order_upsert_keeps_one_row_per_item() {
    let Some(store) = store().await else { return };
    let item = store
        .create_item(
            NewInventoryItem {
                material: format!("Moteur {}", tag()),
                supplier: "Somfy".to_string(),
                category: "Motorisation".to_string(),
                stock: 2,
                threshold: 5,
                price: None,
            },
            now(),
        )
        .await
        .unwrap()
        .item;

    let upsert = OrderUpsert {
        inventory_id: item.id,
        quantity: None,
    };
    let (created, action) = store.upsert_order(upsert, now()).await.unwrap();
    assert_eq!(action, UpsertAction::Created);
    assert_eq!(created.ordered_quantity, 13);

    store.deactivate_order(item.id).await.unwrap();
    let (updated, action) = store
        .upsert_order(
            OrderUpsert {
                quantity: Some(4),
                ..upsert
            },
            now(),
        )
        .await
        .unwrap();
    assert_eq!(action, UpsertAction::Updated);
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.ordered_quantity, 4);
    assert!(updated.is_ordered);

    store.delete_item(item.id).await.unwrap();
    assert!(store.get_order(item.id).await.unwrap().is_none());
}

#[tokio::test]
async fn tools_keep_name_and_supplier_unique() {
    let Some(store) = store().await else { return };
    let name = tag();
    let input = |name: &str, quantity| ToolInput {
        name: name.to_string(),
        supplier: "Makita".to_string(),
        quantity,
    };

    let first = store.create_tool(input(&name, 1)).await.unwrap();
    let again = store.create_tool(input(&name, 9)).await.unwrap();
    assert!(again.is_duplicate());
    assert_eq!(again.tool().id, first.tool().id);
    assert_eq!(again.tool().quantity, 1);

    let other = store.create_tool(input(&tag(), 1)).await.unwrap();
    let err = store
        .update_tool(other.tool().id, input(&name, 1))
        .await
        .unwrap_err();
    assert!(is_conflict(&err));

    assert!(store.delete_tool(other.tool().id).await.unwrap());
    assert!(!store.delete_tool(other.tool().id).await.unwrap());
}
