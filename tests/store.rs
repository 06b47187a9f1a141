//! Store and search behavior against a real SQLite database.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tempfile::TempDir;
use whereisit::config::Config;
use whereisit::error::{Entity, StoreError};
use whereisit::models::{NewBox, NewItem, NewUnit};
use whereisit::patch::{BoxPatch, Field, ItemPatch, UnitPatch};
use whereisit::slug::SlugGenerator;
use whereisit::store::Store;
use whereisit::{db, migrate};

// ─── Helpers ────────────────────────────────────────────────────────

async fn test_store() -> (TempDir, Store) {
    let tmp = TempDir::new().unwrap();
    let cfg = Config::minimal(tmp.path().join("inv.sqlite"));
    let pool = db::connect(&cfg).await.unwrap();
    migrate::migrate_pool(&pool).await.unwrap();
    (tmp, Store::new(pool))
}

/// Hands out a fixed sequence of slugs, then repeats the last one.
struct ScriptedSlugs(Mutex<VecDeque<String>>);

impl ScriptedSlugs {
    fn new(slugs: &[&str]) -> Self {
        Self(Mutex::new(slugs.iter().map(|s| s.to_string()).collect()))
    }
}

impl SlugGenerator for ScriptedSlugs {
    fn generate(&self) -> String {
        let mut queue = self.0.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }
}

fn unit(name: &str) -> NewUnit {
    NewUnit {
        name: name.to_string(),
        description: None,
    }
}

fn new_box(name: &str, unit_id: i64, slug: Option<&str>) -> NewBox {
    NewBox {
        name: name.to_string(),
        description: None,
        slug: slug.map(str::to_string),
        unit_id,
    }
}

async fn seed_box(store: &Store, unit_name: &str, box_name: &str) -> (i64, i64) {
    let u = store.create_unit(&unit(unit_name)).await.unwrap();
    let b = store.create_box(&new_box(box_name, u.id, None)).await.unwrap();
    (u.id, b.id)
}

// ─── Uniqueness ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_duplicate_unit_name_rejected() {
    let (_tmp, store) = test_store().await;

    store.create_unit(&unit("Garage")).await.unwrap();
    let err = store.create_unit(&unit("Garage")).await.unwrap_err();
    assert!(
        matches!(err, StoreError::DuplicateName(ref n) if n == "Garage"),
        "got {:?}",
        err
    );

    // Same failure every time the same invalid operation is attempted.
    let err = store.create_unit(&unit("Garage")).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateName(_)));
}

#[tokio::test]
async fn test_rename_unit_to_existing_name_rejected() {
    let (_tmp, store) = test_store().await;

    store.create_unit(&unit("Garage")).await.unwrap();
    let attic = store.create_unit(&unit("Attic")).await.unwrap();

    let patch = UnitPatch {
        name: Field::Present("Garage".to_string()),
        ..Default::default()
    };
    let err = store.update_unit(attic.id, &patch).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateName(_)));

    // Rolled back: the unit keeps its name.
    let detail = store.get_unit(attic.id).await.unwrap();
    assert_eq!(detail.unit.name, "Attic");
}

#[tokio::test]
async fn test_concurrent_duplicate_units_only_one_wins() {
    let (_tmp, store) = test_store().await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.create_unit(&unit("Basement")).await
        }));
    }

    let mut created = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(StoreError::DuplicateName(_)) => duplicates += 1,
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(duplicates, 7);
}

#[tokio::test]
async fn test_duplicate_slug_rejected() {
    let (_tmp, store) = test_store().await;
    let u = store.create_unit(&unit("Garage")).await.unwrap();

    store
        .create_box(&new_box("Shelf A", u.id, Some("shelf-a")))
        .await
        .unwrap();
    let err = store
        .create_box(&new_box("Shelf B", u.id, Some("shelf-a")))
        .await
        .unwrap_err();
    assert!(
        matches!(err, StoreError::DuplicateSlug(ref s) if s == "shelf-a"),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn test_update_box_to_taken_slug_rejected() {
    let (_tmp, store) = test_store().await;
    let u = store.create_unit(&unit("Garage")).await.unwrap();

    store
        .create_box(&new_box("Shelf A", u.id, Some("shelf-a")))
        .await
        .unwrap();
    let b = store
        .create_box(&new_box("Shelf B", u.id, Some("shelf-b")))
        .await
        .unwrap();

    let patch = BoxPatch {
        slug: Field::Present("shelf-a".to_string()),
        ..Default::default()
    };
    let err = store.update_box(b.id, &patch).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateSlug(_)));
    assert_eq!(store.get_box(b.id).await.unwrap().storage_box.slug, "shelf-b");
}

// ─── Referential integrity ──────────────────────────────────────────

#[tokio::test]
async fn test_box_with_missing_unit_rejected() {
    let (_tmp, store) = test_store().await;

    let err = store
        .create_box(&new_box("Orphan", 999, None))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            StoreError::ParentNotFound {
                entity: Entity::Unit,
                id: 999
            }
        ),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn test_item_with_missing_box_rejected() {
    let (_tmp, store) = test_store().await;

    let err = store
        .create_item(4242, &NewItem::named("Drill"))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            StoreError::ParentNotFound {
                entity: Entity::Box,
                id: 4242
            }
        ),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn test_move_box_to_missing_unit_rejected() {
    let (_tmp, store) = test_store().await;
    let (unit_id, box_id) = seed_box(&store, "Garage", "Shelf A").await;

    let patch = BoxPatch {
        unit_id: Field::Present(unit_id + 100),
        ..Default::default()
    };
    let err = store.update_box(box_id, &patch).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::ParentNotFound {
            entity: Entity::Unit,
            ..
        }
    ));
    assert_eq!(
        store.get_box(box_id).await.unwrap().storage_box.unit_id,
        unit_id
    );
}

#[tokio::test]
async fn test_move_item_between_boxes() {
    let (_tmp, store) = test_store().await;
    let (unit_id, from) = seed_box(&store, "Garage", "Shelf A").await;
    let to = store
        .create_box(&new_box("Shelf B", unit_id, None))
        .await
        .unwrap()
        .id;
    let item = store
        .create_item(from, &NewItem::named("Hammer"))
        .await
        .unwrap();

    let patch = ItemPatch {
        box_id: Field::Present(to),
        ..Default::default()
    };
    store.update_item(item.id, &patch).await.unwrap();

    assert!(store.get_box(from).await.unwrap().items.is_empty());
    assert_eq!(store.get_box(to).await.unwrap().items.len(), 1);

    let patch = ItemPatch {
        box_id: Field::Present(to + 50),
        ..Default::default()
    };
    let err = store.update_item(item.id, &patch).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::ParentNotFound {
            entity: Entity::Box,
            ..
        }
    ));
}

// ─── Partial updates ────────────────────────────────────────────────

#[tokio::test]
async fn test_partial_update_keeps_unnamed_fields() {
    let (_tmp, store) = test_store().await;
    let (_, box_id) = seed_box(&store, "Garage", "Tools").await;

    let item = store
        .create_item(
            box_id,
            &NewItem {
                name: "Wrench".to_string(),
                description: None,
                quantity: 3,
                category: Some("tools".to_string()),
                photo_path: None,
            },
        )
        .await
        .unwrap();

    let patch: ItemPatch = serde_json::from_value(json!({ "quantity": 5 })).unwrap();
    let updated = store.update_item(item.id, &patch).await.unwrap();

    assert_eq!(updated.name, "Wrench");
    assert_eq!(updated.quantity, 5);
    assert_eq!(updated.category.as_deref(), Some("tools"));

    // What was returned is what was persisted.
    assert_eq!(store.get_item(item.id).await.unwrap(), updated);
}

#[tokio::test]
async fn test_explicit_null_clears_nullable_field() {
    let (_tmp, store) = test_store().await;
    let u = store
        .create_unit(&NewUnit {
            name: "Garage".to_string(),
            description: Some("north wall".to_string()),
        })
        .await
        .unwrap();

    let patch: UnitPatch = serde_json::from_value(json!({ "description": null })).unwrap();
    let updated = store.update_unit(u.id, &patch).await.unwrap();
    assert_eq!(updated.name, "Garage");
    assert_eq!(updated.description, None);
}

#[tokio::test]
async fn test_update_missing_entities_not_found() {
    let (_tmp, store) = test_store().await;

    let err = store
        .update_unit(1, &UnitPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: Entity::Unit, .. }));

    let err = store.update_box(1, &BoxPatch::default()).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: Entity::Box, .. }));

    let err = store
        .update_item(1, &ItemPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: Entity::Item, .. }));
}

#[tokio::test]
async fn test_validation_errors() {
    let (_tmp, store) = test_store().await;

    let err = store.create_unit(&unit("   ")).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    let u = store.create_unit(&unit("Garage")).await.unwrap();
    let err = store
        .create_box(&new_box("Shelf", u.id, Some("has space")))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    let b = store.create_box(&new_box("Shelf", u.id, None)).await.unwrap();
    let mut bad = NewItem::named("Screws");
    bad.quantity = -1;
    let err = store.create_item(b.id, &bad).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    let patch = BoxPatch {
        name: Field::Present(String::new()),
        ..Default::default()
    };
    let err = store.update_box(b.id, &patch).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}

// ─── Defaults and eager loading ─────────────────────────────────────

#[tokio::test]
async fn test_default_quantity_is_one() {
    let (_tmp, store) = test_store().await;
    let (_, box_id) = seed_box(&store, "Garage", "Shelf A").await;

    let new: NewItem = serde_json::from_value(json!({ "name": "Tape" })).unwrap();
    let item = store.create_item(box_id, &new).await.unwrap();
    assert_eq!(item.quantity, 1);
}

#[tokio::test]
async fn test_get_box_returns_all_items_inline() {
    let (_tmp, store) = test_store().await;
    let (_, full) = seed_box(&store, "Garage", "Full").await;
    let (_, empty) = seed_box(&store, "Attic", "Empty").await;

    for name in ["Drill", "Saw", "Level"] {
        store
            .create_item(full, &NewItem::named(name))
            .await
            .unwrap();
    }

    let detail = store.get_box(full).await.unwrap();
    let names: Vec<&str> = detail.items.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["Drill", "Saw", "Level"]);

    let detail = store.get_box(empty).await.unwrap();
    assert!(detail.items.is_empty());
    let value = serde_json::to_value(&detail).unwrap();
    assert_eq!(value["items"], json!([]));
    assert_eq!(value["name"], "Empty");
}

#[tokio::test]
async fn test_get_box_by_slug() {
    let (_tmp, store) = test_store().await;
    let u = store.create_unit(&unit("Garage")).await.unwrap();
    let b = store
        .create_box(&new_box("Cables", u.id, Some("cables-01")))
        .await
        .unwrap();
    store
        .create_item(b.id, &NewItem::named("HDMI"))
        .await
        .unwrap();

    let detail = store.get_box_by_slug("cables-01").await.unwrap();
    assert_eq!(detail.storage_box.id, b.id);
    assert_eq!(detail.items.len(), 1);

    let err = store.get_box_by_slug("nope").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: Entity::Box, ref key } if key == "nope"));
}

#[tokio::test]
async fn test_get_unit_loads_boxes_and_items() {
    let (_tmp, store) = test_store().await;
    let (unit_id, a) = seed_box(&store, "Garage", "Shelf A").await;
    store
        .create_box(&new_box("Shelf B", unit_id, None))
        .await
        .unwrap();
    store.create_item(a, &NewItem::named("Drill")).await.unwrap();

    let detail = store.get_unit(unit_id).await.unwrap();
    assert_eq!(detail.boxes.len(), 2);
    assert_eq!(detail.boxes[0].items.len(), 1);
    assert!(detail.boxes[1].items.is_empty());

    let err = store.get_unit(unit_id + 1).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: Entity::Unit, .. }));
}

#[tokio::test]
async fn test_list_units_paginates() {
    let (_tmp, store) = test_store().await;
    for name in ["A", "B", "C", "D"] {
        let u = store.create_unit(&unit(name)).await.unwrap();
        let b = store
            .create_box(&new_box(&format!("{} box", name), u.id, None))
            .await
            .unwrap();
        store
            .create_item(b.id, &NewItem::named(format!("{} thing", name)))
            .await
            .unwrap();
    }

    let page = store.list_units(1, 2).await.unwrap();
    let names: Vec<&str> = page.iter().map(|u| u.unit.name.as_str()).collect();
    assert_eq!(names, vec!["B", "C"]);
    for detail in &page {
        assert_eq!(detail.boxes.len(), 1);
        assert_eq!(detail.boxes[0].items.len(), 1);
        assert_eq!(detail.boxes[0].storage_box.unit_id, detail.unit.id);
    }

    assert!(store.list_units(10, 5).await.unwrap().is_empty());
    assert!(matches!(
        store.list_units(-1, 5).await.unwrap_err(),
        StoreError::Validation(_)
    ));

    let boxes = store.list_boxes(0, 3).await.unwrap();
    assert_eq!(boxes.len(), 3);
    assert!(boxes.iter().all(|b| b.items.len() == 1));
}

// ─── Slugs ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_generated_slugs_are_distinct() {
    let (_tmp, store) = test_store().await;
    let u = store.create_unit(&unit("Garage")).await.unwrap();

    let mut slugs = HashSet::new();
    for i in 0..10 {
        let b = store
            .create_box(&new_box(&format!("Box {}", i), u.id, None))
            .await
            .unwrap();
        assert!(!b.slug.is_empty());
        slugs.insert(b.slug);
    }
    assert_eq!(slugs.len(), 10);

    // An empty slug counts as omitted.
    let b = store
        .create_box(&new_box("Blank", u.id, Some("")))
        .await
        .unwrap();
    assert!(!b.slug.is_empty());
}

#[tokio::test]
async fn test_generated_slug_collision_is_retried() {
    let (_tmp, store) = test_store().await;
    let store = Store::with_slug_generator(
        store.pool().clone(),
        Arc::new(ScriptedSlugs::new(&["taken", "taken", "fresh"])),
    );
    let u = store.create_unit(&unit("Garage")).await.unwrap();
    store
        .create_box(&new_box("First", u.id, Some("taken")))
        .await
        .unwrap();

    let b = store.create_box(&new_box("Second", u.id, None)).await.unwrap();
    assert_eq!(b.slug, "fresh");
}

#[tokio::test]
async fn test_generated_slug_gives_up_after_retries() {
    let (_tmp, store) = test_store().await;
    let store = Store::with_slug_generator(
        store.pool().clone(),
        Arc::new(ScriptedSlugs::new(&["taken"])),
    );
    let u = store.create_unit(&unit("Garage")).await.unwrap();
    store
        .create_box(&new_box("First", u.id, Some("taken")))
        .await
        .unwrap();

    let err = store
        .create_box(&new_box("Second", u.id, None))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateSlug(_)));
}

// ─── Deletes ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_delete_missing_item_reports_not_found_every_time() {
    let (_tmp, store) = test_store().await;

    for _ in 0..2 {
        let err = store.delete_item(77).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: Entity::Item, .. }));
    }
}

#[tokio::test]
async fn test_delete_item_then_again() {
    let (_tmp, store) = test_store().await;
    let (_, box_id) = seed_box(&store, "Garage", "Shelf").await;
    let item = store
        .create_item(box_id, &NewItem::named("Glue"))
        .await
        .unwrap();

    let removed = store.delete_item(item.id).await.unwrap();
    assert_eq!(removed, item);
    assert!(matches!(
        store.delete_item(item.id).await.unwrap_err(),
        StoreError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_delete_box_removes_its_items() {
    let (_tmp, store) = test_store().await;
    let (_, box_id) = seed_box(&store, "Garage", "Shelf").await;
    let item = store
        .create_item(box_id, &NewItem::named("Glue"))
        .await
        .unwrap();

    store.delete_box(box_id).await.unwrap();
    assert!(matches!(
        store.get_item(item.id).await.unwrap_err(),
        StoreError::NotFound { .. }
    ));
    assert!(matches!(
        store.delete_box(box_id).await.unwrap_err(),
        StoreError::NotFound { .. }
    ));
}

#[tokio::test]
async fn test_delete_unit_cascades_to_boxes_and_items() {
    let (_tmp, store) = test_store().await;
    let (unit_id, box_id) = seed_box(&store, "Garage", "Shelf").await;
    let item = store
        .create_item(box_id, &NewItem::named("Glue"))
        .await
        .unwrap();
    let (other_unit, other_box) = seed_box(&store, "Attic", "Winter clothes").await;

    let removed = store.delete_unit(unit_id).await.unwrap();
    assert_eq!(removed.name, "Garage");

    assert!(matches!(
        store.get_box(box_id).await.unwrap_err(),
        StoreError::NotFound { .. }
    ));
    assert!(matches!(
        store.get_item(item.id).await.unwrap_err(),
        StoreError::NotFound { .. }
    ));

    // Other units are untouched.
    assert_eq!(store.get_unit(other_unit).await.unwrap().boxes.len(), 1);
    store.get_box(other_box).await.unwrap();
}

// ─── Search ─────────────────────────────────────────────────────────

async fn seed_search(store: &Store) {
    let u = store.create_unit(&unit("Garage")).await.unwrap();
    let shelf = store
        .create_box(&new_box("Garage Shelf A", u.id, None))
        .await
        .unwrap();
    let bin = store
        .create_box(&new_box("Red bin", u.id, None))
        .await
        .unwrap();
    store
        .create_item(shelf.id, &NewItem::named("Hammer"))
        .await
        .unwrap();
    let mut drill = NewItem::named("Drill");
    drill.category = Some("Power Tools".to_string());
    store.create_item(bin.id, &drill).await.unwrap();
    store
        .create_item(bin.id, &NewItem::named("100% cotton rag"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_search_matches_box_name_case_insensitively() {
    let (_tmp, store) = test_store().await;
    seed_search(&store).await;

    let results = store.search("garage").await.unwrap();
    assert_eq!(results.boxes.len(), 1);
    assert_eq!(results.boxes[0].storage_box.name, "Garage Shelf A");
    assert_eq!(results.boxes[0].items.len(), 1);
    assert_eq!(results.boxes[0].items[0].name, "Hammer");
    assert!(results.items.is_empty());
}

#[tokio::test]
async fn test_search_matches_item_category() {
    let (_tmp, store) = test_store().await;
    seed_search(&store).await;

    let results = store.search("power").await.unwrap();
    assert!(results.boxes.is_empty());
    assert_eq!(results.items.len(), 1);
    assert_eq!(results.items[0].item.name, "Drill");
    assert_eq!(results.items[0].storage_box.name, "Red bin");

    let value = serde_json::to_value(&results).unwrap();
    assert_eq!(value["items"][0]["box"]["name"], "Red bin");
    assert_eq!(value["items"][0]["category"], "Power Tools");
}

#[tokio::test]
async fn test_search_without_matches_is_empty() {
    let (_tmp, store) = test_store().await;
    seed_search(&store).await;

    let results = store.search("xyz123").await.unwrap();
    assert!(results.boxes.is_empty());
    assert!(results.items.is_empty());

    let results = store.search("   ").await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_search_wildcards_match_literally() {
    let (_tmp, store) = test_store().await;
    seed_search(&store).await;

    let results = store.search("0%").await.unwrap();
    assert_eq!(results.items.len(), 1);
    assert_eq!(results.items[0].item.name, "100% cotton rag");

    // `_` would match any single character if it were not escaped.
    assert!(store.search("d_ill").await.unwrap().is_empty());
}
