//! Substring search over boxes and items.
//!
//! Boxes match on their name, items on their name or category. Matching is
//! a case-insensitive substring test performed by SQLite `LIKE`; wildcard
//! characters in the query are escaped so they only match themselves.
//! SQLite folds ASCII letters only, so `"GARAGE"` finds `"Garage"` but
//! `"ÄPFEL"` does not find `"äpfel"`.
//!
//! A blank query returns no results rather than everything.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;
use crate::error::StoreResult;
use crate::models::{Item, ItemWithBox, SearchResults, StorageBox};
use crate::store::{attach_items, box_from_row, item_from_row, Store, BOX_COLUMNS, ITEM_COLUMNS};

impl Store {
    /// Finds boxes whose name, and items whose name or category, contain
    /// `query`. Matched boxes carry all their items; matched items carry
    /// their box. Both lists are ordered by id.
    pub async fn search(&self, query: &str) -> StoreResult<SearchResults> {
        if query.trim().is_empty() {
            return Ok(SearchResults::default());
        }

        let pattern = like_pattern(query);
        let mut tx = self.pool().begin().await?;

        let boxes: Vec<StorageBox> = sqlx::query(&format!(
            r"SELECT {} FROM storage_boxes WHERE name LIKE ? ESCAPE '\' ORDER BY id",
            BOX_COLUMNS
        ))
        .bind(&pattern)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(box_from_row)
        .collect();

        let box_items: Vec<Item> = sqlx::query(&format!(
            r"SELECT {} FROM items WHERE box_id IN
              (SELECT id FROM storage_boxes WHERE name LIKE ? ESCAPE '\') ORDER BY id",
            ITEM_COLUMNS
        ))
        .bind(&pattern)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(item_from_row)
        .collect();

        let items: Vec<ItemWithBox> = sqlx::query(
            r"SELECT i.id, i.name, i.description, i.quantity, i.category, i.photo_path, i.box_id,
                     b.slug AS box_slug, b.name AS box_name,
                     b.description AS box_description, b.unit_id AS box_unit_id
              FROM items i
              JOIN storage_boxes b ON b.id = i.box_id
              WHERE i.name LIKE ?1 ESCAPE '\' OR i.category LIKE ?1 ESCAPE '\'
              ORDER BY i.id",
        )
        .bind(&pattern)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|row| {
            let item = item_from_row(row);
            let storage_box = StorageBox {
                id: item.box_id,
                slug: row.get("box_slug"),
                name: row.get("box_name"),
                description: row.get("box_description"),
                unit_id: row.get("box_unit_id"),
            };
            ItemWithBox { item, storage_box }
        })
        .collect();

        tx.commit().await?;

        Ok(SearchResults {
            boxes: attach_items(boxes, box_items),
            items,
        })
    }
}

/// Wraps `query` in `%…%` after escaping `\`, `%` and `_`.
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// CLI entry point: searches and prints matches to stdout.
pub async fn run_search(config: &Config, query: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = Store::new(pool.clone());
    let results = store.search(query).await?;
    pool.close().await;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    if !results.boxes.is_empty() {
        println!("--- Boxes ({}) ---", results.boxes.len());
        for detail in &results.boxes {
            let b = &detail.storage_box;
            println!("[{}] {}  (slug: {})", b.id, b.name, b.slug);
            println!("    items: {}", detail.items.len());
        }
        println!();
    }

    if !results.items.is_empty() {
        println!("--- Items ({}) ---", results.items.len());
        for hit in &results.items {
            let item = &hit.item;
            println!(
                "[{}] {} x{}  in {}",
                item.id, item.name, item.quantity, hit.storage_box.name
            );
            if let Some(ref category) = item.category {
                println!("    category: {}", category);
            }
        }
    }

    Ok(())
}
