//! SQLite-backed entity store for units, boxes and items.
//!
//! [`Store`] is a cheap-to-clone handle over a [`SqlitePool`]. It holds no
//! entity state of its own: every read goes to the database and every value
//! it returns is a detached copy.
//!
//! # Operations
//!
//! | Entity | Create | Read | Update | Delete |
//! |--------|--------|------|--------|--------|
//! | Unit | [`create_unit`](Store::create_unit) | [`get_unit`](Store::get_unit), [`list_units`](Store::list_units) | [`update_unit`](Store::update_unit) | [`delete_unit`](Store::delete_unit) |
//! | Box | [`create_box`](Store::create_box) | [`get_box`](Store::get_box), [`get_box_by_slug`](Store::get_box_by_slug), [`list_boxes`](Store::list_boxes) | [`update_box`](Store::update_box) | [`delete_box`](Store::delete_box) |
//! | Item | [`create_item`](Store::create_item) | [`get_item`](Store::get_item) | [`update_item`](Store::update_item) | [`delete_item`](Store::delete_item) |
//!
//! Text search lives in [`crate::search`].
//!
//! # Integrity
//!
//! Unit names and box slugs are unique, and parents must exist. Both are
//! enforced by the schema (`UNIQUE`, `FOREIGN KEY`) and the resulting
//! constraint failures are translated into [`StoreError`] variants. Deleting
//! a unit deletes its boxes; deleting a box deletes its items.
//!
//! # Atomicity
//!
//! Creates and deletes are single statements. Updates and nested reads run
//! inside one transaction, which rolls back if the future is dropped.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::error::{violation, Entity, StoreError, StoreResult, Violation};
use crate::models::{
    BoxDetail, Item, NewBox, NewItem, NewUnit, StorageBox, StorageUnit, UnitDetail,
};
use crate::patch::{apply_patch, BoxPatch, Field, ItemPatch, UnitPatch};
use crate::slug::{choose_slug, validate_slug, SlugChoice, SlugGenerator, UuidSlugGenerator};

pub(crate) const UNIT_COLUMNS: &str = "id, name, description";
pub(crate) const BOX_COLUMNS: &str = "id, slug, name, description, unit_id";
pub(crate) const ITEM_COLUMNS: &str =
    "id, name, description, quantity, category, photo_path, box_id";

/// Attempts made to insert a box with a generated slug before giving up.
const GENERATED_SLUG_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    slugs: Arc<dyn SlugGenerator>,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_slug_generator(pool, Arc::new(UuidSlugGenerator))
    }

    pub fn with_slug_generator(pool: SqlitePool, slugs: Arc<dyn SlugGenerator>) -> Self {
        Self { pool, slugs }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ============ Units ============

    pub async fn create_unit(&self, new: &NewUnit) -> StoreResult<StorageUnit> {
        require_text("name", &new.name)?;

        let row = sqlx::query(&format!(
            "INSERT INTO storage_units (name, description) VALUES (?, ?) RETURNING {}",
            UNIT_COLUMNS
        ))
        .bind(&new.name)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Constraints {
                unit_name: Some(new.name.as_str()),
                ..Default::default()
            }
            .translate(e)
        })?;

        Ok(unit_from_row(&row))
    }

    /// Returns the unit with all of its boxes and their items.
    pub async fn get_unit(&self, id: i64) -> StoreResult<UnitDetail> {
        let mut tx = self.pool.begin().await?;

        let unit = sqlx::query(&format!(
            "SELECT {} FROM storage_units WHERE id = ?",
            UNIT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| unit_from_row(&row))
        .ok_or_else(|| StoreError::not_found(Entity::Unit, id))?;

        let boxes = fetch_boxes(
            &mut tx,
            &format!(
                "SELECT {} FROM storage_boxes WHERE unit_id = ? ORDER BY id",
                BOX_COLUMNS
            ),
            id,
        )
        .await?;
        let items = fetch_items(
            &mut tx,
            &format!(
                "SELECT {} FROM items WHERE box_id IN \
                 (SELECT id FROM storage_boxes WHERE unit_id = ?) ORDER BY id",
                ITEM_COLUMNS
            ),
            id,
        )
        .await?;

        tx.commit().await?;

        Ok(UnitDetail {
            unit,
            boxes: attach_items(boxes, items),
        })
    }

    /// Lists units ordered by id, each with its boxes and their items.
    pub async fn list_units(&self, offset: i64, limit: i64) -> StoreResult<Vec<UnitDetail>> {
        check_page(offset, limit)?;
        let mut tx = self.pool.begin().await?;

        let units: Vec<StorageUnit> = sqlx::query(&format!(
            "SELECT {} FROM storage_units ORDER BY id LIMIT ? OFFSET ?",
            UNIT_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(unit_from_row)
        .collect();

        let page = "SELECT id FROM storage_units ORDER BY id LIMIT ? OFFSET ?";
        let boxes: Vec<StorageBox> = sqlx::query(&format!(
            "SELECT {} FROM storage_boxes WHERE unit_id IN ({}) ORDER BY id",
            BOX_COLUMNS, page
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(box_from_row)
        .collect();

        let items: Vec<Item> = sqlx::query(&format!(
            "SELECT {} FROM items WHERE box_id IN \
             (SELECT id FROM storage_boxes WHERE unit_id IN ({})) ORDER BY id",
            ITEM_COLUMNS, page
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(item_from_row)
        .collect();

        tx.commit().await?;

        Ok(attach_boxes(units, attach_items(boxes, items)))
    }

    pub async fn update_unit(&self, id: i64, patch: &UnitPatch) -> StoreResult<StorageUnit> {
        if let Field::Present(name) = &patch.name {
            require_text("name", name)?;
        }

        let mut tx = self.pool.begin().await?;
        lock_row(&mut tx, "storage_units", Entity::Unit, id).await?;

        let current = sqlx::query(&format!(
            "SELECT {} FROM storage_units WHERE id = ?",
            UNIT_COLUMNS
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        let updated = apply_patch(unit_from_row(&current), patch);

        sqlx::query("UPDATE storage_units SET name = ?, description = ? WHERE id = ?")
            .bind(&updated.name)
            .bind(&updated.description)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                Constraints {
                    unit_name: Some(updated.name.as_str()),
                    ..Default::default()
                }
                .translate(e)
            })?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Deletes a unit together with its boxes and their items.
    pub async fn delete_unit(&self, id: i64) -> StoreResult<StorageUnit> {
        let row = sqlx::query(&format!(
            "DELETE FROM storage_units WHERE id = ? RETURNING {}",
            UNIT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(Entity::Unit, id))?;

        Ok(unit_from_row(&row))
    }

    // ============ Boxes ============

    /// Creates a box in an existing unit.
    ///
    /// A non-empty `slug` is used verbatim; otherwise one is generated. A
    /// generated slug that happens to collide is replaced and retried.
    pub async fn create_box(&self, new: &NewBox) -> StoreResult<StorageBox> {
        require_text("name", &new.name)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let slug = choose_slug(new.slug.as_deref(), self.slugs.as_ref())?;

            match self.insert_box(new, &slug).await {
                Err(StoreError::DuplicateSlug(_))
                    if slug.is_generated() && attempt < GENERATED_SLUG_ATTEMPTS =>
                {
                    continue
                }
                result => return result,
            }
        }
    }

    async fn insert_box(&self, new: &NewBox, slug: &SlugChoice) -> StoreResult<StorageBox> {
        let row = sqlx::query(&format!(
            "INSERT INTO storage_boxes (slug, name, description, unit_id) \
             VALUES (?, ?, ?, ?) RETURNING {}",
            BOX_COLUMNS
        ))
        .bind(slug.as_str())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.unit_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Constraints {
                box_slug: Some(slug.as_str()),
                parent: Some((Entity::Unit, new.unit_id)),
                ..Default::default()
            }
            .translate(e)
        })?;

        Ok(box_from_row(&row))
    }

    /// Returns the box with all of its items.
    pub async fn get_box(&self, id: i64) -> StoreResult<BoxDetail> {
        let mut tx = self.pool.begin().await?;

        let storage_box = sqlx::query(&format!(
            "SELECT {} FROM storage_boxes WHERE id = ?",
            BOX_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| box_from_row(&row))
        .ok_or_else(|| StoreError::not_found(Entity::Box, id))?;

        let detail = load_box_detail(&mut tx, storage_box).await?;
        tx.commit().await?;
        Ok(detail)
    }

    /// Returns the box addressed by `slug` with all of its items.
    pub async fn get_box_by_slug(&self, slug: &str) -> StoreResult<BoxDetail> {
        let mut tx = self.pool.begin().await?;

        let storage_box = sqlx::query(&format!(
            "SELECT {} FROM storage_boxes WHERE slug = ?",
            BOX_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| box_from_row(&row))
        .ok_or_else(|| StoreError::not_found(Entity::Box, slug))?;

        let detail = load_box_detail(&mut tx, storage_box).await?;
        tx.commit().await?;
        Ok(detail)
    }

    /// Lists boxes ordered by id, each with its items.
    pub async fn list_boxes(&self, offset: i64, limit: i64) -> StoreResult<Vec<BoxDetail>> {
        check_page(offset, limit)?;
        let mut tx = self.pool.begin().await?;

        let boxes: Vec<StorageBox> = sqlx::query(&format!(
            "SELECT {} FROM storage_boxes ORDER BY id LIMIT ? OFFSET ?",
            BOX_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(box_from_row)
        .collect();

        let items: Vec<Item> = sqlx::query(&format!(
            "SELECT {} FROM items WHERE box_id IN \
             (SELECT id FROM storage_boxes ORDER BY id LIMIT ? OFFSET ?) ORDER BY id",
            ITEM_COLUMNS
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(item_from_row)
        .collect();

        tx.commit().await?;
        Ok(attach_items(boxes, items))
    }

    pub async fn update_box(&self, id: i64, patch: &BoxPatch) -> StoreResult<StorageBox> {
        if let Field::Present(name) = &patch.name {
            require_text("name", name)?;
        }
        if let Field::Present(slug) = &patch.slug {
            validate_slug(slug)?;
        }

        let mut tx = self.pool.begin().await?;
        lock_row(&mut tx, "storage_boxes", Entity::Box, id).await?;

        let current = sqlx::query(&format!(
            "SELECT {} FROM storage_boxes WHERE id = ?",
            BOX_COLUMNS
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        let updated = apply_patch(box_from_row(&current), patch);

        sqlx::query(
            "UPDATE storage_boxes SET slug = ?, name = ?, description = ?, unit_id = ? WHERE id = ?",
        )
        .bind(&updated.slug)
        .bind(&updated.name)
        .bind(&updated.description)
        .bind(updated.unit_id)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Constraints {
                box_slug: Some(updated.slug.as_str()),
                parent: Some((Entity::Unit, updated.unit_id)),
                ..Default::default()
            }
            .translate(e)
        })?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Deletes a box together with its items.
    pub async fn delete_box(&self, id: i64) -> StoreResult<StorageBox> {
        let row = sqlx::query(&format!(
            "DELETE FROM storage_boxes WHERE id = ? RETURNING {}",
            BOX_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(Entity::Box, id))?;

        Ok(box_from_row(&row))
    }

    // ============ Items ============

    pub async fn create_item(&self, box_id: i64, new: &NewItem) -> StoreResult<Item> {
        require_text("name", &new.name)?;
        require_quantity(new.quantity)?;

        let row = sqlx::query(&format!(
            "INSERT INTO items (name, description, quantity, category, photo_path, box_id) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.quantity)
        .bind(&new.category)
        .bind(&new.photo_path)
        .bind(box_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Constraints {
                parent: Some((Entity::Box, box_id)),
                ..Default::default()
            }
            .translate(e)
        })?;

        Ok(item_from_row(&row))
    }

    pub async fn get_item(&self, id: i64) -> StoreResult<Item> {
        let row = sqlx::query(&format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::not_found(Entity::Item, id))?;

        Ok(item_from_row(&row))
    }

    pub async fn update_item(&self, id: i64, patch: &ItemPatch) -> StoreResult<Item> {
        if let Field::Present(name) = &patch.name {
            require_text("name", name)?;
        }
        if let Field::Present(quantity) = patch.quantity {
            require_quantity(quantity)?;
        }

        let mut tx = self.pool.begin().await?;
        lock_row(&mut tx, "items", Entity::Item, id).await?;

        let current = sqlx::query(&format!("SELECT {} FROM items WHERE id = ?", ITEM_COLUMNS))
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let updated = apply_patch(item_from_row(&current), patch);

        sqlx::query(
            "UPDATE items SET name = ?, description = ?, quantity = ?, category = ?, \
             photo_path = ?, box_id = ? WHERE id = ?",
        )
        .bind(&updated.name)
        .bind(&updated.description)
        .bind(updated.quantity)
        .bind(&updated.category)
        .bind(&updated.photo_path)
        .bind(updated.box_id)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            Constraints {
                parent: Some((Entity::Box, updated.box_id)),
                ..Default::default()
            }
            .translate(e)
        })?;

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn delete_item(&self, id: i64) -> StoreResult<Item> {
        let row = sqlx::query(&format!(
            "DELETE FROM items WHERE id = ? RETURNING {}",
            ITEM_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found(Entity::Item, id))?;

        Ok(item_from_row(&row))
    }
}

// ============ Constraint translation ============

/// Values to report when a write trips a constraint.
#[derive(Default)]
struct Constraints<'a> {
    unit_name: Option<&'a str>,
    box_slug: Option<&'a str>,
    parent: Option<(Entity, i64)>,
}

impl Constraints<'_> {
    fn translate(self, err: sqlx::Error) -> StoreError {
        match (violation(&err), self) {
            (Some(Violation::UnitName), Constraints { unit_name: Some(name), .. }) => {
                StoreError::DuplicateName(name.to_string())
            }
            (Some(Violation::BoxSlug), Constraints { box_slug: Some(slug), .. }) => {
                StoreError::DuplicateSlug(slug.to_string())
            }
            (Some(Violation::ForeignKey), Constraints { parent: Some((entity, id)), .. }) => {
                StoreError::ParentNotFound { entity, id }
            }
            _ => StoreError::Database(err),
        }
    }
}

// ============ Helpers ============

fn require_text(field: &str, value: &str) -> StoreResult<()> {
    if value.trim().is_empty() {
        return Err(StoreError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

fn require_quantity(quantity: i64) -> StoreResult<()> {
    if quantity < 0 {
        return Err(StoreError::validation("quantity must not be negative"));
    }
    Ok(())
}

fn check_page(offset: i64, limit: i64) -> StoreResult<()> {
    if offset < 0 {
        return Err(StoreError::validation("offset must not be negative"));
    }
    if limit < 0 {
        return Err(StoreError::validation("limit must not be negative"));
    }
    Ok(())
}

/// Takes the database write lock and checks that row `id` exists, so the
/// read-merge-write that follows sees the latest committed row.
async fn lock_row(
    conn: &mut SqliteConnection,
    table: &str,
    entity: Entity,
    id: i64,
) -> StoreResult<()> {
    let touched = sqlx::query(&format!("UPDATE {} SET id = id WHERE id = ?", table))
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if touched == 0 {
        return Err(StoreError::not_found(entity, id));
    }
    Ok(())
}

async fn fetch_boxes(
    conn: &mut SqliteConnection,
    sql: &str,
    key: i64,
) -> StoreResult<Vec<StorageBox>> {
    let rows = sqlx::query(sql).bind(key).fetch_all(&mut *conn).await?;
    Ok(rows.iter().map(box_from_row).collect())
}

async fn fetch_items(conn: &mut SqliteConnection, sql: &str, key: i64) -> StoreResult<Vec<Item>> {
    let rows = sqlx::query(sql).bind(key).fetch_all(&mut *conn).await?;
    Ok(rows.iter().map(item_from_row).collect())
}

pub(crate) async fn load_box_detail(
    conn: &mut SqliteConnection,
    storage_box: StorageBox,
) -> StoreResult<BoxDetail> {
    let items = fetch_items(
        conn,
        &format!(
            "SELECT {} FROM items WHERE box_id = ? ORDER BY id",
            ITEM_COLUMNS
        ),
        storage_box.id,
    )
    .await?;

    Ok(BoxDetail { storage_box, items })
}

/// Groups items under their boxes. Boxes keep their order; a box without
/// items gets an empty list.
pub(crate) fn attach_items(boxes: Vec<StorageBox>, items: Vec<Item>) -> Vec<BoxDetail> {
    let mut by_box: HashMap<i64, Vec<Item>> = HashMap::new();
    for item in items {
        by_box.entry(item.box_id).or_default().push(item);
    }

    boxes
        .into_iter()
        .map(|storage_box| BoxDetail {
            items: by_box.remove(&storage_box.id).unwrap_or_default(),
            storage_box,
        })
        .collect()
}

fn attach_boxes(units: Vec<StorageUnit>, boxes: Vec<BoxDetail>) -> Vec<UnitDetail> {
    let mut by_unit: HashMap<i64, Vec<BoxDetail>> = HashMap::new();
    for detail in boxes {
        by_unit
            .entry(detail.storage_box.unit_id)
            .or_default()
            .push(detail);
    }

    units
        .into_iter()
        .map(|unit| UnitDetail {
            boxes: by_unit.remove(&unit.id).unwrap_or_default(),
            unit,
        })
        .collect()
}

pub(crate) fn unit_from_row(row: &SqliteRow) -> StorageUnit {
    StorageUnit {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
    }
}

pub(crate) fn box_from_row(row: &SqliteRow) -> StorageBox {
    StorageBox {
        id: row.get("id"),
        slug: row.get("slug"),
        name: row.get("name"),
        description: row.get("description"),
        unit_id: row.get("unit_id"),
    }
}

pub(crate) fn item_from_row(row: &SqliteRow) -> Item {
    Item {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        quantity: row.get("quantity"),
        category: row.get("category"),
        photo_path: row.get("photo_path"),
        box_id: row.get("box_id"),
    }
}
