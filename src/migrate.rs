use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::config::Config;
use crate::db;

/// Columns added to `items` after its first release. Databases created
/// before then get them via `ALTER TABLE`.
const ITEM_LATE_COLUMNS: &[(&str, &str)] = &[("category", "TEXT"), ("photo_path", "TEXT")];

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Creates the inventory schema on an open pool. Idempotent.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS storage_units (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            description TEXT
        )
        "#,
    )
    .execute(pool)
    .await
    .context("creating storage_units")?;

    // Deleting a unit removes its boxes; deleting a box removes its items.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS storage_boxes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            description TEXT,
            unit_id INTEGER NOT NULL,
            FOREIGN KEY (unit_id) REFERENCES storage_units(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await
    .context("creating storage_boxes")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            quantity INTEGER NOT NULL DEFAULT 1,
            category TEXT,
            photo_path TEXT,
            box_id INTEGER NOT NULL,
            FOREIGN KEY (box_id) REFERENCES storage_boxes(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await
    .context("creating items")?;

    add_missing_item_columns(pool).await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_boxes_unit_id ON storage_boxes(unit_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_boxes_name ON storage_boxes(name)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_box_id ON items(box_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_name ON items(name)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_category ON items(category)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn add_missing_item_columns(pool: &SqlitePool) -> Result<()> {
    let existing: Vec<String> = sqlx::query("PRAGMA table_info(items)")
        .fetch_all(pool)
        .await?
        .iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();

    for (column, ty) in ITEM_LATE_COLUMNS {
        if existing.iter().any(|c| c == column) {
            continue;
        }
        sqlx::query(&format!("ALTER TABLE items ADD COLUMN {} {}", column, ty))
            .execute(pool)
            .await
            .with_context(|| format!("adding items.{}", column))?;
        info!("added column items.{}", column);
    }

    Ok(())
}
