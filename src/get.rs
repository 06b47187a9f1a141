//! Read-only CLI views: one box by slug, or a page of units.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::models::{BoxDetail, Item};
use crate::store::Store;

/// CLI entry point: prints a box and its items.
pub async fn run_get_box(config: &Config, slug: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let detail = Store::new(pool.clone()).get_box_by_slug(slug).await;
    pool.close().await;

    let detail = match detail {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    print_box(&detail, "");
    Ok(())
}

/// Prints a page of units with their boxes and items.
pub async fn run_list_units(config: &Config, skip: i64, limit: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    let units = Store::new(pool.clone()).list_units(skip, limit).await;
    pool.close().await;
    let units = units?;

    if units.is_empty() {
        println!("No units.");
        return Ok(());
    }

    for detail in &units {
        let unit = &detail.unit;
        println!("[{}] {}", unit.id, unit.name);
        if let Some(ref description) = unit.description {
            println!("    {}", description);
        }
        for b in &detail.boxes {
            print_box(b, "    ");
        }
        println!();
    }
    Ok(())
}

fn print_box(detail: &BoxDetail, indent: &str) {
    let b = &detail.storage_box;
    println!("{}--- Box [{}] {} ---", indent, b.id, b.name);
    println!("{}slug:        {}", indent, b.slug);
    if let Some(ref description) = b.description {
        println!("{}description: {}", indent, description);
    }
    println!("{}items ({}):", indent, detail.items.len());
    for item in &detail.items {
        println!("{}  {}", indent, item_line(item));
    }
}

fn item_line(item: &Item) -> String {
    let mut line = format!("[{}] {} x{}", item.id, item.name, item.quantity);
    if let Some(ref category) = item.category {
        line.push_str(&format!(" ({})", category));
    }
    line
}
