//! Inventory data model.
//!
//! Flat records ([`StorageUnit`], [`StorageBox`], [`Item`]) mirror single
//! table rows. Detail records ([`UnitDetail`], [`BoxDetail`]) carry their
//! child collections, which are always fully loaded by the store before the
//! value is returned. A flat record never pretends to have children.

use serde::{Deserialize, Serialize};

/// Top-level container, e.g. a shelf or a closet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUnit {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// A labeled box inside a storage unit, addressable by its slug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBox {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub slug: String,
    pub unit_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub category: Option<String>,
    pub photo_path: Option<String>,
    pub box_id: i64,
}

/// A box together with every item it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxDetail {
    #[serde(flatten)]
    pub storage_box: StorageBox,
    pub items: Vec<Item>,
}

/// A unit together with its boxes, each with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDetail {
    #[serde(flatten)]
    pub unit: StorageUnit,
    pub boxes: Vec<BoxDetail>,
}

/// An item together with the box that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemWithBox {
    #[serde(flatten)]
    pub item: Item,
    #[serde(rename = "box")]
    pub storage_box: StorageBox,
}

/// Input for [`Store::create_unit`](crate::store::Store::create_unit).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUnit {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Input for [`Store::create_box`](crate::store::Store::create_box).
///
/// An absent or empty `slug` is replaced by a generated one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewBox {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    pub unit_id: i64,
}

/// Input for [`Store::create_item`](crate::store::Store::create_item).
/// The parent box is passed separately.
#[derive(Debug, Clone, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub photo_path: Option<String>,
}

pub const DEFAULT_QUANTITY: i64 = 1;

fn default_quantity() -> i64 {
    DEFAULT_QUANTITY
}

impl NewItem {
    /// An item with only a name; every other field takes its default.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            quantity: DEFAULT_QUANTITY,
            category: None,
            photo_path: None,
        }
    }
}

/// Result of a text search over boxes and items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResults {
    pub boxes: Vec<BoxDetail>,
    pub items: Vec<ItemWithBox>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty() && self.items.is_empty()
    }
}
