//! Sparse field-level updates.
//!
//! A patch only touches the fields it names. [`Field`] keeps "not provided"
//! apart from "provided as null": a JSON body `{"category": null}` clears the
//! category, while `{}` leaves it alone.
//!
//! ```
//! use whereisit::models::Item;
//! use whereisit::patch::{apply_patch, Field, ItemPatch};
//!
//! let item = Item {
//!     id: 1,
//!     name: "Wrench".into(),
//!     description: None,
//!     quantity: 3,
//!     category: Some("tools".into()),
//!     photo_path: None,
//!     box_id: 1,
//! };
//! let patch = ItemPatch { quantity: Field::Present(5), ..Default::default() };
//! let item = apply_patch(item, &patch);
//! assert_eq!(item.quantity, 5);
//! assert_eq!(item.category.as_deref(), Some("tools"));
//! ```

use serde::{Deserialize, Deserializer};

use crate::models::{Item, StorageBox, StorageUnit};

/// One field of a sparse patch.
///
/// Use with `#[serde(default)]` so that a missing key deserializes to
/// [`Field::Absent`]. For nullable columns use `Field<Option<T>>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Field<T> {
    #[default]
    Absent,
    Present(T),
}

impl<T> Field<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Field::Present(_))
    }

    pub fn as_ref(&self) -> Field<&T> {
        match self {
            Field::Absent => Field::Absent,
            Field::Present(v) => Field::Present(v),
        }
    }

    pub fn present(&self) -> Option<&T> {
        match self {
            Field::Absent => None,
            Field::Present(v) => Some(v),
        }
    }
}

impl<T: Clone> Field<T> {
    /// Overwrites `target` when the field is present.
    pub fn merge_into(&self, target: &mut T) {
        if let Field::Present(v) = self {
            *target = v.clone();
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Present(value)
    }
}

impl<'de, T> Deserialize<'de> for Field<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Field::Present)
    }
}

/// A sparse update for some entity type.
pub trait Patch {
    type Target;

    /// Returns `target` with every present field replaced.
    fn apply(&self, target: Self::Target) -> Self::Target;

    /// True when no field is present.
    fn is_empty(&self) -> bool;
}

/// Merges `patch` into `entity`. Fields the patch does not name are kept.
pub fn apply_patch<P: Patch>(entity: P::Target, patch: &P) -> P::Target {
    patch.apply(entity)
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UnitPatch {
    #[serde(default)]
    pub name: Field<String>,
    #[serde(default)]
    pub description: Field<Option<String>>,
}

impl Patch for UnitPatch {
    type Target = StorageUnit;

    fn apply(&self, mut unit: StorageUnit) -> StorageUnit {
        self.name.merge_into(&mut unit.name);
        self.description.merge_into(&mut unit.description);
        unit
    }

    fn is_empty(&self) -> bool {
        !(self.name.is_present() || self.description.is_present())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoxPatch {
    #[serde(default)]
    pub name: Field<String>,
    #[serde(default)]
    pub description: Field<Option<String>>,
    #[serde(default)]
    pub slug: Field<String>,
    #[serde(default)]
    pub unit_id: Field<i64>,
}

impl Patch for BoxPatch {
    type Target = StorageBox;

    fn apply(&self, mut storage_box: StorageBox) -> StorageBox {
        self.name.merge_into(&mut storage_box.name);
        self.description.merge_into(&mut storage_box.description);
        self.slug.merge_into(&mut storage_box.slug);
        self.unit_id.merge_into(&mut storage_box.unit_id);
        storage_box
    }

    fn is_empty(&self) -> bool {
        !(self.name.is_present()
            || self.description.is_present()
            || self.slug.is_present()
            || self.unit_id.is_present())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemPatch {
    #[serde(default)]
    pub name: Field<String>,
    #[serde(default)]
    pub description: Field<Option<String>>,
    #[serde(default)]
    pub quantity: Field<i64>,
    #[serde(default)]
    pub category: Field<Option<String>>,
    #[serde(default)]
    pub photo_path: Field<Option<String>>,
    /// Moves the item to another box.
    #[serde(default)]
    pub box_id: Field<i64>,
}

impl ItemPatch {
    /// A patch that only sets the photo reference.
    pub fn photo(path: impl Into<String>) -> Self {
        Self {
            photo_path: Field::Present(Some(path.into())),
            ..Default::default()
        }
    }
}

impl Patch for ItemPatch {
    type Target = Item;

    fn apply(&self, mut item: Item) -> Item {
        self.name.merge_into(&mut item.name);
        self.description.merge_into(&mut item.description);
        self.quantity.merge_into(&mut item.quantity);
        self.category.merge_into(&mut item.category);
        self.photo_path.merge_into(&mut item.photo_path);
        self.box_id.merge_into(&mut item.box_id);
        item
    }

    fn is_empty(&self) -> bool {
        !(self.name.is_present()
            || self.description.is_present()
            || self.quantity.is_present()
            || self.category.is_present()
            || self.photo_path.is_present()
            || self.box_id.is_present())
    }
}
