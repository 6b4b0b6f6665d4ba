//! # TRMNL Fruit Core Library
//!
//! This library provides the data structures and the two core components of the
//! fruit-of-the-day plugin server for TRMNL e-ink displays:
//!
//! - [`fruit_data::DataProvider`]: fetches the full fruit collection from an
//!   upstream API, caches it for a configurable TTL and hands out one item per
//!   request in a shuffled rotation
//! - [`renderer::DisplayRenderer`]: lays a [`Snapshot`] out on a fixed-size
//!   1-bit canvas and serializes it as a BMP, or renders an error bitmap
//!
//! ## Data Flow
//! 1. **Request**: the HTTP shell asks the provider for the current snapshot
//! 2. **Refresh**: a stale or missing cache triggers one upstream fetch, the
//!    collection is shuffled once and the cursor resets
//! 3. **Render**: the snapshot is drawn deterministically and returned as BMP
//! 4. **Failure**: any error on the way becomes an error bitmap with a short
//!    retry interval, so the device always gets a displayable image
//!
//! ## Core Types
//! - [`Item`]: one upstream record (id plus arbitrary named fields)
//! - [`Snapshot`]: one rendering-ready item with its rotation position

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// Module declarations
pub mod canvas;
pub mod config;
pub mod fonts;
pub mod formatters;
pub mod fruit_data;
pub mod renderer;
pub mod server;

/// A single upstream record.
///
/// The identifier is lifted out of the record; every other key is kept as-is
/// in `fields`. A `BTreeMap` keeps field iteration order stable, which the
/// generic layout relies on for byte-identical output.
///
/// # Example
/// ```
/// use trmnl_fruit_lib::Item;
///
/// let item: Item = serde_json::from_str(
///     r#"{"id": 6, "name": "Apple", "family": "Rosaceae",
///         "nutritions": {"calories": 52, "sugar": 10.3}}"#,
/// ).unwrap();
///
/// assert_eq!(item.id, 6);
/// assert_eq!(item.name(), Some("Apple"));
/// assert!(item.nested("nutritions").is_some());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Upstream identifier (0 when the record carries none)
    #[serde(default)]
    pub id: u64,
    /// All remaining fields of the record
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

impl Item {
    /// Display name of the item, if the record has a string `name`.
    pub fn name(&self) -> Option<&str> {
        self.field_str("name")
    }

    /// String value of a top-level field.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Nested mapping stored under `key` (e.g. `nutritions`).
    pub fn nested(&self, key: &str) -> Option<&Map<String, Value>> {
        self.fields.get(key).and_then(Value::as_object)
    }

    pub fn has_field(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }
}

/// One rendering-ready sample with its position in the rotation.
///
/// Created by the provider per request and only read by the renderer.
///
/// # Example
/// ```
/// use std::collections::BTreeMap;
/// use trmnl_fruit_lib::{Item, Snapshot};
///
/// let snapshot = Snapshot {
///     item: Item { id: 1, fields: BTreeMap::new() },
///     timestamp: "2024-01-01T10:30:00Z".to_string(),
///     index: 0,
///     total: 3,
/// };
///
/// assert_eq!(snapshot.position_label(), "1 of 3");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// The item at the cursor when the snapshot was taken
    pub item: Item,
    /// Snapshot creation time (RFC 3339)
    pub timestamp: String,
    /// Cursor value before it was advanced
    pub index: usize,
    /// Length of the cached collection
    pub total: usize,
}

impl Snapshot {
    /// One-based position in the rotation, e.g. `"2 of 39"`.
    pub fn position_label(&self) -> String {
        format!("{} of {}", self.index + 1, self.total)
    }
}
