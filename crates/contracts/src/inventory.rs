//! Slotted inventories and their append-only state timelines.

use serde::{Deserialize, Serialize};

use crate::object::NetworkObject;
use crate::{serde_iso8601_ms, Millis};

/// A fixed-capacity, slotted inventory. Slots are an unordered set keyed by
/// object id; capacity is `rows * columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub rows: u32,
    pub columns: u32,
    #[serde(default)]
    pub slots: Vec<NetworkObject>,
}

impl Inventory {
    pub fn new(rows: u32, columns: u32) -> Self {
        Self {
            rows,
            columns,
            slots: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        (self.rows * self.columns) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn has_free_slot(&self) -> bool {
        self.slots.len() < self.capacity()
    }

    pub fn slot(&self, id: &str) -> Option<&NetworkObject> {
        self.slots.iter().find(|slot| slot.id == id)
    }

    pub fn slot_mut(&mut self, id: &str) -> Option<&mut NetworkObject> {
        self.slots.iter_mut().find(|slot| slot.id == id)
    }

    /// Remove and return the slot with `id`, if present.
    pub fn take_slot(&mut self, id: &str) -> Option<NetworkObject> {
        let index = self.slots.iter().position(|slot| slot.id == id)?;
        Some(self.slots.remove(index))
    }

    /// Total amount across slots of one type.
    pub fn total_of(&self, object_type: crate::catalog::ObjectType) -> u64 {
        self.slots
            .iter()
            .filter(|slot| slot.object_type == object_type)
            .map(|slot| u64::from(slot.amount))
            .sum()
    }
}

/// One append-only delta in a holder's inventory timeline, applied when
/// wall-clock passes `time`. `rows`/`columns` accompany capacity changes
/// (stockpile tiles added or removed).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryStateEntry {
    #[serde(with = "serde_iso8601_ms")]
    pub time: Millis,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add: Vec<NetworkObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modified: Vec<NetworkObject>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<u32>,
}

impl InventoryStateEntry {
    pub fn at(time: Millis) -> Self {
        Self {
            time,
            ..Self::default()
        }
    }

    pub fn is_noop(&self) -> bool {
        self.add.is_empty()
            && self.modified.is_empty()
            && self.remove.is_empty()
            && self.rows.is_none()
            && self.columns.is_none()
    }

    /// Apply this delta to an inventory snapshot.
    pub fn apply_to(&self, inventory: &mut Inventory) {
        if let Some(rows) = self.rows {
            inventory.rows = rows;
        }
        if let Some(columns) = self.columns {
            inventory.columns = columns;
        }
        for id in &self.remove {
            inventory.take_slot(id);
        }
        for slot in &self.modified {
            if let Some(existing) = inventory.slot_mut(&slot.id) {
                *existing = slot.clone();
            }
        }
        for slot in &self.add {
            if inventory.slot(&slot.id).is_none() {
                inventory.slots.push(slot.clone());
            }
        }
    }
}
