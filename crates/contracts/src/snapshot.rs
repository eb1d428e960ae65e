//! The planner's input/output bundle: one cell's worth of world state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::actors::{CellLock, House, Npc, Person, ResourceNode, Stockpile};
use crate::object::NetworkObject;
use crate::SCHEMA_VERSION_V1;

/// Everything the planner needs about one cell, pre-interpolated to the
/// planning start time. Collections are keyed by id so iteration order is
/// stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSnapshot {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub persons: BTreeMap<String, Person>,
    #[serde(default)]
    pub npcs: BTreeMap<String, Npc>,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceNode>,
    #[serde(default)]
    pub houses: BTreeMap<String, House>,
    #[serde(default)]
    pub objects: BTreeMap<String, NetworkObject>,
    #[serde(default)]
    pub stockpiles: BTreeMap<String, Stockpile>,
    #[serde(default)]
    pub cell_lock: CellLock,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION_V1.to_string()
}

impl Default for CellSnapshot {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            persons: BTreeMap::new(),
            npcs: BTreeMap::new(),
            resources: BTreeMap::new(),
            houses: BTreeMap::new(),
            objects: BTreeMap::new(),
            stockpiles: BTreeMap::new(),
            cell_lock: CellLock::default(),
        }
    }
}

impl CellSnapshot {
    pub fn insert_npc(&mut self, npc: Npc) {
        self.npcs.insert(npc.id.clone(), npc);
    }

    pub fn insert_person(&mut self, person: Person) {
        self.persons.insert(person.id.clone(), person);
    }

    pub fn insert_resource(&mut self, node: ResourceNode) {
        self.resources.insert(node.id.clone(), node);
    }

    pub fn insert_object(&mut self, object: NetworkObject) {
        self.objects.insert(object.id.clone(), object);
    }

    pub fn insert_stockpile(&mut self, stockpile: Stockpile) {
        self.stockpiles.insert(stockpile.id.clone(), stockpile);
    }

    pub fn insert_house(&mut self, house: House) {
        self.houses.insert(house.id.clone(), house);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_round_trips() {
        let snapshot = CellSnapshot::default();
        let encoded = serde_json::to_string(&snapshot).expect("encode");
        let decoded: CellSnapshot = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(snapshot, decoded);
    }

    #[test]
    fn missing_collections_default_empty() {
        let decoded: CellSnapshot = serde_json::from_str(r#"{}"#).expect("decode");
        assert!(decoded.npcs.is_empty());
        assert_eq!(decoded.schema_version, SCHEMA_VERSION_V1);
    }
}
