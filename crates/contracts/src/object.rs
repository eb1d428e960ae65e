//! Network objects and their state timelines.

use serde::{Deserialize, Serialize};

use crate::catalog::ObjectType;
use crate::{serde_double_option, serde_iso8601_ms, Millis, Position};

/// Health triple carried by every network object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub value: i64,
    pub max: i64,
    pub rate: i64,
}

impl Default for Health {
    fn default() -> Self {
        Self {
            value: 100,
            max: 100,
            rate: 0,
        }
    }
}

/// A world object replicated between client and server.
///
/// At most one of `grabbed_by_person_id`, `grabbed_by_npc_id`,
/// `inside_stockpile` is non-null at any visible snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkObject {
    pub id: String,
    pub object_type: ObjectType,
    pub x: i64,
    pub y: i64,
    /// Stack count; at least 1.
    pub amount: u32,
    /// Liveness flag. A false `exist` with no future restoring event means
    /// the object is garbage-collectable.
    pub exist: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grabbed_by_person_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grabbed_by_npc_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inside_stockpile: Option<String>,
    #[serde(default)]
    pub is_in_inventory: bool,
    #[serde(default)]
    pub health: Health,
    #[serde(with = "serde_iso8601_ms")]
    pub last_update: Millis,
    /// Future mutations, applied by the client as wall-clock passes each
    /// entry's time. Ascending in time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub state: Vec<StateEntry>,
}

impl NetworkObject {
    /// A loose object of `object_type` at a position, existing, unowned.
    pub fn loose(id: impl Into<String>, object_type: ObjectType, pos: Position, now: Millis) -> Self {
        Self {
            id: id.into(),
            object_type,
            x: pos.x,
            y: pos.y,
            amount: 1,
            exist: true,
            grabbed_by_person_id: None,
            grabbed_by_npc_id: None,
            inside_stockpile: None,
            is_in_inventory: false,
            health: Health::default(),
            last_update: now,
            state: Vec::new(),
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// Number of ownership references set (held by person, held by NPC,
    /// inside stockpile). Valid snapshots have zero or one.
    pub fn ownership_count(&self) -> usize {
        [
            self.grabbed_by_person_id.is_some(),
            self.grabbed_by_npc_id.is_some(),
            self.inside_stockpile.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    /// Clear all ownership references and the inventory flag.
    pub fn clear_ownership(&mut self) {
        self.grabbed_by_person_id = None;
        self.grabbed_by_npc_id = None;
        self.inside_stockpile = None;
        self.is_in_inventory = false;
    }
}

/// One timeline entry: a partial mutation applied once wall-clock passes
/// `time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEntry {
    #[serde(with = "serde_iso8601_ms")]
    pub time: Millis,
    pub patch: StatePatch,
}

/// Partial mutation of a network object. `None` leaves a field untouched;
/// for the ownership references, `Some(None)` (JSON `null`) clears.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exist: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_in_inventory: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_double_option")]
    pub grabbed_by_person_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_double_option")]
    pub grabbed_by_npc_id: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_double_option")]
    pub inside_stockpile: Option<Option<String>>,
}

impl StatePatch {
    /// Apply this patch to an object.
    pub fn apply_to(&self, object: &mut NetworkObject) {
        if let Some(x) = self.x {
            object.x = x;
        }
        if let Some(y) = self.y {
            object.y = y;
        }
        if let Some(amount) = self.amount {
            object.amount = amount;
        }
        if let Some(exist) = self.exist {
            object.exist = exist;
        }
        if let Some(flag) = self.is_in_inventory {
            object.is_in_inventory = flag;
        }
        if let Some(ref grabbed) = self.grabbed_by_person_id {
            object.grabbed_by_person_id = grabbed.clone();
        }
        if let Some(ref grabbed) = self.grabbed_by_npc_id {
            object.grabbed_by_npc_id = grabbed.clone();
        }
        if let Some(ref inside) = self.inside_stockpile {
            object.inside_stockpile = inside.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_in_patch_clears_ownership_reference() {
        let json = r#"{"grabbedByNpcId":null,"isInInventory":false}"#;
        let patch: StatePatch = serde_json::from_str(json).expect("patch");
        assert_eq!(patch.grabbed_by_npc_id, Some(None));
        assert_eq!(patch.grabbed_by_person_id, None);

        let mut object = NetworkObject::loose("object-1", ObjectType::Stick, Position::new(0, 0), 0);
        object.grabbed_by_npc_id = Some("npc-1".to_string());
        object.is_in_inventory = true;
        patch.apply_to(&mut object);
        assert_eq!(object.grabbed_by_npc_id, None);
        assert!(!object.is_in_inventory);
    }

    #[test]
    fn ownership_clear_survives_a_wire_round_trip() {
        let entry = StateEntry {
            time: 5_000,
            patch: StatePatch {
                grabbed_by_npc_id: Some(None),
                inside_stockpile: Some(Some("stockpile-1".to_string())),
                is_in_inventory: Some(true),
                ..StatePatch::default()
            },
        };
        let encoded = serde_json::to_string(&entry).expect("encode");
        let decoded: StateEntry = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded.patch.grabbed_by_npc_id, Some(None));
        assert_eq!(decoded.patch.grabbed_by_person_id, None);
        assert_eq!(decoded, entry);
    }

    #[test]
    fn ownership_count_flags_double_ownership() {
        let mut object = NetworkObject::loose("object-2", ObjectType::Stick, Position::new(0, 0), 0);
        assert_eq!(object.ownership_count(), 0);
        object.grabbed_by_npc_id = Some("npc-1".to_string());
        object.inside_stockpile = Some("stockpile-1".to_string());
        assert_eq!(object.ownership_count(), 2);
    }
}
