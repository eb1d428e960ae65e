//! Pure timeline replay: the same functions both sides use to advance a
//! snapshot to a wall-clock time before planning or display.

use contracts::actors::{Npc, PathPoint, ResourceNode, Stockpile};
use contracts::inventory::{Inventory, InventoryStateEntry};
use contracts::object::NetworkObject;
use contracts::{Millis, Position};

/// Position along a piecewise-linear path at `time`.
///
/// Boundary behavior is part of the contract: `time == first.time` counts as
/// before the path (the original position is returned), `time >= last.time`
/// clamps to the last point.
pub fn position_at(origin: Position, path: &[PathPoint], time: Millis) -> Position {
    let Some(first) = path.first() else {
        return origin;
    };
    if time <= first.time {
        return origin;
    }
    let last = path.last().expect("non-empty path");
    if time >= last.time {
        return last.position();
    }

    for pair in path.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        if time <= to.time {
            let span = to.time - from.time;
            if span == 0 {
                return to.position();
            }
            let progress = (time - from.time) as f64 / span as f64;
            let x = from.x as f64 + (to.x - from.x) as f64 * progress;
            let y = from.y as f64 + (to.y - from.y) as f64 * progress;
            return Position::new(x.round() as i64, y.round() as i64);
        }
    }
    last.position()
}

/// Fold every object-state entry due by `time` into the object, keeping the
/// future tail.
pub fn apply_object_state(object: &mut NetworkObject, time: Millis) {
    let mut future = Vec::new();
    let entries = std::mem::take(&mut object.state);
    for entry in entries {
        if entry.time <= time {
            entry.patch.apply_to(object);
            object.last_update = entry.time;
        } else {
            future.push(entry);
        }
    }
    object.state = future;
}

/// Fold every resource-state entry due by `time` into the node, keeping the
/// future tail.
pub fn apply_resource_state(node: &mut ResourceNode, time: Millis) {
    let mut future = Vec::new();
    let entries = std::mem::take(&mut node.state);
    for entry in entries {
        if entry.time <= time {
            if let Some(depleted) = entry.patch.depleted {
                node.depleted = depleted;
            }
            if let Some(ready_time) = entry.patch.ready_time {
                node.ready_time = ready_time;
            }
            node.last_update = entry.time;
        } else {
            future.push(entry);
        }
    }
    node.state = future;
}

/// Apply the earliest pending inventory delta, if any. Holder snapshots
/// advance one entry at a time; [`apply_inventory_state`] steps this until
/// the timeline catches up to a target instant.
pub fn apply_one_inventory_state(
    inventory: &mut Inventory,
    pending: &mut Vec<InventoryStateEntry>,
) -> bool {
    if pending.is_empty() {
        return false;
    }
    let entry = pending.remove(0);
    entry.apply_to(inventory);
    true
}

/// Fold every inventory delta due by `time` into the snapshot, one entry at
/// a time, keeping the future tail. Timelines are ascending in time, so the
/// walk stops at the first entry still pending.
pub fn apply_inventory_state(
    inventory: &mut Inventory,
    pending: &mut Vec<InventoryStateEntry>,
    time: Millis,
) {
    while pending.first().map_or(false, |entry| entry.time <= time) {
        apply_one_inventory_state(inventory, pending);
    }
}

/// Truncate a timeline at a pause cutoff: entries with `time <= pause` are
/// kept, plus the first entry after the cutoff, which stays pending and is
/// applied on replay.
pub fn truncate_after_pause<T, F>(entries: &mut Vec<T>, pause: Millis, time_of: F)
where
    F: Fn(&T) -> Millis,
{
    let mut kept_one_after = false;
    entries.retain(|entry| {
        if time_of(entry) <= pause {
            true
        } else if !kept_one_after {
            kept_one_after = true;
            true
        } else {
            false
        }
    });
}

/// Advance an NPC snapshot to `time`: position from its path, inventory
/// from its pending deltas. Past path points and applied deltas are pruned.
pub fn interpolate_npc(npc: &mut Npc, time: Millis) {
    let position = position_at(npc.position(), &npc.path, time);
    npc.x = position.x;
    npc.y = position.y;
    npc.path.retain(|point| point.time >= time);
    apply_inventory_state(&mut npc.inventory, &mut npc.inventory_state, time);
    npc.last_update = time;
}

/// Advance a stockpile snapshot to `time`.
pub fn interpolate_stockpile(stockpile: &mut Stockpile, time: Millis) {
    apply_inventory_state(&mut stockpile.inventory, &mut stockpile.inventory_state, time);
    stockpile.last_update = time;
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::actors::ResourcePatch;
    use contracts::actors::ResourceStateEntry;
    use contracts::catalog::ObjectType;
    use contracts::object::{StateEntry, StatePatch};

    fn path() -> Vec<PathPoint> {
        vec![
            PathPoint { time: 1_000, x: 0, y: 0 },
            PathPoint { time: 2_000, x: 0, y: 100 },
            PathPoint { time: 3_000, x: 200, y: 100 },
        ]
    }

    #[test]
    fn time_at_first_point_is_before_path() {
        let origin = Position::new(50, 50);
        assert_eq!(position_at(origin, &path(), 1_000), origin);
        assert_eq!(position_at(origin, &path(), 999), origin);
    }

    #[test]
    fn time_past_last_point_clamps() {
        let origin = Position::new(50, 50);
        assert_eq!(position_at(origin, &path(), 3_000), Position::new(200, 100));
        assert_eq!(position_at(origin, &path(), 10_000), Position::new(200, 100));
    }

    #[test]
    fn midpoints_interpolate_linearly() {
        let origin = Position::new(0, 0);
        assert_eq!(position_at(origin, &path(), 1_500), Position::new(0, 50));
        assert_eq!(position_at(origin, &path(), 2_500), Position::new(100, 100));
    }

    #[test]
    fn duplicate_times_jump_to_later_point() {
        let origin = Position::new(0, 0);
        let path = vec![
            PathPoint { time: 1_000, x: 0, y: 0 },
            PathPoint { time: 1_000, x: 40, y: 0 },
            PathPoint { time: 2_000, x: 40, y: 40 },
        ];
        assert_eq!(position_at(origin, &path, 1_500), Position::new(40, 20));
    }

    #[test]
    fn object_state_folds_due_entries_and_keeps_tail() {
        let mut object =
            NetworkObject::loose("object-1", ObjectType::Stick, Position::new(0, 0), 0);
        object.exist = false;
        object.state = vec![
            StateEntry {
                time: 100,
                patch: StatePatch {
                    exist: Some(true),
                    ..StatePatch::default()
                },
            },
            StateEntry {
                time: 300,
                patch: StatePatch {
                    is_in_inventory: Some(true),
                    grabbed_by_npc_id: Some(Some("npc-1".to_string())),
                    ..StatePatch::default()
                },
            },
        ];
        apply_object_state(&mut object, 200);
        assert!(object.exist);
        assert!(!object.is_in_inventory);
        assert_eq!(object.state.len(), 1);
        assert_eq!(object.last_update, 100);
    }

    #[test]
    fn resource_state_replays_depletion_cycle() {
        let mut node = ResourceNode {
            id: "resource-1".to_string(),
            object_type: ObjectType::Tree,
            x: 0,
            y: 0,
            spawn_seed: "resource-1".to_string(),
            rng_state: None,
            spawns: Vec::new(),
            depleted: false,
            ready_time: 0,
            state: vec![
                ResourceStateEntry {
                    time: 100,
                    patch: ResourcePatch {
                        depleted: Some(true),
                        ready_time: Some(900),
                    },
                },
                ResourceStateEntry {
                    time: 900,
                    patch: ResourcePatch {
                        depleted: Some(false),
                        ready_time: None,
                    },
                },
            ],
            last_update: 0,
        };
        apply_resource_state(&mut node, 500);
        assert!(node.depleted);
        assert_eq!(node.ready_time, 900);
        assert_eq!(node.state.len(), 1);

        apply_resource_state(&mut node, 1_000);
        assert!(!node.depleted);
        assert!(node.state.is_empty());
    }

    #[test]
    fn one_inventory_state_applies_in_order() {
        let mut inventory = Inventory::new(1, 10);
        let mut pending = vec![
            InventoryStateEntry {
                time: 10,
                add: vec![NetworkObject::loose(
                    "stick-0",
                    ObjectType::Stick,
                    Position::new(0, 0),
                    0,
                )],
                ..InventoryStateEntry::default()
            },
            InventoryStateEntry {
                time: 20,
                remove: vec!["stick-0".to_string()],
                ..InventoryStateEntry::default()
            },
        ];
        assert!(apply_one_inventory_state(&mut inventory, &mut pending));
        assert_eq!(inventory.slots.len(), 1);
        assert!(apply_one_inventory_state(&mut inventory, &mut pending));
        assert!(inventory.is_empty());
        assert!(!apply_one_inventory_state(&mut inventory, &mut pending));
    }

    #[test]
    fn inventory_fold_keeps_future_tail() {
        let mut inventory = Inventory::new(1, 10);
        let mut pending = vec![
            InventoryStateEntry {
                time: 10,
                add: vec![NetworkObject::loose(
                    "stick-0",
                    ObjectType::Stick,
                    Position::new(0, 0),
                    0,
                )],
                ..InventoryStateEntry::default()
            },
            InventoryStateEntry {
                time: 20,
                remove: vec!["stick-0".to_string()],
                ..InventoryStateEntry::default()
            },
            InventoryStateEntry {
                time: 30,
                add: vec![NetworkObject::loose(
                    "stick-1",
                    ObjectType::Stick,
                    Position::new(0, 0),
                    0,
                )],
                ..InventoryStateEntry::default()
            },
        ];
        apply_inventory_state(&mut inventory, &mut pending, 20);
        assert!(inventory.is_empty());
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].time, 30);
    }
}
