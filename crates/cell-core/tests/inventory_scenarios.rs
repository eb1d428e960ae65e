//! End-to-end inventory engine scenarios: stack merging, overflow, craft
//! atomicity, conservation, and the holder invariants under random
//! operation sequences.

use cell_core::inventory::{
    craft, drop_item, pick_up, InventoryError, InventoryHolder,
};
use cell_core::rng::CellRng;
use contracts::actors::Person;
use contracts::catalog::{stack_limit, ObjectType};
use contracts::object::NetworkObject;
use contracts::recipes::recipe_for;
use contracts::Position;
use proptest::prelude::*;

fn stick(id: &str) -> NetworkObject {
    NetworkObject::loose(id, ObjectType::Stick, Position::new(0, 0), 0)
}

fn person_1x10() -> Person {
    Person::new("person-1", Position::new(0, 0), 1, 10)
}

#[test]
fn craft_wattle_from_twenty_sticks() {
    let mut person = person_1x10();
    for n in 0..20 {
        pick_up(&mut person, &stick(&format!("stick-{n}"))).expect("pickup");
    }

    // Twenty singles settle into two full stacks.
    let stick_slots: Vec<u32> = person
        .inventory
        .slots
        .iter()
        .filter(|slot| slot.object_type == ObjectType::Stick)
        .map(|slot| slot.amount)
        .collect();
    assert_eq!(stick_slots, vec![10, 10]);

    let recipe = recipe_for(ObjectType::WattleWall).expect("recipe");
    let mut rng = CellRng::from_seed_str("person-1:craft");
    let before = rng.save_state();
    craft(&mut person, recipe, &mut rng).expect("craft");

    assert_eq!(person.inventory.total_of(ObjectType::Stick), 10);
    let wall_slots: Vec<u32> = person
        .inventory
        .slots
        .iter()
        .filter(|slot| slot.object_type == ObjectType::WattleWall)
        .map(|slot| slot.amount)
        .collect();
    assert_eq!(wall_slots, vec![1]);
    assert_ne!(rng.save_state(), before);
}

#[test]
fn hundred_and_first_stick_overflows() {
    let mut person = person_1x10();
    for n in 0..100 {
        pick_up(&mut person, &stick(&format!("stick-{n}"))).expect("pickup");
    }
    assert_eq!(person.inventory.total_of(ObjectType::Stick), 100);
    assert_eq!(person.inventory.slots.len(), 10);

    let err = pick_up(&mut person, &stick("stick-100")).unwrap_err();
    assert_eq!(err, InventoryError::InventoryFull);
    assert_eq!(err.to_string(), "Not enough room for item");
}

#[test]
fn failed_craft_leaves_state_untouched() {
    let mut person = person_1x10();
    for n in 0..9 {
        pick_up(&mut person, &stick(&format!("stick-{n}"))).expect("pickup");
    }
    let recipe = recipe_for(ObjectType::WattleWall).expect("recipe");
    let mut rng = CellRng::from_seed_str("person-1:craft");
    let before = rng.save_state();

    let err = craft(&mut person, recipe, &mut rng).unwrap_err();
    assert_eq!(err, InventoryError::InsufficientMaterials);
    assert_eq!(err.to_string(), "Not enough materials for crafting");

    assert_eq!(person.inventory.slots.len(), 1);
    assert_eq!(person.inventory.slots[0].amount, 9);
    assert_eq!(rng.save_state(), before);
}

#[test]
fn pickup_drop_round_trip_conserves_items() {
    let mut person = person_1x10();
    for n in 0..7 {
        pick_up(&mut person, &stick(&format!("stick-{n}"))).expect("pickup");
    }
    let held_before = person.inventory.total_of(ObjectType::Stick);

    let slot_id = person.inventory.slots[0].id.clone();
    let dropped = drop_item(&mut person, &slot_id);
    let item = dropped.updated_original.expect("dropped");
    let loose = item.amount as u64;
    assert_eq!(
        person.inventory.total_of(ObjectType::Stick) + loose,
        held_before
    );

    pick_up(&mut person, &item).expect("re-pickup");
    assert_eq!(person.inventory.total_of(ObjectType::Stick), held_before);
}

#[test]
fn craft_conserves_recipe_arithmetic() {
    let mut person = person_1x10();
    for n in 0..30 {
        pick_up(&mut person, &stick(&format!("stick-{n}"))).expect("pickup");
    }
    let recipe = recipe_for(ObjectType::WattleWall).expect("recipe");
    let sticks_before = person.inventory.total_of(ObjectType::Stick);
    let walls_before = person.inventory.total_of(ObjectType::WattleWall);

    let mut rng = CellRng::from_seed_str("conserve");
    craft(&mut person, recipe, &mut rng).expect("craft");

    let sticks_spent = sticks_before - person.inventory.total_of(ObjectType::Stick);
    let walls_gained = person.inventory.total_of(ObjectType::WattleWall) - walls_before;
    assert_eq!(sticks_spent, 10);
    assert_eq!(walls_gained, u64::from(recipe.amount));
}

// ---------------------------------------------------------------------------
// Random operation sequences keep the holder invariants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Op {
    PickUpStick,
    PickUpWall,
    DropFirst,
    CraftWall,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::PickUpStick),
        1 => Just(Op::PickUpWall),
        1 => Just(Op::DropFirst),
        1 => Just(Op::CraftWall),
    ]
}

fn assert_invariants(person: &Person) {
    let inventory = person.inventory();
    assert!(inventory.slots.len() <= inventory.capacity());
    for slot in &inventory.slots {
        let limit = stack_limit(slot.object_type).expect("catalog entry");
        assert!(slot.amount >= 1 && slot.amount <= limit);
        assert!(slot.is_in_inventory);
        assert_eq!(slot.ownership_count(), 1);
        assert_eq!(slot.grabbed_by_person_id.as_deref(), Some(person.id.as_str()));
        assert_eq!(slot.grabbed_by_npc_id, None);
        assert_eq!(slot.inside_stockpile, None);
    }
}

proptest! {
    #[test]
    fn invariants_hold_under_random_operations(ops in prop::collection::vec(op_strategy(), 1..120)) {
        let mut person = person_1x10();
        let mut rng = CellRng::from_seed_str("proptest:craft");
        let recipe = recipe_for(ObjectType::WattleWall).expect("recipe");
        let mut serial = 0u32;

        for op in ops {
            match op {
                Op::PickUpStick => {
                    serial += 1;
                    let _ = pick_up(&mut person, &stick(&format!("stick-{serial}")));
                }
                Op::PickUpWall => {
                    serial += 1;
                    let wall = NetworkObject::loose(
                        format!("wall-{serial}"),
                        ObjectType::WattleWall,
                        Position::new(0, 0),
                        0,
                    );
                    let _ = pick_up(&mut person, &wall);
                }
                Op::DropFirst => {
                    if let Some(slot) = person.inventory.slots.first() {
                        let id = slot.id.clone();
                        drop_item(&mut person, &id);
                    }
                }
                Op::CraftWall => {
                    let _ = craft(&mut person, recipe, &mut rng);
                }
            }
            assert_invariants(&person);
        }
    }
}
