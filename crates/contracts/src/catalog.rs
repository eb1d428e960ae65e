//! Object-type catalog: the closed registry of every network-object type with
//! its group, display name, description, and per-slot stack limit.
//!
//! The table is process-wide immutable data built once at first use. Lookups
//! go through [`object_data`] so a type missing an entry surfaces as
//! [`CatalogError::UnknownObjectType`] instead of silently defaulting.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Closed enums
// ---------------------------------------------------------------------------

/// Every object type known to the game. The wire format uses the
/// SCREAMING_SNAKE_CASE names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectType {
    // People and storage
    Person,
    Stockpile,
    Chest,
    Barrel,
    // Resource nodes
    Tree,
    Rock,
    Pond,
    BerryBush,
    ReedBed,
    ClayPit,
    OilSeep,
    // Raw resources
    Stick,
    Wood,
    Stone,
    Coal,
    Iron,
    Mud,
    Clay,
    Reed,
    CrudeOil,
    Tar,
    // Construction
    WattleWall,
    Floor,
    Plank,
    Brick,
    Thatch,
    // Food
    Berry,
    Mushroom,
    Fish,
    Meat,
    Egg,
    Bread,
    Wheat,
    Carrot,
    // Agriculture
    WheatSeed,
    CarrotSeed,
    Field,
    Hay,
    // Tools
    Axe,
    Pickaxe,
    Hammer,
    Shovel,
    FishingRod,
    Bucket,
    // Buildings
    House,
    Workshop,
    Well,
    // Furniture
    Table,
    Chair,
    Bed,
    // Vehicles
    Cart,
    Boat,
    // Animals
    Chicken,
    Pig,
    Cow,
    Sheep,
}

impl ObjectType {
    /// Wire name of this type (`WATTLE_WALL` style).
    pub fn name(&self) -> &'static str {
        match object_data(*self) {
            Ok(data) => data.name,
            Err(_) => "UNKNOWN",
        }
    }
}

/// Coarse grouping of object types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectGroup {
    NaturalResource,
    Resource,
    Construction,
    Food,
    Tool,
    Building,
    Person,
    Furniture,
    Storage,
    Vehicle,
    Animal,
}

// ---------------------------------------------------------------------------
// Catalog table
// ---------------------------------------------------------------------------

/// Static data published for one object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectTypeData {
    pub group: ObjectGroup,
    pub name: &'static str,
    pub description: &'static str,
    pub stack_limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// A type with no catalog entry was passed to a lookup.
    UnknownObjectType(String),
}

impl std::fmt::Display for CatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownObjectType(name) => write!(f, "No data for {name}"),
        }
    }
}

impl std::error::Error for CatalogError {}

struct Entry {
    object_type: ObjectType,
    data: ObjectTypeData,
}

fn entry(
    object_type: ObjectType,
    group: ObjectGroup,
    name: &'static str,
    description: &'static str,
    stack_limit: u32,
) -> Entry {
    Entry {
        object_type,
        data: ObjectTypeData {
            group,
            name,
            description,
            stack_limit,
        },
    }
}

fn catalog() -> &'static BTreeMap<ObjectType, ObjectTypeData> {
    static CATALOG: OnceLock<BTreeMap<ObjectType, ObjectTypeData>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        use ObjectGroup as G;
        use ObjectType as T;
        let entries = vec![
            entry(T::Person, G::Person, "PERSON", "A villager", 1),
            entry(T::Stockpile, G::Storage, "STOCKPILE", "Designated storage tiles", 1),
            entry(T::Chest, G::Storage, "CHEST", "A small wooden chest", 1),
            entry(T::Barrel, G::Storage, "BARREL", "A sealed barrel", 1),
            entry(T::Tree, G::NaturalResource, "TREE", "Drops sticks and wood", 1),
            entry(T::Rock, G::NaturalResource, "ROCK", "Drops stone, coal and iron", 1),
            entry(T::Pond, G::NaturalResource, "POND", "Drops mud, clay and fish", 1),
            entry(T::BerryBush, G::NaturalResource, "BERRY_BUSH", "Drops berries", 1),
            entry(T::ReedBed, G::NaturalResource, "REED_BED", "Drops reeds", 1),
            entry(T::ClayPit, G::NaturalResource, "CLAY_PIT", "Drops clay and mud", 1),
            entry(T::OilSeep, G::NaturalResource, "OIL_SEEP", "Drops crude oil and tar", 1),
            entry(T::Stick, G::Resource, "STICK", "A fallen branch", 10),
            entry(T::Wood, G::Resource, "WOOD", "A split log", 1),
            entry(T::Stone, G::Resource, "STONE", "A rough stone", 1),
            entry(T::Coal, G::Resource, "COAL", "A lump of coal", 1),
            entry(T::Iron, G::Resource, "IRON", "Unworked iron ore", 1),
            entry(T::Mud, G::Resource, "MUD", "Wet mud", 1),
            entry(T::Clay, G::Resource, "CLAY", "Workable clay", 1),
            entry(T::Reed, G::Resource, "REED", "A cut reed", 10),
            entry(T::CrudeOil, G::Resource, "CRUDE_OIL", "Unrefined oil", 1),
            entry(T::Tar, G::Resource, "TAR", "Sticky tar", 1),
            entry(T::WattleWall, G::Construction, "WATTLE_WALL", "A woven wall panel", 4),
            entry(T::Floor, G::Construction, "FLOOR", "A packed floor tile", 1),
            entry(T::Plank, G::Construction, "PLANK", "A sawn plank", 1),
            entry(T::Brick, G::Construction, "BRICK", "A fired brick", 4),
            entry(T::Thatch, G::Construction, "THATCH", "Bundled roof thatch", 4),
            entry(T::Berry, G::Food, "BERRY", "A handful of berries", 1),
            entry(T::Mushroom, G::Food, "MUSHROOM", "An edible mushroom", 1),
            entry(T::Fish, G::Food, "FISH", "A fresh fish", 1),
            entry(T::Meat, G::Food, "MEAT", "A cut of meat", 1),
            entry(T::Egg, G::Food, "EGG", "A hen's egg", 1),
            entry(T::Bread, G::Food, "BREAD", "A baked loaf", 1),
            entry(T::Wheat, G::Food, "WHEAT", "Harvested wheat", 1),
            entry(T::Carrot, G::Food, "CARROT", "A pulled carrot", 1),
            entry(T::WheatSeed, G::Resource, "WHEAT_SEED", "Seed wheat", 10),
            entry(T::CarrotSeed, G::Resource, "CARROT_SEED", "Carrot seed", 10),
            entry(T::Field, G::Building, "FIELD", "A tilled field", 1),
            entry(T::Hay, G::Resource, "HAY", "Dried hay", 1),
            entry(T::Axe, G::Tool, "AXE", "Fells trees faster", 1),
            entry(T::Pickaxe, G::Tool, "PICKAXE", "Breaks rock faster", 1),
            entry(T::Hammer, G::Tool, "HAMMER", "For construction work", 1),
            entry(T::Shovel, G::Tool, "SHOVEL", "Digs mud and clay", 1),
            entry(T::FishingRod, G::Tool, "FISHING_ROD", "Catches fish", 1),
            entry(T::Bucket, G::Tool, "BUCKET", "Carries water and oil", 1),
            entry(T::House, G::Building, "HOUSE", "A villager's home", 1),
            entry(T::Workshop, G::Building, "WORKSHOP", "A crafting building", 1),
            entry(T::Well, G::Building, "WELL", "A dug well", 1),
            entry(T::Table, G::Furniture, "TABLE", "A plain table", 1),
            entry(T::Chair, G::Furniture, "CHAIR", "A plain chair", 1),
            entry(T::Bed, G::Furniture, "BED", "A straw bed", 1),
            entry(T::Cart, G::Vehicle, "CART", "A hand cart", 1),
            entry(T::Boat, G::Vehicle, "BOAT", "A reed boat", 1),
            entry(T::Chicken, G::Animal, "CHICKEN", "A hen", 1),
            entry(T::Pig, G::Animal, "PIG", "A pig", 1),
            entry(T::Cow, G::Animal, "COW", "A cow", 1),
            entry(T::Sheep, G::Animal, "SHEEP", "A sheep", 1),
        ];
        entries
            .into_iter()
            .map(|e| (e.object_type, e.data))
            .collect()
    })
}

/// Catalog data for one type, or `UnknownObjectType` if the table has no
/// entry for it.
pub fn object_data(object_type: ObjectType) -> Result<&'static ObjectTypeData, CatalogError> {
    catalog()
        .get(&object_type)
        .ok_or_else(|| CatalogError::UnknownObjectType(format!("{object_type:?}")))
}

/// Maximum slot amount for one type. Defaults are encoded in the table; this
/// still fails for a type with no entry.
pub fn stack_limit(object_type: ObjectType) -> Result<u32, CatalogError> {
    object_data(object_type).map(|data| data.stack_limit)
}

/// Resolve a wire name (`"STICK"`) back to its type.
pub fn object_type_by_name(name: &str) -> Result<ObjectType, CatalogError> {
    catalog()
        .iter()
        .find(|(_, data)| data.name == name)
        .map(|(ty, _)| *ty)
        .ok_or_else(|| CatalogError::UnknownObjectType(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_has_an_entry() {
        for (ty, data) in catalog() {
            assert!(data.stack_limit >= 1, "{ty:?} has zero stack limit");
            assert!(!data.name.is_empty());
        }
    }

    #[test]
    fn published_stack_limits() {
        assert_eq!(stack_limit(ObjectType::Stick).unwrap(), 10);
        assert_eq!(stack_limit(ObjectType::WattleWall).unwrap(), 4);
        assert_eq!(stack_limit(ObjectType::Wood).unwrap(), 1);
    }

    #[test]
    fn unknown_name_reports_no_data() {
        let err = object_type_by_name("GOLD_BAR").unwrap_err();
        assert_eq!(err.to_string(), "No data for GOLD_BAR");
    }

    #[test]
    fn wire_names_round_trip_serde() {
        let encoded = serde_json::to_string(&ObjectType::WattleWall).unwrap();
        assert_eq!(encoded, r#""WATTLE_WALL""#);
        let decoded: ObjectType = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, ObjectType::WattleWall);
    }
}
