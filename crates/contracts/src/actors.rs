//! Inventory holders and world actors: people, NPCs, stockpiles, houses,
//! resource nodes, and the cell lock.

use serde::{Deserialize, Serialize};

use crate::catalog::ObjectType;
use crate::inventory::{Inventory, InventoryStateEntry};
use crate::object::NetworkObject;
use crate::{serde_iso8601_ms, serde_u64_string, Millis, Position, TILE_SIZE};

/// Inventory rows contributed by each stockpile tile.
pub const ROWS_PER_TILE: u32 = 2;

/// Fixed stockpile column count.
pub const COLS_PER_TILE: u32 = 5;

// ---------------------------------------------------------------------------
// RNG snapshots
// ---------------------------------------------------------------------------

/// A resumable RNG stream at the boundary: the domain seed string plus the
/// saved generator state, if the stream has been advanced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RngSeedState {
    pub seed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<RngState>,
}

impl RngSeedState {
    pub fn from_seed(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            state: None,
        }
    }
}

/// Saved xoshiro256++ state: four 64-bit words, stringified on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    #[serde(with = "serde_u64_string::array4")]
    pub s: [u64; 4],
}

// ---------------------------------------------------------------------------
// People and NPCs
// ---------------------------------------------------------------------------

/// A timestamped waypoint; consecutive points define piecewise-linear motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathPoint {
    #[serde(with = "serde_iso8601_ms")]
    pub time: Millis,
    pub x: i64,
    pub y: i64,
}

impl PathPoint {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Waking window in day-cycle milliseconds (see [`crate::time`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub wake: Millis,
    pub sleep: Millis,
}

impl Default for Schedule {
    fn default() -> Self {
        // Awake the whole cycle.
        Self {
            wake: 0,
            sleep: crate::time::DAY_MS,
        }
    }
}

/// NPC job assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Job {
    Gather,
    Craft { products: Vec<ObjectType> },
    Haul,
}

/// A player-controlled villager. Mutated only by direct requests, never by
/// the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub x: i64,
    pub y: i64,
    #[serde(with = "serde_iso8601_ms")]
    pub last_update: Millis,
    pub inventory: Inventory,
    pub crafting_rng: RngSeedState,
    /// Serial for ids of items this person synthesizes client-side
    /// (construction refunds). Advances deterministically with each use.
    #[serde(default)]
    pub item_serial: u64,
}

impl Person {
    pub fn new(id: impl Into<String>, pos: Position, rows: u32, columns: u32) -> Self {
        let id = id.into();
        let crafting_rng = RngSeedState::from_seed(format!("{id}:craft"));
        Self {
            id,
            x: pos.x,
            y: pos.y,
            last_update: 0,
            inventory: Inventory::new(rows, columns),
            crafting_rng,
            item_serial: 0,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// Next synthesized-item id for this person.
    pub fn next_item_id(&mut self) -> String {
        self.item_serial += 1;
        format!("{}-item-{}", self.id, self.item_serial)
    }

    /// Next id for a house this person founds.
    pub fn next_house_id(&mut self) -> String {
        self.item_serial += 1;
        format!("{}-house-{}", self.id, self.item_serial)
    }

    /// Next id for a stockpile this person designates.
    pub fn next_stockpile_id(&mut self) -> String {
        self.item_serial += 1;
        format!("{}-stockpile-{}", self.id, self.item_serial)
    }
}

/// A planner-driven villager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Npc {
    pub id: String,
    pub x: i64,
    pub y: i64,
    #[serde(with = "serde_iso8601_ms")]
    pub last_update: Millis,
    pub inventory: Inventory,
    /// Piecewise-linear motion schedule. Append-only during a planning run.
    #[serde(default)]
    pub path: Vec<PathPoint>,
    /// Absolute time the NPC is eligible for its next action.
    #[serde(with = "serde_iso8601_ms")]
    pub ready_time: Millis,
    #[serde(default)]
    pub schedule: Schedule,
    pub job: Job,
    /// Inventory deltas scheduled by the planner. Append-only during a run.
    #[serde(default)]
    pub inventory_state: Vec<InventoryStateEntry>,
    pub crafting_rng: RngSeedState,
}

impl Npc {
    pub fn new(id: impl Into<String>, pos: Position, job: Job) -> Self {
        let id = id.into();
        let crafting_rng = RngSeedState::from_seed(format!("{id}:craft"));
        Self {
            id,
            x: pos.x,
            y: pos.y,
            last_update: 0,
            inventory: Inventory::new(2, 5),
            path: Vec::new(),
            ready_time: 0,
            schedule: Schedule::default(),
            job,
            inventory_state: Vec::new(),
            crafting_rng,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Footprints
// ---------------------------------------------------------------------------

/// A building footprint tile in tile coordinates (pixels / 200).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TilePos {
    pub tx: i64,
    pub ty: i64,
}

impl TilePos {
    pub fn containing(pos: Position) -> Self {
        Self {
            tx: pos.x.div_euclid(TILE_SIZE),
            ty: pos.y.div_euclid(TILE_SIZE),
        }
    }

    /// Pixel position of the tile's north-west corner.
    pub fn origin(&self) -> Position {
        Position::new(self.tx * TILE_SIZE, self.ty * TILE_SIZE)
    }

    pub fn neighbors(&self) -> [TilePos; 4] {
        [
            TilePos { tx: self.tx, ty: self.ty - 1 },
            TilePos { tx: self.tx + 1, ty: self.ty },
            TilePos { tx: self.tx, ty: self.ty + 1 },
            TilePos { tx: self.tx - 1, ty: self.ty },
        ]
    }
}

/// Which edge of a tile a wall segment occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WallSide {
    North,
    East,
    South,
    West,
}

/// One exterior wall segment of a house.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallSegment {
    pub tile: TilePos,
    pub side: WallSide,
}

/// A constructed house: floor tiles plus recomputed exterior walls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct House {
    pub id: String,
    /// Owning NPC, if the house has been assigned as a home.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npc_id: Option<String>,
    pub floors: Vec<TilePos>,
    pub walls: Vec<WallSegment>,
    #[serde(with = "serde_iso8601_ms")]
    pub last_update: Millis,
}

impl House {
    /// Pixel position of the house (north-west corner of its first tile).
    pub fn position(&self) -> Position {
        self.floors
            .first()
            .map(TilePos::origin)
            .unwrap_or_default()
    }
}

/// A multi-tile inventory holder. Capacity scales with tile count:
/// `rows = tiles * ROWS_PER_TILE`, `columns = COLS_PER_TILE`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stockpile {
    pub id: String,
    pub tiles: Vec<TilePos>,
    pub inventory: Inventory,
    #[serde(default)]
    pub inventory_state: Vec<InventoryStateEntry>,
    #[serde(with = "serde_iso8601_ms")]
    pub last_update: Millis,
}

impl Stockpile {
    pub fn new(id: impl Into<String>, tile: TilePos, now: Millis) -> Self {
        Self {
            id: id.into(),
            tiles: vec![tile],
            inventory: Inventory::new(ROWS_PER_TILE, COLS_PER_TILE),
            inventory_state: Vec::new(),
            last_update: now,
        }
    }

    /// Pixel position (north-west corner of the first tile).
    pub fn position(&self) -> Position {
        self.tiles.first().map(TilePos::origin).unwrap_or_default()
    }

    /// Rows/columns implied by the current tile count.
    pub fn scaled_dimensions(&self) -> (u32, u32) {
        (self.tiles.len() as u32 * ROWS_PER_TILE, COLS_PER_TILE)
    }
}

// ---------------------------------------------------------------------------
// Resource nodes
// ---------------------------------------------------------------------------

/// One weighted spawn option of a resource node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnDef {
    pub object_type: ObjectType,
    /// Relative weight; zero-weight entries are never selected.
    pub probability: f64,
    /// Base respawn time in milliseconds.
    pub spawn_time: Millis,
}

/// Partial mutation of a resource node's harvest status.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depleted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_iso8601_ms::opt")]
    pub ready_time: Option<Millis>,
}

/// Timeline entry for a resource node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceStateEntry {
    #[serde(with = "serde_iso8601_ms")]
    pub time: Millis,
    pub patch: ResourcePatch,
}

/// A stationary harvestable world object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNode {
    pub id: String,
    pub object_type: ObjectType,
    pub x: i64,
    pub y: i64,
    pub spawn_seed: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_state: Option<RngState>,
    pub spawns: Vec<SpawnDef>,
    #[serde(default)]
    pub depleted: bool,
    #[serde(with = "serde_iso8601_ms")]
    pub ready_time: Millis,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub state: Vec<ResourceStateEntry>,
    #[serde(with = "serde_iso8601_ms")]
    pub last_update: Millis,
}

impl ResourceNode {
    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    /// Whether the node can be harvested at `now`.
    pub fn is_ready(&self, now: Millis) -> bool {
        !self.depleted || now >= self.ready_time
    }
}

// ---------------------------------------------------------------------------
// Cell lock
// ---------------------------------------------------------------------------

/// Advisory lock on a cell. A set `pause_date` is a hard cutoff: planning
/// must cease at that absolute time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellLock {
    #[serde(default, skip_serializing_if = "Option::is_none", with = "serde_iso8601_ms::opt")]
    pub pause_date: Option<Millis>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_containing_uses_floor_division() {
        assert_eq!(
            TilePos::containing(Position::new(399, 200)),
            TilePos { tx: 1, ty: 1 }
        );
        assert_eq!(
            TilePos::containing(Position::new(-1, 0)),
            TilePos { tx: -1, ty: 0 }
        );
    }

    #[test]
    fn stockpile_capacity_scales_with_tiles() {
        let mut pile = Stockpile::new("stockpile-1", TilePos { tx: 0, ty: 0 }, 0);
        assert_eq!(pile.inventory.capacity(), 10);
        pile.tiles.push(TilePos { tx: 1, ty: 0 });
        let (rows, columns) = pile.scaled_dimensions();
        assert_eq!((rows, columns), (4, 5));
    }

    #[test]
    fn depleted_node_becomes_ready_after_ready_time() {
        let node = ResourceNode {
            id: "resource-1".to_string(),
            object_type: ObjectType::Tree,
            x: 0,
            y: 0,
            spawn_seed: "resource-1".to_string(),
            rng_state: None,
            spawns: Vec::new(),
            depleted: true,
            ready_time: 1_000,
            state: Vec::new(),
            last_update: 0,
        };
        assert!(!node.is_ready(999));
        assert!(node.is_ready(1_000));
    }

    #[test]
    fn job_serializes_tagged() {
        let job = Job::Craft {
            products: vec![ObjectType::WattleWall],
        };
        let encoded = serde_json::to_string(&job).unwrap();
        assert_eq!(encoded, r#"{"kind":"craft","products":["WATTLE_WALL"]}"#);
    }
}
