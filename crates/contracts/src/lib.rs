//! Cross-boundary contracts shared by the client predictor and the server
//! planning worker: object-type catalog, recipes, world object records,
//! inventory shapes, request shapes, and serde helpers.
//!
//! Everything here is pure data. Engine logic lives in `cell-core`.

use serde::{Deserialize, Serialize};

pub mod actors;
pub mod catalog;
pub mod inventory;
pub mod object;
pub mod recipes;
pub mod requests;
pub mod serde_double_option;
pub mod serde_iso8601_ms;
pub mod serde_u64_string;
pub mod snapshot;
pub mod time;

pub use actors::{
    CellLock, House, Job, Npc, PathPoint, Person, ResourceNode, ResourcePatch,
    ResourceStateEntry, RngSeedState, Schedule, SpawnDef, Stockpile, TilePos, WallSegment,
    WallSide,
};
pub use catalog::{object_data, stack_limit, CatalogError, ObjectGroup, ObjectType, ObjectTypeData};
pub use inventory::{Inventory, InventoryStateEntry};
pub use object::{Health, NetworkObject, StateEntry, StatePatch};
pub use recipes::{recipe_for, recipes, Recipe, RecipeItem};
pub use requests::OperationRequest;
pub use snapshot::CellSnapshot;

pub const SCHEMA_VERSION_V1: &str = "1.0";

/// Absolute time in milliseconds since the Unix epoch. ISO-8601 at the serde
/// boundary, an integer everywhere else.
pub type Millis = i64;

/// Side of a world cell in pixels.
pub const CELL_SIZE: i64 = 2000;

/// Side of a building/stockpile tile in pixels.
pub const TILE_SIZE: i64 = 200;

/// A position in world pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another position.
    pub fn manhattan(&self, other: &Position) -> i64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// Identifier of the cell enclosing a position, derived by floor-division.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId {
    pub cx: i64,
    pub cy: i64,
}

impl CellId {
    pub fn containing(pos: Position) -> Self {
        Self {
            cx: pos.x.div_euclid(CELL_SIZE),
            cy: pos.y.div_euclid(CELL_SIZE),
        }
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cell:{}:{}", self.cx, self.cy)
    }
}

/// Pass-through error kind owned by the procedural-terrain collaborator.
/// Declared here so both sides report it with a stable discriminant; the
/// planner never raises it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollaboratorError {
    SourceOrMiddleContinentMissing,
}

impl std::fmt::Display for CollaboratorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceOrMiddleContinentMissing => {
                write!(f, "Source or middle continent missing")
            }
        }
    }
}

impl std::error::Error for CollaboratorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_id_floor_divides_negative_coordinates() {
        assert_eq!(
            CellId::containing(Position::new(-1, 0)),
            CellId { cx: -1, cy: 0 }
        );
        assert_eq!(
            CellId::containing(Position::new(1999, 2000)),
            CellId { cx: 0, cy: 1 }
        );
    }

    #[test]
    fn manhattan_distance_is_symmetric() {
        let a = Position::new(10, -30);
        let b = Position::new(-5, 12);
        assert_eq!(a.manhattan(&b), b.manhattan(&a));
        assert_eq!(a.manhattan(&b), 15 + 42);
    }
}
