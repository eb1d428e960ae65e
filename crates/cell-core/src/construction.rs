//! Building and stockpile footprint rules: tile placement, join
//! constraints, wall accounting, and capacity-aware tile removal.
//!
//! Houses are built and torn down tile by tile; the same call toggles a
//! floor. Exterior wall segments are recomputed after every change and the
//! wall-count delta is settled against the actor's inventory in wattle
//! walls.

use std::collections::{BTreeMap, BTreeSet};

use contracts::actors::{House, Person, Stockpile, TilePos, WallSegment, WallSide};
use contracts::catalog::ObjectType;
use contracts::object::NetworkObject;
use contracts::recipes::RecipeItem;
use contracts::{Millis, Position};

use crate::inventory::{
    pick_up, remove_by_recipe_item, InventoryError, InventoryTransaction,
};

/// Maximum footprint extent, in tiles, along each axis.
pub const MAX_FOOTPRINT_TILES: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    /// A placement would bridge two distinct houses.
    CannotConnectBuildings,
    /// A placement would bridge two distinct stockpiles.
    CannotConnectStockpiles,
    BuildingTooLongEastWest,
    BuildingTooLongNorthSouth,
    StockpileTooLongEastWest,
    StockpileTooLongNorthSouth,
    /// Removing the tile would shrink capacity below the stored slot count.
    StockpileTileInUse,
    /// The target tile already belongs to a stockpile.
    TileOccupied,
    Inventory(InventoryError),
}

impl std::fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CannotConnectBuildings => write!(f, "Cannot connect two separate buildings"),
            Self::CannotConnectStockpiles => write!(f, "Cannot connect two separate stockpiles"),
            Self::BuildingTooLongEastWest => write!(f, "House is too long east to west"),
            Self::BuildingTooLongNorthSouth => write!(f, "House is too long north to south"),
            Self::StockpileTooLongEastWest => write!(f, "Stockpile is too long east to west"),
            Self::StockpileTooLongNorthSouth => write!(f, "Stockpile is too long north to south"),
            Self::StockpileTileInUse => write!(
                f,
                "Cannot remove stockpile tile, please remove items in inventory first"
            ),
            Self::TileOccupied => write!(f, "Tile already occupied"),
            Self::Inventory(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ConstructionError {}

impl From<InventoryError> for ConstructionError {
    fn from(err: InventoryError) -> Self {
        Self::Inventory(err)
    }
}

/// Result of one construct-building call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstructOutcome {
    /// House affected by the call; `None` after its last floor was removed.
    pub house_id: Option<String>,
    /// True when the call added a floor, false when it removed one.
    pub added: bool,
    /// Net change in exterior wall segments.
    pub wall_delta: i64,
    /// Wattle walls refunded on deconstruction. Items the actor's inventory
    /// could not absorb are left loose (`is_in_inventory == false`).
    pub refunds: Vec<NetworkObject>,
    /// Inventory deltas settled against the actor.
    pub transactions: Vec<InventoryTransaction>,
}

/// Exterior wall segments of a floor set: every tile edge with no same-house
/// floor behind it. Sorted for stable output.
pub fn exterior_walls(floors: &[TilePos]) -> Vec<WallSegment> {
    let set: BTreeSet<TilePos> = floors.iter().copied().collect();
    let mut walls = Vec::new();
    for tile in &set {
        let sides = [
            (WallSide::North, TilePos { tx: tile.tx, ty: tile.ty - 1 }),
            (WallSide::East, TilePos { tx: tile.tx + 1, ty: tile.ty }),
            (WallSide::South, TilePos { tx: tile.tx, ty: tile.ty + 1 }),
            (WallSide::West, TilePos { tx: tile.tx - 1, ty: tile.ty }),
        ];
        for (side, neighbor) in sides {
            if !set.contains(&neighbor) {
                walls.push(WallSegment { tile: *tile, side });
            }
        }
    }
    walls.sort();
    walls
}

fn footprint_extents(tiles: &[TilePos]) -> (i64, i64) {
    let min_x = tiles.iter().map(|t| t.tx).min().unwrap_or(0);
    let max_x = tiles.iter().map(|t| t.tx).max().unwrap_or(0);
    let min_y = tiles.iter().map(|t| t.ty).min().unwrap_or(0);
    let max_y = tiles.iter().map(|t| t.ty).max().unwrap_or(0);
    (max_x - min_x + 1, max_y - min_y + 1)
}

fn adjacent_ids<'a, I>(entries: I, tile: TilePos) -> Vec<String>
where
    I: Iterator<Item = (&'a String, &'a [TilePos])>,
{
    let neighbors = tile.neighbors();
    let mut ids = Vec::new();
    for (id, tiles) in entries {
        if tiles.iter().any(|t| neighbors.contains(t)) {
            ids.push(id.clone());
        }
    }
    ids
}

/// Settle a wall-count delta against the actor: positive consumes wattle
/// walls, negative refunds them one item at a time.
fn settle_walls(
    actor: &mut Person,
    delta: i64,
    tile: TilePos,
    now: Millis,
    outcome: &mut ConstructOutcome,
) -> Result<(), ConstructionError> {
    if delta > 0 {
        let tx = remove_by_recipe_item(
            actor,
            &RecipeItem {
                item: ObjectType::WattleWall,
                quantity: delta as u32,
            },
        )?;
        outcome.transactions.push(tx);
    } else {
        for _ in 0..(-delta) {
            let refund = NetworkObject::loose(
                actor.next_item_id(),
                ObjectType::WattleWall,
                tile.origin(),
                now,
            );
            match pick_up(actor, &refund) {
                Ok(tx) => {
                    let placed = tx
                        .updated_original
                        .clone()
                        .or_else(|| tx.stacked_into.first().cloned())
                        .unwrap_or_else(|| refund.clone());
                    outcome.refunds.push(placed);
                    outcome.transactions.push(tx);
                }
                // No room: the refund stays loose on the ground.
                Err(InventoryError::InventoryFull) => outcome.refunds.push(refund),
                Err(err) => return Err(err.into()),
            }
        }
    }
    outcome.wall_delta = delta;
    Ok(())
}

/// Toggle a floor tile of a house at `position`.
pub fn construct_building(
    houses: &mut BTreeMap<String, House>,
    actor: &mut Person,
    position: Position,
    now: Millis,
) -> Result<ConstructOutcome, ConstructionError> {
    let tile = TilePos::containing(position);
    let mut outcome = ConstructOutcome::default();

    // Deconstruction: the tile already carries a floor.
    let occupied = houses
        .iter()
        .find(|(_, house)| house.floors.contains(&tile))
        .map(|(id, _)| id.clone());
    if let Some(house_id) = occupied {
        let house = houses.get_mut(&house_id).expect("house exists");
        let old_walls = house.walls.len() as i64;
        house.floors.retain(|t| *t != tile);

        if house.floors.is_empty() {
            houses.remove(&house_id);
            outcome.house_id = None;
            outcome.added = false;
            settle_walls(actor, -old_walls, tile, now, &mut outcome)?;
            return Ok(outcome);
        }

        house.walls = exterior_walls(&house.floors);
        house.last_update = now;
        let delta = house.walls.len() as i64 - old_walls;
        outcome.house_id = Some(house_id);
        outcome.added = false;
        settle_walls(actor, delta, tile, now, &mut outcome)?;
        return Ok(outcome);
    }

    // Placement: join an adjacent house or found a new one.
    let adjacent = adjacent_ids(
        houses.iter().map(|(id, h)| (id, h.floors.as_slice())),
        tile,
    );
    match adjacent.len() {
        0 => {
            let id = actor.next_house_id();
            let floors = vec![tile];
            let walls = exterior_walls(&floors);
            let delta = walls.len() as i64;
            settle_walls(actor, delta, tile, now, &mut outcome)?;
            houses.insert(
                id.clone(),
                House {
                    id: id.clone(),
                    npc_id: None,
                    floors,
                    walls,
                    last_update: now,
                },
            );
            outcome.house_id = Some(id);
            outcome.added = true;
            Ok(outcome)
        }
        1 => {
            let house_id = adjacent.into_iter().next().expect("one id");
            let house = houses.get_mut(&house_id).expect("house exists");
            let mut candidate = house.floors.clone();
            candidate.push(tile);
            let (width, height) = footprint_extents(&candidate);
            if width > MAX_FOOTPRINT_TILES {
                return Err(ConstructionError::BuildingTooLongEastWest);
            }
            if height > MAX_FOOTPRINT_TILES {
                return Err(ConstructionError::BuildingTooLongNorthSouth);
            }

            let old_walls = house.walls.len() as i64;
            let walls = exterior_walls(&candidate);
            let delta = walls.len() as i64 - old_walls;
            settle_walls(actor, delta, tile, now, &mut outcome)?;

            let house = houses.get_mut(&house_id).expect("house exists");
            house.floors = candidate;
            house.walls = walls;
            house.last_update = now;
            outcome.house_id = Some(house_id);
            outcome.added = true;
            Ok(outcome)
        }
        _ => Err(ConstructionError::CannotConnectBuildings),
    }
}

/// Designate a stockpile tile at `position`, joining an adjacent stockpile
/// or starting a new one. Returns the id of the affected stockpile.
pub fn build_stockpile_tile(
    stockpiles: &mut BTreeMap<String, Stockpile>,
    actor: &mut Person,
    position: Position,
    now: Millis,
) -> Result<String, ConstructionError> {
    let tile = TilePos::containing(position);
    if stockpiles.values().any(|pile| pile.tiles.contains(&tile)) {
        return Err(ConstructionError::TileOccupied);
    }

    let adjacent = adjacent_ids(
        stockpiles.iter().map(|(id, p)| (id, p.tiles.as_slice())),
        tile,
    );
    match adjacent.len() {
        0 => {
            let id = actor.next_stockpile_id();
            stockpiles.insert(id.clone(), Stockpile::new(id.clone(), tile, now));
            Ok(id)
        }
        1 => {
            let pile_id = adjacent.into_iter().next().expect("one id");
            let pile = stockpiles.get_mut(&pile_id).expect("stockpile exists");
            let mut candidate = pile.tiles.clone();
            candidate.push(tile);
            let (width, height) = footprint_extents(&candidate);
            if width > MAX_FOOTPRINT_TILES {
                return Err(ConstructionError::StockpileTooLongEastWest);
            }
            if height > MAX_FOOTPRINT_TILES {
                return Err(ConstructionError::StockpileTooLongNorthSouth);
            }
            pile.tiles = candidate;
            let (rows, columns) = pile.scaled_dimensions();
            pile.inventory.rows = rows;
            pile.inventory.columns = columns;
            pile.last_update = now;
            Ok(pile_id)
        }
        _ => Err(ConstructionError::CannotConnectStockpiles),
    }
}

/// Result of removing a stockpile tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveTileOutcome {
    pub removed: bool,
    /// Set when the stockpile lost its last tile and was deleted.
    pub stockpile_deleted: Option<String>,
}

/// Remove the stockpile tile at `position`. Fails if the shrunken capacity
/// could not hold the stored slots.
pub fn remove_stockpile_tile(
    stockpiles: &mut BTreeMap<String, Stockpile>,
    position: Position,
    now: Millis,
) -> Result<RemoveTileOutcome, ConstructionError> {
    let tile = TilePos::containing(position);
    let Some(pile_id) = stockpiles
        .iter()
        .find(|(_, pile)| pile.tiles.contains(&tile))
        .map(|(id, _)| id.clone())
    else {
        return Ok(RemoveTileOutcome {
            removed: false,
            stockpile_deleted: None,
        });
    };

    let pile = stockpiles.get_mut(&pile_id).expect("stockpile exists");
    let remaining_tiles = pile.tiles.len() - 1;
    let shrunk_capacity =
        remaining_tiles * (contracts::actors::ROWS_PER_TILE * contracts::actors::COLS_PER_TILE) as usize;
    if pile.inventory.slots.len() > shrunk_capacity {
        return Err(ConstructionError::StockpileTileInUse);
    }

    pile.tiles.retain(|t| *t != tile);
    if pile.tiles.is_empty() {
        stockpiles.remove(&pile_id);
        return Ok(RemoveTileOutcome {
            removed: true,
            stockpile_deleted: Some(pile_id),
        });
    }
    let (rows, columns) = pile.scaled_dimensions();
    pile.inventory.rows = rows;
    pile.inventory.columns = columns;
    pile.last_update = now;
    Ok(RemoveTileOutcome {
        removed: true,
        stockpile_deleted: None,
    })
}
