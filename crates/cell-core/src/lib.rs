//! Deterministic cell engine: RNG streams, the inventory engine, the
//! harvest spawner, timeline interpolators, construction rules, and the
//! cell planner.
//!
//! Client and server run this same crate — the client for predictive
//! simulation, the server worker for authoritative planning. Determinism is
//! load-bearing everywhere: no wall-clock reads, no unordered iteration,
//! no global entropy.

pub mod construction;
pub mod harvest;
pub mod interpolate;
pub mod inventory;
pub mod planner;
pub mod rng;

pub use construction::{
    build_stockpile_tile, construct_building, exterior_walls, remove_stockpile_tile,
    ConstructOutcome, ConstructionError, RemoveTileOutcome,
};
pub use harvest::{HarvestError, HarvestSpawner, SpawnOutcome};
pub use inventory::{
    add_item, craft, deposit_into_stockpile, drop_item, max_recipes_that_fit, pick_up,
    remove_by_recipe_item, withdraw_from_stockpile, CraftOutcome, InventoryError,
    InventoryHolder, InventoryTransaction, WithdrawOutcome,
};
pub use planner::{CellPlanner, PlanAction, PlanError, PlanEvent, PlanOutput};
pub use rng::CellRng;
