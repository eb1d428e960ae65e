//! The cell planner: an event-driven, deterministic simulator over one
//! cell's NPCs, resource nodes, stockpiles, and loose objects.
//!
//! The planner replays no wall clock. It is handed a pre-interpolated
//! snapshot and a start time, walks a queue of NPC-ready events forward, and
//! emits timelines (paths, object states, inventory deltas) the client
//! replays at display time. Given identical inputs two runs produce
//! byte-identical outputs.

use std::collections::{BTreeMap, BTreeSet};

use contracts::actors::{Job, Npc, PathPoint, ResourcePatch, ResourceStateEntry};
use contracts::inventory::InventoryStateEntry;
use contracts::object::{NetworkObject, StateEntry, StatePatch};
use contracts::recipes::{recipe_for, Recipe};
use contracts::snapshot::CellSnapshot;
use contracts::time::{day_night_ms, DAY_MS};
use contracts::{Millis, Position};
use serde::{Deserialize, Serialize};

use crate::harvest::{HarvestError, HarvestSpawner};
use crate::interpolate::truncate_after_pause;
use crate::inventory::{
    self, deposit_into_stockpile, drop_item, max_recipes_that_fit, pick_up,
    withdraw_from_stockpile, InventoryError, InventoryTransaction,
};
use crate::rng::CellRng;

/// Settle time after a walk before the action at the destination fires.
pub const WAIT_AFTER_WALK: Millis = 2_000;

/// Settle time between a harvest landing and the item pickup.
pub const WAIT_AFTER_PICKUP: Millis = 2_000;

/// Walking speed: milliseconds per pixel along a Manhattan path.
pub const WALK_MS_PER_PIXEL: Millis = 10;

/// Scan-clock step when no NPC is ready or an action cannot make progress.
const RESCAN_MS: Millis = 1_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A freshly spawned object reached finalization with no state events.
    SpawnObjectEmptyState(String),
    /// A resource generated events but is missing from the input set.
    InitialResourceNotFound(String),
    /// A stockpile generated deltas but is missing from the input set.
    InitialStockpileNotFound(String),
    Harvest(HarvestError),
    Inventory(InventoryError),
}

impl std::fmt::Display for PlanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SpawnObjectEmptyState(id) => {
                write!(f, "Spawned object {id} has an empty state")
            }
            Self::InitialResourceNotFound(id) => write!(f, "Initial resource {id} not found"),
            Self::InitialStockpileNotFound(id) => {
                write!(f, "Initial stockpile {id} not found")
            }
            Self::Harvest(err) => write!(f, "{err}"),
            Self::Inventory(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for PlanError {}

impl From<HarvestError> for PlanError {
    fn from(err: HarvestError) -> Self {
        Self::Harvest(err)
    }
}

impl From<InventoryError> for PlanError {
    fn from(err: InventoryError) -> Self {
        Self::Inventory(err)
    }
}

// ---------------------------------------------------------------------------
// Observability
// ---------------------------------------------------------------------------

/// One scheduled NPC action, for audit logs and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PlanAction {
    Walk { to_x: i64, to_y: i64 },
    Harvest { resource_id: String, object_id: String },
    PickUp { object_id: String },
    Deposit { stockpile_id: String, object_id: String },
    Withdraw { stockpile_id: String, object_id: String, amount: u32 },
    Craft { product: contracts::ObjectType, batches: u32 },
    Idle,
    Sleep,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEvent {
    #[serde(with = "contracts::serde_iso8601_ms")]
    pub time: Millis,
    pub npc_id: String,
    #[serde(flatten)]
    pub action: PlanAction,
}

/// Finished run: the snapshot with timelines appended plus the audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanOutput {
    pub snapshot: CellSnapshot,
    pub events: Vec<PlanEvent>,
}

// ---------------------------------------------------------------------------
// Planner state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
struct ReadyEvent {
    ready_time: Millis,
    npc_id: String,
}

/// Initial holder state, restored at finalization so the output carries the
/// start-of-run snapshot with all mutations pending in timelines.
#[derive(Debug, Clone)]
struct InitialState {
    npc_positions: BTreeMap<String, Position>,
    npc_inventories: BTreeMap<String, contracts::Inventory>,
    stockpile_inventories: BTreeMap<String, contracts::Inventory>,
    resource_status: BTreeMap<String, (bool, Millis)>,
}

enum Dispatch {
    /// The NPC acted; it is next eligible at `completion`.
    Acted { completion: Millis },
    /// Nothing actionable; re-scan after a clock step.
    Wait,
}

pub struct CellPlanner {
    snapshot: CellSnapshot,
    start_time: Millis,
    sim_clock: Millis,
    queue: Vec<ReadyEvent>,
    // Per-run buffered timelines, merged into the snapshot at finalization.
    object_events: BTreeMap<String, Vec<StateEntry>>,
    resource_events: BTreeMap<String, Vec<ResourceStateEntry>>,
    npc_deltas: BTreeMap<String, Vec<InventoryStateEntry>>,
    stockpile_deltas: BTreeMap<String, Vec<InventoryStateEntry>>,
    spawned_ids: BTreeSet<String>,
    events: Vec<PlanEvent>,
    initial: Option<InitialState>,
}

impl CellPlanner {
    /// Build a planner over a pre-interpolated snapshot: positions and
    /// inventories must already reflect wall-clock at planning start.
    pub fn new(snapshot: CellSnapshot) -> Self {
        Self {
            snapshot,
            start_time: 0,
            sim_clock: 0,
            queue: Vec::new(),
            object_events: BTreeMap::new(),
            resource_events: BTreeMap::new(),
            npc_deltas: BTreeMap::new(),
            stockpile_deltas: BTreeMap::new(),
            spawned_ids: BTreeSet::new(),
            events: Vec::new(),
            initial: None,
        }
    }

    /// Run the planning loop for `max_milliseconds` of simulated time from
    /// `start_time`. The caller reads the wall clock exactly once to supply
    /// `start_time`; the planner itself never does.
    pub fn run(&mut self, start_time: Millis, max_milliseconds: Millis) -> Result<(), PlanError> {
        self.start_time = start_time;
        self.sim_clock = 0;
        self.capture_initial_state();

        // Splice: drop path points already in the past.
        for npc in self.snapshot.npcs.values_mut() {
            npc.path.retain(|point| point.time >= start_time);
        }

        self.queue = self
            .snapshot
            .npcs
            .values()
            .map(|npc| ReadyEvent {
                ready_time: npc.ready_time.max(start_time),
                npc_id: npc.id.clone(),
            })
            .collect();

        let pause_date = self.snapshot.cell_lock.pause_date;
        while self.sim_clock < max_milliseconds {
            let now = self.start_time + self.sim_clock;
            if let Some(pause) = pause_date {
                if now >= pause {
                    break;
                }
            }

            // Sorted ascending each iteration; ties break by NPC id.
            self.queue
                .sort_by(|a, b| a.ready_time.cmp(&b.ready_time).then(a.npc_id.cmp(&b.npc_id)));
            let Some(index) = self.queue.iter().position(|event| event.ready_time <= now) else {
                self.sim_clock += RESCAN_MS;
                continue;
            };
            let event = self.queue.remove(index);
            let Some(mut npc) = self.snapshot.npcs.remove(&event.npc_id) else {
                continue;
            };

            let dispatch = self.dispatch(&mut npc, now)?;
            match dispatch {
                Dispatch::Acted { completion } => {
                    let completion = if completion <= now { now + RESCAN_MS } else { completion };
                    npc.ready_time = completion;
                    self.queue.push(ReadyEvent {
                        ready_time: completion,
                        npc_id: npc.id.clone(),
                    });
                    self.snapshot.npcs.insert(npc.id.clone(), npc);
                    self.sim_clock = completion - self.start_time;
                }
                Dispatch::Wait => {
                    self.queue.push(event);
                    self.snapshot.npcs.insert(npc.id.clone(), npc);
                    self.sim_clock += RESCAN_MS;
                }
            }
        }

        Ok(())
    }

    /// Consume the planner and produce the finalized collections.
    pub fn into_state(mut self) -> Result<PlanOutput, PlanError> {
        self.finalize()?;
        Ok(PlanOutput {
            snapshot: self.snapshot,
            events: self.events,
        })
    }

    // -----------------------------------------------------------------------
    // Dispatch
    // -----------------------------------------------------------------------

    fn dispatch(&mut self, npc: &mut Npc, now: Millis) -> Result<Dispatch, PlanError> {
        if let Some(wake_at) = sleeping_until(npc, now) {
            return self.sleep_routine(npc, now, wake_at);
        }

        match npc.job.clone() {
            Job::Gather => self.gather_routine(npc, now),
            Job::Craft { products } => self.craft_routine(npc, now, &products),
            // Haul is declared but its transfer plan is not specified yet;
            // haulers head home until they are given a real job.
            Job::Haul => self.idle_routine(npc, now),
        }
    }

    fn gather_routine(&mut self, npc: &mut Npc, now: Millis) -> Result<Dispatch, PlanError> {
        if !npc.inventory.has_free_slot() {
            return self.deposit_routine(npc, now);
        }

        let Some(resource_id) = self.nearest_ready_resource(npc.position(), now) else {
            return Ok(Dispatch::Wait);
        };

        let target = self.snapshot.resources[&resource_id].position();
        let arrival = self.walk_npc(npc, target, now);
        let harvest_time = arrival + WAIT_AFTER_WALK;

        let node = self
            .snapshot
            .resources
            .get_mut(&resource_id)
            .expect("resource selected above");
        let mut spawner = HarvestSpawner::for_node(node)?;
        let outcome = spawner.spawn();
        node.rng_state = Some(spawner.save_state());

        let respawn_time = harvest_time + outcome.respawn_delay;
        node.depleted = true;
        node.ready_time = respawn_time;
        let node_events = self.resource_events.entry(resource_id.clone()).or_default();
        node_events.push(ResourceStateEntry {
            time: harvest_time,
            patch: ResourcePatch {
                depleted: Some(true),
                ready_time: Some(respawn_time),
            },
        });
        node_events.push(ResourceStateEntry {
            time: respawn_time,
            patch: ResourcePatch {
                depleted: Some(false),
                ready_time: None,
            },
        });

        // The item exists from harvest time; it is picked up a beat later.
        let mut item = outcome.spawn;
        item.last_update = now;
        self.spawned_ids.insert(item.id.clone());
        self.push_object_event(
            &item.id,
            harvest_time,
            StatePatch {
                exist: Some(true),
                ..StatePatch::default()
            },
        );

        let pickup_time = harvest_time + WAIT_AFTER_PICKUP;
        let transaction = pick_up(npc, &item)?;
        self.record_npc_pickup(npc, &item, &transaction, pickup_time);
        self.snapshot.objects.insert(item.id.clone(), item.clone());

        self.events.push(PlanEvent {
            time: harvest_time,
            npc_id: npc.id.clone(),
            action: PlanAction::Harvest {
                resource_id,
                object_id: item.id.clone(),
            },
        });
        self.events.push(PlanEvent {
            time: pickup_time,
            npc_id: npc.id.clone(),
            action: PlanAction::PickUp { object_id: item.id },
        });

        Ok(Dispatch::Acted {
            completion: pickup_time,
        })
    }

    fn craft_routine(
        &mut self,
        npc: &mut Npc,
        now: Millis,
        products: &[contracts::ObjectType],
    ) -> Result<Dispatch, PlanError> {
        if !npc.inventory.is_empty() {
            return self.deposit_routine(npc, now);
        }
        if products.is_empty() {
            return self.idle_routine(npc, now);
        }

        let mut rng = match &npc.crafting_rng.state {
            Some(state) => CellRng::from_state(state),
            None => CellRng::from_seed_str(&npc.crafting_rng.seed),
        };
        let index = ((rng.next_f64() * products.len() as f64) as usize).min(products.len() - 1);
        npc.crafting_rng.state = Some(rng.save_state());
        let product = products[index];
        let Some(recipe) = recipe_for(product) else {
            return self.idle_routine(npc, now);
        };

        let capacity_batches = max_recipes_that_fit(&npc.inventory, recipe)?;
        if capacity_batches == 0 {
            return self.idle_routine(npc, now);
        }

        let Some((stockpile_id, stocked_batches)) =
            self.nearest_stocked_pile(npc.position(), recipe)
        else {
            return self.idle_routine(npc, now);
        };
        let batches = capacity_batches.min(stocked_batches);

        let pile_pos = self.snapshot.stockpiles[&stockpile_id].position();
        let arrival = self.walk_npc(npc, pile_pos, now);
        let batches =
            self.withdraw_recipe_inputs(npc, &stockpile_id, recipe, batches, arrival, &mut rng)?;

        let home = self.home_of(&npc.id);
        let craft_time = match home {
            Some(target) => self.walk_npc(npc, target, arrival),
            None => arrival,
        };

        for _ in 0..batches {
            let outcome = inventory::craft(npc, recipe, &mut rng)?;
            for id in &outcome.transaction.deleted_ids {
                self.push_object_event(
                    id,
                    craft_time,
                    StatePatch {
                        exist: Some(false),
                        ..StatePatch::default()
                    },
                );
            }
            for slot in &outcome.transaction.modified_slots {
                self.push_object_event(
                    &slot.id,
                    craft_time,
                    StatePatch {
                        amount: Some(slot.amount),
                        ..StatePatch::default()
                    },
                );
            }

            let product_slot = outcome.product.clone();
            self.spawned_ids.insert(product_slot.id.clone());
            self.push_object_event(
                &product_slot.id,
                craft_time,
                StatePatch {
                    exist: Some(true),
                    is_in_inventory: Some(true),
                    grabbed_by_npc_id: Some(Some(npc.id.clone())),
                    ..StatePatch::default()
                },
            );
            let mut world_copy = product_slot.clone();
            world_copy.exist = false;
            self.snapshot
                .objects
                .insert(world_copy.id.clone(), world_copy);

            self.npc_deltas
                .entry(npc.id.clone())
                .or_default()
                .push(InventoryStateEntry {
                    time: craft_time,
                    add: vec![product_slot],
                    modified: outcome.transaction.modified_slots.clone(),
                    remove: outcome.transaction.deleted_ids.clone(),
                    rows: None,
                    columns: None,
                });
        }
        npc.crafting_rng.state = Some(rng.save_state());

        if batches > 0 {
            self.events.push(PlanEvent {
                time: craft_time,
                npc_id: npc.id.clone(),
                action: PlanAction::Craft { product, batches },
            });
        }

        Ok(Dispatch::Acted {
            completion: craft_time,
        })
    }

    /// Walk to the nearest stockpile with room and transfer slots one by one
    /// until the NPC is empty or the stockpile fills.
    fn deposit_routine(&mut self, npc: &mut Npc, now: Millis) -> Result<Dispatch, PlanError> {
        let Some(stockpile_id) = self.nearest_open_pile(npc.position()) else {
            return self.idle_routine(npc, now);
        };

        let target = self.snapshot.stockpiles[&stockpile_id].position();
        let arrival = self.walk_npc(npc, target, now);

        let slot_ids: Vec<String> = npc.inventory.slots.iter().map(|s| s.id.clone()).collect();
        let mut deposited_any = false;
        for slot_id in slot_ids {
            let dropped = drop_item(npc, &slot_id);
            let Some(item) = dropped.updated_original else {
                continue;
            };

            let pile = self
                .snapshot
                .stockpiles
                .get_mut(&stockpile_id)
                .expect("stockpile selected above");
            let deposit = match deposit_into_stockpile(pile, &item) {
                Ok(tx) => tx,
                Err(InventoryError::InventoryFull) => {
                    // Stockpile filled mid-transfer: the slot stays with the
                    // NPC; put it back and stop.
                    pick_up(npc, &item)?;
                    break;
                }
                Err(err) => return Err(err.into()),
            };

            // Matched drop/deposit object events at the arrival timestamp.
            self.ensure_object(&item);
            if let Some(stacked) = deposit.stacked_into.first() {
                self.ensure_object(stacked);
            }
            self.push_object_event(
                &slot_id,
                arrival,
                StatePatch {
                    grabbed_by_npc_id: Some(None),
                    is_in_inventory: Some(false),
                    ..StatePatch::default()
                },
            );
            if let Some(stored) = &deposit.updated_original {
                self.push_object_event(
                    &slot_id,
                    arrival,
                    StatePatch {
                        inside_stockpile: Some(Some(stockpile_id.clone())),
                        is_in_inventory: Some(true),
                        x: Some(stored.x),
                        y: Some(stored.y),
                        ..StatePatch::default()
                    },
                );
            } else if let Some(stacked) = deposit.stacked_into.first() {
                self.push_object_event(
                    &slot_id,
                    arrival,
                    StatePatch {
                        exist: Some(false),
                        ..StatePatch::default()
                    },
                );
                self.push_object_event(
                    &stacked.id,
                    arrival,
                    StatePatch {
                        amount: Some(stacked.amount),
                        ..StatePatch::default()
                    },
                );
            }

            self.npc_deltas
                .entry(npc.id.clone())
                .or_default()
                .push(InventoryStateEntry {
                    time: arrival,
                    remove: vec![slot_id.clone()],
                    ..InventoryStateEntry::default()
                });
            self.stockpile_deltas
                .entry(stockpile_id.clone())
                .or_default()
                .push(delta_from_transaction(arrival, &deposit));

            self.events.push(PlanEvent {
                time: arrival,
                npc_id: npc.id.clone(),
                action: PlanAction::Deposit {
                    stockpile_id: stockpile_id.clone(),
                    object_id: slot_id,
                },
            });
            deposited_any = true;
        }

        if !deposited_any {
            return self.idle_routine(npc, arrival.max(now));
        }
        Ok(Dispatch::Acted { completion: arrival })
    }

    fn idle_routine(&mut self, npc: &mut Npc, now: Millis) -> Result<Dispatch, PlanError> {
        let arrival = match self.home_of(&npc.id) {
            Some(home) => self.walk_npc(npc, home, now),
            None => now,
        };
        self.events.push(PlanEvent {
            time: arrival,
            npc_id: npc.id.clone(),
            action: PlanAction::Idle,
        });
        Ok(Dispatch::Acted { completion: arrival })
    }

    fn sleep_routine(
        &mut self,
        npc: &mut Npc,
        now: Millis,
        wake_at: Millis,
    ) -> Result<Dispatch, PlanError> {
        let arrival = match self.home_of(&npc.id) {
            Some(home) => self.walk_npc(npc, home, now),
            None => now,
        };
        self.events.push(PlanEvent {
            time: arrival,
            npc_id: npc.id.clone(),
            action: PlanAction::Sleep,
        });
        Ok(Dispatch::Acted {
            completion: wake_at.max(arrival),
        })
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Append a Manhattan walk (vertical leg, then horizontal) to the NPC's
    /// path and advance its live position. Returns the arrival time.
    fn walk_npc(&mut self, npc: &mut Npc, target: Position, depart: Millis) -> Millis {
        let from = npc.position();
        if from == target {
            return depart;
        }

        let mut points = vec![PathPoint {
            time: depart,
            x: from.x,
            y: from.y,
        }];
        let mut clock = depart;
        if target.y != from.y {
            clock += (target.y - from.y).abs() * WALK_MS_PER_PIXEL;
            points.push(PathPoint {
                time: clock,
                x: from.x,
                y: target.y,
            });
        }
        if target.x != from.x {
            clock += (target.x - from.x).abs() * WALK_MS_PER_PIXEL;
            points.push(PathPoint {
                time: clock,
                x: target.x,
                y: target.y,
            });
        }

        npc.path.extend(points);
        npc.x = target.x;
        npc.y = target.y;
        self.events.push(PlanEvent {
            time: depart,
            npc_id: npc.id.clone(),
            action: PlanAction::Walk {
                to_x: target.x,
                to_y: target.y,
            },
        });
        clock
    }

    fn nearest_ready_resource(&self, from: Position, now: Millis) -> Option<String> {
        self.snapshot
            .resources
            .values()
            .filter(|node| node.is_ready(now) && !node.spawns.is_empty())
            .min_by_key(|node| (from.manhattan(&node.position()), node.id.clone()))
            .map(|node| node.id.clone())
    }

    fn nearest_open_pile(&self, from: Position) -> Option<String> {
        self.snapshot
            .stockpiles
            .values()
            .filter(|pile| pile.inventory.has_free_slot())
            .min_by_key(|pile| (from.manhattan(&pile.position()), pile.id.clone()))
            .map(|pile| pile.id.clone())
    }

    /// Nearest stockpile holding at least one batch of the recipe's inputs,
    /// with the number of whole batches it can supply.
    fn nearest_stocked_pile(&self, from: Position, recipe: &Recipe) -> Option<(String, u32)> {
        self.snapshot
            .stockpiles
            .values()
            .filter_map(|pile| {
                let batches = recipe
                    .items
                    .iter()
                    .map(|input| {
                        (pile.inventory.total_of(input.item) / u64::from(input.quantity)) as u32
                    })
                    .min()
                    .unwrap_or(0);
                (batches > 0).then(|| (pile, batches))
            })
            .min_by_key(|(pile, _)| (from.manhattan(&pile.position()), pile.id.clone()))
            .map(|(pile, batches)| (pile.id.clone(), batches))
    }

    fn home_of(&self, npc_id: &str) -> Option<Position> {
        self.snapshot
            .houses
            .values()
            .find(|house| house.npc_id.as_deref() == Some(npc_id))
            .map(|house| house.position())
    }

    /// Withdraw up to `batches` worth of recipe inputs at `arrival`,
    /// stack-limit sized chunks at a time, handing each chunk to the NPC.
    ///
    /// Returns the whole batches actually covered. Fragmented stockpile
    /// stacks can fill the NPC before the target is met; withdrawal then
    /// stops early and the surplus is deposited back on the next cycle.
    fn withdraw_recipe_inputs(
        &mut self,
        npc: &mut Npc,
        stockpile_id: &str,
        recipe: &Recipe,
        batches: u32,
        arrival: Millis,
        rng: &mut CellRng,
    ) -> Result<u32, PlanError> {
        let mut covered = batches;
        'inputs: for input in &recipe.items {
            let limit = contracts::catalog::stack_limit(input.item)
                .map_err(InventoryError::Catalog)?;
            let target = input.quantity * batches;
            let mut need = target;
            while need > 0 {
                let pile = self
                    .snapshot
                    .stockpiles
                    .get_mut(stockpile_id)
                    .expect("stockpile selected above");
                let Some(slot) = pile
                    .inventory
                    .slots
                    .iter()
                    .find(|slot| slot.object_type == input.item)
                    .cloned()
                else {
                    covered = covered.min((target - need) / input.quantity);
                    continue 'inputs;
                };

                let chunk = need.min(limit).min(slot.amount);
                if !npc_can_accept(npc, input.item, chunk, limit) {
                    covered = covered.min((target - need) / input.quantity);
                    continue 'inputs;
                }
                let outcome = withdraw_from_stockpile(pile, &slot.id, chunk, rng)?;
                need -= chunk;

                self.stockpile_deltas
                    .entry(stockpile_id.to_string())
                    .or_default()
                    .push(delta_from_transaction(arrival, &outcome.transaction));
                for modified in outcome.transaction.modified_slots.clone() {
                    self.ensure_object(&modified);
                }
                for modified in &outcome.transaction.modified_slots {
                    self.push_object_event(
                        &modified.id,
                        arrival,
                        StatePatch {
                            amount: Some(modified.amount),
                            ..StatePatch::default()
                        },
                    );
                }

                let item = outcome.item;
                let is_split = !outcome.transaction.deleted_ids.contains(&item.id);
                if is_split {
                    // A partial split mints a new world object.
                    self.spawned_ids.insert(item.id.clone());
                    let mut world_copy = item.clone();
                    world_copy.exist = false;
                    self.snapshot
                        .objects
                        .insert(world_copy.id.clone(), world_copy);
                    self.push_object_event(
                        &item.id,
                        arrival,
                        StatePatch {
                            exist: Some(true),
                            ..StatePatch::default()
                        },
                    );
                } else {
                    self.ensure_object(&item);
                    self.push_object_event(
                        &item.id,
                        arrival,
                        StatePatch {
                            inside_stockpile: Some(None),
                            is_in_inventory: Some(false),
                            ..StatePatch::default()
                        },
                    );
                }

                let transaction = pick_up(npc, &item)?;
                self.record_npc_pickup(npc, &item, &transaction, arrival);

                self.events.push(PlanEvent {
                    time: arrival,
                    npc_id: npc.id.clone(),
                    action: PlanAction::Withdraw {
                        stockpile_id: stockpile_id.to_string(),
                        object_id: item.id.clone(),
                        amount: chunk,
                    },
                });
            }
        }
        Ok(covered)
    }

    /// Emit the object event and NPC inventory delta for a pickup at `time`.
    fn record_npc_pickup(
        &mut self,
        npc: &Npc,
        item: &NetworkObject,
        transaction: &InventoryTransaction,
        time: Millis,
    ) {
        self.ensure_object(item);
        if let Some(stacked) = transaction.stacked_into.first() {
            self.ensure_object(stacked);
        }
        if let Some(slot) = &transaction.updated_original {
            self.push_object_event(
                &item.id,
                time,
                StatePatch {
                    is_in_inventory: Some(true),
                    grabbed_by_npc_id: Some(Some(npc.id.clone())),
                    ..StatePatch::default()
                },
            );
            self.npc_deltas
                .entry(npc.id.clone())
                .or_default()
                .push(InventoryStateEntry {
                    time,
                    add: vec![slot.clone()],
                    ..InventoryStateEntry::default()
                });
        } else if let Some(stacked) = transaction.stacked_into.first() {
            // The item merged away: it stops existing and the absorbing
            // stack grows.
            self.push_object_event(
                &item.id,
                time,
                StatePatch {
                    exist: Some(false),
                    ..StatePatch::default()
                },
            );
            self.push_object_event(
                &stacked.id,
                time,
                StatePatch {
                    amount: Some(stacked.amount),
                    ..StatePatch::default()
                },
            );
            self.npc_deltas
                .entry(npc.id.clone())
                .or_default()
                .push(InventoryStateEntry {
                    time,
                    modified: vec![stacked.clone()],
                    ..InventoryStateEntry::default()
                });
        }
    }

    fn push_object_event(&mut self, object_id: &str, time: Millis, patch: StatePatch) {
        self.object_events
            .entry(object_id.to_string())
            .or_default()
            .push(StateEntry { time, patch });
    }

    /// Make sure a world record exists for an item the planner touched.
    /// Slots arriving inside input inventories have no standalone record
    /// until their first scheduled event.
    fn ensure_object(&mut self, item: &NetworkObject) {
        if !self.snapshot.objects.contains_key(&item.id) {
            let mut record = item.clone();
            record.state.clear();
            self.snapshot.objects.insert(record.id.clone(), record);
        }
    }

    // -----------------------------------------------------------------------
    // Initial capture and finalization
    // -----------------------------------------------------------------------

    fn capture_initial_state(&mut self) {
        self.initial = Some(InitialState {
            npc_positions: self
                .snapshot
                .npcs
                .iter()
                .map(|(id, npc)| (id.clone(), npc.position()))
                .collect(),
            npc_inventories: self
                .snapshot
                .npcs
                .iter()
                .map(|(id, npc)| (id.clone(), npc.inventory.clone()))
                .collect(),
            stockpile_inventories: self
                .snapshot
                .stockpiles
                .iter()
                .map(|(id, pile)| (id.clone(), pile.inventory.clone()))
                .collect(),
            resource_status: self
                .snapshot
                .resources
                .iter()
                .map(|(id, node)| (id.clone(), (node.depleted, node.ready_time)))
                .collect(),
        });
    }

    /// Merge buffered timelines into the snapshot and restore start-of-run
    /// holder state, leaving every mutation pending for replay.
    fn finalize(&mut self) -> Result<(), PlanError> {
        let start_time = self.start_time;
        let pause_date = self.snapshot.cell_lock.pause_date;
        if self.initial.is_none() {
            self.capture_initial_state();
        }
        let initial = self.initial.take().expect("initial state captured");

        // NPCs: restore start position/inventory; timelines stay appended.
        for (id, npc) in self.snapshot.npcs.iter_mut() {
            if let Some(position) = initial.npc_positions.get(id) {
                npc.x = position.x;
                npc.y = position.y;
            }
            if let Some(inventory) = initial.npc_inventories.get(id) {
                npc.inventory = inventory.clone();
            }
            if let Some(deltas) = self.npc_deltas.remove(id) {
                npc.inventory_state.extend(deltas);
            }
            npc.last_update = start_time;
            if let Some(pause) = pause_date {
                truncate_after_pause(&mut npc.inventory_state, pause, |entry| entry.time);
                truncate_after_pause(&mut npc.path, pause, |point| point.time);
                npc.ready_time = npc.ready_time.min(pause);
            }
        }

        // Stockpiles: same discipline; missing ids are a consistency error.
        let stockpile_deltas = std::mem::take(&mut self.stockpile_deltas);
        for (id, deltas) in stockpile_deltas {
            let Some(pile) = self.snapshot.stockpiles.get_mut(&id) else {
                return Err(PlanError::InitialStockpileNotFound(id));
            };
            pile.inventory_state.extend(deltas);
        }
        for (id, pile) in self.snapshot.stockpiles.iter_mut() {
            if let Some(inventory) = initial.stockpile_inventories.get(id) {
                pile.inventory = inventory.clone();
            }
            pile.last_update = start_time;
            if let Some(pause) = pause_date {
                truncate_after_pause(&mut pile.inventory_state, pause, |entry| entry.time);
            }
        }

        // Resources: only this run's events survive; prior ones were baked
        // in by pre-interpolation.
        let resource_events = std::mem::take(&mut self.resource_events);
        for node in self.snapshot.resources.values_mut() {
            node.state.clear();
        }
        for (id, events) in resource_events {
            let Some(node) = self.snapshot.resources.get_mut(&id) else {
                return Err(PlanError::InitialResourceNotFound(id));
            };
            node.state = events;
        }
        for (id, node) in self.snapshot.resources.iter_mut() {
            if let Some((depleted, ready_time)) = initial.resource_status.get(id) {
                node.depleted = *depleted;
                node.ready_time = *ready_time;
            }
            node.last_update = start_time;
            if let Some(pause) = pause_date {
                truncate_after_pause(&mut node.state, pause, |entry| entry.time);
            }
        }

        // Objects: keep future entries, append this run's, drop garbage.
        for object in self.snapshot.objects.values_mut() {
            object.state.retain(|entry| entry.time > start_time);
        }
        let object_events = std::mem::take(&mut self.object_events);
        for (id, events) in object_events {
            if let Some(object) = self.snapshot.objects.get_mut(&id) {
                object.state.extend(events);
            }
        }
        let mut finalized = BTreeMap::new();
        for (id, mut object) in std::mem::take(&mut self.snapshot.objects) {
            object.state.sort_by_key(|entry| entry.time);
            if let Some(pause) = pause_date {
                truncate_after_pause(&mut object.state, pause, |entry| entry.time);
            }
            if self.spawned_ids.contains(&id) && object.state.is_empty() {
                return Err(PlanError::SpawnObjectEmptyState(id));
            }
            if !object.exist && object.state.is_empty() {
                // Logically garbage: nothing will ever bring it back.
                continue;
            }
            object.last_update = start_time;
            finalized.insert(id, object);
        }
        self.snapshot.objects = finalized;

        self.events.sort_by(|a, b| {
            a.time
                .cmp(&b.time)
                .then_with(|| a.npc_id.cmp(&b.npc_id))
        });
        if let Some(pause) = pause_date {
            truncate_after_pause(&mut self.events, pause, |event| event.time);
        }
        Ok(())
    }
}

/// Whether the NPC's inventory can absorb a chunk of `item_type`: a
/// same-type stack with room, or a free slot.
fn npc_can_accept(npc: &Npc, item_type: contracts::ObjectType, chunk: u32, limit: u32) -> bool {
    npc.inventory
        .slots
        .iter()
        .any(|slot| slot.object_type == item_type && slot.amount + chunk <= limit)
        || npc.inventory.has_free_slot()
}

/// Absolute wake time if the NPC's schedule has it asleep at `now`.
fn sleeping_until(npc: &Npc, now: Millis) -> Option<Millis> {
    let schedule = npc.schedule;
    if schedule.wake <= 0 && schedule.sleep >= DAY_MS {
        return None;
    }
    let cycle = day_night_ms(now);
    if cycle >= schedule.wake && cycle < schedule.sleep {
        return None;
    }
    let today_wake = now - cycle + schedule.wake;
    if cycle < schedule.wake {
        Some(today_wake)
    } else {
        Some(today_wake + DAY_MS)
    }
}

/// Build an inventory-state delta from an engine transaction.
fn delta_from_transaction(time: Millis, tx: &InventoryTransaction) -> InventoryStateEntry {
    InventoryStateEntry {
        time,
        add: tx.updated_original.clone().into_iter().collect(),
        modified: tx
            .stacked_into
            .iter()
            .chain(tx.modified_slots.iter())
            .cloned()
            .collect(),
        remove: tx.deleted_ids.clone(),
        rows: None,
        columns: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::actors::{ResourceNode, Schedule, SpawnDef, Stockpile, TilePos};
    use contracts::catalog::ObjectType;

    fn gatherer(id: &str, pos: Position) -> Npc {
        Npc::new(id, pos, Job::Gather)
    }

    fn tree(id: &str, pos: Position) -> ResourceNode {
        ResourceNode {
            id: id.to_string(),
            object_type: ObjectType::Tree,
            x: pos.x,
            y: pos.y,
            spawn_seed: id.to_string(),
            rng_state: None,
            spawns: vec![SpawnDef {
                object_type: ObjectType::Stick,
                probability: 1.0,
                spawn_time: 60_000,
            }],
            depleted: false,
            ready_time: 0,
            state: Vec::new(),
            last_update: 0,
        }
    }

    fn snapshot_with(npcs: Vec<Npc>, resources: Vec<ResourceNode>) -> CellSnapshot {
        let mut snapshot = CellSnapshot::default();
        for npc in npcs {
            snapshot.insert_npc(npc);
        }
        for node in resources {
            snapshot.insert_resource(node);
        }
        snapshot
    }

    #[test]
    fn walk_is_vertical_leg_then_horizontal() {
        let snapshot = snapshot_with(vec![gatherer("npc-1", Position::new(0, 0))], Vec::new());
        let mut planner = CellPlanner::new(snapshot);
        let mut npc = gatherer("npc-1", Position::new(0, 0));
        let arrival = planner.walk_npc(&mut npc, Position::new(300, 400), 1_000);

        // 400 px vertical + 300 px horizontal at 10 ms/px.
        assert_eq!(arrival, 1_000 + 7_000);
        assert_eq!(npc.path.len(), 3);
        assert_eq!((npc.path[1].x, npc.path[1].y), (0, 400));
        assert_eq!(npc.path[1].time, 5_000);
        assert_eq!((npc.path[2].x, npc.path[2].y), (300, 400));
    }

    #[test]
    fn equal_ready_times_break_by_npc_id() {
        let mut snapshot = snapshot_with(
            vec![
                gatherer("npc-b", Position::new(0, 0)),
                gatherer("npc-a", Position::new(0, 0)),
            ],
            vec![tree("resource-1", Position::new(100, 0))],
        );
        snapshot.insert_stockpile(Stockpile::new("stockpile-1", TilePos { tx: 4, ty: 0 }, 0));
        let mut planner = CellPlanner::new(snapshot);
        planner.run(0, 30_000).expect("run");
        let output = planner.into_state().expect("finalize");

        let first_actor = output
            .events
            .iter()
            .min_by_key(|event| event.time)
            .map(|event| event.npc_id.clone());
        assert_eq!(first_actor.as_deref(), Some("npc-a"));
    }

    #[test]
    fn gather_emits_deplete_respawn_and_pickup() {
        let snapshot = snapshot_with(
            vec![gatherer("npc-1", Position::new(0, 0))],
            vec![tree("resource-1", Position::new(100, 0))],
        );
        let mut planner = CellPlanner::new(snapshot);
        planner.run(0, 6_000).expect("run");
        let output = planner.into_state().expect("finalize");

        let node = &output.snapshot.resources["resource-1"];
        assert_eq!(node.state.len(), 2);
        assert_eq!(node.state[0].patch.depleted, Some(true));
        assert!(node.state[0].patch.ready_time.is_some());
        assert_eq!(node.state[1].patch.depleted, Some(false));
        // Walk 100 px = 1 s; harvest at 3 s.
        assert_eq!(node.state[0].time, 1_000 + WAIT_AFTER_WALK);

        let npc = &output.snapshot.npcs["npc-1"];
        assert_eq!(npc.inventory_state.len(), 1);
        assert_eq!(npc.inventory_state[0].time, 3_000 + WAIT_AFTER_PICKUP);
        // Output carries the start-of-run inventory; the pickup is pending.
        assert!(npc.inventory.is_empty());

        let spawned: Vec<_> = output
            .snapshot
            .objects
            .values()
            .filter(|object| object.object_type == ObjectType::Stick)
            .collect();
        assert_eq!(spawned.len(), 1);
        assert!(!spawned[0].state.is_empty());
    }

    #[test]
    fn sleeping_npc_waits_for_wake() {
        let mut npc = gatherer("npc-1", Position::new(0, 0));
        npc.schedule = Schedule {
            wake: 60_000,
            sleep: DAY_MS - 60_000,
        };
        assert_eq!(sleeping_until(&npc, 0), Some(60_000));
        assert_eq!(sleeping_until(&npc, 60_000), None);
        assert_eq!(
            sleeping_until(&npc, DAY_MS - 30_000),
            Some(DAY_MS + 60_000)
        );
    }

    #[test]
    fn pause_truncation_keeps_first_future_entry() {
        let mut entries = vec![1_000, 2_000, 3_000, 4_000];
        truncate_after_pause(&mut entries, 2_500, |time| *time);
        assert_eq!(entries, vec![1_000, 2_000, 3_000]);
    }
}

