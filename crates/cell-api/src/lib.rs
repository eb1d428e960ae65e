//! In-process controller facade over one cell.
//!
//! The same controller runs on both sides: the client applies an operation
//! locally for prediction, builds the matching request record, and the
//! server re-applies it authoritatively. Planning runs go through
//! [`CellController::plan`]; runs can be persisted to SQLite for replay.

mod persistence;

use std::fmt;

use cell_core::construction::{
    build_stockpile_tile, construct_building, remove_stockpile_tile, ConstructionError,
};
use cell_core::harvest::HarvestSpawner;
use cell_core::interpolate;
use cell_core::inventory::{
    craft, deposit_into_stockpile, drop_item, pick_up, withdraw_from_stockpile, InventoryError,
    InventoryTransaction,
};
use cell_core::planner::{CellPlanner, PlanError, PlanEvent};
use cell_core::rng::CellRng;
use contracts::actors::{ResourcePatch, ResourceStateEntry, RngSeedState};
use contracts::object::NetworkObject;
use contracts::recipes::recipe_for;
use contracts::requests::OperationRequest;
use contracts::snapshot::CellSnapshot;
use contracts::{Millis, Position};
pub use persistence::{PersistedRun, PersistenceError, SqliteRunStore};

#[derive(Debug)]
pub enum ControllerError {
    UnknownPerson(String),
    UnknownNpc(String),
    UnknownObject(String),
    UnknownStockpile(String),
    UnknownResource(String),
    /// The target object is owned or nonexistent.
    ObjectUnavailable(String),
    /// The resource node is depleted and not yet respawned.
    ResourceNotReady(String),
    /// No recipe produces the requested type.
    NoRecipe(String),
    Inventory(InventoryError),
    Construction(ConstructionError),
    Harvest(cell_core::harvest::HarvestError),
    Plan(PlanError),
    Persistence(PersistenceError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPerson(id) => write!(f, "unknown person: {id}"),
            Self::UnknownNpc(id) => write!(f, "unknown npc: {id}"),
            Self::UnknownObject(id) => write!(f, "unknown object: {id}"),
            Self::UnknownStockpile(id) => write!(f, "unknown stockpile: {id}"),
            Self::UnknownResource(id) => write!(f, "unknown resource: {id}"),
            Self::ObjectUnavailable(id) => write!(f, "object unavailable: {id}"),
            Self::ResourceNotReady(id) => write!(f, "resource not ready: {id}"),
            Self::NoRecipe(product) => write!(f, "no recipe for {product}"),
            Self::Inventory(err) => write!(f, "{err}"),
            Self::Construction(err) => write!(f, "{err}"),
            Self::Harvest(err) => write!(f, "{err}"),
            Self::Plan(err) => write!(f, "{err}"),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<InventoryError> for ControllerError {
    fn from(err: InventoryError) -> Self {
        Self::Inventory(err)
    }
}

impl From<ConstructionError> for ControllerError {
    fn from(err: ConstructionError) -> Self {
        Self::Construction(err)
    }
}

impl From<cell_core::harvest::HarvestError> for ControllerError {
    fn from(err: cell_core::harvest::HarvestError) -> Self {
        Self::Harvest(err)
    }
}

impl From<PlanError> for ControllerError {
    fn from(err: PlanError) -> Self {
        Self::Plan(err)
    }
}

impl From<PersistenceError> for ControllerError {
    fn from(err: PersistenceError) -> Self {
        Self::Persistence(err)
    }
}

/// What one applied request changed.
#[derive(Debug, Clone, Default)]
pub struct ApplyOutcome {
    pub transactions: Vec<InventoryTransaction>,
    /// Ids of world objects created by the operation.
    pub created_ids: Vec<String>,
}

/// The controller: one cell snapshot plus an audit log of applied requests.
#[derive(Debug)]
pub struct CellController {
    snapshot: CellSnapshot,
    audit: Vec<OperationRequest>,
}

impl CellController {
    pub fn from_snapshot(snapshot: CellSnapshot) -> Self {
        Self {
            snapshot,
            audit: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> &CellSnapshot {
        &self.snapshot
    }

    pub fn into_snapshot(self) -> CellSnapshot {
        self.snapshot
    }

    /// Requests applied so far, in order.
    pub fn audit(&self) -> &[OperationRequest] {
        &self.audit
    }

    /// Validate and apply one operation request at wall-clock `now`.
    pub fn apply(
        &mut self,
        request: &OperationRequest,
        now: Millis,
    ) -> Result<ApplyOutcome, ControllerError> {
        let outcome = self.dispatch(request, now)?;
        self.audit.push(request.clone());
        Ok(outcome)
    }

    /// Run the planner over the current snapshot, replacing it with the
    /// finalized output. Returns the audit events of the run.
    ///
    /// The snapshot is first interpolated to `start_time` so positions,
    /// inventories, and harvest status reflect the planning instant; the
    /// planner requires pre-interpolated input.
    pub fn plan(
        &mut self,
        start_time: Millis,
        horizon_ms: Millis,
    ) -> Result<Vec<PlanEvent>, ControllerError> {
        let mut input = self.snapshot.clone();
        for npc in input.npcs.values_mut() {
            interpolate::interpolate_npc(npc, start_time);
        }
        for stockpile in input.stockpiles.values_mut() {
            interpolate::interpolate_stockpile(stockpile, start_time);
        }
        for object in input.objects.values_mut() {
            interpolate::apply_object_state(object, start_time);
        }
        for node in input.resources.values_mut() {
            interpolate::apply_resource_state(node, start_time);
        }

        let mut planner = CellPlanner::new(input);
        planner.run(start_time, horizon_ms)?;
        let output = planner.into_state()?;
        self.snapshot = output.snapshot;
        Ok(output.events)
    }

    /// Like [`plan`], additionally persisting the run to `store`.
    pub fn plan_persisted(
        &mut self,
        run_id: &str,
        start_time: Millis,
        horizon_ms: Millis,
        store: &mut SqliteRunStore,
    ) -> Result<Vec<PlanEvent>, ControllerError> {
        let input = self.snapshot.clone();
        let events = self.plan(start_time, horizon_ms)?;
        store.persist_run(&PersistedRun {
            run_id: run_id.to_string(),
            started_at: start_time,
            horizon_ms,
            input,
            output: self.snapshot.clone(),
            events: events.clone(),
        })?;
        Ok(events)
    }

    fn dispatch(
        &mut self,
        request: &OperationRequest,
        now: Millis,
    ) -> Result<ApplyOutcome, ControllerError> {
        match request {
            OperationRequest::PickUp {
                person_id,
                object_id,
            } => self.apply_pick_up(person_id, object_id),
            OperationRequest::Drop {
                person_id,
                object_id,
            } => self.apply_drop(person_id, object_id, now),
            OperationRequest::Craft { person_id, product } => {
                self.apply_craft(person_id, *product, now)
            }
            OperationRequest::ConstructBuilding {
                person_id,
                position,
            } => self.apply_construct(person_id, *position, now),
            OperationRequest::BuildStockpile {
                person_id,
                position,
            } => self.apply_build_stockpile(person_id, *position, now),
            OperationRequest::RemoveStockpileTile { position, .. } => {
                remove_stockpile_tile(&mut self.snapshot.stockpiles, *position, now)?;
                Ok(ApplyOutcome::default())
            }
            OperationRequest::Deposit {
                person_id,
                object_id,
                stockpile_id,
            } => self.apply_deposit(person_id, object_id, stockpile_id, now),
            OperationRequest::Withdraw {
                person_id,
                stockpile_id,
                object_id,
                amount,
            } => self.apply_withdraw(person_id, stockpile_id, object_id, *amount),
            OperationRequest::SetNpcJob { npc_id, job } => {
                let npc = self
                    .snapshot
                    .npcs
                    .get_mut(npc_id)
                    .ok_or_else(|| ControllerError::UnknownNpc(npc_id.clone()))?;
                npc.job = job.clone();
                Ok(ApplyOutcome::default())
            }
            OperationRequest::HarvestResource {
                person_id,
                resource_id,
            } => self.apply_harvest(person_id, resource_id, now),
        }
    }

    // -----------------------------------------------------------------------
    // Operation bodies
    // -----------------------------------------------------------------------

    fn apply_pick_up(
        &mut self,
        person_id: &str,
        object_id: &str,
    ) -> Result<ApplyOutcome, ControllerError> {
        let CellSnapshot {
            persons, objects, ..
        } = &mut self.snapshot;
        let person = persons
            .get_mut(person_id)
            .ok_or_else(|| ControllerError::UnknownPerson(person_id.to_string()))?;
        let object = objects
            .get(object_id)
            .ok_or_else(|| ControllerError::UnknownObject(object_id.to_string()))?;
        if !object.exist || object.ownership_count() > 0 || object.is_in_inventory {
            return Err(ControllerError::ObjectUnavailable(object_id.to_string()));
        }

        let item = object.clone();
        let transaction = pick_up(person, &item)?;
        apply_transaction_to_world(objects, &transaction);
        if let Some(slot) = &transaction.updated_original {
            objects.insert(slot.id.clone(), slot.clone());
        } else {
            // Merged away into an existing stack.
            if let Some(record) = objects.get_mut(object_id) {
                record.exist = false;
                record.clear_ownership();
            }
        }
        Ok(ApplyOutcome {
            transactions: vec![transaction],
            created_ids: Vec::new(),
        })
    }

    fn apply_drop(
        &mut self,
        person_id: &str,
        object_id: &str,
        now: Millis,
    ) -> Result<ApplyOutcome, ControllerError> {
        let CellSnapshot {
            persons, objects, ..
        } = &mut self.snapshot;
        let person = persons
            .get_mut(person_id)
            .ok_or_else(|| ControllerError::UnknownPerson(person_id.to_string()))?;
        let position = person.position();
        let transaction = drop_item(person, object_id);
        if let Some(dropped) = &transaction.updated_original {
            let mut record = dropped.clone();
            record.x = position.x;
            record.y = position.y;
            record.last_update = now;
            objects.insert(record.id.clone(), record);
        }
        Ok(ApplyOutcome {
            transactions: vec![transaction],
            created_ids: Vec::new(),
        })
    }

    fn apply_craft(
        &mut self,
        person_id: &str,
        product: contracts::ObjectType,
        now: Millis,
    ) -> Result<ApplyOutcome, ControllerError> {
        let recipe = recipe_for(product)
            .ok_or_else(|| ControllerError::NoRecipe(format!("{product:?}")))?;
        let CellSnapshot {
            persons, objects, ..
        } = &mut self.snapshot;
        let person = persons
            .get_mut(person_id)
            .ok_or_else(|| ControllerError::UnknownPerson(person_id.to_string()))?;

        let mut rng = rng_of(&person.crafting_rng);
        let outcome = craft(person, recipe, &mut rng)?;
        person.crafting_rng.state = Some(rng.save_state());

        apply_transaction_to_world(objects, &outcome.transaction);
        let mut record = outcome.product.clone();
        record.last_update = now;
        let created = record.id.clone();
        objects.insert(record.id.clone(), record);
        Ok(ApplyOutcome {
            transactions: vec![outcome.transaction],
            created_ids: vec![created],
        })
    }

    fn apply_construct(
        &mut self,
        person_id: &str,
        position: Position,
        now: Millis,
    ) -> Result<ApplyOutcome, ControllerError> {
        let CellSnapshot {
            persons,
            houses,
            objects,
            ..
        } = &mut self.snapshot;
        let person = persons
            .get_mut(person_id)
            .ok_or_else(|| ControllerError::UnknownPerson(person_id.to_string()))?;
        let outcome = construct_building(houses, person, position, now)?;

        for transaction in &outcome.transactions {
            apply_transaction_to_world(objects, transaction);
        }
        let mut created = Vec::new();
        for refund in &outcome.refunds {
            created.push(refund.id.clone());
            objects.insert(refund.id.clone(), refund.clone());
        }
        Ok(ApplyOutcome {
            transactions: outcome.transactions,
            created_ids: created,
        })
    }

    fn apply_build_stockpile(
        &mut self,
        person_id: &str,
        position: Position,
        now: Millis,
    ) -> Result<ApplyOutcome, ControllerError> {
        let CellSnapshot {
            persons,
            stockpiles,
            ..
        } = &mut self.snapshot;
        let person = persons
            .get_mut(person_id)
            .ok_or_else(|| ControllerError::UnknownPerson(person_id.to_string()))?;
        let stockpile_id = build_stockpile_tile(stockpiles, person, position, now)?;
        Ok(ApplyOutcome {
            transactions: Vec::new(),
            created_ids: vec![stockpile_id],
        })
    }

    fn apply_deposit(
        &mut self,
        person_id: &str,
        object_id: &str,
        stockpile_id: &str,
        now: Millis,
    ) -> Result<ApplyOutcome, ControllerError> {
        let CellSnapshot {
            persons,
            stockpiles,
            objects,
            ..
        } = &mut self.snapshot;
        let person = persons
            .get_mut(person_id)
            .ok_or_else(|| ControllerError::UnknownPerson(person_id.to_string()))?;
        let stockpile = stockpiles
            .get_mut(stockpile_id)
            .ok_or_else(|| ControllerError::UnknownStockpile(stockpile_id.to_string()))?;

        let dropped = drop_item(person, object_id);
        let Some(item) = dropped.updated_original.clone() else {
            return Err(ControllerError::UnknownObject(object_id.to_string()));
        };
        let deposit = match deposit_into_stockpile(stockpile, &item) {
            Ok(tx) => tx,
            Err(err) => {
                // Stockpile full: undo the drop so the request is atomic.
                pick_up(person, &item)?;
                return Err(err.into());
            }
        };

        apply_transaction_to_world(objects, &deposit);
        if let Some(stored) = &deposit.updated_original {
            let mut record = stored.clone();
            record.last_update = now;
            objects.insert(record.id.clone(), record);
        } else if let Some(record) = objects.get_mut(object_id) {
            record.exist = false;
            record.clear_ownership();
        }
        Ok(ApplyOutcome {
            transactions: vec![dropped, deposit],
            created_ids: Vec::new(),
        })
    }

    fn apply_withdraw(
        &mut self,
        person_id: &str,
        stockpile_id: &str,
        object_id: &str,
        amount: u32,
    ) -> Result<ApplyOutcome, ControllerError> {
        let CellSnapshot {
            persons,
            stockpiles,
            objects,
            ..
        } = &mut self.snapshot;
        let person = persons
            .get_mut(person_id)
            .ok_or_else(|| ControllerError::UnknownPerson(person_id.to_string()))?;
        let stockpile = stockpiles
            .get_mut(stockpile_id)
            .ok_or_else(|| ControllerError::UnknownStockpile(stockpile_id.to_string()))?;

        // Withdraw-then-pickup must be atomic; back up both inventories.
        let person_backup = person.inventory.clone();
        let stockpile_backup = stockpile.inventory.clone();
        let mut rng = rng_of(&person.crafting_rng);

        let result = withdraw_from_stockpile(stockpile, object_id, amount, &mut rng)
            .and_then(|withdraw| {
                let pickup = pick_up(person, &withdraw.item)?;
                Ok((withdraw, pickup))
            });
        match result {
            Ok((withdraw, pickup)) => {
                person.crafting_rng.state = Some(rng.save_state());
                apply_transaction_to_world(objects, &withdraw.transaction);
                apply_transaction_to_world(objects, &pickup);
                if let Some(slot) = &pickup.updated_original {
                    objects.insert(slot.id.clone(), slot.clone());
                }
                Ok(ApplyOutcome {
                    transactions: vec![withdraw.transaction, pickup],
                    created_ids: Vec::new(),
                })
            }
            Err(err) => {
                person.inventory = person_backup;
                stockpile.inventory = stockpile_backup;
                Err(err.into())
            }
        }
    }

    fn apply_harvest(
        &mut self,
        person_id: &str,
        resource_id: &str,
        now: Millis,
    ) -> Result<ApplyOutcome, ControllerError> {
        let CellSnapshot {
            persons,
            resources,
            objects,
            ..
        } = &mut self.snapshot;
        let person = persons
            .get_mut(person_id)
            .ok_or_else(|| ControllerError::UnknownPerson(person_id.to_string()))?;
        let node = resources
            .get_mut(resource_id)
            .ok_or_else(|| ControllerError::UnknownResource(resource_id.to_string()))?;
        if !node.is_ready(now) {
            return Err(ControllerError::ResourceNotReady(resource_id.to_string()));
        }

        let mut spawner = HarvestSpawner::for_node(node)?;
        let outcome = spawner.spawn();
        let mut item = outcome.spawn;
        item.exist = true;
        item.last_update = now;

        // The node only advances if the pickup lands.
        let transaction = pick_up(person, &item)?;
        node.rng_state = Some(spawner.save_state());
        node.depleted = true;
        node.ready_time = now + outcome.respawn_delay;
        node.state.push(ResourceStateEntry {
            time: node.ready_time,
            patch: ResourcePatch {
                depleted: Some(false),
                ready_time: None,
            },
        });

        let created = item.id.clone();
        if let Some(slot) = &transaction.updated_original {
            objects.insert(slot.id.clone(), slot.clone());
        }
        apply_transaction_to_world(objects, &transaction);
        Ok(ApplyOutcome {
            transactions: vec![transaction],
            created_ids: vec![created],
        })
    }
}

fn rng_of(seed_state: &RngSeedState) -> CellRng {
    match &seed_state.state {
        Some(state) => CellRng::from_state(state),
        None => CellRng::from_seed_str(&seed_state.seed),
    }
}

/// Reflect an inventory transaction onto the world-object records: consumed
/// ids stop existing, modified stacks update their amounts.
fn apply_transaction_to_world(
    objects: &mut std::collections::BTreeMap<String, NetworkObject>,
    transaction: &InventoryTransaction,
) {
    for id in &transaction.deleted_ids {
        if let Some(record) = objects.get_mut(id) {
            if record.is_in_inventory || record.inside_stockpile.is_some() {
                record.exist = false;
                record.clear_ownership();
            }
        }
    }
    for slot in transaction
        .stacked_into
        .iter()
        .chain(transaction.modified_slots.iter())
    {
        if let Some(record) = objects.get_mut(&slot.id) {
            record.amount = slot.amount;
        }
    }
}
