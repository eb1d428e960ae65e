//! Inventory engine: stack-aware operations over a fixed-capacity slotted
//! inventory. Every operation takes a holder snapshot and returns a
//! transaction describing the minimal delta; the holder is only mutated when
//! the operation succeeds.

use contracts::actors::Stockpile;
use contracts::catalog::{stack_limit, CatalogError, ObjectType};
use contracts::inventory::Inventory;
use contracts::object::NetworkObject;
use contracts::recipes::{Recipe, RecipeItem};
use contracts::Position;

use crate::rng::CellRng;

// ---------------------------------------------------------------------------
// Holder abstraction
// ---------------------------------------------------------------------------

/// Anything with a slotted inventory the engine can operate on. The holder
/// kind decides which ownership reference a picked-up slot carries.
pub trait InventoryHolder {
    fn holder_id(&self) -> &str;
    fn is_npc(&self) -> bool;
    fn position(&self) -> Position;
    fn inventory(&self) -> &Inventory;
    fn inventory_mut(&mut self) -> &mut Inventory;
}

impl InventoryHolder for contracts::actors::Person {
    fn holder_id(&self) -> &str {
        &self.id
    }

    fn is_npc(&self) -> bool {
        false
    }

    fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }
}

impl InventoryHolder for contracts::actors::Npc {
    fn holder_id(&self) -> &str {
        &self.id
    }

    fn is_npc(&self) -> bool {
        true
    }

    fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    fn inventory_mut(&mut self) -> &mut Inventory {
        &mut self.inventory
    }
}

// ---------------------------------------------------------------------------
// Errors and transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// The inventory has no slot for the item and no stack can absorb it.
    InventoryFull,
    /// A recipe input exceeds what the holder carries.
    InsufficientMaterials,
    /// Catalog lookup failed for the item's type.
    Catalog(CatalogError),
}

impl std::fmt::Display for InventoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InventoryFull => write!(f, "Not enough room for item"),
            Self::InsufficientMaterials => write!(f, "Not enough materials for crafting"),
            Self::Catalog(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for InventoryError {}

impl From<CatalogError> for InventoryError {
    fn from(err: CatalogError) -> Self {
        Self::Catalog(err)
    }
}

/// Minimal delta produced by one engine operation.
///
/// `updated_original` is the item as it now sits in the inventory (or as it
/// left it, for drops); it is `None` when the original id was consumed by a
/// stack merge. `deleted_ids` lists ids that no longer occupy a slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InventoryTransaction {
    pub updated_original: Option<NetworkObject>,
    pub stacked_into: Vec<NetworkObject>,
    pub deleted_ids: Vec<String>,
    pub modified_slots: Vec<NetworkObject>,
}

impl InventoryTransaction {
    fn merge(&mut self, other: InventoryTransaction) {
        if other.updated_original.is_some() {
            self.updated_original = other.updated_original;
        }
        self.stacked_into.extend(other.stacked_into);
        self.deleted_ids.extend(other.deleted_ids);
        self.modified_slots.extend(other.modified_slots);
    }
}

/// Result of a successful craft: the combined delta plus the product item as
/// it entered the inventory.
#[derive(Debug, Clone, PartialEq)]
pub struct CraftOutcome {
    pub transaction: InventoryTransaction,
    pub product: NetworkObject,
}

/// Result of a stockpile withdrawal: the stockpile delta plus the item that
/// left it, ready to be handed to a holder.
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawOutcome {
    pub transaction: InventoryTransaction,
    pub item: NetworkObject,
}

// ---------------------------------------------------------------------------
// Core insert/remove over a bare inventory
// ---------------------------------------------------------------------------

/// Ownership reference a slot carries after insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SlotOwner {
    Person(String),
    Npc(String),
    Stockpile(String),
}

impl SlotOwner {
    fn stamp(&self, object: &mut NetworkObject) {
        object.clear_ownership();
        object.is_in_inventory = true;
        match self {
            Self::Person(id) => object.grabbed_by_person_id = Some(id.clone()),
            Self::Npc(id) => object.grabbed_by_npc_id = Some(id.clone()),
            Self::Stockpile(id) => object.inside_stockpile = Some(id.clone()),
        }
    }
}

/// Insert an item into an inventory: dedupe by id, merge into the first
/// same-type slot with room, else append into a free slot.
fn insert_item(
    inventory: &mut Inventory,
    item: &NetworkObject,
    owner: &SlotOwner,
) -> Result<InventoryTransaction, InventoryError> {
    // Deduplicate by id before scanning: re-picking an id already present is
    // a no-op merge against its own slot.
    if let Some(existing) = inventory.slot(&item.id) {
        return Ok(InventoryTransaction {
            updated_original: None,
            stacked_into: vec![existing.clone()],
            deleted_ids: Vec::new(),
            modified_slots: Vec::new(),
        });
    }

    let limit = stack_limit(item.object_type)?;
    for slot in inventory.slots.iter_mut() {
        if slot.object_type == item.object_type && slot.amount + item.amount <= limit {
            slot.amount += item.amount;
            return Ok(InventoryTransaction {
                updated_original: None,
                stacked_into: vec![slot.clone()],
                deleted_ids: vec![item.id.clone()],
                modified_slots: Vec::new(),
            });
        }
    }

    if !inventory.has_free_slot() {
        return Err(InventoryError::InventoryFull);
    }

    let mut slot = item.clone();
    owner.stamp(&mut slot);
    slot.state.clear();
    inventory.slots.push(slot.clone());
    Ok(InventoryTransaction {
        updated_original: Some(slot),
        stacked_into: Vec::new(),
        deleted_ids: Vec::new(),
        modified_slots: Vec::new(),
    })
}

/// Greedily subtract `quantity` of `object_type` from slots in order.
fn remove_from_inventory(
    inventory: &mut Inventory,
    object_type: ObjectType,
    quantity: u32,
) -> Result<InventoryTransaction, InventoryError> {
    let available: u64 = inventory.total_of(object_type);
    if available < u64::from(quantity) {
        return Err(InventoryError::InsufficientMaterials);
    }

    let mut remaining = quantity;
    let mut deleted_ids = Vec::new();
    let mut modified_slots = Vec::new();
    for slot in inventory.slots.iter_mut() {
        if remaining == 0 {
            break;
        }
        if slot.object_type != object_type {
            continue;
        }
        let take = slot.amount.min(remaining);
        slot.amount -= take;
        remaining -= take;
        if slot.amount == 0 {
            deleted_ids.push(slot.id.clone());
        } else {
            modified_slots.push(slot.clone());
        }
    }
    inventory.slots.retain(|slot| slot.amount > 0);

    Ok(InventoryTransaction {
        updated_original: None,
        stacked_into: Vec::new(),
        deleted_ids,
        modified_slots,
    })
}

// ---------------------------------------------------------------------------
// Holder operations
// ---------------------------------------------------------------------------

fn holder_owner<H: InventoryHolder>(holder: &H) -> SlotOwner {
    if holder.is_npc() {
        SlotOwner::Npc(holder.holder_id().to_string())
    } else {
        SlotOwner::Person(holder.holder_id().to_string())
    }
}

/// Pick an item up into the holder's inventory.
pub fn pick_up<H: InventoryHolder>(
    holder: &mut H,
    item: &NetworkObject,
) -> Result<InventoryTransaction, InventoryError> {
    let owner = holder_owner(holder);
    insert_item(holder.inventory_mut(), item, &owner)
}

/// Alias for [`pick_up`] used by subsystems that synthesize items directly.
pub fn add_item<H: InventoryHolder>(
    holder: &mut H,
    item: &NetworkObject,
) -> Result<InventoryTransaction, InventoryError> {
    pick_up(holder, item)
}

/// Remove a slot from the holder's inventory, clearing ownership. Dropping
/// an id that is not held is a no-op; drop never fails.
pub fn drop_item<H: InventoryHolder>(holder: &mut H, object_id: &str) -> InventoryTransaction {
    match holder.inventory_mut().take_slot(object_id) {
        Some(mut slot) => {
            slot.clear_ownership();
            InventoryTransaction {
                updated_original: Some(slot),
                stacked_into: Vec::new(),
                deleted_ids: vec![object_id.to_string()],
                modified_slots: Vec::new(),
            }
        }
        None => InventoryTransaction::default(),
    }
}

/// Greedily subtract one recipe input line from the holder. On
/// `InsufficientMaterials` the holder is left unmodified.
pub fn remove_by_recipe_item<H: InventoryHolder>(
    holder: &mut H,
    recipe_item: &RecipeItem,
) -> Result<InventoryTransaction, InventoryError> {
    remove_from_inventory(holder.inventory_mut(), recipe_item.item, recipe_item.quantity)
}

/// Apply a recipe: consume every input, then add the product with a fresh id
/// drawn from the crafting RNG.
///
/// Atomic: if any input is missing or the product cannot be placed, the
/// holder is untouched and the RNG does not advance.
pub fn craft<H: InventoryHolder>(
    holder: &mut H,
    recipe: &Recipe,
    rng: &mut CellRng,
) -> Result<CraftOutcome, InventoryError> {
    let mut work = holder.inventory().clone();
    let mut transaction = InventoryTransaction::default();
    for input in &recipe.items {
        transaction.merge(remove_from_inventory(&mut work, input.item, input.quantity)?);
    }

    let mut trial_rng = rng.clone();
    let position = holder.position();
    let mut product = NetworkObject::loose(
        format!("object-{}", trial_rng.next_u32()),
        recipe.product,
        position,
        0,
    );
    product.amount = recipe.amount;

    let owner = holder_owner(holder);
    let insert = insert_item(&mut work, &product, &owner)?;
    let product_slot = insert
        .updated_original
        .clone()
        .or_else(|| insert.stacked_into.first().cloned())
        .unwrap_or_else(|| product.clone());
    transaction.merge(insert);

    *holder.inventory_mut() = work;
    *rng = trial_rng;
    Ok(CraftOutcome {
        transaction,
        product: product_slot,
    })
}

/// Largest batch count of `recipe` that fits the holder's capacity,
/// using ceiling division over the stack limits of inputs and output.
pub fn max_recipes_that_fit(inventory: &Inventory, recipe: &Recipe) -> Result<u32, InventoryError> {
    let capacity = inventory.capacity() as u64;
    let product_limit = u64::from(stack_limit(recipe.product)?.max(1));
    let mut input_limits = Vec::with_capacity(recipe.items.len());
    for input in &recipe.items {
        input_limits.push(u64::from(stack_limit(input.item)?.max(1)));
    }

    let fits = |batches: u64| -> bool {
        let input_slots: u64 = recipe
            .items
            .iter()
            .zip(&input_limits)
            .map(|(input, limit)| (batches * u64::from(input.quantity)).div_ceil(*limit))
            .sum();
        let output_slots = (batches * u64::from(recipe.amount)).div_ceil(product_limit);
        input_slots <= capacity && output_slots <= capacity
    };

    let mut batches = 0u64;
    while fits(batches + 1) {
        batches += 1;
    }
    Ok(batches as u32)
}

// ---------------------------------------------------------------------------
// Stockpile operations
// ---------------------------------------------------------------------------

/// Deposit an item into a stockpile. Symmetric to pickup, but the slot's
/// ownership reference becomes `inside_stockpile`.
pub fn deposit_into_stockpile(
    stockpile: &mut Stockpile,
    item: &NetworkObject,
) -> Result<InventoryTransaction, InventoryError> {
    let owner = SlotOwner::Stockpile(stockpile.id.clone());
    insert_item(&mut stockpile.inventory, item, &owner)
}

/// Withdraw up to `amount` from one stockpile slot. A full withdrawal hands
/// back the slot itself; a partial split mints the withdrawn part a fresh id
/// from `rng`.
pub fn withdraw_from_stockpile(
    stockpile: &mut Stockpile,
    object_id: &str,
    amount: u32,
    rng: &mut CellRng,
) -> Result<WithdrawOutcome, InventoryError> {
    let slot_amount = match stockpile.inventory.slot(object_id) {
        Some(slot) => slot.amount,
        None => return Err(InventoryError::InsufficientMaterials),
    };

    if amount >= slot_amount {
        let Some(mut item) = stockpile.inventory.take_slot(object_id) else {
            return Err(InventoryError::InsufficientMaterials);
        };
        item.clear_ownership();
        return Ok(WithdrawOutcome {
            transaction: InventoryTransaction {
                updated_original: None,
                stacked_into: Vec::new(),
                deleted_ids: vec![object_id.to_string()],
                modified_slots: Vec::new(),
            },
            item,
        });
    }

    let Some(slot) = stockpile.inventory.slot_mut(object_id) else {
        return Err(InventoryError::InsufficientMaterials);
    };
    slot.amount -= amount;
    let modified = slot.clone();
    let mut item = modified.clone();
    item.id = format!("object-{}", rng.next_u32());
    item.amount = amount;
    item.clear_ownership();
    Ok(WithdrawOutcome {
        transaction: InventoryTransaction {
            updated_original: None,
            stacked_into: Vec::new(),
            deleted_ids: Vec::new(),
            modified_slots: vec![modified],
        },
        item,
    })
}
