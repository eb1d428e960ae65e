//! Harvest spawner: per-node deterministic item generation.
//!
//! Each resource node owns a resumable RNG stream (seeded from its
//! `spawn_seed`, resumed from its saved state) and a pre-computed
//! cumulative-probability table over its spawn options. The table is stored
//! reversed so the selection walk is monotone.

use contracts::actors::{ResourceNode, RngState, SpawnDef};
use contracts::object::NetworkObject;
use contracts::{Millis, Position};

use crate::rng::CellRng;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarvestError {
    /// The node's spawn table is empty or carries no probability mass.
    MalformedSpawnTable(String),
}

impl std::fmt::Display for HarvestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedSpawnTable(node_id) => {
                write!(f, "Malformed spawn table for resource {node_id}")
            }
        }
    }
}

impl std::error::Error for HarvestError {}

/// One band of the reversed cumulative table. `lower` is the cumulative
/// probability mass of all entries before this one in original order.
#[derive(Debug, Clone)]
struct SpawnBand {
    lower: f64,
    def: SpawnDef,
}

/// The next spawned item plus how long the node stays depleted.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnOutcome {
    pub spawn: NetworkObject,
    pub respawn_delay: Millis,
}

/// Deterministic generator for one resource node.
#[derive(Debug, Clone)]
pub struct HarvestSpawner {
    rng: CellRng,
    bands: Vec<SpawnBand>,
    total: f64,
    origin: Position,
}

impl HarvestSpawner {
    /// Build a spawner for a node, resuming its saved RNG state or seeding
    /// fresh from `spawn_seed`.
    pub fn for_node(node: &ResourceNode) -> Result<Self, HarvestError> {
        let rng = match &node.rng_state {
            Some(state) => CellRng::from_state(state),
            None => CellRng::from_seed_str(&node.spawn_seed),
        };
        Self::new(rng, &node.spawns, node.position(), &node.id)
    }

    fn new(
        rng: CellRng,
        spawns: &[SpawnDef],
        origin: Position,
        node_id: &str,
    ) -> Result<Self, HarvestError> {
        let total: f64 = spawns.iter().map(|def| def.probability.max(0.0)).sum();
        if spawns.is_empty() || total <= 0.0 {
            return Err(HarvestError::MalformedSpawnTable(node_id.to_string()));
        }

        let mut bands = Vec::with_capacity(spawns.len());
        let mut cumulative = 0.0;
        for def in spawns {
            bands.push(SpawnBand {
                lower: cumulative,
                def: *def,
            });
            cumulative += def.probability.max(0.0);
        }
        bands.reverse();

        Ok(Self {
            rng,
            bands,
            total,
            origin,
        })
    }

    /// Draw the next spawned item and advance the stream.
    ///
    /// Draw order is part of the contract: selection, x jitter, y jitter,
    /// id, respawn delay.
    pub fn spawn(&mut self) -> SpawnOutcome {
        let draw = self.rng.next_f64() * self.total;
        let chosen = self
            .bands
            .iter()
            .find(|band| band.def.probability > 0.0 && band.lower < draw)
            .or_else(|| {
                // A draw of exactly zero clears no lower bound; fall back to
                // the lowest selectable band.
                self.bands
                    .iter()
                    .rev()
                    .find(|band| band.def.probability > 0.0)
            })
            .expect("table has probability mass")
            .def;

        let x = self.origin.x + jitter(self.rng.next_f64());
        let y = self.origin.y + jitter(self.rng.next_f64());
        let id = format!("object-{}", self.rng.next_u32());
        let respawn_delay =
            (self.rng.next_f64() * chosen.spawn_time as f64 + chosen.spawn_time as f64 * 0.5).ceil()
                as Millis;

        let mut spawn = NetworkObject::loose(id, chosen.object_type, Position::new(x, y), 0);
        spawn.exist = false;
        SpawnOutcome {
            spawn,
            respawn_delay,
        }
    }

    /// Opaque serializable snapshot of the stream for persistence.
    pub fn save_state(&self) -> RngState {
        self.rng.save_state()
    }
}

fn jitter(draw: f64) -> i64 {
    (draw * 200.0).floor() as i64 - 100
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::catalog::ObjectType;

    fn node(spawns: Vec<SpawnDef>) -> ResourceNode {
        ResourceNode {
            id: "resource-1".to_string(),
            object_type: ObjectType::Tree,
            x: 1_000,
            y: 600,
            spawn_seed: "resource-1".to_string(),
            rng_state: None,
            spawns,
            depleted: false,
            ready_time: 0,
            state: Vec::new(),
            last_update: 0,
        }
    }

    fn tree_spawns() -> Vec<SpawnDef> {
        vec![
            SpawnDef {
                object_type: ObjectType::Stick,
                probability: 3.0,
                spawn_time: 60_000,
            },
            SpawnDef {
                object_type: ObjectType::Wood,
                probability: 1.0,
                spawn_time: 120_000,
            },
        ]
    }

    #[test]
    fn empty_table_is_malformed() {
        let err = HarvestSpawner::for_node(&node(Vec::new())).unwrap_err();
        assert_eq!(err, HarvestError::MalformedSpawnTable("resource-1".to_string()));
    }

    #[test]
    fn zero_mass_table_is_malformed() {
        let spawns = vec![SpawnDef {
            object_type: ObjectType::Stick,
            probability: 0.0,
            spawn_time: 60_000,
        }];
        assert!(HarvestSpawner::for_node(&node(spawns)).is_err());
    }

    #[test]
    fn zero_probability_entries_are_never_selected() {
        let spawns = vec![
            SpawnDef {
                object_type: ObjectType::Stone,
                probability: 0.0,
                spawn_time: 60_000,
            },
            SpawnDef {
                object_type: ObjectType::Stick,
                probability: 1.0,
                spawn_time: 60_000,
            },
        ];
        let mut spawner = HarvestSpawner::for_node(&node(spawns)).expect("spawner");
        for _ in 0..200 {
            let outcome = spawner.spawn();
            assert_eq!(outcome.spawn.object_type, ObjectType::Stick);
        }
    }

    #[test]
    fn jitter_stays_within_half_tile() {
        let mut spawner = HarvestSpawner::for_node(&node(tree_spawns())).expect("spawner");
        for _ in 0..500 {
            let outcome = spawner.spawn();
            assert!((outcome.spawn.x - 1_000).abs() <= 100);
            assert!((outcome.spawn.y - 600).abs() <= 100);
        }
    }

    #[test]
    fn respawn_delay_is_half_to_three_halves_of_base() {
        let mut spawner = HarvestSpawner::for_node(&node(tree_spawns())).expect("spawner");
        for _ in 0..500 {
            let outcome = spawner.spawn();
            let base = match outcome.spawn.object_type {
                ObjectType::Stick => 60_000f64,
                _ => 120_000f64,
            };
            assert!(outcome.respawn_delay as f64 >= base * 0.5);
            assert!((outcome.respawn_delay as f64) < base * 1.5 + 1.0);
        }
    }

    #[test]
    fn spawned_items_start_nonexistent_with_unique_ids() {
        let mut spawner = HarvestSpawner::for_node(&node(tree_spawns())).expect("spawner");
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..100 {
            let outcome = spawner.spawn();
            assert!(!outcome.spawn.exist);
            assert!(outcome.spawn.state.is_empty());
            assert!(seen.insert(outcome.spawn.id.clone()), "duplicate id");
        }
    }

    #[test]
    fn saved_state_resumes_identical_spawn_stream() {
        let source = node(tree_spawns());
        let mut spawner = HarvestSpawner::for_node(&source).expect("spawner");
        for _ in 0..5 {
            spawner.spawn();
        }
        let saved = spawner.save_state();
        let expected: Vec<SpawnOutcome> = (0..10).map(|_| spawner.spawn()).collect();

        let mut resumed_node = source.clone();
        resumed_node.rng_state = Some(saved);
        let mut resumed = HarvestSpawner::for_node(&resumed_node).expect("spawner");
        let replayed: Vec<SpawnOutcome> = (0..10).map(|_| resumed.spawn()).collect();
        assert_eq!(expected, replayed);
    }
}
