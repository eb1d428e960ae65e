//! Deterministic, resumable random stream: xoshiro256++ with SplitMix64
//! seeding, seeded from domain strings.
//!
//! Client and server must draw bit-identical sequences from identical saved
//! state, so this module avoids platform-dependent arithmetic and never
//! consults the clock. Restoring a saved state and drawing N values matches
//! the original stream exactly.

use contracts::actors::RngState;

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Fold a domain seed string (an NPC id, a node coordinate) into a 64-bit
/// seed. Stable across platforms; part of the wire contract.
fn fold_seed(seed: &str) -> u64 {
    let mut hash: u64 = 0xCBF2_9CE4_8422_2325;
    for byte in seed.as_bytes() {
        hash = hash.rotate_left(5) ^ u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
    }
    hash
}

/// xoshiro256++ stream (Blackman & Vigna). The only randomness source in the
/// engine; every subsystem owns its own instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRng {
    s: [u64; 4],
}

impl CellRng {
    /// Seed from a domain string via SplitMix64 expansion.
    pub fn from_seed_str(seed: &str) -> Self {
        let mut sm = fold_seed(seed);
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Resume from a saved snapshot.
    pub fn from_state(state: &RngState) -> Self {
        Self { s: state.s }
    }

    /// Snapshot the entire internal state for persistence.
    pub fn save_state(&self) -> RngState {
        RngState { s: self.s }
    }

    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform double in [0, 1) from the top 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }
}
