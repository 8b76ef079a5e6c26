//! State hashing.

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::rules::SimRules;
use crate::state::SimState;

/// FNV-1a, 32-bit variant.
pub struct FnvHasher32 {
    state: u32,
}

impl FnvHasher32 {
    pub const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    pub fn new() -> Self {
        Self { state: Self::OFFSET_BASIS }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state ^= b as u32;
            self.state = self.state.wrapping_mul(Self::PRIME);
        }
    }

    pub fn write_u8(&mut self, val: u8) {
        self.write(&[val]);
    }

    pub fn write_u32(&mut self, val: u32) {
        self.write(&val.to_le_bytes());
    }

    pub fn write_i32(&mut self, val: i32) {
        self.write(&val.to_le_bytes());
    }

    pub fn finish(self) -> u32 {
        self.state
    }
}

impl Default for FnvHasher32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Fingerprint of a ruleset, keyed on its version string.
///
/// Replays salt their chain with it, so a claim recorded under one version
/// never verifies under another even where the two states coincide.
pub fn hash_rules(rules: &SimRules) -> u32 {
    let mut hasher = FnvHasher32::new();
    hasher.write_u32(rules.version.len() as u32);
    hasher.write(rules.version.as_bytes());
    hasher.finish()
}

/// Fingerprints every field of the simulation state.
///
/// Field order is part of the protocol: clients and the server must hash in
/// exactly this order. Enemy slots are hashed in vector order with a length
/// prefix so `[A, B]` and `[B, A]` differ.
pub fn hash_state(state: &SimState) -> u32 {
    let mut hasher = FnvHasher32::new();

    // Clock
    hasher.write_u32(state.tick);
    hasher.write_u32(state.wave);
    hasher.write_u32(state.wave_tick);
    hasher.write_u32(state.rng.state());

    // Fortress
    hasher.write_i32(state.fortress_hp.0);
    hasher.write_i32(state.fortress_max_hp.0);
    hasher.write_i32(state.fortress_damage.0);
    hasher.write_u32(state.attack_cooldown);
    hasher.write_u8(state.fallen as u8);

    // Progress
    hasher.write_u32(state.kills);
    hasher.write_u8(state.relics);
    for cd in state.skill_cooldowns.iter() {
        hasher.write_u32(*cd);
    }
    match state.target {
        Some(slot) => {
            hasher.write_u8(1);
            hasher.write_u8(slot);
        }
        None => hasher.write_u8(0),
    }

    // Enemies
    hasher.write_u32(state.enemies.len() as u32);
    for enemy in state.enemies.iter() {
        hasher.write_i32(enemy.hp.0);
        hasher.write_i32(enemy.distance.0);
        hasher.write_i32(enemy.speed.0);
        hasher.write_i32(enemy.damage.0);
    }

    hasher.finish()
}
