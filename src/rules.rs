// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Versioned balance rulesets.
//!
//! A session pins the version it started with. Replays always run against that
//! pinned table, so shipping a new version never changes the outcome of a
//! session that is already in flight.

use crate::config::SCALE;
use crate::types::scalar::FxpScalar;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimRules {
    pub version: &'static str,
    pub tick_hz: u32,
    pub wave_interval_ticks: u32,

    pub fortress_base_hp: i32,
    pub fortress_base_damage: i32,
    pub attack_interval_ticks: u32,

    pub enemy_base_count: u32,
    /// One extra enemy per this many waves.
    pub enemy_count_step_waves: u32,
    pub enemy_base_hp: i32,
    /// Enemy hp growth per wave, in basis points of base hp.
    pub enemy_hp_growth_bps: u32,
    /// Distance units per tick.
    pub enemy_speed: FxpScalar,
    pub enemy_damage: i32,
    pub spawn_distance: i32,
    pub spawn_jitter: u32,

    pub barrage_cooldown_ticks: u32,
    pub repair_cooldown_ticks: u32,
    pub repair_bps: u32,
}

impl SimRules {
    /// Number of ticks spanned by waves `start..end`, `None` on overflow.
    pub fn segment_ticks(&self, start_wave: u32, end_wave: u32) -> Option<u32> {
        end_wave
            .checked_sub(start_wave)?
            .checked_mul(self.wave_interval_ticks)
    }
}

pub const RULES_V1_0: SimRules = SimRules {
    version: "1.0.0",
    tick_hz: 30,
    wave_interval_ticks: 300,
    fortress_base_hp: 500,
    fortress_base_damage: 10,
    attack_interval_ticks: 15,
    enemy_base_count: 4,
    enemy_count_step_waves: 3,
    enemy_base_hp: 20,
    enemy_hp_growth_bps: 800,
    enemy_speed: FxpScalar(SCALE / 2),
    enemy_damage: 10,
    spawn_distance: 100,
    spawn_jitter: 20,
    barrage_cooldown_ticks: 150,
    repair_cooldown_ticks: 300,
    repair_bps: 2_000,
};

pub const RULES_V1_1: SimRules = SimRules {
    version: "1.1.0",
    tick_hz: 30,
    wave_interval_ticks: 300,
    fortress_base_hp: 500,
    fortress_base_damage: 10,
    attack_interval_ticks: 14,
    enemy_base_count: 4,
    enemy_count_step_waves: 3,
    enemy_base_hp: 20,
    enemy_hp_growth_bps: 900,
    enemy_speed: FxpScalar(SCALE * 11 / 20),
    enemy_damage: 10,
    spawn_distance: 100,
    spawn_jitter: 20,
    barrage_cooldown_ticks: 150,
    repair_cooldown_ticks: 300,
    repair_bps: 2_500,
};

static RULESETS: [&SimRules; 2] = [&RULES_V1_0, &RULES_V1_1];

/// Looks up a ruleset by its version tag.
pub fn ruleset(version: &str) -> Option<&'static SimRules> {
    RULESETS.iter().copied().find(|r| r.version == version)
}

/// Most recent ruleset.
pub fn latest() -> &'static SimRules {
    RULESETS[RULESETS.len() - 1]
}
