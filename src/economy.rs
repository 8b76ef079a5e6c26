// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Reward pricing and progression arithmetic.
//!
//! Everything here is a pure function of wave numbers and multipliers. No
//! client input and no randomness reach these functions, so the same wave range
//! always prices the same for a given bonus set.

use serde::{Serialize, Deserialize};

use crate::config::BPS;

pub const MAX_LEVEL: u32 = 100;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub gold: u64,
    pub dust: u64,
    pub sigils: u64,
}

impl Inventory {
    pub fn credit(&mut self, deltas: &RewardDeltas) {
        self.gold = self.gold.saturating_add(deltas.gold);
        self.dust = self.dust.saturating_add(deltas.dust);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progression {
    pub level: u32,
    pub xp: u64,
    pub total_xp: u64,
}

impl Default for Progression {
    fn default() -> Self {
        Self { level: 1, xp: 0, total_xp: 0 }
    }
}

/// XP needed to go from `level` to `level + 1`.
pub fn xp_to_next(level: u32) -> u64 {
    100 * level.max(1) as u64
}

impl Progression {
    /// Adds XP and levels up while the threshold is met. Capped at `MAX_LEVEL`,
    /// where XP keeps accumulating without further levels.
    pub fn gain_xp(&mut self, amount: u64) {
        self.xp = self.xp.saturating_add(amount);
        self.total_xp = self.total_xp.saturating_add(amount);
        while self.level < MAX_LEVEL && self.xp >= xp_to_next(self.level) {
            self.xp -= xp_to_next(self.level);
            self.level += 1;
        }
    }
}

/// Server-held multipliers, basis points (10_000 = 1x).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionBonuses {
    pub gold_multiplier_bps: u32,
    pub dust_multiplier_bps: u32,
    pub xp_multiplier_bps: u32,
    pub fortress_hp_bps: u32,
    pub fortress_damage_bps: u32,
}

impl Default for ProgressionBonuses {
    fn default() -> Self {
        Self::for_level(1)
    }
}

impl ProgressionBonuses {
    pub fn for_level(level: u32) -> Self {
        let steps = level.clamp(1, MAX_LEVEL) - 1;
        Self {
            gold_multiplier_bps: 10_000 + 200 * steps,
            dust_multiplier_bps: 10_000 + 100 * steps,
            xp_multiplier_bps: 10_000 + 100 * steps,
            fortress_hp_bps: 10_000 + 300 * steps,
            fortress_damage_bps: 10_000 + 200 * steps,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDeltas {
    pub gold: u64,
    pub dust: u64,
    pub xp: u64,
}

impl RewardDeltas {
    pub const ZERO: RewardDeltas = RewardDeltas { gold: 0, dust: 0, xp: 0 };

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn saturating_add(self, other: RewardDeltas) -> RewardDeltas {
        RewardDeltas {
            gold: self.gold.saturating_add(other.gold),
            dust: self.dust.saturating_add(other.dust),
            xp: self.xp.saturating_add(other.xp),
        }
    }

    /// Scales every component by `bps / 10_000`, rounding down.
    pub fn scaled(self, bps: u32) -> RewardDeltas {
        RewardDeltas {
            gold: scale_bps(self.gold, bps),
            dust: scale_bps(self.dust, bps),
            xp: scale_bps(self.xp, bps),
        }
    }
}

fn scale_bps(v: u64, bps: u32) -> u64 {
    ((v as u128) * (bps as u128) / (BPS as u128)) as u64
}

fn wave_gold(wave: u64) -> u64 {
    10 + 2 * wave
}

fn wave_dust(wave: u64) -> u64 {
    if wave % 5 == 0 { 1 + wave / 10 } else { 0 }
}

fn wave_xp(wave: u64) -> u64 {
    5 + wave
}

/// Prices the waves completed when advancing from `start_wave` to `end_wave`,
/// i.e. every wave `w` with `start_wave < w <= end_wave`.
pub fn price_segment(start_wave: u32, end_wave: u32, bonuses: &ProgressionBonuses) -> RewardDeltas {
    let mut base = RewardDeltas::ZERO;
    for w in (start_wave as u64 + 1)..=(end_wave as u64) {
        base.gold += wave_gold(w);
        base.dust += wave_dust(w);
        base.xp += wave_xp(w);
    }
    RewardDeltas {
        gold: scale_bps(base.gold, bonuses.gold_multiplier_bps),
        dust: scale_bps(base.dust, bonuses.dust_multiplier_bps),
        xp: scale_bps(base.xp, bonuses.xp_multiplier_bps),
    }
}

/// Prices unverified end-of-session waves at `credit_bps` of the full rate.
///
/// At most `max_waves` unverified waves are counted.
pub fn price_partial(
    verified_wave: u32,
    claimed_wave: u32,
    max_waves: u32,
    credit_bps: u32,
    bonuses: &ProgressionBonuses,
) -> (u32, RewardDeltas) {
    let unverified = claimed_wave.saturating_sub(verified_wave).min(max_waves);
    if unverified == 0 {
        return (0, RewardDeltas::ZERO);
    }
    let full = price_segment(verified_wave, verified_wave + unverified, bonuses);
    (unverified, full.scaled(credit_bps))
}
