// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants.

/// Number of fractional bits for Fixed-Point representation (Q16.16).
pub const FRAC_BITS: u32 = 16;

/// Scaling factor for Fixed-Point representation (1 << FRAC_BITS).
pub const SCALE: i32 = 1 << FRAC_BITS;

/// Upper bound on simultaneously alive enemies. Spawns past it are dropped.
pub const MAX_ENEMIES: usize = 64;

/// Number of activatable skills.
pub const SKILL_COUNT: usize = 2;

/// Number of selectable relics.
pub const RELIC_COUNT: u8 = 3;

/// Basis point denominator (100% = 10_000).
pub const BPS: u64 = 10_000;

/// Replay polls its cancel flag every this many ticks.
pub const CANCEL_POLL_TICKS: u32 = 64;
