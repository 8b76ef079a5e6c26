// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Deterministic xorshift32 generator.
//!
//! The only source of randomness inside the simulation. Its state is part of
//! the checkpoint hash, so two replays diverge the moment they draw differently.

use serde::{Serialize, Deserialize};

/// Substituted for a zero seed, which is a fixed point of xorshift.
const ZERO_SEED_SUBSTITUTE: u32 = 0x9E37_79B9;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prng {
    state: u32,
}

impl Prng {
    pub fn new(seed: u32) -> Self {
        // Scramble so that adjacent seeds do not start on adjacent streams.
        let mut s = seed ^ 0x85EB_CA6B;
        s = s.wrapping_mul(0xC2B2_AE35);
        s ^= s >> 16;
        if s == 0 {
            s = ZERO_SEED_SUBSTITUTE;
        }
        Self { state: s }
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform-ish value in `0..bound`. Returns 0 for a zero bound.
    pub fn next_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        self.next_u32() % bound
    }

    pub fn state(&self) -> u32 {
        self.state
    }
}
