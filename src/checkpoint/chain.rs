// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Chained checkpoint hashes.

use super::hash::FnvHasher32;
use super::Checkpoint;

/// Tags the genesis derivation so it never coincides with a plain state hash.
const GENESIS_TAG: u32 = 0x4253_544E; // "BSTN"
const GENESIS_FALLBACK: u32 = 0x0000_0001;

/// murmur3 32-bit finalizer.
#[inline]
fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Folds `state_hash` into the chain after `prev`.
///
/// `prev` is absorbed before `state_hash`, so `chain(chain(g, a), b)` and
/// `chain(chain(g, b), a)` differ unless the finalizer collides.
pub fn chain(prev: u32, state_hash: u32) -> u32 {
    let mut hasher = FnvHasher32::new();
    hasher.write_u32(prev);
    hasher.write_u32(state_hash);
    fmix32(hasher.finish() ^ prev.rotate_left(7))
}

/// Chain origin for a session. Never zero.
pub fn genesis(seed: u32) -> u32 {
    let g = fmix32(seed ^ GENESIS_TAG);
    if g == 0 { GENESIS_FALLBACK } else { g }
}

/// Incrementally builds a checkpoint chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainBuilder {
    current: u32,
}

impl ChainBuilder {
    pub fn new(origin: u32) -> Self {
        Self { current: origin }
    }

    pub fn push(&mut self, tick: u32, state_hash: u32) -> Checkpoint {
        self.current = chain(self.current, state_hash);
        Checkpoint { tick, hash32: state_hash, chain_hash32: self.current }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    /// Seals the chain with the end-of-segment state hash.
    pub fn seal(self, end_state_hash: u32) -> u32 {
        chain(self.current, end_state_hash)
    }
}
