// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Checkpoint hashing.
//!
//! A checkpoint is a 32-bit fingerprint of the simulation at one tick plus a
//! chain value folding every earlier checkpoint of the session. Altering one
//! tick changes its own hash and every chain value after it, so an attacker
//! cannot patch a single checkpoint in isolation.

pub mod hash;
pub mod chain;

use serde::{Serialize, Deserialize};

pub use chain::{chain, genesis, ChainBuilder};
pub use hash::{hash_rules, hash_state, FnvHasher32};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Segment-local tick the attestation was taken after.
    pub tick: u32,
    pub hash32: u32,
    pub chain_hash32: u32,
}
