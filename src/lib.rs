// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![no_std]

//! bastion-kernel: a deterministic, no_std, fixed-point tower-defense simulation
//! with chained checkpoint hashing and segment verification.

extern crate alloc;

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod config;
pub mod error;
pub mod fxp;
pub mod types;
pub mod prng;
pub mod rules;
pub mod event;
pub mod state;
pub mod checkpoint;
pub mod replay;
pub mod verify;
pub mod economy;

#[cfg(test)]
pub mod tests;
