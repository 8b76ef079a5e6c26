// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Deterministic simulation state.

pub mod sim;

pub use sim::{Enemy, SimParams, SimState};
