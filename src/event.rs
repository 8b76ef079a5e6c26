// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Player input events.
//!
//! Events are the only client input a replay consumes. Their wire form is a
//! flat JSON object:
//!
//! ```text
//! { "tick": 120, "type": "skill",  "skill": 0 }
//! { "tick": 300, "type": "relic",  "relic": 2 }
//! { "tick": 301, "type": "target", "slot": 1 }   // "slot": null clears
//! ```
//!
//! `tick` is segment-local: the event is applied before the `tick + 1`-th
//! simulated tick of the segment.

use crate::config::{MAX_ENEMIES, RELIC_COUNT, SKILL_COUNT};
use crate::error::{KernelError, Result};
use serde::{Serialize, Deserialize};

pub const SKILL_BARRAGE: u8 = 0;
pub const SKILL_REPAIR: u8 = 1;

pub const RELIC_SHARPENED: u8 = 0;
pub const RELIC_HASTE: u8 = 1;
pub const RELIC_BULWARK: u8 = 2;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SimAction {
    /// Activate a skill. Ignored while the skill is cooling down.
    Skill { skill: u8 },
    /// Pick a relic. Picking an owned relic again is a no-op.
    Relic { relic: u8 },
    /// Focus fortress fire on an enemy slot, `None` returns to nearest-first.
    Target {
        #[serde(default)]
        slot: Option<u8>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimEvent {
    pub tick: u32,
    #[serde(flatten)]
    pub action: SimAction,
}

impl SimEvent {
    pub fn new(tick: u32, action: SimAction) -> Self {
        Self { tick, action }
    }

    /// Rejects ids that do not exist in the simulation.
    pub fn validate(&self) -> Result<()> {
        let ok = match self.action {
            SimAction::Skill { skill } => (skill as usize) < SKILL_COUNT,
            SimAction::Relic { relic } => relic < RELIC_COUNT,
            SimAction::Target { slot } => slot.map_or(true, |s| (s as usize) < MAX_ENEMIES),
        };
        if ok { Ok(()) } else { Err(KernelError::InvalidEvent) }
    }
}

/// Stable sort by tick; events sharing a tick keep their submission order.
pub fn sort_events(events: &mut [SimEvent]) {
    events.sort_by_key(|e| e.tick);
}
