//! Segment Verification.

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::AtomicBool;
use serde::{Serialize, Deserialize};

use crate::checkpoint::Checkpoint;
use crate::event::{sort_events, SimEvent};
use crate::replay::{required_audit_ticks, ReplayHalt, SegmentReplay};
use crate::rules::SimRules;
use crate::state::SimState;

/// Client-claimed progress between two waves.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentClaim {
    pub start_wave: u32,
    pub end_wave: u32,
    pub events: Vec<SimEvent>,
    pub checkpoints: Vec<Checkpoint>,
    pub final_hash: u32,
}

/// Last verified position of a session.
#[derive(Clone, Copy, Debug)]
pub struct Anchor<'a> {
    /// Simulation state at the end of the last verified segment.
    pub state: &'a SimState,
    /// Running chain hash of verified history.
    pub chain_hash: u32,
    /// Audit schedule the next segment must honour.
    pub audit_ticks: &'a [u32],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerifyLimits {
    pub max_segment_waves: u32,
    pub max_events: usize,
}

impl Default for VerifyLimits {
    fn default() -> Self {
        Self { max_segment_waves: 50, max_events: 4096 }
    }
}

/// Reasons a claim is refused. `Display` carries forensic detail; clients only
/// ever see `reason()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    InvalidWaveRange { start: u32, end: u32 },
    WaveMismatch { expected: u32, claimed: u32 },
    SegmentTooLong { waves: u32, limit: u32 },
    TooManyEvents { count: usize, limit: usize },
    MalformedEvent { index: usize },
    EventOutOfRange { index: usize, tick: u32 },
    CheckpointsOutOfOrder { index: usize },
    CheckpointOutOfRange { tick: u32 },
    MissingAuditTick { tick: u32 },
    ChecksumMismatch { tick: u32, expected: u32, claimed: u32 },
    /// `tick == None` means the final hash disagreed.
    ChainMismatch { tick: Option<u32>, expected: u32, claimed: u32 },
    FortressFallen { tick: u32, wave: u32 },
    Cancelled,
}

impl Rejection {
    /// Machine-readable reason returned to the client.
    ///
    /// Structural reasons are specific. Replay failures collapse into one
    /// code so a rejection never tells a cheater which tick was wrong.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::InvalidWaveRange { .. } => "invalid_wave_range",
            Rejection::WaveMismatch { .. } => "wave_mismatch",
            Rejection::SegmentTooLong { .. } => "segment_too_long",
            Rejection::TooManyEvents { .. } => "too_many_events",
            Rejection::MalformedEvent { .. } => "malformed_event",
            Rejection::EventOutOfRange { .. } => "event_out_of_range",
            Rejection::CheckpointsOutOfOrder { .. } => "checkpoints_out_of_order",
            Rejection::CheckpointOutOfRange { .. } => "checkpoint_out_of_range",
            Rejection::MissingAuditTick { .. } => "missing_audit_tick",
            Rejection::ChecksumMismatch { .. } | Rejection::ChainMismatch { .. } => "replay_mismatch",
            Rejection::FortressFallen { .. } => "progress_not_reached",
            Rejection::Cancelled => "timeout",
        }
    }

    /// True when the claim was refused before any replay.
    pub fn is_structural(&self) -> bool {
        !matches!(
            self,
            Rejection::ChecksumMismatch { .. }
                | Rejection::ChainMismatch { .. }
                | Rejection::FortressFallen { .. }
                | Rejection::Cancelled
        )
    }

    /// Segment-local tick at which replay diverged, if any.
    pub fn failed_tick(&self) -> Option<u32> {
        match *self {
            Rejection::ChecksumMismatch { tick, .. } => Some(tick),
            Rejection::ChainMismatch { tick, .. } => tick,
            Rejection::FortressFallen { tick, .. } => Some(tick),
            _ => None,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::InvalidWaveRange { start, end } => write!(f, "end wave {} is not after start wave {}", end, start),
            Rejection::WaveMismatch { expected, claimed } => write!(f, "segment starts at wave {}, session is at wave {}", claimed, expected),
            Rejection::SegmentTooLong { waves, limit } => write!(f, "segment spans {} waves, limit is {}", waves, limit),
            Rejection::TooManyEvents { count, limit } => write!(f, "{} events, limit is {}", count, limit),
            Rejection::MalformedEvent { index } => write!(f, "event {} is malformed", index),
            Rejection::EventOutOfRange { index, tick } => write!(f, "event {} at tick {} is outside the segment", index, tick),
            Rejection::CheckpointsOutOfOrder { index } => write!(f, "checkpoint {} does not advance the tick", index),
            Rejection::CheckpointOutOfRange { tick } => write!(f, "checkpoint tick {} is outside the segment", tick),
            Rejection::MissingAuditTick { tick } => write!(f, "audit tick {} has no checkpoint", tick),
            Rejection::ChecksumMismatch { tick, expected, claimed } => {
                write!(f, "state hash mismatch at tick {}: replay {:#010x}, claimed {:#010x}", tick, expected, claimed)
            }
            Rejection::ChainMismatch { tick: Some(tick), expected, claimed } => {
                write!(f, "chain hash mismatch at tick {}: replay {:#010x}, claimed {:#010x}", tick, expected, claimed)
            }
            Rejection::ChainMismatch { tick: None, expected, claimed } => {
                write!(f, "final hash mismatch: replay {:#010x}, claimed {:#010x}", expected, claimed)
            }
            Rejection::FortressFallen { tick, wave } => write!(f, "fortress fell at tick {} in wave {}", tick, wave),
            Rejection::Cancelled => f.write_str("replay cancelled"),
        }
    }
}

impl From<ReplayHalt> for Rejection {
    fn from(halt: ReplayHalt) -> Self {
        match halt {
            ReplayHalt::Cancelled { .. } => Rejection::Cancelled,
            ReplayHalt::Fallen { tick, wave } => Rejection::FortressFallen { tick, wave },
        }
    }
}

/// Result of a successful verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedSegment {
    pub start_wave: u32,
    pub end_wave: u32,
    pub end_state: SimState,
    pub final_hash: u32,
    pub checkpoints_verified: usize,
}

impl VerifiedSegment {
    pub fn wave_delta(&self) -> u32 {
        self.end_wave - self.start_wave
    }
}

/// Cheap checks that need no replay. Returns the segment length in ticks.
pub fn validate_structure(
    claim: &SegmentClaim,
    anchor: &Anchor<'_>,
    rules: &SimRules,
    limits: &VerifyLimits,
) -> Result<u32, Rejection> {
    // 1. Wave range
    if claim.end_wave <= claim.start_wave {
        return Err(Rejection::InvalidWaveRange { start: claim.start_wave, end: claim.end_wave });
    }
    let current = anchor.state.wave();
    if claim.start_wave != current {
        return Err(Rejection::WaveMismatch { expected: current, claimed: claim.start_wave });
    }
    let waves = claim.end_wave - claim.start_wave;
    if waves > limits.max_segment_waves {
        return Err(Rejection::SegmentTooLong { waves, limit: limits.max_segment_waves });
    }
    let total = rules
        .segment_ticks(claim.start_wave, claim.end_wave)
        .ok_or(Rejection::SegmentTooLong { waves, limit: limits.max_segment_waves })?;

    // 2. Events
    if claim.events.len() > limits.max_events {
        return Err(Rejection::TooManyEvents { count: claim.events.len(), limit: limits.max_events });
    }
    for (index, event) in claim.events.iter().enumerate() {
        if event.validate().is_err() {
            return Err(Rejection::MalformedEvent { index });
        }
        if event.tick >= total {
            return Err(Rejection::EventOutOfRange { index, tick: event.tick });
        }
    }

    // 3. Checkpoints: strictly increasing, inside the segment
    let mut prev: Option<u32> = None;
    for (index, cp) in claim.checkpoints.iter().enumerate() {
        if prev.map_or(false, |p| cp.tick <= p) {
            return Err(Rejection::CheckpointsOutOfOrder { index });
        }
        if cp.tick == 0 || cp.tick > total {
            return Err(Rejection::CheckpointOutOfRange { tick: cp.tick });
        }
        prev = Some(cp.tick);
    }

    // 4. Audit coverage
    for tick in required_audit_ticks(anchor.audit_ticks, total) {
        if claim.checkpoints.binary_search_by_key(&tick, |cp| cp.tick).is_err() {
            return Err(Rejection::MissingAuditTick { tick });
        }
    }

    Ok(total)
}

/// Replays `claim` from `anchor` and decides accept/reject.
///
/// Fails fast on the first diverging checkpoint. Nothing about the claim other
/// than its wave range and event log is trusted; every hash is recomputed.
pub fn verify_segment(
    claim: &SegmentClaim,
    anchor: &Anchor<'_>,
    rules: &SimRules,
    limits: &VerifyLimits,
    cancel: Option<&AtomicBool>,
) -> Result<VerifiedSegment, Rejection> {
    let total = validate_structure(claim, anchor, rules, limits)?;

    let mut events = claim.events.clone();
    sort_events(&mut events);

    let mut replay = SegmentReplay::new(anchor.state.clone(), rules, &events, anchor.chain_hash, total);
    for claimed in claim.checkpoints.iter() {
        replay.run_until(claimed.tick, cancel)?;
        let ours = replay.checkpoint();
        if ours.hash32 != claimed.hash32 {
            return Err(Rejection::ChecksumMismatch { tick: claimed.tick, expected: ours.hash32, claimed: claimed.hash32 });
        }
        if ours.chain_hash32 != claimed.chain_hash32 {
            return Err(Rejection::ChainMismatch {
                tick: Some(claimed.tick),
                expected: ours.chain_hash32,
                claimed: claimed.chain_hash32,
            });
        }
    }

    let (end_state, final_hash) = replay.finish(cancel)?;
    if final_hash != claim.final_hash {
        return Err(Rejection::ChainMismatch { tick: None, expected: final_hash, claimed: claim.final_hash });
    }

    Ok(VerifiedSegment {
        start_wave: claim.start_wave,
        end_wave: claim.end_wave,
        end_state,
        final_hash,
        checkpoints_verified: claim.checkpoints.len(),
    })
}
