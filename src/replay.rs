//! Deterministic Segment Replay.

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::checkpoint::{chain, hash_rules, hash_state, ChainBuilder, Checkpoint};
use crate::config::CANCEL_POLL_TICKS;
use crate::event::{sort_events, SimEvent};
use crate::rules::SimRules;
use crate::state::SimState;

/// Why a replay stopped before the end of its segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplayHalt {
    /// The cancel flag was raised.
    Cancelled { tick: u32 },
    /// Fortress hp reached zero at `tick` during `wave`.
    Fallen { tick: u32, wave: u32 },
}

/// Drives a `SimState` through one segment.
///
/// Events must already be sorted by tick (see `sort_events`). Ticks are
/// segment-local: `local_tick` counts steps taken since `new`. The chain is
/// salted with `hash_rules(rules)` before the first checkpoint.
pub struct SegmentReplay<'a> {
    state: SimState,
    rules: &'a SimRules,
    events: &'a [SimEvent],
    next_event: usize,
    chain: ChainBuilder,
    local_tick: u32,
    total_ticks: u32,
}

impl<'a> SegmentReplay<'a> {
    pub fn new(
        base: SimState,
        rules: &'a SimRules,
        events: &'a [SimEvent],
        start_chain: u32,
        total_ticks: u32,
    ) -> Self {
        Self {
            state: base,
            rules,
            events,
            next_event: 0,
            chain: ChainBuilder::new(chain(start_chain, hash_rules(rules))),
            local_tick: 0,
            total_ticks,
        }
    }

    pub fn local_tick(&self) -> u32 {
        self.local_tick
    }

    pub fn state(&self) -> &SimState {
        &self.state
    }

    /// Simulates until `local_tick == target` (clamped to the segment length).
    pub fn run_until(&mut self, target: u32, cancel: Option<&AtomicBool>) -> Result<(), ReplayHalt> {
        let target = target.min(self.total_ticks);
        while self.local_tick < target {
            if self.local_tick % CANCEL_POLL_TICKS == 0 {
                if let Some(flag) = cancel {
                    if flag.load(Ordering::Relaxed) {
                        return Err(ReplayHalt::Cancelled { tick: self.local_tick });
                    }
                }
            }

            while let Some(event) = self.events.get(self.next_event) {
                if event.tick > self.local_tick {
                    break;
                }
                self.state.apply_event(event, self.rules);
                self.next_event += 1;
            }

            self.state.step(self.rules);
            self.local_tick += 1;

            if self.state.fallen() {
                return Err(ReplayHalt::Fallen { tick: self.local_tick, wave: self.state.wave() });
            }
        }
        Ok(())
    }

    /// Attests the current state and links it into the chain.
    pub fn checkpoint(&mut self) -> Checkpoint {
        let h = hash_state(&self.state);
        self.chain.push(self.local_tick, h)
    }

    /// Runs to the end of the segment and seals the chain.
    ///
    /// Returns the end state and the segment's final hash.
    pub fn finish(mut self, cancel: Option<&AtomicBool>) -> Result<(SimState, u32), ReplayHalt> {
        self.run_until(self.total_ticks, cancel)?;
        let final_hash = self.chain.seal(hash_state(&self.state));
        Ok((self.state, final_hash))
    }
}

/// Output of a locally played segment, ready to be submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedSegment {
    pub start_wave: u32,
    pub end_wave: u32,
    pub events: Vec<SimEvent>,
    pub checkpoints: Vec<Checkpoint>,
    pub final_hash: u32,
    pub end_state: SimState,
}

/// Audit ticks a segment of `segment_ticks` length must checkpoint.
pub fn required_audit_ticks(audit_ticks: &[u32], segment_ticks: u32) -> impl Iterator<Item = u32> + '_ {
    audit_ticks.iter().copied().filter(move |t| *t >= 1 && *t <= segment_ticks)
}

/// Plays waves `base.wave()..end_wave` with `events`, checkpointing at every
/// audit tick that falls inside the segment.
///
/// This is the honest-client path; the verifier replays the same loop.
pub fn record_segment(
    base: &SimState,
    rules: &SimRules,
    start_chain: u32,
    end_wave: u32,
    mut events: Vec<SimEvent>,
    audit_ticks: &[u32],
) -> Result<RecordedSegment, ReplayHalt> {
    let start_wave = base.wave();
    let total = rules.segment_ticks(start_wave, end_wave).unwrap_or(0);
    sort_events(&mut events);

    let mut replay = SegmentReplay::new(base.clone(), rules, &events, start_chain, total);
    let mut checkpoints = Vec::new();
    for tick in required_audit_ticks(audit_ticks, total) {
        replay.run_until(tick, None)?;
        checkpoints.push(replay.checkpoint());
    }
    let (end_state, final_hash) = replay.finish(None)?;

    Ok(RecordedSegment {
        start_wave,
        end_wave,
        events,
        checkpoints,
        final_hash,
        end_state,
    })
}
