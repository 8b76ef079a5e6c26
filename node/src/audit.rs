// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Audit schedules.
//!
//! A schedule lists segment-local ticks the next segment must checkpoint. The
//! jittered policy derives each schedule from a server secret, so a client
//! learns the ticks only when the previous segment is accepted.

use bastion_kernel::rules::SimRules;
use uuid::Uuid;

pub trait AuditPolicy: Send + Sync {
    /// Strictly increasing ticks in `1..=horizon`.
    fn schedule(&self, session_id: &Uuid, segment_index: u32, rules: &SimRules) -> Vec<u32>;
}

pub struct JitteredAuditPolicy {
    key: [u8; 32],
    interval_ticks: u32,
    jitter_ticks: u32,
    horizon_waves: u32,
}

impl JitteredAuditPolicy {
    pub fn new(key: [u8; 32], interval_ticks: u32, jitter_ticks: u32, horizon_waves: u32) -> Self {
        Self {
            key,
            interval_ticks: interval_ticks.max(1),
            jitter_ticks,
            horizon_waves: horizon_waves.max(1),
        }
    }
}

impl AuditPolicy for JitteredAuditPolicy {
    fn schedule(&self, session_id: &Uuid, segment_index: u32, rules: &SimRules) -> Vec<u32> {
        let horizon = self.horizon_waves.saturating_mul(rules.wave_interval_ticks);
        let slots = horizon / self.interval_ticks;
        let half = self.jitter_ticks / 2;
        let span = 2 * half + 1;

        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(session_id.as_bytes());
        hasher.update(&segment_index.to_le_bytes());
        let mut xof = hasher.finalize_xof();

        let mut ticks = Vec::with_capacity(slots as usize);
        for slot in 1..=slots {
            let mut word = [0u8; 4];
            xof.fill(&mut word);
            let offset = u32::from_le_bytes(word) % span;
            let tick = (slot * self.interval_ticks)
                .saturating_add(offset)
                .saturating_sub(half)
                .clamp(1, horizon);
            if ticks.last().map_or(true, |&prev| tick > prev) {
                ticks.push(tick);
            }
        }
        ticks
    }
}

/// Same schedule for every segment.
pub struct FixedAuditPolicy {
    ticks: Vec<u32>,
}

impl FixedAuditPolicy {
    pub fn new(mut ticks: Vec<u32>) -> Self {
        ticks.sort_unstable();
        ticks.dedup();
        ticks.retain(|&t| t > 0);
        Self { ticks }
    }
}

impl AuditPolicy for FixedAuditPolicy {
    fn schedule(&self, _session_id: &Uuid, _segment_index: u32, _rules: &SimRules) -> Vec<u32> {
        self.ticks.clone()
    }
}
