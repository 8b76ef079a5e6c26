// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Reward reconciliation.
//!
//! Prices come from the kernel tables and the session's frozen bonuses. The
//! client's own totals are never read.

use std::sync::Arc;

use bastion_kernel::economy::{price_partial, price_segment, RewardDeltas};
use bastion_kernel::verify::VerifiedSegment;

use crate::errors::EngineError;
use crate::ledger::SessionRecord;
use crate::storage::{Grant, PlayerRecord, PlayerStore};

pub struct Reconciler {
    store: Arc<dyn PlayerStore>,
    partial_credit_bps: u32,
    partial_credit_max_waves: u32,
}

impl Reconciler {
    pub fn new(store: Arc<dyn PlayerStore>, partial_credit_bps: u32, partial_credit_max_waves: u32) -> Self {
        Self { store, partial_credit_bps, partial_credit_max_waves }
    }

    pub fn price(&self, session: &SessionRecord, verified: &VerifiedSegment) -> RewardDeltas {
        price_segment(verified.start_wave, verified.end_wave, &session.bonuses)
    }

    /// Commits the advanced session row and credits `deltas` together.
    ///
    /// `expected_wave` is the session wave before the segment; a row that has
    /// already moved past it is a conflict and nothing is credited.
    pub fn apply_rewards(
        &self,
        next: &SessionRecord,
        deltas: &RewardDeltas,
        expected_wave: u32,
    ) -> Result<PlayerRecord, EngineError> {
        let grant = Grant { deltas: *deltas, reached_wave: Some(next.current_wave) };
        let player = self.store.commit_segment(next, expected_wave, &grant)?;
        tracing::debug!(
            session = %next.session_id,
            gold = deltas.gold,
            dust = deltas.dust,
            xp = deltas.xp,
            level = player.progression.level,
            "rewards applied"
        );
        Ok(player)
    }

    /// Unverified waves between the last verified wave and `final_wave`,
    /// with their reduced-rate price.
    pub fn partial_credit(&self, session: &SessionRecord, final_wave: u32) -> (u32, RewardDeltas) {
        price_partial(
            session.current_wave,
            final_wave,
            self.partial_credit_max_waves,
            self.partial_credit_bps,
            &session.bonuses,
        )
    }

    /// Commits the terminal row. Partial waves never unlock start waves.
    pub fn close(&self, ended: &SessionRecord, partial: &RewardDeltas) -> Result<PlayerRecord, EngineError> {
        let grant = Grant { deltas: *partial, reached_wave: None };
        Ok(self.store.commit_end(ended, &grant)?)
    }
}
