// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bastion_kernel::rules::{self, SimRules};
use bastion_kernel::verify::{Rejection, VerifyLimits};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::api::*;
use crate::audit::{AuditPolicy, JitteredAuditPolicy};
use crate::config::{ConfigError, NodeConfig};
use crate::errors::EngineError;
use crate::ledger::{unix_now, Ledger, Lifetimes, SessionRecord};
use crate::persistence::SnapshotManager;
use crate::reconciler::Reconciler;
use crate::storage::PlayerStore;
use crate::verifier::{ReplayJob, Verifier};

/// Orchestrates the session protocol over the ledger, verifier, reconciler and
/// store.
pub struct Engine {
    store: Arc<dyn PlayerStore>,
    ledger: Ledger,
    verifier: Verifier,
    reconciler: Reconciler,
    live_rules: &'static SimRules,
}

impl Engine {
    /// Builds an engine with the jittered audit policy. Without a configured
    /// key a random one is drawn, which invalidates schedules across restarts.
    pub fn new(cfg: &NodeConfig, store: Arc<dyn PlayerStore>) -> Result<Self, EngineError> {
        let key = match cfg.audit_key {
            Some(key) => key,
            None => {
                tracing::warn!("No audit key configured; using a random one");
                let mut key = [0u8; 32];
                OsRng.fill_bytes(&mut key);
                key
            }
        };
        let audit = Arc::new(JitteredAuditPolicy::new(
            key,
            cfg.audit_interval_ticks,
            cfg.audit_jitter_ticks,
            cfg.audit_horizon_waves,
        ));
        Self::with_audit_policy(cfg, store, audit)
    }

    pub fn with_audit_policy(
        cfg: &NodeConfig,
        store: Arc<dyn PlayerStore>,
        audit: Arc<dyn AuditPolicy>,
    ) -> Result<Self, EngineError> {
        cfg.validate()?;
        let live_rules = rules::ruleset(&cfg.live_sim_version)
            .ok_or_else(|| ConfigError::UnknownSimVersion(cfg.live_sim_version.clone()))?;

        let lifetimes = Lifetimes {
            session_timeout_secs: cfg.session_timeout_secs,
            ended_retention_secs: cfg.ended_retention_secs,
        };
        let ledger = Ledger::new(store.clone(), audit, live_rules, lifetimes)?;
        let verifier = Verifier::new(
            cfg.replay_workers,
            Duration::from_millis(cfg.verify_timeout_ms),
            VerifyLimits { max_segment_waves: cfg.max_segment_waves, max_events: cfg.max_segment_events },
        );
        let reconciler = Reconciler::new(store.clone(), cfg.partial_credit_bps, cfg.partial_credit_max_waves);

        Ok(Self { store, ledger, verifier, reconciler, live_rules })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn store(&self) -> &Arc<dyn PlayerStore> {
        &self.store
    }

    pub async fn start_session(&self, user_id: &str, req: StartSessionRequest) -> Result<StartSessionResponse, EngineError> {
        let (session, player) = self.ledger.start_session(user_id, req.start_wave, unix_now()).await?;
        metrics::counter!("bastion_sessions_started_total", 1);
        self.update_active_gauge();

        let rules = self.live_rules;
        Ok(StartSessionResponse {
            session_id: session.session_id.to_string(),
            session_token: session.token,
            seed: session.seed,
            sim_version: session.sim_version,
            tick_hz: session.tick_hz,
            starting_wave: session.starting_wave,
            segment_audit_ticks: session.audit_ticks,
            inventory: player.inventory,
            progression_bonuses: session.bonuses,
            fortress_base_hp: rules.fortress_base_hp,
            fortress_base_damage: rules.fortress_base_damage,
            wave_interval_ticks: rules.wave_interval_ticks,
            power_data: PowerData {
                level: player.progression.level,
                fortress_hp_bps: session.bonuses.fortress_hp_bps,
                fortress_damage_bps: session.bonuses.fortress_damage_bps,
                attack_interval_ticks: rules.attack_interval_ticks,
            },
        })
    }

    pub async fn submit_segment(&self, user_id: &str, req: SegmentRequest) -> Result<SegmentResponse, EngineError> {
        let now = unix_now();
        let mut session = self.ledger.acquire(&req.session_token, user_id).await?;
        self.ledger.expire_if_idle(&mut session, now)?;
        if !session.is_active() {
            return Err(EngineError::SessionEnded);
        }
        self.ledger.touch(&mut session, now)?;

        // Retried submission of a range that already landed.
        if req.start_wave != session.current_wave {
            if let Some(entry) = session.find_segment(req.start_wave, req.end_wave) {
                if entry.final_hash == req.final_hash {
                    let player = self.store.load_player(user_id)?;
                    metrics::counter!("bastion_segments_duplicate_total", 1);
                    tracing::info!(session = %session.session_id, start = req.start_wave, end = req.end_wave, "duplicate segment");
                    return Ok(SegmentResponse::accepted(entry.earned, session.audit_ticks.clone(), &player, true));
                }
            }
        }

        let claim = match self.verifier.decode_claim(req) {
            Ok(claim) => claim,
            Err(rejection) => return self.reject(&session, rejection),
        };
        let job = ReplayJob {
            claim,
            base: session.sim_state.clone(),
            chain_hash: session.chain_hash,
            audit_ticks: session.audit_ticks.clone(),
            rules: session.rules()?,
        };

        let verified = match self.verifier.verify(job).await? {
            Ok(verified) => verified,
            Err(rejection) => return self.reject(&session, rejection),
        };

        let deltas = self.reconciler.price(&session, &verified);
        let checkpoints = verified.checkpoints_verified;
        let player = self
            .ledger
            .record_verified_segment(&mut session, verified, deltas, &self.reconciler, now)?;

        metrics::counter!("bastion_segments_verified_total", 1);
        tracing::info!(
            session = %session.session_id,
            wave = session.current_wave,
            checkpoints,
            gold = deltas.gold,
            "segment verified"
        );
        Ok(SegmentResponse::accepted(deltas, session.audit_ticks.clone(), &player, false))
    }

    fn reject(&self, session: &SessionRecord, rejection: Rejection) -> Result<SegmentResponse, EngineError> {
        let reason = rejection.reason();
        metrics::counter!("bastion_segments_rejected_total", 1, "reason" => reason);
        // Forensic detail stays in the log.
        tracing::warn!(
            session = %session.session_id,
            user = %session.user_id,
            wave = session.current_wave,
            reason,
            "segment rejected: {}",
            rejection
        );
        let player = self.store.load_player(&session.user_id)?;
        Ok(SegmentResponse::rejected(reason, session.audit_ticks.clone(), &player))
    }

    pub async fn end_session(&self, user_id: &str, req: EndSessionRequest) -> Result<EndSessionResponse, EngineError> {
        let now = unix_now();
        let mut session = self.ledger.acquire(&req.session_token, user_id).await?;
        self.ledger.expire_if_idle(&mut session, now)?;

        // Retried end, or end after expiry.
        if let Some(accounting) = &session.final_accounting {
            let player = self.store.load_player(user_id)?;
            return Ok(EndSessionResponse::new(accounting, &player));
        }

        let (accounting, player) = self
            .ledger
            .end_session(&mut session, req.final_wave, &self.reconciler, now)?;
        drop(session);

        metrics::counter!("bastion_sessions_ended_total", 1);
        self.update_active_gauge();
        Ok(EndSessionResponse::new(&accounting, &player))
    }

    pub async fn expire_idle(&self, now: u64) -> usize {
        let expired = self.ledger.expire_idle(now).await;
        if expired > 0 {
            metrics::counter!("bastion_sessions_ended_total", expired as u64);
            self.update_active_gauge();
        }
        expired
    }

    /// Forgets sessions whose end is older than the retention window.
    pub async fn evict_ended(&self, now: u64) -> usize {
        let evicted = self.ledger.evict_ended(now).await;
        if evicted > 0 {
            metrics::counter!("bastion_sessions_evicted_total", evicted as u64);
        }
        evicted
    }

    /// Writes the store to `path`. Returns the snapshot size in bytes.
    pub fn save_snapshot(&self, path: &Path) -> Result<u64, EngineError> {
        let snapshot = self.store.snapshot()?;
        let bytes = SnapshotManager::save(path, &snapshot)?;
        metrics::gauge!("bastion_snapshot_size_bytes", bytes as f64);
        Ok(bytes)
    }

    fn update_active_gauge(&self) {
        let active = self.ledger.active_sessions();
        metrics::gauge!("bastion_active_sessions", active as f64);
    }
}
