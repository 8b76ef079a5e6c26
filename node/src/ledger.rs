// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Session ledger.
//!
//! Sessions are indexed by token. Each one sits behind its own async mutex and
//! is only ever taken with `try_lock_owned`, so a second request for a session
//! that is already being processed fails fast with `SessionBusy` instead of
//! queueing behind a replay.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use bastion_kernel::checkpoint::genesis;
use bastion_kernel::economy::{ProgressionBonuses, RewardDeltas};
use bastion_kernel::error::KernelError;
use bastion_kernel::rules::{self, SimRules};
use bastion_kernel::state::{SimParams, SimState};
use bastion_kernel::verify::VerifiedSegment;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::audit::AuditPolicy;
use crate::errors::EngineError;
use crate::reconciler::Reconciler;
use crate::storage::{Grant, PlayerRecord, PlayerStore};

pub type SessionHandle = Arc<Mutex<SessionRecord>>;
pub type SessionGuard = OwnedMutexGuard<SessionRecord>;

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Ended,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    Explicit,
    Expired,
}

/// One accepted segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentEntry {
    pub start_wave: u32,
    pub end_wave: u32,
    pub final_hash: u32,
    pub earned: RewardDeltas,
    /// Schedule issued once this segment was accepted.
    pub next_audit_ticks: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalAccounting {
    pub final_wave: u32,
    pub partial_waves: u32,
    pub partial: RewardDeltas,
    /// Verified earnings plus `partial`.
    pub total: RewardDeltas,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub token: String,
    pub user_id: String,

    pub seed: u32,
    pub sim_version: String,
    pub tick_hz: u32,
    pub starting_wave: u32,
    pub bonuses: ProgressionBonuses,

    pub current_wave: u32,
    pub earned: RewardDeltas,
    pub audit_ticks: Vec<u32>,
    pub chain_hash: u32,
    pub segment_index: u32,
    pub sim_state: SimState,
    pub history: Vec<SegmentEntry>,

    pub status: SessionStatus,
    pub end_reason: Option<EndReason>,
    pub final_accounting: Option<FinalAccounting>,
    pub created_at: u64,
    pub last_activity: u64,
    pub ended_at: Option<u64>,
}

impl SessionRecord {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Ruleset pinned at session start.
    pub fn rules(&self) -> Result<&'static SimRules, EngineError> {
        rules::ruleset(&self.sim_version).ok_or(EngineError::Kernel(KernelError::UnknownSimVersion))
    }

    pub fn find_segment(&self, start_wave: u32, end_wave: u32) -> Option<&SegmentEntry> {
        self.history
            .iter()
            .find(|e| e.start_wave == start_wave && e.end_wave == end_wave)
    }

    pub fn is_idle(&self, now: u64, timeout_secs: u64) -> bool {
        now.saturating_sub(self.last_activity) > timeout_secs
    }

    /// Ended longer than `retention_secs` ago.
    pub fn is_evictable(&self, now: u64, retention_secs: u64) -> bool {
        !self.is_active() && self.ended_at.map_or(false, |at| now.saturating_sub(at) > retention_secs)
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// How long sessions live in the ledger.
#[derive(Clone, Copy, Debug)]
pub struct Lifetimes {
    /// Idle time after which an active session expires.
    pub session_timeout_secs: u64,
    /// Time an ended session stays answerable to end retries and duplicate
    /// submissions before it is evicted.
    pub ended_retention_secs: u64,
}

pub struct Ledger {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    active: AtomicUsize,
    store: Arc<dyn PlayerStore>,
    audit: Arc<dyn AuditPolicy>,
    live_rules: &'static SimRules,
    lifetimes: Lifetimes,
}

impl Ledger {
    /// Builds the index from rows already in `store`.
    pub fn new(
        store: Arc<dyn PlayerStore>,
        audit: Arc<dyn AuditPolicy>,
        live_rules: &'static SimRules,
        lifetimes: Lifetimes,
    ) -> Result<Self, EngineError> {
        let rows = store.sessions()?;
        let active = rows.iter().filter(|s| s.is_active()).count();
        let index = rows
            .into_iter()
            .map(|s| (s.token.clone(), Arc::new(Mutex::new(s))))
            .collect();
        Ok(Self {
            sessions: RwLock::new(index),
            active: AtomicUsize::new(active),
            store,
            audit,
            live_rules,
            lifetimes,
        })
    }

    fn mark_ended(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub async fn start_session(
        &self,
        user_id: &str,
        start_wave: u32,
        now: u64,
    ) -> Result<(SessionRecord, PlayerRecord), EngineError> {
        let player = self.store.load_player(user_id)?;
        if start_wave > player.highest_wave {
            return Err(EngineError::InvalidStartWave { requested: start_wave, highest: player.highest_wave });
        }

        let rules = self.live_rules;
        let seed = OsRng.next_u32();
        let bonuses = ProgressionBonuses::for_level(player.progression.level);
        let params = SimParams::new(seed, start_wave, rules, &bonuses);
        let session_id = Uuid::new_v4();

        let record = SessionRecord {
            session_id,
            token: new_token(),
            user_id: user_id.to_string(),
            seed,
            sim_version: rules.version.to_string(),
            tick_hz: rules.tick_hz,
            starting_wave: start_wave,
            bonuses,
            current_wave: start_wave,
            earned: RewardDeltas::ZERO,
            audit_ticks: self.audit.schedule(&session_id, 0, rules),
            chain_hash: genesis(seed),
            segment_index: 0,
            sim_state: SimState::genesis(&params),
            history: Vec::new(),
            status: SessionStatus::Active,
            end_reason: None,
            final_accounting: None,
            created_at: now,
            last_activity: now,
            ended_at: None,
        };

        self.store.commit_start(&record)?;
        self.sessions
            .write()
            .await
            .insert(record.token.clone(), Arc::new(Mutex::new(record.clone())));
        self.active.fetch_add(1, Ordering::SeqCst);

        tracing::info!(session = %session_id, user = user_id, start_wave, "session started");
        Ok((record, player))
    }

    /// Takes the single-writer lock of the session behind `token`.
    ///
    /// A token that belongs to another user is reported as unknown.
    pub async fn acquire(&self, token: &str, user_id: &str) -> Result<SessionGuard, EngineError> {
        let handle = self
            .sessions
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(EngineError::SessionNotFound)?;
        let guard = handle.try_lock_owned().map_err(|_| EngineError::SessionBusy)?;
        if guard.user_id != user_id {
            return Err(EngineError::SessionNotFound);
        }
        Ok(guard)
    }

    /// Records activity on `session` in the store as well as in memory, so a
    /// restored ledger does not expire it early.
    pub fn touch(&self, session: &mut SessionRecord, now: u64) -> Result<(), EngineError> {
        self.store.touch_session(&session.session_id, now)?;
        session.last_activity = now;
        Ok(())
    }

    /// Advances `session` past `verified` and credits `deltas` in one store
    /// commit. On failure `session` is left untouched.
    pub fn record_verified_segment(
        &self,
        session: &mut SessionRecord,
        verified: VerifiedSegment,
        deltas: RewardDeltas,
        reconciler: &Reconciler,
        now: u64,
    ) -> Result<PlayerRecord, EngineError> {
        let rules = session.rules()?;
        let expected_wave = session.current_wave;

        let mut next = session.clone();
        next.current_wave = verified.end_wave;
        next.chain_hash = verified.final_hash;
        next.sim_state = verified.end_state;
        next.earned = next.earned.saturating_add(deltas);
        next.segment_index += 1;
        next.audit_ticks = self.audit.schedule(&next.session_id, next.segment_index, rules);
        next.history.push(SegmentEntry {
            start_wave: verified.start_wave,
            end_wave: verified.end_wave,
            final_hash: verified.final_hash,
            earned: deltas,
            next_audit_ticks: next.audit_ticks.clone(),
        });
        next.last_activity = now;

        let player = reconciler.apply_rewards(&next, &deltas, expected_wave)?;
        *session = next;
        Ok(player)
    }

    /// Closes `session`, crediting unverified waves up to `final_wave` at the
    /// partial rate.
    pub fn end_session(
        &self,
        session: &mut SessionRecord,
        final_wave: u32,
        reconciler: &Reconciler,
        now: u64,
    ) -> Result<(FinalAccounting, PlayerRecord), EngineError> {
        if !session.is_active() {
            return Err(EngineError::SessionEnded);
        }
        let (partial_waves, partial) = reconciler.partial_credit(session, final_wave);
        let accounting = FinalAccounting {
            final_wave: session.current_wave + partial_waves,
            partial_waves,
            partial,
            total: session.earned.saturating_add(partial),
        };

        let mut next = session.clone();
        next.status = SessionStatus::Ended;
        next.end_reason = Some(EndReason::Explicit);
        next.final_accounting = Some(accounting.clone());
        next.last_activity = now;
        next.ended_at = Some(now);

        let player = reconciler.close(&next, &partial)?;
        *session = next;
        self.mark_ended();
        tracing::info!(
            session = %session.session_id,
            final_wave = accounting.final_wave,
            partial_waves,
            "session ended"
        );
        Ok((accounting, player))
    }

    /// Ends `session` without partial credit if it has been idle too long.
    /// Returns whether it expired.
    pub fn expire_if_idle(&self, session: &mut SessionRecord, now: u64) -> Result<bool, EngineError> {
        if !session.is_active() || !session.is_idle(now, self.lifetimes.session_timeout_secs) {
            return Ok(false);
        }

        let mut next = session.clone();
        next.status = SessionStatus::Ended;
        next.end_reason = Some(EndReason::Expired);
        next.final_accounting = Some(FinalAccounting {
            final_wave: session.current_wave,
            partial_waves: 0,
            partial: RewardDeltas::ZERO,
            total: session.earned,
        });
        next.ended_at = Some(now);

        self.store.commit_end(&next, &Grant::none())?;
        *session = next;
        self.mark_ended();
        tracing::info!(session = %session.session_id, "session expired");
        Ok(true)
    }

    /// Expires every idle session not currently locked. Returns how many
    /// expired.
    pub async fn expire_idle(&self, now: u64) -> usize {
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();
        let mut expired = 0;
        for handle in handles {
            let Ok(mut guard) = handle.try_lock_owned() else {
                continue;
            };
            match self.expire_if_idle(&mut guard, now) {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!(session = %guard.session_id, "expiry commit failed: {}", e),
            }
        }
        expired
    }

    /// Drops sessions that ended more than `ended_retention_secs` ago from
    /// the index and the store. Returns how many were evicted.
    pub async fn evict_ended(&self, now: u64) -> usize {
        let retention = self.lifetimes.ended_retention_secs;
        let candidates: Vec<(String, SessionHandle)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(token, handle)| (token.clone(), handle.clone()))
            .collect();

        let mut evicted = 0;
        for (token, handle) in candidates {
            // Held sessions are skipped and picked up by a later sweep.
            let Ok(guard) = handle.try_lock_owned() else {
                continue;
            };
            if !guard.is_evictable(now, retention) {
                continue;
            }
            if let Err(e) = self.store.remove_session(&guard.session_id) {
                tracing::warn!(session = %guard.session_id, "eviction failed: {}", e);
                continue;
            }
            self.sessions.write().await.remove(&token);
            tracing::debug!(session = %guard.session_id, "session evicted");
            evicted += 1;
        }
        evicted
    }

    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Sessions currently indexed, active or ended.
    pub async fn indexed_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audit::FixedAuditPolicy;
    use crate::storage::MemoryStore;
    use bastion_kernel::rules::RULES_V1_1;

    pub(crate) fn sample_session(user_id: &str) -> SessionRecord {
        let bonuses = ProgressionBonuses::default();
        let params = SimParams::new(7, 0, &RULES_V1_1, &bonuses);
        SessionRecord {
            session_id: Uuid::from_u128(7),
            token: "tok".into(),
            user_id: user_id.into(),
            seed: 7,
            sim_version: RULES_V1_1.version.into(),
            tick_hz: RULES_V1_1.tick_hz,
            starting_wave: 0,
            bonuses,
            current_wave: 0,
            earned: RewardDeltas::ZERO,
            audit_ticks: vec![100, 200],
            chain_hash: genesis(7),
            segment_index: 0,
            sim_state: SimState::genesis(&params),
            history: Vec::new(),
            status: SessionStatus::Active,
            end_reason: None,
            final_accounting: None,
            created_at: 1_000,
            last_activity: 1_000,
            ended_at: None,
        }
    }

    const LIFETIMES: Lifetimes = Lifetimes { session_timeout_secs: 60, ended_retention_secs: 120 };

    fn ledger(store: Arc<MemoryStore>) -> Ledger {
        Ledger::new(store, Arc::new(FixedAuditPolicy::new(vec![100, 200])), &RULES_V1_1, LIFETIMES).unwrap()
    }

    #[tokio::test]
    async fn test_start_session_checks_highest_wave() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger(store.clone());

        let err = ledger.start_session("ada", 3, 1_000).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidStartWave { requested: 3, highest: 0 }));

        let (record, _) = ledger.start_session("ada", 0, 1_000).await.unwrap();
        assert_eq!(record.token.len(), 64);
        assert_eq!(record.audit_ticks, vec![100, 200]);
        assert_eq!(record.chain_hash, genesis(record.seed));
        assert_eq!(store.sessions().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_acquire_is_exclusive_and_owned() {
        let ledger = ledger(Arc::new(MemoryStore::new()));
        let (record, _) = ledger.start_session("ada", 0, 1_000).await.unwrap();

        let held = ledger.acquire(&record.token, "ada").await.unwrap();
        assert!(matches!(ledger.acquire(&record.token, "ada").await, Err(EngineError::SessionBusy)));
        drop(held);

        assert!(matches!(ledger.acquire(&record.token, "eve").await, Err(EngineError::SessionNotFound)));
        assert!(matches!(ledger.acquire("nope", "ada").await, Err(EngineError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_expire_idle_ends_without_credit() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger(store.clone());
        let (record, _) = ledger.start_session("ada", 0, 1_000).await.unwrap();

        assert_eq!(ledger.expire_idle(1_030).await, 0);
        assert_eq!(ledger.expire_idle(1_061).await, 1);
        assert_eq!(ledger.active_sessions(), 0);

        let guard = ledger.acquire(&record.token, "ada").await.unwrap();
        assert_eq!(guard.status, SessionStatus::Ended);
        assert_eq!(guard.end_reason, Some(EndReason::Expired));
        assert_eq!(guard.final_accounting.as_ref().unwrap().total, RewardDeltas::ZERO);
        assert_eq!(store.load_player("ada").unwrap().inventory.gold, 0);
    }

    #[tokio::test]
    async fn test_index_rebuilt_from_store() {
        let store = Arc::new(MemoryStore::new());
        let token = {
            let first = ledger(store.clone());
            first.start_session("ada", 0, 1_000).await.unwrap().0.token
        };
        let second = ledger(store);
        assert!(second.acquire(&token, "ada").await.is_ok());
    }

    #[tokio::test]
    async fn test_touch_survives_restore() {
        let store = Arc::new(MemoryStore::new());
        let first = ledger(store.clone());
        let (record, _) = first.start_session("ada", 0, 1_000).await.unwrap();
        {
            let mut guard = first.acquire(&record.token, "ada").await.unwrap();
            first.touch(&mut guard, 1_050).unwrap();
        }
        assert_eq!(store.sessions().unwrap()[0].last_activity, 1_050);

        // Idle for 50s since the touch, 100s since the start.
        let restored = ledger(store);
        assert_eq!(restored.expire_idle(1_100).await, 0);
        assert_eq!(restored.active_sessions(), 1);
    }

    #[tokio::test]
    async fn test_ended_sessions_are_evicted_after_retention() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger(store.clone());
        let reconciler = Reconciler::new(store.clone(), 5_000, 10);
        let (ended, _) = ledger.start_session("ada", 0, 1_000).await.unwrap();
        let (idle, _) = ledger.start_session("bob", 0, 1_000).await.unwrap();
        assert_eq!(ledger.active_sessions(), 2);

        {
            let mut guard = ledger.acquire(&ended.token, "ada").await.unwrap();
            ledger.end_session(&mut guard, 0, &reconciler, 1_010).unwrap();
        }
        assert_eq!(ledger.active_sessions(), 1);

        // Still inside the retry window.
        assert_eq!(ledger.evict_ended(1_100).await, 0);
        assert!(ledger.acquire(&ended.token, "ada").await.is_ok());

        assert_eq!(ledger.evict_ended(1_131).await, 1);
        assert!(matches!(ledger.acquire(&ended.token, "ada").await, Err(EngineError::SessionNotFound)));
        assert_eq!(ledger.indexed_sessions().await, 1);
        assert_eq!(store.sessions().unwrap().len(), 1);

        // Retention for expired sessions counts from the expiry, not the last activity.
        assert_eq!(ledger.expire_idle(1_200).await, 1);
        assert_eq!(ledger.active_sessions(), 0);
        assert_eq!(ledger.evict_ended(1_300).await, 0);
        assert_eq!(ledger.evict_ended(1_321).await, 1);
        assert!(matches!(ledger.acquire(&idle.token, "bob").await, Err(EngineError::SessionNotFound)));
        assert_eq!(ledger.indexed_sessions().await, 0);
        assert!(store.sessions().unwrap().is_empty());
    }
}
