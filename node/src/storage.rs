// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Player and session rows.
//!
//! Every mutating call writes the session row and the player record in one
//! step. The segment commit is guarded by the wave the caller last saw, so two
//! commits for the same range can never both land.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use bastion_kernel::economy::{Inventory, Progression, RewardDeltas};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::ledger::{SessionRecord, SessionStatus};
use crate::persistence::StoreSnapshot;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("session row moved: expected wave {expected}, found {found}")]
    Conflict { expected: u32, found: u32 },
    #[error("session {0} has no stored row")]
    UnknownSession(Uuid),
    #[error("session {0} already exists")]
    DuplicateSession(Uuid),
    #[error("session {0} is still active")]
    StillActive(Uuid),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub user_id: String,
    pub inventory: Inventory,
    pub progression: Progression,
    /// Highest wave reached through verified play; the start-wave ceiling.
    pub highest_wave: u32,
}

impl PlayerRecord {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            inventory: Inventory::default(),
            progression: Progression::default(),
            highest_wave: 0,
        }
    }

    pub fn apply(&mut self, grant: &Grant) {
        self.inventory.credit(&grant.deltas);
        self.progression.gain_xp(grant.deltas.xp);
        if let Some(wave) = grant.reached_wave {
            self.highest_wave = self.highest_wave.max(wave);
        }
    }
}

/// Rewards credited to a player alongside a session write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Grant {
    pub deltas: RewardDeltas,
    /// Verified wave that unlocks later start waves.
    pub reached_wave: Option<u32>,
}

impl Grant {
    pub fn none() -> Self {
        Self::default()
    }
}

pub trait PlayerStore: Send + Sync {
    /// Returns the stored player, or a fresh record for unknown users.
    fn load_player(&self, user_id: &str) -> Result<PlayerRecord, StorageError>;

    fn commit_start(&self, session: &SessionRecord) -> Result<(), StorageError>;

    /// Writes the advanced `session` row and credits `grant`, provided the
    /// stored row is still active at `expected_wave`.
    fn commit_segment(
        &self,
        session: &SessionRecord,
        expected_wave: u32,
        grant: &Grant,
    ) -> Result<PlayerRecord, StorageError>;

    /// Writes the terminal `session` row and credits `grant`. Fails when the
    /// stored row has already ended.
    fn commit_end(&self, session: &SessionRecord, grant: &Grant) -> Result<PlayerRecord, StorageError>;

    /// Records activity on a session row without changing anything else.
    fn touch_session(&self, session_id: &Uuid, now: u64) -> Result<(), StorageError>;

    /// Deletes an ended session row. Active rows are never removed.
    fn remove_session(&self, session_id: &Uuid) -> Result<(), StorageError>;

    fn sessions(&self) -> Result<Vec<SessionRecord>, StorageError>;

    fn snapshot(&self) -> Result<StoreSnapshot, StorageError>;
}

#[derive(Default)]
struct StoreState {
    players: HashMap<String, PlayerRecord>,
    sessions: HashMap<Uuid, SessionRecord>,
}

/// In-process store behind a single mutex.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    failures: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let state = StoreState {
            players: snapshot.players.into_iter().map(|p| (p.user_id.clone(), p)).collect(),
            sessions: snapshot.sessions.into_iter().map(|s| (s.session_id, s)).collect(),
        };
        Self { state: Mutex::new(state), failures: AtomicUsize::new(0) }
    }

    /// Makes the next `n` commits fail with `Unavailable`.
    pub fn fail_next_commits(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn put_player(&self, player: PlayerRecord) -> Result<(), StorageError> {
        self.lock()?.players.insert(player.user_id.clone(), player);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Unavailable("store lock poisoned".into()))
    }

    fn injected_failure(&self) -> Result<(), StorageError> {
        let hit = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if hit {
            return Err(StorageError::Unavailable("injected failure".into()));
        }
        Ok(())
    }

    fn credit(state: &mut StoreState, user_id: &str, grant: &Grant) -> PlayerRecord {
        let player = state
            .players
            .entry(user_id.to_string())
            .or_insert_with(|| PlayerRecord::new(user_id));
        player.apply(grant);
        player.clone()
    }
}

impl PlayerStore for MemoryStore {
    fn load_player(&self, user_id: &str) -> Result<PlayerRecord, StorageError> {
        let state = self.lock()?;
        Ok(state.players.get(user_id).cloned().unwrap_or_else(|| PlayerRecord::new(user_id)))
    }

    fn commit_start(&self, session: &SessionRecord) -> Result<(), StorageError> {
        self.injected_failure()?;
        let mut state = self.lock()?;
        if state.sessions.contains_key(&session.session_id) {
            return Err(StorageError::DuplicateSession(session.session_id));
        }
        state.sessions.insert(session.session_id, session.clone());
        Ok(())
    }

    fn commit_segment(
        &self,
        session: &SessionRecord,
        expected_wave: u32,
        grant: &Grant,
    ) -> Result<PlayerRecord, StorageError> {
        self.injected_failure()?;
        let mut state = self.lock()?;
        let stored = state
            .sessions
            .get(&session.session_id)
            .ok_or(StorageError::UnknownSession(session.session_id))?;
        if stored.status != SessionStatus::Active || stored.current_wave != expected_wave {
            return Err(StorageError::Conflict { expected: expected_wave, found: stored.current_wave });
        }

        state.sessions.insert(session.session_id, session.clone());
        Ok(Self::credit(&mut state, &session.user_id, grant))
    }

    fn commit_end(&self, session: &SessionRecord, grant: &Grant) -> Result<PlayerRecord, StorageError> {
        self.injected_failure()?;
        let mut state = self.lock()?;
        let stored = state
            .sessions
            .get(&session.session_id)
            .ok_or(StorageError::UnknownSession(session.session_id))?;
        if stored.status != SessionStatus::Active {
            return Err(StorageError::Conflict { expected: session.current_wave, found: stored.current_wave });
        }

        state.sessions.insert(session.session_id, session.clone());
        Ok(Self::credit(&mut state, &session.user_id, grant))
    }

    fn touch_session(&self, session_id: &Uuid, now: u64) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        let stored = state
            .sessions
            .get_mut(session_id)
            .ok_or(StorageError::UnknownSession(*session_id))?;
        stored.last_activity = stored.last_activity.max(now);
        Ok(())
    }

    fn remove_session(&self, session_id: &Uuid) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        match state.sessions.get(session_id) {
            None => Err(StorageError::UnknownSession(*session_id)),
            Some(row) if row.status == SessionStatus::Active => Err(StorageError::StillActive(*session_id)),
            Some(_) => {
                state.sessions.remove(session_id);
                Ok(())
            }
        }
    }

    fn sessions(&self) -> Result<Vec<SessionRecord>, StorageError> {
        let state = self.lock()?;
        Ok(state.sessions.values().cloned().collect())
    }

    fn snapshot(&self) -> Result<StoreSnapshot, StorageError> {
        let state = self.lock()?;
        let mut players: Vec<PlayerRecord> = state.players.values().cloned().collect();
        players.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        let mut sessions: Vec<SessionRecord> = state.sessions.values().cloned().collect();
        sessions.sort_by_key(|s| (s.created_at, s.session_id));
        Ok(StoreSnapshot { players, sessions })
    }
}
